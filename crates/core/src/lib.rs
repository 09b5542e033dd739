//! Core business logic for LedgerBridge.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Tenant resolution, visibility rules, OAuth state signing, report
//! normalization and the import run state machine live here.
//!
//! # Modules
//!
//! - `tenant` - Tenant context resolution and access checks
//! - `access` - Roles, capabilities and client visibility
//! - `qbo` - QuickBooks state tokens, token lifecycle and report parsing
//! - `import` - Import run validation and orchestration

pub mod access;
pub mod import;
pub mod qbo;
pub mod tenant;
