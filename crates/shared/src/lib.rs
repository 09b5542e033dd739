//! Shared types, errors, and configuration for LedgerBridge.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for tenant-scoped records
//! - Pagination types for list endpoints
//! - Application-wide error taxonomy with HTTP mapping
//! - Configuration management
//! - JWT access-token claims and validation

pub mod auth;
pub mod config;
pub mod error;
pub mod jwt;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
