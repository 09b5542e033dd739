//! QuickBooks Online HTTP clients for LedgerBridge.
//!
//! The domain types and the provider error taxonomy live in
//! `ledgerbridge_core::qbo`; this crate only speaks HTTP.
//!
//! # Modules
//!
//! - `http` - Shared reqwest client and response classification
//! - `oauth` - Authorization URL, code exchange and token refresh
//! - `reports` - Trial balance report fetching

pub mod http;
pub mod oauth;
pub mod reports;

pub use oauth::QboOAuthClient;
pub use reports::QboReportsClient;
