//! QuickBooks Online domain logic.
//!
//! Everything here is transport-free: the HTTP clients live in the
//! `ledgerbridge-qbo` crate and hand their results to these types.
//!
//! # Modules
//!
//! - `state` - Signed OAuth state tokens
//! - `token` - Token grants, stored token sets and expiry
//! - `report` - Trial balance report shape and normalization
//! - `amount` - Accounting amount parsing
//! - `error` - Provider error taxonomy

pub mod amount;
pub mod error;
pub mod report;
pub mod state;
pub mod token;

#[cfg(test)]
mod state_props;

pub use amount::parse_amount;
pub use error::{ProviderError, StateError};
pub use report::{NormalizedLine, TrialBalanceReport, normalize};
pub use state::{OAuthState, StateCodec};
pub use token::{TokenGrant, TokenSet};
