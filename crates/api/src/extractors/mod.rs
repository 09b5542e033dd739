//! Request extractors.

pub mod body;
pub mod caller;

pub use body::{JsonBody, QueryParams};
pub use caller::Caller;
