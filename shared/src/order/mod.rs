//! Draft order data model
//!
//! - Drafts: locally-staged orders and their line items
//! - Scopes: routing keys that isolate concurrent cashiers and tables
//! - Types: item references, customer references, status, totals

pub mod draft;
pub mod scope;
pub mod types;

// Re-exports
pub use draft::{DraftOrder, DraftOrderItem};
pub use scope::{DisplayScope, ScopeId, ScopeParseError};
pub use types::*;
