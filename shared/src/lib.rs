//! Shared types for the draft order sync core
//!
//! Types used by both the authoring side (order writer) and the display side
//! (order readers): draft order records, sync event messages, scope
//! identifiers and error codes.

pub mod error;
pub mod message;
pub mod order;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::ErrorCode;
pub use message::{EventKind, SyncMessage};
pub use order::{
    CustomerRef, DisplayScope, DraftOrder, DraftOrderItem, ItemInput, ItemRef, OrderStatus,
    OrderTotals, ScopeId,
};
