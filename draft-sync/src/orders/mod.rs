//! Draft Order Sync Module
//!
//! Keeps every display surface (customer display, kitchen view, second
//! register) consistent with the cart a cashier is building:
//!
//! - **writer**: OrderWriter, the single writer of a cashier's drafts
//! - **reader**: OrderProjector, per-display read-only projection
//! - **scope**: which order a display shows and which messages it hears
//! - **finalize**: hand-off to the remote order API at payment
//! - **retention**: deletion of paid and abandoned drafts
//! - **money**: line and order totals
//!
//! # Architecture
//!
//! ```text
//! OrderWriter ──write──▶ DraftStore (redb) ◀──re-read── OrderProjector
//!      │                                                      ▲
//!      └──publish──▶ SyncChannel ──wake-up (scope filtered)───┘
//! ```
//!
//! The store is the source of truth. Messages only tell readers that
//! something in their scope changed.

pub mod error;
pub mod finalize;
pub mod money;
pub mod reader;
pub mod retention;
pub mod scope;
pub mod writer;

// Re-exports
pub use error::{SyncError, SyncResult};
pub use finalize::{
    FinalizationApi, FinalizationBridge, FinalizationError, FinalizationReceipt,
    FinalizationRequest, HttpFinalizationApi, UnconfiguredFinalizationApi,
};
pub use money::PricingPolicy;
pub use reader::{DisplayState, OrderProjector, OrderView};
pub use retention::{RetentionPolicy, RetentionWorker, SweepReport};
pub use scope::{ListenScope, ScopeResolution, resolve};
pub use writer::{CartState, OrderWriter};
