//! Unified error codes for the draft sync core
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Order errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Represented as u16 values for cross-language compatibility (Rust,
/// TypeScript front-end).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,

    // ==================== 4xxx: Order ====================
    /// Draft order not found in the local store
    OrderNotFound = 4001,
    /// Line item not found in the local store
    ItemNotFound = 4002,
    /// Operation not allowed in the order's current state
    InvalidOperation = 4003,
    /// Order was already finalized (paid)
    AlreadyFinalized = 4004,
    /// A finalization for this order is already running
    FinalizationInProgress = 4005,
    /// Remote finalization failed, local draft kept for retry
    FinalizationFailure = 4006,

    // ==================== 9xxx: System ====================
    /// Local durable store not supported or not accessible
    StorageUnavailable = 9001,
    /// Cross-surface notification transport not supported
    BroadcastUnavailable = 9002,
    /// Local store rejected a write (quota, corruption)
    WriteFailure = 9003,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Whether the operator should be offered a retry for this failure
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::WriteFailure
                | ErrorCode::FinalizationFailure
                | ErrorCode::FinalizationInProgress
        )
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",

            ErrorCode::OrderNotFound => "Draft order not found",
            ErrorCode::ItemNotFound => "Order item not found",
            ErrorCode::InvalidOperation => "Operation not allowed for this order",
            ErrorCode::AlreadyFinalized => "Order has already been paid",
            ErrorCode::FinalizationInProgress => "Order finalization already in progress",
            ErrorCode::FinalizationFailure => "Payment recorded but sync pending",

            ErrorCode::StorageUnavailable => "Local storage is unavailable",
            ErrorCode::BroadcastUnavailable => "Display sync is unavailable",
            ErrorCode::WriteFailure => "Could not save the change, please retry",
        }
    }

    /// Stable i18n key for the front-end
    pub const fn message_key(&self) -> &'static str {
        match self {
            ErrorCode::Unknown => "error.unknown",
            ErrorCode::ValidationFailed => "error.validation_failed",
            ErrorCode::OrderNotFound => "error.order.not_found",
            ErrorCode::ItemNotFound => "error.order.item_not_found",
            ErrorCode::InvalidOperation => "error.order.invalid_operation",
            ErrorCode::AlreadyFinalized => "error.order.already_finalized",
            ErrorCode::FinalizationInProgress => "error.order.finalization_in_progress",
            ErrorCode::FinalizationFailure => "error.order.sync_pending",
            ErrorCode::StorageUnavailable => "error.system.storage_unavailable",
            ErrorCode::BroadcastUnavailable => "error.system.broadcast_unavailable",
            ErrorCode::WriteFailure => "error.system.write_failure",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code as u16
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            1 => ErrorCode::Unknown,
            2 => ErrorCode::ValidationFailed,
            4001 => ErrorCode::OrderNotFound,
            4002 => ErrorCode::ItemNotFound,
            4003 => ErrorCode::InvalidOperation,
            4004 => ErrorCode::AlreadyFinalized,
            4005 => ErrorCode::FinalizationInProgress,
            4006 => ErrorCode::FinalizationFailure,
            9001 => ErrorCode::StorageUnavailable,
            9002 => ErrorCode::BroadcastUnavailable,
            9003 => ErrorCode::WriteFailure,
            other => return Err(format!("Unknown error code: {}", other)),
        };
        Ok(code)
    }
}
