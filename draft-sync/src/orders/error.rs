use super::finalize::FinalizationError;
use crate::broadcast::BroadcastError;
use crate::store::StoreError;
use shared::ErrorCode;
use thiserror::Error;

/// Errors surfaced by the sync core to the initiating action
#[derive(Debug, Error)]
pub enum SyncError {
    /// Read-side store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Persisting a mutation failed; nothing was broadcast, cart unchanged
    #[error("Failed to save {record}: {source}")]
    WriteFailure {
        record: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Broadcast unavailable: {0}")]
    BroadcastUnavailable(#[from] BroadcastError),

    /// Remote write failed; the local draft is kept for retry
    #[error("Finalization failed for order {order_id}: {source}")]
    FinalizationFailure {
        order_id: String,
        #[source]
        source: FinalizationError,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Order already finalized: {0}")]
    AlreadyFinalized(String),

    #[error("Finalization already in progress: {0}")]
    FinalizationInProgress(String),
}

impl SyncError {
    pub(crate) fn write(record: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| SyncError::WriteFailure { record, source }
    }

    /// 将错误转换为错误码（前端负责本地化）
    pub fn code(&self) -> ErrorCode {
        match self {
            SyncError::Store(StoreError::Unavailable(_)) => ErrorCode::StorageUnavailable,
            SyncError::Store(StoreError::Write(_)) => ErrorCode::WriteFailure,
            SyncError::Store(_) => ErrorCode::Unknown,
            SyncError::WriteFailure { .. } => ErrorCode::WriteFailure,
            SyncError::BroadcastUnavailable(_) => ErrorCode::BroadcastUnavailable,
            SyncError::FinalizationFailure { .. } => ErrorCode::FinalizationFailure,
            SyncError::OrderNotFound(_) => ErrorCode::OrderNotFound,
            SyncError::ItemNotFound(_) => ErrorCode::ItemNotFound,
            SyncError::InvalidOperation(_) => ErrorCode::InvalidOperation,
            SyncError::AlreadyFinalized(_) => ErrorCode::AlreadyFinalized,
            SyncError::FinalizationInProgress(_) => ErrorCode::FinalizationInProgress,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
