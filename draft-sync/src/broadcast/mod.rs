//! 广播通道 - 草稿订单变更通知
//!
//! # 架构
//!
//! ```text
//! OrderWriter ──▶ publish() ──▶ broadcast::Sender<SyncMessage>
//!                                        │
//!                    ┌───────────────────┼───────────────────┐
//!                    ▼                   ▼                   ▼
//!              OrderProjector      OrderProjector      OrderProjector
//!              (table=5)           (cashier=c1)        (auto)
//! ```
//!
//! The channel is a wake-up signal, not a queue: at-most-once, no replay,
//! no ordering across publishers. It does no filtering; each reader filters
//! by its own scope and re-reads the store.

use shared::message::SyncMessage;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Default capacity of the broadcast channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    /// Transport not supported / disabled in this context
    #[error("Broadcast channel '{0}' is unavailable")]
    Unavailable(String),
}

/// Outcome of waiting on a subscription
#[derive(Debug)]
pub enum Recv {
    Message(SyncMessage),
    /// Receiver fell behind and `n` messages were dropped; do a full re-read
    Lagged(u64),
    /// All senders dropped
    Closed,
}

/// Named cross-surface notification channel
#[derive(Debug, Clone)]
pub struct SyncChannel {
    name: Arc<str>,
    tx: Option<broadcast::Sender<SyncMessage>>,
}

impl SyncChannel {
    /// 创建指定容量的广播通道
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            name: Arc::from(name.into()),
            tx: Some(tx),
        }
    }

    /// A channel whose transport is not available
    ///
    /// Publishing and subscribing fail with [`BroadcastError::Unavailable`];
    /// writers keep working store-only.
    pub fn unavailable(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            tx: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_available(&self) -> bool {
        self.tx.is_some()
    }

    /// Publish to every currently subscribed reader
    ///
    /// Returns the number of receivers reached. Having no listeners is not an
    /// error: nothing is open to be notified.
    pub fn publish(&self, msg: SyncMessage) -> Result<usize, BroadcastError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| BroadcastError::Unavailable(self.name.to_string()))?;

        match tx.send(msg) {
            Ok(n) => Ok(n),
            Err(broadcast::error::SendError(msg)) => {
                tracing::debug!(
                    channel = %self.name,
                    event = %msg.event,
                    order_id = %msg.order_id,
                    "No active receivers for sync message"
                );
                Ok(0)
            }
        }
    }

    /// Publish after a committed write; failures are logged, never returned
    ///
    /// A channel that is unavailable was reported once at startup and is
    /// skipped silently here.
    pub fn notify(&self, msg: SyncMessage) {
        if !self.is_available() {
            return;
        }

        let (event, order_id, scope) = (msg.event, msg.order_id.clone(), msg.scope_id.clone());
        match self.publish(msg) {
            Ok(receivers) => {
                tracing::debug!(
                    channel = %self.name,
                    order_id = %order_id,
                    scope = %scope,
                    event = %event,
                    receivers,
                    "Sync message published"
                );
            }
            Err(e) => {
                tracing::warn!(
                    channel = %self.name,
                    order_id = %order_id,
                    event = %event,
                    error = %e,
                    "Sync broadcast failed, store write kept"
                );
            }
        }
    }

    pub fn subscribe(&self) -> Result<SyncSubscription, BroadcastError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| BroadcastError::Unavailable(self.name.to_string()))?;
        Ok(SyncSubscription {
            rx: tx.subscribe(),
        })
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.as_ref().map_or(0, |tx| tx.receiver_count())
    }
}

/// A reader's subscription to the channel
#[derive(Debug)]
pub struct SyncSubscription {
    rx: broadcast::Receiver<SyncMessage>,
}

impl SyncSubscription {
    pub async fn recv(&mut self) -> Recv {
        match self.rx.recv().await {
            Ok(msg) => Recv::Message(msg),
            Err(broadcast::error::RecvError::Lagged(n)) => Recv::Lagged(n),
            Err(broadcast::error::RecvError::Closed) => Recv::Closed,
        }
    }

    /// Non-blocking receive; `None` when nothing is queued
    pub fn try_recv(&mut self) -> Option<Recv> {
        match self.rx.try_recv() {
            Ok(msg) => Some(Recv::Message(msg)),
            Err(broadcast::error::TryRecvError::Lagged(n)) => Some(Recv::Lagged(n)),
            Err(broadcast::error::TryRecvError::Closed) => Some(Recv::Closed),
            Err(broadcast::error::TryRecvError::Empty) => None,
        }
    }

    /// Drain everything currently queued
    pub fn drain(&mut self) -> Vec<SyncMessage> {
        let mut out = Vec::new();
        while let Some(recv) = self.try_recv() {
            match recv {
                Recv::Message(msg) => out.push(msg),
                Recv::Lagged(_) => continue,
                Recv::Closed => break,
            }
        }
        out
    }
}
