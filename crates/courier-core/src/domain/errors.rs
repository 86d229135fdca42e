//! Errors - エラー型と分類
//!
//! - `StoreError`: ストア側の失敗（NotFound はロジックバグ、Unavailable はインフラ障害）
//! - `DeliveryError`: 購読者コールバックの失敗（Error ステータスとして記録するだけ）
//! - `PubSubError`: 公開 API が返すエラー

use thiserror::Error;

use super::ids::MessageId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Unknown message id on status update.
    #[error("message not found: {0}")]
    NotFound(MessageId),

    /// Store unreachable or corrupt.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A subscriber reported that it could not handle the payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("delivery failed: {reason}")]
pub struct DeliveryError {
    pub reason: String,
}

impl DeliveryError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PubSubError {
    #[error("failed to accept publishing: {0}")]
    Publish(#[source] StoreError),

    #[error("fatal: failed to fetch pending messages: {0}")]
    FetchPending(#[source] StoreError),

    #[error("fatal: failed to update status of {id}: {source}")]
    StatusUpdate {
        id: MessageId,
        #[source]
        source: StoreError,
    },
}
