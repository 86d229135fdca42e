//! MessageStore port - 配信記録の正本（source of truth）
//!
//! publish されたメッセージは購読者ごとに 1 件ずつ保存され、削除されない。
//! ステータスを書き換えるのは dispatcher だけ。

use async_trait::async_trait;

use crate::domain::{Message, MessageId, MessageStatus, StatusCounts, StoreError};

/// Storage seam for delivery records.
///
/// # Contract
/// - `save`: insert every message keyed by id. Duplicate ids overwrite. An empty
///   batch is accepted. Fails only on a storage fault.
/// - `update_status`: `StoreError::NotFound` for an unknown id, otherwise
///   overwrite unconditionally (no terminal-state guard here).
/// - `fetch_pending_messages`: fresh read of every Pending message, in no
///   particular order.
///
/// Implementations serialize their own state.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn save(&self, messages: Vec<Message>) -> Result<(), StoreError>;

    async fn update_status(
        &self,
        id: MessageId,
        status: MessageStatus,
    ) -> Result<(), StoreError>;

    async fn fetch_pending_messages(&self) -> Result<Vec<Message>, StoreError>;

    async fn get(&self, id: MessageId) -> Result<Option<Message>, StoreError>;

    /// Observability hook.
    async fn counts_by_status(&self) -> Result<StatusCounts, StoreError>;
}
