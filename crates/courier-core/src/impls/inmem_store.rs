//! InMemoryMessageStore - プロセス内の MessageStore 実装
//!
//! - HashMap<MessageId, Message> を tokio::sync::Mutex で保護
//! - ロックは各メソッドの中で完結（await を跨がない）
//! - updated_at は注入された Clock で打刻する（デフォルトは SystemClock）

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{Message, MessageId, MessageStatus, StatusCounts, StoreError};
use crate::ports::{Clock, MessageStore, SystemClock};

/// Keeps every message for the lifetime of the process.
pub struct InMemoryMessageStore {
    messages: Mutex<HashMap<MessageId, Message>>,
    clock: Box<dyn Clock>,
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp `updated_at` with `clock`. Pass the same clock as the
    /// `PubSub` so both timestamps share one time source.
    pub fn with_clock<C: Clock + 'static>(clock: C) -> Self {
        Self {
            messages: Mutex::new(HashMap::new()),
            clock: Box::new(clock),
        }
    }

    /// Every stored message, in no particular order.
    pub async fn all(&self) -> Vec<Message> {
        let messages = self.messages.lock().await;
        messages.values().cloned().collect()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn save(&self, batch: Vec<Message>) -> Result<(), StoreError> {
        let mut messages = self.messages.lock().await;
        for message in batch {
            messages.insert(message.id, message);
        }
        Ok(())
    }

    async fn update_status(
        &self,
        id: MessageId,
        status: MessageStatus,
    ) -> Result<(), StoreError> {
        let mut messages = self.messages.lock().await;
        let message = messages.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        message.set_status(status, self.clock.now());
        Ok(())
    }

    async fn fetch_pending_messages(&self) -> Result<Vec<Message>, StoreError> {
        let messages = self.messages.lock().await;
        Ok(messages
            .values()
            .filter(|m| m.status.is_pending())
            .cloned()
            .collect())
    }

    async fn get(&self, id: MessageId) -> Result<Option<Message>, StoreError> {
        let messages = self.messages.lock().await;
        Ok(messages.get(&id).cloned())
    }

    async fn counts_by_status(&self) -> Result<StatusCounts, StoreError> {
        let messages = self.messages.lock().await;
        Ok(messages.values().map(|m| m.status).collect())
    }
}
