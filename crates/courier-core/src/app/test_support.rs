//! Test doubles shared by the app-layer tests.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{Message, MessageId, MessageStatus, StatusCounts, StoreError};
use crate::impls::InMemoryMessageStore;
use crate::ports::MessageStore;

/// InMemoryMessageStore + 失敗注入 + 呼び出し回数の計測
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryMessageStore,
    pub fail_save: AtomicBool,
    pub fail_fetch: AtomicBool,
    /// Fail this many upcoming `update_status` calls.
    pub fail_updates: AtomicU32,
    pub fetch_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn unavailable(op: &str) -> StoreError {
        StoreError::Unavailable(format!("injected {op} failure"))
    }
}

#[async_trait]
impl MessageStore for FlakyStore {
    async fn save(&self, messages: Vec<Message>) -> Result<(), StoreError> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(Self::unavailable("save"));
        }
        self.inner.save(messages).await
    }

    async fn update_status(
        &self,
        id: MessageId,
        status: MessageStatus,
    ) -> Result<(), StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .fail_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            return Err(Self::unavailable("update"));
        }
        self.inner.update_status(id, status).await
    }

    async fn fetch_pending_messages(&self) -> Result<Vec<Message>, StoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Self::unavailable("fetch"));
        }
        self.inner.fetch_pending_messages().await
    }

    async fn get(&self, id: MessageId) -> Result<Option<Message>, StoreError> {
        self.inner.get(id).await
    }

    async fn counts_by_status(&self) -> Result<StatusCounts, StoreError> {
        self.inner.counts_by_status().await
    }
}

/// Poll `check` every 10ms until it returns true. Panics after 5 seconds.
pub async fn eventually(check: impl Fn() -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "condition not reached within 5s");
}

/// Poll the store's status counts until `pred` holds, and return them.
pub async fn wait_for_counts(
    store: &dyn MessageStore,
    pred: impl Fn(&StatusCounts) -> bool,
) -> StatusCounts {
    let polled = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let counts = store.counts_by_status().await.unwrap();
            if pred(&counts) {
                return counts;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    match polled {
        Ok(counts) => counts,
        Err(_) => panic!("status counts did not settle within 5s"),
    }
}
