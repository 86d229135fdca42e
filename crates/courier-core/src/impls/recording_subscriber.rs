//! RecordingSubscriber - テスト用のインメモリ購読者
//!
//! 配信されたペイロードを記録する。トピックの差し替え、失敗注入、
//! 配信遅延を設定できる。

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;

use crate::domain::{DeliveryError, SubscriberId, Topic};
use crate::ports::Subscriber;

pub struct RecordingSubscriber {
    id: SubscriberId,
    topic: Mutex<Topic>,
    received: Mutex<Vec<Bytes>>,
    calls: AtomicUsize,
    remaining_failures: AtomicU32,
    always_fail: AtomicBool,
    delay: Option<Duration>,
    delivered: Notify,
}

impl RecordingSubscriber {
    pub fn new(id: impl Into<SubscriberId>, topic: impl Into<Topic>) -> Self {
        Self {
            id: id.into(),
            topic: Mutex::new(topic.into()),
            received: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            remaining_failures: AtomicU32::new(0),
            always_fail: AtomicBool::new(false),
            delay: None,
            delivered: Notify::new(),
        }
    }

    /// Sleep this long inside every `on_message` call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next `n` deliveries, then succeed.
    pub fn fail_next(&self, n: u32) {
        self.remaining_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_always(&self, fail: bool) {
        self.always_fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_topic(&self, topic: impl Into<Topic>) {
        *lock(&self.topic) = topic.into();
    }

    /// Payloads of successful deliveries, in delivery order.
    pub fn received(&self) -> Vec<Bytes> {
        lock(&self.received).clone()
    }

    /// Number of `on_message` calls, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` calls have been made.
    pub async fn wait_for_calls(&self, n: usize) {
        loop {
            // notified() を先に作ってからチェックする（取りこぼし防止）
            let notified = self.delivered.notified();
            if self.calls() >= n {
                return;
            }
            notified.await;
        }
    }

    fn should_fail(&self) -> bool {
        if self.always_fail.load(Ordering::SeqCst) {
            return true;
        }
        self.remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Subscriber for RecordingSubscriber {
    fn id(&self) -> &SubscriberId {
        &self.id
    }

    fn topic(&self) -> Topic {
        lock(&self.topic).clone()
    }

    async fn on_message(&self, body: &[u8]) -> Result<(), DeliveryError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = if self.should_fail() {
            Err(DeliveryError::new(format!("{} rejected the message", self.id)))
        } else {
            lock(&self.received).push(Bytes::copy_from_slice(body));
            Ok(())
        };

        self.calls.fetch_add(1, Ordering::SeqCst);
        self.delivered.notify_waiters();
        result
    }
}

// poison されても記録は読めるようにする
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_successful_deliveries() {
        let sub = RecordingSubscriber::new("a", "t");

        sub.on_message(b"x").await.unwrap();
        sub.on_message(b"y").await.unwrap();

        assert_eq!(sub.received(), vec![Bytes::from("x"), Bytes::from("y")]);
        assert_eq!(sub.calls(), 2);
    }

    #[tokio::test]
    async fn fail_next_then_recover() {
        let sub = RecordingSubscriber::new("a", "t");
        sub.fail_next(1);

        assert!(sub.on_message(b"x").await.is_err());
        assert!(sub.on_message(b"y").await.is_ok());

        assert_eq!(sub.received(), vec![Bytes::from("y")]);
        assert_eq!(sub.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_holds_the_delivery() {
        let sub = RecordingSubscriber::new("a", "t").with_delay(Duration::from_secs(30));
        let start = tokio::time::Instant::now();

        sub.on_message(b"x").await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(30));
        assert_eq!(sub.calls(), 1);
    }

    #[tokio::test]
    async fn topic_can_change() {
        let sub = RecordingSubscriber::new("a", "t");
        sub.set_topic("u");
        assert_eq!(sub.topic(), Topic::from("u"));
    }
}
