//! PubSub - 公開 API とコンテキストオブジェクト
//!
//! ストア、購読者レジストリ、ID 生成、wake signal、設定をまとめて所有する。
//! グローバル状態は持たない。`Arc<PubSub>` で publish 側と dispatcher 側が共有する。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::config::PubSubConfig;
use super::dispatcher::Dispatcher;
use super::registry::SubscriberRegistry;
use super::wake::WakeSignal;
use crate::domain::{
    Message, MessageId, PubSubError, Publication, StatusCounts, StoreError, SubscriberId,
};
use crate::ports::{Clock, IdGenerator, MessageStore, Subscriber, SystemClock, UlidGenerator};

/// Ids of the messages one `publish` call created (one per matching subscriber).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReceipt {
    pub message_ids: Vec<MessageId>,
}

impl PublishReceipt {
    pub fn fan_out(&self) -> usize {
        self.message_ids.len()
    }
}

pub struct PubSub {
    store: Arc<dyn MessageStore>,
    registry: SubscriberRegistry,
    ids: Box<dyn IdGenerator>,
    clock: Box<dyn Clock>,
    wake: WakeSignal,
    config: PubSubConfig,
}

impl PubSub {
    /// Default config, system clock, ULID ids.
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self::builder(store).build()
    }

    pub fn builder(store: Arc<dyn MessageStore>) -> PubSubBuilder {
        PubSubBuilder::new(store)
    }

    pub fn config(&self) -> &PubSubConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Fan a publication out to every subscriber currently on its topic.
    ///
    /// - The subscriber set is snapshotted under the registry lock.
    /// - The whole batch goes to the store in one `save` call. On failure
    ///   nothing is woken and the error is returned.
    /// - No matching subscriber is not an error: an empty batch is saved.
    #[instrument(name = "publish", skip_all, fields(topic = %publication.topic))]
    pub async fn publish(&self, publication: Publication) -> Result<PublishReceipt, PubSubError> {
        let now = self.clock.now();
        let batch: Vec<Message> = self
            .registry
            .matching(&publication.topic)
            .iter()
            .map(|subscriber| {
                Message::pending(
                    self.ids.generate_message_id(),
                    subscriber.id().clone(),
                    &publication,
                    now,
                )
            })
            .collect();
        let message_ids: Vec<MessageId> = batch.iter().map(|m| m.id).collect();

        if let Err(err) = self.store.save(batch).await {
            warn!(error = %err, "store rejected publication");
            return Err(PubSubError::Publish(err));
        }

        self.wake.wake();
        debug!(fan_out = message_ids.len(), "published");
        Ok(PublishReceipt { message_ids })
    }

    /// Register (or replace) a subscriber under its id.
    ///
    /// Wakes the dispatcher so Pending messages already addressed to this id
    /// are reconsidered without waiting for the idle timeout.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        debug!(subscriber_id = %subscriber.id(), topic = %subscriber.topic(), "subscribe");
        self.registry.subscribe(subscriber);
        self.wake.wake();
    }

    /// Remove a subscriber. Its already-stored messages are not touched.
    pub fn unsubscribe(&self, id: &SubscriberId) -> bool {
        let removed = self.registry.unsubscribe(id);
        debug!(subscriber_id = %id, removed, "unsubscribe");
        removed
    }

    /// Run the dispatcher until `cancel` fires (`Ok`) or the store fails (`Err`).
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), PubSubError> {
        Dispatcher::new(
            self.store.as_ref(),
            &self.registry,
            &self.wake,
            &self.config,
        )
        .run(cancel)
        .await
    }

    pub async fn status_counts(&self) -> Result<StatusCounts, StoreError> {
        self.store.counts_by_status().await
    }
}

/// PubSubBuilder は PubSub を構築
///
/// # 使用例
/// ```ignore
/// let pubsub = PubSub::builder(Arc::new(InMemoryMessageStore::new()))
///     .config(PubSubConfig::default().with_idle_timeout(Duration::from_secs(30)))
///     .build();
/// ```
pub struct PubSubBuilder {
    store: Arc<dyn MessageStore>,
    config: PubSubConfig,
    clock: Box<dyn Clock>,
    ids: Option<Box<dyn IdGenerator>>,
}

impl PubSubBuilder {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            store,
            config: PubSubConfig::default(),
            clock: Box::new(SystemClock),
            ids: None,
        }
    }

    pub fn config(mut self, config: PubSubConfig) -> Self {
        self.config = config;
        self
    }

    /// Clock used for message timestamps. Ids keep their own clock.
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn id_generator<G: IdGenerator + 'static>(mut self, ids: G) -> Self {
        self.ids = Some(Box::new(ids));
        self
    }

    pub fn build(self) -> PubSub {
        let ids = self
            .ids
            .unwrap_or_else(|| Box::new(UlidGenerator::new(SystemClock)));
        PubSub {
            store: self.store,
            registry: SubscriberRegistry::new(),
            ids,
            clock: self.clock,
            wake: WakeSignal::new(),
            config: self.config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::FlakyStore;
    use crate::domain::MessageStatus;
    use crate::impls::{InMemoryMessageStore, RecordingSubscriber};
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[tokio::test]
    async fn publish_creates_one_pending_message_per_subscriber() {
        let store = Arc::new(InMemoryMessageStore::new());
        let pubsub = PubSub::new(store.clone());
        for id in ["s1", "s2", "s3"] {
            pubsub.subscribe(Arc::new(RecordingSubscriber::new(id, "topic1")));
        }

        let receipt = pubsub
            .publish(Publication::new("topic1", "hoge"))
            .await
            .unwrap();
        assert_eq!(receipt.fan_out(), 3);

        let stored = store.all().await;
        assert_eq!(stored.len(), 3);
        assert!(stored.iter().all(|m| m.status == MessageStatus::Pending));
        assert!(stored.iter().all(|m| &m.body[..] == b"hoge"));

        let targets: HashSet<&str> = stored.iter().map(|m| m.subscriber_id.as_str()).collect();
        assert_eq!(targets, HashSet::from(["s1", "s2", "s3"]));

        let ids: HashSet<MessageId> = stored.iter().map(|m| m.id).collect();
        assert_eq!(ids, receipt.message_ids.iter().copied().collect::<HashSet<_>>());
    }

    #[tokio::test]
    async fn publish_without_subscribers_stores_nothing() {
        let store = Arc::new(InMemoryMessageStore::new());
        let pubsub = PubSub::new(store.clone());
        pubsub.subscribe(Arc::new(RecordingSubscriber::new("a", "topic1")));

        let receipt = pubsub
            .publish(Publication::new("topic3", "hoge"))
            .await
            .unwrap();

        assert_eq!(receipt.fan_out(), 0);
        assert!(store.all().await.is_empty());
    }

    #[tokio::test]
    async fn publish_failure_is_reported_and_does_not_wake() {
        let store = Arc::new(FlakyStore::new());
        store.fail_save.store(true, Ordering::SeqCst);
        let pubsub = PubSub::new(store.clone());
        pubsub.subscribe(Arc::new(RecordingSubscriber::new("a", "t")));
        // subscribe が残した wake を先に消費する
        pubsub.wake.wait().await;

        let err = pubsub
            .publish(Publication::new("t", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, PubSubError::Publish(StoreError::Unavailable(_))));

        assert!(
            tokio::time::timeout(Duration::from_millis(50), pubsub.wake.wait())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn successful_publish_leaves_a_wake() {
        let pubsub = PubSub::new(Arc::new(InMemoryMessageStore::new()));
        pubsub.publish(Publication::new("t", "x")).await.unwrap();
        pubsub.publish(Publication::new("t", "y")).await.unwrap();

        tokio::time::timeout(Duration::from_millis(50), pubsub.wake.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn subscribe_leaves_a_wake() {
        let pubsub = PubSub::new(Arc::new(InMemoryMessageStore::new()));
        pubsub.subscribe(Arc::new(RecordingSubscriber::new("a", "t")));

        tokio::time::timeout(Duration::from_millis(50), pubsub.wake.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn messages_are_stamped_with_the_configured_clock() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = FixedClock::new(at);
        let store = Arc::new(InMemoryMessageStore::with_clock(clock));
        let pubsub = PubSub::builder(store.clone())
            .clock(clock)
            .id_generator(UlidGenerator::new(clock))
            .build();
        pubsub.subscribe(Arc::new(RecordingSubscriber::new("a", "t")));

        let receipt = pubsub.publish(Publication::new("t", "x")).await.unwrap();

        let message = store.get(receipt.message_ids[0]).await.unwrap().unwrap();
        assert_eq!(message.created_at, at);
        assert_eq!(message.updated_at, at);
        assert_eq!(
            message.id.as_ulid().timestamp_ms(),
            at.timestamp_millis() as u64
        );
    }

    #[tokio::test]
    async fn unsubscribe_does_not_touch_stored_messages() {
        let store = Arc::new(InMemoryMessageStore::new());
        let pubsub = PubSub::new(store.clone());
        pubsub.subscribe(Arc::new(RecordingSubscriber::new("a", "t")));
        pubsub.publish(Publication::new("t", "x")).await.unwrap();

        assert!(pubsub.unsubscribe(&SubscriberId::from("a")));
        assert!(!pubsub.unsubscribe(&SubscriberId::from("a")));

        let counts = pubsub.status_counts().await.unwrap();
        assert_eq!(counts.pending, 1);

        pubsub.publish(Publication::new("t", "y")).await.unwrap();
        assert_eq!(store.all().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn publish_racing_unsubscribe_sees_a_consistent_snapshot() {
        for _ in 0..50 {
            let store = Arc::new(InMemoryMessageStore::new());
            let pubsub = Arc::new(PubSub::new(store.clone()));
            pubsub.subscribe(Arc::new(RecordingSubscriber::new("a", "t")));
            pubsub.subscribe(Arc::new(RecordingSubscriber::new("b", "t")));

            let publisher = tokio::spawn({
                let pubsub = pubsub.clone();
                async move { pubsub.publish(Publication::new("t", "x")).await }
            });
            let unsubscriber = tokio::spawn({
                let pubsub = pubsub.clone();
                async move { pubsub.unsubscribe(&SubscriberId::from("a")) }
            });

            let receipt = publisher.await.unwrap().unwrap();
            assert!(unsubscriber.await.unwrap());

            let stored = store.all().await;
            let for_a = stored
                .iter()
                .filter(|m| m.subscriber_id.as_str() == "a")
                .count();
            let for_b = stored
                .iter()
                .filter(|m| m.subscriber_id.as_str() == "b")
                .count();

            // A は含まれるか含まれないかのどちらか。B は必ず 1 件
            assert!(for_a <= 1);
            assert_eq!(for_b, 1);
            assert_eq!(receipt.fan_out(), stored.len());
        }
    }
}
