//! Dispatcher - pending メッセージを購読者へ配送するループ
//!
//! # フロー
//! 1. MessageStore::fetch_pending_messages() で Pending を全件取得
//! 2. 空なら wake / idle timeout / cancel のどれかを待つ
//! 3. 各メッセージの宛先を registry から引き、現在の topic が一致すれば配送
//! 4. 成功なら Completed、失敗なら Error を書き込む
//!
//! 1 サイクルで何も遷移しなかった場合（宛先が消えた・topic が変わった）も
//! 2 と同じく待機に入る。

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use super::config::{OrphanPolicy, PubSubConfig, StatusWritePolicy};
use super::registry::SubscriberRegistry;
use super::wake::WakeSignal;
use crate::domain::{Message, MessageId, MessageStatus, PubSubError, StoreError};
use crate::ports::MessageStore;

/// What one pass over the pending set did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub completed: usize,
    pub errored: usize,
    pub left_pending: usize,
}

impl CycleReport {
    pub fn made_progress(&self) -> bool {
        self.completed + self.errored > 0
    }

    fn record(&mut self, outcome: Option<MessageStatus>) {
        match outcome {
            Some(MessageStatus::Completed) => self.completed += 1,
            Some(MessageStatus::Error) => self.errored += 1,
            Some(MessageStatus::Pending) | None => self.left_pending += 1,
        }
    }
}

pub(crate) struct Dispatcher<'a> {
    store: &'a dyn MessageStore,
    registry: &'a SubscriberRegistry,
    wake: &'a WakeSignal,
    config: &'a PubSubConfig,
}

impl<'a> Dispatcher<'a> {
    pub(crate) fn new(
        store: &'a dyn MessageStore,
        registry: &'a SubscriberRegistry,
        wake: &'a WakeSignal,
        config: &'a PubSubConfig,
    ) -> Self {
        Self {
            store,
            registry,
            wake,
            config,
        }
    }

    #[instrument(name = "dispatcher", skip_all)]
    pub(crate) async fn run(&self, cancel: CancellationToken) -> Result<(), PubSubError> {
        info!(
            idle_timeout_ms = self.config.idle_timeout_ms,
            "dispatcher started"
        );

        while !cancel.is_cancelled() {
            let pending = self.store.fetch_pending_messages().await.map_err(|err| {
                error!(error = %err, "failed to fetch pending messages");
                PubSubError::FetchPending(err)
            })?;

            if !pending.is_empty() {
                let report = self.dispatch(pending, &cancel).await?;
                debug!(?report, "cycle finished");
                if report.made_progress() {
                    continue;
                }
            }

            if !self.idle(&cancel).await {
                break;
            }
        }

        info!("dispatcher stopped");
        Ok(())
    }

    /// Wait for a wake, the idle timeout, or cancellation. `false` means cancelled.
    async fn idle(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = self.wake.wait() => {
                trace!("woken by publish");
                true
            }
            _ = tokio::time::sleep(self.config.idle_timeout()) => {
                debug!("idle timeout elapsed, polling store");
                true
            }
        }
    }

    async fn dispatch(
        &self,
        pending: Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, PubSubError> {
        let mut report = CycleReport {
            fetched: pending.len(),
            ..CycleReport::default()
        };

        for message in &pending {
            // 配送中の呼び出しは中断しないが、次のメッセージには進まない
            if cancel.is_cancelled() {
                break;
            }
            let outcome = self.dispatch_one(message, cancel).await?;
            report.record(outcome);
        }

        Ok(report)
    }

    /// Deliver one message. Returns the status written, or `None` if the
    /// message was left Pending.
    async fn dispatch_one(
        &self,
        message: &Message,
        cancel: &CancellationToken,
    ) -> Result<Option<MessageStatus>, PubSubError> {
        // ロックは get() の中で離れる。配送中は registry を握らない
        let Some(subscriber) = self.registry.get(&message.subscriber_id) else {
            return self.undeliverable(message, "subscriber is gone", cancel).await;
        };

        if subscriber.topic() != message.topic {
            return self
                .undeliverable(message, "subscriber changed topic", cancel)
                .await;
        }

        let status = match subscriber.on_message(&message.body).await {
            Ok(()) => {
                trace!(message_id = %message.id, subscriber_id = %message.subscriber_id, "delivered");
                MessageStatus::Completed
            }
            Err(err) => {
                warn!(
                    message_id = %message.id,
                    subscriber_id = %message.subscriber_id,
                    topic = %message.topic,
                    error = %err,
                    "delivery failed"
                );
                MessageStatus::Error
            }
        };

        self.write_status(message.id, status, cancel).await
    }

    async fn undeliverable(
        &self,
        message: &Message,
        reason: &'static str,
        cancel: &CancellationToken,
    ) -> Result<Option<MessageStatus>, PubSubError> {
        match self.config.orphan_policy {
            OrphanPolicy::LeavePending => {
                debug!(
                    message_id = %message.id,
                    subscriber_id = %message.subscriber_id,
                    reason,
                    "message left pending"
                );
                Ok(None)
            }
            OrphanPolicy::MarkError => {
                warn!(
                    message_id = %message.id,
                    subscriber_id = %message.subscriber_id,
                    reason,
                    "undeliverable message marked as error"
                );
                self.write_status(message.id, MessageStatus::Error, cancel)
                    .await
            }
        }
    }

    /// Record a status under the configured write policy.
    ///
    /// `Ok(None)`: cancelled while backing off; the message stays Pending and
    /// will be delivered again by a later run.
    async fn write_status(
        &self,
        id: MessageId,
        status: MessageStatus,
        cancel: &CancellationToken,
    ) -> Result<Option<MessageStatus>, PubSubError> {
        let (max_attempts, backoff) = match &self.config.status_write {
            StatusWritePolicy::Fatal => (1, None),
            StatusWritePolicy::Retry {
                max_attempts,
                backoff,
            } => ((*max_attempts).max(1), Some(backoff)),
        };

        let mut attempt = 1;
        loop {
            let source = match self.store.update_status(id, status).await {
                Ok(()) => return Ok(Some(status)),
                Err(err) => err,
            };

            // NotFound はロジックバグなので再試行しない
            let exhausted = attempt >= max_attempts || matches!(source, StoreError::NotFound(_));
            let Some(backoff) = backoff.filter(|_| !exhausted) else {
                error!(message_id = %id, ?status, attempt, error = %source, "failed to record message status");
                return Err(PubSubError::StatusUpdate { id, source });
            };

            let delay = backoff.next_delay(attempt);
            warn!(
                message_id = %id,
                ?status,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %source,
                "status write failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(message_id = %id, "shutdown during status write retry, message stays pending");
                    return Ok(None);
                }
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}
