//! Subscriber port - 配信先の抽象化

use async_trait::async_trait;

use crate::domain::{DeliveryError, SubscriberId, Topic};

/// A delivery target registered with the pub/sub engine.
///
/// - `id` is the registry key and must stay stable for the subscriber's life.
/// - `topic` is read at publish time (fan-out) and again at delivery time.
///   It may change in between.
/// - `on_message` receives the opaque payload. `Err` is recorded as a
///   failed delivery; it is not retried.
#[async_trait]
pub trait Subscriber: Send + Sync {
    fn id(&self) -> &SubscriberId;

    fn topic(&self) -> Topic;

    async fn on_message(&self, body: &[u8]) -> Result<(), DeliveryError>;
}
