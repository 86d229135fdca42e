//! LogSubscriber - 受信したメッセージを tracing に流すだけの購読者

use async_trait::async_trait;

use crate::domain::{DeliveryError, SubscriberId, Topic};
use crate::ports::Subscriber;

pub struct LogSubscriber {
    id: SubscriberId,
    topic: Topic,
}

impl LogSubscriber {
    pub fn new(id: impl Into<SubscriberId>, topic: impl Into<Topic>) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl Subscriber for LogSubscriber {
    fn id(&self) -> &SubscriberId {
        &self.id
    }

    fn topic(&self) -> Topic {
        self.topic.clone()
    }

    async fn on_message(&self, body: &[u8]) -> Result<(), DeliveryError> {
        tracing::info!(
            subscriber_id = %self.id,
            topic = %self.topic,
            message = %String::from_utf8_lossy(body),
            "received"
        );
        Ok(())
    }
}
