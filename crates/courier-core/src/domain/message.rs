//! Publication (what callers publish) and Message (what the store keeps).

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{MessageId, SubscriberId, Topic};
use super::status::MessageStatus;

/// Message template handed to `publish`: topic + opaque payload.
///
/// identity も宛先もまだ無い。fan-out 時に購読者ごとの `Message` になる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub topic: Topic,
    pub body: Bytes,
}

impl Publication {
    pub fn new(topic: impl Into<Topic>, body: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            body: body.into(),
        }
    }
}

/// One stored delivery record: a publication addressed to exactly one subscriber.
///
/// Design:
/// - `subscriber_id` is fixed at creation and never reassigned.
/// - The subscriber is referenced by identity only; the record does not keep it alive.
/// - Records are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub subscriber_id: SubscriberId,
    pub topic: Topic,
    pub body: Bytes,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Build the fan-out record for one subscriber.
    pub fn pending(
        id: MessageId,
        subscriber_id: SubscriberId,
        publication: &Publication,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            subscriber_id,
            topic: publication.topic.clone(),
            // Bytes の clone は参照カウントのみ
            body: publication.body.clone(),
            status: MessageStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_status(&mut self, status: MessageStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }
}
