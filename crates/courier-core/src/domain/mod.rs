//! Domain model (IDs, publications, messages, statuses, errors).

pub mod errors;
pub mod ids;
pub mod message;
pub mod status;

pub use self::errors::{DeliveryError, PubSubError, StoreError};
pub use self::ids::{Id, IdMarker, MessageId, SubscriberId, Topic};
pub use self::message::{Message, Publication};
pub use self::status::{MessageStatus, StatusCounts};
