//! courier-core
//!
//! In-process publish/subscribe engine: a message store, topic fan-out,
//! at-least-once delivery and a wake-up driven dispatch loop.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, message, status, errors）
//! - **ports**: 抽象化レイヤー（MessageStore, Subscriber, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（PubSub, registry, dispatcher, config）
//! - **impls**: 実装（InMemoryMessageStore, RecordingSubscriber, LogSubscriber）
//!
//! ```ignore
//! let pubsub = Arc::new(PubSub::new(Arc::new(InMemoryMessageStore::new())));
//! pubsub.subscribe(Arc::new(LogSubscriber::new("subscriber1", "topic1")));
//!
//! let cancel = CancellationToken::new();
//! let dispatcher = tokio::spawn({
//!     let pubsub = pubsub.clone();
//!     let cancel = cancel.clone();
//!     async move { pubsub.run(cancel).await }
//! });
//!
//! pubsub.publish(Publication::new("topic1", "hoge")).await?;
//! ```

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{PubSub, PubSubConfig, PublishReceipt};
pub use domain::{Message, MessageStatus, PubSubError, Publication, SubscriberId, Topic};
