//! App - アプリケーション層
//!
//! ports を組み合わせて pub/sub のロジックを実装します。
//!
//! # 主要コンポーネント
//! - **PubSub**: コンテキストオブジェクト（publish / subscribe / unsubscribe / run）
//! - **SubscriberRegistry**: 購読者 ID → 購読者
//! - **Dispatcher**: pending メッセージの配送ループ
//! - **WakeSignal**: publish → dispatcher の合図
//! - **PubSubConfig**: idle timeout、orphan / status write ポリシー

pub mod config;
pub mod dispatcher;
pub mod pubsub;
pub mod registry;
pub mod retry;
pub mod wake;

#[cfg(test)]
pub(crate) mod test_support;

pub use self::config::{ConfigError, OrphanPolicy, PubSubConfig, StatusWritePolicy};
pub use self::dispatcher::CycleReport;
pub use self::pubsub::{PubSub, PubSubBuilder, PublishReceipt};
pub use self::registry::SubscriberRegistry;
pub use self::retry::RetryPolicy;
pub use self::wake::WakeSignal;
