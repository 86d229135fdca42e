//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryMessageStore**: プロセス内ストア
//! - **RecordingSubscriber**: テスト用の記録する購読者
//! - **LogSubscriber**: 受信内容をログに出す購読者

pub mod inmem_store;
pub mod log_subscriber;
pub mod recording_subscriber;

pub use self::inmem_store::InMemoryMessageStore;
pub use self::log_subscriber::LogSubscriber;
pub use self::recording_subscriber::RecordingSubscriber;
