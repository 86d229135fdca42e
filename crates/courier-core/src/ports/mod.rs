//! Ports - 抽象化レイヤー
//!
//! ストア、購読者、時刻、ID 生成を trait として切り出し、
//! app 層は実装の詳細を知らない。

pub mod clock;
pub mod id_generator;
pub mod message_store;
pub mod subscriber;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::message_store::MessageStore;
pub use self::subscriber::Subscriber;
