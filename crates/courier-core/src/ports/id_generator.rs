//! IdGenerator port - ID 生成の抽象化
//!
//! fan-out 時に (publication, subscriber) ごとに新しい MessageId を払い出す。
//! テスト容易性のために trait として抽象化しています。

use crate::domain::MessageId;
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator はメッセージ ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（publish は複数タスクから同時に呼ばれる）
pub trait IdGenerator: Send + Sync {
    fn generate_message_id(&self) -> MessageId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock の時刻を timestamp 部分に、乱数をランダム部分に使います。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_message_id(&self) -> MessageId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        MessageId::from(ulid)
    }
}
