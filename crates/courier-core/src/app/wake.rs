//! WakeSignal - publish から dispatcher への合図
//!
//! `Notify` は permit を最大 1 つしか保持しないので、待機中でない時の
//! 連続した `wake()` は 1 回分にまとまる（single-slot）。

use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct WakeSignal {
    notify: Notify,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never blocks. If a wake is already stored this is a no-op.
    pub fn wake(&self) {
        self.notify.notify_one();
    }

    /// Completes on the next wake, or immediately if one is stored.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}
