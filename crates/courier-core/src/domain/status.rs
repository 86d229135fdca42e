//! Message status state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a stored message.
///
/// State transitions:
/// - Pending -> Completed (delivery succeeded)
/// - Pending -> Error (delivery failed, no retry)
///
/// Completed と Error は終端。dispatcher は終端状態のメッセージを二度と触らない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    #[default]
    Pending,
    Completed,
    Error,
}

impl MessageStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, MessageStatus::Completed | MessageStatus::Error)
    }

    pub fn is_pending(self) -> bool {
        matches!(self, MessageStatus::Pending)
    }
}

/// Number of stored messages per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub completed: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: MessageStatus) {
        match status {
            MessageStatus::Pending => self.pending += 1,
            MessageStatus::Completed => self.completed += 1,
            MessageStatus::Error => self.error += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.completed + self.error
    }
}

impl FromIterator<MessageStatus> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = MessageStatus>>(iter: I) -> Self {
        let mut counts = Self::default();
        for status in iter {
            counts.record(status);
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::pending(MessageStatus::Pending, false)]
    #[case::completed(MessageStatus::Completed, true)]
    #[case::error(MessageStatus::Error, true)]
    fn terminal_states(#[case] status: MessageStatus, #[case] terminal: bool) {
        assert_eq!(status.is_terminal(), terminal);
        assert_eq!(status.is_pending(), !terminal);
    }

    #[test]
    fn counts_tally_each_status() {
        let counts: StatusCounts = [
            MessageStatus::Pending,
            MessageStatus::Completed,
            MessageStatus::Completed,
            MessageStatus::Error,
        ]
        .into_iter()
        .collect();

        assert_eq!(counts.pending, 1);
        assert_eq!(counts.completed, 2);
        assert_eq!(counts.error, 1);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn default_is_pending() {
        assert_eq!(MessageStatus::default(), MessageStatus::Pending);
    }

    #[test]
    fn serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&MessageStatus::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");
    }
}
