//! Message records and id ordering primitives

use serde::{Deserialize, Serialize};

use crate::day_index::DayBucketIndex;

/// Delivery state of a message we sent ourselves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendState {
    Sending,
    Sent,
    SendError,
}

/// Message content kind
///
/// Only the fields that matter for identity and window bookkeeping are kept
/// here; rendering detail lives with the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessageContent {
    Text {
        text: String,
    },
    Photo {
        width: u32,
        height: u32,
        caption: Option<String>,
    },
    File {
        name: String,
        size: u64,
        mime_type: String,
    },
    /// Service notice (member joined, title changed, ...)
    Service {
        text: String,
    },
}

/// A single message inside one conversation
///
/// Identity is `id` within the conversation; `dialog_id` is fixed for the
/// lifetime of a window. `day_key` is derived from `date` and groups the
/// message under its calendar-day separator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: i64,
    /// Unix seconds
    pub date: i32,
    pub dialog_id: i64,
    pub is_outgoing: bool,
    pub is_unread: bool,
    pub send_state: SendState,
    pub day_key: String,
    pub content: MessageContent,
}

impl MessageRecord {
    /// Build a record with its day key derived from `date`.
    pub fn new(
        id: i64,
        date: i32,
        dialog_id: i64,
        is_outgoing: bool,
        is_unread: bool,
        send_state: SendState,
        content: MessageContent,
    ) -> Self {
        Self {
            id,
            date,
            dialog_id,
            is_outgoing,
            is_unread,
            send_state,
            day_key: DayBucketIndex::bucket_for(date),
            content,
        }
    }
}

/// Server-provided fields merged into an existing record on remap or edit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagePatch {
    /// Replacement content, e.g. finalized media metadata after upload.
    pub content: Option<MessageContent>,
}

/// Which direction message ids grow in.
///
/// Server-confirmed ids are positive and ascending. The ephemeral
/// conversation variant keeps locally-generated negative ids that grow more
/// negative over time, so every comparison there runs the other way. The
/// mode is fixed when a window is opened and all id comparisons go through
/// these methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdOrderingMode {
    Ascending,
    EphemeralDescending,
}

impl IdOrderingMode {
    /// True if `candidate` is a later message than `than`.
    pub fn is_newer(self, candidate: i64, than: i64) -> bool {
        match self {
            IdOrderingMode::Ascending => candidate > than,
            IdOrderingMode::EphemeralDescending => candidate < than,
        }
    }

    /// True if `candidate` is an earlier message than `than`.
    pub fn is_older(self, candidate: i64, than: i64) -> bool {
        match self {
            IdOrderingMode::Ascending => candidate < than,
            IdOrderingMode::EphemeralDescending => candidate > than,
        }
    }

    /// Total order on ids, oldest first.
    pub fn cmp_ids(self, a: i64, b: i64) -> std::cmp::Ordering {
        match self {
            IdOrderingMode::Ascending => a.cmp(&b),
            IdOrderingMode::EphemeralDescending => b.cmp(&a),
        }
    }

    /// Whether an id counts toward cursor boundaries in this mode.
    ///
    /// Under ascending ids a negative id is a local placeholder awaiting its
    /// server id and must not move the loaded boundaries.
    pub fn observes(self, id: i64) -> bool {
        match self {
            IdOrderingMode::Ascending => id > 0,
            IdOrderingMode::EphemeralDescending => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascending_mode_orders_by_growing_ids() {
        let mode = IdOrderingMode::Ascending;
        assert!(mode.is_newer(10, 5));
        assert!(mode.is_older(5, 10));
        assert!(!mode.observes(-3));
    }

    #[test]
    fn ephemeral_mode_orders_by_shrinking_ids() {
        let mode = IdOrderingMode::EphemeralDescending;
        assert!(mode.is_newer(-20, -10));
        assert!(mode.is_older(-10, -20));
        assert!(mode.observes(-10));
    }

    #[test]
    fn record_derives_day_key_from_date() {
        let rec = MessageRecord::new(
            1,
            86_400,
            7,
            false,
            false,
            SendState::Sent,
            MessageContent::Text {
                text: "hi".to_string(),
            },
        );
        assert_eq!(rec.day_key, "1970-01-02");
    }
}
