//! External collaborator seams: history loading, live updates, read state

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::records::{MessagePatch, MessageRecord};

/// Which way a history request walks from its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchDirection {
    /// First page for a window: the newest page, or the page around a
    /// jump-to target.
    Initial,
    /// Older than the anchor.
    Backward,
    /// Newer than the anchor.
    Forward,
}

/// One page of history from the cache or the remote source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub records: Vec<MessageRecord>,
    /// True when served from the local cache rather than the remote source.
    pub is_cache: bool,
    /// The page size the request asked for.
    pub requested_count: usize,
    /// Oldest unread inbound message, when the source knows the boundary.
    pub first_unread_id: Option<i64>,
    /// Newest id the source knows of for the conversation, loaded or not.
    pub newest_known_id: Option<i64>,
}

impl Batch {
    pub fn empty(requested_count: usize) -> Self {
        Self {
            records: Vec::new(),
            is_cache: false,
            requested_count,
            first_unread_id: None,
            newest_known_id: None,
        }
    }
}

/// Cache-then-remote page loader.
///
/// Implementations run on their own workers; results come back to the
/// window's owner task before any component is touched.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn load(
        &self,
        dialog_id: i64,
        page_size: usize,
        anchor_id: Option<i64>,
        anchor_date: Option<i32>,
        direction: FetchDirection,
        prefer_cache: bool,
    ) -> Result<Batch>;
}

/// A change pushed from the live edge of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UpdateEvent {
    NewMessages {
        records: Vec<MessageRecord>,
    },
    /// A locally-sent message received its server-confirmed id.
    Remap {
        old_id: i64,
        new_id: i64,
        patch: MessagePatch,
    },
    /// Delivery confirmed without an id change.
    Acknowledged {
        id: i64,
    },
    SendFailed {
        id: i64,
    },
    Deleted {
        ids: Vec<i64>,
    },
    Edited {
        id: i64,
        patch: MessagePatch,
    },
    /// The conversation was read up to this id, e.g. on another device.
    ReadBoundaryAdvanced {
        up_to_id: i64,
    },
    /// The whole history was purged.
    HistoryCleared,
}

/// Push feed of live updates for one conversation.
pub trait LiveUpdateSource: Send + Sync {
    fn subscribe(&self, dialog_id: i64) -> mpsc::UnboundedReceiver<UpdateEvent>;
}

/// Fire-and-forget read receipts.
#[async_trait]
pub trait PersistentReadState: Send + Sync {
    async fn mark_read(&self, dialog_id: i64, up_to_id: i64, up_to_date: i32);
}
