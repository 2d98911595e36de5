//! Murmur Window - conversation message window management
//!
//! This crate keeps an in-memory, partially-loaded, bidirectionally paged
//! view of one conversation's history in sync with a local cache, a remote
//! history source, and a live update stream, while preserving ordering,
//! uniqueness, and read boundaries under concurrent mutation.
//!
//! # Architecture
//!
//! The window is built from five components, all owned by one
//! [`SyncController`] per open conversation:
//!
//! - **MessageStore**: one record per message id; the de-duplication gate
//! - **DayBucketIndex**: calendar-day grouping behind the date separator rows
//! - **WindowSequence**: the ordered sequence of visible rows
//! - **PaginationCursor**: loaded boundaries and the end-of-history flags
//! - **UnreadMarker**: the single unread separator and its scroll target
//! - **SyncController**: the state machine that orchestrates cache-then-remote
//!   loading, seek chaining, and live-update merging across the other four
//!
//! # Key Behaviors
//!
//! - **Dedup**: overlapping cache, remote, and live deliveries merge
//!   commutatively; a message id is materialized at most once
//! - **Ordering**: rows are kept oldest to newest with one date separator
//!   per calendar day; the renderer indexes in reverse (0 = newest)
//! - **Pagination**: scroll observations near the loaded edges trigger at
//!   most one in-flight fetch per direction
//! - **Seek**: jump-to-message chains fetches toward the target until its
//!   page arrives or history runs out in that direction
//! - **Live edge**: new messages append directly only once the forward end
//!   is loaded; otherwise they only grow the pending-unread badge
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use murmur_window::{IdOrderingMode, SyncController, WindowConfig};
//! # use murmur_window::{Batch, FetchDirection, HistorySource, PersistentReadState};
//! # use async_trait::async_trait;
//! # struct Cache;
//! # #[async_trait]
//! # impl HistorySource for Cache {
//! #     async fn load(
//! #         &self,
//! #         _dialog_id: i64,
//! #         page_size: usize,
//! #         _anchor_id: Option<i64>,
//! #         _anchor_date: Option<i32>,
//! #         _direction: FetchDirection,
//! #         _prefer_cache: bool,
//! #     ) -> anyhow::Result<Batch> {
//! #         Ok(Batch::empty(page_size))
//! #     }
//! # }
//! # struct ReadLog;
//! # #[async_trait]
//! # impl PersistentReadState for ReadLog {
//! #     async fn mark_read(&self, _dialog_id: i64, _up_to_id: i64, _up_to_date: i32) {}
//! # }
//! # async fn example() {
//! let (mut window, _notices) = SyncController::open(
//!     42,
//!     IdOrderingMode::Ascending,
//!     WindowConfig::default(),
//!     Arc::new(Cache),
//!     Arc::new(ReadLog),
//!     None,
//! );
//! window.pump().await;
//! assert!(window.is_live());
//! # }
//! ```

pub mod controller;
pub mod cursor;
pub mod day_index;
pub mod error;
pub mod records;
pub mod sequence;
pub mod sources;
pub mod store;
pub mod unread;

pub use controller::{SyncController, SyncState, WindowNotice};
pub use cursor::PaginationCursor;
pub use day_index::DayBucketIndex;
pub use error::WindowError;
pub use records::{IdOrderingMode, MessageContent, MessagePatch, MessageRecord, SendState};
pub use sequence::{RowKind, RowRef, RowView, WindowSequence};
pub use sources::{
    Batch, FetchDirection, HistorySource, LiveUpdateSource, PersistentReadState, UpdateEvent,
};
pub use store::MessageStore;
pub use unread::UnreadMarker;

/// Configuration for one conversation window
#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// Rows requested per history page (default: 20)
    pub page_size: usize,

    /// Rows requested when reloading an emptied window (default: 30)
    pub reload_page_size: usize,

    /// Rows of headroom above the viewport before an older page is
    /// requested (default: 10)
    pub backward_lookahead: usize,

    /// Rows of headroom below the viewport before a newer page is
    /// requested (default: 6)
    pub forward_lookahead: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            reload_page_size: 30,
            backward_lookahead: 10,
            forward_lookahead: 6,
        }
    }
}
