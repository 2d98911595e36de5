//! Pagination boundaries and fetch gating

use tracing::debug;

use crate::records::{IdOrderingMode, MessageRecord};
use crate::sources::FetchDirection;

/// Boundary ids and dates of the loaded window, plus the end-of-history
/// flags that gate further fetches.
///
/// A short batch normally marks its direction exhausted, but a short batch
/// served from the cache only exhausts the cache: history is exhausted once
/// the remote source comes up short. The ephemeral id mode has no remote
/// source behind the cache, so there the cache's word is final.
#[derive(Debug)]
pub struct PaginationCursor {
    mode: IdOrderingMode,
    backward_lookahead: usize,
    forward_lookahead: usize,
    max_message_id: Option<i64>,
    min_message_id: Option<i64>,
    max_date: Option<i32>,
    min_date: Option<i32>,
    backward_end_reached: bool,
    forward_end_reached: bool,
    cache_end_reached: bool,
}

impl PaginationCursor {
    pub fn new(mode: IdOrderingMode, backward_lookahead: usize, forward_lookahead: usize) -> Self {
        Self {
            mode,
            backward_lookahead,
            forward_lookahead,
            max_message_id: None,
            min_message_id: None,
            max_date: None,
            min_date: None,
            backward_end_reached: false,
            forward_end_reached: false,
            cache_end_reached: false,
        }
    }

    /// Widen the loaded boundaries over a merged batch. Local placeholder
    /// ids that do not participate in ordering are skipped.
    pub fn observe_batch(&mut self, records: &[MessageRecord]) {
        for record in records {
            if !self.mode.observes(record.id) {
                continue;
            }
            self.max_message_id = Some(match self.max_message_id {
                Some(current) if self.mode.is_newer(current, record.id) => current,
                _ => record.id,
            });
            self.min_message_id = Some(match self.min_message_id {
                Some(current) if self.mode.is_older(current, record.id) => current,
                _ => record.id,
            });
            self.max_date = Some(self.max_date.map_or(record.date, |date| date.max(record.date)));
            self.min_date = Some(self.min_date.map_or(record.date, |date| date.min(record.date)));
        }
    }

    /// Apply the short-batch rule after a merge.
    pub fn finish_batch(
        &mut self,
        direction: FetchDirection,
        received: usize,
        requested: usize,
        from_cache: bool,
    ) {
        if received >= requested {
            return;
        }
        match direction {
            FetchDirection::Forward => {
                self.forward_end_reached = true;
            }
            FetchDirection::Initial | FetchDirection::Backward => {
                if from_cache && self.mode == IdOrderingMode::Ascending {
                    self.cache_end_reached = true;
                    debug!("Cache exhausted after short batch ({}/{})", received, requested);
                } else {
                    self.backward_end_reached = true;
                    debug!("History exhausted after short batch ({}/{})", received, requested);
                }
            }
        }
    }

    /// True when the viewport's top edge is close enough to the oldest
    /// loaded row to warrant fetching an older page. Indexes are reverse
    /// (0 = newest), so the top edge carries the highest index.
    pub fn should_fetch_backward(&self, visible_top_index: usize, row_count: usize) -> bool {
        if self.backward_end_reached || row_count == 0 {
            return false;
        }
        row_count - 1 - visible_top_index.min(row_count - 1) <= self.backward_lookahead
    }

    /// Symmetric check at the bottom edge of the viewport.
    pub fn should_fetch_forward(&self, visible_bottom_index: usize) -> bool {
        !self.forward_end_reached && visible_bottom_index <= self.forward_lookahead
    }

    pub fn max_message_id(&self) -> Option<i64> {
        self.max_message_id
    }

    pub fn min_message_id(&self) -> Option<i64> {
        self.min_message_id
    }

    pub fn max_date(&self) -> Option<i32> {
        self.max_date
    }

    pub fn min_date(&self) -> Option<i32> {
        self.min_date
    }

    pub fn backward_end_reached(&self) -> bool {
        self.backward_end_reached
    }

    pub fn forward_end_reached(&self) -> bool {
        self.forward_end_reached
    }

    pub fn cache_end_reached(&self) -> bool {
        self.cache_end_reached
    }

    pub fn set_backward_end(&mut self, reached: bool) {
        self.backward_end_reached = reached;
    }

    pub fn set_forward_end(&mut self, reached: bool) {
        self.forward_end_reached = reached;
    }

    /// Back to the unbounded sentinel state, keeping mode and margins.
    pub fn reset(&mut self) {
        self.max_message_id = None;
        self.min_message_id = None;
        self.max_date = None;
        self.min_date = None;
        self.backward_end_reached = false;
        self.forward_end_reached = false;
        self.cache_end_reached = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{MessageContent, SendState};

    fn record(id: i64, date: i32) -> MessageRecord {
        MessageRecord::new(
            id,
            date,
            7,
            false,
            false,
            SendState::Sent,
            MessageContent::Text {
                text: "x".to_string(),
            },
        )
    }

    #[test]
    fn boundaries_widen_monotonically_across_merges() {
        let mut cursor = PaginationCursor::new(IdOrderingMode::Ascending, 10, 6);
        cursor.observe_batch(&[record(50, 500), record(60, 600)]);
        assert_eq!(cursor.min_message_id(), Some(50));
        assert_eq!(cursor.max_message_id(), Some(60));

        cursor.observe_batch(&[record(40, 400)]);
        assert_eq!(cursor.min_message_id(), Some(40));
        assert_eq!(cursor.max_message_id(), Some(60));
        assert_eq!(cursor.min_date(), Some(400));
        assert_eq!(cursor.max_date(), Some(600));
    }

    #[test]
    fn ephemeral_boundaries_run_the_other_way() {
        let mut cursor = PaginationCursor::new(IdOrderingMode::EphemeralDescending, 10, 6);
        cursor.observe_batch(&[record(-10, 500), record(-20, 600)]);
        assert_eq!(cursor.min_message_id(), Some(-10));
        assert_eq!(cursor.max_message_id(), Some(-20));
    }

    #[test]
    fn local_placeholder_ids_do_not_move_boundaries() {
        let mut cursor = PaginationCursor::new(IdOrderingMode::Ascending, 10, 6);
        cursor.observe_batch(&[record(50, 500), record(-3, 900)]);
        assert_eq!(cursor.max_message_id(), Some(50));
        assert_eq!(cursor.max_date(), Some(500));
    }

    #[test]
    fn short_cache_batch_exhausts_the_cache_not_history() {
        let mut cursor = PaginationCursor::new(IdOrderingMode::Ascending, 10, 6);
        cursor.finish_batch(FetchDirection::Backward, 5, 20, true);
        assert!(!cursor.backward_end_reached());
        assert!(cursor.cache_end_reached());

        cursor.finish_batch(FetchDirection::Backward, 5, 20, false);
        assert!(cursor.backward_end_reached());
    }

    #[test]
    fn ephemeral_cache_is_authoritative() {
        let mut cursor = PaginationCursor::new(IdOrderingMode::EphemeralDescending, 10, 6);
        cursor.finish_batch(FetchDirection::Backward, 5, 20, true);
        assert!(cursor.backward_end_reached());
    }

    #[test]
    fn short_forward_batch_reaches_the_live_edge() {
        let mut cursor = PaginationCursor::new(IdOrderingMode::Ascending, 10, 6);
        cursor.finish_batch(FetchDirection::Forward, 0, 20, false);
        assert!(cursor.forward_end_reached());
    }

    #[test]
    fn lookahead_margins_gate_fetches() {
        let mut cursor = PaginationCursor::new(IdOrderingMode::Ascending, 10, 6);
        assert!(cursor.should_fetch_backward(95, 100));
        assert!(!cursor.should_fetch_backward(50, 100));
        assert!(cursor.should_fetch_forward(6));
        assert!(!cursor.should_fetch_forward(7));

        cursor.set_backward_end(true);
        cursor.set_forward_end(true);
        assert!(!cursor.should_fetch_backward(95, 100));
        assert!(!cursor.should_fetch_forward(0));
    }
}
