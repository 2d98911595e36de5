//! Unread separator and scroll-target bookkeeping

use tracing::debug;

use crate::sequence::RowRef;

/// The single unread separator row and the row the view should settle on.
///
/// A marker is established at most once per read/unread boundary and the
/// scroll target is handed out exactly once. Once a boundary has been
/// consumed it is never recreated.
#[derive(Debug, Default)]
pub struct UnreadMarker {
    separator_row: Option<RowRef>,
    scroll_target: Option<RowRef>,
    center_on_screen: bool,
    last_boundary: Option<i64>,
}

impl UnreadMarker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the marker for a boundary. Ignored while a marker is live or
    /// when the boundary was already seen; the first target stays.
    pub fn establish(
        &mut self,
        boundary_id: i64,
        separator_row: RowRef,
        scroll_target: RowRef,
        center_on_screen: bool,
    ) -> bool {
        if self.is_live() || self.last_boundary == Some(boundary_id) {
            debug!("Ignoring repeat unread marker for boundary {}", boundary_id);
            return false;
        }
        self.separator_row = Some(separator_row);
        self.scroll_target = Some(scroll_target);
        self.center_on_screen = center_on_screen;
        self.last_boundary = Some(boundary_id);
        true
    }

    /// Hand out the scroll target, once.
    pub fn consume(&mut self) -> Option<RowRef> {
        self.scroll_target.take()
    }

    pub fn is_live(&self) -> bool {
        self.separator_row.is_some()
    }

    pub fn separator_row(&self) -> Option<RowRef> {
        self.separator_row
    }

    pub fn scroll_target(&self) -> Option<RowRef> {
        self.scroll_target
    }

    pub fn center_on_screen(&self) -> bool {
        self.center_on_screen
    }

    /// Tear the marker down; returns the separator row so the caller can
    /// drop it from the sequence.
    pub fn clear(&mut self) -> Option<RowRef> {
        self.scroll_target = None;
        self.center_on_screen = false;
        self.separator_row.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn establish_fires_once_per_boundary() {
        let mut marker = UnreadMarker::new();
        assert!(marker.establish(10, RowRef::test_ref(1), RowRef::test_ref(2), true));
        assert!(!marker.establish(11, RowRef::test_ref(3), RowRef::test_ref(4), true));

        assert_eq!(marker.scroll_target(), Some(RowRef::test_ref(2)));
        assert_eq!(marker.separator_row(), Some(RowRef::test_ref(1)));
        assert!(marker.center_on_screen());
    }

    #[test]
    fn consume_hands_out_the_target_exactly_once() {
        let mut marker = UnreadMarker::new();
        marker.establish(10, RowRef::test_ref(1), RowRef::test_ref(2), false);

        assert_eq!(marker.consume(), Some(RowRef::test_ref(2)));
        assert_eq!(marker.consume(), None);
        assert!(marker.is_live());
    }

    #[test]
    fn a_consumed_boundary_is_never_recreated() {
        let mut marker = UnreadMarker::new();
        marker.establish(10, RowRef::test_ref(1), RowRef::test_ref(2), false);
        marker.clear();

        assert!(!marker.establish(10, RowRef::test_ref(3), RowRef::test_ref(4), false));
        assert!(marker.establish(20, RowRef::test_ref(5), RowRef::test_ref(6), false));
    }
}
