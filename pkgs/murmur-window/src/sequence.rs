//! Ordered row sequence for the visible window

use std::collections::HashMap;

use crate::records::MessageRecord;

/// Stable handle to a row, valid until the row is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowRef(u64);

#[cfg(test)]
impl RowRef {
    pub(crate) fn test_ref(raw: u64) -> Self {
        RowRef(raw)
    }
}

/// One rendering unit in the window.
#[derive(Debug, Clone, PartialEq)]
pub enum RowKind {
    Message(i64),
    DateSeparator { day_key: String, label: String },
    UnreadSeparator,
}

/// Renderer-facing view of a row.
#[derive(Debug)]
pub enum RowView<'a> {
    Message(&'a MessageRecord),
    DateSeparator { day_key: &'a str, label: &'a str },
    UnreadSeparator,
}

/// Rows kept oldest to newest; the renderer indexes in reverse, so index 0
/// is the most recent row.
#[derive(Debug, Default)]
pub struct WindowSequence {
    rows: Vec<(RowRef, RowKind)>,
    by_message: HashMap<i64, RowRef>,
    next_ref: u64,
}

impl WindowSequence {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint(&mut self) -> RowRef {
        self.next_ref += 1;
        RowRef(self.next_ref)
    }

    fn register(&mut self, row: RowRef, kind: &RowKind) {
        if let RowKind::Message(id) = kind {
            self.by_message.insert(*id, row);
        }
    }

    fn unregister(&mut self, kind: &RowKind) {
        if let RowKind::Message(id) = kind {
            self.by_message.remove(id);
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of message rows, excluding separators.
    pub fn message_count(&self) -> usize {
        self.by_message.len()
    }

    /// Insert older rows at the head, preserving their relative order.
    pub fn prepend(&mut self, kinds: Vec<RowKind>) -> Vec<RowRef> {
        let mut fresh = Vec::with_capacity(kinds.len());
        for (offset, kind) in kinds.into_iter().enumerate() {
            let row = self.mint();
            self.register(row, &kind);
            self.rows.insert(offset, (row, kind));
            fresh.push(row);
        }
        fresh
    }

    /// Append newer rows at the tail.
    pub fn append(&mut self, kinds: Vec<RowKind>) -> Vec<RowRef> {
        kinds.into_iter().map(|kind| self.append_one(kind)).collect()
    }

    pub fn append_one(&mut self, kind: RowKind) -> RowRef {
        let row = self.mint();
        self.register(row, &kind);
        self.rows.push((row, kind));
        row
    }

    /// Insert immediately before the newest row, or at the tail of an empty
    /// window.
    pub fn insert_before_tail(&mut self, kind: RowKind) -> RowRef {
        let row = self.mint();
        self.register(row, &kind);
        let at = self.rows.len().saturating_sub(1);
        self.rows.insert(at, (row, kind));
        row
    }

    pub fn insert_before(&mut self, anchor: RowRef, kind: RowKind) -> Option<RowRef> {
        let at = self.index_of(anchor)?;
        let row = self.mint();
        self.register(row, &kind);
        self.rows.insert(at, (row, kind));
        Some(row)
    }

    pub fn remove(&mut self, row: RowRef) -> Option<RowKind> {
        let at = self.index_of(row)?;
        let (_, kind) = self.rows.remove(at);
        self.unregister(&kind);
        Some(kind)
    }

    /// Swap a row's payload without moving it; the handle stays valid.
    pub fn replace(&mut self, row: RowRef, kind: RowKind) -> bool {
        let Some(at) = self.index_of(row) else {
            return false;
        };
        if let RowKind::Message(id) = self.rows[at].1 {
            self.by_message.remove(&id);
        }
        if let RowKind::Message(id) = &kind {
            self.by_message.insert(*id, row);
        }
        self.rows[at].1 = kind;
        true
    }

    /// Position counted from the oldest row.
    pub fn index_of(&self, row: RowRef) -> Option<usize> {
        self.rows.iter().position(|(candidate, _)| *candidate == row)
    }

    /// Renderer index, 0 = newest.
    pub fn reverse_index_of(&self, row: RowRef) -> Option<usize> {
        self.index_of(row).map(|at| self.rows.len() - 1 - at)
    }

    pub fn row_at_reverse(&self, reverse_index: usize) -> Option<(RowRef, &RowKind)> {
        if reverse_index >= self.rows.len() {
            return None;
        }
        let at = self.rows.len() - 1 - reverse_index;
        self.rows.get(at).map(|(row, kind)| (*row, kind))
    }

    /// Row handle of a message by its id.
    pub fn message_ref(&self, id: i64) -> Option<RowRef> {
        self.by_message.get(&id).copied()
    }

    pub fn kind(&self, row: RowRef) -> Option<&RowKind> {
        self.index_of(row).map(|at| &self.rows[at].1)
    }

    /// Rows oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = (RowRef, &RowKind)> {
        self.rows.iter().map(|(row, kind)| (*row, kind))
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.by_message.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepend_keeps_batch_order_ahead_of_existing_rows() {
        let mut sequence = WindowSequence::new();
        sequence.append(vec![RowKind::Message(10), RowKind::Message(11)]);
        sequence.prepend(vec![RowKind::Message(1), RowKind::Message(2)]);

        let ids: Vec<i64> = sequence
            .iter()
            .filter_map(|(_, kind)| match kind {
                RowKind::Message(id) => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 10, 11]);
    }

    #[test]
    fn reverse_indexing_starts_at_the_newest_row() {
        let mut sequence = WindowSequence::new();
        sequence.append(vec![RowKind::Message(1), RowKind::Message(2)]);

        let (_, newest) = sequence.row_at_reverse(0).unwrap();
        assert_eq!(newest, &RowKind::Message(2));
        let (_, oldest) = sequence.row_at_reverse(1).unwrap();
        assert_eq!(oldest, &RowKind::Message(1));
        assert!(sequence.row_at_reverse(2).is_none());
    }

    #[test]
    fn insert_before_tail_lands_ahead_of_the_newest_row() {
        let mut sequence = WindowSequence::new();
        sequence.append(vec![RowKind::Message(1), RowKind::Message(2)]);
        sequence.insert_before_tail(RowKind::UnreadSeparator);

        let (_, kind) = sequence.row_at_reverse(1).unwrap();
        assert_eq!(kind, &RowKind::UnreadSeparator);
    }

    #[test]
    fn replace_keeps_position_and_updates_the_id_table() {
        let mut sequence = WindowSequence::new();
        sequence.append(vec![RowKind::Message(1), RowKind::Message(-5), RowKind::Message(3)]);
        let row = sequence.message_ref(-5).unwrap();

        assert!(sequence.replace(row, RowKind::Message(42)));
        assert_eq!(sequence.index_of(row), Some(1));
        assert_eq!(sequence.kind(row), Some(&RowKind::Message(42)));
        assert_eq!(sequence.message_ref(42), Some(row));
        assert_eq!(sequence.message_ref(-5), None);
    }

    #[test]
    fn remove_drops_the_id_table_entry() {
        let mut sequence = WindowSequence::new();
        sequence.append(vec![RowKind::Message(1)]);
        let row = sequence.message_ref(1).unwrap();

        assert_eq!(sequence.remove(row), Some(RowKind::Message(1)));
        assert_eq!(sequence.message_ref(1), None);
        assert!(sequence.is_empty());
        assert_eq!(sequence.remove(row), None);
    }
}
