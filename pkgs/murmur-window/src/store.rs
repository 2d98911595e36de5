//! In-memory message identity store for one conversation window

use std::collections::HashMap;
use tracing::debug;

use crate::error::WindowError;
use crate::records::{MessagePatch, MessageRecord, SendState};

/// Owns at most one record per message id.
///
/// Every incoming batch runs its ids through [`MessageStore::contains`]
/// before insertion; that gate is what keeps overlapping cache, remote, and
/// live deliveries from duplicating rows.
#[derive(Debug, Default)]
pub struct MessageStore {
    records: HashMap<i64, MessageRecord>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite by id.
    pub fn put(&mut self, record: MessageRecord) {
        self.records.insert(record.id, record);
    }

    pub fn get(&self, id: i64) -> Option<&MessageRecord> {
        self.records.get(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.records.contains_key(&id)
    }

    pub fn remove(&mut self, id: i64) -> Option<MessageRecord> {
        self.records.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.records.keys().copied()
    }

    /// Move a record to its server-confirmed id, merging server-provided
    /// fields and marking it sent. The caller updates row tables keyed by id.
    pub fn remap(
        &mut self,
        old_id: i64,
        new_id: i64,
        patch: &MessagePatch,
    ) -> Result<(), WindowError> {
        if self.records.contains_key(&new_id) {
            return Err(WindowError::InvariantViolation(format!(
                "remap target id {} already present",
                new_id
            )));
        }
        let mut record = self
            .records
            .remove(&old_id)
            .ok_or(WindowError::NotFound(old_id))?;
        record.id = new_id;
        record.send_state = SendState::Sent;
        if let Some(content) = patch.content.clone() {
            record.content = content;
        }
        self.records.insert(new_id, record);
        debug!("Remapped message {} -> {}", old_id, new_id);
        Ok(())
    }

    /// Apply a server-side edit in place.
    pub fn apply_edit(&mut self, id: i64, patch: &MessagePatch) -> Result<(), WindowError> {
        let record = self.records.get_mut(&id).ok_or(WindowError::NotFound(id))?;
        if let Some(content) = patch.content.clone() {
            record.content = content;
        }
        Ok(())
    }

    /// Delivery confirmed without an id change.
    pub fn mark_sent(&mut self, id: i64) -> Result<(), WindowError> {
        let record = self.records.get_mut(&id).ok_or(WindowError::NotFound(id))?;
        record.send_state = SendState::Sent;
        Ok(())
    }

    pub fn mark_send_error(&mut self, id: i64) -> Result<(), WindowError> {
        let record = self.records.get_mut(&id).ok_or(WindowError::NotFound(id))?;
        record.send_state = SendState::SendError;
        Ok(())
    }

    pub(crate) fn records_mut(&mut self) -> impl Iterator<Item = &mut MessageRecord> {
        self.records.values_mut()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::MessageContent;

    fn record(id: i64, state: SendState) -> MessageRecord {
        MessageRecord::new(
            id,
            1_000,
            7,
            true,
            false,
            state,
            MessageContent::Text {
                text: "hello".to_string(),
            },
        )
    }

    #[test]
    fn put_overwrites_by_id() {
        let mut store = MessageStore::new();
        store.put(record(1, SendState::Sending));
        store.put(record(1, SendState::Sent));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(1).unwrap().send_state, SendState::Sent);
    }

    #[test]
    fn remap_changes_the_key_and_marks_sent() {
        let mut store = MessageStore::new();
        store.put(record(-12, SendState::Sending));

        store.remap(-12, 900, &MessagePatch::default()).unwrap();
        assert!(store.get(-12).is_none());
        let remapped = store.get(900).unwrap();
        assert_eq!(remapped.id, 900);
        assert_eq!(remapped.send_state, SendState::Sent);
    }

    #[test]
    fn remap_of_unknown_id_is_not_found() {
        let mut store = MessageStore::new();
        assert!(matches!(
            store.remap(-1, 2, &MessagePatch::default()),
            Err(WindowError::NotFound(-1))
        ));
    }

    #[test]
    fn remap_onto_existing_id_is_rejected() {
        let mut store = MessageStore::new();
        store.put(record(-12, SendState::Sending));
        store.put(record(900, SendState::Sent));

        assert!(matches!(
            store.remap(-12, 900, &MessagePatch::default()),
            Err(WindowError::InvariantViolation(_))
        ));
        assert!(store.contains(-12));
    }

    #[test]
    fn edit_replaces_content_in_place() {
        let mut store = MessageStore::new();
        store.put(record(4, SendState::Sent));

        let patch = MessagePatch {
            content: Some(MessageContent::Text {
                text: "edited".to_string(),
            }),
        };
        store.apply_edit(4, &patch).unwrap();
        assert!(matches!(
            store.get(4).unwrap().content,
            MessageContent::Text { ref text } if text == "edited"
        ));
    }
}
