//! Calendar-day buckets backing the date separator rows

use chrono::{DateTime, Utc};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::sequence::RowRef;

/// Per-day membership of loaded messages, plus each day's separator row.
///
/// The window shows one `DateSeparator` row per distinct calendar day. The
/// index tracks which message ids belong to which day so that a removal
/// emptying a day can take the separator row down in the same step.
#[derive(Debug, Default)]
pub struct DayBucketIndex {
    buckets: HashMap<String, DayBucket>,
}

#[derive(Debug, Default)]
struct DayBucket {
    message_ids: HashSet<i64>,
    separator: Option<RowRef>,
}

impl DayBucketIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calendar-day key for a unix timestamp, UTC.
    pub fn bucket_for(date: i32) -> String {
        DateTime::<Utc>::from_timestamp(i64::from(date), 0)
            .unwrap_or_default()
            .format("%Y-%m-%d")
            .to_string()
    }

    /// Label shown on the day's separator row.
    pub fn label_for(date: i32) -> String {
        DateTime::<Utc>::from_timestamp(i64::from(date), 0)
            .unwrap_or_default()
            .format("%B %-d")
            .to_string()
    }

    /// Record a message under its day. Returns true when the day was not
    /// present before, meaning the caller owes the window a separator row.
    pub fn insert(&mut self, day_key: &str, id: i64) -> bool {
        match self.buckets.entry(day_key.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().message_ids.insert(id);
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(DayBucket::default()).message_ids.insert(id);
                true
            }
        }
    }

    /// Drop a message from its day. When the day empties, the bucket is
    /// discarded and its separator row handle is returned for removal.
    pub fn remove(&mut self, day_key: &str, id: i64) -> Option<RowRef> {
        let Some(bucket) = self.buckets.get_mut(day_key) else {
            warn!("Removal for unknown day bucket {}", day_key);
            return None;
        };
        bucket.message_ids.remove(&id);
        if bucket.message_ids.is_empty() {
            self.buckets.remove(day_key).and_then(|bucket| bucket.separator)
        } else {
            None
        }
    }

    pub fn is_empty(&self, day_key: &str) -> bool {
        self.buckets
            .get(day_key)
            .map_or(true, |bucket| bucket.message_ids.is_empty())
    }

    pub fn contains_day(&self, day_key: &str) -> bool {
        self.buckets.contains_key(day_key)
    }

    /// Attach the day's separator row.
    pub fn set_separator(&mut self, day_key: &str, row: RowRef) {
        self.buckets.entry(day_key.to_string()).or_default().separator = Some(row);
    }

    pub fn separator(&self, day_key: &str) -> Option<RowRef> {
        self.buckets.get(day_key).and_then(|bucket| bucket.separator)
    }

    /// Detach and return the day's separator row, e.g. to re-seat it at the
    /// start of an older batch of the same day.
    pub fn take_separator(&mut self, day_key: &str) -> Option<RowRef> {
        self.buckets
            .get_mut(day_key)
            .and_then(|bucket| bucket.separator.take())
    }

    /// Swap a message's id inside its day, keeping membership consistent
    /// across a server id remap.
    pub fn rekey(&mut self, day_key: &str, old_id: i64, new_id: i64) {
        if let Some(bucket) = self.buckets.get_mut(day_key) {
            if bucket.message_ids.remove(&old_id) {
                bucket.message_ids.insert(new_id);
            }
        }
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}
