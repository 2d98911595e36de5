//! Window sync controller - reconciles cache, remote, and live updates

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::cursor::PaginationCursor;
use crate::day_index::DayBucketIndex;
use crate::error::WindowError;
use crate::records::{IdOrderingMode, MessagePatch, MessageRecord, SendState};
use crate::sequence::{RowKind, RowRef, RowView, WindowSequence};
use crate::sources::{
    Batch, FetchDirection, HistorySource, LiveUpdateSource, PersistentReadState, UpdateEvent,
};
use crate::store::MessageStore;
use crate::unread::UnreadMarker;
use crate::WindowConfig;

/// Externally visible loading state of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    LoadingInitial,
    LoadingBackward,
    LoadingForward,
    Live,
}

/// Change notification for the renderer, emitted once per merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowNotice {
    Changed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    LoadingInitial,
    Live,
}

#[derive(Debug, Clone, Copy)]
enum Placement {
    Prepend,
    Append,
}

#[derive(Debug, Clone, Copy)]
struct Seek {
    target_id: i64,
}

#[derive(Debug)]
struct FetchCompletion {
    generation: u64,
    direction: FetchDirection,
    result: anyhow::Result<Batch>,
}

/// One conversation window: the ordered, de-duplicated, bidirectionally
/// paged view of a dialog's history.
///
/// All five window components live here and are owned by one task. History
/// fetches run in spawned tasks and report back through an internal channel
/// tagged with a generation token, so results for a closed or reloaded
/// window are discarded instead of merged.
pub struct SyncController<H, R>
where
    H: HistorySource + 'static,
    R: PersistentReadState + 'static,
{
    dialog_id: i64,
    mode: IdOrderingMode,
    config: WindowConfig,
    history: Arc<H>,
    read_state: Arc<R>,

    // Window state
    store: MessageStore,
    days: DayBucketIndex,
    sequence: WindowSequence,
    cursor: PaginationCursor,
    unread: UnreadMarker,

    // State machine
    phase: Phase,
    generation: u64,
    backward_in_flight: bool,
    forward_in_flight: bool,
    initial_failures: u8,
    backward_failures: u8,
    forward_failures: u8,
    seek: Option<Seek>,

    // Live edge bookkeeping
    newest_known_id: Option<i64>,
    pending_unread: HashSet<i64>,
    foreground: bool,
    pending_read_mark: Option<(i64, i32)>,
    pending_scroll: Option<RowRef>,

    // Channels
    completion_tx: mpsc::UnboundedSender<FetchCompletion>,
    completion_rx: mpsc::UnboundedReceiver<FetchCompletion>,
    live_rx: Option<mpsc::UnboundedReceiver<UpdateEvent>>,
    notice_tx: mpsc::UnboundedSender<WindowNotice>,
}

impl<H, R> SyncController<H, R>
where
    H: HistorySource + 'static,
    R: PersistentReadState + 'static,
{
    /// Open a window onto a conversation and issue the first page request.
    ///
    /// When `jump_to` names a message id, loading keeps chaining fetches
    /// toward that id until its page arrives or history runs out in that
    /// direction.
    pub fn open(
        dialog_id: i64,
        mode: IdOrderingMode,
        config: WindowConfig,
        history: Arc<H>,
        read_state: Arc<R>,
        jump_to: Option<i64>,
    ) -> (Self, mpsc::UnboundedReceiver<WindowNotice>) {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let cursor = PaginationCursor::new(mode, config.backward_lookahead, config.forward_lookahead);
        let mut controller = Self {
            dialog_id,
            mode,
            config,
            history,
            read_state,
            store: MessageStore::new(),
            days: DayBucketIndex::new(),
            sequence: WindowSequence::new(),
            cursor,
            unread: UnreadMarker::new(),
            phase: Phase::LoadingInitial,
            generation: 1,
            backward_in_flight: false,
            forward_in_flight: false,
            initial_failures: 0,
            backward_failures: 0,
            forward_failures: 0,
            seek: jump_to.map(|target_id| Seek { target_id }),
            newest_known_id: None,
            pending_unread: HashSet::new(),
            foreground: true,
            pending_read_mark: None,
            pending_scroll: None,
            completion_tx,
            completion_rx,
            live_rx: None,
            notice_tx,
        };
        info!("Opening message window for dialog {}", dialog_id);
        let page_size = controller.config.page_size;
        let prefer_cache = controller.prefer_cache();
        controller.spawn_fetch(FetchDirection::Initial, jump_to, None, page_size, prefer_cache);
        (controller, notice_rx)
    }

    /// Hook the live update feed up to this window.
    pub fn attach_live<L: LiveUpdateSource>(&mut self, source: &L) {
        self.live_rx = Some(source.subscribe(self.dialog_id));
    }

    /// Apply the next fetch completion, then everything already queued.
    /// Live updates delivered in the meantime are merged in receipt order.
    pub async fn pump(&mut self) {
        self.drain_live();
        let completion = self.completion_rx.recv().await;
        if let Some(done) = completion {
            self.handle_completion(done);
        }
        while let Ok(done) = self.completion_rx.try_recv() {
            self.handle_completion(done);
        }
        self.drain_live();
    }

    /// Run pending fetches to quiescence.
    pub async fn settle(&mut self) {
        while self.backward_in_flight || self.forward_in_flight || self.phase == Phase::LoadingInitial
        {
            self.pump().await;
        }
    }

    /// Merge live updates already delivered, in receipt order.
    pub fn drain_live(&mut self) {
        let mut events = Vec::new();
        if let Some(rx) = self.live_rx.as_mut() {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }
        for event in events {
            self.apply_update(event);
        }
    }

    /// Merge one live update. Accepted in any state except after close;
    /// these represent the authoritative live edge and never wait on an
    /// in-flight fetch.
    pub fn apply_update(&mut self, event: UpdateEvent) {
        if self.phase == Phase::Idle {
            debug!("Ignoring live update for closed window");
            return;
        }
        match event {
            UpdateEvent::NewMessages { records } => self.apply_new_messages(records),
            UpdateEvent::Remap {
                old_id,
                new_id,
                patch,
            } => self.apply_remap(old_id, new_id, patch),
            UpdateEvent::Acknowledged { id } => match self.store.mark_sent(id) {
                Ok(()) => self.notify_changed(),
                Err(err) => warn!("Dropping ack: {}", err),
            },
            UpdateEvent::SendFailed { id } => match self.store.mark_send_error(id) {
                Ok(()) => self.notify_changed(),
                Err(err) => warn!("Dropping send failure: {}", err),
            },
            UpdateEvent::Deleted { ids } => self.apply_deletions(&ids),
            UpdateEvent::Edited { id, patch } => match self.store.apply_edit(id, &patch) {
                Ok(()) => self.notify_changed(),
                Err(err) => warn!("Dropping edit: {}", err),
            },
            UpdateEvent::ReadBoundaryAdvanced { up_to_id } => self.apply_read_boundary(up_to_id),
            UpdateEvent::HistoryCleared => self.apply_history_cleared(),
        }
    }

    /// Scroll-position observation from the renderer; may trigger a fetch.
    /// Indexes are reverse (0 = newest), so the top edge carries the larger
    /// index. At most one fetch per direction is in flight.
    pub fn observe_scroll(&mut self, visible_top_index: usize, visible_bottom_index: usize) {
        if self.phase != Phase::Live {
            return;
        }
        let row_count = self.sequence.len();
        if row_count == 0 {
            return;
        }
        if self.cursor.should_fetch_backward(visible_top_index, row_count)
            && !self.backward_in_flight
            && self.backward_failures < 2
        {
            let anchor_id = self.cursor.min_message_id();
            let anchor_date = self.cursor.min_date();
            let prefer_cache = self.prefer_cache();
            self.spawn_fetch(
                FetchDirection::Backward,
                anchor_id,
                anchor_date,
                self.config.page_size,
                prefer_cache,
            );
        }
        if self.cursor.should_fetch_forward(visible_bottom_index)
            && !self.forward_in_flight
            && self.forward_failures < 2
        {
            let anchor_id = self.cursor.max_message_id();
            let anchor_date = self.cursor.max_date();
            let prefer_cache = self.mode == IdOrderingMode::EphemeralDescending;
            self.spawn_fetch(
                FetchDirection::Forward,
                anchor_id,
                anchor_date,
                self.config.page_size,
                prefer_cache,
            );
        }
    }

    /// Whether read receipts may fire; while backgrounded they are deferred
    /// until the next foreground transition.
    pub fn set_foreground(&mut self, foreground: bool) {
        self.foreground = foreground;
        if foreground {
            if let Some((up_to_id, up_to_date)) = self.pending_read_mark.take() {
                self.fire_read_mark(up_to_id, up_to_date);
            }
        }
    }

    /// Tear the window down. In-flight fetch results are discarded by the
    /// generation token; nothing is persisted.
    pub fn close(&mut self) {
        info!("Closing message window for dialog {}", self.dialog_id);
        self.cancel_in_flight();
        self.reset_window_state();
        self.pending_unread.clear();
        self.pending_read_mark = None;
        self.newest_known_id = None;
        self.phase = Phase::Idle;
    }

    // ---- Renderer surface ----

    pub fn visible_row_count(&self) -> usize {
        self.sequence.len()
    }

    /// Renderer row lookup; index 0 is the newest row.
    pub fn row_at(&self, reverse_index: usize) -> Option<RowView<'_>> {
        let (_, kind) = self.sequence.row_at_reverse(reverse_index)?;
        match kind {
            RowKind::Message(id) => match self.store.get(*id) {
                Some(record) => Some(RowView::Message(record)),
                None => {
                    error!("Row references missing message {}", id);
                    None
                }
            },
            RowKind::DateSeparator { day_key, label } => {
                Some(RowView::DateSeparator { day_key, label })
            }
            RowKind::UnreadSeparator => Some(RowView::UnreadSeparator),
        }
    }

    pub fn request_scroll_to(&mut self, row: RowRef) {
        self.pending_scroll = Some(row);
    }

    /// Row the view should settle on, handed out once per request.
    pub fn take_scroll_target(&mut self) -> Option<RowRef> {
        self.pending_scroll.take().or_else(|| self.unread.consume())
    }

    pub fn state(&self) -> SyncState {
        match self.phase {
            Phase::Idle => SyncState::Idle,
            Phase::LoadingInitial => SyncState::LoadingInitial,
            Phase::Live if self.backward_in_flight => SyncState::LoadingBackward,
            Phase::Live if self.forward_in_flight => SyncState::LoadingForward,
            Phase::Live => SyncState::Live,
        }
    }

    pub fn is_live(&self) -> bool {
        self.phase == Phase::Live
    }

    pub fn mode(&self) -> IdOrderingMode {
        self.mode
    }

    /// Unread inbound messages known beyond the loaded window, for the
    /// pagedown badge.
    pub fn unread_to_load(&self) -> usize {
        self.pending_unread.len()
    }

    pub fn newest_known_id(&self) -> Option<i64> {
        self.newest_known_id
    }

    pub fn cursor(&self) -> &PaginationCursor {
        &self.cursor
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn rows(&self) -> &WindowSequence {
        &self.sequence
    }

    pub fn unread_marker(&self) -> &UnreadMarker {
        &self.unread
    }

    // ---- Fetch plumbing ----

    fn prefer_cache(&self) -> bool {
        self.mode == IdOrderingMode::EphemeralDescending || !self.cursor.cache_end_reached()
    }

    fn spawn_fetch(
        &mut self,
        direction: FetchDirection,
        anchor_id: Option<i64>,
        anchor_date: Option<i32>,
        page_size: usize,
        prefer_cache: bool,
    ) {
        match direction {
            FetchDirection::Backward => self.backward_in_flight = true,
            FetchDirection::Forward => self.forward_in_flight = true,
            FetchDirection::Initial => {}
        }
        let history = Arc::clone(&self.history);
        let tx = self.completion_tx.clone();
        let generation = self.generation;
        let dialog_id = self.dialog_id;
        debug!(
            "Requesting {:?} page of {} for dialog {} (anchor {:?}, cache {})",
            direction, page_size, dialog_id, anchor_id, prefer_cache
        );
        tokio::spawn(async move {
            let result = history
                .load(dialog_id, page_size, anchor_id, anchor_date, direction, prefer_cache)
                .await;
            let _ = tx.send(FetchCompletion {
                generation,
                direction,
                result,
            });
        });
    }

    fn cancel_in_flight(&mut self) {
        self.generation += 1;
        self.backward_in_flight = false;
        self.forward_in_flight = false;
    }

    fn handle_completion(&mut self, done: FetchCompletion) {
        if done.generation != self.generation {
            debug!("Discarding stale {:?} completion", done.direction);
            return;
        }
        match done.direction {
            FetchDirection::Backward => self.backward_in_flight = false,
            FetchDirection::Forward => self.forward_in_flight = false,
            FetchDirection::Initial => {}
        }
        match done.result {
            Ok(batch) => self.merge_history_batch(done.direction, batch),
            Err(err) => self.handle_fetch_failure(done.direction, err),
        }
    }

    fn handle_fetch_failure(&mut self, direction: FetchDirection, err: anyhow::Error) {
        let err = WindowError::from(err);
        warn!("{:?} fetch failed: {}", direction, err);
        match direction {
            FetchDirection::Initial => {
                self.initial_failures += 1;
                if self.initial_failures < 2 {
                    let anchor = self.seek.map(|seek| seek.target_id);
                    let page_size = self.config.page_size;
                    let prefer_cache = self.prefer_cache();
                    self.spawn_fetch(FetchDirection::Initial, anchor, None, page_size, prefer_cache);
                } else {
                    self.seek = None;
                    self.phase = Phase::Live;
                }
            }
            FetchDirection::Backward => {
                self.backward_failures += 1;
                if self.phase == Phase::LoadingInitial {
                    self.abandon_seek();
                }
            }
            FetchDirection::Forward => {
                self.forward_failures += 1;
                if self.phase == Phase::LoadingInitial {
                    self.abandon_seek();
                }
            }
        }
    }

    // ---- Merging ----

    fn merge_history_batch(&mut self, direction: FetchDirection, batch: Batch) {
        let Batch {
            records,
            is_cache,
            requested_count,
            first_unread_id,
            newest_known_id,
        } = batch;
        let received = records.len();

        if let Some(newest) = newest_known_id {
            self.note_newest_known(newest);
        }

        let placement = match direction {
            FetchDirection::Forward => Placement::Append,
            _ => Placement::Prepend,
        };
        let accepted = self.merge_new_records(records, placement);

        match direction {
            FetchDirection::Initial => self.initial_failures = 0,
            FetchDirection::Backward => self.backward_failures = 0,
            FetchDirection::Forward => self.forward_failures = 0,
        }

        self.cursor.finish_batch(direction, received, requested_count, is_cache);

        if direction == FetchDirection::Initial {
            // The first page lands at the live edge unless the source knows
            // of a newer message than anything just loaded.
            let at_live_edge = match newest_known_id {
                Some(newest) => self
                    .cursor
                    .max_message_id()
                    .map_or(false, |max| !self.mode.is_newer(newest, max)),
                None => true,
            };
            self.cursor.set_forward_end(at_live_edge);
            if at_live_edge {
                self.pending_unread.clear();
            }
        }

        if let Some(boundary) = first_unread_id {
            self.place_unread_marker(boundary);
        }

        self.maybe_mark_read(&accepted);
        self.notify_changed();

        // A partial first page from the cache is not the end of history;
        // ask the remote source for the same page.
        if direction == FetchDirection::Initial
            && is_cache
            && received < requested_count
            && self.mode == IdOrderingMode::Ascending
            && self.phase == Phase::LoadingInitial
        {
            debug!(
                "Cache covered {}/{} rows, falling back to remote",
                received, requested_count
            );
            let anchor = self.seek.map(|seek| seek.target_id);
            let page_size = self.config.page_size;
            self.spawn_fetch(FetchDirection::Initial, anchor, None, page_size, false);
            return;
        }

        self.continue_seek_or_go_live();
    }

    /// Dedup, order, and insert a batch of records; returns what was
    /// actually accepted. Skipped duplicates make overlapping deliveries
    /// commutative.
    fn merge_new_records(
        &mut self,
        records: Vec<MessageRecord>,
        placement: Placement,
    ) -> Vec<MessageRecord> {
        let mut accepted: Vec<MessageRecord> = Vec::with_capacity(records.len());
        let mut seen: HashSet<i64> = HashSet::new();
        for record in records {
            if record.dialog_id != self.dialog_id {
                warn!(
                    "Dropping message {} for foreign dialog {}",
                    record.id, record.dialog_id
                );
                continue;
            }
            if self.store.contains(record.id) || !seen.insert(record.id) {
                debug!("Skipping duplicate message {}", record.id);
                continue;
            }
            accepted.push(record);
        }
        if accepted.is_empty() {
            return accepted;
        }
        let mode = self.mode;
        accepted.sort_by(|a, b| a.date.cmp(&b.date).then(mode.cmp_ids(a.id, b.id)));

        match placement {
            Placement::Prepend => self.prepend_records(&accepted),
            Placement::Append => self.append_records(&accepted),
        }

        for record in &accepted {
            self.pending_unread.remove(&record.id);
        }
        self.cursor.observe_batch(&accepted);
        accepted
    }

    /// Older rows enter at the head. Each distinct day in the batch gets one
    /// separator at its first message; a day already loaded moves its
    /// separator down to the new first message.
    fn prepend_records(&mut self, accepted: &[MessageRecord]) {
        let mut kinds: Vec<RowKind> = Vec::with_capacity(accepted.len() + 4);
        let mut separator_days: Vec<(usize, String)> = Vec::new();
        let mut current_day: Option<&str> = None;
        for record in accepted {
            if current_day != Some(record.day_key.as_str()) {
                current_day = Some(record.day_key.as_str());
                if self.days.contains_day(&record.day_key) {
                    match self.days.take_separator(&record.day_key) {
                        Some(old) => {
                            self.sequence.remove(old);
                        }
                        None => error!(
                            "Day {} has messages but no separator row",
                            record.day_key
                        ),
                    }
                }
                separator_days.push((kinds.len(), record.day_key.clone()));
                kinds.push(RowKind::DateSeparator {
                    day_key: record.day_key.clone(),
                    label: DayBucketIndex::label_for(record.date),
                });
            }
            self.days.insert(&record.day_key, record.id);
            kinds.push(RowKind::Message(record.id));
            self.store.put(record.clone());
        }
        let refs = self.sequence.prepend(kinds);
        for (offset, day_key) in separator_days {
            self.days.set_separator(&day_key, refs[offset]);
        }
    }

    /// Newer rows enter at the tail; a message opening a new day pulls its
    /// separator in right before itself.
    fn append_records(&mut self, accepted: &[MessageRecord]) {
        for record in accepted {
            self.store.put(record.clone());
            let new_day = self.days.insert(&record.day_key, record.id);
            self.sequence.append_one(RowKind::Message(record.id));
            if new_day {
                let separator = self.sequence.insert_before_tail(RowKind::DateSeparator {
                    day_key: record.day_key.clone(),
                    label: DayBucketIndex::label_for(record.date),
                });
                self.days.set_separator(&record.day_key, separator);
            }
        }
    }

    fn place_unread_marker(&mut self, boundary_id: i64) {
        if self.unread.is_live() {
            return;
        }
        let Some(target) = self.sequence.message_ref(boundary_id) else {
            return;
        };
        let Some(separator) = self.sequence.insert_before(target, RowKind::UnreadSeparator) else {
            return;
        };
        if self.unread.establish(boundary_id, separator, target, true) {
            debug!("Unread separator placed before message {}", boundary_id);
        } else {
            self.sequence.remove(separator);
        }
    }

    // ---- Live updates ----

    fn apply_new_messages(&mut self, records: Vec<MessageRecord>) {
        if records.is_empty() {
            return;
        }
        if !self.cursor.forward_end_reached() {
            // The live edge is not loaded. A fresh outgoing send snaps the
            // window back to it; anything else only grows the pending count.
            if records
                .iter()
                .any(|record| record.is_outgoing && record.send_state == SendState::Sending)
            {
                self.jump_to_live();
                return;
            }
            for record in &records {
                self.note_newest_known(record.id);
                if !record.is_outgoing && record.is_unread && !self.store.contains(record.id) {
                    self.pending_unread.insert(record.id);
                }
            }
            self.notify_changed();
            return;
        }
        let accepted = self.merge_new_records(records, Placement::Append);
        self.maybe_mark_read(&accepted);
        self.notify_changed();
    }

    fn apply_remap(&mut self, old_id: i64, new_id: i64, patch: MessagePatch) {
        if self.store.contains(new_id) {
            warn!(
                "Dropping conflicting remap {} -> {}: target already present",
                old_id, new_id
            );
            return;
        }
        if let Err(err) = self.store.remap(old_id, new_id, &patch) {
            warn!("Dropping remap {} -> {}: {}", old_id, new_id, err);
            return;
        }
        if let Some(row) = self.sequence.message_ref(old_id) {
            self.sequence.replace(row, RowKind::Message(new_id));
        }
        let day_key = self.store.get(new_id).map(|record| record.day_key.clone());
        if let Some(day_key) = day_key {
            self.days.rekey(&day_key, old_id, new_id);
        }
        if let Some(record) = self.store.get(new_id) {
            // The server id can extend the loaded boundary.
            self.cursor.observe_batch(std::slice::from_ref(record));
        }
        if self.pending_unread.remove(&old_id) {
            self.pending_unread.insert(new_id);
        }
        self.notify_changed();
    }

    fn apply_deletions(&mut self, ids: &[i64]) {
        let mut removed = 0usize;
        for &id in ids {
            self.pending_unread.remove(&id);
            if self.remove_message(id) {
                removed += 1;
            }
        }
        self.notify_changed();

        // History fully purged client-side while more may exist upstream.
        if removed > 0
            && self.sequence.message_count() == 0
            && !self.cursor.backward_end_reached()
        {
            info!("Window emptied by deletions, reloading dialog {}", self.dialog_id);
            self.cancel_in_flight();
            self.reset_window_state();
            self.phase = Phase::LoadingInitial;
            let page_size = self.config.reload_page_size;
            let prefer_cache = self.prefer_cache();
            self.spawn_fetch(FetchDirection::Initial, None, None, page_size, prefer_cache);
        }
    }

    /// Remove one message and everything that hangs off it: its row, its
    /// day membership, the day's separator when the day empties, and the
    /// unread marker when it pointed here. One logical step.
    fn remove_message(&mut self, id: i64) -> bool {
        let Some(record) = self.store.remove(id) else {
            warn!("Dropping deletion for unknown message {}", id);
            return false;
        };
        if let Some(row) = self.sequence.message_ref(id) {
            if self.unread.scroll_target() == Some(row) {
                if let Some(separator) = self.unread.clear() {
                    self.sequence.remove(separator);
                }
            }
            self.sequence.remove(row);
        }
        if let Some(separator) = self.days.remove(&record.day_key, id) {
            self.sequence.remove(separator);
        }
        true
    }

    fn apply_read_boundary(&mut self, up_to_id: i64) {
        let mode = self.mode;
        for record in self.store.records_mut() {
            if !record.is_outgoing && record.is_unread && !mode.is_newer(record.id, up_to_id) {
                record.is_unread = false;
            }
        }
        self.pending_unread.retain(|id| mode.is_newer(*id, up_to_id));
        self.notify_changed();
    }

    fn apply_history_cleared(&mut self) {
        info!("History cleared for dialog {}", self.dialog_id);
        self.cancel_in_flight();
        self.reset_window_state();
        self.pending_unread.clear();
        self.cursor.set_backward_end(true);
        self.cursor.set_forward_end(true);
        self.phase = Phase::Live;
        self.notify_changed();
    }

    /// Clear and reload at the newest page, e.g. when the user sends while
    /// scrolled far back.
    fn jump_to_live(&mut self) {
        info!("Jumping to the live edge of dialog {}", self.dialog_id);
        self.cancel_in_flight();
        self.reset_window_state();
        self.pending_unread.clear();
        self.phase = Phase::LoadingInitial;
        let page_size = self.config.reload_page_size;
        let prefer_cache = self.prefer_cache();
        self.spawn_fetch(FetchDirection::Initial, None, None, page_size, prefer_cache);
    }

    // ---- Seek chaining ----

    fn continue_seek_or_go_live(&mut self) {
        if self.phase != Phase::LoadingInitial {
            return;
        }
        let Some(seek) = self.seek else {
            self.go_live();
            return;
        };
        if let Some(target) = self.sequence.message_ref(seek.target_id) {
            info!("Seek target {} located", seek.target_id);
            self.seek = None;
            self.pending_scroll = Some(target);
            self.go_live();
            return;
        }
        let towards_older = match self.cursor.min_message_id() {
            Some(min) => self.mode.is_older(seek.target_id, min),
            None => {
                self.abandon_seek();
                return;
            }
        };
        if towards_older {
            if self.cursor.backward_end_reached() {
                self.abandon_seek();
                return;
            }
            let anchor_id = self.cursor.min_message_id();
            let anchor_date = self.cursor.min_date();
            let page_size = self.config.page_size;
            let prefer_cache = self.prefer_cache();
            self.spawn_fetch(
                FetchDirection::Backward,
                anchor_id,
                anchor_date,
                page_size,
                prefer_cache,
            );
        } else {
            if self.cursor.forward_end_reached() {
                self.abandon_seek();
                return;
            }
            let anchor_id = self.cursor.max_message_id();
            let anchor_date = self.cursor.max_date();
            let page_size = self.config.page_size;
            let prefer_cache = self.mode == IdOrderingMode::EphemeralDescending;
            self.spawn_fetch(
                FetchDirection::Forward,
                anchor_id,
                anchor_date,
                page_size,
                prefer_cache,
            );
        }
    }

    fn abandon_seek(&mut self) {
        warn!("Seek target unreachable, falling back to the newest page");
        self.seek = None;
        self.cancel_in_flight();
        self.reset_window_state();
        self.phase = Phase::LoadingInitial;
        let page_size = self.config.page_size;
        let prefer_cache = self.prefer_cache();
        self.spawn_fetch(FetchDirection::Initial, None, None, page_size, prefer_cache);
    }

    fn go_live(&mut self) {
        self.phase = Phase::Live;
        debug!(
            "Window live for dialog {}: {} rows",
            self.dialog_id,
            self.sequence.len()
        );
    }

    // ---- Read receipts ----

    fn maybe_mark_read(&mut self, accepted: &[MessageRecord]) {
        let mut newest: Option<(i64, i32)> = None;
        for record in accepted {
            if record.is_outgoing || !record.is_unread {
                continue;
            }
            newest = Some(match newest {
                Some((id, date)) if self.mode.is_newer(id, record.id) => (id, date),
                _ => (record.id, record.date),
            });
        }
        let Some((up_to_id, up_to_date)) = newest else {
            return;
        };
        if self.foreground {
            self.fire_read_mark(up_to_id, up_to_date);
        } else {
            self.pending_read_mark = Some(match self.pending_read_mark {
                Some((id, date)) if self.mode.is_newer(id, up_to_id) => (id, date),
                _ => (up_to_id, up_to_date),
            });
        }
    }

    fn fire_read_mark(&self, up_to_id: i64, up_to_date: i32) {
        let read_state = Arc::clone(&self.read_state);
        let dialog_id = self.dialog_id;
        debug!("Marking dialog {} read up to {}", dialog_id, up_to_id);
        tokio::spawn(async move {
            read_state.mark_read(dialog_id, up_to_id, up_to_date).await;
        });
    }

    // ---- Shared teardown ----

    fn note_newest_known(&mut self, id: i64) {
        self.newest_known_id = Some(match self.newest_known_id {
            Some(current) if self.mode.is_newer(current, id) => current,
            _ => id,
        });
    }

    fn reset_window_state(&mut self) {
        self.store.clear();
        self.days.clear();
        self.sequence.clear();
        self.cursor.reset();
        self.unread.clear();
        self.pending_scroll = None;
    }

    fn notify_changed(&self) {
        let _ = self.notice_tx.send(WindowNotice::Changed);
    }
}
