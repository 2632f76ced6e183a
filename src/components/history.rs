use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::canvas::PixelBuffer;
use crate::error::{EditorError, EditorResult};
use crate::ops::pipeline::{DisplayParams, recompute};

// ============================================================================
// CLOCK — injectable time source for timestamps and debouncing
// ============================================================================

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug)]
pub struct ManualClock {
    origin: Instant,
    offset_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

// ============================================================================
// EDIT STATE — what a history entry remembers
// ============================================================================

/// A re-derivable editor state: the base pixels plus the display parameters.
///
/// Bases are shared through `Arc`; only geometric edits allocate a new one
/// (and bump `generation`), so parameter-only entries cost a few bytes.
#[derive(Clone, Debug)]
pub struct EditState {
    pub base: Arc<PixelBuffer>,
    pub generation: u64,
    pub params: DisplayParams,
}

impl EditState {
    pub fn new(base: Arc<PixelBuffer>, generation: u64, params: DisplayParams) -> Self {
        Self {
            base,
            generation,
            params,
        }
    }

    /// Pixels this state displays.
    pub fn render(&self) -> PixelBuffer {
        recompute(&self.base, &self.params)
    }
}

impl PartialEq for EditState {
    fn eq(&self, other: &Self) -> bool {
        self.generation == other.generation
            && self.params == other.params
            && (Arc::ptr_eq(&self.base, &other.base) || *self.base == *other.base)
    }
}

// ============================================================================
// HISTORY ENTRY
// ============================================================================

/// One discrete edit: its label, when it happened, and the editor state
/// immediately before and after it.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    label: String,
    timestamp: Instant,
    before: EditState,
    after: EditState,
}

impl HistoryEntry {
    pub fn new(label: impl Into<String>, timestamp: Instant, before: EditState, after: EditState) -> Self {
        Self {
            label: label.into(),
            timestamp,
            before,
            after,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    pub fn before(&self) -> &EditState {
        &self.before
    }

    pub fn after(&self) -> &EditState {
        &self.after
    }

    /// Independent copy of the pixels as they were before this edit.
    pub fn snapshot(&self) -> PixelBuffer {
        self.before.render()
    }

    /// True when the edit replaced the base pixels (rotate/flip/crop/load).
    pub fn changes_base(&self) -> bool {
        self.before.generation != self.after.generation
    }
}

// ============================================================================
// HISTORY MANAGER - linear, bounded history with a cursor
// ============================================================================

/// Linear undo/redo history.
///
/// `cursor` names the most recently applied entry; the editor displays
/// `entries[cursor].after`. Committing while the cursor is not at the end
/// discards the redo branch.
pub struct HistoryManager {
    entries: VecDeque<HistoryEntry>,
    cursor: Option<usize>,
    max_history_size: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: None,
            max_history_size: max_history_size.max(1),
        }
    }

    /// Append an entry after the cursor. Returns how many old entries were
    /// evicted to stay within the limit.
    pub fn push(&mut self, mut entry: HistoryEntry) -> usize {
        // Drop the redo branch
        let keep = self.cursor.map_or(0, |c| c + 1);
        self.entries.truncate(keep);

        // Timestamps never go backwards
        if let Some(last) = self.entries.back()
            && entry.timestamp < last.timestamp
        {
            entry.timestamp = last.timestamp;
        }

        crate::log_info!("history: commit '{}' at index {}", entry.label, self.entries.len());
        self.entries.push_back(entry);
        self.cursor = Some(self.entries.len() - 1);

        self.prune()
    }

    pub fn commit(
        &mut self,
        label: impl Into<String>,
        timestamp: Instant,
        before: EditState,
        after: EditState,
    ) -> usize {
        self.push(HistoryEntry::new(label, timestamp, before, after))
    }

    /// Step back one entry. Returns the state to display, or `None` when
    /// already at the oldest entry.
    pub fn undo(&mut self) -> Option<&EditState> {
        let cursor = self.cursor.filter(|&c| c > 0)?;
        let undone = &self.entries[cursor];
        crate::log_info!("history: undo '{}'", undone.label);
        self.cursor = Some(cursor - 1);
        // `after` of the new cursor is the `before` of the undone entry.
        Some(&self.entries[cursor - 1].after)
    }

    /// Step forward one entry, restoring its stored after-state.
    pub fn redo(&mut self) -> Option<&EditState> {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next >= self.entries.len() {
            return None;
        }
        crate::log_info!("history: redo '{}'", self.entries[next].label);
        self.cursor = Some(next);
        Some(&self.entries[next].after)
    }

    /// Move the cursor straight to `index`.
    ///
    /// Returns the state *after* entry `index` was applied, not its `before`
    /// snapshot, so jumping to entry 0 shows the freshly loaded image.
    pub fn jump_to(&mut self, index: usize) -> EditorResult<&EditState> {
        if index >= self.entries.len() {
            return Err(EditorError::precondition(format!(
                "history index {} out of range (history has {} entries)",
                index,
                self.entries.len()
            )));
        }
        crate::log_info!("history: jump to {} '{}'", index, self.entries[index].label);
        self.cursor = Some(index);
        Ok(&self.entries[index].after)
    }

    /// State the cursor points at.
    pub fn current(&self) -> Option<&EditState> {
        self.cursor.map(|c| &self.entries[c].after)
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.cursor.map_or(0, |c| c + 1) < self.entries.len()
    }

    /// Label of the entry `undo()` would revert.
    pub fn undo_description(&self) -> Option<&str> {
        if !self.can_undo() {
            return None;
        }
        self.cursor.map(|c| self.entries[c].label.as_str())
    }

    /// Label of the entry `redo()` would re-apply.
    pub fn redo_description(&self) -> Option<&str> {
        let next = self.cursor.map_or(0, |c| c + 1);
        self.entries.get(next).map(|e| e.label.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.label.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.max_history_size
    }

    /// Approximate bytes held by history: each distinct base buffer once.
    pub fn memory_usage(&self) -> usize {
        let mut seen: Vec<u64> = Vec::new();
        let mut total = 0;
        for entry in &self.entries {
            for state in [&entry.before, &entry.after] {
                if !seen.contains(&state.generation) {
                    seen.push(state.generation);
                    total += state.base.memory_bytes();
                }
            }
        }
        total
    }

    /// Whether any entry shares `base` with the caller.
    pub fn holds_base(&self, base: &Arc<PixelBuffer>) -> bool {
        self.entries
            .iter()
            .any(|e| Arc::ptr_eq(&e.before.base, base) || Arc::ptr_eq(&e.after.base, base))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    /// Evict oldest entries beyond the limit, keeping the cursor on the same
    /// entry.
    fn prune(&mut self) -> usize {
        let mut evicted = 0;
        while self.entries.len() > self.max_history_size {
            if let Some(removed) = self.entries.pop_front() {
                crate::log_info!("history: evicted '{}'", removed.label);
                evicted += 1;
            }
        }
        if evicted > 0 {
            self.cursor = self.cursor.map(|c| c.saturating_sub(evicted));
        }
        evicted
    }
}

// ============================================================================
// DEBOUNCED COMMITS — one history entry per burst of slider activity
// ============================================================================

/// A commit waiting for its quiet period to end.
#[derive(Clone, Debug)]
pub struct PendingCommit {
    pub label: String,
    /// State when the burst started.
    pub before: EditState,
    pub deadline: Instant,
}

/// Cancellable delayed-commit handle. At most one commit is pending;
/// scheduling again replaces its label and pushes its deadline back.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<PendingCommit>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// (Re)schedule. `before` is only used when no burst is in progress.
    pub fn schedule(&mut self, label: impl Into<String>, before: EditState, now: Instant) {
        let deadline = now + self.delay;
        match &mut self.pending {
            Some(p) => {
                p.label = label.into();
                p.deadline = deadline;
            }
            None => {
                self.pending = Some(PendingCommit {
                    label: label.into(),
                    before,
                    deadline,
                });
            }
        }
    }

    /// Take the pending commit if its quiet period has elapsed.
    pub fn take_due(&mut self, now: Instant) -> Option<PendingCommit> {
        if self.pending.as_ref().is_some_and(|p| now >= p.deadline) {
            self.pending.take()
        } else {
            None
        }
    }

    /// Take the pending commit regardless of its deadline.
    pub fn take(&mut self) -> Option<PendingCommit> {
        self.pending.take()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&PendingCommit> {
        self.pending.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::adjustments::Adjustments;

    fn state(brightness: i32) -> EditState {
        EditState::new(
            Arc::new(PixelBuffer::from_pixel(2, 2, [10, 20, 30, 255])),
            0,
            DisplayParams::new(
                Adjustments {
                    brightness,
                    ..Adjustments::NEUTRAL
                },
                None,
            ),
        )
    }

    fn history_with(labels: &[&str], limit: usize) -> HistoryManager {
        let mut h = HistoryManager::new(limit);
        let t = Instant::now();
        for (i, label) in labels.iter().enumerate() {
            h.commit(*label, t, state(i as i32), state(i as i32 + 1));
        }
        h
    }

    #[test]
    fn commit_advances_cursor() {
        let h = history_with(&["Image loaded", "A", "B"], 10);
        assert_eq!(h.len(), 3);
        assert_eq!(h.cursor(), Some(2));
        assert!(h.can_undo());
        assert!(!h.can_redo());
        assert_eq!(h.undo_description(), Some("B"));
    }

    #[test]
    fn undo_restores_before_state_of_undone_entry() {
        let mut h = history_with(&["Image loaded", "A", "B"], 10);
        let before_b = h.get(2).unwrap().before().clone();
        assert_eq!(h.undo(), Some(&before_b));
        assert_eq!(h.cursor(), Some(1));
        assert_eq!(h.redo_description(), Some("B"));
    }

    #[test]
    fn undo_stops_at_first_entry() {
        let mut h = history_with(&["Image loaded"], 10);
        assert!(h.undo().is_none());
        assert_eq!(h.cursor(), Some(0));
        assert!(HistoryManager::new(5).undo().is_none());
    }

    #[test]
    fn redo_restores_after_state() {
        let mut h = history_with(&["Image loaded", "A", "B"], 10);
        h.undo();
        h.undo();
        let after_a = h.get(1).unwrap().after().clone();
        assert_eq!(h.redo(), Some(&after_a));
        assert_eq!(h.cursor(), Some(1));
        h.redo();
        assert!(h.redo().is_none());
        assert_eq!(h.cursor(), Some(2));
    }

    #[test]
    fn commit_after_undo_discards_redo_branch() {
        let mut h = history_with(&["A", "B"], 10);
        h.undo();
        h.commit("C", Instant::now(), state(7), state(8));
        assert_eq!(h.len(), 2);
        assert_eq!(h.labels(), vec!["A".to_string(), "C".to_string()]);
        assert!(!h.can_redo());
        assert!(h.redo().is_none());
    }

    #[test]
    fn limit_evicts_oldest_and_keeps_cursor_valid() {
        let limit = 4;
        let labels: Vec<String> = (0..limit + 5).map(|i| format!("edit {}", i)).collect();
        let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
        let h = history_with(&refs, limit);
        assert_eq!(h.len(), limit);
        assert_eq!(h.cursor(), Some(limit - 1));
        assert_eq!(h.get(0).unwrap().label(), "edit 5");
    }

    #[test]
    fn eviction_while_cursor_is_mid_history() {
        let mut h = history_with(&["a", "b", "c"], 3);
        h.undo();
        h.undo();
        // Cursor 0: committing truncates to 1 entry then appends.
        h.commit("d", Instant::now(), state(0), state(1));
        assert_eq!(h.len(), 2);
        assert_eq!(h.cursor(), Some(1));
    }

    #[test]
    fn jump_to_is_checked() {
        let mut h = history_with(&["a", "b", "c"], 10);
        let after_a = h.get(0).unwrap().after().clone();
        assert_eq!(h.jump_to(0).unwrap(), &after_a);
        assert_eq!(h.cursor(), Some(0));
        assert!(matches!(h.jump_to(3), Err(EditorError::PreconditionViolation(_))));
        assert_eq!(h.cursor(), Some(0));
    }

    #[test]
    fn timestamps_are_monotonic() {
        let mut h = HistoryManager::new(10);
        let later = Instant::now() + Duration::from_secs(5);
        h.commit("late", later, state(0), state(1));
        h.commit("early", later - Duration::from_secs(3), state(1), state(2));
        let stamps: Vec<Instant> = h.entries().map(|e| e.timestamp()).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn memory_counts_shared_bases_once() {
        let h = history_with(&["a", "b", "c"], 10);
        assert_eq!(h.memory_usage(), 16);
    }

    #[test]
    fn debouncer_coalesces_and_fires_after_quiet_period() {
        let clock = ManualClock::new();
        let mut d = Debouncer::new(Duration::from_millis(1000));
        d.schedule("Adjusted brightness", state(0), clock.now());
        clock.advance(Duration::from_millis(600));
        d.schedule("Adjusted contrast", state(5), clock.now());
        assert_eq!(d.pending().map(|p| p.label.as_str()), Some("Adjusted contrast"));
        clock.advance(Duration::from_millis(600));
        assert!(d.take_due(clock.now()).is_none());
        clock.advance(Duration::from_millis(400));
        let fired = d.take_due(clock.now()).unwrap();
        assert_eq!(fired.label, "Adjusted contrast");
        // The burst's starting state survives rescheduling.
        assert_eq!(fired.before, state(0));
        assert!(!d.is_pending());
    }

    #[test]
    fn debouncer_cancel() {
        let mut d = Debouncer::new(Duration::from_millis(10));
        d.schedule("x", state(0), Instant::now());
        d.cancel();
        assert!(d.take().is_none());
    }
}
