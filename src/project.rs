use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::canvas::{FlipAxis, PixelBuffer, Rect};
use crate::components::history::{
    Clock, Debouncer, EditState, HistoryManager, PendingCommit, SystemClock,
};
use crate::config::EditorConfig;
use crate::error::{EditorError, EditorResult};
use crate::ops::adjustments::{AdjustmentUpdate, Adjustments};
use crate::ops::filters::{FilterCatalog, FilterDef, filter_previews};
use crate::ops::pipeline::DisplayParams;
use crate::ops::transform::{self, AspectRatio, Rotation};

pub const LABEL_LOADED: &str = "Image loaded";
pub const LABEL_ROTATED: &str = "Rotated image";
pub const LABEL_FLIPPED: &str = "Flipped image";
pub const LABEL_CROPPED: &str = "Cropped image";
pub const LABEL_RESET_ADJUSTMENTS: &str = "Reset adjustments";
pub const LABEL_CLEARED_FILTERS: &str = "Cleared filters";

/// Pixels of the open image and the state they were derived from.
struct LoadedImage {
    original: Arc<PixelBuffer>,
    state: EditState,
    /// Always `state.render()`.
    current: PixelBuffer,
    next_generation: u64,
}

impl LoadedImage {
    fn refresh(&mut self) {
        self.current = self.state.render();
    }

    fn restore(&mut self, state: EditState) {
        self.state = state;
        self.refresh();
    }
}

fn require_image<'a>(image: &'a mut Option<LoadedImage>, op: &str) -> EditorResult<&'a mut LoadedImage> {
    image.as_mut().ok_or_else(|| no_image(op))
}

fn no_image(op: &str) -> EditorError {
    crate::log_warn!("{} rejected: no image loaded", op);
    EditorError::precondition(format!("{}: no image loaded", op))
}

/// One editing session: a loaded image, its display parameters, and its
/// undo history.
pub struct Session {
    id: Uuid,
    config: EditorConfig,
    catalog: FilterCatalog,
    clock: Arc<dyn Clock>,
    image: Option<LoadedImage>,
    history: HistoryManager,
    debouncer: Debouncer,
}

impl Session {
    pub fn new(config: EditorConfig) -> EditorResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Session driven by a caller-supplied clock (tests use `ManualClock`).
    pub fn with_clock(config: EditorConfig, clock: Arc<dyn Clock>) -> EditorResult<Self> {
        config.validate()?;
        let catalog = config.catalog()?;
        let id = Uuid::new_v4();
        crate::log_info!(
            "session {}: created (history_limit={}, debounce_ms={}, {} filters)",
            id,
            config.history_limit,
            config.debounce_ms,
            catalog.len()
        );
        Ok(Self {
            id,
            history: HistoryManager::new(config.history_limit),
            debouncer: Debouncer::new(config.debounce()),
            catalog,
            config,
            clock,
            image: None,
        })
    }

    // ========================================================================
    // LOADING
    // ========================================================================

    /// Replace whatever was open with `buffer`. Clears history and resets
    /// adjustments and filter to neutral.
    pub fn load_original(&mut self, buffer: PixelBuffer) {
        self.debouncer.cancel();
        self.history.clear();

        crate::log_info!("session {}: loaded {}x{} image", self.id, buffer.width(), buffer.height());

        let original = Arc::new(buffer);
        let state = EditState::new(Arc::clone(&original), 0, DisplayParams::default());
        let current = (*original).clone();
        self.history
            .commit(LABEL_LOADED, self.clock.now(), state.clone(), state.clone());
        self.image = Some(LoadedImage {
            original,
            state,
            current,
            next_generation: 1,
        });
    }

    // ========================================================================
    // DISPLAY PARAMETERS (debounced)
    // ========================================================================

    /// Merge `update` into the active adjustments and recompute. The history
    /// entry is committed once the adjustments stop changing.
    pub fn set_adjustments(&mut self, update: AdjustmentUpdate) -> EditorResult<()> {
        let now = self.clock.now();
        let image = require_image(&mut self.image, "set_adjustments")?;
        if update.is_empty() {
            return Ok(());
        }

        let before = image.state.clone();
        image.state.params.adjustments = update.apply_to(image.state.params.adjustments);
        image.refresh();
        self.debouncer.schedule(update.label(), before, now);
        Ok(())
    }

    /// Select a catalog filter by name, or clear it with `None`.
    pub fn set_filter(&mut self, name: Option<&str>) -> EditorResult<()> {
        let now = self.clock.now();
        let image = require_image(&mut self.image, "set_filter")?;
        let filter = match name {
            Some(name) => {
                let def = self.catalog.get(name).inspect_err(|e| {
                    crate::log_warn!("set_filter rejected: {}", e);
                })?;
                // Identity presets mean "no filter"
                (!def.is_neutral()).then(|| def.clone())
            }
            None => None,
        };

        let label = match &filter {
            Some(f) => format!("Applied {} filter", f.name),
            None => LABEL_CLEARED_FILTERS.to_string(),
        };
        let before = image.state.clone();
        image.state.params.filter = filter;
        image.refresh();
        self.debouncer.schedule(label, before, now);
        Ok(())
    }

    pub fn reset_adjustments(&mut self) -> EditorResult<()> {
        self.set_params_now(LABEL_RESET_ADJUSTMENTS, "reset_adjustments", |p| {
            p.adjustments = Adjustments::NEUTRAL;
        })
    }

    pub fn reset_filter(&mut self) -> EditorResult<()> {
        self.set_params_now(LABEL_CLEARED_FILTERS, "reset_filter", |p| p.filter = None)
    }

    fn set_params_now(
        &mut self,
        label: &str,
        op: &str,
        change: impl FnOnce(&mut DisplayParams),
    ) -> EditorResult<()> {
        require_image(&mut self.image, op)?;
        self.flush_pending();
        let now = self.clock.now();
        let image = require_image(&mut self.image, op)?;
        let before = image.state.clone();
        change(&mut image.state.params);
        image.refresh();
        self.history.commit(label, now, before, image.state.clone());
        Ok(())
    }

    // ========================================================================
    // GEOMETRIC EDITS (committed immediately)
    // ========================================================================

    /// Rotate 90° clockwise.
    pub fn rotate(&mut self) -> EditorResult<()> {
        self.rotate_by(90)
    }

    /// Rotate by any multiple of 90° (negative is counter-clockwise).
    /// Full turns leave the image and history untouched.
    pub fn rotate_by(&mut self, degrees: i32) -> EditorResult<()> {
        require_image(&mut self.image, "rotate")?;
        let rotation = Rotation::from_degrees(degrees)?;
        if rotation == Rotation::None {
            crate::log_info!("session {}: rotate by {} is a no-op", self.id, degrees);
            return Ok(());
        }
        crate::log_info!("session {}: rotate {} degrees clockwise", self.id, rotation.degrees());
        self.transform_base(LABEL_ROTATED, "rotate", |base| Ok(transform::rotate(base, rotation)))
    }

    pub fn flip(&mut self, axis: FlipAxis) -> EditorResult<()> {
        self.transform_base(LABEL_FLIPPED, "flip", |base| Ok(transform::flip(base, axis)))
    }

    /// Crop to `rect`, which must lie inside the current image.
    pub fn crop(&mut self, rect: Rect) -> EditorResult<()> {
        self.transform_base(LABEL_CROPPED, "crop", |base| {
            transform::crop(base, rect).inspect_err(|e| {
                crate::log_warn!("crop rejected: {}", e);
            })
        })
    }

    /// Crop to the largest centered rectangle with the given aspect ratio.
    pub fn crop_to_aspect(&mut self, ratio: AspectRatio) -> EditorResult<()> {
        let (w, h) = require_image(&mut self.image, "crop")?.current.dimensions();
        self.crop(ratio.centered_rect(w, h))
    }

    /// Replace the base buffer with `op(base)`, keeping the display
    /// parameters, and commit. `op` runs before anything is mutated.
    fn transform_base(
        &mut self,
        label: &str,
        op_name: &str,
        op: impl FnOnce(&PixelBuffer) -> EditorResult<PixelBuffer>,
    ) -> EditorResult<()> {
        let new_base = op(&*require_image(&mut self.image, op_name)?.state.base)?;

        self.flush_pending();
        let now = self.clock.now();
        let image = require_image(&mut self.image, op_name)?;
        let before = image.state.clone();
        image.state = EditState::new(Arc::new(new_base), image.next_generation, before.params.clone());
        image.next_generation += 1;
        image.refresh();

        crate::log_info!(
            "session {}: {} -> {}x{} (generation {})",
            self.id,
            label,
            image.current.width(),
            image.current.height(),
            image.state.generation
        );
        self.history.commit(label, now, before, image.state.clone());
        Ok(())
    }

    // ========================================================================
    // HISTORY NAVIGATION
    // ========================================================================

    /// Step back one entry. Returns `false` when there was nothing to undo.
    pub fn undo(&mut self) -> EditorResult<bool> {
        require_image(&mut self.image, "undo")?;
        self.flush_pending();
        let Some(state) = self.history.undo().cloned() else {
            return Ok(false);
        };
        require_image(&mut self.image, "undo")?.restore(state);
        Ok(true)
    }

    /// Step forward one entry. Returns `false` when there was nothing to redo.
    pub fn redo(&mut self) -> EditorResult<bool> {
        require_image(&mut self.image, "redo")?;
        self.flush_pending();
        let Some(state) = self.history.redo().cloned() else {
            return Ok(false);
        };
        require_image(&mut self.image, "redo")?.restore(state);
        Ok(true)
    }

    /// Show the state right after history entry `index`.
    ///
    /// This is `entries[index].after`, not the entry's `before` snapshot.
    ///
    /// A pending slider burst is committed first when the target is at or
    /// behind the cursor. Jumping into the redo branch drops the burst instead,
    /// so the branch survives. An `Err` leaves the session untouched.
    pub fn jump_to(&mut self, index: usize) -> EditorResult<()> {
        let image = self.image.as_ref().ok_or_else(|| no_image("jump_to"))?;
        if index >= self.history.len() {
            let err = EditorError::precondition(format!(
                "jump_to: index {} out of range (history has {} entries)",
                index,
                self.history.len()
            ));
            crate::log_warn!("{}", err);
            return Err(err);
        }

        let burst_commits = self.debouncer.pending().is_some_and(|p| p.before != image.state);
        let cursor = self.history.cursor().unwrap_or(0);
        let forward = index > cursor;

        // Committing the burst appends at cursor + 1 and may evict from the front.
        let evicted = if burst_commits && !forward {
            (cursor + 2).saturating_sub(self.history.limit())
        } else {
            0
        };
        if index < evicted {
            let err = EditorError::precondition(format!(
                "jump_to: entry {} would be evicted when the pending edit is committed",
                index
            ));
            crate::log_warn!("{}", err);
            return Err(err);
        }

        if forward {
            if let Some(pending) = self.debouncer.take() {
                crate::log_info!(
                    "session {}: dropped pending '{}' to jump forward to {}",
                    self.id,
                    pending.label,
                    index
                );
            }
        } else {
            self.flush_pending();
        }
        let state = self.history.jump_to(index - evicted)?.clone();
        require_image(&mut self.image, "jump_to")?.restore(state);
        Ok(())
    }

    // ========================================================================
    // DEBOUNCE
    // ========================================================================

    /// Commit the pending slider burst if its quiet period has elapsed.
    /// Returns `true` when an entry was committed.
    pub fn tick(&mut self) -> bool {
        let now = self.clock.now();
        self.tick_at(now)
    }

    pub fn tick_at(&mut self, now: Instant) -> bool {
        match self.debouncer.take_due(now) {
            Some(pending) => self.commit_pending(pending, now).is_some(),
            None => false,
        }
    }

    /// Commit any pending burst now. Returns the number of evicted entries.
    pub fn flush_pending(&mut self) -> usize {
        match self.debouncer.take() {
            Some(pending) => {
                let now = self.clock.now();
                self.commit_pending(pending, now).unwrap_or(0)
            }
            None => 0,
        }
    }

    /// Returns evicted count, or `None` when nothing was committed.
    fn commit_pending(&mut self, pending: PendingCommit, now: Instant) -> Option<usize> {
        let image = self.image.as_ref()?;
        if pending.before == image.state {
            crate::log_info!("session {}: '{}' had no net effect, not recorded", self.id, pending.label);
            return None;
        }
        Some(
            self.history
                .commit(pending.label, now, pending.before, image.state.clone()),
        )
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &FilterCatalog {
        &self.catalog
    }

    pub fn is_loaded(&self) -> bool {
        self.image.is_some()
    }

    /// The buffer the UI should display.
    pub fn current_buffer(&self) -> Option<&PixelBuffer> {
        self.image.as_ref().map(|i| &i.current)
    }

    /// The buffer passed to `load_original`.
    pub fn original_buffer(&self) -> Option<&PixelBuffer> {
        self.image.as_ref().map(|i| i.original.as_ref())
    }

    /// The unadjusted pixels after geometric edits.
    pub fn base_buffer(&self) -> Option<&PixelBuffer> {
        self.image.as_ref().map(|i| i.state.base.as_ref())
    }

    pub fn base_generation(&self) -> Option<u64> {
        self.image.as_ref().map(|i| i.state.generation)
    }

    pub fn adjustments(&self) -> Adjustments {
        self.image
            .as_ref()
            .map_or(Adjustments::NEUTRAL, |i| i.state.params.adjustments)
    }

    pub fn active_filter(&self) -> Option<&FilterDef> {
        self.image.as_ref().and_then(|i| i.state.params.filter.as_ref())
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn history_cursor(&self) -> Option<usize> {
        self.history.cursor()
    }

    pub fn history_labels(&self) -> Vec<String> {
        self.history.labels()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo() || self.debouncer.is_pending()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo() && !self.debouncer.is_pending()
    }

    pub fn has_pending_commit(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// One preview thumbnail per catalog filter, from the current buffer.
    pub fn filter_previews(&self, max_size: u32) -> EditorResult<Vec<(String, PixelBuffer)>> {
        let image = self.image.as_ref().ok_or_else(|| no_image("filter_previews"))?;
        filter_previews(&image.current, &self.catalog, max_size)
    }

    /// Bytes held by the open image and its history. Shared bases count once.
    pub fn memory_usage(&self) -> usize {
        let live = self.image.as_ref().map_or(0, |i| {
            let original = if self.history.holds_base(&i.original) {
                0
            } else {
                i.original.memory_bytes()
            };
            i.current.memory_bytes() + original
        });
        live + self.history.memory_usage()
    }
}
