// ============================================================================
// EDIT PIPELINE — base buffer + display parameters → displayed buffer
// ============================================================================

use crate::canvas::PixelBuffer;
use crate::ops::adjustments::{Adjustments, apply_adjustments};
use crate::ops::filters::{FilterDef, apply_filter};

/// Everything the pipeline needs besides the base pixels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayParams {
    pub adjustments: Adjustments,
    /// `None` (or a neutral kernel) means no filter stage.
    pub filter: Option<FilterDef>,
}

impl DisplayParams {
    pub fn new(adjustments: Adjustments, filter: Option<FilterDef>) -> Self {
        Self { adjustments, filter }
    }

    /// Filter that will actually run, skipping identity kernels.
    pub fn effective_filter(&self) -> Option<&FilterDef> {
        self.filter.as_ref().filter(|f| !f.is_neutral())
    }

    pub fn is_neutral(&self) -> bool {
        self.adjustments.is_neutral() && self.effective_filter().is_none()
    }
}

/// Derive the displayed buffer from `base`. Pure: the same inputs always
/// give byte-identical output, and `base` is never modified.
pub fn recompute(base: &PixelBuffer, params: &DisplayParams) -> PixelBuffer {
    let working = if params.adjustments.is_neutral() {
        base.clone()
    } else {
        apply_adjustments(base, &params.adjustments)
    };

    match params.effective_filter() {
        Some(filter) => apply_filter(&working, filter),
        None => working,
    }
}
