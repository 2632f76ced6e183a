//! SnapForge: the editing core of a photo editor.
//!
//! A [`Session`] owns one loaded image, the colour adjustments and filter
//! shown on top of it, and a bounded linear undo history. Pixel work lives in
//! [`ops`]; history and timing in [`components::history`].

pub mod logger;

pub mod canvas;
pub mod cli;
pub mod components;
pub mod config;
pub mod error;
pub mod io;
pub mod ops;
pub mod project;

pub use canvas::{FlipAxis, PixelBuffer, Rect};
pub use components::history::{Clock, EditState, HistoryEntry, HistoryManager, ManualClock, SystemClock};
pub use config::EditorConfig;
pub use error::{EditorError, EditorResult};
pub use ops::adjustments::{AdjustmentUpdate, Adjustments};
pub use ops::filters::{FilterCatalog, FilterDef};
pub use ops::pipeline::{DisplayParams, recompute};
pub use ops::transform::{AspectRatio, Rotation};
pub use project::Session;
