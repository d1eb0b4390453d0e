// src/gcode/mod.rs
pub mod motion_line;
pub mod rewriter;

pub use motion_line::{PositioningMode, VerticalMove, match_vertical_move};
pub use rewriter::{GcodeOffsetRewriter, OffsetMode, RewriteSummary};

use thiserror::Error;

/// Per-line failures. These are logged and never abort a plate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RewriteError {
    #[error("unable to process Z coordinate '{literal}'")]
    MalformedCoordinate { literal: String },
}
