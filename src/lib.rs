//! Z offset post-processing for sliced 3D printer G-code.
//!
//! The host hands a [`job::GcodeJob`] to [`post_process::filter_gcode`] right before it
//! persists the output; the job comes back with its vertical moves shifted.

pub mod config;
pub mod file_manager;
pub mod gcode;
pub mod job;
pub mod post_process;
pub mod settings;

pub use config::{Config, ZOffsetSettings};
pub use gcode::{GcodeOffsetRewriter, OffsetMode, RewriteSummary};
pub use job::{GcodeJob, PlateGcode, PlateId};
pub use post_process::filter_gcode;
