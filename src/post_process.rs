// src/post_process.rs - hook run right before sliced output is persisted
use crate::config::ZOffsetSettings;
use crate::gcode::{GcodeOffsetRewriter, RewriteSummary};
use crate::job::GcodeJob;

/// Apply the configured Z offset to `job` before it is written out.
///
/// Missing settings are a no-op. The caller persists `job` again only if the
/// returned summary reports a change.
pub fn filter_gcode(settings: Option<&ZOffsetSettings>, job: &mut GcodeJob) -> RewriteSummary {
    let Some(settings) = settings else {
        tracing::info!("No Z offset settings available; leaving output untouched");
        return RewriteSummary::default();
    };

    let summary = GcodeOffsetRewriter::new(settings.offset, settings.mode).rewrite(job);
    if !summary.changed() && summary.already_applied() {
        tracing::info!("Z offset already applied; nothing to do");
    }
    summary
}
