//! # Z offset rewriter
//!
//! Applies a vertical offset to already-sliced G-code, plate by plate.
//!
//! Two strategies are supported:
//!
//! - [`OffsetMode::Localized`] rewrites the first absolute vertical move of the first layer
//!   and follows it with a `G92` origin reset, so every later move inherits the shift.
//! - [`OffsetMode::Extensive`] rewrites every absolute vertical move in every layer. Needed for
//!   firmware (Griffin) that ignores the origin reset.
//!
//! Processed plates get a sentinel line in their preamble and are skipped on later calls.
//!
//! ## Example
//!
//! ```rust
//! use zoffset_rs::gcode::{GcodeOffsetRewriter, OffsetMode};
//! use zoffset_rs::job::{GcodeJob, PlateGcode};
//!
//! let mut job = GcodeJob::new();
//! job.insert_plate(0, PlateGcode::from_chunks(vec![
//!     ";FLAVOR:Marlin\n".to_string(),
//!     "G28\n".to_string(),
//!     ";LAYER:0\nG0 F300 Z0.3\n".to_string(),
//! ]));
//! let summary = GcodeOffsetRewriter::new(0.2, OffsetMode::Localized).rewrite(&mut job);
//! assert!(summary.changed());
//! assert!(job.plates[&0].chunks[2].contains("Z0.50000"));
//! ```

use crate::gcode::motion_line::{
    PositioningMode, Z_PRECISION, match_vertical_move, round_to, split_line_ending,
};
use crate::job::{GcodeJob, PlateGcode, PlateId, repair_layer_zero};

/// Index of the first layer chunk.
const FIRST_LAYER_CHUNK: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetMode {
    #[default]
    Localized,
    Extensive,
}

impl From<bool> for OffsetMode {
    /// `true` selects extensive processing.
    fn from(extensive: bool) -> Self {
        if extensive {
            Self::Extensive
        } else {
            Self::Localized
        }
    }
}

/// What a single `rewrite` call did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewriteSummary {
    pub changed_plates: Vec<PlateId>,
    pub skipped_plates: Vec<PlateId>,
    /// Subset of `skipped_plates` that already carried the offset.
    pub already_processed_plates: Vec<PlateId>,
    pub adjusted_lines: usize,
    pub malformed_lines: usize,
}

impl RewriteSummary {
    /// Whether the caller has to persist the job again.
    pub fn changed(&self) -> bool {
        !self.changed_plates.is_empty()
    }

    /// True if at least one plate was skipped because it was offset before.
    pub fn already_applied(&self) -> bool {
        !self.already_processed_plates.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ChunkStats {
    adjusted: usize,
    malformed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GcodeOffsetRewriter {
    offset: f64,
    mode: OffsetMode,
}

impl GcodeOffsetRewriter {
    pub fn new(offset: f64, mode: OffsetMode) -> Self {
        Self { offset, mode }
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn mode(&self) -> OffsetMode {
        self.mode
    }

    /// Rewrite every unprocessed plate in `job` in place.
    ///
    /// Never fails: malformed plates and lines are logged and skipped.
    pub fn rewrite(&self, job: &mut GcodeJob) -> RewriteSummary {
        let mut summary = RewriteSummary::default();

        if self.offset == 0.0 {
            return summary;
        }
        if !self.offset.is_finite() {
            tracing::error!("Refusing to apply non-finite Z offset {}", self.offset);
            return summary;
        }
        if job.is_empty() {
            tracing::warn!("Z offset: no data to process");
            return summary;
        }

        for (&plate_id, plate) in job.plates.iter_mut() {
            if plate.chunks.len() < 2 {
                tracing::warn!(
                    "Plate {} has {} chunk(s), expected at least 2; skipping",
                    plate_id,
                    plate.chunks.len()
                );
                summary.skipped_plates.push(plate_id);
                continue;
            }
            if plate.is_processed() {
                tracing::debug!("Plate {} already has a Z offset applied", plate_id);
                summary.skipped_plates.push(plate_id);
                summary.already_processed_plates.push(plate_id);
                continue;
            }

            let stats = self.rewrite_plate(plate_id, plate);
            plate.mark_processed();

            summary.adjusted_lines += stats.adjusted;
            summary.malformed_lines += stats.malformed;
            summary.changed_plates.push(plate_id);
        }

        if summary.changed() {
            tracing::info!(
                "Applied Z offset {} mm ({:?}) to {} plate(s), {} line(s) adjusted",
                self.offset,
                self.mode,
                summary.changed_plates.len(),
                summary.adjusted_lines
            );
        }
        summary
    }

    fn rewrite_plate(&self, plate_id: PlateId, plate: &mut PlateGcode) -> ChunkStats {
        if repair_layer_zero(&mut plate.chunks) {
            tracing::debug!("Plate {}: split layer 0 out of the start gcode", plate_id);
        }

        match self.mode {
            OffsetMode::Localized => match plate.chunks.get_mut(FIRST_LAYER_CHUNK) {
                Some(chunk) => self.rewrite_first_move(chunk),
                None => {
                    tracing::debug!("Plate {}: no layer chunk to offset", plate_id);
                    ChunkStats::default()
                }
            },
            OffsetMode::Extensive => {
                let mut stats = ChunkStats::default();
                for chunk in plate.chunks.iter_mut().skip(FIRST_LAYER_CHUNK) {
                    let chunk_stats = self.rewrite_all_moves(chunk);
                    stats.adjusted += chunk_stats.adjusted;
                    stats.malformed += chunk_stats.malformed;
                }
                stats
            }
        }
    }

    /// Offset the first absolute vertical move and insert a `G92` after it.
    fn rewrite_first_move(&self, chunk: &mut String) -> ChunkStats {
        let mut stats = ChunkStats::default();
        let mut lines: Vec<String> = chunk.split('\n').map(str::to_string).collect();
        let mut positioning = PositioningMode::default();

        for idx in 0..lines.len() {
            let (line, ending) = split_line_ending(&lines[idx]);
            if let Some(mode) = PositioningMode::switch_for(line) {
                positioning = mode;
                continue;
            }
            if positioning == PositioningMode::Relative {
                continue;
            }
            let Some(found) = match_vertical_move(line) else {
                continue;
            };

            match found.parse_z() {
                Ok(z) => {
                    let rewritten = found.with_z(round_to(z + self.offset, Z_PRECISION)) + ending;
                    let reset = found.origin_reset_line() + ending;
                    lines[idx] = rewritten;
                    lines.insert(idx + 1, reset);
                    stats.adjusted += 1;
                    *chunk = lines.join("\n");
                    break;
                }
                Err(e) => {
                    tracing::error!("{} in line: {}", e, line);
                    stats.malformed += 1;
                }
            }
        }

        stats
    }

    /// Offset every absolute vertical move in a chunk.
    fn rewrite_all_moves(&self, chunk: &mut String) -> ChunkStats {
        let mut stats = ChunkStats::default();
        let mut positioning = PositioningMode::default();
        let mut lines: Vec<String> = Vec::new();

        for raw in chunk.split('\n') {
            let (line, ending) = split_line_ending(raw);
            if let Some(mode) = PositioningMode::switch_for(line) {
                positioning = mode;
                lines.push(raw.to_string());
                continue;
            }
            let found = match positioning {
                PositioningMode::Absolute => match_vertical_move(line),
                PositioningMode::Relative => None,
            };
            let Some(found) = found else {
                lines.push(raw.to_string());
                continue;
            };

            match found.parse_z() {
                Ok(z) => {
                    lines.push(found.with_z(round_to(z + self.offset, Z_PRECISION)) + ending);
                    stats.adjusted += 1;
                }
                Err(e) => {
                    tracing::error!("{} in line: {}", e, line);
                    stats.malformed += 1;
                    lines.push(raw.to_string());
                }
            }
        }

        if stats.adjusted > 0 {
            *chunk = lines.join("\n");
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plate(chunks: &[&str]) -> PlateGcode {
        PlateGcode::from_chunks(chunks.iter().map(|c| c.to_string()).collect())
    }

    fn job_with(chunks: &[&str]) -> GcodeJob {
        let mut job = GcodeJob::new();
        job.insert_plate(0, plate(chunks));
        job
    }

    #[test]
    fn test_zero_offset_is_noop() {
        let mut job = job_with(&[";FLAVOR:Marlin\n", "G28\n", ";LAYER:0\nG0 Z0.3\n"]);
        let before = job.clone();
        let summary = GcodeOffsetRewriter::new(0.0, OffsetMode::Extensive).rewrite(&mut job);
        assert!(!summary.changed());
        assert_eq!(job, before);
    }

    #[test]
    fn test_empty_job_is_noop() {
        let mut job = GcodeJob::new();
        let summary = GcodeOffsetRewriter::new(0.2, OffsetMode::Localized).rewrite(&mut job);
        assert!(!summary.changed());
        assert!(job.is_empty());
    }

    #[test]
    fn test_non_finite_offset_is_noop() {
        let mut job = job_with(&["", "G28\n", ";LAYER:0\nG0 Z0.3\n"]);
        let before = job.clone();
        let summary = GcodeOffsetRewriter::new(f64::NAN, OffsetMode::Localized).rewrite(&mut job);
        assert!(!summary.changed());
        assert_eq!(job, before);
    }

    #[test]
    fn test_localized_example() {
        let mut job = job_with(&["", "G28\n", ";LAYER:0\nG0 F300 Z0.3\nG1 X1 Y1 E1\nG0 Z0.6\n"]);
        let summary = GcodeOffsetRewriter::new(0.2, OffsetMode::Localized).rewrite(&mut job);
        assert_eq!(summary.adjusted_lines, 1);
        assert_eq!(
            job.plates[&0].chunks[2],
            ";LAYER:0\nG0 F300 Z0.50000 ;adjusted by z offset\nG92 Z0.3 ;consider this the original z before offset\nG1 X1 Y1 E1\nG0 Z0.6\n"
        );
    }

    #[test]
    fn test_localized_skips_malformed_then_rewrites_next() {
        let mut job = job_with(&["", "G28\n", ";LAYER:0\nG1 Zabc\nG1 Z0.3\n"]);
        let summary = GcodeOffsetRewriter::new(-0.1, OffsetMode::Localized).rewrite(&mut job);
        assert_eq!(summary.malformed_lines, 1);
        assert_eq!(summary.adjusted_lines, 1);
        let chunk = &job.plates[&0].chunks[2];
        assert!(chunk.contains("G1 Zabc\n"));
        assert!(chunk.contains("G1 Z0.20000 ;adjusted by z offset"));
    }

    #[test]
    fn test_extensive_resets_mode_per_chunk() {
        let mut job = job_with(&[
            "",
            "G28\n",
            ";LAYER:0\nG1 Z0.3\nG91\nG1 Z1\n",
            ";LAYER:1\nG1 Z0.5\n",
        ]);
        let summary = GcodeOffsetRewriter::new(0.1, OffsetMode::Extensive).rewrite(&mut job);
        assert_eq!(summary.adjusted_lines, 2);
        let chunks = &job.plates[&0].chunks;
        assert_eq!(chunks[2], ";LAYER:0\nG1 Z0.40000 ;adjusted by z offset\nG91\nG1 Z1\n");
        assert_eq!(chunks[3], ";LAYER:1\nG1 Z0.60000 ;adjusted by z offset\n");
    }

    #[test]
    fn test_short_plate_skipped_others_processed() {
        let mut job = GcodeJob::new();
        job.insert_plate(0, plate(&[";only preamble\n"]));
        job.insert_plate(1, plate(&["", "G28\n", ";LAYER:0\nG0 Z0.3\n"]));
        let summary = GcodeOffsetRewriter::new(0.2, OffsetMode::Localized).rewrite(&mut job);
        assert_eq!(summary.skipped_plates, vec![0]);
        assert_eq!(summary.changed_plates, vec![1]);
        assert_eq!(job.plates[&0].chunks, vec![";only preamble\n".to_string()]);
    }

    #[test]
    fn test_two_chunk_plate_is_still_marked() {
        let mut job = job_with(&["", "G28\nG1 Z5\n"]);
        let summary = GcodeOffsetRewriter::new(0.2, OffsetMode::Localized).rewrite(&mut job);
        assert!(summary.changed());
        assert_eq!(summary.adjusted_lines, 0);
        assert_eq!(job.plates[&0].chunks[1], "G28\nG1 Z5\n");
        assert!(job.plates[&0].is_processed());
    }

    #[test]
    fn test_crlf_keeps_annotation_before_carriage_return() {
        let mut job = job_with(&["", "G28\r\n", ";LAYER:0\r\nG0 Z0.3\r\nG1 X1 E1\r\n"]);
        GcodeOffsetRewriter::new(0.2, OffsetMode::Localized).rewrite(&mut job);
        assert_eq!(
            job.plates[&0].chunks[2],
            ";LAYER:0\r\nG0 Z0.50000 ;adjusted by z offset\r\nG92 Z0.3 ;consider this the original z before offset\r\nG1 X1 E1\r\n"
        );

        let mut job = job_with(&["", "G28\r\n", ";LAYER:0\r\nG91\r\nG1 Z1\r\nG90\r\nG1 Z0.3 ;Z hop\r\n"]);
        GcodeOffsetRewriter::new(0.2, OffsetMode::Extensive).rewrite(&mut job);
        assert_eq!(
            job.plates[&0].chunks[2],
            ";LAYER:0\r\nG91\r\nG1 Z1\r\nG90\r\nG1 Z0.50000 ;Z hop ;adjusted by z offset\r\n"
        );
    }

    #[test]
    fn test_already_processed_tracked_separately_from_short_plates() {
        let mut job = GcodeJob::new();
        job.insert_plate(0, plate(&[";only preamble\n"]));
        let summary = GcodeOffsetRewriter::new(0.2, OffsetMode::Localized).rewrite(&mut job);
        assert_eq!(summary.skipped_plates, vec![0]);
        assert!(!summary.already_applied());

        job.insert_plate(1, plate(&[";ZOFFSETPROCESSED\n", "G28\n", ";LAYER:0\nG0 Z0.3\n"]));
        let summary = GcodeOffsetRewriter::new(0.2, OffsetMode::Localized).rewrite(&mut job);
        assert_eq!(summary.skipped_plates, vec![0, 1]);
        assert_eq!(summary.already_processed_plates, vec![1]);
        assert!(summary.already_applied());
    }

    #[test]
    fn test_offset_mode_from_bool() {
        assert_eq!(OffsetMode::from(true), OffsetMode::Extensive);
        assert_eq!(OffsetMode::from(false), OffsetMode::Localized);
    }
}
