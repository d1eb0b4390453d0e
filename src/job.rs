//! Sliced job model: plates, their chunk sequences, and the processed sentinel.
//!
//! Chunk layout per plate:
//! - `chunks[0]` preamble / metadata comments
//! - `chunks[1]` start gcode
//! - `chunks[2..]` one chunk per layer

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel written into the preamble of a processed plate.
pub const PROCESSED_MARKER: &str = ";ZOFFSETPROCESSED";

/// Boundary the slicer writes at the start of every layer.
pub const LAYER_PREFIX: &str = ";LAYER:";

/// First layer boundary, including its line terminator.
pub const LAYER_ZERO_MARKER: &str = ";LAYER:0\n";
const LAYER_ZERO_MARKER_CRLF: &str = ";LAYER:0\r\n";

pub type PlateId = u32;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlateGcode {
    pub chunks: Vec<String>,
    /// Missing in older job files; derived from the sentinel on load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    processed: Option<bool>,
}

impl PlateGcode {
    pub fn from_chunks(chunks: Vec<String>) -> Self {
        let processed = chunks.first().is_some_and(|preamble| has_marker_line(preamble));
        Self {
            chunks,
            processed: Some(processed),
        }
    }

    /// True if the plate was already offset, either by flag or by the text sentinel.
    pub fn is_processed(&self) -> bool {
        self.processed.unwrap_or(false)
            || self.chunks.first().is_some_and(|preamble| has_marker_line(preamble))
    }

    /// Append the sentinel line to the preamble and set the flag.
    pub fn mark_processed(&mut self) {
        if let Some(preamble) = self.chunks.first_mut() {
            if !preamble.is_empty() && !preamble.ends_with('\n') {
                preamble.push('\n');
            }
            preamble.push_str(PROCESSED_MARKER);
            preamble.push('\n');
        }
        self.processed = Some(true);
    }

    pub fn to_gcode(&self) -> String {
        self.chunks.concat()
    }
}

/// The sentinel only counts when it is a line of its own.
fn has_marker_line(preamble: &str) -> bool {
    preamble.lines().any(|line| line.trim_end() == PROCESSED_MARKER)
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GcodeJob {
    pub plates: BTreeMap<PlateId, PlateGcode>,
}

impl GcodeJob {
    pub fn new() -> Self {
        Self::default()
    }

    /// Job with a single plate built from a flat G-code file.
    pub fn from_gcode(text: &str) -> Self {
        let mut job = Self::new();
        job.insert_plate(0, PlateGcode::from_chunks(split_gcode(text)));
        job
    }

    pub fn insert_plate(&mut self, id: PlateId, plate: PlateGcode) {
        self.plates.insert(id, plate);
    }

    pub fn is_empty(&self) -> bool {
        self.plates.is_empty()
    }

    /// All plates concatenated in plate order.
    pub fn to_gcode(&self) -> String {
        self.plates.values().map(PlateGcode::to_gcode).collect()
    }
}

/// Split a flat G-code file into preamble, start block and one chunk per layer.
///
/// Concatenating the result reproduces `text` exactly.
pub fn split_gcode(text: &str) -> Vec<String> {
    let mut chunks = vec![String::new(), String::new()];
    let mut in_preamble = true;

    for line in text.split_inclusive('\n') {
        if line.starts_with(LAYER_PREFIX) {
            in_preamble = false;
            chunks.push(String::new());
        } else if in_preamble && !line.starts_with(';') {
            in_preamble = false;
        }

        let idx = if in_preamble { 0 } else { chunks.len() - 1 };
        chunks[idx].push_str(line);
    }

    chunks
}

/// Move a layer 0 that was glued onto the start block back into its own chunk.
///
/// Returns `true` if a split happened.
pub fn repair_layer_zero(chunks: &mut Vec<String>) -> bool {
    let Some(start) = chunks.get(1) else {
        return false;
    };
    let found = [LAYER_ZERO_MARKER, LAYER_ZERO_MARKER_CRLF]
        .iter()
        .filter_map(|marker| start.find(marker))
        .min();
    let Some(idx) = found else {
        return false;
    };

    let layer_zero = chunks[1].split_off(idx);
    chunks.insert(2, layer_zero);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = ";FLAVOR:Marlin\n;TIME:100\nM104 S200\nG28\n;LAYER:0\nG0 Z0.3\nG1 X1 E1\n;LAYER:1\nG0 Z0.5\n";

    #[test]
    fn test_split_gcode_layout() {
        let chunks = split_gcode(SAMPLE);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], ";FLAVOR:Marlin\n;TIME:100\n");
        assert_eq!(chunks[1], "M104 S200\nG28\n");
        assert_eq!(chunks[2], ";LAYER:0\nG0 Z0.3\nG1 X1 E1\n");
        assert_eq!(chunks[3], ";LAYER:1\nG0 Z0.5\n");
        assert_eq!(chunks.concat(), SAMPLE);
    }

    #[test]
    fn test_split_gcode_without_layers() {
        let chunks = split_gcode("G28\nG1 Z5\n");
        assert_eq!(chunks, vec!["".to_string(), "G28\nG1 Z5\n".to_string()]);
    }

    #[test]
    fn test_repair_layer_zero() {
        let mut chunks = vec![
            ";FLAVOR:Marlin\n".to_string(),
            "<header>\n;LAYER:0\n<content>".to_string(),
        ];
        assert!(repair_layer_zero(&mut chunks));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1], "<header>\n");
        assert_eq!(chunks[2], ";LAYER:0\n<content>");
    }

    #[test]
    fn test_repair_layer_zero_noop() {
        let mut chunks = vec!["".to_string(), "G28\n".to_string(), ";LAYER:0\n".to_string()];
        assert!(!repair_layer_zero(&mut chunks));
        assert_eq!(chunks.len(), 3);

        let mut short = vec!["".to_string()];
        assert!(!repair_layer_zero(&mut short));
    }

    #[test]
    fn test_processed_marker_round_trip() {
        let mut plate = PlateGcode::from_chunks(split_gcode(SAMPLE));
        assert!(!plate.is_processed());
        plate.mark_processed();
        assert!(plate.is_processed());
        assert!(plate.chunks[0].ends_with(";ZOFFSETPROCESSED\n"));

        let reloaded = PlateGcode::from_chunks(split_gcode(&plate.to_gcode()));
        assert!(reloaded.is_processed());
    }

    #[test]
    fn test_marker_gets_its_own_line() {
        let mut plate = PlateGcode::from_chunks(vec![";FLAVOR:Marlin".to_string(), "G28\n".to_string()]);
        plate.mark_processed();
        assert_eq!(plate.chunks[0], ";FLAVOR:Marlin\n;ZOFFSETPROCESSED\n");

        let mut empty = PlateGcode::from_chunks(vec![String::new(), "G28\n".to_string()]);
        empty.mark_processed();
        assert_eq!(empty.chunks[0], ";ZOFFSETPROCESSED\n");
    }

    #[test]
    fn test_marker_text_inside_comment_is_not_processed() {
        let plate = PlateGcode::from_chunks(vec![
            ";note: ;ZOFFSETPROCESSED is added by the z offset tool\n".to_string(),
            "G28\n".to_string(),
        ]);
        assert!(!plate.is_processed());

        let crlf = PlateGcode::from_chunks(vec![";ZOFFSETPROCESSED\r\n".to_string(), "G28\r\n".to_string()]);
        assert!(crlf.is_processed());
    }

    #[test]
    fn test_repair_layer_zero_crlf() {
        let mut chunks = vec![String::new(), "G28\r\n;LAYER:0\r\nG0 Z0.3\r\n".to_string()];
        assert!(repair_layer_zero(&mut chunks));
        assert_eq!(chunks[1], "G28\r\n");
        assert_eq!(chunks[2], ";LAYER:0\r\nG0 Z0.3\r\n");
    }

    #[test]
    fn test_json_without_flag_uses_sentinel() {
        let json = r#"{"plates":{"1":{"chunks":[";ZOFFSETPROCESSED\n","G28\n"]}}}"#;
        let job: GcodeJob = serde_json::from_str(json).unwrap();
        assert!(job.plates[&1].is_processed());
    }
}
