//! Line-level grammar for the handful of G-code commands the offset rewriter cares about.
//!
//! This is deliberately not a G-code parser. Only `G0`/`G1` moves carrying a `Z` word and
//! the `G90`/`G91` positioning switches are recognised; every other line passes through.

use regex::Regex;
use std::sync::OnceLock;

use crate::gcode::RewriteError;

/// Comment appended to every rewritten vertical move.
pub const ADJUSTED_COMMENT: &str = " ;adjusted by z offset";

/// Comment appended to the origin reset emitted in localized mode.
pub const ORIGIN_RESET_COMMENT: &str = " ;consider this the original z before offset";

/// Decimal places kept when substituting an adjusted coordinate.
pub const Z_PRECISION: i32 = 5;

fn vertical_move_regex() -> &'static Regex {
    static VERTICAL_MOVE: OnceLock<Regex> = OnceLock::new();
    VERTICAL_MOVE.get_or_init(|| {
        Regex::new(r"^(G[01]\s[^;]*Z)([-+]?\d*\.?\d*)(.*)$").expect("invalid regex pattern")
    })
}

/// Positioning mode tracked while scanning a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositioningMode {
    #[default]
    Absolute,
    Relative,
}

impl PositioningMode {
    /// Returns the mode a line switches to, or `None` if it is not a `G90`/`G91` line.
    pub fn switch_for(line: &str) -> Option<Self> {
        if line.starts_with("G91") {
            Some(Self::Relative)
        } else if line.starts_with("G90") {
            Some(Self::Absolute)
        } else {
            None
        }
    }
}

/// A `G0`/`G1` line split around its Z literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerticalMove<'a> {
    /// Everything up to and including the `Z`.
    pub prefix: &'a str,
    /// The raw coordinate text, possibly empty or otherwise unparsable.
    pub literal: &'a str,
    /// Everything after the literal, kept verbatim.
    pub suffix: &'a str,
}

impl<'a> VerticalMove<'a> {
    pub fn parse_z(&self) -> Result<f64, RewriteError> {
        self.literal
            .parse::<f64>()
            .map_err(|_| RewriteError::MalformedCoordinate {
                literal: self.literal.to_string(),
            })
    }

    /// Render the line with `z` substituted for the original literal.
    pub fn with_z(&self, z: f64) -> String {
        format!(
            "{}{:.prec$}{}{}",
            self.prefix,
            z,
            self.suffix,
            ADJUSTED_COMMENT,
            prec = Z_PRECISION as usize
        )
    }

    /// `G92` line telling the firmware the nozzle is still at the unshifted height.
    pub fn origin_reset_line(&self) -> String {
        format!("G92 Z{}{}", self.literal, ORIGIN_RESET_COMMENT)
    }
}

/// Match a vertical linear move. The last `Z` before any `;` comment wins.
///
/// `line` must not carry its `\r`; see [`split_line_ending`].
pub fn match_vertical_move(line: &str) -> Option<VerticalMove<'_>> {
    let caps = vertical_move_regex().captures(line)?;
    Some(VerticalMove {
        prefix: caps.get(1)?.as_str(),
        literal: caps.get(2)?.as_str(),
        suffix: caps.get(3)?.as_str(),
    })
}

/// Split a trailing carriage return off a line, for CRLF input.
pub fn split_line_ending(line: &str) -> (&str, &str) {
    match line.strip_suffix('\r') {
        Some(body) => (body, "\r"),
        None => (line, ""),
    }
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
