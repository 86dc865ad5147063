//! Position list input
//!
//! The input format is plain text with one position per line: right
//! ascension and declination in degrees, separated by whitespace. Blank lines
//! and `#` comments are skipped; fields after the second are ignored.

use crate::error::{Error, Result};
use crate::types::Position;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// Parse a position list
///
/// # Errors
///
/// Returns [`Error::InvalidPosition`] for a line with fewer than two fields, a
/// field that is not a number, or a non-finite coordinate.
pub fn parse_positions(text: &str) -> Result<Vec<Position>> {
    let mut positions = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (Some(ra), Some(dec)) = (fields.next(), fields.next()) else {
            return Err(Error::InvalidPosition {
                line: line_no,
                reason: "expected two fields (ra dec)".to_string(),
            });
        };

        let ra = parse_coordinate(ra, "ra", line_no)?;
        let dec = parse_coordinate(dec, "dec", line_no)?;
        positions.push(Position::new(ra, dec));
    }
    debug!(count = positions.len(), "Parsed position list");
    Ok(positions)
}

fn parse_coordinate(token: &str, name: &str, line: usize) -> Result<f64> {
    let value: f64 = token.parse().map_err(|_| Error::InvalidPosition {
        line,
        reason: format!("{name} {token:?} is not a number"),
    })?;
    if !value.is_finite() {
        return Err(Error::InvalidPosition {
            line,
            reason: format!("{name} must be finite"),
        });
    }
    Ok(value)
}

/// Read and parse a position list file
pub async fn read_positions(path: impl AsRef<Path>) -> Result<Vec<Position>> {
    let text = tokio::fs::read_to_string(path.as_ref()).await?;
    parse_positions(&text)
}

/// Remove repeated positions, keeping the first occurrence of each
///
/// The service reports one job per distinct position, so duplicates would
/// otherwise keep the completeness count from ever being reached.
pub fn dedupe_positions(positions: &[Position]) -> Vec<Position> {
    let mut seen = HashSet::with_capacity(positions.len());
    let unique: Vec<Position> = positions
        .iter()
        .copied()
        .filter(|p| seen.insert(*p))
        .collect();
    if unique.len() < positions.len() {
        warn!(
            duplicates = positions.len() - unique.len(),
            "Ignoring duplicate positions"
        );
    }
    unique
}
