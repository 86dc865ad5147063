//! Job status table parsing
//!
//! The status endpoint answers with an HTML page whose first `<table>` lists
//! recent jobs, one per row, with at least the columns `ra`, `dec`,
//! `exitcode` and `lightcurve`. The markup is simple and machine generated,
//! so it is parsed with regular expressions rather than a full HTML parser.

use crate::error::{Error, Result};
use crate::types::{JobRow, Position};
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, warn};

const REQUIRED: [&str; 4] = ["ra", "dec", "exitcode", "lightcurve"];

/// Compiled patterns for extracting job rows from the status page
pub struct StatusTableParser {
    table: Regex,
    row: Regex,
    cell: Regex,
    tag: Regex,
    href: Regex,
}

struct Cell {
    header: bool,
    text: String,
    href: Option<String>,
}

impl StatusTableParser {
    /// Compile the parser's patterns
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| Error::Other(format!("invalid status table pattern: {e}")))
        };
        Ok(Self {
            table: compile(r"(?is)<table\b[^>]*>(.*?)</table>")?,
            row: compile(r"(?is)<tr\b[^>]*>(.*?)</tr>")?,
            cell: compile(r"(?is)<t([hd])\b[^>]*>(.*?)</t[hd]>")?,
            tag: compile(r"(?s)<[^>]*>")?,
            href: compile(r#"(?i)href\s*=\s*["']([^"']+)["']"#)?,
        })
    }

    /// Parse the first table of a status page into job rows
    ///
    /// # Errors
    ///
    /// Returns [`Error::StatusTable`] if the page has no table, no header row,
    /// or lacks one of the `ra`, `dec`, `exitcode`, `lightcurve` columns.
    /// Individual rows with unparseable coordinates are skipped.
    pub fn parse(&self, html: &str) -> Result<Vec<JobRow>> {
        let table = self
            .table
            .captures(html)
            .and_then(|c| c.get(1))
            .ok_or_else(|| Error::StatusTable("no <table> element in response".to_string()))?
            .as_str();

        let mut rows = self
            .row
            .captures_iter(table)
            .filter_map(|c| c.get(1))
            .map(|m| self.cells(m.as_str()))
            .filter(|cells| !cells.is_empty());

        let header: Vec<String> = rows
            .next()
            .ok_or_else(|| Error::StatusTable("table has no header row".to_string()))?
            .into_iter()
            .map(|cell| cell.text.to_lowercase())
            .collect();

        let index_of = |name: &str| header.iter().position(|h| h == name);
        let missing: Vec<&str> = REQUIRED
            .into_iter()
            .filter(|name| index_of(*name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(Error::StatusTable(format!(
                "missing columns: {}",
                missing.join(", ")
            )));
        }
        let (Some(ra_idx), Some(dec_idx), Some(exit_idx), Some(lc_idx)) = (
            index_of("ra"),
            index_of("dec"),
            index_of("exitcode"),
            index_of("lightcurve"),
        ) else {
            return Err(Error::StatusTable("missing required columns".to_string()));
        };

        let mut jobs = Vec::new();
        for (row_no, cells) in rows.enumerate() {
            if cells.iter().all(|c| c.header) {
                continue;
            }
            let text = |i: usize| cells.get(i).map(|c| c.text.as_str()).unwrap_or("");

            let (Ok(ra), Ok(dec)) = (text(ra_idx).parse::<f64>(), text(dec_idx).parse::<f64>())
            else {
                warn!(row = row_no + 1, "Skipping status row with unparseable position");
                continue;
            };

            // An anchor's target beats its display text
            let lightcurve = cells.get(lc_idx).and_then(|cell| {
                cell.href
                    .clone()
                    .or_else(|| (!is_missing(&cell.text)).then(|| cell.text.clone()))
            });

            let aux = header
                .iter()
                .enumerate()
                .filter(|(i, _)| ![ra_idx, dec_idx, exit_idx, lc_idx].contains(i))
                .filter_map(|(i, name)| cells.get(i).map(|c| (name.clone(), c.text.clone())))
                .collect::<BTreeMap<_, _>>();

            jobs.push(JobRow {
                position: Position::new(ra, dec),
                exit_code: parse_exit_code(text(exit_idx)),
                lightcurve,
                aux,
            });
        }

        debug!(rows = jobs.len(), "Parsed job status table");
        Ok(jobs)
    }

    fn cells(&self, row_html: &str) -> Vec<Cell> {
        self.cell
            .captures_iter(row_html)
            .map(|c| {
                let inner = c.get(2).map(|m| m.as_str()).unwrap_or("");
                Cell {
                    header: c.get(1).is_some_and(|m| m.as_str().eq_ignore_ascii_case("h")),
                    text: decode_entities(self.tag.replace_all(inner, "").trim()),
                    href: self
                        .href
                        .captures(inner)
                        .and_then(|h| h.get(1))
                        .map(|m| decode_entities(m.as_str())),
                }
            })
            .collect()
    }
}

/// Parse a status page with a freshly compiled parser
pub fn parse_status_table(html: &str) -> Result<Vec<JobRow>> {
    StatusTableParser::new()?.parse(html)
}

fn is_missing(text: &str) -> bool {
    text.is_empty()
        || text.eq_ignore_ascii_case("nan")
        || text.eq_ignore_ascii_case("none")
        || text.eq_ignore_ascii_case("null")
}

/// Exit code of a row; `None` while the job is still running
fn parse_exit_code(text: &str) -> Option<i32> {
    if is_missing(text) {
        return None;
    }
    if let Ok(code) = text.parse::<i32>() {
        return Some(code);
    }
    match text.parse::<f64>() {
        Ok(code) if code.fract() == 0.0 && code.abs() <= f64::from(i32::MAX) => Some(code as i32),
        _ => {
            warn!(exit_code = text, "Unparseable exit code, treating job as unfinished");
            None
        }
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}
