//! Job status reconciliation
//!
//! Matches the requested positions against the finished rows of the job
//! status table and decides whether polling has to continue.

use crate::types::{JobRow, Position};
use std::collections::HashMap;

/// Result of comparing requested positions with the status table
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reconciliation {
    /// Finished job rows, one per matched position, in request order
    pub matched: Vec<JobRow>,
    /// Requested positions without a finished job, in request order
    pub pending: Vec<Position>,
    /// Whether another status query is needed
    pub continue_polling: bool,
}

impl Reconciliation {
    /// Whether every requested position has a finished job
    pub fn is_complete(&self) -> bool {
        !self.continue_polling
    }
}

/// Reconcile requested positions against the current status table
///
/// Matching is exact on the 7-decimal rounded position. Rows still running
/// (no exit code) and rows for positions that were not requested are
/// ignored. When several finished rows match the same position, the last one
/// in table order is used. Polling continues while fewer positions are
/// matched than were requested.
pub fn reconcile(requested: &[Position], rows: &[JobRow]) -> Reconciliation {
    let mut finished: HashMap<Position, &JobRow> = HashMap::new();
    for row in rows.iter().filter(|r| r.is_finished()) {
        finished.insert(row.position, row);
    }

    let mut matched = Vec::with_capacity(requested.len());
    let mut pending = Vec::new();
    for position in requested {
        match finished.get(position) {
            Some(row) => matched.push((*row).clone()),
            None => pending.push(*position),
        }
    }

    let continue_polling = matched.len() < requested.len();
    Reconciliation {
        matched,
        pending,
        continue_polling,
    }
}
