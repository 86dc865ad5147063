//! Job status polling
//!
//! Status queries are strictly sequential: one query, then reconcile, then
//! either stop or sleep for the poll interval. Transport failures and
//! unparseable pages count as "not ready yet" and use up an attempt like an
//! incomplete table does.

use super::Retriever;
use crate::error::{Error, Result};
use crate::reconcile::{Reconciliation, reconcile};
use crate::types::{Event, Position};
use tracing::{debug, error, info, warn};

impl Retriever {
    /// Query the status table until every requested position has a finished job
    pub(super) async fn poll_until_complete(&self, requested: &[Position]) -> Result<Reconciliation> {
        let polling = &self.config.polling;
        let mut pending = requested.len();

        for attempt in 1..=polling.max_attempts {
            let queried = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                rows = self.service.query_status() => rows,
            };

            let reason = match queried {
                Ok(rows) => {
                    debug!(attempt, rows = rows.len(), "Queried job status table");
                    self.emit_event(Event::StatusQueried {
                        attempt,
                        rows: rows.len(),
                    });

                    let reconciliation = reconcile(requested, &rows);
                    if reconciliation.is_complete() {
                        info!(
                            attempt,
                            matched = reconciliation.matched.len(),
                            "All positions have finished jobs"
                        );
                        return Ok(reconciliation);
                    }

                    pending = reconciliation.pending.len();
                    info!(attempt, pending, "Jobs still pending");
                    self.emit_event(Event::Pending { attempt, pending });
                    format!("{pending} positions pending")
                }
                Err(e) if e.is_poll_retryable() => {
                    warn!(attempt, error = %e, "Status query failed, treating jobs as pending");
                    e.to_string()
                }
                Err(e) => {
                    error!(attempt, error = %e, "Status query failed permanently");
                    return Err(e);
                }
            };

            if attempt < polling.max_attempts {
                self.emit_event(Event::PollBackoff {
                    attempt,
                    delay_ms: u64::try_from(polling.interval.as_millis()).unwrap_or(u64::MAX),
                    reason,
                });
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                    _ = self.clock.sleep(polling.interval) => {}
                }
            }
        }

        error!(
            attempts = polling.max_attempts,
            pending, "Giving up waiting for jobs to finish"
        );
        Err(Error::PollTimeout {
            attempts: polling.max_attempts,
            pending,
        })
    }
}
