//! Light-curve retrieval orchestration
//!
//! A [`Retriever`] drives one retrieval from start to finish:
//! - [`polling`] - query the job status table until every position has a finished job
//! - classification - map each job's exit code to a disposition
//! - [`fetch`] - download and normalize eligible light curves with bounded concurrency
//!
//! Results are assembled in request order only after every fetch has
//! joined, so the [`ResultSet`] is never observed half-built.

mod fetch;
mod polling;


use crate::classify::classify;
use crate::clock::{Clock, TokioClock};
use crate::config::Config;
use crate::error::Result;
use crate::positions::dedupe_positions;
use crate::service::{HttpPhotometryService, PhotometryService};
use crate::submission::{SubmissionReceipt, submit_positions};
use crate::types::{Event, JobRow, LightCurve, Position, PositionOutcome, ResultSet, Retrieval};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Retrieves forced-photometry light curves for a list of positions
pub struct Retriever {
    config: Arc<Config>,
    service: Arc<dyn PhotometryService>,
    clock: Arc<dyn Clock>,
    event_tx: broadcast::Sender<Event>,
    cancel: CancellationToken,
}

impl Retriever {
    /// Create a retriever that talks to the configured service over HTTP
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the configuration
    /// does not validate, or an error if the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let service = HttpPhotometryService::new(config.service.clone())?;
        Ok(Self::with_service(config, Arc::new(service), Arc::new(TokioClock)))
    }

    /// Create a retriever over any service and clock
    ///
    /// The configuration is used as given; credentials are the service's concern.
    pub fn with_service(
        config: Config,
        service: Arc<dyn PhotometryService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (event_tx, _rx) = broadcast::channel(1000);
        Self {
            config: Arc::new(config),
            service,
            clock,
            event_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Subscribe to retrieval events
    ///
    /// Events are dropped when nobody is subscribed; a slow subscriber sees
    /// `RecvError::Lagged` instead of blocking the retrieval.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cancel any running and all future retrievals on this retriever
    ///
    /// In-flight status queries, backoff sleeps and fetches are dropped and
    /// the retrieval returns [`Error::Cancelled`](crate::Error::Cancelled).
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }

    /// Retrieve the light curve of every position
    ///
    /// Duplicate positions are collapsed. Positions whose job produced no
    /// usable data map to `None` in the returned [`ResultSet`]; the manifest
    /// records why.
    ///
    /// # Errors
    ///
    /// - [`Error::PollTimeout`](crate::Error::PollTimeout) if jobs are still
    ///   pending after the configured number of status queries
    /// - [`Error::Fetch`](crate::Error::Fetch) for the first failed fetch
    ///   under [`FailurePolicy::FailFast`](crate::config::FailurePolicy)
    /// - [`Error::NoSuccessfulFetches`](crate::Error::NoSuccessfulFetches) if
    ///   every fetch failed under `FailurePolicy::Partial`
    /// - [`Error::Cancelled`](crate::Error::Cancelled) after [`cancel`](Self::cancel)
    pub async fn retrieve(&self, positions: &[Position]) -> Result<Retrieval> {
        let requested = dedupe_positions(positions);
        if requested.is_empty() {
            info!("No positions requested, nothing to retrieve");
            self.emit_event(Event::Completed {
                positions: 0,
                with_data: 0,
            });
            return Ok(Retrieval::default());
        }

        info!(positions = requested.len(), "Starting light curve retrieval");
        let reconciliation = self.poll_until_complete(&requested).await?;

        let (mut outcomes, eligible) = self.classify_jobs(reconciliation.matched);
        self.emit_event(Event::Reconciled {
            matched: outcomes.len(),
            eligible: eligible.len(),
        });

        let mut curves: HashMap<Position, LightCurve> = HashMap::with_capacity(eligible.len());
        for (position, result) in self.fetch_all(eligible).await? {
            let Some(outcome) = outcomes.get_mut(&position) else {
                continue;
            };
            match result {
                Ok(curve) => {
                    outcome.epochs = Some(curve.len());
                    curves.insert(position, curve);
                }
                Err(e) => outcome.error = Some(e.to_string()),
            }
        }

        let mut entries = Vec::with_capacity(requested.len());
        let mut manifest = Vec::with_capacity(requested.len());
        for position in requested {
            entries.push((position, curves.remove(&position)));
            if let Some(outcome) = outcomes.remove(&position) {
                manifest.push(outcome);
            }
        }
        let results = ResultSet::from_entries(entries);

        info!(
            positions = results.len(),
            with_data = results.with_data(),
            "Retrieval complete"
        );
        self.emit_event(Event::Completed {
            positions: results.len(),
            with_data: results.with_data(),
        });

        Ok(Retrieval {
            results,
            outcomes: manifest,
        })
    }

    /// Split finished jobs into manifest entries and fetch-eligible rows
    fn classify_jobs(&self, matched: Vec<JobRow>) -> (HashMap<Position, PositionOutcome>, Vec<JobRow>) {
        let mut outcomes = HashMap::with_capacity(matched.len());
        let mut eligible = Vec::new();

        for row in matched {
            let Some(exit_code) = row.exit_code else {
                continue;
            };
            let classification = classify(exit_code);

            if !classification.disposition.is_fetch_eligible() {
                info!(
                    position = %row.position,
                    exit_code,
                    disposition = %classification.disposition,
                    message = %classification.message,
                    "Skipping position without usable photometry"
                );
                self.emit_event(Event::PositionSkipped {
                    position: row.position.key(),
                    disposition: classification.disposition,
                    message: classification.message.clone(),
                });
            }

            outcomes.insert(
                row.position,
                PositionOutcome {
                    position: row.position,
                    exit_code: Some(exit_code),
                    disposition: classification.disposition,
                    message: classification.message,
                    epochs: None,
                    error: None,
                },
            );
            if classification.disposition.is_fetch_eligible() {
                eligible.push(row);
            }
        }

        (outcomes, eligible)
    }

    /// Submit positions for forced photometry
    ///
    /// Duplicates are collapsed before submission. Emits one
    /// [`Event::Submitted`] per accepted request.
    pub async fn submit(&self, positions: &[Position]) -> Result<Vec<SubmissionReceipt>> {
        let requested = dedupe_positions(positions);
        let receipts =
            submit_positions(self.service.as_ref(), &self.config.submission, &requested).await?;
        for receipt in &receipts {
            self.emit_event(Event::Submitted {
                positions: receipt.positions,
                status: receipt.status,
            });
        }
        Ok(receipts)
    }
}
