//! Concurrent light-curve fetching
//!
//! Fetches run as a buffered stream on the calling task rather than as
//! spawned tasks, so dropping the stream cancels every fetch still in flight.

use super::Retriever;
use crate::config::FailurePolicy;
use crate::error::{Error, Result};
use crate::normalize::normalize_text;
use crate::retry::with_retry;
use crate::types::{Event, JobRow, LightCurve, Position};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::num::NonZeroUsize;
use tracing::{Instrument, info, info_span, warn};

/// Outcome of each fetch, keyed by position
pub(super) type FetchResults = Vec<(Position, Result<LightCurve>)>;

/// Number of fetches to run at once
///
/// Bounded by the configured limit, the available parallelism and the amount
/// of work, and never below one.
pub(super) fn fetch_concurrency(configured: usize, eligible: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    configured.min(cores).min(eligible).max(1)
}

impl Retriever {
    /// Fetch and normalize the light curve of every eligible job
    pub(super) async fn fetch_all(&self, jobs: Vec<JobRow>) -> Result<FetchResults> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let fetch_config = &self.config.fetch;
        let concurrency = fetch_concurrency(fetch_config.max_concurrent_fetches, jobs.len());
        info!(
            eligible = jobs.len(),
            concurrency,
            policy = ?fetch_config.failure_policy,
            "Fetching light curves"
        );

        let fetches = stream::iter(jobs)
            .map(|job| self.fetch_one(job))
            .buffer_unordered(concurrency);

        let all = async {
            match fetch_config.failure_policy {
                // The first error drops the stream and with it every sibling fetch
                FailurePolicy::FailFast => fetches
                    .try_collect::<Vec<(Position, LightCurve)>>()
                    .await
                    .map(|curves| {
                        curves
                            .into_iter()
                            .map(|(position, curve)| (position, Ok(curve)))
                            .collect()
                    }),
                FailurePolicy::Partial => {
                    let results: Vec<Result<(Position, LightCurve)>> = fetches.collect().await;
                    partial_results(results)
                }
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            results = all => results,
        }
    }

    async fn fetch_one(&self, job: JobRow) -> Result<(Position, LightCurve)> {
        let position = job.position;
        let span = info_span!("fetch", position = %position);

        match self.load_curve(&job).instrument(span).await {
            Ok(curve) => {
                info!(
                    position = %position,
                    epochs = curve.len(),
                    detections = curve.detections(),
                    "Fetched light curve"
                );
                self.emit_event(Event::Fetched {
                    position: position.key(),
                    epochs: curve.len(),
                    detections: curve.detections(),
                });
                Ok((position, curve))
            }
            Err(e) => {
                warn!(position = %position, error = %e, "Light curve fetch failed");
                self.emit_event(Event::FetchFailed {
                    position: position.key(),
                    error: e.to_string(),
                });
                Err(Error::Fetch {
                    position,
                    source: Box::new(e),
                })
            }
        }
    }

    async fn load_curve(&self, job: &JobRow) -> Result<LightCurve> {
        let reference = job.lightcurve.as_deref().ok_or_else(|| {
            Error::Other("finished job has no light curve reference".to_string())
        })?;
        let text = with_retry(self.clock.as_ref(), &self.config.fetch.retry, || {
            self.service.fetch_lightcurve(reference)
        })
        .await?;
        Ok(normalize_text(&text)?)
    }
}

/// Keep every outcome unless nothing succeeded
fn partial_results(results: Vec<Result<(Position, LightCurve)>>) -> Result<FetchResults> {
    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 && failed == results.len() {
        return Err(Error::NoSuccessfulFetches { failed });
    }
    if failed > 0 {
        warn!(failed, total = results.len(), "Some light curve fetches failed");
    }

    Ok(results
        .into_iter()
        .filter_map(|result| match result {
            Ok((position, curve)) => Some((position, Ok(curve))),
            Err(Error::Fetch { position, source }) => Some((position, Err(*source))),
            // fetch_one wraps every failure in Error::Fetch
            Err(_) => None,
        })
        .collect())
}
