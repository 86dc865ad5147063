//! Job submission
//!
//! Batch mode posts up to [`MAX_BATCH_SIZE`](crate::config::MAX_BATCH_SIZE)
//! positions per request; single mode issues one request per position.
//! Submission is a one-shot pass: a non-2xx answer aborts the remaining
//! requests and is returned as [`Error::HttpStatus`](crate::error::Error).

use crate::config::{SubmissionConfig, SubmissionMode};
use crate::error::Result;
use crate::service::{BatchRequest, PhotometryService, SingleRequest, SubmitResponse};
use crate::types::Position;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Record of one accepted submission request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    /// Number of positions carried by the request
    pub positions: usize,
    /// HTTP status returned by the service
    pub status: u16,
    /// Response body
    pub body: String,
    /// When the service accepted the request
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionReceipt {
    fn new(positions: usize, response: SubmitResponse) -> Self {
        Self {
            positions,
            status: response.status,
            body: response.body,
            submitted_at: Utc::now(),
        }
    }
}

/// Split positions into chunks of at most `batch_size`
///
/// A `batch_size` of zero is treated as one.
pub fn chunk_positions(positions: &[Position], batch_size: usize) -> Vec<&[Position]> {
    positions.chunks(batch_size.max(1)).collect()
}

/// Submit positions to the service according to the configured mode
pub async fn submit_positions(
    service: &dyn PhotometryService,
    config: &SubmissionConfig,
    positions: &[Position],
) -> Result<Vec<SubmissionReceipt>> {
    let mut receipts = Vec::new();

    match config.mode {
        SubmissionMode::Batch => {
            let chunks = chunk_positions(positions, config.batch_size);
            let total = chunks.len();
            for (index, chunk) in chunks.into_iter().enumerate() {
                let request = BatchRequest::new(chunk, config.jd_start, config.jd_end);
                let response = service.submit_batch(&request).await?;
                info!(
                    batch = index + 1,
                    batches = total,
                    positions = chunk.len(),
                    status = response.status,
                    "Submitted batch"
                );
                receipts.push(SubmissionReceipt::new(chunk.len(), response));
            }
        }
        SubmissionMode::Single => {
            for position in positions {
                let request = SingleRequest {
                    position: *position,
                    jd_start: config.jd_start,
                    jd_end: config.jd_end,
                };
                let response = service.submit_single(&request).await?;
                info!(position = %position, status = response.status, "Submitted position");
                receipts.push(SubmissionReceipt::new(1, response));
            }
        }
    }

    Ok(receipts)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::JobRow;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingService {
        batches: Mutex<Vec<usize>>,
        singles: Mutex<Vec<Position>>,
        fail_on_batch: Option<usize>,
    }

    #[async_trait]
    impl PhotometryService for RecordingService {
        async fn query_status(&self) -> Result<Vec<JobRow>> {
            Ok(Vec::new())
        }

        async fn fetch_lightcurve(&self, _reference: &str) -> Result<String> {
            Ok(String::new())
        }

        async fn submit_batch(&self, request: &BatchRequest) -> Result<SubmitResponse> {
            let mut batches = self.batches.lock().unwrap();
            if self.fail_on_batch == Some(batches.len()) {
                return Err(Error::HttpStatus {
                    status: 500,
                    url: "http://service/submit".to_string(),
                    body: "boom".to_string(),
                });
            }
            assert_eq!(request.ra.len(), request.dec.len());
            batches.push(request.len());
            Ok(SubmitResponse {
                status: 200,
                body: "ok".to_string(),
            })
        }

        async fn submit_single(&self, request: &SingleRequest) -> Result<SubmitResponse> {
            self.singles.lock().unwrap().push(request.position);
            Ok(SubmitResponse {
                status: 200,
                body: "ok".to_string(),
            })
        }
    }

    fn positions(n: usize) -> Vec<Position> {
        (0..n)
            .map(|i| Position::new(i as f64 * 0.01, -(i as f64) * 0.001))
            .collect()
    }

    #[test]
    fn chunking_splits_at_batch_size() {
        let input = positions(3400);
        let sizes: Vec<usize> = chunk_positions(&input, 1500).iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![1500, 1500, 400]);

        assert!(chunk_positions(&[], 1500).is_empty());
        assert_eq!(chunk_positions(&input[..3], 0).len(), 3);
    }

    #[tokio::test]
    async fn batch_mode_posts_one_request_per_chunk() {
        let service = RecordingService::default();
        let config = SubmissionConfig::default();

        let receipts = submit_positions(&service, &config, &positions(3400))
            .await
            .unwrap();

        assert_eq!(*service.batches.lock().unwrap(), vec![1500, 1500, 400]);
        let sizes: Vec<usize> = receipts.iter().map(|r| r.positions).collect();
        assert_eq!(sizes, vec![1500, 1500, 400]);
        assert!(service.singles.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn single_mode_submits_each_position() {
        let service = RecordingService::default();
        let config = SubmissionConfig {
            mode: SubmissionMode::Single,
            ..Default::default()
        };
        let input = positions(3);

        let receipts = submit_positions(&service, &config, &input).await.unwrap();

        assert_eq!(receipts.len(), 3);
        assert_eq!(*service.singles.lock().unwrap(), input);
    }

    #[tokio::test]
    async fn failed_batch_stops_submission() {
        let service = RecordingService {
            fail_on_batch: Some(1),
            ..Default::default()
        };
        let config = SubmissionConfig::default();

        let err = submit_positions(&service, &config, &positions(3400))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::HttpStatus { status: 500, .. }));
        assert_eq!(*service.batches.lock().unwrap(), vec![1500]);
    }
}
