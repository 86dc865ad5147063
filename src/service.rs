//! Forced-photometry service interface
//!
//! [`PhotometryService`] is the seam between the retrieval logic and the
//! remote batch service. [`HttpPhotometryService`] talks to the real service
//! over HTTP; tests substitute their own implementations.

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::status_table::StatusTableParser;
use crate::types::{JobRow, Position};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Longest response body kept in an [`Error::HttpStatus`]
const MAX_ERROR_BODY: usize = 512;

/// One batch submission: parallel coordinate lists plus the time window
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Right ascensions, degrees
    pub ra: Vec<f64>,
    /// Declinations, degrees
    pub dec: Vec<f64>,
    /// Start of the time window, Julian date
    pub jd_start: f64,
    /// End of the time window, Julian date
    pub jd_end: f64,
}

impl BatchRequest {
    /// Build a request for a slice of positions
    pub fn new(positions: &[Position], jd_start: f64, jd_end: f64) -> Self {
        Self {
            ra: positions.iter().map(Position::ra).collect(),
            dec: positions.iter().map(Position::dec).collect(),
            jd_start,
            jd_end,
        }
    }

    /// Number of positions in the request
    pub fn len(&self) -> usize {
        self.ra.len()
    }

    /// Whether the request is empty
    pub fn is_empty(&self) -> bool {
        self.ra.is_empty()
    }
}

/// One single-position submission
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SingleRequest {
    /// Position to photometer
    pub position: Position,
    /// Start of the time window, Julian date
    pub jd_start: f64,
    /// End of the time window, Julian date
    pub jd_end: f64,
}

/// Raw answer of a submission endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
}

/// Operations offered by the forced-photometry service
#[async_trait]
pub trait PhotometryService: Send + Sync {
    /// Fetch the job status table for the configured account
    async fn query_status(&self) -> Result<Vec<JobRow>>;

    /// Fetch the raw light-curve table behind a status-table reference
    async fn fetch_lightcurve(&self, reference: &str) -> Result<String>;

    /// Submit up to one batch of positions
    async fn submit_batch(&self, request: &BatchRequest) -> Result<SubmitResponse>;

    /// Submit one position
    async fn submit_single(&self, request: &SingleRequest) -> Result<SubmitResponse>;
}

/// [`PhotometryService`] over HTTP
///
/// One `reqwest` client is built at construction and shared by every request,
/// with the configured timeout applied to each call.
pub struct HttpPhotometryService {
    client: reqwest::Client,
    config: ServiceConfig,
    parser: StatusTableParser,
}

impl HttpPhotometryService {
    /// Create a service client
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            parser: StatusTableParser::new()?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let auth = &self.config.fetch_auth;
        request.basic_auth(&auth.username, Some(&auth.password))
    }

    /// Send a request and return the body, or [`Error::HttpStatus`] for non-2xx
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(u16, String)> {
        let response = request.send().await?;
        let status = response.status();
        let url = strip_query(response.url());
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url,
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }
        debug!(%url, status = status.as_u16(), bytes = body.len(), "Request succeeded");
        Ok((status.as_u16(), body))
    }
}

#[async_trait]
impl PhotometryService for HttpPhotometryService {
    async fn query_status(&self) -> Result<Vec<JobRow>> {
        let request = self.authed(self.client.get(self.url(&self.config.status_path))).query(&[
            ("email", self.config.email.as_str()),
            ("userpass", self.config.password.as_str()),
            ("option", self.config.status_option.as_str()),
            ("action", "Query Database"),
        ]);
        let (_, body) = self.send(request).await?;
        self.parser.parse(&body)
    }

    async fn fetch_lightcurve(&self, reference: &str) -> Result<String> {
        let request = self.authed(self.client.get(self.url(reference)));
        let (_, body) = self.send(request).await?;
        Ok(body)
    }

    async fn submit_batch(&self, request: &BatchRequest) -> Result<SubmitResponse> {
        let form = [
            ("ra", serde_json::to_string(&request.ra)?),
            ("dec", serde_json::to_string(&request.dec)?),
            ("jdstart", serde_json::to_string(&request.jd_start)?),
            ("jdend", serde_json::to_string(&request.jd_end)?),
            ("email", self.config.email.clone()),
            ("userpass", self.config.password.clone()),
        ];
        let http = self
            .authed(self.client.post(self.url(&self.config.batch_submit_path)))
            .form(&form);
        let (status, body) = self.send(http).await?;
        Ok(SubmitResponse { status, body })
    }

    async fn submit_single(&self, request: &SingleRequest) -> Result<SubmitResponse> {
        let params = [
            ("ra", request.position.ra().to_string()),
            ("dec", request.position.dec().to_string()),
            ("jdstart", request.jd_start.to_string()),
            ("jdend", request.jd_end.to_string()),
            ("email", self.config.email.clone()),
            ("userpass", self.config.password.clone()),
        ];
        let http = self
            .authed(self.client.get(self.url(&self.config.single_submit_path)))
            .query(&params);
        let (status, body) = self.send(http).await?;
        Ok(SubmitResponse { status, body })
    }
}

// Status queries carry the account password in the query string
fn strip_query(url: &url::Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
