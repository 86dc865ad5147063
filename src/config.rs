//! Configuration types for lightcurve-dl
//!
//! A [`Config`] value is passed to the [`Retriever`](crate::Retriever) at
//! construction. Every field has a default matching the public ZTF forced
//! photometry service except the account credentials, which the caller must
//! supply.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest number of positions the service accepts in one batch submission
pub const MAX_BATCH_SIZE: usize = 1500;

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Service endpoints and credentials
    #[serde(default)]
    pub service: ServiceConfig,

    /// Job status polling
    #[serde(default)]
    pub polling: PollingConfig,

    /// Light-curve fetch fan-out
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Position submission
    #[serde(default)]
    pub submission: SubmissionConfig,
}

impl Config {
    /// Create a configuration with default endpoints for the given account
    pub fn with_credentials(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            service: ServiceConfig {
                email: email.into(),
                password: password.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Reject settings the retriever cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.service.email.trim().is_empty() {
            return Err(Error::config("account email is required", "service.email"));
        }
        if self.service.password.is_empty() {
            return Err(Error::config(
                "account password is required",
                "service.password",
            ));
        }
        if url::Url::parse(&self.service.base_url).is_err() {
            return Err(Error::config(
                format!("invalid base URL: {}", self.service.base_url),
                "service.base_url",
            ));
        }
        if self.polling.max_attempts == 0 {
            return Err(Error::config(
                "at least one status query is required",
                "polling.max_attempts",
            ));
        }
        if self.fetch.max_concurrent_fetches == 0 {
            return Err(Error::config(
                "fetch concurrency must be at least 1",
                "fetch.max_concurrent_fetches",
            ));
        }
        let retry = &self.fetch.retry;
        if !retry.backoff_multiplier.is_finite() || retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                format!(
                    "backoff multiplier must be a finite number of at least 1, got {}",
                    retry.backoff_multiplier
                ),
                "fetch.retry.backoff_multiplier",
            ));
        }
        if retry.initial_delay > retry.max_delay {
            return Err(Error::config(
                "initial retry delay exceeds the maximum delay",
                "fetch.retry.initial_delay",
            ));
        }
        if self.submission.batch_size == 0 || self.submission.batch_size > MAX_BATCH_SIZE {
            return Err(Error::config(
                format!("batch size must be between 1 and {MAX_BATCH_SIZE}"),
                "submission.batch_size",
            ));
        }
        if self.submission.jd_end < self.submission.jd_start {
            return Err(Error::config(
                "end JD is before start JD",
                "submission.jd_end",
            ));
        }
        Ok(())
    }
}

/// Basic-auth credential pair
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    /// User name
    pub username: String,
    /// Password
    pub password: String,
}

/// Service endpoints and credentials
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Scheme and host of the service (default: "https://ztfweb.ipac.caltech.edu")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the job status page
    #[serde(default = "default_status_path")]
    pub status_path: String,

    /// Path accepting batch submissions (POST)
    #[serde(default = "default_batch_submit_path")]
    pub batch_submit_path: String,

    /// Path accepting single-position submissions (GET)
    #[serde(default = "default_single_submit_path")]
    pub single_submit_path: String,

    /// Account email used for status queries and submissions
    #[serde(default)]
    pub email: String,

    /// Account password used for status queries and submissions
    #[serde(default)]
    pub password: String,

    /// Shared basic-auth pair gating every forced-photometry endpoint
    ///
    /// This is a service-wide convention, not a per-user secret.
    #[serde(default = "default_fetch_auth")]
    pub fetch_auth: BasicAuth,

    /// Job listing option sent with status queries (default: "All recent jobs")
    #[serde(default = "default_status_option")]
    pub status_option: String,

    /// Timeout applied to every HTTP request (default: 120 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            status_path: default_status_path(),
            batch_submit_path: default_batch_submit_path(),
            single_submit_path: default_single_submit_path(),
            email: String::new(),
            password: String::new(),
            fetch_auth: default_fetch_auth(),
            status_option: default_status_option(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Job status polling configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Maximum number of status queries before giving up (default: 60)
    #[serde(default = "default_poll_attempts")]
    pub max_attempts: u32,

    /// Delay between status queries (default: 60 seconds)
    #[serde(default = "default_poll_interval", with = "duration_millis_serde")]
    pub interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_poll_attempts(),
            interval: default_poll_interval(),
        }
    }
}

/// What happens when a light-curve fetch fails
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole retrieval on the first failed fetch
    #[default]
    FailFast,
    /// Record failed positions as null entries and keep going; fail only if
    /// no fetch succeeded
    Partial,
}

/// Light-curve fetch configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Upper bound on concurrent fetches (default: 4)
    ///
    /// The effective bound is also capped by available parallelism and by the
    /// number of fetch-eligible positions.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Failure handling (default: fail fast)
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Retry of transient fetch failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            failure_policy: FailurePolicy::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// How positions are submitted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionMode {
    /// One POST per chunk of up to `batch_size` positions
    #[default]
    Batch,
    /// One GET per position
    Single,
}

/// Position submission configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Submission mode (default: batch)
    #[serde(default)]
    pub mode: SubmissionMode,

    /// Positions per batch request (default and maximum: 1500)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Start of the requested time window, Julian date
    #[serde(default = "default_jd_start")]
    pub jd_start: f64,

    /// End of the requested time window, Julian date
    #[serde(default = "default_jd_end")]
    pub jd_end: f64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            mode: SubmissionMode::default(),
            batch_size: default_batch_size(),
            jd_start: default_jd_start(),
            jd_end: default_jd_end(),
        }
    }
}

fn default_base_url() -> String {
    "https://ztfweb.ipac.caltech.edu".to_string()
}

fn default_status_path() -> String {
    "/cgi-bin/getBatchForcedPhotometryRequests.cgi".to_string()
}

fn default_batch_submit_path() -> String {
    "/cgi-bin/batchfp.py/submit".to_string()
}

fn default_single_submit_path() -> String {
    "/cgi-bin/requestForcedPhotometry.cgi".to_string()
}

fn default_fetch_auth() -> BasicAuth {
    BasicAuth {
        username: "ztffps".to_string(),
        password: "dontgocrazy!".to_string(),
    }
}

fn default_status_option() -> String {
    "All recent jobs".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_user_agent() -> String {
    concat!("lightcurve-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_poll_attempts() -> u32 {
    60
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_max_concurrent_fetches() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

fn default_jd_start() -> f64 {
    2458216.1234
}

fn default_jd_end() -> f64 {
    2458450.0253
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Millisecond variant, for intervals tests want to shrink
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
