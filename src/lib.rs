//! # lightcurve-dl
//!
//! Library for retrieving forced-photometry light curves from the ZTF batch
//! forced-photometry service.
//!
//! ## Design Philosophy
//!
//! lightcurve-dl is designed to be:
//! - **Library-first** - No CLI, purely a Rust crate for embedding
//! - **Sensible defaults** - The public service endpoints and polling cadence work out of the box
//! - **Event-driven** - Consumers subscribe to progress events instead of scraping logs
//! - **Testable** - The service and the clock are traits, so a retrieval runs in tests without network or real delays
//!
//! ## Quick Start
//!
//! ```no_run
//! use lightcurve_dl::{Config, Retriever, positions::read_positions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::with_credentials("me@example.com", "service-password");
//!     let retriever = Retriever::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = retriever.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let positions = read_positions("List_of_RA_Dec.txt").await?;
//!     let retrieval = retriever.retrieve(&positions).await?;
//!     retrieval.results.write_json("results.json").await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Exit-code classification
pub mod classify;
/// Injectable time source
pub mod clock;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Light-curve parsing and normalization
pub mod normalize;
/// Result persistence
pub mod output;
/// Position list input
pub mod positions;
/// Submitted versus finished job reconciliation
pub mod reconcile;
/// Retrieval orchestration
pub mod retriever;
/// Retry logic with exponential backoff
pub mod retry;
/// Forced-photometry service interface
pub mod service;
/// Job status table parsing
pub mod status_table;
/// Job submission
pub mod submission;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use classify::{Classification, classify};
pub use clock::{Clock, InstantClock, TokioClock};
pub use config::{Config, FailurePolicy, SubmissionMode};
pub use error::{Error, Result, SchemaError};
pub use retriever::Retriever;
pub use service::{HttpPhotometryService, PhotometryService};
pub use submission::SubmissionReceipt;
pub use types::{
    Disposition, Event, JobRow, LightCurve, PhotometricRecord, Position, PositionOutcome,
    ResultSet, Retrieval,
};

/// Run a retrieval that stops cleanly on a termination signal.
///
/// On a signal the retriever is cancelled and [`Error::Cancelled`] is returned.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use lightcurve_dl::{Config, Position, Retriever, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let retriever = Retriever::new(Config::with_credentials("me@example.com", "pw"))?;
///     let positions = [Position::new(10.1234567, 20.7654321)];
///
///     let retrieval = run_with_shutdown(&retriever, &positions).await?;
///     println!("{} light curves", retrieval.results.with_data());
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(retriever: &Retriever, positions: &[Position]) -> Result<Retrieval> {
    tokio::select! {
        result = retriever.retrieve(positions) => result,
        _ = wait_for_signal() => {
            retriever.cancel();
            Err(Error::Cancelled)
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, cancelling retrieval"),
                _ = sigint.recv() => tracing::info!("Received SIGINT, cancelling retrieval"),
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT, cancelling retrieval");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM, cancelling retrieval");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C, cancelling retrieval");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
