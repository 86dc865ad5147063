//! Retrieve light curves for a position list
//!
//! This demo mirrors the classic retrieval workflow:
//! - Read `List_of_RA_Dec.txt` (one "ra dec" pair per line)
//! - Poll the job status table until every position has a finished job
//! - Fetch and normalize each light curve
//! - Write `results.json` and `manifest.json`
//!
//! Credentials come from the `ZTF_EMAIL` and `ZTF_PASSWORD` environment
//! variables. Set `RUST_LOG=lightcurve_dl=debug` for per-request logging.
//!
//! ```text
//! cargo run --example retrieve -- List_of_RA_Dec.txt results.json
//! ```

use lightcurve_dl::output::write_manifest;
use lightcurve_dl::positions::read_positions;
use lightcurve_dl::{Config, Event, FailurePolicy, Retriever, run_with_shutdown};
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut args = env::args().skip(1);
    let input = args.next().unwrap_or_else(|| "List_of_RA_Dec.txt".to_string());
    let output = args.next().unwrap_or_else(|| "results.json".to_string());

    let mut config = Config::with_credentials(env::var("ZTF_EMAIL")?, env::var("ZTF_PASSWORD")?);
    if env::var("LIGHTCURVE_PARTIAL").is_ok() {
        config.fetch.failure_policy = FailurePolicy::Partial;
    }
    let retriever = Retriever::new(config)?;

    let mut events = retriever.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::Pending { attempt, pending } => {
                    println!("… attempt {}: {} positions still pending", attempt, pending);
                }
                Event::PositionSkipped {
                    position, message, ..
                } => {
                    println!("∅ {}: {}", position, message);
                }
                Event::Fetched {
                    position,
                    epochs,
                    detections,
                } => {
                    println!("✓ {}: {} epochs, {} detections", position, epochs, detections);
                }
                Event::FetchFailed { position, error } => {
                    println!("✗ {}: {}", position, error);
                }
                _ => {}
            }
        }
    });

    let positions = read_positions(&input).await?;
    println!("Retrieving light curves for {} positions", positions.len());

    let retrieval = match run_with_shutdown(&retriever, &positions).await {
        Ok(retrieval) => retrieval,
        Err(e) => {
            eprintln!("Retrieval failed [{}]: {}", e.error_code(), e);
            return Err(e.into());
        }
    };

    retrieval.results.write_json(&output).await?;
    write_manifest(retrieval.manifest(), "manifest.json").await?;
    println!(
        "Wrote {} ({} of {} positions with data)",
        output,
        retrieval.results.with_data(),
        retrieval.results.len()
    );

    Ok(())
}
