//! # tarpack
//!
//! Aggregate very large numbers of small files into a modest number of TAR
//! archives suitable for bulk object-storage ingest, and record every member's
//! byte range in a companion manifest so that a single member can later be
//! restored with one ranged read.
//!
//! ## Design Philosophy
//!
//! - **Producer/consumer pipeline** - one reader, one batcher, N archiver
//!   workers, connected by bounded channels that provide back-pressure
//! - **Manifest as contract** - every row is a promise that a ranged read of
//!   `[start_bytes, stop_bytes]` yields a valid single-member TAR substream
//! - **Per-member failure isolation** - one unreadable file never sinks a run
//! - **Library-first** - the `tarpack` and `tarpack-restore` binaries are thin
//!   clap front ends over this crate
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::PathBuf;
//! use tarpack::{BatchPolicy, Config, DestinationSpec, Pipeline, SourceSpec};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         source: SourceSpec::FsWalk {
//!             root: PathBuf::from("/data/small-files"),
//!         },
//!         destination: DestinationSpec::Fs {
//!             root: PathBuf::from("/archive-out"),
//!         },
//!         policy: BatchPolicy::Count { max_files: 1000 },
//!         workers: 4,
//!         compress: false,
//!         retry: Default::default(),
//!         transfer: Default::default(),
//!         s3: Default::default(),
//!     };
//!
//!     let pipeline = Pipeline::new(config)?;
//!     let report = tarpack::run_with_shutdown(pipeline).await?;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Archiver worker: TAR assembly with offset tracking
pub mod archive;
/// Batching policies and the batcher task
pub mod batcher;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Manifest rows and rendering
pub mod manifest;
/// Pipeline orchestration
pub mod pipeline;
/// Ranged restore of single members
pub mod restore;
/// Retry logic with exponential backoff
pub mod retry;
/// Sinks: filesystem and object-store destinations
pub mod sink;
/// Source readers: filesystem walk, object listing, input list
pub mod source;
/// Run statistics and reporting
pub mod stats;
/// Object-store operator construction
pub mod storage;
/// Core types
pub mod types;
/// Size and duration helpers
pub mod utils;

// Re-export commonly used types
pub use config::{BatchPolicy, Config, DestinationSpec, RetryConfig, S3Options, SourceSpec, TransferConfig};
pub use error::{ArchiveError, Error, ManifestError, Result, SourceError};
pub use manifest::ManifestEntry;
pub use pipeline::Pipeline;
pub use restore::ArchiveLocation;
pub use stats::{RunReport, RunStats, StatsSnapshot};
pub use types::{ArchiveArtifact, Batch, FileRef, SourceLocator};

/// Run the pipeline with graceful signal handling.
///
/// A termination signal cancels the run's token: enumeration stops, in-flight
/// archives finish and are persisted, queued batches are discarded and
/// counted failed, and the report still comes back.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(pipeline: Pipeline) -> Result<RunReport> {
    let cancel = pipeline.cancellation_token();
    let watcher = tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown signal received, finishing in-flight archives");
        cancel.cancel();
    });

    let report = pipeline.run().await;
    watcher.abort();
    report
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
        }
        (Err(_), Err(_)) => {
            tracing::error!("Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
