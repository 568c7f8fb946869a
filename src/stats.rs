//! Run statistics and the end-of-run report

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::BatchPolicy;
use crate::utils::{format_duration, format_size};

/// Monotonic counters for a single run
///
/// Shared across the reader, the workers and the pipeline driver; every
/// mutation goes through an atomic add, every read through a snapshot.
#[derive(Debug, Default)]
pub struct RunStats {
    files_ok: AtomicU64,
    files_failed: AtomicU64,
    archives_written: AtomicU64,
    manifests_written: AtomicU64,
    bytes_transferred: AtomicU64,
}

impl RunStats {
    /// Create a zeroed counter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Count successfully archived members
    pub fn add_files_ok(&self, n: u64) {
        self.files_ok.fetch_add(n, Ordering::Relaxed);
    }

    /// Count members that could not be archived
    pub fn add_files_failed(&self, n: u64) {
        self.files_failed.fetch_add(n, Ordering::Relaxed);
    }

    /// Count a persisted archive
    pub fn add_archive_written(&self) {
        self.archives_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a persisted manifest
    pub fn add_manifest_written(&self) {
        self.manifests_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Count source payload bytes successfully archived
    pub fn add_bytes_transferred(&self, n: u64) {
        self.bytes_transferred.fetch_add(n, Ordering::Relaxed);
    }

    /// Take a consistent-enough snapshot for reporting
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            files_ok: self.files_ok.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            archives_written: self.archives_written.load(Ordering::Relaxed),
            manifests_written: self.manifests_written.load(Ordering::Relaxed),
            bytes_transferred: self.bytes_transferred.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RunStats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Successfully archived members
    pub files_ok: u64,
    /// Members that could not be archived
    pub files_failed: u64,
    /// Archives persisted by the sink
    pub archives_written: u64,
    /// Manifests persisted by the sink
    pub manifests_written: u64,
    /// Source payload bytes successfully archived
    pub bytes_transferred: u64,
}

/// End-of-run summary printed to stdout
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Wall-clock start of the run
    pub started: DateTime<Utc>,
    /// Wall-clock end of the run
    pub finished: DateTime<Utc>,
    /// The run timestamp used in artifact names
    pub timestamp: String,
    /// Source description
    pub source: String,
    /// Destination description
    pub destination: String,
    /// Active batching policy
    pub policy: BatchPolicy,
    /// Worker count
    pub workers: usize,
    /// Final counters
    pub stats: StatsSnapshot,
}

impl RunReport {
    /// Wall-clock duration of the run
    pub fn duration(&self) -> std::time::Duration {
        (self.finished - self.started)
            .to_std()
            .unwrap_or_default()
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let duration = self.duration();
        writeln!(f, "====================================")?;
        writeln!(
            f,
            "Archival run completed in {}",
            format_duration(duration)
        )?;
        writeln!(f, "Started:  {}", self.started.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(f, "Finished: {}", self.finished.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(f, "Run id: {}", self.timestamp)?;
        writeln!(f, "Source: {}", self.source)?;
        writeln!(f, "Destination: {}", self.destination)?;
        writeln!(f, "Policy: {}", self.policy.describe())?;
        writeln!(f, "Workers: {}", self.workers)?;
        writeln!(f, "Files archived: {}", self.stats.files_ok)?;
        writeln!(f, "Files failed: {}", self.stats.files_failed)?;
        writeln!(f, "Archives written: {}", self.stats.archives_written)?;
        writeln!(f, "Manifests written: {}", self.stats.manifests_written)?;
        writeln!(
            f,
            "Bytes transferred: {}",
            format_size(self.stats.bytes_transferred)
        )?;
        let secs = duration.as_secs_f64();
        if secs > 0.0 {
            let rate = (self.stats.bytes_transferred as f64 / secs) as u64;
            writeln!(f, "Average transfer rate: {}/s", format_size(rate))?;
        }
        write!(f, "====================================")
    }
}
