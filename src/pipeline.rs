//! Pipeline orchestration: one reader, one batcher, N archiver workers
//!
//! Stages are connected by two bounded channels. Bounded capacity is the
//! admission control for the whole run: the reader can enumerate millions of
//! small files in seconds and must be throttled by downstream progress, so
//! the file channel holds at most [`FILE_CHANNEL_CAPACITY`] refs and the
//! batch channel at most `2 × workers` batches.
//!
//! Cancellation is cooperative: on the shutdown signal the reader stops
//! enumerating, the batcher flushes its open batch, workers finish the batch
//! they hold, and everything still queued is discarded and counted failed.

use chrono::{Local, Utc};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::archive::{self, WorkerContext};
use crate::batcher::Batcher;
use crate::config::{Config, DestinationSpec};
use crate::error::{Error, Result};
use crate::sink::{ArtifactSink, FsSink, ObjectStoreSink};
use crate::source::SourceReader;
use crate::stats::{RunReport, RunStats};
use crate::storage::build_s3_operator;
use crate::types::{ArchiveSequence, Batch};

/// Capacity of the reader → batcher channel
pub const FILE_CHANNEL_CAPACITY: usize = 1024;

/// One archival run
pub struct Pipeline {
    config: Arc<Config>,
    stats: Arc<RunStats>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Validate the configuration and set up a run
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            stats: Arc::new(RunStats::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Token that triggers graceful shutdown when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The run's shared counters
    pub fn stats(&self) -> Arc<RunStats> {
        Arc::clone(&self.stats)
    }

    /// Drive the run to completion and return the report
    ///
    /// Per-member failures are reflected in the counters, not the return
    /// value; an `Err` here means a fatal configuration or enumeration
    /// problem and the process should exit non-zero.
    pub async fn run(self) -> Result<RunReport> {
        let started = Utc::now();
        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

        tracing::info!(
            source = %self.config.source.describe(),
            destination = %self.config.destination.describe(),
            policy = %self.config.policy.describe(),
            workers = self.config.workers,
            compress = self.config.compress,
            run_id = timestamp.as_str(),
            "Archival run starting"
        );

        let source_operator = match self.config.source.bucket() {
            Some(bucket) => Some(build_s3_operator(
                bucket,
                &self.config.s3,
                &self.config.transfer,
                false,
            )?),
            None => None,
        };

        let sink: Arc<dyn ArtifactSink> = match &self.config.destination {
            DestinationSpec::Fs { root } => Arc::new(FsSink::create(root).await?),
            DestinationSpec::ObjectStore { bucket, prefix } => {
                let archive_op =
                    build_s3_operator(bucket, &self.config.s3, &self.config.transfer, true)?;
                let manifest_op =
                    build_s3_operator(bucket, &self.config.s3, &self.config.transfer, false)?;
                Arc::new(ObjectStoreSink::new(
                    archive_op,
                    manifest_op,
                    prefix,
                    self.config.transfer.clone(),
                    self.config.retry.clone(),
                ))
            }
        };

        let (file_tx, file_rx) = mpsc::channel(FILE_CHANNEL_CAPACITY);
        let (batch_tx, batch_rx) = mpsc::channel(2 * self.config.workers);

        let reader = SourceReader::new(
            self.config.source.clone(),
            source_operator.clone(),
            Arc::clone(&self.stats),
        );
        let reader_cancel = self.cancel.clone();
        let reader_handle = tokio::spawn(async move {
            let result = reader.run(file_tx, reader_cancel.clone()).await;
            if result.is_err() {
                // enumeration failure is fatal: stop handing out queued work
                reader_cancel.cancel();
            }
            result
        });

        let sequence = Arc::new(ArchiveSequence::new());
        let batcher = Batcher::new(self.config.policy.clone(), sequence);
        let batcher_handle = tokio::spawn(batcher.run(file_rx, batch_tx));

        let ctx = Arc::new(WorkerContext {
            timestamp: timestamp.clone(),
            compress: self.config.compress,
            retry: self.config.retry.clone(),
            source_operator,
        });

        let stats = Arc::clone(&self.stats);
        let cancel = self.cancel.clone();
        ReceiverStream::new(batch_rx)
            .for_each_concurrent(self.config.workers, |batch| {
                let ctx = Arc::clone(&ctx);
                let sink = Arc::clone(&sink);
                let stats = Arc::clone(&stats);
                let cancel = cancel.clone();
                async move {
                    process_batch(&ctx, sink.as_ref(), &stats, &cancel, batch).await;
                }
            })
            .await;

        let reader_result = reader_handle
            .await
            .map_err(|e| Error::Other(format!("reader task panicked: {e}")))?;
        let batcher_result = batcher_handle
            .await
            .map_err(|e| Error::Other(format!("batcher task panicked: {e}")))?;
        reader_result?;
        batcher_result?;

        let finished = Utc::now();
        let snapshot = self.stats.snapshot();
        tracing::info!(
            files_ok = snapshot.files_ok,
            files_failed = snapshot.files_failed,
            archives_written = snapshot.archives_written,
            "Archival run finished"
        );

        Ok(RunReport {
            started,
            finished,
            timestamp,
            source: self.config.source.describe(),
            destination: self.config.destination.describe(),
            policy: self.config.policy.clone(),
            workers: self.config.workers,
            stats: snapshot,
        })
    }
}

/// One worker step: batch in, artifact stored (or accounted for)
async fn process_batch(
    ctx: &Arc<WorkerContext>,
    sink: &dyn ArtifactSink,
    stats: &RunStats,
    cancel: &CancellationToken,
    batch: Batch,
) {
    let member_count = batch.files.len() as u64;

    if cancel.is_cancelled() {
        tracing::warn!(
            ordinal = batch.ordinal,
            files = member_count,
            "Discarding queued batch during shutdown"
        );
        stats.add_files_failed(member_count);
        return;
    }

    let archive_name =
        crate::types::archive_file_name(&ctx.timestamp, batch.ordinal, ctx.compress);
    let tar_location = sink.archive_location(&archive_name);

    let artifact = match archive::build_artifact(ctx, &tar_location, &batch).await {
        Ok(artifact) => artifact,
        Err(e) => {
            tracing::error!(
                ordinal = batch.ordinal,
                files = member_count,
                error = %e,
                "Batch failed during archive assembly"
            );
            stats.add_files_failed(member_count);
            return;
        }
    };

    stats.add_files_failed(artifact.members_failed);

    match sink.store(&artifact).await {
        Ok(()) => {
            stats.add_files_ok(artifact.members_ok);
            stats.add_archive_written();
            stats.add_manifest_written();
            stats.add_bytes_transferred(artifact.payload_bytes);
            tracing::info!(
                archive = artifact.archive_name.as_str(),
                files = artifact.members_ok,
                bytes = artifact.tar_bytes.len(),
                "Archive stored"
            );
        }
        Err(e) => {
            tracing::error!(
                archive = artifact.archive_name.as_str(),
                files = artifact.members_ok,
                error = %e,
                "Batch failed during upload, dropping artifact"
            );
            stats.add_files_failed(artifact.members_ok);
        }
    }
}
