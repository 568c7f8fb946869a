//! Archiver worker: turn one [`Batch`] into one [`ArchiveArtifact`]
//!
//! Members are fetched in batch order, hashed, and appended to the TAR
//! stream while the byte range of every record is captured for the manifest.
//! A member that cannot be read is skipped — the stream position is not
//! rewound, the member simply contributes no manifest row — and the worker
//! carries on with the rest of the batch.

mod writer;

pub use writer::{MemberRange, TarStream};

use bytes::Bytes;
use chrono::Utc;
use opendal::Operator;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::RetryConfig;
use crate::error::{ArchiveError, Error, Result};
use crate::manifest::ManifestEntry;
use crate::retry::retry_with_backoff;
use crate::types::{ArchiveArtifact, Batch, FileRef, SourceLocator, archive_file_name, manifest_file_name};

/// Everything a worker needs besides the batch itself
pub(crate) struct WorkerContext {
    /// Run timestamp used in artifact names
    pub timestamp: String,
    /// Gzip the TAR stream
    pub compress: bool,
    /// Retry policy for object GETs
    pub retry: RetryConfig,
    /// Operator over the source bucket, when the source is an object store
    pub source_operator: Option<Operator>,
}

/// Assemble the TAR and manifest for one batch.
///
/// `tar_location` is the destination-side location the manifest rows point
/// at (the sink knows how its keys/paths are laid out).
pub(crate) async fn build_artifact(
    ctx: &Arc<WorkerContext>,
    tar_location: &str,
    batch: &Batch,
) -> Result<ArchiveArtifact> {
    let archive_name = archive_file_name(&ctx.timestamp, batch.ordinal, ctx.compress);
    let manifest_name = manifest_file_name(&ctx.timestamp, batch.ordinal);
    let date = Utc::now().date_naive();
    let mtime = Utc::now().timestamp().max(0) as u64;

    let mut stream = TarStream::new(ctx.compress);
    let mut entries: Vec<ManifestEntry> = Vec::with_capacity(batch.files.len());
    let mut used_names: HashSet<String> = HashSet::with_capacity(batch.files.len());
    let mut members_failed: u64 = 0;
    let mut payload_bytes: u64 = 0;

    for file in &batch.files {
        let content = match fetch_member(ctx, file).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(
                    source = %file.source,
                    member = file.member_name.as_str(),
                    error = %e,
                    "Skipping member that could not be read"
                );
                members_failed += 1;
                continue;
            }
        };

        let member_name = unique_member_name(&mut used_names, &file.member_name);
        if member_name != file.member_name {
            tracing::warn!(
                member = file.member_name.as_str(),
                renamed_to = member_name.as_str(),
                ordinal = batch.ordinal,
                "Duplicate member name within batch, renamed"
            );
        }

        let md5_hex = format!("{:x}", md5::compute(&content));
        let range = stream
            .append_member(&member_name, &content, mtime)
            .map_err(|e| ArchiveError::AppendFailed {
                member: member_name.clone(),
                archive: archive_name.clone(),
                reason: e.to_string(),
            })?;

        payload_bytes += content.len() as u64;
        entries.push(ManifestEntry {
            tar_location: tar_location.to_string(),
            original_name: file.source.to_string(),
            date,
            size_bytes: content.len() as u64,
            start_bytes: range.start,
            stop_bytes: range.stop,
            md5_hex,
        });
    }

    let tar_bytes = stream.finish().map_err(|e| ArchiveError::FinalizeFailed {
        archive: archive_name.clone(),
        reason: e.to_string(),
    })?;

    Ok(ArchiveArtifact {
        archive_name,
        manifest_name,
        tar_bytes: Bytes::from(tar_bytes),
        manifest_text: crate::manifest::render(&entries),
        members_ok: entries.len() as u64,
        members_failed,
        payload_bytes,
    })
}

/// Read one member's content. Filesystem reads are not retried; object GETs
/// go through the retry policy before giving up on the member.
async fn fetch_member(ctx: &WorkerContext, file: &FileRef) -> Result<Bytes> {
    match &file.source {
        SourceLocator::Path(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
        SourceLocator::Object { key, .. } => {
            let op = ctx
                .source_operator
                .as_ref()
                .ok_or_else(|| Error::config("object-store member without a source operator"))?;
            retry_with_backoff(&ctx.retry, || async {
                let buffer = op.read(key).await?;
                Ok::<_, Error>(buffer.to_bytes())
            })
            .await
        }
    }
}

/// Deterministic numeric-suffix rename for duplicate member names
fn unique_member_name(used: &mut HashSet<String>, name: &str) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = format!("{name}.{n}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
