//! Source Reader: enumerate inputs into a single ordered stream of [`FileRef`]s
//!
//! Exactly one of three modes per run: a filesystem walk, a paginated object
//! listing, or an explicit input list. The stream is lazy, finite and
//! non-restartable; ordering is whatever the underlying source yields.
//!
//! The reader never retries. Per-file problems (unreadable file, missing
//! listed path) are logged and counted as failed; anything that could
//! silently truncate the enumeration aborts the run.

mod fs;
mod input_list;
mod object_store;

pub(crate) use object_store::normalize_prefix;

use opendal::Operator;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::SourceSpec;
use crate::error::Result;
use crate::manifest;
use crate::stats::RunStats;
use crate::types::FileRef;

/// The reader task: feeds the file channel until the source is exhausted,
/// the pipeline shuts down, or a fatal enumeration error occurs.
pub(crate) struct SourceReader {
    spec: SourceSpec,
    operator: Option<Operator>,
    stats: Arc<RunStats>,
}

impl SourceReader {
    pub(crate) fn new(spec: SourceSpec, operator: Option<Operator>, stats: Arc<RunStats>) -> Self {
        Self {
            spec,
            operator,
            stats,
        }
    }

    pub(crate) async fn run(
        self,
        tx: mpsc::Sender<FileRef>,
        cancel: CancellationToken,
    ) -> Result<()> {
        match &self.spec {
            SourceSpec::FsWalk { root } => {
                fs::walk(root.clone(), tx, cancel, Arc::clone(&self.stats)).await
            }
            SourceSpec::ObjectListing { bucket, prefix } => {
                let op = self.require_operator()?;
                object_store::list_objects(op, bucket, prefix, tx, cancel, &self.stats).await
            }
            SourceSpec::FsList { input_file } => {
                input_list::read_list(input_file, input_list::ListMode::Fs, tx, cancel, &self.stats)
                    .await
            }
            SourceSpec::ObjectList { input_file, bucket } => {
                let op = self.require_operator()?;
                input_list::read_list(
                    input_file,
                    input_list::ListMode::Object { op, bucket },
                    tx,
                    cancel,
                    &self.stats,
                )
                .await
            }
        }
    }

    fn require_operator(&self) -> Result<&Operator> {
        self.operator.as_ref().ok_or_else(|| {
            crate::error::Error::config("object-store source requires an operator")
        })
    }
}

/// Reject a candidate whose names cannot be represented in a manifest row.
///
/// Returns false (and counts the failure) when the member or source name
/// contains the manifest delimiter.
fn representable(file: &FileRef, stats: &RunStats) -> bool {
    let source_name = file.source.to_string();
    for name in [file.member_name.as_str(), source_name.as_str()] {
        if manifest::validate_name(name).is_err() {
            tracing::warn!(
                name = name,
                "Skipping file whose name contains the manifest delimiter"
            );
            stats.add_files_failed(1);
            return false;
        }
    }
    true
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceLocator;
    use std::path::PathBuf;

    #[test]
    fn delimiter_in_member_name_is_not_representable() {
        let stats = RunStats::new();
        let file = FileRef {
            source: SourceLocator::Path(PathBuf::from("/data/ok.txt")),
            member_name: "bad|name.txt".to_string(),
            size_bytes: 1,
        };
        assert!(!representable(&file, &stats));
        assert_eq!(stats.snapshot().files_failed, 1);
    }

    #[test]
    fn plain_names_are_representable() {
        let stats = RunStats::new();
        let file = FileRef {
            source: SourceLocator::Path(PathBuf::from("/data/ok.txt")),
            member_name: "ok.txt".to_string(),
            size_bytes: 1,
        };
        assert!(representable(&file, &stats));
        assert_eq!(stats.snapshot().files_failed, 0);
    }
}
