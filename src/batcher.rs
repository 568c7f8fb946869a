//! Batcher: fold the file stream into batches per the active policy
//!
//! Close-before-append semantics: when adding a member would cross the
//! threshold and the open batch is non-empty, the open batch is emitted and
//! the member starts a fresh one. A member larger than the size threshold on
//! its own therefore ends up alone in its own batch — TAR members are atomic
//! and are never split across archives. The final open batch is flushed when
//! the file stream ends.
//!
//! Ordinals are drawn from the shared sequence at emission time, so archive
//! names stay dense and gap-free regardless of worker completion order.
//! Back-pressure comes from the bounded batch channel: the batcher (and
//! transitively the reader) blocks while all workers are busy.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::BatchPolicy;
use crate::error::{Error, Result};
use crate::types::{ArchiveSequence, Batch, FileRef};

/// The batcher task
pub(crate) struct Batcher {
    policy: BatchPolicy,
    sequence: Arc<ArchiveSequence>,
}

impl Batcher {
    pub(crate) fn new(policy: BatchPolicy, sequence: Arc<ArchiveSequence>) -> Self {
        Self { policy, sequence }
    }

    pub(crate) async fn run(
        self,
        mut rx: mpsc::Receiver<FileRef>,
        tx: mpsc::Sender<Batch>,
    ) -> Result<()> {
        let mut open: Vec<FileRef> = Vec::new();
        let mut open_bytes: u64 = 0;

        while let Some(file) = rx.recv().await {
            if !open.is_empty()
                && self
                    .policy
                    .would_exceed(open.len(), open_bytes, file.size_bytes)
            {
                self.emit(&mut open, &mut open_bytes, &tx).await?;
            }
            open_bytes += file.size_bytes;
            open.push(file);
        }

        if !open.is_empty() {
            self.emit(&mut open, &mut open_bytes, &tx).await?;
        }

        Ok(())
    }

    async fn emit(
        &self,
        open: &mut Vec<FileRef>,
        open_bytes: &mut u64,
        tx: &mpsc::Sender<Batch>,
    ) -> Result<()> {
        let ordinal = self.sequence.next().await;
        let batch = Batch {
            ordinal,
            files: std::mem::take(open),
            total_bytes: std::mem::take(open_bytes),
        };
        tracing::debug!(
            ordinal = batch.ordinal,
            files = batch.files.len(),
            bytes = batch.total_bytes,
            "Batch emitted"
        );
        tx.send(batch).await.map_err(|_| Error::ShuttingDown)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceLocator;
    use std::path::PathBuf;

    fn file(name: &str, size: u64) -> FileRef {
        FileRef {
            source: SourceLocator::Path(PathBuf::from(format!("/src/{name}"))),
            member_name: name.to_string(),
            size_bytes: size,
        }
    }

    async fn run_batcher(policy: BatchPolicy, files: Vec<FileRef>) -> Vec<Batch> {
        let (file_tx, file_rx) = mpsc::channel(64);
        let (batch_tx, mut batch_rx) = mpsc::channel(64);
        let batcher = Batcher::new(policy, Arc::new(ArchiveSequence::new()));

        let feeder = tokio::spawn(async move {
            for f in files {
                file_tx.send(f).await.unwrap();
            }
        });
        batcher.run(file_rx, batch_tx).await.unwrap();
        feeder.await.unwrap();

        let mut batches = Vec::new();
        while let Ok(batch) = batch_rx.try_recv() {
            batches.push(batch);
        }
        batches
    }

    #[tokio::test]
    async fn count_policy_cuts_at_max_files() {
        let files: Vec<FileRef> = (0..7).map(|i| file(&format!("f{i}"), 10)).collect();
        let batches = run_batcher(BatchPolicy::Count { max_files: 3 }, files).await;

        let sizes: Vec<usize> = batches.iter().map(|b| b.files.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        let ordinals: Vec<u32> = batches.iter().map(|b| b.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn size_policy_moves_triggering_member_to_next_batch() {
        // Five 1 MiB files with a 2.5 MiB threshold: [2, 2, 1]
        let mib = 1024 * 1024;
        let files: Vec<FileRef> = (0..5).map(|i| file(&format!("f{i}"), mib)).collect();
        let batches = run_batcher(
            BatchPolicy::Size {
                max_bytes: mib * 5 / 2,
            },
            files,
        )
        .await;

        let sizes: Vec<usize> = batches.iter().map(|b| b.files.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        let ordinals: Vec<u32> = batches.iter().map(|b| b.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn oversized_member_gets_its_own_batch() {
        let batches = run_batcher(
            BatchPolicy::Size { max_bytes: 100 },
            vec![file("small", 40), file("huge", 5000), file("tail", 40)],
        )
        .await;

        let names: Vec<Vec<&str>> = batches
            .iter()
            .map(|b| b.files.iter().map(|f| f.member_name.as_str()).collect())
            .collect();
        assert_eq!(names, vec![vec!["small"], vec!["huge"], vec!["tail"]]);
    }

    #[tokio::test]
    async fn oversized_member_first_is_still_alone() {
        let batches = run_batcher(
            BatchPolicy::Size { max_bytes: 100 },
            vec![file("huge", 5000), file("tail", 40)],
        )
        .await;
        let sizes: Vec<usize> = batches.iter().map(|b| b.files.len()).collect();
        assert_eq!(sizes, vec![1, 1]);
    }

    #[tokio::test]
    async fn max_count_one_makes_one_archive_per_file() {
        let files: Vec<FileRef> = (0..4).map(|i| file(&format!("f{i}"), 1)).collect();
        let batches = run_batcher(BatchPolicy::Count { max_files: 1 }, files).await;
        assert_eq!(batches.len(), 4);
        assert!(batches.iter().all(|b| b.files.len() == 1));
    }

    #[tokio::test]
    async fn empty_stream_emits_nothing() {
        let batches = run_batcher(BatchPolicy::Count { max_files: 3 }, Vec::new()).await;
        assert!(batches.is_empty());
    }

    #[tokio::test]
    async fn final_open_batch_is_flushed() {
        let batches = run_batcher(
            BatchPolicy::Count { max_files: 10 },
            vec![file("a", 1), file("b", 2)],
        )
        .await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].files.len(), 2);
        assert_eq!(batches[0].total_bytes, 3);
        assert_eq!(batches[0].ordinal, 1);
    }

    #[tokio::test]
    async fn batch_preserves_input_order() {
        let files: Vec<FileRef> = (0..5).map(|i| file(&format!("f{i}"), 1)).collect();
        let batches = run_batcher(BatchPolicy::Count { max_files: 10 }, files).await;
        let names: Vec<&str> = batches[0]
            .files
            .iter()
            .map(|f| f.member_name.as_str())
            .collect();
        assert_eq!(names, vec!["f0", "f1", "f2", "f3", "f4"]);
    }
}
