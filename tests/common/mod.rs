//! Shared helpers for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tarpack::manifest::ManifestEntry;
use tarpack::stats::RunReport;
use tarpack::{BatchPolicy, Config, DestinationSpec, Pipeline, SourceSpec};

/// A fs→fs config with default ambient settings
pub fn fs_config(src: &Path, dst: &Path, policy: BatchPolicy) -> Config {
    Config {
        source: SourceSpec::FsWalk {
            root: src.to_path_buf(),
        },
        destination: DestinationSpec::Fs {
            root: dst.to_path_buf(),
        },
        policy,
        workers: 4,
        compress: false,
        retry: Default::default(),
        transfer: Default::default(),
        s3: Default::default(),
    }
}

/// Run a pipeline to completion, panicking on fatal errors
pub async fn run(config: Config) -> RunReport {
    let pipeline = Pipeline::new(config).expect("config should validate");
    pipeline.run().await.expect("run should not be fatal")
}

/// Sorted list of files in a destination subdirectory
pub fn files_in(dst: &Path, sub: &str) -> Vec<PathBuf> {
    let dir = dst.join(sub);
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)
        .expect("destination subdirectory should be readable")
        .map(|e| e.expect("dir entry").path())
        .collect();
    files.sort();
    files
}

/// Sorted archive paths under `<dst>/archives/`
pub fn archives_in(dst: &Path) -> Vec<PathBuf> {
    files_in(dst, "archives")
}

/// Sorted manifest paths under `<dst>/manifests/`
pub fn manifests_in(dst: &Path) -> Vec<PathBuf> {
    files_in(dst, "manifests")
}

/// Parse a manifest file into entries
pub fn read_manifest(path: &Path) -> Vec<ManifestEntry> {
    let text = std::fs::read_to_string(path).expect("manifest should be readable");
    tarpack::manifest::parse(&text).expect("manifest should parse")
}

/// All manifest entries of a run, in manifest-name order
pub fn all_entries(dst: &Path) -> Vec<ManifestEntry> {
    manifests_in(dst)
        .iter()
        .flat_map(|m| read_manifest(m))
        .collect()
}

/// Create `count` files of `size` bytes each under `root`, named `f000`…,
/// with distinct content
pub fn populate_tree(root: &Path, count: usize, size: usize) {
    for i in 0..count {
        let mut content = vec![b'a' + (i % 26) as u8; size];
        // stamp the index so every file hashes differently
        let stamp = format!("{i:08}");
        let stamp = stamp.as_bytes();
        let n = stamp.len().min(content.len());
        content[..n].copy_from_slice(&stamp[..n]);
        std::fs::write(root.join(format!("f{i:03}")), content).expect("write fixture");
    }
}

/// The ordinal parsed from an `archive_<ts>_<ordinal>.tar[.gz]` or
/// `manifest_<ts>_<ordinal>.csv` filename
pub fn ordinal_of(path: &Path) -> u32 {
    let stem = path
        .file_name()
        .expect("file name")
        .to_string_lossy()
        .into_owned();
    let stem = stem
        .trim_end_matches(".tar.gz")
        .trim_end_matches(".tar")
        .trim_end_matches(".csv");
    stem.rsplit('_')
        .next()
        .expect("ordinal segment")
        .parse()
        .expect("numeric ordinal")
}
