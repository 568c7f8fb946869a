//! tarpack-restore: pull one member out of an archive by manifest byte range
//!
//! Takes the `(tarfile_name, start_bytes, stop_bytes)` triple from a manifest
//! row, issues a ranged read against the archive, and unpacks the member with
//! a stock TAR reader. Works against local archives and S3 objects; only
//! uncompressed archives support ranged restore.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use tarpack::restore::{self, ArchiveLocation};
use tarpack::{S3Options, TransferConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ArchiveKind {
    /// Local archive file
    Fs,
    /// Archive object in S3
    S3,
}

#[derive(Debug, Parser)]
#[command(
    name = "tarpack-restore",
    version,
    about = "Restore a single member from a TAR archive via its manifest byte range"
)]
struct Cli {
    /// Where the archive lives
    #[arg(long, value_enum, default_value = "fs")]
    archive_type: ArchiveKind,

    /// Archive path (fs) or object key (s3), as recorded in the manifest
    #[arg(long)]
    archive: String,

    /// Bucket holding the archive (s3 only)
    #[arg(long)]
    bucket: Option<String>,

    /// First byte of the member's record (manifest start_bytes)
    #[arg(long)]
    start_byte: u64,

    /// Last byte of the member's record (manifest stop_bytes)
    #[arg(long)]
    stop_byte: u64,

    /// Directory the member is unpacked into
    #[arg(long, default_value = "restored_data")]
    output_dir: PathBuf,

    /// AWS profile to load credentials from
    #[arg(long)]
    profile_name: Option<String>,

    /// Bucket region
    #[arg(long)]
    region: Option<String>,

    /// Custom S3 endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Log verbosity (DEBUG, INFO, WARNING, ERROR)
    #[arg(long, default_value = "INFO")]
    log_level: String,
}

fn init_tracing(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let directive = match level.to_uppercase().as_str() {
        "WARNING" => "warn".to_string(),
        other => other.to_lowercase(),
    };
    let env_filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing::subscriber::set_global_default(
        tracing_subscriber::registry().with(env_filter).with(fmt::layer()),
    );
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    if let Some(profile) = &cli.profile_name {
        // The credential chain reads AWS_PROFILE. The runtime has not started
        // yet, so no other thread can observe the mutation.
        unsafe { std::env::set_var("AWS_PROFILE", profile) };
    }

    let (location, operator) = match cli.archive_type {
        ArchiveKind::Fs => (ArchiveLocation::Path(PathBuf::from(&cli.archive)), None),
        ArchiveKind::S3 => {
            let bucket = cli
                .bucket
                .clone()
                .context("--bucket is required for --archive-type s3")?;
            let options = S3Options {
                region: cli.region.clone(),
                endpoint: cli.endpoint.clone(),
                storage_class: None,
            };
            let operator = tarpack::storage::build_s3_operator(
                &bucket,
                &options,
                &TransferConfig::default(),
                false,
            )?;
            (
                ArchiveLocation::Object {
                    bucket,
                    key: cli.archive.trim_start_matches('/').to_string(),
                },
                Some(operator),
            )
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let names = runtime.block_on(restore::restore_to_dir(
        &location,
        cli.start_byte,
        cli.stop_byte,
        &cli.output_dir,
        operator.as_ref(),
    ))?;

    for name in names {
        println!("{name}");
    }
    Ok(())
}
