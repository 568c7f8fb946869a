//! tarpack: archive huge numbers of small files into TARs with byte-range manifests

use anyhow::{Context, bail};
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

use tarpack::{BatchPolicy, Config, DestinationSpec, Pipeline, S3Options, SourceSpec};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EndpointType {
    /// Local filesystem
    Fs,
    /// S3-compatible object store
    S3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CombineMode {
    /// Cut batches by cumulative payload size
    Size,
    /// Cut batches by member count
    Count,
}

#[derive(Debug, Parser)]
#[command(
    name = "tarpack",
    version,
    about = "Aggregate small files into TAR archives with byte-range manifests"
)]
struct Cli {
    /// Source pipeline selector
    #[arg(long, value_enum)]
    src_type: EndpointType,

    /// Destination pipeline selector
    #[arg(long, value_enum)]
    dst_type: EndpointType,

    /// Source directory (fs source)
    #[arg(long)]
    src_path: Option<PathBuf>,

    /// Source bucket (s3 source)
    #[arg(long)]
    src_bucket: Option<String>,

    /// Key prefix to list under (s3 source)
    #[arg(long, default_value = "")]
    src_prefix: String,

    /// Destination directory (fs destination)
    #[arg(long)]
    dst_path: Option<PathBuf>,

    /// Destination bucket (s3 destination)
    #[arg(long)]
    dst_bucket: Option<String>,

    /// Key prefix for archives and manifests (s3 destination)
    #[arg(long, default_value = "")]
    dst_prefix: String,

    /// Archive the paths/keys listed in this file instead of scanning the source
    #[arg(long)]
    input_file: Option<PathBuf>,

    /// Batching policy
    #[arg(long, value_enum)]
    combine: CombineMode,

    /// Size threshold per archive, e.g. 10GB (size policy)
    #[arg(long, value_parser = parse_size_arg)]
    max_tarfile_size: Option<u64>,

    /// Member-count threshold per archive (count policy)
    #[arg(long)]
    max_file_number: Option<u64>,

    /// Number of archiver workers
    #[arg(long, default_value_t = 4)]
    max_process: usize,

    /// Gzip-compress archives (true|false)
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    compress: bool,

    /// AWS profile to load credentials from
    #[arg(long)]
    profile_name: Option<String>,

    /// Bucket region
    #[arg(long)]
    region: Option<String>,

    /// Custom S3 endpoint (e.g. a Snowball appliance)
    #[arg(long)]
    endpoint: Option<String>,

    /// Storage class for archive uploads (manifests stay on the default class)
    #[arg(long)]
    storage_class: Option<String>,

    /// Log verbosity (DEBUG, INFO, WARNING, ERROR)
    #[arg(long, default_value = "INFO")]
    log_level: String,
}

fn parse_size_arg(s: &str) -> Result<u64, String> {
    tarpack::utils::parse_size(s)
}

fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let source = match (cli.src_type, &cli.input_file) {
        (EndpointType::Fs, None) => SourceSpec::FsWalk {
            root: cli
                .src_path
                .clone()
                .context("--src-path is required for --src-type fs")?,
        },
        (EndpointType::Fs, Some(input_file)) => SourceSpec::FsList {
            input_file: input_file.clone(),
        },
        (EndpointType::S3, None) => SourceSpec::ObjectListing {
            bucket: cli
                .src_bucket
                .clone()
                .context("--src-bucket is required for --src-type s3")?,
            prefix: cli.src_prefix.clone(),
        },
        (EndpointType::S3, Some(input_file)) => SourceSpec::ObjectList {
            input_file: input_file.clone(),
            bucket: cli
                .src_bucket
                .clone()
                .context("--src-bucket is required for --src-type s3")?,
        },
    };

    let destination = match cli.dst_type {
        EndpointType::Fs => DestinationSpec::Fs {
            root: cli
                .dst_path
                .clone()
                .context("--dst-path is required for --dst-type fs")?,
        },
        EndpointType::S3 => DestinationSpec::ObjectStore {
            bucket: cli
                .dst_bucket
                .clone()
                .context("--dst-bucket is required for --dst-type s3")?,
            prefix: cli.dst_prefix.clone(),
        },
    };

    let policy = match cli.combine {
        CombineMode::Size => {
            if cli.max_file_number.is_some() {
                bail!("--max-file-number only applies to --combine count");
            }
            BatchPolicy::Size {
                max_bytes: cli
                    .max_tarfile_size
                    .context("--max-tarfile-size is required for --combine size")?,
            }
        }
        CombineMode::Count => {
            if cli.max_tarfile_size.is_some() {
                bail!("--max-tarfile-size only applies to --combine size");
            }
            BatchPolicy::Count {
                max_files: cli
                    .max_file_number
                    .context("--max-file-number is required for --combine count")?,
            }
        }
    };

    Ok(Config {
        source,
        destination,
        policy,
        workers: cli.max_process,
        compress: cli.compress,
        retry: Default::default(),
        transfer: Default::default(),
        s3: S3Options {
            region: cli.region.clone(),
            endpoint: cli.endpoint.clone(),
            storage_class: cli.storage_class.clone(),
        },
    })
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

    let config = build_config(&cli)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(async {
        let pipeline = Pipeline::new(config)?;
        tarpack::run_with_shutdown(pipeline).await
    })?;

    // Per-member failures are reported through the counters; only fatal
    // configuration or enumeration errors exit non-zero.
    println!("{report}");
    Ok(())
}
