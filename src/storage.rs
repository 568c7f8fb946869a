//! Object-store operator construction
//!
//! One operator per bucket role (source, archive destination, manifest
//! destination). Credentials come from the provider's default chain; the
//! `AWS_PROFILE` selection happens in the CLI before the runtime starts.

use opendal::Operator;
use opendal::raw::HttpClient;

use crate::config::{S3Options, TransferConfig};
use crate::error::{Error, Result};

/// Build an S3 operator for `bucket`
///
/// `with_storage_class` controls whether the configured storage class is
/// applied; archives opt in, manifests stay on the provider default.
pub fn build_s3_operator(
    bucket: &str,
    options: &S3Options,
    transfer: &TransferConfig,
    with_storage_class: bool,
) -> Result<Operator> {
    let mut builder = opendal::services::S3::default().bucket(bucket);

    if let Some(region) = &options.region {
        builder = builder.region(region);
    }
    if let Some(endpoint) = &options.endpoint {
        builder = builder.endpoint(endpoint);
    }
    if with_storage_class {
        if let Some(class) = &options.storage_class {
            builder = builder.default_storage_class(class);
        }
    }

    // Every network call carries a connect timeout and a read timeout
    let client = reqwest::Client::builder()
        .connect_timeout(transfer.connect_timeout)
        .read_timeout(transfer.read_timeout)
        .build()
        .map_err(|e| Error::Other(format!("failed to build HTTP client: {e}")))?;
    builder = builder.http_client(HttpClient::with(client));

    let operator = Operator::new(builder)?.finish();

    tracing::debug!(
        bucket = bucket,
        region = options.region.as_deref().unwrap_or("(default)"),
        endpoint = options.endpoint.as_deref().unwrap_or("(default)"),
        "Object-store operator initialized"
    );

    Ok(operator)
}
