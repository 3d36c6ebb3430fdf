use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use secrecy::ExposeSecret;

use super::DocumentStorage;
use crate::config::{S3Settings, StorageSettings};
use crate::error::StorageError;

/// Builds the configured object store backend.
pub fn build_store(settings: &StorageSettings) -> Result<DocumentStorage, StorageError> {
    match settings {
        StorageSettings::S3(s3) => build_s3(s3),
        StorageSettings::Filesystem { root, public_url } => {
            std::fs::create_dir_all(root).map_err(|e| {
                StorageError::Configuration(format!(
                    "cannot create storage root '{}': {}",
                    root.display(),
                    e
                ))
            })?;
            let store = LocalFileSystem::new_with_prefix(root)?;
            tracing::info!(root = %root.display(), "using filesystem object storage");
            Ok(DocumentStorage::new(Arc::new(store), public_url.clone()))
        }
    }
}

fn build_s3(s3: &S3Settings) -> Result<DocumentStorage, StorageError> {
    let store = AmazonS3Builder::new()
        .with_endpoint(&s3.access_endpoint)
        .with_region(&s3.region)
        .with_bucket_name(&s3.bucket)
        .with_access_key_id(&s3.access_key)
        .with_secret_access_key(s3.secret_key.expose_secret())
        .with_virtual_hosted_style_request(!s3.path_style)
        .with_allow_http(s3.access_endpoint.starts_with("http://"))
        .build()?;

    tracing::info!(
        endpoint = %s3.access_endpoint,
        bucket = %s3.bucket,
        "using S3 object storage"
    );
    Ok(DocumentStorage::new(Arc::new(store), public_base_url(s3)).with_content_types())
}

/// Objects are addressed as `{response_endpoint}/{bucket}/{key}` with path
/// style and `{response_endpoint}/{key}` otherwise.
fn public_base_url(s3: &S3Settings) -> String {
    let endpoint = s3.response_endpoint.trim_end_matches('/');
    if s3.path_style {
        format!("{}/{}", endpoint, s3.bucket)
    } else {
        endpoint.to_string()
    }
}
