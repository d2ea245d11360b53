//! Object store access.
//!
//! The pipeline talks to the bucket only through the [`ObjectStore`] trait,
//! so tests can substitute an in-memory store. Production code uses
//! [`S3Store`], which wraps `aws-sdk-s3`.
//!
//! Failures are translated into the crate's error taxonomy: authorization
//! problems become [`Error::PermissionDenied`](crate::error::Error), every
//! other store failure becomes `Error::Store`. Nothing is retried.

mod profile;
mod s3;

use async_trait::async_trait;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::sources::SourceId;

pub use profile::available_profiles;
pub use s3::S3Store;

/// Operations against one bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the bucket this store is bound to.
    fn bucket(&self) -> &str;

    /// Every key in the bucket, pages flattened, in store order.
    async fn list_bucket_contents(&self) -> Result<Vec<SourceId>>;

    /// Fetch an object into a local file.
    async fn download(&self, source: &SourceId, destination: &Path) -> Result<()>;

    /// Store a local file under `destination`, replacing any existing object.
    async fn upload(&self, local_path: &Path, destination: &str) -> Result<()>;

    /// Remove an object. Deleting an absent key is not an error.
    async fn delete(&self, key: &SourceId) -> Result<()>;
}

/// Sibling path an in-flight download is written to before it is renamed
/// into place.
pub(crate) fn partial_path(destination: &Path) -> std::path::PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

/// Stream a downloaded body into `destination` through its `.part` sibling.
///
/// On any failure the partial file is removed, so `destination` only ever
/// appears complete.
pub(crate) async fn write_download<R>(
    source: &SourceId,
    body: &mut R,
    destination: &Path,
) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let partial = partial_path(destination);
    let result = copy_then_rename(source, body, &partial, destination).await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&partial).await {
            tracing::debug!(target: "sortie::store", path = %partial.display(), error = %e, "No partial file removed");
        }
    }
    result
}

async fn copy_then_rename<R>(
    source: &SourceId,
    body: &mut R,
    partial: &Path,
    destination: &Path,
) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut file = tokio::fs::File::create(partial)
        .await
        .map_err(|e| Error::filesystem(partial, e))?;

    let written = tokio::io::copy(body, &mut file)
        .await
        .map_err(|e| Error::Store {
            operation: "download",
            key: source.to_string(),
            message: e.to_string(),
        })?;
    file.flush().await.map_err(|e| Error::filesystem(partial, e))?;
    drop(file);

    tokio::fs::rename(partial, destination)
        .await
        .map_err(|e| Error::filesystem(destination, e))?;
    Ok(written)
}
