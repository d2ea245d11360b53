//! S3-backed [`ObjectStore`].

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;

use super::{ObjectStore, available_profiles, write_download};
use crate::config::AwsSettings;
use crate::error::{Error, Result};
use crate::sources::SourceId;

/// Error codes S3 (and compatible stores) use for authorization failures.
const PERMISSION_CODES: [&str; 5] = [
    "AccessDenied",
    "Forbidden",
    "AllAccessDisabled",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
];

/// Error codes meaning the object is already gone.
const NOT_FOUND_CODES: [&str; 2] = ["NoSuchKey", "NotFound"];

pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Wrap an already configured client.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the shared AWS configuration.
    ///
    /// A named profile that is missing from the AWS config and credentials
    /// files is a configuration error listing the profiles that do exist.
    pub async fn connect(settings: &AwsSettings, bucket: &str) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(profile) = &settings.profile {
            let available = available_profiles();
            if !available.contains(profile) {
                return Err(Error::config(format!(
                    "Specified profile '{}' is not in your AWS CLI configuration. Available options are: {:?}",
                    profile, available
                )));
            }
            loader = loader.profile_name(profile);
        }
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &settings.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let shared_config = loader.load().await;
        tracing::debug!(
            target: "sortie::store",
            profile = settings.profile.as_deref().unwrap_or("<default chain>"),
            "AWS session initiated"
        );

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if settings.force_path_style {
            s3_builder = s3_builder.force_path_style(true);
        }
        let client = Client::from_conf(s3_builder.build());
        tracing::debug!(target: "sortie::store", bucket, "S3 client initialized");

        Ok(Self::new(client, bucket))
    }

    /// Names of the buckets visible to the current credentials.
    pub async fn list_buckets(&self) -> Result<Vec<String>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| classify("list_buckets", "*", e))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name())
            .map(str::to_string)
            .collect())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_bucket_contents(&self) -> Result<Vec<SourceId>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| classify("list", &self.bucket, e))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .map(SourceId::from),
            );
        }
        Ok(keys)
    }

    async fn download(&self, source: &SourceId, destination: &Path) -> Result<()> {
        tracing::info!(
            target: "sortie::store",
            "Downloading '{}' from S3 bucket '{}' to '{}'",
            source,
            self.bucket,
            destination.display()
        );

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(source.as_str())
            .send()
            .await
            .map_err(|e| classify("download", source.as_str(), e))?;

        let mut body = output.body.into_async_read();
        write_download(source, &mut body, destination).await?;
        Ok(())
    }

    async fn upload(&self, local_path: &Path, destination: &str) -> Result<()> {
        tracing::info!(
            target: "sortie::store",
            "Uploading '{}' to S3 bucket '{}' with path '{}'",
            local_path.display(),
            self.bucket,
            destination
        );

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| Error::filesystem(local_path, std::io::Error::other(e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(destination)
            .body(body)
            .send()
            .await
            .map_err(|e| classify("upload", destination, e))?;
        Ok(())
    }

    async fn delete(&self, key: &SourceId) -> Result<()> {
        tracing::warn!(
            target: "sortie::store",
            "Deleting file '{}' from S3 bucket '{}'",
            key,
            self.bucket
        );

        let result = self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await;
        settle_delete(key, result)
    }
}

/// Deleting an object that is already gone counts as success.
fn settle_delete<T, E>(key: &SourceId, result: std::result::Result<T, SdkError<E>>) -> Result<()>
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match result {
        Ok(_) => Ok(()),
        Err(e) if is_not_found(&e) => {
            tracing::debug!(target: "sortie::store", %key, "Object already absent");
            Ok(())
        }
        Err(e) => Err(classify("delete", key.as_str(), e)),
    }
}

fn status_code<E>(err: &SdkError<E>) -> Option<u16> {
    err.raw_response().map(|r| r.status().as_u16())
}

fn is_not_found<E: ProvideErrorMetadata>(err: &SdkError<E>) -> bool {
    err.code().is_some_and(|c| NOT_FOUND_CODES.contains(&c)) || status_code(err) == Some(404)
}

/// Map an SDK failure onto the crate's error taxonomy.
fn classify<E>(operation: &'static str, key: &str, err: SdkError<E>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let denied = err.code().is_some_and(|c| PERMISSION_CODES.contains(&c))
        || status_code(&err) == Some(403);
    if denied {
        return Error::PermissionDenied {
            operation,
            key: key.to_string(),
        };
    }
    Error::Store {
        operation,
        key: key.to_string(),
        message: DisplayErrorContext(&err).to_string(),
    }
}
