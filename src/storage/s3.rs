//! S3-compatible object storage
//!
//! Works against any endpoint speaking the S3 API (Filebase, MinIO, R2, AWS).

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use axum::body::Bytes;

use super::{ObjectMetadata, ObjectStore};
use crate::error::AppError;

/// S3 storage client
pub struct S3Store {
    client: S3Client,
}

impl S3Store {
    /// Create a client for the configured endpoint
    ///
    /// # Errors
    /// Returns error if the endpoint is empty
    pub fn new(config: &crate::config::StorageConfig) -> Result<Self, AppError> {
        use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};

        if config.endpoint.trim().is_empty() {
            return Err(AppError::Config("storage.endpoint must not be empty".to_string()));
        }

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "cidgate-static",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .force_path_style(config.force_path_style)
            .http_client(super::build_s3_http_client())
            .build();

        tracing::info!(
            endpoint = %config.endpoint,
            region = %config.region,
            bucket = %config.bucket,
            "S3 client configured"
        );

        Ok(Self {
            client: S3Client::from_conf(s3_config),
        })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), AppError> {
        use aws_sdk_s3::primitives::ByteStream;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                AppError::Storage(format!(
                    "S3 upload failed: {}",
                    aws_sdk_s3::error::DisplayErrorContext(&e)
                ))
            })?;

        Ok(())
    }

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectMetadata>, AppError> {
        use aws_sdk_s3::operation::head_object::HeadObjectError;

        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(output) => Ok(Some(output.metadata().cloned().unwrap_or_default())),
            Err(sdk_err) => match sdk_err.into_service_error() {
                HeadObjectError::NotFound(_) => Ok(None),
                err => Err(AppError::Storage(format!(
                    "S3 head failed: {}",
                    aws_sdk_s3::error::DisplayErrorContext(&err)
                ))),
            },
        }
    }
}
