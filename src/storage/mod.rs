//! Object storage module
//!
//! Handles:
//! - Writing uploaded files to an S3-compatible bucket
//! - Reading user metadata back (where the backend publishes the CID)

mod s3;

pub use s3::S3Store;

use std::collections::HashMap;

use async_trait::async_trait;
use axum::body::Bytes;

use crate::error::AppError;

/// User metadata attached to a stored object (`x-amz-meta-*` headers)
pub type ObjectMetadata = HashMap<String, String>;

/// Storage client used by the upload handler and the CID poller
///
/// Implementations must be safe for concurrent use; a single instance is
/// shared by every in-flight request.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write one object
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), AppError>;

    /// Fetch the user metadata of an object
    ///
    /// # Returns
    /// `None` if the object does not exist (yet)
    async fn head_object(&self, bucket: &str, key: &str)
    -> Result<Option<ObjectMetadata>, AppError>;
}

pub(crate) fn build_s3_http_client() -> aws_sdk_s3::config::SharedHttpClient {
    use aws_smithy_runtime::client::http::hyper_014::HyperClientBuilder;

    let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();

    HyperClientBuilder::new().build(https_connector)
}
