//! Upload endpoints
//!
//! - `POST /upload` stores one file and waits for its CID
//! - `GET /uploads/{key}/cid` checks a CID that was not ready in time

use axum::{
    body::Bytes,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use super::dto::{CidRecord, DataEnvelope};
use super::key::derive_object_key;
use crate::AppState;
use crate::error::AppError;
use crate::metrics::{UPLOAD_BYTES_TOTAL, UPLOADS_TOTAL};
use crate::poller::{PollResult, extract_cid, poll_cid};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const PENDING_MSG: &str = "File uploaded; CID not assigned yet, check status_url later";

/// The single file carried by an upload request
#[derive(Debug)]
pub struct UploadRequest {
    pub filename: String,
    pub content_type: String,
    pub body: Bytes,
}

fn map_multipart_error(error: axum::extract::multipart::MultipartError, limit: usize) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(limit)
    } else {
        AppError::Validation(format!("Failed to parse multipart body: {}", error.body_text()))
    }
}

/// Read the `file` field out of a multipart body
///
/// Other fields are ignored. More than one `file` field is rejected.
pub async fn read_upload(
    multipart: &mut Multipart,
    max_size: usize,
) -> Result<UploadRequest, AppError> {
    let mut upload: Option<UploadRequest> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| map_multipart_error(e, max_size))?
    {
        if field.name() != Some("file") {
            continue;
        }

        if upload.is_some() {
            return Err(AppError::Validation(
                "Exactly one file field is allowed".to_string(),
            ));
        }

        let filename = field
            .file_name()
            .map(ToOwned::to_owned)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "file".to_string());
        let content_type = field
            .content_type()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| map_multipart_error(e, max_size))?
        {
            if bytes.len() + chunk.len() > max_size {
                return Err(AppError::PayloadTooLarge(max_size));
            }
            bytes.extend_from_slice(&chunk);
        }

        upload = Some(UploadRequest {
            filename,
            content_type,
            body: Bytes::from(bytes),
        });
    }

    upload.ok_or_else(|| AppError::Validation("No file uploaded".to_string()))
}

/// POST /upload
///
/// Stores the file under a fresh key, then waits up to the configured budget
/// for the backend to publish its CID.
///
/// - 200 `{ data: { file, key, cid, ipfs_uri, gateway_url } }`
/// - 202 `{ msg, data: { file, key, status_url } }` when the CID is not ready
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let mut multipart = multipart.map_err(|e| {
        AppError::Validation(format!("Expected a multipart/form-data body: {}", e.body_text()))
    })?;

    let UploadRequest {
        filename,
        content_type,
        body,
    } = read_upload(&mut multipart, state.config.upload.max_size_bytes()).await?;

    let bucket = state.config.storage.bucket.as_str();
    let key = derive_object_key(state.config.upload.key_prefix.as_deref(), &filename);
    let size = body.len();

    if let Err(error) = state.store.put_object(bucket, &key, body, &content_type).await {
        UPLOADS_TOTAL.with_label_values(&["failed"]).inc();
        return Err(error);
    }
    UPLOAD_BYTES_TOTAL.inc_by(size as f64);

    tracing::info!(
        %bucket,
        %key,
        file = %filename,
        %content_type,
        size,
        "Object stored; waiting for CID"
    );

    let record = CidRecord::new(key.clone()).with_file(filename);
    let result = poll_cid(
        state.store.as_ref(),
        bucket,
        &key,
        &state.poll_policy,
        &state.shutdown,
    )
    .await;

    match result {
        PollResult::Found(cid) => {
            UPLOADS_TOTAL.with_label_values(&["cid_found"]).inc();
            let record = record.resolved(&cid, &state.config.storage.ipfs_gateway_url);
            Ok((StatusCode::OK, Json(DataEnvelope::new(record))).into_response())
        }
        PollResult::TimedOut | PollResult::Cancelled => {
            UPLOADS_TOTAL.with_label_values(&["pending"]).inc();
            let record = record.pending(state.config.server.base_url());
            Ok((
                StatusCode::ACCEPTED,
                Json(DataEnvelope::with_msg(PENDING_MSG, record)),
            )
                .into_response())
        }
    }
}

/// GET /uploads/{key}/cid
///
/// One metadata lookup, no waiting.
///
/// - 200 with the CID links
/// - 202 while the object exists without a CID
/// - 404 when nothing is stored under `key`
pub async fn cid_status(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let bucket = state.config.storage.bucket.as_str();

    let metadata = state
        .store
        .head_object(bucket, &key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No object stored under key {key}")))?;

    let record = CidRecord::new(key.clone());
    match extract_cid(&metadata) {
        Some(cid) => {
            let record = record.resolved(&cid, &state.config.storage.ipfs_gateway_url);
            Ok((StatusCode::OK, Json(DataEnvelope::new(record))).into_response())
        }
        None => {
            tracing::debug!(%key, "CID requested but not assigned yet");
            Ok((
                StatusCode::ACCEPTED,
                Json(DataEnvelope::with_msg("CID not assigned yet", record)),
            )
                .into_response())
        }
    }
}
