//! Authentication middleware
//!
//! Rejects requests before their body is read, so an unauthenticated upload
//! never reaches object storage.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::AppState;
use crate::error::AppError;

/// Header carrying the shared secret
pub const API_KEY_HEADER: &str = "x-api-key";

fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
}

/// Compare a presented key with the configured one
///
/// Runs in time independent of where the first differing byte is.
pub fn api_key_matches(presented: &str, expected: &str) -> bool {
    let (a, b) = (presented.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Middleware to require the shared secret
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/upload", post(upload))
///     .layer(middleware::from_fn_with_state(state, require_api_key));
/// ```
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = extract_api_key(request.headers()).ok_or_else(|| {
        tracing::debug!(path = %request.uri().path(), "Missing API key");
        AppError::Unauthorized
    })?;

    if !api_key_matches(presented, &state.config.auth.api_key) {
        tracing::warn!(path = %request.uri().path(), "Rejected request with wrong API key");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_identical_keys() {
        assert!(api_key_matches("s3cr3t", "s3cr3t"));
    }

    #[test]
    fn rejects_different_keys() {
        assert!(!api_key_matches("s3cr3t", "s3cr3T"));
        assert!(!api_key_matches("s3cr3t", "s3cr3t-longer"));
        assert!(!api_key_matches("", "s3cr3t"));
    }

    #[test]
    fn reads_header_case_insensitively() {
        let mut headers = HeaderMap::new();
        headers.insert("X-API-KEY", "abc".parse().unwrap());
        assert_eq!(extract_api_key(&headers), Some("abc"));
    }
}
