//! Shared-secret authentication
//!
//! Uploads and status lookups require the `x-api-key` header to match
//! `auth.api_key`.

mod middleware;

pub use middleware::{API_KEY_HEADER, api_key_matches, require_api_key};
