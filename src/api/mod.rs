//! API layer
//!
//! HTTP handlers for:
//! - File upload and CID lookup
//! - Metrics (Prometheus)

mod dto;
pub mod key;
pub mod metrics;
mod upload;

pub use dto::*;

pub use metrics::metrics_router;
pub use upload::{UploadRequest, cid_status, read_upload, upload};
