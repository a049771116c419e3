//! API response DTOs

use serde::Serialize;

/// `{ msg?, data }` envelope used by every successful response
#[derive(Debug, Clone, Serialize)]
pub struct DataEnvelope<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    pub data: T,
}

impl<T> DataEnvelope<T> {
    pub fn new(data: T) -> Self {
        Self { msg: None, data }
    }

    pub fn with_msg(msg: impl Into<String>, data: T) -> Self {
        Self {
            msg: Some(msg.into()),
            data,
        }
    }
}

/// Where an uploaded file lives and, once assigned, its CID
#[derive(Debug, Clone, Serialize)]
pub struct CidRecord {
    /// Original client-side filename
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Storage key
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipfs_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
    /// Follow-up link for a CID that was not ready in time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_url: Option<String>,
}

impl CidRecord {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            file: None,
            key: key.into(),
            cid: None,
            ipfs_uri: None,
            gateway_url: None,
            status_url: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Attach the CID and the links derived from it
    pub fn resolved(mut self, cid: &str, ipfs_gateway_url: &str) -> Self {
        self.ipfs_uri = Some(format!("ipfs://{cid}"));
        self.gateway_url = Some(format!(
            "{}/ipfs/{cid}",
            ipfs_gateway_url.trim_end_matches('/')
        ));
        self.cid = Some(cid.to_string());
        self
    }

    /// Attach the status link built from the gateway's public URL
    pub fn pending(mut self, public_base_url: &str) -> Self {
        self.status_url = Some(status_url(public_base_url, &self.key));
        self
    }
}

/// `GET /` response
#[derive(Debug, Clone, Serialize)]
pub struct RootResponse {
    pub environment: String,
}

/// `GET /healthz` response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub environment: String,
}

/// Link to `GET /uploads/{key}/cid`
pub fn status_url(public_base_url: &str, key: &str) -> String {
    format!(
        "{}/uploads/{}/cid",
        public_base_url.trim_end_matches('/'),
        urlencoding::encode(key)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_record_serializes_cid_links() {
        let record = CidRecord::new("1700000000000-01h-photo.png")
            .with_file("photo.png")
            .resolved("bafy123", "https://ipfs.filebase.io/");
        let value = serde_json::to_value(DataEnvelope::new(record)).unwrap();

        assert!(value.get("msg").is_none());
        assert_eq!(value["data"]["file"], "photo.png");
        assert_eq!(value["data"]["cid"], "bafy123");
        assert_eq!(value["data"]["ipfs_uri"], "ipfs://bafy123");
        assert_eq!(value["data"]["gateway_url"], "https://ipfs.filebase.io/ipfs/bafy123");
        assert!(value["data"].get("status_url").is_none());
    }

    #[test]
    fn pending_record_omits_cid_fields() {
        let record = CidRecord::new("uploads/a b.png")
            .with_file("a b.png")
            .pending("https://upload.example.com/");
        let value = serde_json::to_value(DataEnvelope::with_msg("later", record)).unwrap();

        assert_eq!(value["msg"], "later");
        assert!(value["data"].get("cid").is_none());
        assert!(value["data"].get("gateway_url").is_none());
        assert_eq!(
            value["data"]["status_url"],
            "https://upload.example.com/uploads/uploads%2Fa%20b.png/cid"
        );
    }
}
