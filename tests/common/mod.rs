//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Bytes;
use cidgate::error::AppError;
use cidgate::storage::{ObjectMetadata, ObjectStore};
use cidgate::{AppState, config};
use tokio::net::TcpListener;

pub const API_KEY: &str = "test-api-key";
pub const BUCKET: &str = "test-uploads";

/// How the simulated backend assigns a CID to objects whose key ends with a
/// given filename
#[derive(Debug, Clone)]
pub enum CidBehavior {
    /// `cid` metadata is present on the first lookup
    Immediate(&'static str),
    /// Metadata is empty for the first `n` lookups, then carries `cid`
    AfterLookups(usize, &'static str),
    /// Metadata never carries a CID
    Never,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub size: usize,
    pub content_type: String,
    pub metadata: ObjectMetadata,
    pub lookups: usize,
}

/// In-memory object store that records every call
#[derive(Default)]
pub struct SpyStore {
    behaviors: Vec<(&'static str, CidBehavior)>,
    objects: Mutex<HashMap<String, StoredObject>>,
    fail_puts: bool,
    pub put_calls: AtomicUsize,
    pub head_calls: AtomicUsize,
}

impl SpyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(mut self, filename: &'static str, behavior: CidBehavior) -> Self {
        self.behaviors.push((filename, behavior));
        self
    }

    pub fn failing_puts(mut self) -> Self {
        self.fail_puts = true;
        self
    }

    pub fn puts(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn heads(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Simulate the backend finishing content addressing
    pub fn assign_cid(&self, key: &str, cid: &str) {
        let mut objects = self.objects.lock().unwrap();
        let object = objects.get_mut(key).expect("object exists");
        object.metadata.insert("cid".to_string(), cid.to_string());
    }

    /// Store an object directly, bypassing the HTTP layer
    pub fn seed(&self, key: &str) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                bucket: BUCKET.to_string(),
                key: key.to_string(),
                size: 0,
                content_type: "application/octet-stream".to_string(),
                metadata: ObjectMetadata::new(),
                lookups: 0,
            },
        );
    }

    fn behavior_for(&self, key: &str) -> CidBehavior {
        self.behaviors
            .iter()
            .find(|(name, _)| key.ends_with(&format!("-{name}")))
            .map(|(_, behavior)| behavior.clone())
            .unwrap_or(CidBehavior::Never)
    }
}

#[async_trait]
impl ObjectStore for SpyStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), AppError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_puts {
            return Err(AppError::Storage("simulated write failure".to_string()));
        }

        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                bucket: bucket.to_string(),
                key: key.to_string(),
                size: body.len(),
                content_type: content_type.to_string(),
                metadata: ObjectMetadata::new(),
                lookups: 0,
            },
        );
        Ok(())
    }

    async fn head_object(
        &self,
        _bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectMetadata>, AppError> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);

        let behavior = self.behavior_for(key);
        let mut objects = self.objects.lock().unwrap();
        let Some(object) = objects.get_mut(key) else {
            return Ok(None);
        };
        object.lookups += 1;

        match behavior {
            CidBehavior::Immediate(cid) => {
                object.metadata.insert("cid".to_string(), cid.to_string());
            }
            CidBehavior::AfterLookups(n, cid) if object.lookups > n => {
                object.metadata.insert("cid".to_string(), cid.to_string());
            }
            _ => {}
        }

        Ok(Some(object.metadata.clone()))
    }
}

pub fn test_config() -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            public_url: "https://upload.test.example.com".to_string(),
        },
        storage: config::StorageConfig {
            endpoint: "http://127.0.0.1:9000".to_string(),
            region: "us-east-1".to_string(),
            bucket: BUCKET.to_string(),
            access_key_id: "test-key".to_string(),
            secret_access_key: "test-secret".to_string(),
            force_path_style: true,
            ipfs_gateway_url: "https://ipfs.test.example.com".to_string(),
        },
        auth: config::AuthConfig {
            api_key: API_KEY.to_string(),
        },
        upload: config::UploadConfig {
            max_size_mb: 5,
            key_prefix: None,
        },
        poll: config::PollConfig {
            max_wait_ms: 30_000,
            max_attempts: None,
            initial_delay_ms: 500,
            max_delay_ms: 4_000,
            attempt_timeout_ms: 5_000,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub store: Arc<SpyStore>,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Start a server backed by `store` with the default test configuration
    pub async fn new(store: SpyStore) -> Self {
        Self::with_config(store, |_| {}).await
    }

    /// Start a server after letting the caller adjust the configuration
    pub async fn with_config(
        store: SpyStore,
        configure: impl FnOnce(&mut config::AppConfig),
    ) -> Self {
        let mut config = test_config();
        configure(&mut config);

        let store = Arc::new(store);
        let state = AppState::with_store(config, store.clone());

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = cidgate::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            store,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// POST /upload with one file part
    pub async fn upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        api_key: Option<&str>,
    ) -> reqwest::Response {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("image/png")
            .unwrap();
        let form = reqwest::multipart::Form::new().part("file", part);

        let mut request = self.client.post(self.url("/upload")).multipart(form);
        if let Some(key) = api_key {
            request = request.header("x-api-key", key);
        }
        request.send().await.unwrap()
    }
}
