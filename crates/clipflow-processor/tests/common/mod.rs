//! In-memory doubles for the registry, the object store, and the
//! transformation step.
//!
//! The registry double performs its compare-and-set under one lock, which
//! is exactly the atomicity the production REST registry provides per
//! conditional update.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use clipflow_models::{ClipId, ClipRecord, ClipStatus, NewClip};
use clipflow_processor::{AppState, ClipTransformer, ProcessResult, ProcessorConfig};
use clipflow_processor::ProcessError;
use clipflow_registry::{ClipRegistry, RegistryError, RegistryResult};
use clipflow_storage::{ObjectSink, ObjectStore, StorageError, StorageResult};

// =============================================================================
// Registry double
// =============================================================================

#[derive(Default)]
pub struct MemRegistry {
    rows: Mutex<HashMap<String, ClipRecord>>,
    next_id: AtomicU64,
    pub fail_mark_ready: AtomicBool,
    pub fail_mark_failed: AtomicBool,
}

impl MemRegistry {
    pub fn get(&self, id: &ClipId) -> Option<ClipRecord> {
        self.rows.lock().unwrap().get(id.as_str()).cloned()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Insert a row directly, bypassing the id assignment.
    pub fn seed(&self, record: ClipRecord) {
        self.rows
            .lock()
            .unwrap()
            .insert(record.id.as_str().to_string(), record);
    }
}

#[async_trait]
impl ClipRegistry for MemRegistry {
    async fn insert_pending(&self, new: NewClip) -> RegistryResult<ClipRecord> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = ClipRecord {
            id: ClipId::from(format!("{}", id)),
            filename: new.filename,
            uploader_id: new.uploader_id,
            raw_clip_url: new.raw_clip_url,
            processed_clip_url: None,
            status: new.status,
            created_at: new.created_at,
            updated_at: new.updated_at,
        };
        self.seed(record.clone());
        Ok(record)
    }

    async fn claim(&self, id: &ClipId) -> RegistryResult<Option<ClipRecord>> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(id.as_str()) {
            Some(row) if row.status == ClipStatus::Pending => {
                row.status = ClipStatus::Processing;
                row.updated_at = Utc::now();
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_ready(&self, id: &ClipId, processed_url: &str) -> RegistryResult<()> {
        if self.fail_mark_ready.load(Ordering::SeqCst) {
            return Err(RegistryError::Http {
                status: 500,
                body: "injected mark_ready failure".to_string(),
            });
        }
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(id.as_str()) {
            Some(row) if row.status == ClipStatus::Processing => {
                row.status = ClipStatus::Ready;
                row.processed_clip_url = Some(processed_url.to_string());
                row.updated_at = Utc::now();
                Ok(())
            }
            _ => Err(RegistryError::precondition_failed(format!(
                "clip {} not PROCESSING",
                id
            ))),
        }
    }

    async fn mark_failed(&self, id: &ClipId) -> RegistryResult<()> {
        if self.fail_mark_failed.load(Ordering::SeqCst) {
            return Err(RegistryError::Http {
                status: 500,
                body: "injected mark_failed failure".to_string(),
            });
        }
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(id.as_str()) {
            Some(row) if row.status == ClipStatus::Processing => {
                row.status = ClipStatus::Failed;
                row.updated_at = Utc::now();
                Ok(())
            }
            _ => Err(RegistryError::precondition_failed(format!(
                "clip {} not PROCESSING",
                id
            ))),
        }
    }

    async fn fetch(&self, id: &ClipId) -> RegistryResult<Option<ClipRecord>> {
        Ok(self.get(id))
    }

    async fn reset_stale(&self, older_than: Duration) -> RegistryResult<Vec<ClipId>> {
        let cutoff = Utc::now() - chrono::Duration::from_std(older_than).unwrap();
        let mut rows = self.rows.lock().unwrap();
        let mut reset = Vec::new();
        for row in rows.values_mut() {
            if row.status == ClipStatus::Processing && row.updated_at < cutoff {
                row.status = ClipStatus::Pending;
                row.updated_at = Utc::now();
                reset.push(row.id.clone());
            }
        }
        Ok(reset)
    }
}

// =============================================================================
// Object store double
// =============================================================================

type ObjectMap = Arc<Mutex<HashMap<String, Vec<u8>>>>;

#[derive(Default)]
pub struct MemStore {
    objects: ObjectMap,
    pub fail_upload: AtomicBool,
}

impl MemStore {
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&format!("{}/{}", bucket, key))
            .cloned()
    }

    pub fn put(&self, bucket: &str, key: &str, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{}/{}", bucket, key), data.to_vec());
    }
}

struct MemSink {
    objects: ObjectMap,
    bucket: String,
    key: String,
    buffer: Vec<u8>,
}

#[async_trait]
impl ObjectSink for MemSink {
    async fn write(&mut self, chunk: &[u8]) -> StorageResult<()> {
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StorageResult<String> {
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{}/{}", self.bucket, self.key), self.buffer);
        Ok(format!("https://cdn/{}/{}", self.bucket, self.key))
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemStore {
    async fn open_sink(
        &self,
        bucket: &str,
        key: &str,
        _content_type: &str,
    ) -> StorageResult<Box<dyn ObjectSink>> {
        Ok(Box::new(MemSink {
            objects: Arc::clone(&self.objects),
            bucket: bucket.to_string(),
            key: key.to_string(),
            buffer: Vec::new(),
        }))
    }

    async fn upload_bytes(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(StorageError::upload_failed("injected upload failure"));
        }
        self.put(bucket, key, &data);
        Ok(self.public_url(bucket, key))
    }

    async fn download_bytes(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        self.object(bucket, key)
            .ok_or_else(|| StorageError::not_found(key))
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("https://cdn/{}/{}", bucket, key)
    }
}

// =============================================================================
// Transformer doubles
// =============================================================================

/// Uppercases the bytes, so tests can tell raw from processed content.
pub struct UppercaseTransformer;

#[async_trait]
impl ClipTransformer for UppercaseTransformer {
    async fn transform(&self, raw: Vec<u8>) -> ProcessResult<Vec<u8>> {
        Ok(raw.to_ascii_uppercase())
    }
}

pub struct FailingTransformer;

#[async_trait]
impl ClipTransformer for FailingTransformer {
    async fn transform(&self, _raw: Vec<u8>) -> ProcessResult<Vec<u8>> {
        Err(ProcessError::transform("injected transform failure"))
    }
}

/// Sleeps past any reasonable test timeout.
pub struct SlowTransformer(pub Duration);

#[async_trait]
impl ClipTransformer for SlowTransformer {
    async fn transform(&self, raw: Vec<u8>) -> ProcessResult<Vec<u8>> {
        tokio::time::sleep(self.0).await;
        Ok(raw)
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub const TEST_SECRET: &str = "test-secret";

pub fn test_config() -> ProcessorConfig {
    ProcessorConfig {
        port: 0,
        webhook_secret: TEST_SECRET.to_string(),
        table: "clips".to_string(),
        raw_bucket: "raw-clips".to_string(),
        processed_bucket: "processed-clips".to_string(),
        transform_command: None,
        transform_timeout: Duration::from_millis(200),
        reconcile_enabled: false,
        reconcile_interval: Duration::from_secs(60),
        processing_timeout: Duration::from_secs(600),
        max_body_size: 1024 * 1024,
    }
}

pub struct TestHarness {
    pub registry: Arc<MemRegistry>,
    pub store: Arc<MemStore>,
    pub state: AppState,
}

pub fn harness(transformer: Arc<dyn ClipTransformer>) -> TestHarness {
    let registry = Arc::new(MemRegistry::default());
    let store = Arc::new(MemStore::default());
    let state = AppState::new(
        test_config(),
        Arc::clone(&registry) as Arc<dyn ClipRegistry>,
        Arc::clone(&store) as Arc<dyn ObjectStore>,
        transformer,
    );
    TestHarness {
        registry,
        store,
        state,
    }
}

/// Seed one PENDING clip plus its raw object, the way an upload leaves them.
pub async fn seed_pending_clip(h: &TestHarness, filename: &str, uploader: &str) -> ClipRecord {
    let key = clipflow_models::keys::raw_key(uploader, filename);
    h.store.put("raw-clips", &key, b"raw clip bytes");

    h.registry
        .insert_pending(NewClip::new(
            filename,
            uploader,
            format!("https://cdn/raw-clips/{}", key),
        ))
        .await
        .unwrap()
}
