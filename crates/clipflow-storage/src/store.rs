//! Object store capabilities.
//!
//! The gateway and orchestrator depend on these traits rather than on a
//! concrete S3 client, so the store can be substituted with a test double.

use async_trait::async_trait;

use crate::error::StorageResult;

/// An incremental write into the object store.
///
/// Bytes handed to [`write`](ObjectSink::write) are not visible to readers
/// until [`commit`](ObjectSink::commit) returns; a dropped or aborted sink
/// leaves no retrievable object behind.
#[async_trait]
pub trait ObjectSink: Send {
    /// Append a chunk. Awaiting this call is the backpressure point: the
    /// caller cannot outrun the store.
    async fn write(&mut self, chunk: &[u8]) -> StorageResult<()>;

    /// Make the object durable and retrievable. Returns its public URL.
    async fn commit(self: Box<Self>) -> StorageResult<String>;

    /// Discard everything written so far.
    async fn abort(self: Box<Self>) -> StorageResult<()>;
}

/// Durable byte storage addressed by bucket and key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open a streaming sink for `key`. Writing the same key twice
    /// overwrites it (last-write-wins).
    async fn open_sink(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StorageResult<Box<dyn ObjectSink>>;

    /// Upload a full in-memory object. Returns its public URL.
    async fn upload_bytes(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Download an object as bytes.
    async fn download_bytes(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>>;

    /// Public URL of a (committed) object.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}
