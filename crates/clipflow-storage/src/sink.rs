//! Streaming upload sink backed by S3 multipart uploads.
//!
//! The sink buffers at most one part in memory. Small objects (anything
//! under one part, including zero-byte uploads) never start a multipart
//! upload at all and are committed with a single `PutObject`; larger ones
//! flush full parts as they accumulate, so memory use is constant
//! regardless of file size and each awaited part upload pushes
//! backpressure back to the producer.

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::client::S3Store;
use crate::error::{StorageError, StorageResult};
use crate::store::ObjectSink;

/// Part size for multipart uploads. S3 requires every part except the
/// last to be at least 5 MiB.
pub const PART_SIZE: usize = 8 * 1024 * 1024;

/// If the buffer holds at least `part_size` bytes, split one full part
/// off its front and return it.
pub(crate) fn take_full_part(buffer: &mut Vec<u8>, part_size: usize) -> Option<Vec<u8>> {
    if buffer.len() < part_size {
        return None;
    }
    let tail = buffer.split_off(part_size);
    Some(std::mem::replace(buffer, tail))
}

/// A single in-flight streaming upload.
pub struct MultipartSink {
    store: S3Store,
    bucket: String,
    key: String,
    content_type: String,
    public_url: String,
    buffer: Vec<u8>,
    upload_id: Option<String>,
    parts: Vec<CompletedPart>,
    next_part_number: i32,
}

impl MultipartSink {
    pub(crate) fn new(
        store: S3Store,
        bucket: &str,
        key: &str,
        content_type: &str,
        public_url: String,
    ) -> Self {
        Self {
            store,
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: content_type.to_string(),
            public_url,
            buffer: Vec::new(),
            upload_id: None,
            parts: Vec::new(),
            next_part_number: 1,
        }
    }

    /// Lazily start the multipart upload on the first full part.
    async fn ensure_multipart(&mut self) -> StorageResult<String> {
        if let Some(ref id) = self.upload_id {
            return Ok(id.clone());
        }

        let created = self
            .store
            .inner()
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .content_type(&self.content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        let id = created
            .upload_id()
            .ok_or_else(|| StorageError::upload_failed("no upload id returned"))?
            .to_string();

        debug!(bucket = %self.bucket, key = %self.key, "Started multipart upload");
        self.upload_id = Some(id.clone());
        Ok(id)
    }

    async fn upload_part(&mut self, data: Vec<u8>) -> StorageResult<()> {
        let upload_id = self.ensure_multipart().await?;
        let part_number = self.next_part_number;

        let part = self
            .store
            .inner()
            .upload_part()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.parts.push(
            CompletedPart::builder()
                .part_number(part_number)
                .set_e_tag(part.e_tag().map(str::to_string))
                .build(),
        );
        self.next_part_number += 1;
        Ok(())
    }

    /// Flush the buffered tail part and complete the multipart upload.
    async fn complete_multipart(&mut self, upload_id: &str) -> StorageResult<()> {
        if !self.buffer.is_empty() {
            let tail = std::mem::take(&mut self.buffer);
            self.upload_part(tail).await?;
        }

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(self.parts.clone()))
            .build();

        self.store
            .inner()
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;
        Ok(())
    }

    async fn abort_multipart(&self, upload_id: &str) -> StorageResult<()> {
        self.store
            .inner()
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| {
                warn!(bucket = %self.bucket, key = %self.key, error = %e,
                    "Failed to abort multipart upload");
                StorageError::Aborted(e.to_string())
            })?;
        Ok(())
    }
}

#[async_trait]
impl ObjectSink for MultipartSink {
    async fn write(&mut self, chunk: &[u8]) -> StorageResult<()> {
        self.buffer.extend_from_slice(chunk);

        while let Some(part) = take_full_part(&mut self.buffer, PART_SIZE) {
            self.upload_part(part).await?;
        }
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> StorageResult<String> {
        match self.upload_id.clone() {
            // Everything fit in the buffer (possibly zero bytes).
            None => {
                let body = std::mem::take(&mut self.buffer);
                self.store
                    .upload_single(&self.bucket, &self.key, body, &self.content_type)
                    .await?;
            }
            Some(upload_id) => {
                // A failed completion must not strand the multipart upload
                // holding its parts; abort it before surfacing the error.
                if let Err(e) = self.complete_multipart(&upload_id).await {
                    let _ = self.abort_multipart(&upload_id).await;
                    return Err(e);
                }
            }
        }

        debug!(bucket = %self.bucket, key = %self.key, "Committed object");
        Ok(self.public_url)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        if let Some(upload_id) = self.upload_id.clone() {
            self.abort_multipart(&upload_id).await?;
        }
        // Nothing was ever visible for a never-started multipart.
        Ok(())
    }
}
