//! A single in-flight upload, from first byte to registry entry.
//!
//! The ordering that matters lives here: the object store commit must
//! complete before the registry insert, so a disconnected or failed
//! transfer can never leave a `PENDING` record pointing at nothing.
//! The insert can still fail after a successful commit; that leaves an
//! orphaned object, which is logged and counted rather than swallowed.

use metrics::counter;
use tracing::{error, info, warn};

use clipflow_models::{keys, ClipRecord, NewClip};
use clipflow_registry::ClipRegistry;
use clipflow_storage::{ObjectSink, ObjectStore};

use crate::error::{IngestError, IngestResult};

/// Content type recorded on the stored object, derived from the filename
/// extension.
pub fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit('.').next().map(str::to_ascii_lowercase) {
        Some(ext) if ext == "mp4" || ext == "m4v" => "video/mp4",
        Some(ext) if ext == "mov" => "video/quicktime",
        Some(ext) if ext == "webm" => "video/webm",
        Some(ext) if ext == "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

/// One upload in progress: an open sink plus the metadata needed to
/// register the clip once the store commit succeeds.
pub struct ClipUpload {
    filename: String,
    uploader_id: String,
    next_offset: u64,
    sink: Option<Box<dyn ObjectSink>>,
    failed: bool,
}

impl ClipUpload {
    /// Open a sink for an incoming file.
    ///
    /// The destination path is reduced to its base filename and namespaced
    /// under the authenticated uploader; see [`clipflow_models::keys`].
    pub async fn begin(
        store: &dyn ObjectStore,
        raw_bucket: &str,
        uploader_id: &str,
        dest_path: &str,
    ) -> IngestResult<Self> {
        let filename = keys::base_filename(dest_path).to_string();
        let key = keys::raw_key(uploader_id, &filename);
        let sink = store
            .open_sink(raw_bucket, &key, content_type_for(&filename))
            .await?;

        info!(uploader_id, filename = %filename, key = %key, "Upload started");

        Ok(Self {
            filename,
            uploader_id: uploader_id.to_string(),
            next_offset: 0,
            sink: Some(sink),
            failed: false,
        })
    }

    /// Forward a chunk to the store.
    ///
    /// Only sequential offsets are accepted; a plain SFTP `put` writes
    /// sequentially, and anything else would corrupt the streamed object.
    pub async fn write(&mut self, offset: u64, data: &[u8]) -> IngestResult<()> {
        let sink = self.sink.as_mut().ok_or(IngestError::UploadFinished)?;

        if self.failed {
            return Err(IngestError::UploadPoisoned);
        }

        if offset != self.next_offset {
            // The stream now has a hole; nothing written after this point
            // could produce a complete object.
            self.failed = true;
            return Err(IngestError::NonSequentialWrite {
                expected: self.next_offset,
                got: offset,
            });
        }

        if let Err(e) = sink.write(data).await {
            self.failed = true;
            return Err(e.into());
        }
        self.next_offset += data.len() as u64;
        Ok(())
    }

    /// Bytes accepted so far.
    pub fn bytes_received(&self) -> u64 {
        self.next_offset
    }

    /// Commit the stored object, then register the clip as `PENDING`.
    pub async fn finish(mut self, registry: &dyn ClipRegistry) -> IngestResult<ClipRecord> {
        let sink = self.sink.take().ok_or(IngestError::UploadFinished)?;

        // A failed or out-of-order chunk left the stream incomplete;
        // committing it would publish a truncated object.
        if self.failed {
            warn!(
                uploader_id = %self.uploader_id,
                filename = %self.filename,
                "Refusing to commit upload after a failed write"
            );
            if let Err(e) = sink.abort().await {
                warn!(error = %e, "Failed to abort incomplete upload");
            }
            return Err(IngestError::UploadPoisoned);
        }

        // Commit first: no record may exist without a retrievable object.
        let raw_url = sink.commit().await?;

        let new = NewClip::new(&self.filename, &self.uploader_id, &raw_url);
        match registry.insert_pending(new).await {
            Ok(record) => {
                counter!("ingest_uploads_total").increment(1);
                info!(
                    clip_id = %record.id,
                    uploader_id = %self.uploader_id,
                    filename = %self.filename,
                    bytes = self.next_offset,
                    "Upload committed and registered"
                );
                Ok(record)
            }
            Err(e) => {
                // The object is durable but nothing references it. External
                // reconciliation is the only way to recover it.
                counter!("ingest_orphaned_objects_total").increment(1);
                error!(
                    uploader_id = %self.uploader_id,
                    filename = %self.filename,
                    raw_url = %raw_url,
                    error = %e,
                    "Registry insert failed after store commit: orphaned object"
                );
                Err(e.into())
            }
        }
    }

    /// Discard the upload; nothing becomes visible.
    pub async fn abort(mut self) -> IngestResult<()> {
        if let Some(sink) = self.sink.take() {
            warn!(
                uploader_id = %self.uploader_id,
                filename = %self.filename,
                bytes = self.next_offset,
                "Upload aborted"
            );
            sink.abort().await?;
        }
        Ok(())
    }
}
