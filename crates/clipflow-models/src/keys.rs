//! Storage key derivation.
//!
//! Keys are namespaced under the authenticated uploader so two uploaders
//! can never collide on the same object. Re-uploading the same filename
//! from the same uploader overwrites the same key (last-write-wins policy).

/// Prefix applied to processed artifact filenames.
pub const PROCESSED_PREFIX: &str = "proc_";

/// Strip any path components from a client-supplied destination path.
///
/// SFTP clients send destination paths like `/uploads/clip001.mp4`; only
/// the base filename is kept so a path can never escape the uploader
/// namespace.
pub fn base_filename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Storage key for the raw artifact: `{uploader_id}/{basename}`.
pub fn raw_key(uploader_id: &str, filename: &str) -> String {
    format!("{}/{}", uploader_id, base_filename(filename))
}

/// Storage key for the processed artifact: `{uploader_id}/proc_{basename}`.
pub fn processed_key(uploader_id: &str, filename: &str) -> String {
    format!(
        "{}/{}{}",
        uploader_id,
        PROCESSED_PREFIX,
        base_filename(filename)
    )
}
