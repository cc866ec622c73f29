//! S3-compatible object store client.
//!
//! This crate provides:
//! - The [`ObjectStore`]/[`ObjectSink`] capabilities the pipeline depends on
//! - A production implementation over any S3-compatible endpoint
//! - Constant-memory streaming uploads via lazy multipart uploads

pub mod client;
pub mod error;
pub mod sink;
pub mod store;

pub use client::{S3Store, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use sink::MultipartSink;
pub use store::{ObjectSink, ObjectStore};
