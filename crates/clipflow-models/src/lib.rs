//! Shared data models for the ClipFlow pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Clip records and their status state machine
//! - Storage key derivation (raw and processed artifacts)
//! - Change-capture event payloads delivered to the processor webhook

pub mod clip;
pub mod event;
pub mod keys;

// Re-export common types
pub use clip::{ClipId, ClipRecord, ClipStatus, NewClip};
pub use event::{ChangeEvent, EventInfo, EVENT_TYPE_INSERT};
pub use keys::{base_filename, processed_key, raw_key, PROCESSED_PREFIX};
