//! Clip record models and status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a clip, assigned by the registry on insert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(pub String);

impl ClipId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClipId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ClipId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Clip processing status.
///
/// Transitions are monotonic: `Pending -> Processing -> {Ready, Failed}`.
/// `Ready` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClipStatus {
    /// Registered, waiting to be claimed
    #[default]
    Pending,
    /// Claimed by an orchestrator instance
    Processing,
    /// Processed artifact available
    Ready,
    /// Processing failed
    Failed,
}

impl ClipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipStatus::Pending => "PENDING",
            ClipStatus::Processing => "PROCESSING",
            ClipStatus::Ready => "READY",
            ClipStatus::Failed => "FAILED",
        }
    }

    /// Whether this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClipStatus::Ready | ClipStatus::Failed)
    }

    /// Whether a transition from `self` to `next` is legal.
    pub fn can_transition_to(&self, next: ClipStatus) -> bool {
        matches!(
            (self, next),
            (ClipStatus::Pending, ClipStatus::Processing)
                | (ClipStatus::Processing, ClipStatus::Ready)
                | (ClipStatus::Processing, ClipStatus::Failed)
        )
    }
}

impl fmt::Display for ClipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A clip row as stored in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipRecord {
    /// Registry-assigned id
    pub id: ClipId,

    /// Original filename supplied at ingestion time
    pub filename: String,

    /// Identity of the transfer session that produced the file
    pub uploader_id: String,

    /// Locator of the unprocessed artifact; set at insert, immutable
    pub raw_clip_url: String,

    /// Locator of the processed artifact; present iff status is READY
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_clip_url: Option<String>,

    /// Processing status
    #[serde(default)]
    pub status: ClipStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Refreshed on every status transition
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a freshly ingested clip.
///
/// The registry assigns the id; everything else is fixed at ingestion time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClip {
    pub filename: String,
    pub uploader_id: String,
    pub raw_clip_url: String,
    pub status: ClipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewClip {
    /// Create a new PENDING insert payload.
    pub fn new(
        filename: impl Into<String>,
        uploader_id: impl Into<String>,
        raw_clip_url: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            filename: filename.into(),
            uploader_id: uploader_id.into(),
            raw_clip_url: raw_clip_url.into(),
            status: ClipStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}
