//! Change-capture event payloads.
//!
//! The registry's change-capture mechanism delivers one HTTP notification
//! per row change, shaped `{ "event": { "type": ... }, "table": ...,
//! "record": ... }`. Delivery is at-least-once; the processor filters and
//! claims before acting on one.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::ClipRecord;

/// Event type emitted for row insertions.
pub const EVENT_TYPE_INSERT: &str = "INSERT";

/// The `event` envelope of a change notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventInfo {
    /// Operation kind ("INSERT", "UPDATE", "DELETE")
    #[serde(rename = "type")]
    pub kind: String,
}

/// A change notification as delivered to the webhook.
///
/// `record` stays unparsed until the event passes the type/table filter;
/// notifications for other tables may not deserialize as a [`ClipRecord`].
#[derive(Debug, Deserialize)]
pub struct ChangeEvent {
    pub event: EventInfo,
    pub table: String,
    pub record: Box<RawValue>,
}

impl ChangeEvent {
    /// Whether this notification is an insertion into `table`.
    pub fn is_insert_into(&self, table: &str) -> bool {
        self.event.kind == EVENT_TYPE_INSERT && self.table == table
    }

    /// Parse the record snapshot once the filter has passed.
    pub fn clip_record(&self) -> Result<ClipRecord, serde_json::Error> {
        serde_json::from_str(self.record.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClipStatus;

    fn sample_payload() -> String {
        r#"{
            "event": { "type": "INSERT" },
            "table": "clips",
            "record": {
                "id": "7",
                "filename": "clip001.mp4",
                "uploader_id": "arena01",
                "raw_clip_url": "https://cdn/raw-clips/arena01/clip001.mp4",
                "status": "PENDING",
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z"
            }
        }"#
        .to_string()
    }

    #[test]
    fn test_insert_event_parses() {
        let event: ChangeEvent = serde_json::from_str(&sample_payload()).unwrap();
        assert!(event.is_insert_into("clips"));
        assert!(!event.is_insert_into("other_table"));

        let record = event.clip_record().unwrap();
        assert_eq!(record.uploader_id, "arena01");
        assert_eq!(record.status, ClipStatus::Pending);
    }

    #[test]
    fn test_foreign_record_shape_is_tolerated() {
        // A notification for another table carries an arbitrary record;
        // it must parse as an event even if the record is not a clip.
        let json = r#"{
            "event": { "type": "UPDATE" },
            "table": "scores",
            "record": { "points": 3 }
        }"#;

        let event: ChangeEvent = serde_json::from_str(json).unwrap();
        assert!(!event.is_insert_into("clips"));
        assert!(event.clip_record().is_err());
    }
}
