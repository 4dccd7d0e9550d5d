//! ScanHandler - Tag Scan -> Viewer Notification
//!
//! Looks the scanned UID up in the registry and broadcasts the result.
//! Scanning never mutates the registry; status only changes through
//! check-in / check-out commands.

use crate::realtime_hub::{HubMessage, TagMessage};
use crate::state::RegistryContext;
use chrono::{DateTime, Utc};

/// Title reported for a tag with no registry record
pub const UNREGISTERED_TITLE: &str = "Unregistered";

/// Status reported for a tag with no registry record
pub const UNKNOWN_STATUS: &str = "N/A";

/// One tag read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    pub uid: String,
    pub scanned_at: DateTime<Utc>,
}

impl ScanEvent {
    /// Scan stamped with the current time
    pub fn now(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            scanned_at: Utc::now(),
        }
    }
}

/// ScanHandler instance
#[derive(Clone)]
pub struct ScanHandler {
    ctx: RegistryContext,
}

impl ScanHandler {
    pub fn new(ctx: RegistryContext) -> Self {
        Self { ctx }
    }

    /// Look up and broadcast one scan. Returns the message sent.
    pub async fn handle(&self, event: &ScanEvent) -> TagMessage {
        let record = self.ctx.store.get(&event.uid).await;

        let result = match record {
            Some(record) => TagMessage {
                uid: event.uid.clone(),
                title: record.title,
                status: record.status.to_string(),
            },
            None => TagMessage {
                uid: event.uid.clone(),
                title: UNREGISTERED_TITLE.to_string(),
                status: UNKNOWN_STATUS.to_string(),
            },
        };

        tracing::info!(
            uid = %result.uid,
            title = %result.title,
            status = %result.status,
            scanned_at = %event.scanned_at.to_rfc3339(),
            "Tag scanned"
        );

        self.ctx.hub.broadcast(&HubMessage::Tag(result.clone())).await;
        result
    }
}
