//! RealtimeHub - Viewer Session Fan-out
//!
//! ## Responsibilities
//!
//! - Track live viewer connections
//! - Broadcast registry/scan updates to every viewer
//! - Send to exactly one viewer (initial snapshot, list-books reply)
//!
//! Delivery is best-effort. A viewer whose transport has gone away is
//! skipped; it gets a fresh snapshot when it reconnects. The hub keeps no
//! per-viewer state beyond the outbound channel.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Hub message types (core -> viewer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HubMessage {
    /// Result of a tag scan, sent to all viewers
    #[serde(rename = "tag")]
    Tag(TagMessage),
    /// Full registry table
    #[serde(rename = "book-list")]
    BookList {
        /// Table text with header row, tab delimited
        data: String,
    },
}

impl HubMessage {
    /// Wire text sent to viewers
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn kind(&self) -> &'static str {
        match self {
            HubMessage::Tag(_) => "tag",
            HubMessage::BookList { .. } => "book-list",
        }
    }
}

/// Scan result message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagMessage {
    pub uid: String,
    /// Item title, or "Unregistered"
    pub title: String,
    /// Item status text, or "N/A"
    pub status: String,
}

/// Client connection
struct ClientConnection {
    id: Uuid,
    tx: mpsc::UnboundedSender<String>,
}

/// RealtimeHub instance
pub struct RealtimeHub {
    connections: RwLock<HashMap<Uuid, ClientConnection>>,
    connection_count: AtomicU64,
}

impl RealtimeHub {
    /// Create new RealtimeHub
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            connection_count: AtomicU64::new(0),
        }
    }

    /// Register a new viewer. The receiver yields serialized messages.
    pub async fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        {
            let mut connections = self.connections.write().await;
            connections.insert(id, ClientConnection { id, tx });
        }

        self.connection_count.fetch_add(1, Ordering::Relaxed);

        tracing::info!(connection_id = %id, "Viewer connected");

        (id, rx)
    }

    /// Unregister a viewer (idempotent)
    pub async fn unregister(&self, id: &Uuid) {
        let mut connections = self.connections.write().await;
        if connections.remove(id).is_some() {
            self.connection_count.fetch_sub(1, Ordering::Relaxed);
            tracing::info!(connection_id = %id, "Viewer disconnected");
        }
    }

    /// Broadcast message to all viewers. Returns how many accepted it.
    pub async fn broadcast(&self, message: &HubMessage) -> usize {
        let json = match message.to_json() {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(message_type = %message.kind(), error = %e, "Failed to serialize message");
                return 0;
            }
        };

        let connections = self.connections.read().await;
        tracing::debug!(
            message_type = %message.kind(),
            client_count = connections.len(),
            "Broadcasting message to viewers"
        );

        let mut delivered = 0;
        for conn in connections.values() {
            match conn.tx.send(json.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(connection_id = %conn.id, error = %e, "Skipping stale viewer");
                }
            }
        }
        delivered
    }

    /// Send message to one viewer. Returns false if it is gone.
    pub async fn send_to(&self, id: &Uuid, message: &HubMessage) -> bool {
        let json = match message.to_json() {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(message_type = %message.kind(), error = %e, "Failed to serialize message");
                return false;
            }
        };

        let connections = self.connections.read().await;
        match connections.get(id) {
            Some(conn) => match conn.tx.send(json) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(connection_id = %id, error = %e, "Failed to send message");
                    false
                }
            },
            None => {
                tracing::debug!(connection_id = %id, "Viewer no longer registered");
                false
            }
        }
    }

    /// Get connection count
    pub fn connection_count(&self) -> u64 {
        self.connection_count.load(Ordering::Relaxed)
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book_list(data: &str) -> HubMessage {
        HubMessage::BookList {
            data: data.to_string(),
        }
    }

    #[test]
    fn test_wire_format() {
        let tag = HubMessage::Tag(TagMessage {
            uid: "T1".to_string(),
            title: "Dune".to_string(),
            status: "Available".to_string(),
        });
        let value = serde_json::to_value(&tag).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "tag", "uid": "T1", "title": "Dune", "status": "Available"})
        );

        let value = serde_json::to_value(book_list("UID\n")).unwrap();
        assert_eq!(value, serde_json::json!({"type": "book-list", "data": "UID\n"}));

        assert_eq!(
            book_list("UID\n").to_json().unwrap(),
            r#"{"type":"book-list","data":"UID\n"}"#
        );
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all() {
        let hub = RealtimeHub::new();
        let (_a, mut rx_a) = hub.register().await;
        let (_b, mut rx_b) = hub.register().await;

        assert_eq!(hub.broadcast(&book_list("x")).await, 2);

        let a = rx_a.recv().await.unwrap();
        let b = rx_b.recv().await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_stale_viewer_is_skipped() {
        let hub = RealtimeHub::new();
        let (_gone, rx_gone) = hub.register().await;
        let (_live, mut rx_live) = hub.register().await;
        drop(rx_gone);

        assert_eq!(hub.broadcast(&book_list("x")).await, 1);
        assert!(rx_live.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_send_to_one() {
        let hub = RealtimeHub::new();
        let (a, mut rx_a) = hub.register().await;
        let (_b, mut rx_b) = hub.register().await;

        assert!(hub.send_to(&a, &book_list("only a")).await);

        assert!(rx_a.recv().await.unwrap().contains("only a"));
        assert!(rx_b.try_recv().is_err());
        assert!(!hub.send_to(&Uuid::new_v4(), &book_list("nobody")).await);
    }

    #[tokio::test]
    async fn test_unregister_idempotent() {
        let hub = RealtimeHub::new();
        let (a, _rx) = hub.register().await;
        assert_eq!(hub.connection_count(), 1);

        hub.unregister(&a).await;
        hub.unregister(&a).await;

        assert_eq!(hub.connection_count(), 0);
        assert_eq!(hub.broadcast(&book_list("x")).await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_order_preserved() {
        let hub = RealtimeHub::new();
        let (_a, mut rx) = hub.register().await;

        hub.broadcast(&book_list("first")).await;
        hub.broadcast(&book_list("second")).await;

        assert!(rx.recv().await.unwrap().contains("first"));
        assert!(rx.recv().await.unwrap().contains("second"));
    }
}
