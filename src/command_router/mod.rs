//! CommandRouter - Viewer Command Handling
//!
//! ## Responsibilities
//!
//! - Parse inbound viewer messages
//! - Validate and apply them to the RegistryStore
//! - Broadcast the full registry after any mutation
//!
//! | Command      | Action                        | Broadcast              |
//! |--------------|-------------------------------|------------------------|
//! | `register`   | upsert payload                | always                 |
//! | `check-out`  | status -> Checked-Out         | only if uid existed    |
//! | `check-in`   | status -> Available           | only if uid existed    |
//! | `list-books` | none                          | no, reply to sender    |
//!
//! Malformed or unrecognized messages are dropped without a reply; the
//! connection stays open.

use crate::realtime_hub::HubMessage;
use crate::registry_store::{ItemStatus, RegisterRequest};
use crate::state::RegistryContext;
use serde::Deserialize;
use uuid::Uuid;

/// Inbound viewer command
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command")]
pub enum ViewerCommand {
    #[serde(rename = "register")]
    Register { payload: RegisterRequest },
    #[serde(rename = "check-out")]
    CheckOut { uid: String },
    #[serde(rename = "check-in")]
    CheckIn { uid: String },
    #[serde(rename = "list-books")]
    ListBooks,
    /// Any other `command` value
    #[serde(other)]
    Unrecognized,
}

impl ViewerCommand {
    /// Parse a raw text frame
    pub fn parse(text: &str) -> crate::Result<Self> {
        serde_json::from_str(text).map_err(|e| crate::Error::Parse(e.to_string()))
    }

    fn name(&self) -> &'static str {
        match self {
            ViewerCommand::Register { .. } => "register",
            ViewerCommand::CheckOut { .. } => "check-out",
            ViewerCommand::CheckIn { .. } => "check-in",
            ViewerCommand::ListBooks => "list-books",
            ViewerCommand::Unrecognized => "unrecognized",
        }
    }
}

/// What the router did with a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Registry changed, snapshot broadcast to all viewers
    Broadcast,
    /// Snapshot sent to the requesting viewer only
    Replied,
    /// Valid command with nothing to do (unknown uid)
    NoOp,
    /// Malformed, invalid or unrecognized; dropped
    Dropped,
}

/// CommandRouter instance
#[derive(Clone)]
pub struct CommandRouter {
    ctx: RegistryContext,
}

impl CommandRouter {
    /// Create new router
    pub fn new(ctx: RegistryContext) -> Self {
        Self { ctx }
    }

    /// Handle a raw text frame from `session`.
    ///
    /// Parse failures are dropped here. Storage failures are returned.
    pub async fn handle_text(&self, session: Uuid, text: &str) -> crate::Result<RouteOutcome> {
        match ViewerCommand::parse(text) {
            Ok(command) => self.dispatch(session, command).await,
            Err(e) => {
                tracing::warn!(
                    connection_id = %session,
                    error = %e,
                    "Dropping malformed viewer message"
                );
                Ok(RouteOutcome::Dropped)
            }
        }
    }

    /// Apply a parsed command
    pub async fn dispatch(&self, session: Uuid, command: ViewerCommand) -> crate::Result<RouteOutcome> {
        tracing::debug!(connection_id = %session, command = %command.name(), "Viewer command");

        match command {
            ViewerCommand::Register { payload } => {
                match self.ctx.store.upsert(&payload).await {
                    Ok(_) => {}
                    Err(crate::Error::Validation(msg)) => {
                        tracing::warn!(
                            connection_id = %session,
                            reason = %msg,
                            "Dropping invalid register command"
                        );
                        return Ok(RouteOutcome::Dropped);
                    }
                    Err(e) => return Err(e),
                }
                self.broadcast_book_list().await;
                Ok(RouteOutcome::Broadcast)
            }
            ViewerCommand::CheckOut { uid } => self.set_status(&uid, ItemStatus::CheckedOut).await,
            ViewerCommand::CheckIn { uid } => self.set_status(&uid, ItemStatus::Available).await,
            ViewerCommand::ListBooks => {
                let message = HubMessage::BookList {
                    data: self.ctx.store.table().await,
                };
                self.ctx.hub.send_to(&session, &message).await;
                Ok(RouteOutcome::Replied)
            }
            ViewerCommand::Unrecognized => {
                tracing::warn!(connection_id = %session, "Ignoring unrecognized viewer command");
                Ok(RouteOutcome::Dropped)
            }
        }
    }

    async fn set_status(&self, uid: &str, status: ItemStatus) -> crate::Result<RouteOutcome> {
        let outcome = self.ctx.store.update_status(uid, status).await?;
        if !outcome.is_applied() {
            return Ok(RouteOutcome::NoOp);
        }
        self.broadcast_book_list().await;
        Ok(RouteOutcome::Broadcast)
    }

    async fn broadcast_book_list(&self) {
        let message = HubMessage::BookList {
            data: self.ctx.store.table().await,
        };
        self.ctx.hub.broadcast(&message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime_hub::RealtimeHub;
    use crate::registry_store::RegistryStore;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    async fn setup() -> (TempDir, RegistryContext, CommandRouter) {
        let dir = tempdir().unwrap();
        let store = RegistryStore::open(dir.path().join("books.tsv"), chrono_tz::Asia::Taipei)
            .await
            .unwrap();
        let ctx = RegistryContext::new(Arc::new(store), Arc::new(RealtimeHub::new()));
        let router = CommandRouter::new(ctx.clone());
        (dir, ctx, router)
    }

    const REGISTER_DUNE: &str =
        r#"{"command":"register","payload":{"uid":"T1","title":"Dune","author":"Herbert","publisher":"Ace"}}"#;

    fn book_list_data(json: &str) -> String {
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(value["type"], "book-list");
        value["data"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            ViewerCommand::parse(r#"{"command":"check-out","uid":"T1"}"#).unwrap(),
            ViewerCommand::CheckOut { uid: "T1".to_string() }
        );
        assert_eq!(
            ViewerCommand::parse(r#"{"command":"list-books"}"#).unwrap(),
            ViewerCommand::ListBooks
        );
        assert_eq!(
            ViewerCommand::parse(r#"{"command":"delete","uid":"T1"}"#).unwrap(),
            ViewerCommand::Unrecognized
        );
        assert!(ViewerCommand::parse("not json").is_err());
        assert!(ViewerCommand::parse(r#"{"command":"check-in"}"#).is_err());
        assert!(ViewerCommand::parse(r#"{"uid":"T1"}"#).is_err());
    }

    #[tokio::test]
    async fn test_register_broadcasts_snapshot() {
        let (_dir, ctx, router) = setup().await;
        let (me, mut rx) = ctx.hub.register().await;

        let outcome = router.handle_text(me, REGISTER_DUNE).await.unwrap();

        assert_eq!(outcome, RouteOutcome::Broadcast);
        let data = book_list_data(&rx.recv().await.unwrap());
        assert_eq!(data, ctx.store.table().await);
        assert_eq!(ctx.store.get("T1").await.unwrap().status, ItemStatus::Available);
    }

    #[tokio::test]
    async fn test_check_out_then_get() {
        let (_dir, ctx, router) = setup().await;
        let (me, mut rx) = ctx.hub.register().await;
        router.handle_text(me, REGISTER_DUNE).await.unwrap();
        rx.recv().await.unwrap();

        let outcome = router
            .handle_text(me, r#"{"command":"check-out","uid":"T1"}"#)
            .await
            .unwrap();

        assert_eq!(outcome, RouteOutcome::Broadcast);
        assert!(book_list_data(&rx.recv().await.unwrap()).contains("\tChecked-Out\t"));
        assert_eq!(ctx.store.get("T1").await.unwrap().status, ItemStatus::CheckedOut);
    }

    #[tokio::test]
    async fn test_check_out_accepts_any_uid_spelling() {
        let (_dir, ctx, router) = setup().await;
        let (me, mut rx) = ctx.hub.register().await;
        router
            .handle_text(me, r#"{"command":"register","payload":{"uid":"04:a2:19:7b","title":"Dune"}}"#)
            .await
            .unwrap();
        rx.recv().await.unwrap();

        let outcome = router
            .handle_text(me, r#"{"command":"check-out","uid":"04A2197B"}"#)
            .await
            .unwrap();

        assert_eq!(outcome, RouteOutcome::Broadcast);
        assert_eq!(
            ctx.store.get("04:a2:19:7b").await.unwrap().status,
            ItemStatus::CheckedOut
        );
    }

    #[tokio::test]
    async fn test_check_in_unknown_uid_is_silent() {
        let (_dir, ctx, router) = setup().await;
        let (me, mut rx) = ctx.hub.register().await;
        let before = ctx.store.table().await;

        let outcome = router
            .handle_text(me, r#"{"command":"check-in","uid":"UNKNOWN"}"#)
            .await
            .unwrap();

        assert_eq!(outcome, RouteOutcome::NoOp);
        assert!(rx.try_recv().is_err());
        assert_eq!(ctx.store.table().await, before);
    }

    #[tokio::test]
    async fn test_list_books_replies_to_sender_only() {
        let (_dir, ctx, router) = setup().await;
        let (me, mut rx_me) = ctx.hub.register().await;
        let (_other, mut rx_other) = ctx.hub.register().await;

        let outcome = router
            .handle_text(me, r#"{"command":"list-books"}"#)
            .await
            .unwrap();

        assert_eq!(outcome, RouteOutcome::Replied);
        assert_eq!(
            book_list_data(&rx_me.recv().await.unwrap()),
            "UID\tTitle\tAuthor\tPublisher\tStatus\tLastUpdated\n"
        );
        assert!(rx_other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_and_unrecognized_are_dropped() {
        let (_dir, ctx, router) = setup().await;
        let (me, mut rx) = ctx.hub.register().await;

        for text in [
            "{not json",
            r#"{"command":"register","payload":{"uid":"T1"}}"#,
            r#"{"command":"register","payload":{"uid":"","title":"Dune"}}"#,
            r#"{"command":"renew","uid":"T1"}"#,
        ] {
            assert_eq!(router.handle_text(me, text).await.unwrap(), RouteOutcome::Dropped);
        }

        assert!(rx.try_recv().is_err());
        assert!(ctx.store.is_empty().await);
    }
}
