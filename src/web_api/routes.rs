//! API Routes

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Request, State,
    },
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::registry_store::ItemRecord;
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Bundled UI connects to ws://host/
        .route("/", get(root_handler))
        // Health & Status
        .route("/healthz", get(super::health_check))
        .route("/api/status", get(super::server_status))
        // Registry
        .route("/api/books", get(list_books))
        .route("/api/books/export", get(export_books))
        .route("/api/books/:uid", get(get_book))
        // WebSocket
        .route("/api/ws", get(websocket_handler))
        .with_state(state)
}

// ========================================
// Registry
// ========================================

async fn list_books(State(state): State<AppState>) -> Json<Vec<ItemRecord>> {
    Json(state.registry.store.snapshot().await)
}

async fn get_book(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> crate::Result<Json<ItemRecord>> {
    state
        .registry
        .store
        .get(&uid)
        .await
        .map(Json)
        .ok_or_else(|| crate::Error::NotFound(format!("Item {} not registered", uid)))
}

/// Registry table as a TSV download
async fn export_books(State(state): State<AppState>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/tab-separated-values; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"books.tsv\""),
        ],
        state.registry.store.table().await,
    )
}

// ========================================
// WebSocket Handler
// ========================================

/// `/`: WebSocket upgrade if requested, otherwise the UI index page
async fn root_handler(
    ws: Option<WebSocketUpgrade>,
    State(state): State<AppState>,
    request: Request,
) -> Response {
    match ws {
        Some(ws) => ws
            .on_upgrade(move |socket| handle_websocket(socket, state))
            .into_response(),
        None => {
            let index = state.config.static_dir.join("index.html");
            ServeFile::new(index).oneshot(request).await.into_response()
        }
    }
}

/// WebSocket upgrade handler
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle WebSocket connection
async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Register with RealtimeHub, then ask the dispatcher for the snapshot
    let (conn_id, mut rx) = state.registry.hub.register().await;
    state.dispatcher.connected(conn_id).await;

    // Forward hub messages to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // Forward viewer commands to the dispatcher
    let dispatcher = state.dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    if !dispatcher.message(conn_id, text).await {
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!(connection_id = %conn_id, "WebSocket close frame");
                    break;
                }
                Err(e) => {
                    tracing::warn!(connection_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Unregister from hub
    state.registry.hub.unregister(&conn_id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::spawn_dispatcher;
    use crate::realtime_hub::RealtimeHub;
    use crate::registry_store::{ItemStatus, RegisterRequest, RegistryStore};
    use crate::scan_source::create_scan_channel;
    use crate::state::{AppConfig, RegistryContext};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    async fn test_state() -> (TempDir, AppState) {
        let dir = tempdir().unwrap();
        let static_dir = dir.path().join("web-app");
        std::fs::create_dir_all(&static_dir).unwrap();
        std::fs::write(static_dir.join("index.html"), "<html>shelf</html>").unwrap();

        let config = AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            data_dir: dir.path().join("work"),
            books_file: "books.tsv".to_string(),
            static_dir,
            reader_port: dir.path().join("reader"),
            reader_baudrate: 115200,
            timezone: "Asia/Taipei".to_string(),
        };
        let store = RegistryStore::open(config.books_path(), chrono_tz::Asia::Taipei)
            .await
            .unwrap();
        let registry = RegistryContext::new(Arc::new(store), Arc::new(RealtimeHub::new()));
        let (_scan_tx, scan_rx) = create_scan_channel();
        let (dispatcher, _task) = spawn_dispatcher(registry.clone(), scan_rx);

        (
            dir,
            AppState {
                config,
                registry,
                dispatcher,
            },
        )
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_healthz() {
        let (_dir, state) = test_state().await;
        let (status, body) = get(create_router(state), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"ok\""));
    }

    #[tokio::test]
    async fn test_get_book() {
        let (_dir, state) = test_state().await;

        let (status, body) = get(create_router(state.clone()), "/api/books/T1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("NOT_FOUND"));

        state
            .registry
            .store
            .upsert(&RegisterRequest::new("T1", "Dune", "Herbert", "Ace"))
            .await
            .unwrap();

        let (status, body) = get(create_router(state), "/api/books/T1").await;
        assert_eq!(status, StatusCode::OK);
        let record: ItemRecord = serde_json::from_str(&body).unwrap();
        assert_eq!(record.title, "Dune");
        assert_eq!(record.status, ItemStatus::Available);
    }

    #[tokio::test]
    async fn test_export_and_status() {
        let (_dir, state) = test_state().await;
        let store = state.registry.store.clone();
        store
            .upsert(&RegisterRequest::new("T1", "Dune", "Herbert", "Ace"))
            .await
            .unwrap();
        store.update_status("T1", ItemStatus::CheckedOut).await.unwrap();

        let (status, body) = get(create_router(state.clone()), "/api/books/export").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, store.table().await);

        let (_, body) = get(create_router(state.clone()), "/api/status").await;
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["records"], 1);
        assert_eq!(value["checked_out"], 1);

        let (_, body) = get(create_router(state), "/api/books").await;
        let records: Vec<ItemRecord> = serde_json::from_str(&body).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_root_without_upgrade_serves_index() {
        let (_dir, state) = test_state().await;
        let (status, body) = get(create_router(state), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<html>shelf</html>");
    }
}
