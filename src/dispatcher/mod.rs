//! Dispatcher - Single Serialization Point
//!
//! One worker drains tag scans and viewer commands one at a time, so
//! registry mutations never race and every viewer sees broadcasts in the
//! order they were issued.

use crate::command_router::CommandRouter;
use crate::realtime_hub::HubMessage;
use crate::scan_handler::{ScanEvent, ScanHandler};
use crate::state::RegistryContext;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Viewer queue capacity
pub const VIEWER_CHANNEL_CAPACITY: usize = 256;

/// Viewer-side input to the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    /// Viewer registered with the hub, needs its initial snapshot
    Connected(Uuid),
    /// Raw text frame from a viewer
    Message { session: Uuid, text: String },
}

/// Sender side of the worker queue
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<ViewerEvent>,
}

impl DispatcherHandle {
    /// Queue the initial snapshot for a new viewer
    pub async fn connected(&self, session: Uuid) -> bool {
        self.send(ViewerEvent::Connected(session)).await
    }

    /// Queue a viewer message
    pub async fn message(&self, session: Uuid, text: impl Into<String>) -> bool {
        self.send(ViewerEvent::Message {
            session,
            text: text.into(),
        })
        .await
    }

    async fn send(&self, event: ViewerEvent) -> bool {
        if self.tx.send(event).await.is_err() {
            tracing::error!("Dispatcher is not running");
            return false;
        }
        true
    }
}

/// Dispatcher worker
pub struct Dispatcher {
    ctx: RegistryContext,
    router: CommandRouter,
    scans: ScanHandler,
}

impl Dispatcher {
    pub fn new(ctx: RegistryContext) -> Self {
        Self {
            router: CommandRouter::new(ctx.clone()),
            scans: ScanHandler::new(ctx.clone()),
            ctx,
        }
    }

    /// Run until both queues are closed
    pub async fn run(
        self,
        mut scan_rx: mpsc::Receiver<ScanEvent>,
        mut viewer_rx: mpsc::Receiver<ViewerEvent>,
    ) {
        tracing::info!("Dispatcher started");

        let mut scans_open = true;
        let mut viewers_open = true;

        while scans_open || viewers_open {
            tokio::select! {
                scan = scan_rx.recv(), if scans_open => match scan {
                    Some(event) => {
                        self.scans.handle(&event).await;
                    }
                    None => {
                        tracing::warn!("Scan channel closed");
                        scans_open = false;
                    }
                },
                event = viewer_rx.recv(), if viewers_open => match event {
                    Some(event) => self.handle_viewer(event).await,
                    None => {
                        tracing::debug!("Viewer channel closed");
                        viewers_open = false;
                    }
                },
            }
        }

        tracing::info!("Dispatcher stopped");
    }

    async fn handle_viewer(&self, event: ViewerEvent) {
        match event {
            ViewerEvent::Connected(session) => {
                let message = HubMessage::BookList {
                    data: self.ctx.store.table().await,
                };
                self.ctx.hub.send_to(&session, &message).await;
            }
            ViewerEvent::Message { session, text } => {
                if let Err(e) = self.router.handle_text(session, &text).await {
                    tracing::error!(
                        connection_id = %session,
                        error = %e,
                        "Viewer command failed, registry unchanged"
                    );
                }
            }
        }
    }
}

/// Start the worker in a background task
pub fn spawn_dispatcher(
    ctx: RegistryContext,
    scan_rx: mpsc::Receiver<ScanEvent>,
) -> (DispatcherHandle, JoinHandle<()>) {
    let (tx, viewer_rx) = mpsc::channel(VIEWER_CHANNEL_CAPACITY);
    let dispatcher = Dispatcher::new(ctx);
    let handle = tokio::spawn(async move {
        dispatcher.run(scan_rx, viewer_rx).await;
    });
    (DispatcherHandle { tx }, handle)
}
