//! ScanSource - Tag Reader Event Stream
//!
//! ## Responsibilities
//!
//! - Turn reader output into `ScanEvent`s on a single-producer channel
//! - Report reader loss as a fatal error
//!
//! The built-in source reads one UID per line from the reader's serial
//! port, opened at the configured baud rate.
//! Other transports implement [`ScanSource`] and feed the same channel.

use crate::error::{Error, Result};
use crate::registry_store::normalize_uid;
use crate::scan_handler::ScanEvent;
use std::future::Future;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// Scan channel capacity. Tag reads are human-paced.
pub const SCAN_CHANNEL_CAPACITY: usize = 64;

const READER_HINT: &str = "ensure the correct NFC_READER_PORT is set and the device is connected";

/// Source of tag scan events
pub trait ScanSource: Send + 'static {
    /// Name used in logs and diagnostics
    fn describe(&self) -> String;

    /// Push events into `tx` until the source fails or `tx` is closed.
    ///
    /// Returning `Err` means the reader is gone.
    fn run(self, tx: mpsc::Sender<ScanEvent>) -> impl Future<Output = Result<()>> + Send;
}

/// Create the scan event channel
pub fn create_scan_channel() -> (mpsc::Sender<ScanEvent>, mpsc::Receiver<ScanEvent>) {
    mpsc::channel(SCAN_CHANNEL_CAPACITY)
}

/// Run a source in a background task
pub fn spawn_scan_source<S: ScanSource>(
    source: S,
    tx: mpsc::Sender<ScanEvent>,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        let name = source.describe();
        tracing::info!(source = %name, "Scan source started");
        let result = source.run(tx).await;
        if let Err(e) = &result {
            tracing::error!(source = %name, error = %e, "Scan source failed");
        }
        result
    })
}

/// Line-oriented reader: one UID per line
pub struct LineScanSource<R> {
    name: String,
    reader: R,
}

impl<R> LineScanSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
        }
    }
}

impl LineScanSource<SerialStream> {
    /// Open the serial reader at `port`, `baudrate` 8N1
    pub async fn open(port: impl AsRef<Path>, baudrate: u32) -> Result<Self> {
        let port = port.as_ref().display().to_string();
        let stream = tokio_serial::new(port.as_str(), baudrate)
            .open_native_async()
            .map_err(|e| Error::ScanSource {
                port: port.clone(),
                message: format!("open at {} baud failed: {}; {}", baudrate, e, READER_HINT),
            })?;

        tracing::info!(port = %port, baudrate = baudrate, "NFC reader opened");

        Ok(Self::new(port, stream))
    }
}

impl<R> ScanSource for LineScanSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    fn describe(&self) -> String {
        self.name.clone()
    }

    async fn run(self, tx: mpsc::Sender<ScanEvent>) -> Result<()> {
        let mut lines = BufReader::new(self.reader).lines();

        loop {
            let line = lines.next_line().await.map_err(|e| Error::ScanSource {
                port: self.name.clone(),
                message: format!("read failed: {}; {}", e, READER_HINT),
            })?;

            let Some(line) = line else {
                return Err(Error::ScanSource {
                    port: self.name.clone(),
                    message: format!("reader closed; {}", READER_HINT),
                });
            };

            let uid = normalize_uid(&line);
            if uid.is_empty() {
                continue;
            }

            tracing::debug!(uid = %uid, "Tag read");

            if tx.send(ScanEvent::now(uid)).await.is_err() {
                tracing::debug!(source = %self.name, "Scan channel closed, stopping source");
                return Ok(());
            }
        }
    }
}
