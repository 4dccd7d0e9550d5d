//! Application state
//!
//! Holds configuration and the shared registry context

use crate::dispatcher::DispatcherHandle;
use crate::realtime_hub::RealtimeHub;
use crate::registry_store::RegistryStore;
use chrono_tz::Tz;
use std::path::PathBuf;
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Directory holding the registry table
    pub data_dir: PathBuf,
    /// Registry table file name
    pub books_file: String,
    /// Viewer UI directory
    pub static_dir: PathBuf,
    /// NFC reader serial port
    pub reader_port: PathBuf,
    /// NFC reader baud rate
    pub reader_baudrate: u32,
    /// IANA zone name for LastUpdated stamps
    pub timezone: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("work")),
            books_file: std::env::var("BOOKS_FILE").unwrap_or_else(|_| "books.tsv".to_string()),
            static_dir: std::env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("web-app")),
            reader_port: std::env::var("NFC_READER_PORT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/dev/ttyUSB0")),
            reader_baudrate: std::env::var("NFC_READER_BAUDRATE")
                .ok()
                .and_then(|b| b.parse().ok())
                .unwrap_or(115200),
            timezone: std::env::var("TIMEZONE").unwrap_or_else(|_| "Asia/Taipei".to_string()),
        }
    }
}

impl AppConfig {
    /// Full path of the registry table
    pub fn books_path(&self) -> PathBuf {
        self.data_dir.join(&self.books_file)
    }

    /// Parsed timezone
    pub fn tz(&self) -> crate::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| crate::Error::Config(format!("TIMEZONE '{}': {}", self.timezone, e)))
    }

    /// Bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Store + hub, passed explicitly to the router and scan handler
#[derive(Clone)]
pub struct RegistryContext {
    pub store: Arc<RegistryStore>,
    pub hub: Arc<RealtimeHub>,
}

impl RegistryContext {
    pub fn new(store: Arc<RegistryStore>, hub: Arc<RealtimeHub>) -> Self {
        Self { store, hub }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// RegistryStore + RealtimeHub
    pub registry: RegistryContext,
    /// Inbound queue of the serializing worker
    pub dispatcher: DispatcherHandle,
}
