//! ShelfTag Server Library
//!
//! NFC-tagged library registry with realtime viewers.
//!
//! ## Architecture (6 Components)
//!
//! 1. RegistryStore - durable UID -> item table
//! 2. ScanSource - tag reader event stream
//! 3. ScanHandler - scan -> lookup -> broadcast
//! 4. CommandRouter - viewer command -> mutation -> broadcast
//! 5. RealtimeHub - viewer session fan-out
//! 6. Dispatcher - single worker serializing scans and commands
//!
//! ## Flow
//!
//! ```text
//! reader -> ScanSource -> Dispatcher -> ScanHandler -> RegistryStore::get -> RealtimeHub::broadcast(tag)
//! viewer -> WebAPI -> Dispatcher -> CommandRouter -> RegistryStore::upsert/update_status -> RealtimeHub::broadcast(book-list)
//! ```

pub mod command_router;
pub mod dispatcher;
pub mod realtime_hub;
pub mod registry_store;
pub mod scan_handler;
pub mod scan_source;
pub mod web_api;
pub mod models;
pub mod error;
pub mod state;

pub use error::{Error, Result};
pub use state::AppState;
