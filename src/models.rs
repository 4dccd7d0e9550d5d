//! Shared models for the HTTP surface

use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub service: String,
    pub version: String,
    /// Connected viewers
    pub viewers: u64,
    /// Registered items
    pub records: usize,
    /// Items currently checked out
    pub checked_out: usize,
}
