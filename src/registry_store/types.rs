//! RegistryStore types

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Checkout status of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    Available,
    #[serde(rename = "Checked-Out")]
    CheckedOut,
}

impl ItemStatus {
    /// Text used in the durable table and on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Available => "Available",
            ItemStatus::CheckedOut => "Checked-Out",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim() {
            "Available" => Ok(ItemStatus::Available),
            "Checked-Out" | "CheckedOut" => Ok(ItemStatus::CheckedOut),
            other => Err(crate::Error::Parse(format!("unknown status '{}'", other))),
        }
    }
}

/// One registered item (a book carrying an NFC tag)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Tag UID, unique key, never changes once created
    pub uid: String,
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub status: ItemStatus,
    /// Wall-clock time of the last mutation in the configured zone
    pub last_updated: NaiveDateTime,
}

/// Register payload: `{uid, title, author, publisher}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisterRequest {
    pub uid: String,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub publisher: String,
}

impl RegisterRequest {
    /// Build a request from plain fields
    pub fn new(
        uid: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        publisher: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            title: title.into(),
            author: author.into(),
            publisher: publisher.into(),
        }
    }

    /// Validate and clean the payload for storage.
    ///
    /// `uid` and `title` must be non-blank. Tabs and line breaks are
    /// replaced so a field can never split a table row. The uid is put in
    /// the same form the reader reports it in.
    pub fn normalized(&self) -> crate::Result<Self> {
        let uid = normalize_uid(&sanitize_field(&self.uid));
        let title = sanitize_field(&self.title);

        if uid.is_empty() {
            return Err(crate::Error::Validation("uid is required".to_string()));
        }
        if title.is_empty() {
            return Err(crate::Error::Validation("title is required".to_string()));
        }

        Ok(Self {
            uid,
            title,
            author: sanitize_field(&self.author),
            publisher: sanitize_field(&self.publisher),
        })
    }
}

/// Replace table delimiters with spaces and trim
pub fn sanitize_field(value: &str) -> String {
    value
        .chars()
        .map(|c| if matches!(c, '\t' | '\r' | '\n') { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Canonical form of a tag UID.
///
/// Hex UIDs, with or without `:`/`-`/space separators, become lowercase
/// colon-separated byte pairs (`04:a2:19:7b`). Anything else is trimmed
/// and kept as-is. Every lookup and every stored uid goes through this.
pub fn normalize_uid(raw: &str) -> String {
    let trimmed = raw.trim();
    let digits: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | ' '))
        .collect();

    let is_hex = !digits.is_empty()
        && digits.len() % 2 == 0
        && digits.chars().all(|c| c.is_ascii_hexdigit());
    if !is_hex {
        return trimmed.to_string();
    }

    digits
        .to_ascii_lowercase()
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<_>>()
        .join(":")
}

/// Outcome of a status update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// Record existed and was rewritten
    Applied,
    /// No record with that uid, nothing written
    NoOp,
}

impl StatusUpdate {
    pub fn is_applied(&self) -> bool {
        matches!(self, StatusUpdate::Applied)
    }
}
