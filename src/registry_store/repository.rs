//! RegistryStore Repository
//!
//! Durable table access. The registry lives in one tab-delimited file:
//!
//! ```text
//! UID<TAB>Title<TAB>Author<TAB>Publisher<TAB>Status<TAB>LastUpdated
//! 04:a2:19:7b<TAB>Dune<TAB>Herbert<TAB>Ace<TAB>Available<TAB>10/19/2026, 14:03:22
//! ```

use super::types::*;
use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Column names, in order
pub const TABLE_COLUMNS: [&str; 6] = ["UID", "Title", "Author", "Publisher", "Status", "LastUpdated"];

/// `LastUpdated` column format (24h wall clock)
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y, %H:%M:%S";

/// Header line without the trailing newline
pub fn table_header() -> String {
    TABLE_COLUMNS.join("\t")
}

/// Render records as the full table text (header + one row each)
pub fn render_table(records: &[ItemRecord]) -> String {
    let mut out = table_header();
    out.push('\n');
    for record in records {
        out.push_str(&render_row(record));
        out.push('\n');
    }
    out
}

fn render_row(record: &ItemRecord) -> String {
    [
        record.uid.as_str(),
        record.title.as_str(),
        record.author.as_str(),
        record.publisher.as_str(),
        record.status.as_str(),
        &record.last_updated.format(TIMESTAMP_FORMAT).to_string(),
    ]
    .join("\t")
}

/// Parse table text back into records.
///
/// An empty text is an empty registry. Otherwise the first non-blank
/// line must be the header; blank lines are skipped.
pub fn parse_table(text: &str) -> Result<Vec<ItemRecord>> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty());

    let header = match lines.next() {
        Some((_, line)) => line,
        None => return Ok(Vec::new()),
    };
    if header != table_header() {
        return Err(Error::Parse(format!("unexpected table header '{}'", header)));
    }

    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for (line_no, line) in lines {
        let record = parse_row(line).map_err(|e| match e {
            Error::Parse(msg) => Error::Parse(format!("line {}: {}", line_no, msg)),
            other => other,
        })?;
        if !seen.insert(record.uid.clone()) {
            return Err(Error::Parse(format!(
                "line {}: duplicate uid '{}'",
                line_no, record.uid
            )));
        }
        records.push(record);
    }

    Ok(records)
}

fn parse_row(line: &str) -> Result<ItemRecord> {
    let cols: Vec<&str> = line.split('\t').collect();
    if cols.len() != TABLE_COLUMNS.len() {
        return Err(Error::Parse(format!(
            "expected {} columns, found {}",
            TABLE_COLUMNS.len(),
            cols.len()
        )));
    }
    if cols[0].is_empty() {
        return Err(Error::Parse("empty uid".to_string()));
    }

    let last_updated = NaiveDateTime::parse_from_str(cols[5], TIMESTAMP_FORMAT)
        .map_err(|e| Error::Parse(format!("bad timestamp '{}': {}", cols[5], e)))?;

    Ok(ItemRecord {
        uid: cols[0].to_string(),
        title: cols[1].to_string(),
        author: cols[2].to_string(),
        publisher: cols[3].to_string(),
        status: cols[4].parse()?,
        last_updated,
    })
}

/// File-backed repository for the registry table
pub struct RegistryRepository {
    path: PathBuf,
}

impl RegistryRepository {
    /// Create new repository for the given table path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Table file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the data directory and a header-only table if none exists
    pub async fn init(&self) -> Result<bool> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        if fs::try_exists(&self.path).await? {
            return Ok(false);
        }

        self.write_atomic(&render_table(&[])).await?;
        tracing::info!(path = %self.path.display(), "Created empty registry table");
        Ok(true)
    }

    /// Read the raw table text
    pub async fn read_raw(&self) -> Result<String> {
        Ok(fs::read_to_string(&self.path).await?)
    }

    /// Load all records
    pub async fn load(&self) -> Result<Vec<ItemRecord>> {
        let text = self.read_raw().await?;
        parse_table(&text)
    }

    /// Replace the whole table. Returns the text that was written.
    pub async fn save(&self, records: &[ItemRecord]) -> Result<String> {
        let table = render_table(records);
        self.write_atomic(&table).await?;
        Ok(table)
    }

    /// Write to a sibling temp file, then rename over the table
    async fn write_atomic(&self, contents: &str) -> Result<()> {
        let tmp = self.temp_path();

        let result = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(contents.as_bytes()).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp, &self.path).await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp).await;
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "Failed to write registry table"
            );
            return Err(e.into());
        }

        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "registry".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }
}
