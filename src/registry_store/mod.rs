//! RegistryStore - Item Registry (UID -> ItemRecord)
//!
//! ## Responsibilities
//!
//! - Durable UID -> item mapping (one table file)
//! - get / upsert / update_status / snapshot
//! - Read-your-writes inside the process
//!
//! ## Consistency
//!
//! Every mutation runs load -> mutate -> save under one mutex, so two
//! mutations never interleave their writes. Readers are served from an
//! in-memory copy that is swapped only after the table is written, so a
//! reader sees the state before or after a mutation, never a torn one.
//! A failed write leaves both the file and the in-memory copy untouched.

mod repository;
mod types;

pub use repository::{parse_table, render_table};
pub use types::*;

use repository::RegistryRepository;

use chrono::{NaiveDateTime, SubsecRound, Utc};
use chrono_tz::Tz;
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};

/// RegistryStore instance
pub struct RegistryStore {
    repo: RegistryRepository,
    /// Zone used for `last_updated` wall-clock stamps
    timezone: Tz,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
    /// Committed state for readers
    cache: RwLock<RegistryCache>,
}

/// In-memory copy of the committed table
#[derive(Default)]
struct RegistryCache {
    records: Vec<ItemRecord>,
    table: String,
}

impl RegistryStore {
    /// Open (creating if needed) the table at `path`
    pub async fn open(path: impl Into<PathBuf>, timezone: Tz) -> crate::Result<Self> {
        let repo = RegistryRepository::new(path);
        repo.init().await?;

        let records = repo.load().await?;
        let table = render_table(&records);

        tracing::info!(
            path = %repo.path().display(),
            records = records.len(),
            "RegistryStore loaded"
        );

        Ok(Self {
            repo,
            timezone,
            write_lock: Mutex::new(()),
            cache: RwLock::new(RegistryCache { records, table }),
        })
    }

    /// Look up a record. Absent is a normal outcome (unregistered tag).
    pub async fn get(&self, uid: &str) -> Option<ItemRecord> {
        let uid = normalize_uid(uid);
        self.cache
            .read()
            .await
            .records
            .iter()
            .find(|r| r.uid == uid)
            .cloned()
    }

    /// Full current contents in table order
    pub async fn snapshot(&self) -> Vec<ItemRecord> {
        self.cache.read().await.records.clone()
    }

    /// Full current contents rendered as table text
    pub async fn table(&self) -> String {
        self.cache.read().await.table.clone()
    }

    /// Number of records
    pub async fn len(&self) -> usize {
        self.cache.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Insert or replace by uid.
    ///
    /// A known uid keeps its position but gets the new metadata, status
    /// `Available` and a fresh timestamp. A new uid is appended.
    pub async fn upsert(&self, request: &RegisterRequest) -> crate::Result<ItemRecord> {
        let request = request.normalized()?;

        let _guard = self.write_lock.lock().await;
        let mut records = self.repo.load().await?;

        let record = ItemRecord {
            uid: request.uid,
            title: request.title,
            author: request.author,
            publisher: request.publisher,
            status: ItemStatus::Available,
            last_updated: self.now(),
        };

        let replaced = match records.iter_mut().find(|r| r.uid == record.uid) {
            Some(existing) => {
                *existing = record.clone();
                true
            }
            None => {
                records.push(record.clone());
                false
            }
        };

        self.commit(records).await?;

        tracing::info!(
            uid = %record.uid,
            title = %record.title,
            replaced = replaced,
            "Item registered"
        );

        Ok(record)
    }

    /// Set the status of an existing record.
    ///
    /// Unknown uids are a no-op: nothing is written.
    pub async fn update_status(&self, uid: &str, status: ItemStatus) -> crate::Result<StatusUpdate> {
        let uid = normalize_uid(uid);
        let _guard = self.write_lock.lock().await;
        let mut records = self.repo.load().await?;

        let Some(record) = records.iter_mut().find(|r| r.uid == uid) else {
            tracing::debug!(uid = %uid, status = %status, "Status update for unknown uid ignored");
            return Ok(StatusUpdate::NoOp);
        };

        record.status = status;
        record.last_updated = self.now();

        self.commit(records).await?;

        tracing::info!(uid = %uid, status = %status, "Item status updated");

        Ok(StatusUpdate::Applied)
    }

    /// Persist, then publish to readers. Caller holds `write_lock`.
    async fn commit(&self, records: Vec<ItemRecord>) -> crate::Result<()> {
        let table = self.repo.save(&records).await?;
        let mut cache = self.cache.write().await;
        cache.records = records;
        cache.table = table;
        Ok(())
    }

    fn now(&self) -> NaiveDateTime {
        Utc::now()
            .with_timezone(&self.timezone)
            .naive_local()
            .trunc_subsecs(0)
    }
}
