//! RocksDB-backed debate store
//!
//! One JSON document per debate in the `debates` column family. Writes that
//! read, check and rewrite a record hold `write_lock` for the whole sequence
//! so the status guard cannot be raced within this process.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::schema::{self, ALL_CFS, CF_DEBATES};
use super::types::newest_first;
use super::{
    apply_results, apply_votes, DebateId, DebateRecord, DebateRepository, DebateSummary, Results,
    SharedDebateRepository, StoreError, StoreResult, Vote,
};

/// Persistent debate store
pub struct RocksDebateRepository {
    db: DB,
    write_lock: Mutex<()>,
    path: PathBuf,
}

impl RocksDebateRepository {
    /// Open or create a store at the given path
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, &path, cf_descriptors)?;
        debug!(path = %path.display(), "opened debate store");

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
            path,
        })
    }

    /// Create a shared reference to this store
    pub fn shared(self) -> SharedDebateRepository {
        Arc::new(self)
    }

    /// Get the database path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    // =========================================================================
    // Generic operations
    // =========================================================================

    fn put<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        let cf = self
            .db
            .cf_handle(CF_DEBATES)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(CF_DEBATES.to_string()))?;

        let bytes =
            serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.db.put_cf(cf, key.as_bytes(), bytes)?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let cf = self
            .db
            .cf_handle(CF_DEBATES)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(CF_DEBATES.to_string()))?;

        match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Deserialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Every debate record in key order.
    fn scan(&self) -> StoreResult<Vec<DebateRecord>> {
        let cf = self
            .db
            .cf_handle(CF_DEBATES)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(CF_DEBATES.to_string()))?;

        let mut records = Vec::new();
        let prefix = schema::keys::DEBATE_PREFIX;
        for item in self.db.prefix_iterator_cf(cf, prefix.as_bytes()) {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break; // Prefix no longer matches
            }
            let record: DebateRecord = serde_json::from_slice(&value)
                .map_err(|e| StoreError::Deserialization(e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }

    fn load(&self, id: &DebateId) -> StoreResult<DebateRecord> {
        self.get(&schema::keys::debate(id.as_str()))?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn modify(
        &self,
        id: &DebateId,
        apply: impl FnOnce(&mut DebateRecord) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut record = self.load(id)?;
        apply(&mut record)?;
        self.put(&schema::keys::debate(id.as_str()), &record)
    }

    fn summaries(&self) -> StoreResult<Vec<DebateSummary>> {
        let mut summaries: Vec<DebateSummary> =
            self.scan()?.iter().map(DebateRecord::summary).collect();
        summaries.sort_by(newest_first);
        Ok(summaries)
    }
}

#[async_trait]
impl DebateRepository for RocksDebateRepository {
    async fn create(&self, record: DebateRecord) -> StoreResult<DebateId> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let key = schema::keys::debate(record.id.as_str());
        if self.get::<DebateRecord>(&key)?.is_some() {
            return Err(StoreError::AlreadyExists(record.id.to_string()));
        }
        self.put(&key, &record)?;
        Ok(record.id)
    }

    async fn find_by_id(&self, id: &DebateId) -> StoreResult<DebateRecord> {
        self.load(id)
    }

    async fn update_votes(&self, id: &DebateId, votes: Vec<Vote>) -> StoreResult<()> {
        self.modify(id, |record| apply_votes(record, votes))
    }

    async fn update_results(&self, id: &DebateId, results: Results) -> StoreResult<()> {
        self.modify(id, |record| apply_results(record, results))
    }

    async fn list_recent(&self, limit: usize) -> StoreResult<Vec<DebateSummary>> {
        let mut summaries = self.summaries()?;
        summaries.truncate(limit);
        Ok(summaries)
    }

    async fn list_all(&self) -> StoreResult<Vec<DebateSummary>> {
        self.summaries()
    }

    async fn count_since(&self, since: DateTime<Utc>) -> StoreResult<u64> {
        Ok(self
            .scan()?
            .iter()
            .filter(|d| d.created_at >= since)
            .count() as u64)
    }

    async fn oldest_since(&self, since: DateTime<Utc>) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self
            .scan()?
            .iter()
            .map(|d| d.created_at)
            .filter(|t| *t >= since)
            .min())
    }

    async fn count_all(&self) -> StoreResult<u64> {
        Ok(self.scan()?.len() as u64)
    }
}
