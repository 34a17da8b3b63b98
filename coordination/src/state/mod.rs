//! Debate persistence
//!
//! The engine talks to storage only through [`DebateRepository`]. Two
//! backends ship with the crate:
//!
//! - [`InMemoryDebateRepository`]: a `BTreeMap` behind a tokio `RwLock`,
//!   used by tests and by the server when no state path is configured.
//! - `RocksDebateRepository` (feature `heavy-state`): one JSON document per
//!   debate in the `debates` column family, keyed `debate:<id>`.
//!
//! # Conditional writes
//!
//! Status only moves forward, and only inside the write that stores the data
//! produced by that step. `update_votes` succeeds only on a debate that is
//! still `collecting_opinions`; `update_results` only on one that is
//! `voting`. Anything else is a [`StoreError::Conflict`], which makes two
//! racing `conduct_voting` calls on the same debate resolve to one winner.

pub mod memory;
pub mod schema;
#[cfg(feature = "heavy-state")]
pub mod store;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::debate::state::DebateStatus;

pub use memory::InMemoryDebateRepository;
#[cfg(feature = "heavy-state")]
pub use store::RocksDebateRepository;
pub use types::{
    DebateId, DebateRecord, DebateSummary, Opinion, Results, ResultsStatus, Vote, VoteCount,
};

/// Error type for debate store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[cfg(feature = "heavy-state")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Debate already exists: {0}")]
    AlreadyExists(String),

    #[error("Status conflict: expected {expected}, found {found}")]
    Conflict {
        expected: DebateStatus,
        found: DebateStatus,
    },

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),
}

/// Result type for debate store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared handle to a repository backend
pub type SharedDebateRepository = Arc<dyn DebateRepository>;

/// Persistence boundary for debate records.
#[async_trait]
pub trait DebateRepository: Send + Sync {
    /// Store a new debate. Fails with `AlreadyExists` if the id is taken.
    async fn create(&self, record: DebateRecord) -> StoreResult<DebateId>;

    /// Fetch a debate, or `NotFound`.
    async fn find_by_id(&self, id: &DebateId) -> StoreResult<DebateRecord>;

    /// Store the vote set and advance `collecting_opinions` to `voting`.
    async fn update_votes(&self, id: &DebateId, votes: Vec<Vote>) -> StoreResult<()>;

    /// Store results and advance `voting` to `completed`.
    async fn update_results(&self, id: &DebateId, results: Results) -> StoreResult<()>;

    /// Summaries of the newest `limit` debates, newest first.
    async fn list_recent(&self, limit: usize) -> StoreResult<Vec<DebateSummary>>;

    /// Summaries of every debate, newest first.
    async fn list_all(&self) -> StoreResult<Vec<DebateSummary>>;

    /// Debates created at or after `since`.
    async fn count_since(&self, since: DateTime<Utc>) -> StoreResult<u64>;

    /// Creation time of the oldest debate created at or after `since`.
    async fn oldest_since(&self, since: DateTime<Utc>) -> StoreResult<Option<DateTime<Utc>>>;

    /// Debates ever created.
    async fn count_all(&self) -> StoreResult<u64>;

    /// Debates created in the trailing 60 minutes.
    async fn count_in_last_hour(&self) -> StoreResult<u64> {
        self.count_since(Utc::now() - chrono::Duration::hours(1))
            .await
    }
}

/// Apply a vote write to a loaded record, enforcing the status guard.
pub(crate) fn apply_votes(record: &mut DebateRecord, votes: Vec<Vote>) -> StoreResult<()> {
    require_status(record, DebateStatus::CollectingOpinions)?;
    record.votes = votes;
    record.status = DebateStatus::Voting;
    Ok(())
}

/// Apply a results write to a loaded record, enforcing the status guard.
pub(crate) fn apply_results(record: &mut DebateRecord, results: Results) -> StoreResult<()> {
    require_status(record, DebateStatus::Voting)?;
    record.results = Some(results);
    record.status = DebateStatus::Completed;
    Ok(())
}

fn require_status(record: &DebateRecord, expected: DebateStatus) -> StoreResult<()> {
    if record.status == expected {
        Ok(())
    } else {
        Err(StoreError::Conflict {
            expected,
            found: record.status,
        })
    }
}
