//! In-process debate store

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::types::newest_first;
use super::{
    apply_results, apply_votes, DebateId, DebateRecord, DebateRepository, DebateSummary, Results,
    SharedDebateRepository, StoreError, StoreResult, Vote,
};

/// Debate store held entirely in memory. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryDebateRepository {
    debates: RwLock<BTreeMap<DebateId, DebateRecord>>,
}

impl InMemoryDebateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared reference to this store
    pub fn shared(self) -> SharedDebateRepository {
        Arc::new(self)
    }

    async fn summaries(&self) -> Vec<DebateSummary> {
        let debates = self.debates.read().await;
        let mut summaries: Vec<DebateSummary> = debates.values().map(DebateRecord::summary).collect();
        summaries.sort_by(newest_first);
        summaries
    }
}

#[async_trait]
impl DebateRepository for InMemoryDebateRepository {
    async fn create(&self, record: DebateRecord) -> StoreResult<DebateId> {
        let mut debates = self.debates.write().await;
        if debates.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id.to_string()));
        }
        let id = record.id.clone();
        debates.insert(id.clone(), record);
        Ok(id)
    }

    async fn find_by_id(&self, id: &DebateId) -> StoreResult<DebateRecord> {
        self.debates
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn update_votes(&self, id: &DebateId, votes: Vec<Vote>) -> StoreResult<()> {
        let mut debates = self.debates.write().await;
        let record = debates
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        apply_votes(record, votes)
    }

    async fn update_results(&self, id: &DebateId, results: Results) -> StoreResult<()> {
        let mut debates = self.debates.write().await;
        let record = debates
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        apply_results(record, results)
    }

    async fn list_recent(&self, limit: usize) -> StoreResult<Vec<DebateSummary>> {
        let mut summaries = self.summaries().await;
        summaries.truncate(limit);
        Ok(summaries)
    }

    async fn list_all(&self) -> StoreResult<Vec<DebateSummary>> {
        Ok(self.summaries().await)
    }

    async fn count_since(&self, since: DateTime<Utc>) -> StoreResult<u64> {
        let debates = self.debates.read().await;
        Ok(debates.values().filter(|d| d.created_at >= since).count() as u64)
    }

    async fn oldest_since(&self, since: DateTime<Utc>) -> StoreResult<Option<DateTime<Utc>>> {
        let debates = self.debates.read().await;
        Ok(debates
            .values()
            .map(|d| d.created_at)
            .filter(|t| *t >= since)
            .min())
    }

    async fn count_all(&self) -> StoreResult<u64> {
        Ok(self.debates.read().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::council::MemberId;
    use crate::debate::state::DebateStatus;
    use crate::state::ResultsStatus;
    use chrono::Duration;

    fn record(id: &str, created_at: DateTime<Utc>) -> DebateRecord {
        let mut record = DebateRecord::new(
            DebateId::parse(id).unwrap(),
            "Should we rewrite it?".to_string(),
            Vec::new(),
        );
        record.created_at = created_at;
        record
    }

    fn vote() -> Vote {
        Vote {
            voter_id: MemberId::Optimist,
            voter_name: "The Optimist".to_string(),
            voted_for_id: MemberId::Analyst,
            voted_for_name: "The Analyst".to_string(),
            reasoning: "evidence".to_string(),
        }
    }

    fn results() -> Results {
        Results {
            status: ResultsStatus::ResultsReady,
            winner_ids: vec![MemberId::Analyst],
            winner_names: vec!["The Analyst".to_string()],
            tally: Vec::new(),
            synthesis: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let repo = InMemoryDebateRepository::new();
        let id = repo
            .create(record("20240101_120000_aaaaaaaaaaaa", Utc::now()))
            .await
            .unwrap();
        let found = repo.find_by_id(&id).await.unwrap();
        assert_eq!(found.status, DebateStatus::CollectingOpinions);
        assert_eq!(found.prompt, "Should we rewrite it?");
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let repo = InMemoryDebateRepository::new();
        repo.create(record("20240101_120000_aaaaaaaaaaaa", Utc::now()))
            .await
            .unwrap();
        let err = repo
            .create(record("20240101_120000_aaaaaaaaaaaa", Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_missing_debate() {
        let repo = InMemoryDebateRepository::new();
        let id = DebateId::parse("20240101_120000_bbbbbbbbbbbb").unwrap();
        assert!(matches!(
            repo.find_by_id(&id).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            repo.update_votes(&id, vec![vote()]).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_conditional_writes_advance_status() {
        let repo = InMemoryDebateRepository::new();
        let id = repo
            .create(record("20240101_120000_aaaaaaaaaaaa", Utc::now()))
            .await
            .unwrap();

        // Results before votes is a conflict and changes nothing.
        let err = repo.update_results(&id, results()).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict {
                expected: DebateStatus::Voting,
                found: DebateStatus::CollectingOpinions
            }
        ));
        assert!(repo.find_by_id(&id).await.unwrap().results.is_none());

        repo.update_votes(&id, vec![vote()]).await.unwrap();
        assert_eq!(
            repo.find_by_id(&id).await.unwrap().status,
            DebateStatus::Voting
        );

        // A second vote write loses.
        assert!(matches!(
            repo.update_votes(&id, Vec::new()).await.unwrap_err(),
            StoreError::Conflict { .. }
        ));
        assert_eq!(repo.find_by_id(&id).await.unwrap().votes.len(), 1);

        repo.update_results(&id, results()).await.unwrap();
        let done = repo.find_by_id(&id).await.unwrap();
        assert_eq!(done.status, DebateStatus::Completed);
        assert_eq!(done.summary().winner_names, vec!["The Analyst"]);
    }

    #[tokio::test]
    async fn test_listing_newest_first() {
        let repo = InMemoryDebateRepository::new();
        let now = Utc::now();
        repo.create(record("20240101_120000_aaaaaaaaaaaa", now - Duration::minutes(30)))
            .await
            .unwrap();
        repo.create(record("20240101_120100_bbbbbbbbbbbb", now))
            .await
            .unwrap();
        repo.create(record("20240101_115900_cccccccccccc", now - Duration::hours(2)))
            .await
            .unwrap();

        let recent = repo.list_recent(2).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|s| s.debate_id.as_str()).collect();
        assert_eq!(ids, ["20240101_120100_bbbbbbbbbbbb", "20240101_120000_aaaaaaaaaaaa"]);
        assert_eq!(repo.list_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_counting_windows() {
        let repo = InMemoryDebateRepository::new();
        let now = Utc::now();
        let half_hour_ago = now - Duration::minutes(30);
        repo.create(record("20240101_120000_aaaaaaaaaaaa", half_hour_ago))
            .await
            .unwrap();
        repo.create(record("20240101_120100_bbbbbbbbbbbb", now))
            .await
            .unwrap();
        repo.create(record("20240101_115900_cccccccccccc", now - Duration::hours(2)))
            .await
            .unwrap();

        assert_eq!(repo.count_all().await.unwrap(), 3);
        assert_eq!(repo.count_in_last_hour().await.unwrap(), 2);
        assert_eq!(
            repo.oldest_since(now - Duration::hours(1)).await.unwrap(),
            Some(half_hour_ago)
        );
    }
}
