//! Debate engine: drives a debate through its lifecycle.
//!
//! Ties together admission, the input guard, both collectors, the tally and
//! the repository:
//!
//! ```text
//! start_debate:   admit → guard topic → collect opinions → create
//! conduct_voting: load → require collecting_opinions → collect votes → update_votes
//! resolve:        load → require voting → tally → update_results
//! ```
//!
//! Status is advanced only by the conditional repository write at the end of
//! each step, so a failure anywhere before that write leaves the debate
//! exactly as it was.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::collector::{OpinionCollector, VoteCollector};
use super::state::DebateStatus;
use super::tally;
use crate::admission::{AdmissionController, AdmissionStatus};
use crate::config::{CouncilConfig, GuardLimits};
use crate::council::{MemberId, Panel};
use crate::error::{CouncilError, CouncilResult};
use crate::input_guard::validate_and_sanitize_topic;
use crate::sampler::SharedSampler;
use crate::state::{
    DebateId, DebateRecord, DebateSummary, Opinion, Results, SharedDebateRepository, StoreError,
};

/// Upper bound on `list_past_debates`.
pub const MAX_LIST_LIMIT: usize = 100;

/// Outcome of a successful `start_debate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateStarted {
    pub debate_id: DebateId,
    pub status: DebateStatus,
    pub opinion_count: usize,
    pub opinions: Vec<Opinion>,
    #[serde(rename = "rate_limit")]
    pub admission: AdmissionStatus,
}

/// One voter's choice, by display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotCast {
    pub voter: String,
    pub voted_for: String,
}

/// Outcome of a successful `conduct_voting`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingReport {
    pub debate_id: DebateId,
    pub total_votes: usize,
    pub breakdown: Vec<BallotCast>,
}

/// Shared reference to the engine
pub type SharedDebateEngine = Arc<DebateEngine>;

/// Runs debates against one panel, sampler and repository.
pub struct DebateEngine {
    panel: Arc<Panel>,
    repo: SharedDebateRepository,
    admission: AdmissionController,
    opinions: OpinionCollector,
    votes: VoteCollector,
    guard: GuardLimits,
}

impl DebateEngine {
    pub fn new(
        config: &CouncilConfig,
        panel: Arc<Panel>,
        sampler: SharedSampler,
        repo: SharedDebateRepository,
    ) -> Self {
        Self {
            admission: AdmissionController::new(repo.clone(), config.limits),
            opinions: OpinionCollector::new(
                sampler.clone(),
                config.opinion_sampling,
                config.guard.max_opinion_chars,
            ),
            votes: VoteCollector::new(
                sampler,
                config.vote_sampling,
                config.guard.max_reasoning_chars,
            ),
            guard: config.guard,
            panel,
            repo,
        }
    }

    /// Create a shared reference to this engine
    pub fn shared(self) -> SharedDebateEngine {
        Arc::new(self)
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    /// Current usage against the admission ceilings.
    pub async fn check_admission(&self) -> CouncilResult<AdmissionStatus> {
        self.admission.check().await
    }

    /// Admit, validate and record a new debate with one opinion per member.
    pub async fn start_debate(&self, topic: &str) -> CouncilResult<DebateStarted> {
        let permit = self.admission.admit().await?;
        let topic = validate_and_sanitize_topic(topic, self.guard.max_topic_chars)?;

        let debate_id = DebateId::generate(Utc::now());
        info!(debate_id = %debate_id, "Collecting opinions");
        let opinions = self.opinions.collect(&topic, &self.panel).await?;

        let record = DebateRecord::new(debate_id, topic, opinions.clone());
        let status = record.status;
        let opinion_count = opinions.len();
        let debate_id = self
            .repo
            .create(record)
            .await
            .map_err(|source| CouncilError::Store {
                operation: "create",
                source,
            })?;
        let admission = permit.status();
        drop(permit);

        info!(
            debate_id = %debate_id,
            opinion_count,
            hourly_remaining = admission.hourly_remaining,
            "Debate started"
        );
        Ok(DebateStarted {
            debate_id,
            status,
            opinion_count,
            opinions,
            admission,
        })
    }

    /// Collect one vote per member and advance the debate to `voting`.
    pub async fn conduct_voting(&self, debate_id: &DebateId) -> CouncilResult<VotingReport> {
        let record = self.load(debate_id).await?;
        require_status(&record, DebateStatus::CollectingOpinions, "voting has already run")?;
        record
            .status
            .check_transition(DebateStatus::Voting)
            .map_err(|e| CouncilError::InvalidState {
                current: e.from,
                required: DebateStatus::CollectingOpinions,
                reason: e.reason,
            })?;
        check_opinion_set(&record, &self.panel)?;

        info!(debate_id = %debate_id, "Collecting votes");
        let votes = self
            .votes
            .collect(&record.prompt, &record.opinions, &self.panel)
            .await?;

        let breakdown = votes
            .iter()
            .map(|v| BallotCast {
                voter: v.voter_name.clone(),
                voted_for: v.voted_for_name.clone(),
            })
            .collect();
        let total_votes = votes.len();

        self.repo
            .update_votes(debate_id, votes)
            .await
            .map_err(|e| store_error("update_votes", debate_id, e))?;

        info!(debate_id = %debate_id, total_votes, "Voting complete");
        Ok(VotingReport {
            debate_id: debate_id.clone(),
            total_votes,
            breakdown,
        })
    }

    /// Tally the stored votes and advance the debate to `completed`.
    pub async fn resolve(&self, debate_id: &DebateId) -> CouncilResult<Results> {
        let record = self.load(debate_id).await?;
        require_status(&record, DebateStatus::Voting, "votes have not been collected")?;
        self.tally_and_store(record).await
    }

    /// Stored results for a completed debate, or resolve one that has voted.
    pub async fn get_results(&self, debate_id: &DebateId) -> CouncilResult<Results> {
        let record = self.load(debate_id).await?;
        match record.status {
            DebateStatus::Completed => record.results.ok_or_else(|| CouncilError::Store {
                operation: "find_by_id",
                source: StoreError::Corrupt(format!(
                    "completed debate {} has no results",
                    debate_id
                )),
            }),
            DebateStatus::Voting => self.tally_and_store(record).await,
            DebateStatus::CollectingOpinions => Err(CouncilError::InvalidState {
                current: DebateStatus::CollectingOpinions,
                required: DebateStatus::Voting,
                reason: "votes have not been collected".to_string(),
            }),
        }
    }

    /// Full record of one debate.
    pub async fn get_debate(&self, debate_id: &DebateId) -> CouncilResult<DebateRecord> {
        self.load(debate_id).await
    }

    /// Newest debates first; `limit` is clamped to `1..=100`.
    pub async fn list_past_debates(&self, limit: usize) -> CouncilResult<Vec<DebateSummary>> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        self.repo
            .list_recent(limit)
            .await
            .map_err(|source| CouncilError::Store {
                operation: "list_recent",
                source,
            })
    }

    async fn tally_and_store(&self, record: DebateRecord) -> CouncilResult<Results> {
        if record.votes.len() != self.panel.size() {
            return Err(CouncilError::Store {
                operation: "find_by_id",
                source: StoreError::Corrupt(format!(
                    "debate {} has {} votes, expected {}",
                    record.id,
                    record.votes.len(),
                    self.panel.size()
                )),
            });
        }

        let results = tally::resolve(&record.votes);
        self.repo
            .update_results(&record.id, results.clone())
            .await
            .map_err(|e| store_error("update_results", &record.id, e))?;

        info!(
            debate_id = %record.id,
            winners = ?results.winner_names,
            "Debate completed"
        );
        Ok(results)
    }

    async fn load(&self, debate_id: &DebateId) -> CouncilResult<DebateRecord> {
        let record = self
            .repo
            .find_by_id(debate_id)
            .await
            .map_err(|e| store_error("find_by_id", debate_id, e))?;
        debug!(debate_id = %debate_id, status = %record.status, "Debate loaded");
        Ok(record)
    }
}

fn require_status(
    record: &DebateRecord,
    required: DebateStatus,
    reason: &str,
) -> CouncilResult<()> {
    if record.status == required {
        return Ok(());
    }
    let reason = if record.status > required {
        reason.to_string()
    } else {
        format!("debate is still {}", record.status)
    };
    Err(CouncilError::InvalidState {
        current: record.status,
        required,
        reason,
    })
}

/// Exactly one opinion per panel member.
fn check_opinion_set(record: &DebateRecord, panel: &Panel) -> CouncilResult<()> {
    let authors: HashSet<MemberId> = record.opinions.iter().map(|o| o.member_id).collect();
    let complete = record.opinions.len() == panel.size()
        && panel.all().iter().all(|m| authors.contains(&m.id));
    if complete {
        Ok(())
    } else {
        Err(CouncilError::Store {
            operation: "find_by_id",
            source: StoreError::Corrupt(format!(
                "debate {} has an incomplete opinion set ({} of {})",
                record.id,
                record.opinions.len(),
                panel.size()
            )),
        })
    }
}

/// Map repository failures onto the engine taxonomy.
fn store_error(operation: &'static str, debate_id: &DebateId, error: StoreError) -> CouncilError {
    match error {
        StoreError::NotFound(_) => CouncilError::NotFound {
            debate_id: debate_id.to_string(),
        },
        StoreError::Conflict { expected, found } => CouncilError::InvalidState {
            current: found,
            required: expected,
            reason: "debate changed status concurrently".to_string(),
        },
        source => CouncilError::Store { operation, source },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollectionPhase;
    use crate::sampler::{SamplerError, ScriptedSampler};
    use crate::state::{InMemoryDebateRepository, ResultsStatus};

    fn engine_with(sampler: ScriptedSampler) -> (DebateEngine, Arc<ScriptedSampler>) {
        let sampler = Arc::new(sampler);
        let engine = DebateEngine::new(
            &CouncilConfig::default(),
            Arc::new(Panel::builtin()),
            sampler.clone(),
            InMemoryDebateRepository::new().shared(),
        );
        (engine, sampler)
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let (engine, _) = engine_with(ScriptedSampler::new());

        let started = engine.start_debate("Monolith or microservices?").await.unwrap();
        assert_eq!(started.opinion_count, 9);
        assert_eq!(started.admission.hourly_used, 1);

        let report = engine.conduct_voting(&started.debate_id).await.unwrap();
        assert_eq!(report.total_votes, 9);
        assert_eq!(report.breakdown[0].voter, "The Pragmatist");

        let results = engine.get_results(&started.debate_id).await.unwrap();
        assert_eq!(results.status, ResultsStatus::ResultsReady);
        assert_eq!(results.winner_ids, vec![MemberId::Pragmatist]);

        // Completed debates return the stored results unchanged.
        let again = engine.get_results(&started.debate_id).await.unwrap();
        assert_eq!(again, results);

        let record = engine.get_debate(&started.debate_id).await.unwrap();
        assert_eq!(record.status, DebateStatus::Completed);
    }

    #[tokio::test]
    async fn test_results_before_voting_is_invalid_state() {
        let (engine, _) = engine_with(ScriptedSampler::new());
        let started = engine.start_debate("Topic").await.unwrap();

        match engine.get_results(&started.debate_id).await.unwrap_err() {
            CouncilError::InvalidState {
                current, required, ..
            } => {
                assert_eq!(current, DebateStatus::CollectingOpinions);
                assert_eq!(required, DebateStatus::Voting);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            engine.resolve(&started.debate_id).await,
            Err(CouncilError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_second_vote_rejected() {
        let (engine, sampler) = engine_with(ScriptedSampler::new());
        let started = engine.start_debate("Topic").await.unwrap();
        engine.conduct_voting(&started.debate_id).await.unwrap();
        let calls = sampler.started_calls();

        match engine.conduct_voting(&started.debate_id).await.unwrap_err() {
            CouncilError::InvalidState {
                current, required, ..
            } => {
                assert_eq!(current, DebateStatus::Voting);
                assert_eq!(required, DebateStatus::CollectingOpinions);
            }
            other => panic!("unexpected {other:?}"),
        }
        // Rejected before any member was asked.
        assert_eq!(sampler.started_calls(), calls);
    }

    #[tokio::test]
    async fn test_voting_failure_leaves_debate_unchanged() {
        let (engine, _) = engine_with(ScriptedSampler::new().fail(
            MemberId::UserAdvocate,
            CollectionPhase::Voting,
            SamplerError::Status {
                status: 503,
                body: "overloaded".to_string(),
            },
        ));
        let started = engine.start_debate("Topic").await.unwrap();

        let err = engine.conduct_voting(&started.debate_id).await.unwrap_err();
        assert!(matches!(err, CouncilError::MemberCallFailure { .. }));

        let record = engine.get_debate(&started.debate_id).await.unwrap();
        assert_eq!(record.status, DebateStatus::CollectingOpinions);
        assert!(record.votes.is_empty());
    }

    #[tokio::test]
    async fn test_opinion_failure_records_nothing() {
        let (engine, _) = engine_with(ScriptedSampler::new().fail(
            MemberId::Visionary,
            CollectionPhase::Opinions,
            SamplerError::Transport("reset".to_string()),
        ));
        assert!(engine.start_debate("Topic").await.is_err());
        assert!(engine.list_past_debates(10).await.unwrap().is_empty());
        // The failed attempt released its admission slot.
        assert_eq!(engine.check_admission().await.unwrap().hourly_used, 0);
    }

    #[tokio::test]
    async fn test_unknown_debate_not_found() {
        let (engine, _) = engine_with(ScriptedSampler::new());
        let id = DebateId::parse("20240101_120000_abcdef012345").unwrap();
        assert!(matches!(
            engine.get_debate(&id).await,
            Err(CouncilError::NotFound { .. })
        ));
        assert!(matches!(
            engine.conduct_voting(&id).await,
            Err(CouncilError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_limit_clamped() {
        let (engine, _) = engine_with(ScriptedSampler::new());
        for topic in ["one", "two", "three"] {
            engine.start_debate(topic).await.unwrap();
        }
        assert_eq!(engine.list_past_debates(0).await.unwrap().len(), 1);
        assert_eq!(engine.list_past_debates(1000).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_incomplete_opinion_set_refused() {
        let sampler = Arc::new(ScriptedSampler::new());
        let repo = InMemoryDebateRepository::new().shared();
        let engine = DebateEngine::new(
            &CouncilConfig::default(),
            Arc::new(Panel::builtin()),
            sampler.clone(),
            repo.clone(),
        );
        let id = repo
            .create(DebateRecord::new(
                DebateId::generate(Utc::now()),
                "Topic".to_string(),
                Vec::new(),
            ))
            .await
            .unwrap();

        assert!(matches!(
            engine.conduct_voting(&id).await,
            Err(CouncilError::Store { .. })
        ));
        assert_eq!(sampler.started_calls(), 0);
    }
}
