//! Core types for debate persistence

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::council::MemberId;
use crate::debate::state::DebateStatus;

static DEBATE_ID_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{8}_\d{6}_[a-z0-9]{12}$").expect("DEBATE_ID_FORMAT regex should compile")
});

/// Unique identifier for a debate: `YYYYMMDD_HHMMSS_<12 lowercase alphanumerics>`.
///
/// Only constructed by [`DebateId::generate`] or by a successful
/// [`DebateId::parse`], so every value in circulation is well formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DebateId(String);

impl DebateId {
    /// Generate a fresh id stamped with `now` (UTC) plus 48 random bits.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let random = Uuid::new_v4().simple().to_string();
        Self(format!("{}_{}", now.format("%Y%m%d_%H%M%S"), &random[..12]))
    }

    /// Accept `value` only if it matches the generator format exactly.
    pub fn parse(value: &str) -> Option<Self> {
        DEBATE_ID_FORMAT
            .is_match(value)
            .then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DebateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DebateId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("malformed debate id: {value}"))
    }
}

impl From<DebateId> for String {
    fn from(id: DebateId) -> Self {
        id.0
    }
}

/// One member's free-text answer to the topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opinion {
    pub member_id: MemberId,
    pub member_name: String,
    pub text: String,
    /// Label of the worldview the opinion was argued from.
    pub perspective: String,
}

/// One member's endorsement of another member's opinion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub voter_id: MemberId,
    pub voter_name: String,
    pub voted_for_id: MemberId,
    pub voted_for_name: String,
    pub reasoning: String,
}

/// Outcome label carried on [`Results`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultsStatus {
    /// No votes were tallied.
    InProgress,
    /// Votes tallied, no winner synthesized.
    VotingComplete,
    /// Winners determined.
    ResultsReady,
}

/// Votes received by one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCount {
    pub member_id: MemberId,
    pub member_name: String,
    pub votes: u32,
}

/// Tally outcome of a debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub status: ResultsStatus,
    /// Winners in tie order: equal counts, ascending member id.
    pub winner_ids: Vec<MemberId>,
    pub winner_names: Vec<String>,
    /// Every member that received at least one vote, descending count then
    /// ascending member id.
    pub tally: Vec<VoteCount>,
    pub synthesis: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// The persisted aggregate for one debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateRecord {
    pub id: DebateId,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    pub status: DebateStatus,
    pub opinions: Vec<Opinion>,
    pub votes: Vec<Vote>,
    pub results: Option<Results>,
}

impl DebateRecord {
    /// A debate whose opinions are collected but which has not voted yet.
    pub fn new(id: DebateId, prompt: String, opinions: Vec<Opinion>) -> Self {
        Self {
            id,
            prompt,
            created_at: Utc::now(),
            status: DebateStatus::CollectingOpinions,
            opinions,
            votes: Vec::new(),
            results: None,
        }
    }

    pub fn summary(&self) -> DebateSummary {
        DebateSummary {
            debate_id: self.id.clone(),
            prompt: self.prompt.clone(),
            created_at: self.created_at,
            status: self.status,
            opinion_count: self.opinions.len(),
            vote_count: self.votes.len(),
            winner_names: self
                .results
                .as_ref()
                .map(|r| r.winner_names.clone())
                .unwrap_or_default(),
        }
    }
}

/// Listing projection of a debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateSummary {
    pub debate_id: DebateId,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    pub status: DebateStatus,
    pub opinion_count: usize,
    pub vote_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub winner_names: Vec<String>,
}

/// Newest first, ties broken by descending id.
pub(crate) fn newest_first(a: &DebateSummary, b: &DebateSummary) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.debate_id.cmp(&a.debate_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generated_id_is_well_formed() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id = DebateId::generate(now);
        assert!(id.as_str().starts_with("20240101_120000_"));
        assert!(DebateId::parse(id.as_str()).is_some());
    }

    #[test]
    fn test_generated_ids_distinct() {
        let now = Utc::now();
        let a = DebateId::generate(now);
        let b = DebateId::generate(now);
        assert_ne!(a, b);
    }

    #[test]
    fn test_debate_id_serde_rejects_malformed() {
        let ok: DebateId = serde_json::from_str("\"20240101_120000_abcdef012345\"").unwrap();
        assert_eq!(ok.as_str(), "20240101_120000_abcdef012345");
        assert!(serde_json::from_str::<DebateId>("\"../etc\"").is_err());
    }

    #[test]
    fn test_summary_projection() {
        let id = DebateId::parse("20240101_120000_abcdef012345").unwrap();
        let record = DebateRecord::new(
            id.clone(),
            "topic".to_string(),
            vec![Opinion {
                member_id: MemberId::Analyst,
                member_name: "The Analyst".to_string(),
                text: "numbers".to_string(),
                perspective: "The Analyst".to_string(),
            }],
        );
        let summary = record.summary();
        assert_eq!(summary.debate_id, id);
        assert_eq!(summary.status, DebateStatus::CollectingOpinions);
        assert_eq!(summary.opinion_count, 1);
        assert_eq!(summary.vote_count, 0);
        assert!(summary.winner_names.is_empty());
    }
}
