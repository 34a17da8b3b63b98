//! Debate Orchestration: opinion, vote and tally lifecycle
//!
//! A debate asks every panel member for an opinion on one topic, then asks
//! every member to vote for the most compelling opinion other than its own,
//! then tallies the votes into winners.
//!
//! # Debate Flow
//!
//! ```text
//! start_debate ──▶ CollectingOpinions ──conduct_voting──▶ Voting ──resolve──▶ Completed
//!                  (9 opinions stored)                    (9 votes stored)    (results stored)
//! ```
//!
//! Each phase is all-or-nothing: one member failure fails the whole phase
//! and leaves the stored debate untouched.

pub mod ballot;
pub mod collector;
pub mod orchestrator;
pub mod state;
pub mod tally;

pub use ballot::{parse_vote_response, Ballot, VoteParseError, VoteResponse, NO_REASONING};
pub use collector::{OpinionCollector, VoteCollector};
pub use orchestrator::{
    BallotCast, DebateEngine, DebateStarted, SharedDebateEngine, VotingReport, MAX_LIST_LIMIT,
};
pub use state::{DebateStatus, TransitionError};
