//! Council Coordination Library
//!
//! A debate engine for a fixed council of nine LLM personas. Every debate
//! runs the same lifecycle:
//!
//! 1. **Opinions:** each member answers the topic concurrently.
//! 2. **Voting:** each member votes for the most compelling opinion other
//!    than its own.
//! 3. **Results:** votes are tallied; ties keep every top-ranked member.
//!
//! # Modules
//!
//! - [`council`]: the panel registry
//! - [`admission`]: hourly and lifetime debate ceilings
//! - [`input_guard`]: topic validation, prompt-injection screening, id checks
//! - [`sampler`]: the text generation boundary (HTTP or scripted)
//! - [`debate`]: ballots, fan-out collectors, tally, and the engine
//! - [`state`]: the repository boundary with in-memory and RocksDB backends
//! - [`config`]: layered configuration
//! - [`error`]: the error taxonomy and structured error rendering
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use council_coordination::{CouncilConfig, DebateEngine, Panel};
//! use council_coordination::sampler::ScriptedSampler;
//! use council_coordination::state::InMemoryDebateRepository;
//!
//! let engine = DebateEngine::new(
//!     &CouncilConfig::default(),
//!     Arc::new(Panel::builtin()),
//!     Arc::new(ScriptedSampler::new()),
//!     InMemoryDebateRepository::new().shared(),
//! );
//! let started = engine.start_debate("Should we adopt microservices?").await?;
//! engine.conduct_voting(&started.debate_id).await?;
//! let results = engine.get_results(&started.debate_id).await?;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod admission;
pub mod config;
pub mod council;
pub mod debate;
pub mod error;
pub mod input_guard;
pub mod sampler;
pub mod state;

// Re-export key engine types
pub use admission::{AdmissionController, AdmissionPermit, AdmissionStatus};
pub use config::{CouncilConfig, RateLimits, SamplingParams};
pub use council::{MemberId, Panel, PanelMember, PANEL_SIZE};
pub use debate::{DebateEngine, DebateStarted, DebateStatus, SharedDebateEngine, VotingReport};
pub use error::{CouncilError, CouncilResult, StructuredError};

// Re-export key state types
pub use state::{
    DebateId, DebateRecord, DebateRepository, DebateSummary, InMemoryDebateRepository, Opinion,
    Results, SharedDebateRepository, Vote,
};

// Re-export sampler types
pub use sampler::{HttpSampler, Sampler, ScriptedSampler, SharedSampler};
