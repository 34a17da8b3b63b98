//! Concurrent member fan-out for the opinion and voting phases
//!
//! ```text
//! JoinSet::spawn(member_call) × panel size  (semaphore-capped)
//!        │
//!        ├─ all succeed  → results reassembled in panel order
//!        └─ first failure → abort_all, whole phase fails
//! ```
//!
//! ## Failure policy
//!
//! All-or-nothing. A phase never yields a partial set: the first member
//! failure (sampler error, non-text content, empty text, unparsable vote)
//! cancels the in-flight siblings and is reported with the member's
//! identity. Nothing is written on failure.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::ballot::{parse_vote_response, Ballot, NO_REASONING};
use crate::config::SamplingParams;
use crate::council::{Panel, PanelMember};
use crate::error::{CollectionPhase, CouncilError, CouncilResult};
use crate::input_guard::safe_extract_text;
use crate::sampler::{
    ContextInclusion, RequestOrigin, SampleMessage, SampleRequest, SharedSampler,
};
use crate::state::{Opinion, Vote};

/// Run `call` once per member concurrently and collect the results in
/// member order, failing fast on the first error.
async fn fan_out<T, F, Fut>(
    members: &[PanelMember],
    phase: CollectionPhase,
    call: F,
) -> CouncilResult<Vec<T>>
where
    T: Send + 'static,
    F: Fn(PanelMember) -> Fut,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
{
    let sem = Arc::new(Semaphore::new(members.len().max(1)));
    let mut join_set: JoinSet<(usize, Result<T, String>)> = JoinSet::new();

    for (index, member) in members.iter().enumerate() {
        let sem = sem.clone();
        let member_id = member.id;
        let work = call(member.clone());

        join_set.spawn(async move {
            let result = match sem.acquire_owned().await {
                Ok(_permit) => {
                    let start = Instant::now();
                    let result = work.await;
                    debug!(
                        member = %member_id,
                        %phase,
                        ok = result.is_ok(),
                        elapsed_ms = start.elapsed().as_millis(),
                        "member call finished"
                    );
                    result
                }
                Err(_) => Err("concurrency limiter closed".to_string()),
            };
            (index, result)
        });
    }

    let mut slots: Vec<Option<T>> = (0..members.len()).map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, Ok(value))) => slots[index] = Some(value),
            Ok((index, Err(reason))) => {
                join_set.abort_all();
                let member = &members[index];
                warn!(member = %member.id, %phase, %reason, "member call failed, aborting phase");
                return Err(CouncilError::MemberCallFailure {
                    phase,
                    member_id: member.id.to_string(),
                    member_name: member.display_name.clone(),
                    reason,
                });
            }
            Err(e) => {
                join_set.abort_all();
                warn!(error = %e, %phase, "member task panicked, aborting phase");
                return Err(CouncilError::MemberCallFailure {
                    phase,
                    member_id: "unknown".to_string(),
                    member_name: "unknown".to_string(),
                    reason: format!("member task panicked: {e}"),
                });
            }
        }
    }

    slots
        .into_iter()
        .collect::<Option<Vec<T>>>()
        .ok_or_else(|| CouncilError::MemberCallFailure {
            phase,
            member_id: "unknown".to_string(),
            member_name: "unknown".to_string(),
            reason: "member task produced no result".to_string(),
        })
}

/// Asks every panel member for an opinion on a topic.
pub struct OpinionCollector {
    sampler: SharedSampler,
    params: SamplingParams,
    max_opinion_chars: usize,
}

impl OpinionCollector {
    pub fn new(sampler: SharedSampler, params: SamplingParams, max_opinion_chars: usize) -> Self {
        Self {
            sampler,
            params,
            max_opinion_chars,
        }
    }

    /// One opinion per member, in panel order, or the first member failure.
    pub async fn collect(&self, topic: &str, panel: &Panel) -> CouncilResult<Vec<Opinion>> {
        let topic: Arc<str> = Arc::from(topic);
        fan_out(panel.all(), CollectionPhase::Opinions, |member| {
            let sampler = self.sampler.clone();
            let topic = topic.clone();
            let params = self.params;
            let max_chars = self.max_opinion_chars;
            async move { request_opinion(sampler, member, &topic, params, max_chars).await }
        })
        .await
    }
}

async fn request_opinion(
    sampler: SharedSampler,
    member: PanelMember,
    topic: &str,
    params: SamplingParams,
    max_chars: usize,
) -> Result<Opinion, String> {
    let request = SampleRequest {
        system_prompt: Some(member.persona_prompt.clone()),
        messages: vec![SampleMessage::user(format!(
            "As {}, provide your opinion on: {}",
            member.display_name, topic
        ))],
        max_tokens: params.max_tokens,
        temperature: params.temperature,
        include_context: ContextInclusion::None,
        origin: Some(RequestOrigin {
            member: member.id,
            phase: CollectionPhase::Opinions,
        }),
    };

    let response = sampler.sample(request).await.map_err(|e| e.to_string())?;
    let raw = response
        .content
        .as_text()
        .ok_or_else(|| format!("expected text content, got {}", response.content.kind()))?;

    let text = safe_extract_text(raw, max_chars);
    if text.is_empty() {
        return Err("opinion text is empty".to_string());
    }

    Ok(Opinion {
        member_id: member.id,
        perspective: member.display_name.clone(),
        member_name: member.display_name,
        text,
    })
}

/// Asks every panel member to vote for one opinion other than its own.
pub struct VoteCollector {
    sampler: SharedSampler,
    params: SamplingParams,
    max_reasoning_chars: usize,
}

impl VoteCollector {
    pub fn new(sampler: SharedSampler, params: SamplingParams, max_reasoning_chars: usize) -> Self {
        Self {
            sampler,
            params,
            max_reasoning_chars,
        }
    }

    /// One vote per member, in panel order, or the first member failure.
    ///
    /// `opinions` must hold exactly one opinion per panel member.
    pub async fn collect(
        &self,
        topic: &str,
        opinions: &[Opinion],
        panel: &Panel,
    ) -> CouncilResult<Vec<Vote>> {
        let topic: Arc<str> = Arc::from(topic);
        let opinions: Arc<Vec<Opinion>> = Arc::new(opinions.to_vec());
        fan_out(panel.all(), CollectionPhase::Voting, |member| {
            let sampler = self.sampler.clone();
            let topic = topic.clone();
            let opinions = opinions.clone();
            let params = self.params;
            let max_chars = self.max_reasoning_chars;
            async move { request_vote(sampler, member, &topic, &opinions, params, max_chars).await }
        })
        .await
    }
}

async fn request_vote(
    sampler: SharedSampler,
    member: PanelMember,
    topic: &str,
    opinions: &[Opinion],
    params: SamplingParams,
    max_chars: usize,
) -> Result<Vote, String> {
    let ballot = Ballot::for_voter(member.id, opinions);
    if ballot.is_empty() {
        return Err("ballot has no options".to_string());
    }

    let request = SampleRequest {
        system_prompt: Some(member.persona_prompt.clone()),
        messages: vec![SampleMessage::user(
            ballot.render_prompt(topic, &member.display_name),
        )],
        max_tokens: params.max_tokens,
        temperature: params.temperature,
        include_context: ContextInclusion::None,
        origin: Some(RequestOrigin {
            member: member.id,
            phase: CollectionPhase::Voting,
        }),
    };

    let response = sampler.sample(request).await.map_err(|e| e.to_string())?;
    let raw = response
        .content
        .as_text()
        .ok_or_else(|| format!("expected text content, got {}", response.content.kind()))?;

    let parsed = parse_vote_response(raw, ballot.len()).map_err(|e| e.to_string())?;
    let choice = ballot.resolve(parsed.option).map_err(|e| e.to_string())?;

    let reasoning = safe_extract_text(&parsed.reasoning, max_chars);
    Ok(Vote {
        voter_id: member.id,
        voter_name: member.display_name,
        voted_for_id: choice.member_id,
        voted_for_name: choice.member_name.clone(),
        reasoning: if reasoning.is_empty() {
            NO_REASONING.to_string()
        } else {
            reasoning
        },
    })
}
