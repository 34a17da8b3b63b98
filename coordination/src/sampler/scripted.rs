//! Deterministic sampler for offline runs and tests
//!
//! Answers are keyed by the request's [`RequestOrigin`]. Unscripted members
//! give a stock opinion and vote for ballot option 1.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Role, SampleContent, SampleRequest, SampleResponse, Sampler, SamplerError};
use crate::council::MemberId;
use crate::error::CollectionPhase;

#[derive(Debug, Clone)]
enum Scripted {
    Reply(SampleContent),
    Fail(SamplerError),
}

/// Sampler that replays canned answers per member and phase.
#[derive(Debug, Default)]
pub struct ScriptedSampler {
    script: HashMap<(MemberId, CollectionPhase), Scripted>,
    delays: HashMap<MemberId, Duration>,
    started: AtomicUsize,
    completed: AtomicUsize,
    requests: Mutex<Vec<SampleRequest>>,
}

impl ScriptedSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `member` in `phase` with `text`.
    pub fn reply(self, member: MemberId, phase: CollectionPhase, text: impl Into<String>) -> Self {
        self.reply_content(member, phase, SampleContent::text(text))
    }

    /// Answer `member` in `phase` with arbitrary content.
    pub fn reply_content(
        mut self,
        member: MemberId,
        phase: CollectionPhase,
        content: SampleContent,
    ) -> Self {
        self.script
            .insert((member, phase), Scripted::Reply(content));
        self
    }

    /// Make `member`'s call in `phase` fail.
    pub fn fail(mut self, member: MemberId, phase: CollectionPhase, error: SamplerError) -> Self {
        self.script.insert((member, phase), Scripted::Fail(error));
        self
    }

    /// Delay every answer from `member`.
    pub fn delay(mut self, member: MemberId, delay: Duration) -> Self {
        self.delays.insert(member, delay);
        self
    }

    /// Calls that entered `sample`.
    pub fn started_calls(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Calls that ran to completion, successful or not.
    pub fn completed_calls(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<SampleRequest> {
        self.requests
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn stock_answer(member: MemberId, phase: CollectionPhase) -> SampleContent {
        match phase {
            CollectionPhase::Opinions => SampleContent::text(format!(
                "{} weighs the trade-offs and recommends a measured first step.",
                member.display_name()
            )),
            CollectionPhase::Voting => SampleContent::text(format!(
                "VOTE: Option 1\nREASONING: {} found this the most convincing argument.",
                member.display_name()
            )),
        }
    }
}

#[async_trait]
impl Sampler for ScriptedSampler {
    async fn sample(&self, request: SampleRequest) -> Result<SampleResponse, SamplerError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let origin = request.origin.ok_or_else(|| {
            SamplerError::Malformed("scripted sampler needs a request origin".to_string())
        })?;
        if let Ok(mut log) = self.requests.lock() {
            log.push(request);
        }

        if let Some(delay) = self.delays.get(&origin.member) {
            tokio::time::sleep(*delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);

        match self.script.get(&(origin.member, origin.phase)) {
            Some(Scripted::Fail(error)) => Err(error.clone()),
            Some(Scripted::Reply(content)) => Ok(SampleResponse {
                role: Role::Assistant,
                content: content.clone(),
                model: Some("scripted".to_string()),
            }),
            None => Ok(SampleResponse {
                role: Role::Assistant,
                content: Self::stock_answer(origin.member, origin.phase),
                model: Some("scripted".to_string()),
            }),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{ContextInclusion, RequestOrigin, SampleMessage};

    fn request(member: MemberId, phase: CollectionPhase) -> SampleRequest {
        SampleRequest {
            system_prompt: None,
            messages: vec![SampleMessage::user("hi")],
            max_tokens: 10,
            temperature: 0.5,
            include_context: ContextInclusion::None,
            origin: Some(RequestOrigin { member, phase }),
        }
    }

    #[tokio::test]
    async fn test_scripted_and_stock_answers() {
        let sampler = ScriptedSampler::new()
            .reply(MemberId::Analyst, CollectionPhase::Opinions, "Show me data.")
            .fail(
                MemberId::Optimist,
                CollectionPhase::Voting,
                SamplerError::Timeout(Duration::from_secs(1)),
            );

        let scripted = sampler
            .sample(request(MemberId::Analyst, CollectionPhase::Opinions))
            .await
            .unwrap();
        assert_eq!(scripted.content.as_text(), Some("Show me data."));

        let stock = sampler
            .sample(request(MemberId::Analyst, CollectionPhase::Voting))
            .await
            .unwrap();
        assert!(stock.content.as_text().unwrap().starts_with("VOTE: Option 1"));

        assert!(matches!(
            sampler
                .sample(request(MemberId::Optimist, CollectionPhase::Voting))
                .await,
            Err(SamplerError::Timeout(_))
        ));
        assert_eq!(sampler.started_calls(), 3);
        assert_eq!(sampler.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_request_without_origin_fails() {
        let sampler = ScriptedSampler::new();
        let mut req = request(MemberId::Mediator, CollectionPhase::Opinions);
        req.origin = None;
        assert!(matches!(
            sampler.sample(req).await,
            Err(SamplerError::Malformed(_))
        ));
    }
}
