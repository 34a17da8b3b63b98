//! OpenAI-compatible chat completions sampler

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Role, SampleContent, SampleRequest, SampleResponse, Sampler, SamplerError};
use crate::config::SamplerConfig;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Sampler backed by a `/v1/chat/completions` endpoint.
///
/// `include_context` has no equivalent in the chat completions API and is
/// not forwarded.
#[derive(Debug, Clone)]
pub struct HttpSampler {
    endpoint_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
    http: reqwest::Client,
}

impl HttpSampler {
    pub fn from_config(config: &SamplerConfig) -> Result<Self, SamplerError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SamplerError::Transport(e.to_string()))?;

        Ok(Self {
            endpoint_url: config.endpoint_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            timeout,
            http,
        })
    }

    fn chat_request<'a>(&'a self, request: &'a SampleRequest) -> ChatRequest<'a> {
        let system = request.system_prompt.as_deref().map(|text| ChatMessage {
            role: Role::System.as_str(),
            content: text,
        });
        let messages = system
            .into_iter()
            .chain(request.messages.iter().map(|m| ChatMessage {
                role: m.role.as_str(),
                content: &m.text,
            }))
            .collect();

        ChatRequest {
            model: &self.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

/// Turn a chat completions body into a sample response.
fn parse_chat_response(body: &str) -> Result<SampleResponse, SamplerError> {
    let chat: ChatResponse =
        serde_json::from_str(body).map_err(|e| SamplerError::Malformed(e.to_string()))?;
    let choice = chat
        .choices
        .into_iter()
        .next()
        .ok_or(SamplerError::EmptyChoices)?;

    let content = match choice.message.content {
        Some(text) => SampleContent::Text { text },
        None => SampleContent::Error {
            message: "message carried no text content".to_string(),
        },
    };

    Ok(SampleResponse {
        role: Role::Assistant,
        content,
        model: chat.model,
    })
}

#[async_trait]
impl Sampler for HttpSampler {
    async fn sample(&self, request: SampleRequest) -> Result<SampleResponse, SamplerError> {
        let mut call = self
            .http
            .post(&self.endpoint_url)
            .json(&self.chat_request(&request));
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let response = call.send().await.map_err(|e| {
            if e.is_timeout() {
                SamplerError::Timeout(self.timeout)
            } else {
                SamplerError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SamplerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                SamplerError::Timeout(self.timeout)
            } else {
                SamplerError::Transport(e.to_string())
            }
        })?;
        debug!(
            origin = ?request.origin,
            bytes = body.len(),
            "chat completion received"
        );
        parse_chat_response(&body)
    }

    fn name(&self) -> &str {
        "http"
    }
}
