//! Sampling boundary
//!
//! Every panel member call goes through a [`Sampler`]: one text generation
//! request in, one response out. The engine never talks to a model backend
//! directly, so the backend can be an OpenAI-compatible HTTP endpoint
//! ([`HttpSampler`]) or a deterministic script ([`ScriptedSampler`]).

pub mod http;
pub mod scripted;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::council::MemberId;
use crate::error::CollectionPhase;

pub use http::HttpSampler;
pub use scripted::ScriptedSampler;

/// Speaker of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// How much surrounding context the backend may add to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextInclusion {
    #[default]
    None,
    ThisServer,
    AllServers,
}

/// One message in a sampling request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMessage {
    pub role: Role,
    pub text: String,
}

impl SampleMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }
}

/// Which member call a request belongs to. Carried for logging and for
/// backends that route per member; HTTP backends ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestOrigin {
    pub member: MemberId,
    pub phase: CollectionPhase,
}

/// A single text generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<SampleMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(default)]
    pub include_context: ContextInclusion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<RequestOrigin>,
}

/// Response payload. Only `Text` is usable by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SampleContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        mime_type: Option<String>,
    },
    Error {
        message: String,
    },
}

impl SampleContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The text payload, if this is a text response.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Error { .. } => "error",
        }
    }
}

/// A single generation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleResponse {
    pub role: Role,
    pub content: SampleContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl SampleResponse {
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: SampleContent::text(text),
            model: None,
        }
    }
}

/// Sampler failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SamplerError {
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("sampler timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Malformed(String),

    #[error("No response from LLM")]
    EmptyChoices,
}

/// Text generation backend.
#[async_trait]
pub trait Sampler: Send + Sync {
    async fn sample(&self, request: SampleRequest) -> Result<SampleResponse, SamplerError>;

    /// Backend name for logs.
    fn name(&self) -> &str {
        "sampler"
    }
}

/// Shared handle to a sampler backend
pub type SharedSampler = Arc<dyn Sampler>;
