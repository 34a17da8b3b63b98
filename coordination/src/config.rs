//! Engine configuration
//!
//! Layered in this order, later layers winning: built-in defaults, an
//! optional TOML file, `COUNCIL_*` environment variables, then command-line
//! flags (applied by the binary).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Admission ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    /// Debates that may be created in any trailing 60 minutes.
    pub hourly_limit: u64,
    /// Debates that may ever be created against one store.
    pub total_limit: u64,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            hourly_limit: 50,
            total_limit: 1000,
        }
    }
}

/// Length ceilings applied by the input guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardLimits {
    pub max_topic_chars: usize,
    pub max_opinion_chars: usize,
    pub max_reasoning_chars: usize,
}

impl Default for GuardLimits {
    fn default() -> Self {
        Self {
            max_topic_chars: 5000,
            max_opinion_chars: 10_000,
            max_reasoning_chars: 5000,
        }
    }
}

/// Generation parameters for one fan-out phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl SamplingParams {
    pub fn opinions() -> Self {
        Self {
            max_tokens: 300,
            temperature: 0.8,
        }
    }

    pub fn votes() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

/// OpenAI-compatible chat completions backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub endpoint_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "http://localhost:8000/v1/chat/completions".to_string(),
            model: "default".to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CouncilConfig {
    pub limits: RateLimits,
    pub guard: GuardLimits,
    pub opinion_sampling: SamplingParams,
    pub vote_sampling: SamplingParams,
    pub sampler: SamplerConfig,
    /// Directory of `<member_id>.md` persona prompt overrides.
    pub prompts_dir: Option<PathBuf>,
    /// RocksDB directory. In-memory storage when unset.
    pub state_path: Option<PathBuf>,
}

impl Default for CouncilConfig {
    fn default() -> Self {
        Self {
            limits: RateLimits::default(),
            guard: GuardLimits::default(),
            opinion_sampling: SamplingParams::opinions(),
            vote_sampling: SamplingParams::votes(),
            sampler: SamplerConfig::default(),
            prompts_dir: None,
            state_path: None,
        }
    }
}

impl CouncilConfig {
    /// Parse a TOML document. Missing sections keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Read a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, then the optional file, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overlay `COUNCIL_*` variables read through `lookup`.
    ///
    /// Unparsable numeric values are logged and ignored.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("COUNCIL_SAMPLER_URL") {
            self.sampler.endpoint_url = url;
        }
        if let Some(model) = lookup("COUNCIL_SAMPLER_MODEL") {
            self.sampler.model = model;
        }
        if let Some(key) = lookup("COUNCIL_SAMPLER_API_KEY") {
            self.sampler.api_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Some(value) = lookup("COUNCIL_HOURLY_LIMIT") {
            match value.parse() {
                Ok(n) => self.limits.hourly_limit = n,
                Err(_) => warn!(value = %value, "ignoring non-numeric COUNCIL_HOURLY_LIMIT"),
            }
        }
        if let Some(value) = lookup("COUNCIL_TOTAL_LIMIT") {
            match value.parse() {
                Ok(n) => self.limits.total_limit = n,
                Err(_) => warn!(value = %value, "ignoring non-numeric COUNCIL_TOTAL_LIMIT"),
            }
        }
        if let Some(dir) = lookup("COUNCIL_PROMPTS_DIR") {
            self.prompts_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = lookup("COUNCIL_STATE_PATH") {
            self.state_path = Some(PathBuf::from(path));
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.hourly_limit == 0 || self.limits.total_limit == 0 {
            return Err(ConfigError::Invalid(
                "rate limits must be greater than zero".to_string(),
            ));
        }
        if self.guard.max_topic_chars == 0
            || self.guard.max_opinion_chars == 0
            || self.guard.max_reasoning_chars == 0
        {
            return Err(ConfigError::Invalid(
                "guard length limits must be greater than zero".to_string(),
            ));
        }
        for (phase, params) in [
            ("opinion_sampling", self.opinion_sampling),
            ("vote_sampling", self.vote_sampling),
        ] {
            if params.max_tokens == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{phase}.max_tokens must be greater than zero"
                )));
            }
            if !(0.0..=2.0).contains(&params.temperature) {
                return Err(ConfigError::Invalid(format!(
                    "{phase}.temperature must be within 0.0..=2.0"
                )));
            }
        }
        if self.sampler.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "sampler.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if !self.sampler.endpoint_url.starts_with("http://")
            && !self.sampler.endpoint_url.starts_with("https://")
        {
            return Err(ConfigError::Invalid(format!(
                "sampler.endpoint_url must be an http(s) URL: {}",
                self.sampler.endpoint_url
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = CouncilConfig::default();
        assert_eq!(config.limits.hourly_limit, 50);
        assert_eq!(config.limits.total_limit, 1000);
        assert_eq!(config.guard.max_topic_chars, 5000);
        assert_eq!(config.opinion_sampling.max_tokens, 300);
        assert_eq!(config.vote_sampling.max_tokens, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CouncilConfig::from_toml_str(
            r#"
            [limits]
            hourly_limit = 5

            [sampler]
            model = "qwen"
            "#,
        )
        .unwrap();
        assert_eq!(config.limits.hourly_limit, 5);
        assert_eq!(config.limits.total_limit, 1000);
        assert_eq!(config.sampler.model, "qwen");
        assert_eq!(config.sampler.timeout_secs, 120);
        assert_eq!(config.vote_sampling, SamplingParams::votes());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("council.toml");
        std::fs::write(&path, "prompts_dir = \"/etc/council/prompts\"\n").unwrap();
        let config = CouncilConfig::from_file(&path).unwrap();
        assert_eq!(
            config.prompts_dir.as_deref(),
            Some(Path::new("/etc/council/prompts"))
        );

        let missing = CouncilConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }

    #[test]
    fn test_bad_toml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[limits\n").unwrap();
        let err = CouncilConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_env_overlay() {
        let env: HashMap<&str, &str> = [
            ("COUNCIL_SAMPLER_URL", "https://llm.internal/v1/chat/completions"),
            ("COUNCIL_HOURLY_LIMIT", "7"),
            ("COUNCIL_TOTAL_LIMIT", "many"),
            ("COUNCIL_SAMPLER_API_KEY", ""),
        ]
        .into_iter()
        .collect();

        let mut config = CouncilConfig::default();
        config.apply_env_with(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(
            config.sampler.endpoint_url,
            "https://llm.internal/v1/chat/completions"
        );
        assert_eq!(config.limits.hourly_limit, 7);
        // Unparsable value leaves the previous layer in place.
        assert_eq!(config.limits.total_limit, 1000);
        assert_eq!(config.sampler.api_key, None);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = CouncilConfig::default();
        config.limits.hourly_limit = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_bad_url_and_temperature() {
        let mut config = CouncilConfig::default();
        config.sampler.endpoint_url = "ftp://nowhere".to_string();
        assert!(config.validate().is_err());

        let mut config = CouncilConfig::default();
        config.vote_sampling.temperature = 3.5;
        assert!(config.validate().is_err());
    }
}
