//! MCP Server for the Council Debate Engine
//!
//! Exposes the debate lifecycle as MCP tools over stdio:
//! - `start_council_debate`: collect one opinion from each of the nine members
//! - `conduct_voting`: each member votes for the best opinion other than its own
//! - `get_results`: tally votes into winners (stored once computed)
//! - `view_debate`: full record of one debate
//! - `list_past_debates`: newest debates first
//! - `list_council_members`: the panel
//!
//! # Usage
//!
//! ```bash
//! # Against an OpenAI-compatible endpoint
//! COUNCIL_SAMPLER_URL=http://localhost:8000/v1/chat/completions council-mcp
//!
//! # Persistent store (requires the heavy-state feature)
//! council-mcp --state-path ./council-state
//!
//! # Deterministic canned answers, no backend needed
//! council-mcp --offline
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use tokio::io::{stdin, stdout};

use council_coordination::config::CouncilConfig;
use council_coordination::council::Panel;
use council_coordination::debate::{DebateEngine, SharedDebateEngine};
use council_coordination::input_guard::validate_external_id;
use council_coordination::sampler::{HttpSampler, ScriptedSampler, SharedSampler};
use council_coordination::state::{InMemoryDebateRepository, SharedDebateRepository};
use council_coordination::CouncilError;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to RocksDB state directory (overrides COUNCIL_STATE_PATH)
    #[arg(long)]
    state_path: Option<PathBuf>,

    /// Directory of <member_id>.md persona overrides (overrides COUNCIL_PROMPTS_DIR)
    #[arg(long)]
    prompts_dir: Option<PathBuf>,

    /// Chat completions endpoint (overrides COUNCIL_SAMPLER_URL)
    #[arg(long)]
    sampler_url: Option<String>,

    /// Model name sent to the endpoint (overrides COUNCIL_SAMPLER_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Debates allowed per trailing hour (overrides COUNCIL_HOURLY_LIMIT)
    #[arg(long)]
    hourly_limit: Option<u64>,

    /// Debates allowed in total (overrides COUNCIL_TOTAL_LIMIT)
    #[arg(long)]
    total_limit: Option<u64>,

    /// Answer with canned responses instead of calling a model
    #[arg(long, default_value_t = false)]
    offline: bool,
}

impl Args {
    fn apply(&self, config: &mut CouncilConfig) {
        if let Some(path) = &self.state_path {
            config.state_path = Some(path.clone());
        }
        if let Some(dir) = &self.prompts_dir {
            config.prompts_dir = Some(dir.clone());
        }
        if let Some(url) = &self.sampler_url {
            config.sampler.endpoint_url = url.clone();
        }
        if let Some(model) = &self.model {
            config.sampler.model = model.clone();
        }
        if let Some(limit) = self.hourly_limit {
            config.limits.hourly_limit = limit;
        }
        if let Some(limit) = self.total_limit {
            config.limits.total_limit = limit;
        }
    }
}

/// Request parameters for start_council_debate
#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[schemars(crate = "rmcp::schemars")]
struct StartDebateRequest {
    #[schemars(description = "The topic or question for the council to debate (max 5000 characters)")]
    prompt: String,
}

/// Request parameters for tools addressing one debate
#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[schemars(crate = "rmcp::schemars")]
struct DebateIdRequest {
    #[schemars(description = "Debate ID returned by start_council_debate, e.g. 20240101_120000_abcdef012345")]
    debate_id: String,
}

/// Request parameters for list_past_debates
#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[schemars(crate = "rmcp::schemars")]
struct ListDebatesRequest {
    #[schemars(description = "Maximum number of debates to return (1-100, default: 10)")]
    limit: Option<usize>,
}

/// The MCP server handler
#[derive(Clone)]
struct CouncilServer {
    engine: SharedDebateEngine,
    tool_router: ToolRouter<Self>,
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Failed to serialize response: {}", e))
}

fn tool_error(err: CouncilError) -> String {
    tracing::warn!(code = err.code(), error = %err, "tool call failed");
    err.to_structured_json()
}

#[tool_router]
impl CouncilServer {
    fn new(engine: SharedDebateEngine) -> Self {
        Self {
            engine,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Start a new council debate. All nine council members give their opinion on the prompt concurrently. Returns the debate_id to use with conduct_voting and get_results."
    )]
    async fn start_council_debate(
        &self,
        Parameters(req): Parameters<StartDebateRequest>,
    ) -> Result<String, String> {
        let started = self
            .engine
            .start_debate(&req.prompt)
            .await
            .map_err(tool_error)?;
        to_json(&started)
    }

    #[tool(
        description = "Have every council member vote for the most compelling opinion other than their own. Requires a debate still collecting opinions."
    )]
    async fn conduct_voting(
        &self,
        Parameters(req): Parameters<DebateIdRequest>,
    ) -> Result<String, String> {
        let id = validate_external_id(&req.debate_id).map_err(tool_error)?;
        let report = self.engine.conduct_voting(&id).await.map_err(tool_error)?;
        to_json(&report)
    }

    #[tool(
        description = "Get the winners of a debate. Tallies the votes on first call after voting; later calls return the stored results."
    )]
    async fn get_results(
        &self,
        Parameters(req): Parameters<DebateIdRequest>,
    ) -> Result<String, String> {
        let id = validate_external_id(&req.debate_id).map_err(tool_error)?;
        let results = self.engine.get_results(&id).await.map_err(tool_error)?;
        to_json(&results)
    }

    #[tool(description = "View the full record of a debate: prompt, opinions, votes and results.")]
    async fn view_debate(
        &self,
        Parameters(req): Parameters<DebateIdRequest>,
    ) -> Result<String, String> {
        let id = validate_external_id(&req.debate_id).map_err(tool_error)?;
        let record = self.engine.get_debate(&id).await.map_err(tool_error)?;
        to_json(&record)
    }

    #[tool(description = "List past debates, newest first.")]
    async fn list_past_debates(
        &self,
        Parameters(req): Parameters<ListDebatesRequest>,
    ) -> Result<String, String> {
        let debates = self
            .engine
            .list_past_debates(req.limit.unwrap_or(10))
            .await
            .map_err(tool_error)?;
        to_json(&serde_json::json!({
            "count": debates.len(),
            "debates": debates,
        }))
    }

    #[tool(description = "List the nine council members and their perspectives.")]
    async fn list_council_members(&self) -> Result<String, String> {
        let members: Vec<_> = self
            .engine
            .panel()
            .all()
            .iter()
            .map(|m| {
                serde_json::json!({
                    "id": m.id,
                    "name": m.display_name,
                    "focus": m.id.focus(),
                })
            })
            .collect();
        to_json(&members)
    }
}

#[tool_handler]
impl ServerHandler for CouncilServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Council of nine LLM personas that debate a topic and vote on the best answer.\n\
                 Workflow: start_council_debate → conduct_voting → get_results.\n\
                 Errors are JSON objects with code, message, recovery_action and retryable."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

fn open_repository(config: &CouncilConfig) -> Result<SharedDebateRepository> {
    match &config.state_path {
        #[cfg(feature = "heavy-state")]
        Some(path) => {
            tracing::info!("Debate state path: {}", path.display());
            let store = council_coordination::state::RocksDebateRepository::open(path)
                .map_err(|e| anyhow::anyhow!("Failed to open debate store: {}", e))?;
            Ok(store.shared())
        }
        #[cfg(not(feature = "heavy-state"))]
        Some(path) => anyhow::bail!(
            "state path {} requires building with the heavy-state feature",
            path.display()
        ),
        None => {
            tracing::info!("Using in-memory debate store");
            Ok(InMemoryDebateRepository::new().shared())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("council_coordination=info".parse()?)
                .add_directive("council_mcp=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = CouncilConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    let mut panel = Panel::builtin();
    if let Some(dir) = &config.prompts_dir {
        panel = panel
            .with_prompt_overrides(dir)
            .map_err(|e| anyhow::anyhow!("Failed to read persona prompts: {}", e))?;
    }

    let sampler: SharedSampler = if args.offline {
        tracing::info!("Offline mode: using scripted answers");
        Arc::new(ScriptedSampler::new())
    } else {
        tracing::info!(
            endpoint = %config.sampler.endpoint_url,
            model = %config.sampler.model,
            "Using chat completions sampler"
        );
        Arc::new(HttpSampler::from_config(&config.sampler)?)
    };

    let repo = open_repository(&config)?;
    let engine = DebateEngine::new(&config, Arc::new(panel), sampler, repo).shared();

    tracing::info!(
        hourly_limit = config.limits.hourly_limit,
        total_limit = config.limits.total_limit,
        "Starting Council MCP Server"
    );

    let server = CouncilServer::new(engine);
    let service = server.serve((stdin(), stdout())).await?;
    service.waiting().await?;

    Ok(())
}
