//! concierge
//!
//! Command-line personal assistant. A root agent routes each request to a
//! work or leisure assistant, which in turn delegate to calendar, files,
//! GitHub, books, movies and newsletter specialists.

mod render;
mod report;
mod setup;
mod shell;
mod state;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{Agent, AgentEnv, AgentError};
use agent_runtime::{BackendRegistry, CommandSpeechEngine, SpeechEngine, SpeechService, SpeechStatus};
use concierge_agents::config::CONFIG_PATH_ENV;
use concierge_agents::tools::McpTool;
use concierge_agents::{AgentFactory, Collaborators, ConciergeConfig, connect_github};

use crate::render::TerminalRenderer;
use crate::shell::Shell;
use crate::state::{AppState, UserPreferences};

/// Timeout for calendar and catalogue requests
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Your personal assistant for work and leisure
#[derive(Parser, Debug)]
#[command(name = "concierge", version, about, long_about = None)]
struct Cli {
    /// Path to the YAML config (default: config/concierge.yaml)
    #[arg(long, global = true, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Log at debug level to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start an interactive chat
    Chat {
        /// Skip the banner and help panel
        #[arg(short, long)]
        minimal: bool,

        /// Speak replies (default from the config)
        #[arg(long, overrides_with = "no_audio")]
        audio: bool,

        /// Text only
        #[arg(long, overrides_with = "audio")]
        no_audio: bool,
    },

    /// Ask one question, print the answer and exit
    Quick {
        /// The question
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Show configuration, backends, credentials and speech
    Status,

    /// Create a config interactively
    Setup,

    /// List the agents and what they do
    Agents,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment before the filter reads RUST_LOG
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = ConciergeConfig::locate(cli.config.as_deref());
    match cli.command {
        Command::Chat {
            minimal,
            audio,
            no_audio,
        } => chat(&config_path, minimal, audio_override(audio, no_audio)).await,
        Command::Quick { query } => quick(&config_path, &query.join(" ")).await,
        Command::Status => status(&config_path).await,
        Command::Setup => setup::run_setup(&config_path, &mut std::io::stdin().lock(), &mut std::io::stdout().lock()),
        Command::Agents => {
            print!("{}", report::agents_listing(None));
            Ok(())
        }
    }
}

/// Logs go to stderr so they never interleave with rendered replies
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

const fn audio_override(audio: bool, no_audio: bool) -> Option<bool> {
    if no_audio {
        Some(false)
    } else if audio {
        Some(true)
    } else {
        None
    }
}

fn load_config(path: &Path) -> anyhow::Result<ConciergeConfig> {
    ConciergeConfig::load(path).with_context(|| {
        format!(
            "failed to load config from {} (run `concierge setup` to create one)",
            path.display()
        )
    })
}

/// Build everything a session needs. The speech engine is built here or never.
async fn bootstrap(config: ConciergeConfig, audio: bool, with_speech: bool) -> anyhow::Result<AppState> {
    let registry = Arc::new(BackendRegistry::with_defaults());
    config.validate_models(&registry)?;
    for (section, var) in config.missing_credentials(&registry) {
        tracing::warn!(section, var = %var, "credentials not set");
    }

    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;
    let mut collaborators = Collaborators::from_config(&config, &http);

    let github = match connect_github(&config.github_agent).await {
        Ok(client) => {
            tracing::info!(tools = client.tools().len(), "GitHub MCP server connected");
            collaborators = collaborators.with_github_tools(McpTool::all(&client));
            Some(client)
        }
        Err(e) => {
            tracing::warn!(error = %e, "GitHub tools unavailable");
            None
        }
    };

    let tree = AgentFactory::new(&config).build(collaborators)?;

    let speech = if with_speech {
        let settings = config.speech.engine.clone();
        SpeechService::start(
            move || Ok(Arc::new(CommandSpeechEngine::new(settings)?) as Arc<dyn SpeechEngine>),
            config.speech.voice.clone(),
        )
    } else {
        SpeechService::disabled("speech is off for one-shot queries")
    };

    Ok(AppState {
        config: Arc::new(config),
        registry,
        tree: Arc::new(tree),
        speech: Arc::new(speech),
        preferences: UserPreferences::new(audio),
        github,
    })
}

async fn chat(config_path: &Path, minimal: bool, audio: Option<bool>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let audio = audio.unwrap_or(config.speech.enabled);
    let state = bootstrap(config, audio, true).await?;

    let renderer = Arc::new(TerminalRenderer::new(
        Arc::clone(&state.speech),
        state.preferences.clone(),
    ));
    let resolver = state.registry.clone();
    let result = match Shell::new(state.clone(), config_path.to_path_buf(), resolver, renderer) {
        Ok(mut shell) => shell.run(minimal).await,
        Err(e) => Err(e),
    };

    state.shutdown().await;
    result
}

async fn quick(config_path: &Path, query: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let state = bootstrap(config, false, false).await?;

    let renderer = Arc::new(TerminalRenderer::new(
        Arc::clone(&state.speech),
        state.preferences.clone(),
    ));
    let env = Arc::new(AgentEnv::new(state.registry.clone(), renderer).with_limits(state.config.limits()));

    let result = match Agent::new(Arc::clone(&state.tree.root), env) {
        Ok(mut agent) => tokio::select! {
            answer = agent.query(query) => answer.map(drop).context("query failed"),
            _ = tokio::signal::ctrl_c() => {
                println!("\n  {}", AgentError::Interrupted.user_message());
                Ok(())
            }
        },
        Err(e) => Err(e.into()),
    };

    state.shutdown().await;
    result
}

async fn status(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let registry = BackendRegistry::with_defaults();

    println!();
    print!("{}", report::config_summary(&config, config_path, &registry));
    println!();
    print!("{}", report::backend_health(&config, &registry).await);
    println!();

    let speech = match CommandSpeechEngine::new(config.speech.engine.clone()) {
        Ok(engine) => SpeechStatus::Ready {
            engine: engine.name().to_owned(),
        },
        Err(e) => SpeechStatus::Unavailable { reason: e.to_string() },
    };
    let token_set = std::env::var(&config.github_agent.mcp.token_env).is_ok_and(|v| !v.trim().is_empty());
    print!("{}", report::session_summary(&speech, config.speech.enabled, false));
    println!(
        "  GitHub token {} ({})",
        if token_set { "set" } else { "missing" },
        config.github_agent.mcp.token_env
    );
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn the_last_audio_flag_wins() {
        let cli = Cli::try_parse_from(["concierge", "chat", "--no-audio", "--audio"]).unwrap();
        let Command::Chat { audio, no_audio, .. } = cli.command else {
            panic!("expected chat");
        };
        assert_eq!(audio_override(audio, no_audio), Some(true));

        let cli = Cli::try_parse_from(["concierge", "chat", "-m"]).unwrap();
        let Command::Chat { minimal, audio, no_audio } = cli.command else {
            panic!("expected chat");
        };
        assert!(minimal);
        assert_eq!(audio_override(audio, no_audio), None);
    }

    #[test]
    fn quick_joins_its_words() {
        let cli = Cli::try_parse_from(["concierge", "--config", "my.yaml", "quick", "What", "should", "I", "watch?"])
            .unwrap();
        assert_eq!(cli.config.as_deref(), Some(Path::new("my.yaml")));
        let Command::Quick { query } = cli.command else {
            panic!("expected quick");
        };
        assert_eq!(query.join(" "), "What should I watch?");
    }
}
