//! YAML configuration
//!
//! Loaded once at startup into an immutable value. String values may refer
//! to the environment as `${VAR}` or `${VAR:-default}`.

use std::path::{Path, PathBuf};

use agent_core::{ModelConfig, RoutingLimits, message::DEFAULT_WINDOW_SIZE};
use agent_runtime::{BackendRegistry, CommandEngineSettings, VoiceProfile};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Used when neither `--config` nor `CONCIERGE_CONFIG` is given
pub const DEFAULT_CONFIG_PATH: &str = "config/concierge.yaml";

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "CONCIERGE_CONFIG";

/// Model used for every agent by [`ConciergeConfig::template`] unless told otherwise
pub const DEFAULT_MODEL_ID: &str = "openrouter/mistralai/devstral-small";

/// Settings shared by every agent section
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentSection {
    pub model: ModelConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalendarAgentSection {
    pub model: ModelConfig,

    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,

    /// IANA zone attached to created events
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Environment variable holding an OAuth access token for the Calendar API
    #[serde(default = "default_calendar_token_env")]
    pub token_env: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilesAgentSection {
    pub model: ModelConfig,

    /// Directory searched for project folders; files outside it are never read
    pub root_directory: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GithubAgentSection {
    pub model: ModelConfig,
    pub github_username: String,

    #[serde(default)]
    pub mcp: McpServerConfig,
}

/// How to launch the GitHub MCP server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct McpServerConfig {
    pub command: String,
    pub args: Vec<String>,

    /// Environment variable holding the GitHub token passed to the server
    pub token_env: String,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            command: "npx".into(),
            args: vec!["-y".into(), "@modelcontextprotocol/server-github".into()],
            token_env: "GITHUB_TOKEN".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSection {
    /// Start with audio on (the CLI flags override this)
    pub enabled: bool,
    pub voice: VoiceProfile,
    pub engine: CommandEngineSettings,
}

impl Default for SpeechSection {
    fn default() -> Self {
        Self {
            enabled: true,
            voice: VoiceProfile::default(),
            engine: CommandEngineSettings::default(),
        }
    }
}

/// Whole-application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConciergeConfig {
    pub orchestrator: AgentSection,
    pub work_agent: AgentSection,
    pub leisure_agent: AgentSection,
    pub calendar_agent: CalendarAgentSection,
    pub files_agent: FilesAgentSection,
    pub github_agent: GithubAgentSection,
    pub books_agent: AgentSection,
    pub movies_agent: AgentSection,
    pub recommender_agent: AgentSection,

    /// Directory holding the list documents
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_window_size")]
    pub window_size: usize,

    #[serde(default = "default_max_delegation_depth")]
    pub max_delegation_depth: usize,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default)]
    pub speech: SpeechSection,
}

fn default_calendar_id() -> String {
    "primary".into()
}
fn default_timezone() -> String {
    "Europe/Berlin".into()
}
fn default_calendar_token_env() -> String {
    "GOOGLE_CALENDAR_TOKEN".into()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
const fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}
fn default_max_delegation_depth() -> usize {
    RoutingLimits::default().max_depth
}
fn default_max_iterations() -> usize {
    RoutingLimits::default().max_iterations
}

impl ConciergeConfig {
    /// Config file path: explicit argument, then `CONCIERGE_CONFIG`, then the default
    pub fn locate(explicit: Option<&Path>) -> PathBuf {
        explicit.map_or_else(
            || {
                std::env::var(CONFIG_PATH_ENV)
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
            },
            Path::to_path_buf,
        )
    }

    /// Read, interpolate, parse and check a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config = Self::from_yaml(&raw, path)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse YAML text; `origin` is only used in error messages
    pub fn from_yaml(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(raw);
        let mut config: Self = serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.files_agent.root_directory = expand_tilde(&config.files_agent.root_directory);
        config.data_dir = expand_tilde(&config.data_dir);
        config.check()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::invalid("config", e.to_string()))
    }

    /// Every agent on one model, with defaults elsewhere
    pub fn template(model_id: &str, root_directory: impl Into<PathBuf>, github_username: impl Into<String>) -> Self {
        let section = || AgentSection {
            model: ModelConfig::new(model_id),
        };
        Self {
            orchestrator: section(),
            work_agent: section(),
            leisure_agent: section(),
            calendar_agent: CalendarAgentSection {
                model: ModelConfig::new(model_id),
                calendar_id: default_calendar_id(),
                timezone: default_timezone(),
                token_env: default_calendar_token_env(),
            },
            files_agent: FilesAgentSection {
                model: ModelConfig::new(model_id),
                root_directory: root_directory.into(),
            },
            github_agent: GithubAgentSection {
                model: ModelConfig::new(model_id),
                github_username: github_username.into(),
                mcp: McpServerConfig::default(),
            },
            books_agent: section(),
            movies_agent: section(),
            recommender_agent: section(),
            data_dir: default_data_dir(),
            window_size: default_window_size(),
            max_delegation_depth: default_max_delegation_depth(),
            max_iterations: default_max_iterations(),
            speech: SpeechSection::default(),
        }
    }

    /// (section name, model settings) for every agent, root first
    pub fn models(&self) -> Vec<(&'static str, &ModelConfig)> {
        vec![
            ("orchestrator", &self.orchestrator.model),
            ("work_agent", &self.work_agent.model),
            ("leisure_agent", &self.leisure_agent.model),
            ("calendar_agent", &self.calendar_agent.model),
            ("files_agent", &self.files_agent.model),
            ("github_agent", &self.github_agent.model),
            ("books_agent", &self.books_agent.model),
            ("movies_agent", &self.movies_agent.model),
            ("recommender_agent", &self.recommender_agent.model),
        ]
    }

    pub const fn limits(&self) -> RoutingLimits {
        RoutingLimits {
            max_depth: self.max_delegation_depth,
            max_iterations: self.max_iterations,
        }
    }

    /// Every model id must name a registered backend and a model
    pub fn validate_models(&self, registry: &BackendRegistry) -> Result<(), ConfigError> {
        for (section, model) in self.models() {
            registry
                .wire_model(&model.model_id)
                .map_err(|e| ConfigError::invalid(format!("{section}.model.model_id"), e.to_string()))?;
        }
        Ok(())
    }

    /// (section, environment variable) pairs whose credentials are not set
    pub fn missing_credentials(&self, registry: &BackendRegistry) -> Vec<(&'static str, String)> {
        self.models()
            .into_iter()
            .filter_map(|(section, model)| {
                let var = registry.credentials_env(model).ok().flatten()?;
                let unset = std::env::var(&var).map_or(true, |v| v.trim().is_empty());
                unset.then_some((section, var))
            })
            .collect()
    }

    fn check(&self) -> Result<(), ConfigError> {
        for (section, model) in self.models() {
            if model.model_id.trim().is_empty() {
                return Err(ConfigError::invalid(format!("{section}.model.model_id"), "must not be empty"));
            }
            if model.max_tokens == 0 {
                return Err(ConfigError::invalid(format!("{section}.model.max_tokens"), "must be positive"));
            }
        }
        if self.files_agent.root_directory.as_os_str().is_empty() {
            return Err(ConfigError::invalid("files_agent.root_directory", "must not be empty"));
        }
        if self.github_agent.mcp.command.trim().is_empty() {
            return Err(ConfigError::invalid("github_agent.mcp.command", "must not be empty"));
        }
        if self.window_size == 0 {
            return Err(ConfigError::invalid("window_size", "must be at least 1"));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::invalid("max_iterations", "must be at least 1"));
        }
        if self.max_delegation_depth == 0 {
            return Err(ConfigError::invalid("max_delegation_depth", "must be at least 1"));
        }
        Ok(())
    }
}

/// Replace `${VAR}` and `${VAR:-default}`
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                expr.push(c);
            }
            result.push_str(&resolve_var_expr(&expr));
        } else {
            result.push(ch);
        }
    }
    result
}

fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => std::env::var(name)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_owned()),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest))
}
