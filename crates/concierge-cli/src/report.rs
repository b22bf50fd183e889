//! Plain-text summaries for `status` and `agents`

use std::collections::HashSet;
use std::fmt::Write;
use std::path::Path;

use agent_core::ProviderResolver;
use agent_runtime::{BackendRegistry, SpeechStatus};
use concierge_agents::{AGENTS, AgentInfo, AgentTree, ConciergeConfig, agent_info};

/// Configuration, backends and credentials
pub fn config_summary(config: &ConciergeConfig, path: &Path, registry: &BackendRegistry) -> String {
    let mut report = String::new();
    writeln!(report, "  Config       {}", path.display()).ok();
    writeln!(report, "  Data         {}", config.data_dir.display()).ok();
    writeln!(report, "  Projects     {}", config.files_agent.root_directory.display()).ok();
    writeln!(report, "  GitHub user  {}", config.github_agent.github_username).ok();
    writeln!(
        report,
        "  Limits       depth {}, {} model calls per turn, window {}",
        config.max_delegation_depth, config.max_iterations, config.window_size
    )
    .ok();
    writeln!(report).ok();

    writeln!(report, "  Models").ok();
    for (section, model) in config.models() {
        let backend = registry
            .kind_for(&model.model_id)
            .map_or_else(|_| "unknown backend".to_owned(), |kind| kind.to_string());
        writeln!(report, "    {section:<18} {:<44} {backend}", model.model_id).ok();
    }
    writeln!(report).ok();

    let missing = config.missing_credentials(registry);
    if missing.is_empty() {
        writeln!(report, "  Credentials  all set").ok();
    } else {
        let mut vars: Vec<&str> = missing.iter().map(|(_, var)| var.as_str()).collect();
        vars.sort_unstable();
        vars.dedup();
        writeln!(report, "  Credentials  missing {}", vars.join(", ")).ok();
    }
    report
}

/// Reachability of every configured model, one probe per model id
pub async fn backend_health(config: &ConciergeConfig, resolver: &dyn ProviderResolver) -> String {
    let mut report = String::new();
    writeln!(report, "  Backends").ok();
    let mut seen = HashSet::new();
    for (_, model) in config.models() {
        if !seen.insert(model.model_id.as_str()) {
            continue;
        }
        let health = match resolver.resolve(model) {
            Ok(provider) => match provider.health_check().await {
                Ok(true) => "reachable".to_owned(),
                Ok(false) => "not reachable".to_owned(),
                Err(e) => format!("check failed: {e}"),
            },
            Err(e) => format!("not configured: {e}"),
        };
        writeln!(report, "    {:<44} {health}", model.model_id).ok();
    }
    report
}

/// Runtime state only known inside a running session
pub fn session_summary(speech: &SpeechStatus, audio_enabled: bool, github_connected: bool) -> String {
    let speech = match speech {
        SpeechStatus::Ready { engine } => format!("ready ({engine})"),
        SpeechStatus::Unavailable { reason } => format!("unavailable: {reason}"),
        SpeechStatus::Shutdown => "shut down".to_owned(),
    };
    let audio = if audio_enabled { "on" } else { "off" };
    let github = if github_connected { "connected" } else { "not connected" };
    format!("  Speech       {speech}\n  Audio        {audio}\n  GitHub       {github}\n")
}

/// Every agent as an indented tree; agents missing from `tree` are marked
pub fn agents_listing(tree: Option<&AgentTree>) -> String {
    let mut listing = String::new();
    for info in AGENTS {
        let pad = "  ".repeat(depth_of(info) + 1);
        let missing = tree.is_some_and(|t| !t.contains(info.id));
        let marker = if missing { "  (not available)" } else { "" };
        writeln!(listing, "{pad}{} [{}]{marker}", info.display_name, info.id).ok();
        writeln!(listing, "{pad}  {}", info.description).ok();
    }
    listing
}

fn depth_of(info: &AgentInfo) -> usize {
    let mut depth = 0;
    let mut parent = info.parent;
    while let Some(id) = parent {
        depth += 1;
        parent = agent_info(id).and_then(|p| p.parent);
    }
    depth
}
