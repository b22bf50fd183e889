//! Setup wizard
//!
//! Asks for the handful of values that have no sensible default and writes a
//! complete YAML config; everything else starts from
//! [`ConciergeConfig::template`] and can be edited by hand afterwards.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use agent_runtime::BackendRegistry;
use anyhow::{Context, bail};
use concierge_agents::ConciergeConfig;
use concierge_agents::config::DEFAULT_MODEL_ID;

/// Run the wizard and write the result to `path`
pub fn run_setup(path: &Path, stdin: &mut dyn BufRead, out: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(out)?;
    writeln!(out, "  Concierge setup")?;
    writeln!(out, "  ───────────────")?;
    writeln!(out)?;

    if path.exists() {
        writeln!(out, "  A config already exists at {}.", path.display())?;
        if !confirm(stdin, out, "  Replace it?", false)? {
            writeln!(out, "  Keeping the existing config.")?;
            return Ok(());
        }
        writeln!(out)?;
    }

    let registry = BackendRegistry::with_defaults();
    let config = build_config(&registry, stdin, out)?;
    let yaml = config.to_yaml()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, yaml).with_context(|| format!("failed to write {}", path.display()))?;

    writeln!(out)?;
    writeln!(out, "  Wrote {}", path.display())?;
    let missing = config.missing_credentials(&registry);
    if let Some((_, var)) = missing.first() {
        writeln!(out, "  Set {var} (in the environment or a .env file) before chatting.")?;
    }
    writeln!(out, "  Run `concierge chat` to get started.")?;
    writeln!(out)?;

    tracing::info!(path = %path.display(), "config written");
    Ok(())
}

/// Ask every question and assemble the config
pub fn build_config(
    registry: &BackendRegistry,
    stdin: &mut dyn BufRead,
    out: &mut dyn Write,
) -> anyhow::Result<ConciergeConfig> {
    writeln!(out, "  Step 1/4: Model for every agent")?;
    writeln!(out, "  Prefixes: {}", registry.prefixes().join(", "))?;
    let model_id = loop {
        let answer = ask(stdin, out, "  Model id", DEFAULT_MODEL_ID)?;
        match registry.wire_model(&answer).map(drop) {
            Ok(()) => break answer,
            Err(e) => writeln!(out, "  {e}")?,
        }
    };
    writeln!(out)?;

    writeln!(out, "  Step 2/4: Folder holding your projects (the file search agent reads only inside it)")?;
    let current = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let root_directory = ask(stdin, out, "  Projects folder", &current.display().to_string())?;
    writeln!(out)?;

    writeln!(out, "  Step 3/4: GitHub account")?;
    let github_username = loop {
        let answer = ask(stdin, out, "  GitHub username", "")?;
        if !answer.is_empty() {
            break answer;
        }
        writeln!(out, "  A username is needed for the GitHub agent.")?;
    };
    writeln!(out)?;

    writeln!(out, "  Step 4/4: Where to keep your reading list, watchlist and subscriptions")?;
    let data_dir = ask(stdin, out, "  Data folder", "data")?;

    let mut config = ConciergeConfig::template(&model_id, root_directory, github_username);
    config.data_dir = PathBuf::from(data_dir);
    Ok(config)
}

/// One line of input, or `default` when left blank
fn ask(stdin: &mut dyn BufRead, out: &mut dyn Write, question: &str, default: &str) -> anyhow::Result<String> {
    if default.is_empty() {
        write!(out, "{question}: ")?;
    } else {
        write!(out, "{question} [{default}]: ")?;
    }
    out.flush()?;

    let mut line = String::new();
    if stdin.read_line(&mut line)? == 0 {
        bail!("setup cancelled: input closed");
    }
    let answer = line.trim();
    Ok(if answer.is_empty() { default } else { answer }.to_owned())
}

fn confirm(stdin: &mut dyn BufRead, out: &mut dyn Write, question: &str, default: bool) -> anyhow::Result<bool> {
    let hint = if default { "Y/n" } else { "y/N" };
    let answer = ask(stdin, out, &format!("{question} [{hint}]"), "")?;
    Ok(match answer.to_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn answers(lines: &[&str]) -> Cursor<Vec<u8>> {
        Cursor::new(format!("{}\n", lines.join("\n")).into_bytes())
    }

    #[test]
    fn blank_answers_take_the_defaults() {
        let registry = BackendRegistry::with_defaults();
        let mut out = Vec::<u8>::new();
        let config = build_config(&registry, &mut answers(&["", "/home/me/code", "octocat", ""]), &mut out).unwrap();

        assert_eq!(config.orchestrator.model.model_id, DEFAULT_MODEL_ID);
        assert_eq!(config.files_agent.root_directory, PathBuf::from("/home/me/code"));
        assert_eq!(config.github_agent.github_username, "octocat");
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn unknown_backends_and_empty_usernames_are_asked_again() {
        let registry = BackendRegistry::with_defaults();
        let mut out = Vec::<u8>::new();
        let config = build_config(
            &registry,
            &mut answers(&["mystery/model", "ollama/llama3.1", "/srv", "", "octocat", "/var/concierge"]),
            &mut out,
        )
        .unwrap();

        assert_eq!(config.movies_agent.model.model_id, "ollama/llama3.1");
        assert_eq!(config.github_agent.github_username, "octocat");
        let transcript = String::from_utf8(out).unwrap();
        assert!(transcript.contains("A username is needed"));
        assert_eq!(transcript.matches("Model id").count(), 2);
    }

    #[test]
    fn closed_input_cancels() {
        let registry = BackendRegistry::with_defaults();
        let err = build_config(&registry, &mut Cursor::new(Vec::new()), &mut Vec::<u8>::new()).unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn written_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("concierge.yaml");
        let mut out = Vec::<u8>::new();

        run_setup(&path, &mut answers(&["anthropic/claude-3-5-haiku-latest", "/srv", "octocat", ""]), &mut out).unwrap();

        let config = ConciergeConfig::load(&path).unwrap();
        assert_eq!(config.calendar_agent.model.model_id, "anthropic/claude-3-5-haiku-latest");
        assert_eq!(config.github_agent.github_username, "octocat");
    }

    #[test]
    fn existing_config_is_kept_unless_confirmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concierge.yaml");
        std::fs::write(&path, "keep me").unwrap();

        run_setup(&path, &mut answers(&[""]), &mut Vec::<u8>::new()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me");
    }
}
