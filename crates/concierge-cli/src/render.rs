//! Terminal renderer
//!
//! Turns callback events into terminal output and, for the root agent, speech.
//! Text is presented one line at a time; when audio is on, each line is spoken
//! and playback finishes before the next line appears. Nested agents are
//! indented by depth and labeled with their display name.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use agent_core::{CallbackEvent, CallbackHandler, EventKind};
use agent_runtime::SpeechService;
use async_trait::async_trait;
use concierge_agents::agent_info;

use crate::state::UserPreferences;

/// Longest argument preview shown on a tool line
const PREVIEW_CHARS: usize = 60;

/// Suffix shared by every delegate tool
const DELEGATE_SUFFIX: &str = "_agent_query";

#[derive(Default)]
struct RenderState {
    /// Unfinished text per agent
    pending: HashMap<String, String>,

    /// Tool-call ids whose start line was already printed
    announced: HashSet<String>,
}

pub struct TerminalRenderer {
    speech: Arc<SpeechService>,
    preferences: UserPreferences,
    state: Mutex<RenderState>,
    out: Mutex<Box<dyn Write + Send>>,
}

impl TerminalRenderer {
    pub fn new(speech: Arc<SpeechService>, preferences: UserPreferences) -> Self {
        Self::with_output(speech, preferences, Box::new(std::io::stdout()))
    }

    pub fn with_output(
        speech: Arc<SpeechService>,
        preferences: UserPreferences,
        out: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            speech,
            preferences,
            state: Mutex::new(RenderState::default()),
            out: Mutex::new(out),
        }
    }

    /// Drop buffered text and announcements, e.g. after an interrupted turn
    pub fn reset(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = RenderState::default();
    }

    fn write_line(&self, line: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{line}").ok();
        out.flush().ok();
    }

    /// Print one segment, then speak it if it came from the root agent
    async fn present(&self, agent: &str, depth: usize, segment: &str) {
        if depth > 0 {
            self.write_line(&format!("{}[{}] {segment}", indent(depth), label(agent)));
            return;
        }

        self.write_line(segment);
        if !self.preferences.audio_enabled() || !self.speech.is_ready().await {
            return;
        }
        let spoken = speakable(segment);
        if spoken.is_empty() {
            return;
        }
        if let Err(e) = self.speech.speak(&spoken).await {
            tracing::warn!(error = %e, "speech playback failed");
        }
    }

    fn take_segments(&self, agent: &str, text: &str) -> Vec<String> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let buffer = state.pending.entry(agent.to_owned()).or_default();
        buffer.push_str(text);
        drain_segments(buffer)
    }

    fn take_remainder(&self, agent: &str) -> Option<String> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let rest = state.pending.remove(agent)?;
        let rest = rest.trim();
        (!rest.is_empty()).then(|| rest.to_owned())
    }

    /// Parsed arguments the first time a complete payload is seen for `id`
    fn announce(&self, id: &str, raw_input: &str) -> Option<serde_json::Value> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.announced.contains(id) {
            return None;
        }
        let arguments = serde_json::from_str::<serde_json::Value>(raw_input).ok()?;
        state.announced.insert(id.to_owned());
        Some(arguments)
    }
}

#[async_trait]
impl CallbackHandler for TerminalRenderer {
    async fn on_event(&self, event: CallbackEvent) {
        let CallbackEvent { agent, depth, kind } = event;
        match kind {
            EventKind::PartialAssistantText { text } => {
                for segment in self.take_segments(&agent, &text) {
                    self.present(&agent, depth, &segment).await;
                }
            }
            EventKind::AssistantMessageComplete { .. } => {
                if let Some(rest) = self.take_remainder(&agent) {
                    for segment in rest.lines().filter(|l| !l.trim().is_empty()) {
                        self.present(&agent, depth, segment.trim_end()).await;
                    }
                }
            }
            EventKind::ToolInvocationStarted { id, name, raw_input } => {
                if let Some(arguments) = self.announce(&id, &raw_input) {
                    self.write_line(&tool_started_line(depth, &name, &arguments));
                }
            }
            EventKind::ToolInvocationResult {
                name, success, output, ..
            } => {
                self.write_line(&tool_result_line(depth, &name, success, &output));
            }
        }
    }
}

/// Remove every finished line from `buffer`; runs of newlines yield no empty segments
pub fn drain_segments(buffer: &mut String) -> Vec<String> {
    let Some(end) = buffer.rfind('\n') else {
        return Vec::new();
    };
    let finished: String = buffer.drain(..=end).collect();
    finished
        .split('\n')
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_owned)
        .collect()
}

/// Text suitable for the synthesizer: markdown markup and list bullets removed
pub fn speakable(segment: &str) -> String {
    let line = segment.trim_start();
    let line = ["- ", "* ", "• "]
        .iter()
        .find_map(|bullet| line.strip_prefix(bullet))
        .unwrap_or(line);
    line.replace("**", "")
        .chars()
        .filter(|c| !matches!(c, '#' | '[' | ']' | '`'))
        .collect::<String>()
        .trim()
        .to_owned()
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

fn label(agent: &str) -> &str {
    agent_info(agent).map_or(agent, |info| info.display_name)
}

fn tool_started_line(depth: usize, name: &str, arguments: &serde_json::Value) -> String {
    let pad = indent(depth + 1);
    let preview = argument_preview(arguments);
    match name.strip_suffix(DELEGATE_SUFFIX) {
        Some(target) if preview.is_empty() => format!("{pad}→ asking {}", label(target)),
        Some(target) => format!("{pad}→ asking {}: {preview}", label(target)),
        None if preview.is_empty() => format!("{pad}· {name}"),
        None => format!("{pad}· {name} ({preview})"),
    }
}

fn tool_result_line(depth: usize, name: &str, success: bool, output: &str) -> String {
    let pad = indent(depth + 1);
    if success {
        return format!("{pad}✓ {name}");
    }
    let reason = output.lines().next().unwrap_or_default();
    format!("{pad}✗ {name}: {}", truncate(reason, PREVIEW_CHARS * 2))
}

/// First string argument, shortened
fn argument_preview(arguments: &serde_json::Value) -> String {
    arguments
        .as_object()
        .and_then(|map| map.values().find_map(serde_json::Value::as_str))
        .map(|text| truncate(text, PREVIEW_CHARS))
        .unwrap_or_default()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}…", cut.trim_end())
}
