//! Speech Output
//!
//! The speech engine is an opaque collaborator: it turns text into audio
//! segments and plays them, blocking until playback finishes. The
//! [`SpeechService`] owns the single engine instance for the whole process.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use agent_core::error::{AgentError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Mutex;

/// A named blend of base voices
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub name: String,

    /// (voice, weight) pairs; weights sum to 1.0
    pub blend: Vec<(String, f32)>,

    /// Playback speed multiplier
    pub speed: f32,
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            name: "lewis_michael".into(),
            blend: vec![("bm_lewis".into(), 0.8), ("am_michael".into(), 0.2)],
            speed: 1.2,
        }
    }
}

impl VoiceProfile {
    /// The most heavily weighted base voice
    pub fn dominant_voice(&self) -> Option<&str> {
        self.blend
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(voice, _)| voice.as_str())
    }
}

/// Synthesized audio for one piece of text
#[derive(Clone, Debug)]
pub struct AudioSegment {
    pub text: String,
    /// WAV-encoded audio
    pub audio: Vec<u8>,
}

#[async_trait]
pub trait SpeechEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Turn text into playable segments
    async fn synthesize(&self, text: &str, voice: &VoiceProfile) -> Result<Vec<AudioSegment>>;

    /// Play one segment; returns when playback has finished
    async fn play(&self, segment: &AudioSegment) -> Result<()>;
}

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("'{command}' not found on PATH")]
    NotFound { command: String },

    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}: {stderr}")]
    Exit {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("'{command}' produced no audio")]
    NoAudio { command: String },

    #[error("audio pipe error: {0}")]
    Pipe(#[from] std::io::Error),
}

impl From<SpeechError> for AgentError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::NotFound { .. } => Self::SpeechInit(err.to_string()),
            other => Self::Speech(other.to_string()),
        }
    }
}

/// External synthesizer and player commands
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandEngineSettings {
    /// Synthesizer writing WAV to stdout (espeak-ng compatible flags)
    pub synth_command: String,
    pub synth_args: Vec<String>,

    /// Player reading WAV from stdin
    pub player_command: String,
    pub player_args: Vec<String>,

    /// Engine voice; derived from the voice profile when unset
    pub voice: Option<String>,

    /// Base speaking rate in words per minute, scaled by the profile speed
    pub words_per_minute: u32,
}

impl Default for CommandEngineSettings {
    fn default() -> Self {
        Self {
            synth_command: "espeak-ng".into(),
            synth_args: vec!["--stdout".into()],
            player_command: "aplay".into(),
            player_args: vec!["-q".into(), "-".into()],
            voice: None,
            words_per_minute: 160,
        }
    }
}

/// Speech engine driving external commands
#[derive(Debug)]
pub struct CommandSpeechEngine {
    settings: CommandEngineSettings,
    synth_path: PathBuf,
    player_path: PathBuf,
}

impl CommandSpeechEngine {
    /// Locate both commands; fails if either is missing
    pub fn new(settings: CommandEngineSettings) -> std::result::Result<Self, SpeechError> {
        let synth_path = find_command(&settings.synth_command)?;
        let player_path = find_command(&settings.player_command)?;
        Ok(Self {
            settings,
            synth_path,
            player_path,
        })
    }

    /// Engine voice for a profile: base voices are named `<lang><gender>_<name>`
    /// (`a` = American, `b` = British; `m`/`f`)
    pub fn engine_voice(&self, voice: &VoiceProfile) -> String {
        if let Some(v) = &self.settings.voice {
            return v.clone();
        }
        let dominant = voice.dominant_voice().unwrap_or_default();
        let mut chars = dominant.chars();
        let lang = match chars.next() {
            Some('a') => "en-us",
            Some('b') => "en-gb",
            _ => "en",
        };
        let variant = match chars.next() {
            Some('f') => "+f3",
            Some('m') => "+m3",
            _ => "",
        };
        format!("{lang}{variant}")
    }

    fn rate(&self, voice: &VoiceProfile) -> u32 {
        let scaled = f64::from(self.settings.words_per_minute) * f64::from(voice.speed);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rate = scaled.round().max(1.0) as u32;
        rate
    }
}

fn find_command(command: &str) -> std::result::Result<PathBuf, SpeechError> {
    let not_found = || SpeechError::NotFound {
        command: command.to_owned(),
    };
    let direct = Path::new(command);
    if direct.components().count() > 1 {
        return direct.is_file().then(|| direct.to_path_buf()).ok_or_else(not_found);
    }
    let path = std::env::var_os("PATH").ok_or_else(not_found)?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(command))
        .find(|candidate| candidate.is_file())
        .ok_or_else(not_found)
}

#[async_trait]
impl SpeechEngine for CommandSpeechEngine {
    fn name(&self) -> &str {
        &self.settings.synth_command
    }

    async fn synthesize(&self, text: &str, voice: &VoiceProfile) -> Result<Vec<AudioSegment>> {
        let engine_voice = self.engine_voice(voice);
        let rate = self.rate(voice).to_string();
        let mut segments = Vec::new();

        for part in text.lines().map(str::trim).filter(|p| !p.is_empty()) {
            let output = Command::new(&self.synth_path)
                .args(&self.settings.synth_args)
                .args(["-v", engine_voice.as_str(), "-s", rate.as_str()])
                .arg(part)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|source| SpeechError::Spawn {
                    command: self.settings.synth_command.clone(),
                    source,
                })?;

            if !output.status.success() {
                return Err(SpeechError::Exit {
                    command: self.settings.synth_command.clone(),
                    status: output.status,
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
                }
                .into());
            }
            if output.stdout.is_empty() {
                return Err(SpeechError::NoAudio {
                    command: self.settings.synth_command.clone(),
                }
                .into());
            }

            segments.push(AudioSegment {
                text: part.to_owned(),
                audio: output.stdout,
            });
        }

        Ok(segments)
    }

    async fn play(&self, segment: &AudioSegment) -> Result<()> {
        let mut child = Command::new(&self.player_path)
            .args(&self.settings.player_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SpeechError::Spawn {
                command: self.settings.player_command.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&segment.audio).await.map_err(SpeechError::from)?;
            stdin.shutdown().await.map_err(SpeechError::from)?;
        }

        let output = child.wait_with_output().await.map_err(SpeechError::from)?;
        if !output.status.success() {
            return Err(SpeechError::Exit {
                command: self.settings.player_command.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            }
            .into());
        }
        Ok(())
    }
}

enum SpeechState {
    Ready {
        engine: Arc<dyn SpeechEngine>,
        voice: VoiceProfile,
    },
    Unavailable(String),
    Shutdown,
}

/// What the service can currently do
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpeechStatus {
    Ready { engine: String },
    Unavailable { reason: String },
    Shutdown,
}

/// Owner of the process-wide speech engine.
///
/// The engine is built once by [`SpeechService::start`]; every call is
/// serialized through an async mutex so segments never overlap.
pub struct SpeechService {
    state: Mutex<SpeechState>,
}

impl SpeechService {
    /// Build the engine once. Construction failures are logged and leave the
    /// service unavailable so callers fall back to text.
    pub fn start<F>(factory: F, voice: VoiceProfile) -> Self
    where
        F: FnOnce() -> Result<Arc<dyn SpeechEngine>>,
    {
        let state = match factory() {
            Ok(engine) => {
                tracing::info!(engine = engine.name(), voice = %voice.name, "speech engine ready");
                SpeechState::Ready { engine, voice }
            }
            Err(e) => {
                let reason = match e {
                    AgentError::SpeechInit(reason) => reason,
                    other => other.to_string(),
                };
                tracing::warn!(%reason, "speech engine unavailable, continuing with text only");
                SpeechState::Unavailable(reason)
            }
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// Service that never speaks
    pub fn disabled(reason: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(SpeechState::Unavailable(reason.into())),
        }
    }

    pub async fn is_ready(&self) -> bool {
        matches!(*self.state.lock().await, SpeechState::Ready { .. })
    }

    pub async fn status(&self) -> SpeechStatus {
        match &*self.state.lock().await {
            SpeechState::Ready { engine, .. } => SpeechStatus::Ready {
                engine: engine.name().to_owned(),
            },
            SpeechState::Unavailable(reason) => SpeechStatus::Unavailable {
                reason: reason.clone(),
            },
            SpeechState::Shutdown => SpeechStatus::Shutdown,
        }
    }

    /// Synthesize and play `text`, returning after playback finishes.
    /// Does nothing when the service is not ready.
    pub async fn speak(&self, text: &str) -> Result<()> {
        let guard = self.state.lock().await;
        let SpeechState::Ready { engine, voice } = &*guard else {
            return Ok(());
        };
        if text.trim().is_empty() {
            return Ok(());
        }

        for segment in engine.synthesize(text, voice).await? {
            engine.play(&segment).await?;
        }
        Ok(())
    }

    /// Release the engine; later calls to `speak` are no-ops
    pub async fn shutdown(&self) {
        let mut guard = self.state.lock().await;
        if matches!(*guard, SpeechState::Ready { .. }) {
            tracing::debug!("speech engine shut down");
        }
        *guard = SpeechState::Shutdown;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeEngine {
        played: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl SpeechEngine for FakeEngine {
        fn name(&self) -> &str {
            "fake"
        }

        async fn synthesize(&self, text: &str, _voice: &VoiceProfile) -> Result<Vec<AudioSegment>> {
            Ok(text
                .lines()
                .map(|line| AudioSegment {
                    text: line.to_owned(),
                    audio: vec![0; 4],
                })
                .collect())
        }

        async fn play(&self, segment: &AudioSegment) -> Result<()> {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.played.lock().unwrap().push(segment.text.clone());
            Ok(())
        }
    }

    #[test]
    fn default_profile_is_the_lewis_michael_blend() {
        let voice = VoiceProfile::default();
        assert_eq!(voice.dominant_voice(), Some("bm_lewis"));
        assert!((voice.speed - 1.2).abs() < f32::EPSILON);
        let total: f32 = voice.blend.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn engine_voice_follows_the_dominant_base_voice() {
        let engine = CommandSpeechEngine {
            settings: CommandEngineSettings::default(),
            synth_path: PathBuf::from("espeak-ng"),
            player_path: PathBuf::from("aplay"),
        };
        assert_eq!(engine.engine_voice(&VoiceProfile::default()), "en-gb+m3");
        assert_eq!(engine.rate(&VoiceProfile::default()), 192);
    }

    #[test]
    fn missing_commands_are_an_init_error() {
        let settings = CommandEngineSettings {
            synth_command: "definitely-not-a-real-synthesizer".into(),
            ..CommandEngineSettings::default()
        };
        let err: AgentError = CommandSpeechEngine::new(settings).unwrap_err().into();
        assert!(matches!(err, AgentError::SpeechInit(_)));
    }

    #[tokio::test]
    async fn failed_start_leaves_service_unavailable() {
        let service = SpeechService::start(
            || Err(AgentError::SpeechInit("no audio device".into())),
            VoiceProfile::default(),
        );
        assert!(!service.is_ready().await);
        assert_eq!(
            service.status().await,
            SpeechStatus::Unavailable { reason: "no audio device".into() }
        );
        service.speak("hello").await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_speak_calls_do_not_interleave() {
        let engine = Arc::new(FakeEngine::default());
        let constructed = AtomicUsize::new(0);
        let service = Arc::new(SpeechService::start(
            || {
                constructed.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::clone(&engine) as Arc<dyn SpeechEngine>)
            },
            VoiceProfile::default(),
        ));

        let a = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.speak("a1\na2\na3").await }
        });
        let b = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.speak("b1\nb2\nb3").await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let played = engine.played.lock().unwrap().clone();
        let first = &played[0][..1];
        assert!(played[..3].iter().all(|p| p.starts_with(first)));
        assert_eq!(constructed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_releases_the_engine() {
        let engine = Arc::new(FakeEngine::default());
        let service = SpeechService::start(
            || Ok(Arc::clone(&engine) as Arc<dyn SpeechEngine>),
            VoiceProfile::default(),
        );
        assert!(service.is_ready().await);
        service.shutdown().await;
        service.speak("ignored").await.unwrap();
        assert!(engine.played.lock().unwrap().is_empty());
        assert_eq!(service.status().await, SpeechStatus::Shutdown);
        assert_eq!(Arc::strong_count(&engine), 1);
    }
}
