//! Interactive shell
//!
//! Reads one line at a time and either handles it as a session command or
//! sends it to the root agent. Turns run strictly one after another; Ctrl-C
//! during a turn abandons it and returns to the prompt.

use std::path::PathBuf;
use std::sync::Arc;

use agent_core::{Agent, AgentEnv, AgentError, ProviderResolver};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::render::TerminalRenderer;
use crate::report;
use crate::state::AppState;

/// One line of user input, classified
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShellCommand {
    Help,
    Audio(bool),
    Clear,
    Status,
    Exit,
    Query(String),
    Empty,
}

impl ShellCommand {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.to_lowercase().as_str() {
            "" => Self::Empty,
            "help" | "?" => Self::Help,
            "audio on" | "unmute" => Self::Audio(true),
            "audio off" | "mute" => Self::Audio(false),
            "clear" => Self::Clear,
            "status" => Self::Status,
            "exit" | "quit" | "bye" => Self::Exit,
            _ => Self::Query(trimmed.to_owned()),
        }
    }
}

/// Whether the loop keeps going after a command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Shell {
    state: AppState,
    config_path: PathBuf,
    renderer: Arc<TerminalRenderer>,
    agent: Agent,
}

impl Shell {
    pub fn new(
        state: AppState,
        config_path: PathBuf,
        resolver: Arc<dyn ProviderResolver>,
        renderer: Arc<TerminalRenderer>,
    ) -> anyhow::Result<Self> {
        let env = Arc::new(AgentEnv::new(resolver, renderer.clone()).with_limits(state.config.limits()));
        let agent = Agent::new(Arc::clone(&state.tree.root), env)?;
        Ok(Self {
            state,
            config_path,
            renderer,
            agent,
        })
    }

    /// Prompt until the user leaves or input closes
    pub async fn run(&mut self, minimal: bool) -> anyhow::Result<()> {
        if !minimal {
            print_banner();
            print_help();
        }
        println!("  Ready! What would you like to do?\n");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            prompt();
            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => {
                    println!("\n  Use 'exit' to quit.");
                    continue;
                }
            };
            let Some(line) = line else {
                println!();
                tracing::debug!("input closed");
                break;
            };

            if self.handle(ShellCommand::parse(&line)).await == Flow::Exit {
                break;
            }
        }

        println!("\n  Safe travels!\n");
        Ok(())
    }

    /// Execute one command
    pub async fn handle(&mut self, command: ShellCommand) -> Flow {
        match command {
            ShellCommand::Empty => {}
            ShellCommand::Help => print_help(),
            ShellCommand::Audio(enabled) => {
                self.state.preferences.set_audio(enabled);
                if !enabled {
                    println!("  Audio off");
                } else if self.state.speech.is_ready().await {
                    println!("  Audio on");
                } else {
                    println!("  Audio on, but speech is unavailable; replies stay text only");
                }
            }
            ShellCommand::Clear => {
                self.agent.clear();
                self.renderer.reset();
                print!("\x1b[2J\x1b[H");
                println!("  Conversation cleared.\n");
            }
            ShellCommand::Status => self.print_status().await,
            ShellCommand::Exit => return Flow::Exit,
            ShellCommand::Query(text) => self.turn(&text).await,
        }
        Flow::Continue
    }

    async fn turn(&mut self, text: &str) {
        tokio::select! {
            result = self.agent.query(text) => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "turn failed");
                    println!("  {}", e.user_message());
                    println!("  Try rephrasing your request or type 'help'.");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                self.renderer.reset();
                println!("\n  {}", AgentError::Interrupted.user_message());
            }
        }
        println!();
    }

    async fn print_status(&self) {
        let state = &self.state;
        print!("{}", report::config_summary(&state.config, &self.config_path, &state.registry));
        print!(
            "{}",
            report::session_summary(
                &state.speech.status().await,
                state.preferences.audio_enabled(),
                state.github.is_some(),
            )
        );
        println!();
    }
}

fn prompt() {
    use std::io::Write;
    print!("You > ");
    std::io::stdout().flush().ok();
}

fn print_banner() {
    println!();
    println!("  Concierge v{}", env!("CARGO_PKG_VERSION"));
    println!("  Work, leisure and everything in between");
    println!();
}

fn print_help() {
    println!("  Work       analyse a project · schedule coding time · GitHub issues");
    println!("  Leisure    what should I watch? · recommend a book · new videos");
    println!("  Planning   when am I free? · block focus time · schedule a meeting");
    println!("  Commands   help · audio on/off · clear · status · exit");
    println!();
}
