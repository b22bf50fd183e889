//! Routing Loop
//!
//! One agent turn: the model is called with the conversation window, its
//! output is streamed to the callback handler, any requested tools are run in
//! order and their results fed back, until the model answers without asking
//! for a tool.

use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::callback::{CallbackEvent, CallbackHandler, EventKind, NoopHandler};
use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message, ToolCallRequest};
use crate::provider::{
    CompletionRequest, CompletionStream, GenerationOptions, LlmProvider, ProviderResolver,
    StreamChunk,
};
use crate::spec::AgentSpec;
use crate::tool::{ToolCall, ToolContext, ToolResult};

/// Ceilings applied to every turn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoutingLimits {
    /// Deepest allowed delegation hop (root agent = 0)
    pub max_depth: usize,

    /// Model calls allowed within one turn of one agent
    pub max_iterations: usize,
}

impl Default for RoutingLimits {
    fn default() -> Self {
        Self {
            max_depth: 4,
            max_iterations: 10,
        }
    }
}

/// Process-wide services shared by every agent in the tree
pub struct AgentEnv {
    pub resolver: Arc<dyn ProviderResolver>,
    pub callbacks: Arc<dyn CallbackHandler>,
    pub limits: RoutingLimits,
}

impl AgentEnv {
    pub fn new(resolver: Arc<dyn ProviderResolver>, callbacks: Arc<dyn CallbackHandler>) -> Self {
        Self {
            resolver,
            callbacks,
            limits: RoutingLimits::default(),
        }
    }

    /// Environment that discards callback events
    pub fn silent(resolver: Arc<dyn ProviderResolver>) -> Self {
        Self::new(resolver, Arc::new(NoopHandler))
    }

    pub const fn with_limits(mut self, limits: RoutingLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// Tool call being assembled from stream fragments
#[derive(Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

/// What the model produced in one call
struct ModelTurn {
    text: String,
    calls: Vec<ToolCallRequest>,
}

/// An agent instance: a spec plus the conversation it owns
pub struct Agent {
    spec: Arc<AgentSpec>,
    env: Arc<AgentEnv>,
    provider: Arc<dyn LlmProvider>,
    conversation: Conversation,
}

impl Agent {
    /// Build a fresh agent with an empty window.
    ///
    /// Fails with `AgentError::Config` if no backend serves the spec's model id.
    pub fn new(spec: Arc<AgentSpec>, env: Arc<AgentEnv>) -> Result<Self> {
        let provider = env.resolver.resolve(&spec.model)?;
        let conversation = Conversation::new(spec.window_size);
        Ok(Self {
            spec,
            env,
            provider,
            conversation,
        })
    }

    /// Run one turn as the root of the tree
    pub async fn query(&mut self, input: &str) -> Result<String> {
        self.query_at_depth(input, 0).await
    }

    /// Run one turn at the given delegation depth
    pub async fn query_at_depth(&mut self, input: &str, depth: usize) -> Result<String> {
        let limits = self.env.limits;
        if depth > limits.max_depth {
            return Err(AgentError::RoutingTooDeep {
                depth,
                max: limits.max_depth,
            });
        }

        // Messages of this turn reach the window only once the model gives a
        // final answer. A turn that fails or is dropped mid-tool leaves the
        // window as it was, with no unanswered tool calls in it.
        let mut staged = vec![Message::user(input)];

        let ctx = ToolContext {
            depth,
            caller: self.spec.id.clone(),
            env: Arc::clone(&self.env),
        };
        let tools = self.spec.tools.schemas();

        for iteration in 1..=limits.max_iterations {
            let request = CompletionRequest {
                system_prompt: self.spec.system_prompt.clone(),
                messages: self.conversation.with_pending(&staged),
                tools: tools.clone(),
                options: self.generation_options(),
            };

            tracing::debug!(
                agent = %self.spec.id,
                depth,
                iteration,
                window = request.messages.len(),
                "calling model"
            );

            let turn = self.stream_turn(&request, depth).await?;

            staged.push(Message::assistant(&turn.text).with_tool_calls(turn.calls.clone()));
            self.emit(
                depth,
                EventKind::AssistantMessageComplete {
                    text: turn.text.clone(),
                },
            )
            .await;

            if turn.calls.is_empty() {
                self.conversation.extend(staged);
                return Ok(turn.text);
            }

            for request in &turn.calls {
                let result = self.run_tool(request, &ctx).await;
                self.emit(
                    depth,
                    EventKind::ToolInvocationResult {
                        id: request.id.clone(),
                        name: request.name.clone(),
                        success: result.success,
                        output: result.output.clone(),
                    },
                )
                .await;
                staged.push(Message::tool(result.to_model_content(), &request.id));
            }
        }

        tracing::warn!(agent = %self.spec.id, depth, max = limits.max_iterations, "turn did not converge");
        Err(AgentError::MaxIterations(limits.max_iterations))
    }

    fn generation_options(&self) -> GenerationOptions {
        GenerationOptions::from_model(&self.spec.model, self.provider.model())
    }

    async fn open_stream(&self, request: &CompletionRequest) -> Result<CompletionStream> {
        if self.spec.model.streaming_enabled {
            self.provider.complete_stream(request).await
        } else {
            let chunks: Vec<Result<StreamChunk>> = self
                .provider
                .complete(request)
                .await?
                .into_chunks()
                .into_iter()
                .map(Ok)
                .collect();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }

    /// Consume one model response, forwarding every fragment as it arrives
    async fn stream_turn(&self, request: &CompletionRequest, depth: usize) -> Result<ModelTurn> {
        let mut stream = self.open_stream(request).await?;
        let mut text = String::new();
        let mut pending: BTreeMap<usize, PendingCall> = BTreeMap::new();

        while let Some(chunk) = stream.next().await {
            match chunk? {
                StreamChunk::Text { delta } => {
                    if delta.is_empty() {
                        continue;
                    }
                    text.push_str(&delta);
                    self.emit(depth, EventKind::PartialAssistantText { text: delta })
                        .await;
                }
                StreamChunk::ToolCallDelta {
                    index,
                    id,
                    name,
                    arguments,
                } => {
                    let call = pending.entry(index).or_insert_with(|| PendingCall {
                        id: uuid::Uuid::new_v4().to_string(),
                        ..PendingCall::default()
                    });
                    if let Some(id) = id.filter(|id| !id.is_empty()) {
                        call.id = id;
                    }
                    if let Some(name) = name.filter(|n| !n.is_empty()) {
                        call.name = name;
                    }
                    call.arguments.push_str(&arguments);

                    if !call.name.is_empty() {
                        let event = EventKind::ToolInvocationStarted {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            raw_input: call.arguments.clone(),
                        };
                        self.emit(depth, event).await;
                    }
                }
                StreamChunk::Done { usage, .. } => {
                    if let Some(usage) = usage {
                        tracing::debug!(
                            agent = %self.spec.id,
                            prompt_tokens = usage.prompt_tokens,
                            completion_tokens = usage.completion_tokens,
                            "model call finished"
                        );
                    }
                    break;
                }
            }
        }

        let calls = pending
            .into_values()
            .filter(|c| !c.name.is_empty())
            .map(|c| ToolCallRequest {
                id: c.id,
                name: c.name,
                arguments: c.arguments,
            })
            .collect();

        Ok(ModelTurn { text, calls })
    }

    /// Parse and run one requested call; never fails
    async fn run_tool(&self, request: &ToolCallRequest, ctx: &ToolContext) -> ToolResult {
        match ToolCall::parse(&request.id, &request.name, &request.arguments) {
            Ok(call) => {
                tracing::debug!(agent = %self.spec.id, tool = %call.name, "executing tool");
                self.spec.tools.execute(&call, ctx).await
            }
            Err(e) => {
                tracing::warn!(agent = %self.spec.id, tool = %request.name, error = %e, "malformed tool arguments");
                ToolResult::failure(&request.name, e.to_string()).with_id(&request.id)
            }
        }
    }

    async fn emit(&self, depth: usize, kind: EventKind) {
        self.env
            .callbacks
            .on_event(CallbackEvent::new(&self.spec.id, depth, kind))
            .await;
    }

    /// Forget the conversation so far
    pub fn clear(&mut self) {
        self.conversation.clear();
    }

    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::DelegateTool;
    use crate::message::Role;
    use crate::provider::ModelConfig;
    use crate::testing::{RecordingHandler, ScriptedProvider, ScriptedResolver, call, calls, reply};
    use crate::tool::{DateTimeTool, Tool, ToolSchema};
    use std::time::Duration;

    fn env_with(resolver: ScriptedResolver, handler: Arc<RecordingHandler>) -> Arc<AgentEnv> {
        Arc::new(AgentEnv::new(Arc::new(resolver), handler))
    }

    fn clock_spec(model: &str) -> Arc<AgentSpec> {
        Arc::new(
            AgentSpec::builder("clock", ModelConfig::new(model))
                .description("Tells the time")
                .system_prompt("You tell the time.")
                .tool(DateTimeTool)
                .build()
                .unwrap(),
        )
    }

    /// A tool that outlives any reasonable turn
    struct StalledTool;

    #[async_trait::async_trait]
    impl Tool for StalledTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "stall".into(),
                description: "Takes far too long".into(),
                parameters: Vec::new(),
                input_schema: None,
                category: None,
                has_side_effects: false,
            }
        }

        async fn execute(&self, _call: &ToolCall, _ctx: &ToolContext) -> Result<ToolResult> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ToolResult::success("stall", "finally"))
        }
    }

    #[tokio::test]
    async fn plain_answer_ends_the_turn() {
        let provider = Arc::new(ScriptedProvider::new([reply("Hello there")]));
        let handler = Arc::new(RecordingHandler::new());
        let env = env_with(ScriptedResolver::new().with("m", provider.clone()), handler.clone());

        let mut agent = Agent::new(clock_spec("m"), env).unwrap();
        let answer = agent.query("hi").await.unwrap();

        assert_eq!(answer, "Hello there");
        assert_eq!(agent.conversation().len(), 2);
        let request = &provider.requests()[0];
        assert_eq!(request.system_prompt, "You tell the time.");
        assert_eq!(request.tools[0].name, "current_time");

        let kinds: Vec<_> = handler.events().into_iter().map(|e| e.kind).collect();
        assert!(matches!(kinds[0], EventKind::PartialAssistantText { .. }));
        assert!(matches!(kinds.last(), Some(EventKind::AssistantMessageComplete { .. })));
    }

    #[tokio::test]
    async fn tool_results_are_fed_back_before_the_next_call() {
        let provider = Arc::new(ScriptedProvider::new([
            call("current_time", r#"{"format": "unix"}"#),
            reply("It is late."),
        ]));
        let handler = Arc::new(RecordingHandler::new());
        let env = env_with(ScriptedResolver::new().with("m", provider.clone()), handler.clone());

        let mut agent = Agent::new(clock_spec("m"), env).unwrap();
        assert_eq!(agent.query("what time is it").await.unwrap(), "It is late.");

        let second = &provider.requests()[1];
        let roles: Vec<_> = second.messages.iter().map(|m| m.role.clone()).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool]);
        assert!(second.messages[2].content.parse::<i64>().is_ok());
        assert!(handler.tool_results()[0].1);
    }

    #[tokio::test]
    async fn malformed_arguments_become_a_tool_error_and_the_turn_completes() {
        for raw in [r#"{"format": "#, "[]", "not json at all"] {
            let provider = Arc::new(ScriptedProvider::new([
                call("current_time", raw),
                reply("Sorry, let me answer without the clock."),
            ]));
            let handler = Arc::new(RecordingHandler::new());
            let env = env_with(ScriptedResolver::new().with("m", provider.clone()), handler.clone());

            let mut agent = Agent::new(clock_spec("m"), env).unwrap();
            let answer = agent.query("time?").await.unwrap();
            assert!(answer.starts_with("Sorry"));

            let fed_back = &provider.requests()[1].messages[2];
            assert_eq!(fed_back.role, Role::Tool);
            let payload: serde_json::Value = serde_json::from_str(&fed_back.content).unwrap();
            assert_eq!(payload["status"], "error");
            assert!(!handler.tool_results()[0].1);
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_the_model() {
        let provider = Arc::new(ScriptedProvider::new([
            call("launch_rockets", "{}"),
            reply("I can't do that."),
        ]));
        let env = env_with(
            ScriptedResolver::new().with("m", provider.clone()),
            Arc::new(RecordingHandler::new()),
        );

        let mut agent = Agent::new(clock_spec("m"), env).unwrap();
        agent.query("launch").await.unwrap();
        let content = &provider.requests()[1].messages[2].content;
        assert!(content.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn fragmented_stream_is_reassembled_in_order() {
        let provider = Arc::new(
            ScriptedProvider::new([
                call("current_time", r#"{"format": "iso"}"#),
                reply("Done checking the clock"),
            ])
            .fragmented(),
        );
        let handler = Arc::new(RecordingHandler::new());
        let env = env_with(ScriptedResolver::new().with("m", provider), handler.clone());

        let mut agent = Agent::new(clock_spec("m"), env).unwrap();
        assert_eq!(agent.query("now").await.unwrap(), "Done checking the clock");

        let events = handler.events();
        let started: Vec<_> = events
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::ToolInvocationStarted { raw_input, .. } => Some(raw_input.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(started.len(), 2);
        assert!(serde_json::from_str::<serde_json::Value>(&started[0]).is_err());
        assert!(serde_json::from_str::<serde_json::Value>(&started[1]).is_ok());

        let text: String = events
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::PartialAssistantText { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "Done checking the clock");
    }

    #[tokio::test]
    async fn iteration_ceiling_stops_tool_loops() {
        let script = (0..5).map(|_| call("current_time", "{}"));
        let provider = Arc::new(ScriptedProvider::new(script));
        let env = Arc::new(
            AgentEnv::silent(Arc::new(ScriptedResolver::new().with("m", provider)))
                .with_limits(RoutingLimits { max_depth: 4, max_iterations: 3 }),
        );

        let mut agent = Agent::new(clock_spec("m"), env).unwrap();
        let err = agent.query("loop").await.unwrap_err();
        assert!(matches!(err, AgentError::MaxIterations(3)));
        assert!(agent.conversation().is_empty());
    }

    #[tokio::test]
    async fn turn_dropped_mid_tool_leaves_the_window_clean() {
        let provider = Arc::new(ScriptedProvider::new([call("stall", "{}"), reply("next answer")]));
        let env = env_with(
            ScriptedResolver::new().with("m", provider.clone()),
            Arc::new(RecordingHandler::new()),
        );
        let spec = Arc::new(
            AgentSpec::builder("staller", ModelConfig::new("m"))
                .tool(StalledTool)
                .build()
                .unwrap(),
        );
        let mut agent = Agent::new(spec, env).unwrap();

        let interrupted = tokio::time::timeout(Duration::from_millis(50), agent.query("first")).await;
        assert!(interrupted.is_err());
        assert!(agent.conversation().is_empty());

        assert_eq!(agent.query("second").await.unwrap(), "next answer");
        let window = &provider.requests()[1].messages;
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].content, "second");
        assert!(window.iter().all(|m| m.tool_calls.is_empty()));

        let roles: Vec<_> = agent.conversation().iter().map(|m| m.role.clone()).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn failed_turn_keeps_the_earlier_conversation() {
        let provider = Arc::new(ScriptedProvider::new([reply("first answer")]));
        let env = env_with(
            ScriptedResolver::new().with("m", provider),
            Arc::new(RecordingHandler::new()),
        );
        let mut agent = Agent::new(clock_spec("m"), env).unwrap();

        agent.query("one").await.unwrap();
        let err = agent.query("two").await.unwrap_err();
        assert!(matches!(err, AgentError::Provider(_)));

        let contents: Vec<_> = agent.conversation().iter().map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["one", "first answer"]);
    }

    #[tokio::test]
    async fn unknown_model_fails_at_construction() {
        let env = Arc::new(AgentEnv::silent(Arc::new(ScriptedResolver::new())));
        let err = Agent::new(clock_spec("nowhere/model"), env).err().unwrap();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn delegate_invocations_never_share_context() {
        let leaf = Arc::new(ScriptedProvider::new([reply("first answer"), reply("second answer")]));
        let root = Arc::new(ScriptedProvider::new([
            call("clock_agent_query", r#"{"query": "alpha"}"#),
            call("clock_agent_query", r#"{"query": "beta"}"#),
            reply("both done"),
        ]));
        let resolver = ScriptedResolver::new()
            .with("leaf", leaf.clone())
            .with("root", root.clone());
        let env = env_with(resolver, Arc::new(RecordingHandler::new()));

        let root_spec = Arc::new(
            AgentSpec::builder("root", ModelConfig::new("root"))
                .tool(DelegateTool::new(clock_spec("leaf")))
                .build()
                .unwrap(),
        );
        let mut agent = Agent::new(root_spec, env).unwrap();
        assert_eq!(agent.query("do two things").await.unwrap(), "both done");

        let leaf_requests = leaf.requests();
        assert_eq!(leaf_requests.len(), 2);
        for (request, query) in leaf_requests.iter().zip(["alpha", "beta"]) {
            assert_eq!(request.messages.len(), 1);
            assert_eq!(request.messages[0].content, query);
        }

        let root_second = &root.requests()[1];
        assert_eq!(root_second.messages[2].content, "first answer");
    }

    #[tokio::test]
    async fn delegate_events_carry_origin_and_depth() {
        let leaf = Arc::new(ScriptedProvider::new([reply("leaf says hi")]));
        let root = Arc::new(ScriptedProvider::new([
            call("clock_agent_query", r#"{"query": "hi"}"#),
            reply("relayed"),
        ]));
        let handler = Arc::new(RecordingHandler::new());
        let env = env_with(
            ScriptedResolver::new().with("leaf", leaf).with("root", root),
            handler.clone(),
        );

        let root_spec = Arc::new(
            AgentSpec::builder("root", ModelConfig::new("root"))
                .tool(DelegateTool::new(clock_spec("leaf")))
                .build()
                .unwrap(),
        );
        Agent::new(root_spec, env).unwrap().query("hi").await.unwrap();

        let nested: Vec<_> = handler.events().into_iter().filter(|e| e.depth == 1).collect();
        assert!(!nested.is_empty());
        assert!(nested.iter().all(|e| e.agent == "clock"));
    }

    #[tokio::test]
    async fn delegation_deeper_than_the_ceiling_is_a_tool_error() {
        // A chain of agents each delegating to the next, one level longer than allowed.
        let max_depth = 2;
        let mut providers = Vec::new();
        let mut resolver = ScriptedResolver::new();
        let mut spec = clock_spec("level3");
        for level in (0..=3).rev() {
            let provider = Arc::new(if level == 3 {
                ScriptedProvider::new([reply("unreachable")])
            } else {
                ScriptedProvider::new([
                    call(format!("{}_agent_query", spec.id), r#"{"query": "go deeper"}"#),
                    reply(format!("level {level} gave up")),
                ])
            });
            resolver = resolver.with(format!("level{level}"), provider.clone());
            providers.push(provider);
            if level < 3 {
                spec = Arc::new(
                    AgentSpec::builder(format!("level{level}"), ModelConfig::new(format!("level{level}")))
                        .tool(DelegateTool::new(spec))
                        .build()
                        .unwrap(),
                );
            }
        }
        let handler = Arc::new(RecordingHandler::new());
        let env = Arc::new(
            AgentEnv::new(Arc::new(resolver), handler.clone())
                .with_limits(RoutingLimits { max_depth, max_iterations: 10 }),
        );

        let answer = Agent::new(spec, env).unwrap().query("start").await.unwrap();
        assert_eq!(answer, "level 0 gave up");

        let failures: Vec<_> = handler
            .tool_results()
            .into_iter()
            .filter(|(_, success, _)| !success)
            .collect();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].2.to_lowercase().contains("routing too deep"));
        // The agent past the ceiling was never called.
        assert_eq!(providers[0].remaining(), 1);
    }

    #[tokio::test]
    async fn several_calls_in_one_message_run_in_order() {
        let provider = Arc::new(ScriptedProvider::new([
            calls(vec![
                ("current_time".into(), r#"{"format": "unix"}"#.into()),
                ("current_time".into(), r#"{"format": "iso"}"#.into()),
            ]),
            reply("ok"),
        ]));
        let env = env_with(
            ScriptedResolver::new().with("m", provider.clone()),
            Arc::new(RecordingHandler::new()),
        );
        Agent::new(clock_spec("m"), env).unwrap().query("t").await.unwrap();

        let messages = &provider.requests()[1].messages;
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("call_0_current_time"));
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_1_current_time"));
    }
}
