//! Test doubles: a scripted provider, a resolver over scripted providers and
//! a callback handler that records every event.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::callback::{CallbackEvent, CallbackHandler, EventKind};
use crate::error::{AgentError, Result};
use crate::message::ToolCallRequest;
use crate::provider::{
    Completion, CompletionRequest, CompletionStream, FinishReason, LlmProvider, ModelConfig,
    ProviderResolver, StreamChunk,
};

/// Final answer with no tool calls
pub fn reply(text: impl Into<String>) -> Completion {
    Completion {
        content: text.into(),
        finish_reason: Some(FinishReason::Stop),
        ..Completion::default()
    }
}

/// A single tool call with its raw argument text
pub fn call(name: impl Into<String>, arguments: impl Into<String>) -> Completion {
    calls(vec![(name.into(), arguments.into())])
}

/// Several tool calls in one assistant message
pub fn calls(requests: Vec<(String, String)>) -> Completion {
    Completion {
        tool_calls: requests
            .into_iter()
            .enumerate()
            .map(|(i, (name, arguments))| ToolCallRequest {
                id: format!("call_{i}_{name}"),
                name,
                arguments,
            })
            .collect(),
        finish_reason: Some(FinishReason::ToolUse),
        ..Completion::default()
    }
}

/// Provider that answers from a fixed script and records every request
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Completion>>,
    requests: Mutex<Vec<CompletionRequest>>,
    fragmented: bool,
}

impl ScriptedProvider {
    pub fn new(script: impl IntoIterator<Item = Completion>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            fragmented: false,
        }
    }

    /// Stream text word by word and tool arguments in two halves
    pub const fn fragmented(mut self) -> Self {
        self.fragmented = true;
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn remaining(&self) -> usize {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn next(&self, request: &CompletionRequest) -> Result<Completion> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| AgentError::Provider("script exhausted".into()))
    }
}

fn fragment(completion: Completion) -> Vec<StreamChunk> {
    let mut chunks = Vec::new();
    for word in completion.content.split_inclusive(' ') {
        chunks.push(StreamChunk::Text { delta: word.to_string() });
    }
    for (index, call) in completion.tool_calls.into_iter().enumerate() {
        let mid = call
            .arguments
            .char_indices()
            .nth(call.arguments.chars().count() / 2)
            .map_or(call.arguments.len(), |(i, _)| i);
        let (head, tail) = call.arguments.split_at(mid);
        chunks.push(StreamChunk::ToolCallDelta {
            index,
            id: Some(call.id),
            name: Some(call.name),
            arguments: head.to_string(),
        });
        chunks.push(StreamChunk::ToolCallDelta {
            index,
            id: None,
            name: None,
            arguments: tail.to_string(),
        });
    }
    chunks.push(StreamChunk::Done {
        usage: completion.usage,
        finish_reason: completion.finish_reason,
    });
    chunks
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        self.next(request)
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<CompletionStream> {
        let completion = self.next(request)?;
        let chunks = if self.fragmented {
            fragment(completion)
        } else {
            completion.into_chunks()
        };
        Ok(Box::pin(futures::stream::iter(
            chunks.into_iter().map(Ok).collect::<Vec<_>>(),
        )))
    }
}

/// Resolver that hands out scripted providers by exact model id
#[derive(Default)]
pub struct ScriptedResolver {
    providers: HashMap<String, Arc<ScriptedProvider>>,
    resolutions: AtomicUsize,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, model_id: impl Into<String>, provider: Arc<ScriptedProvider>) -> Self {
        self.providers.insert(model_id.into(), provider);
        self
    }

    /// How many agents have been built against this resolver
    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::SeqCst)
    }
}

impl ProviderResolver for ScriptedResolver {
    fn resolve(&self, model: &ModelConfig) -> Result<Arc<dyn LlmProvider>> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);
        self.providers
            .get(&model.model_id)
            .map(|p| Arc::clone(p) as Arc<dyn LlmProvider>)
            .ok_or_else(|| AgentError::Config(format!("no scripted provider for '{}'", model.model_id)))
    }
}

/// Callback handler that keeps every event in arrival order
#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<CallbackEvent>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CallbackEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Results of every finished tool call, in order
    pub fn tool_results(&self) -> Vec<(String, bool, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e.kind {
                EventKind::ToolInvocationResult {
                    name,
                    success,
                    output,
                    ..
                } => Some((name, success, output)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl CallbackHandler for RecordingHandler {
    async fn on_event(&self, event: CallbackEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
