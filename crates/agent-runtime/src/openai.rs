//! OpenAI-compatible Chat Completions backend
//!
//! Serves the `openrouter/` prefix. Any endpoint that speaks the OpenAI chat
//! completions dialect (function tools, `choices[].delta` streaming) works.

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role, ToolCallRequest},
    provider::{
        Completion, CompletionRequest, CompletionStream, FinishReason, LlmProvider, StreamChunk,
        TokenUsage,
    },
    tool::ToolSchema,
};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::sse::{SseEvent, ensure_success, request_error, sse_stream};

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const OPENROUTER_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Chat-completions provider
pub struct OpenAiCompatibleProvider {
    http: reqwest::Client,
    label: String,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        label: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            label: label.into(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Provider pointed at the OpenRouter endpoint
    pub fn openrouter(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openrouter", OPENROUTER_BASE_URL, api_key, model)
    }

    fn body(&self, request: &CompletionRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": request.options.model,
            "messages": messages_to_openai(&request.system_prompt, &request.messages),
            "max_tokens": request.options.max_tokens,
            "temperature": request.options.temperature,
        });
        if !request.tools.is_empty() {
            body["tools"] = tools_to_openai(&request.tools);
        }
        if !request.options.stop_sequences.is_empty() {
            body["stop"] = json!(request.options.stop_sequences);
        }
        if stream {
            body["stream"] = json!(true);
            body["stream_options"] = json!({ "include_usage": true });
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(url = %url, model = %body["model"], provider = %self.label, "sending LLM request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| request_error(&self.label, &e))?;
        ensure_success(&self.label, response).await
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.label
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.base_url);
        match self.http.get(&url).bearer_auth(&self.api_key).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) => {
                tracing::warn!(provider = %self.label, error = %e, "health check failed");
                Ok(false)
            }
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let response = self.send(&self.body(request, false)).await?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("{}: invalid response body: {e}", self.label)))?;
        parse_openai_response(&value)
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<CompletionStream> {
        let response = self.send(&self.body(request, true)).await?;
        let mut decoder = OpenAiChunkDecoder::default();
        Ok(sse_stream(response, move |event| decoder.decode(event)))
    }
}

/// Convert the system prompt and conversation window to the wire format
pub fn messages_to_openai(system_prompt: &str, messages: &[Message]) -> Vec<Value> {
    let mut wire = Vec::with_capacity(messages.len() + 1);
    if !system_prompt.is_empty() {
        wire.push(json!({ "role": "system", "content": system_prompt }));
    }

    for msg in messages {
        match msg.role {
            Role::System | Role::User => {
                wire.push(json!({ "role": msg.role.to_string(), "content": msg.content }));
            }
            Role::Assistant if msg.tool_calls.is_empty() => {
                wire.push(json!({ "role": "assistant", "content": msg.content }));
            }
            Role::Assistant => {
                let tool_calls: Vec<Value> = msg
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": { "name": tc.name, "arguments": tc.arguments },
                        })
                    })
                    .collect();
                let mut m = json!({ "role": "assistant", "tool_calls": tool_calls });
                if !msg.content.is_empty() {
                    m["content"] = json!(msg.content);
                }
                wire.push(m);
            }
            Role::Tool => {
                wire.push(json!({
                    "role": "tool",
                    "tool_call_id": msg.tool_call_id,
                    "content": msg.content,
                }));
            }
        }
    }

    wire
}

/// Wrap each tool as `{"type": "function", "function": {...}}`
pub fn tools_to_openai(tools: &[ToolSchema]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.json_schema(),
                    }
                })
            })
            .collect(),
    )
}

fn finish_reason(reason: &str) -> FinishReason {
    match reason {
        "length" => FinishReason::Length,
        "tool_calls" | "function_call" => FinishReason::ToolUse,
        "content_filter" => FinishReason::ContentFilter,
        "error" => FinishReason::Error,
        _ => FinishReason::Stop,
    }
}

fn usage_from(value: &Value) -> Option<TokenUsage> {
    let usage = value.get("usage").filter(|u| !u.is_null())?;
    let count = |key: &str| {
        usage[key]
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    };
    Some(TokenUsage {
        prompt_tokens: count("prompt_tokens"),
        completion_tokens: count("completion_tokens"),
        total_tokens: count("total_tokens"),
    })
}

/// Parse a non-streaming response. Tool-call arguments stay as raw text.
pub fn parse_openai_response(v: &Value) -> Result<Completion> {
    if let Some(error) = v.get("error").filter(|e| !e.is_null()) {
        return Err(AgentError::Provider(error["message"].as_str().unwrap_or("unknown error").to_owned()));
    }

    let choice = &v["choices"][0];
    let message = &choice["message"];
    if message.is_null() {
        return Err(AgentError::Provider("missing `choices[0].message` in response".into()));
    }

    let tool_calls = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .map(|tc| ToolCallRequest {
                    id: tc["id"]
                        .as_str()
                        .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_owned),
                    name: tc["function"]["name"].as_str().unwrap_or_default().to_owned(),
                    arguments: tc["function"]["arguments"].as_str().unwrap_or_default().to_owned(),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Completion {
        content: message["content"].as_str().unwrap_or_default().to_owned(),
        tool_calls,
        model: v["model"].as_str().unwrap_or_default().to_owned(),
        usage: usage_from(v),
        finish_reason: choice["finish_reason"].as_str().map(finish_reason),
    })
}

/// Turns `choices[].delta` payloads into stream chunks
#[derive(Debug, Default)]
pub struct OpenAiChunkDecoder {
    usage: Option<TokenUsage>,
    finish_reason: Option<FinishReason>,
    done: bool,
}

impl OpenAiChunkDecoder {
    pub fn decode(&mut self, event: &SseEvent) -> Result<Vec<StreamChunk>> {
        let data = event.data.trim();
        if self.done {
            return Ok(Vec::new());
        }
        if data == "[DONE]" {
            self.done = true;
            return Ok(vec![StreamChunk::Done {
                usage: self.usage.take(),
                finish_reason: self.finish_reason.take(),
            }]);
        }

        let v: Value = serde_json::from_str(data)
            .map_err(|e| AgentError::Provider(format!("invalid JSON in SSE data: {e}")))?;
        if let Some(error) = v.get("error").filter(|e| !e.is_null()) {
            return Err(AgentError::Provider(
                error["message"].as_str().unwrap_or("stream error").to_owned(),
            ));
        }

        if let Some(usage) = usage_from(&v) {
            self.usage = Some(usage);
        }

        let choice = &v["choices"][0];
        if let Some(reason) = choice["finish_reason"].as_str() {
            self.finish_reason = Some(finish_reason(reason));
        }

        let delta = &choice["delta"];
        let mut chunks = Vec::new();
        if let Some(content) = delta["content"].as_str().filter(|c| !c.is_empty()) {
            chunks.push(StreamChunk::Text { delta: content.to_owned() });
        }
        if let Some(tool_calls) = delta["tool_calls"].as_array() {
            for tc in tool_calls {
                let index = tc["index"]
                    .as_u64()
                    .and_then(|i| usize::try_from(i).ok())
                    .unwrap_or(0);
                chunks.push(StreamChunk::ToolCallDelta {
                    index,
                    id: tc["id"].as_str().map(str::to_owned),
                    name: tc["function"]["name"].as_str().map(str::to_owned),
                    arguments: tc["function"]["arguments"].as_str().unwrap_or_default().to_owned(),
                });
            }
        }
        Ok(chunks)
    }
}
