//! Anthropic Messages API backend
//!
//! Serves the `anthropic/` prefix. The system prompt travels as the
//! top-level `system` field; tool results go back as `tool_result` blocks
//! inside a user turn.

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
use std::collections::HashMap;

use crate::sse::{SseEvent, ensure_success, request_error, sse_stream};

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Stands in for the user turn when the window starts with an assistant message
const CONTINUATION_PROMPT: &str = "(continuing the conversation)";

pub struct AnthropicProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(ANTHROPIC_BASE_URL, api_key, model)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn body(&self, request: &CompletionRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": request.options.model,
            "max_tokens": request.options.max_tokens,
            "temperature": request.options.temperature,
            "messages": messages_to_anthropic(&request.messages),
        });
        if !request.system_prompt.is_empty() {
            body["system"] = json!(request.system_prompt);
        }
        if !request.tools.is_empty() {
            body["tools"] = tools_to_anthropic(&request.tools);
        }
        if !request.options.stop_sequences.is_empty() {
            body["stop_sequences"] = json!(request.options.stop_sequences);
        }
        if stream {
            body["stream"] = json!(true);
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/v1/messages", self.base_url);
        tracing::debug!(url = %url, model = %body["model"], provider = "anthropic", "sending LLM request");

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| request_error("anthropic", &e))?;
        ensure_success("anthropic", response).await
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/v1/models", self.base_url);
        let result = self
            .http
            .get(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await;
        match result {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) => {
                tracing::warn!(provider = "anthropic", error = %e, "health check failed");
                Ok(false)
            }
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let response = self.send(&self.body(request, false)).await?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("anthropic: invalid response body: {e}")))?;
        parse_anthropic_response(&value)
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<CompletionStream> {
        let response = self.send(&self.body(request, true)).await?;
        let mut decoder = AnthropicEventDecoder::default();
        Ok(sse_stream(response, move |event| decoder.decode(event)))
    }
}

/// Convert the conversation window to Messages API turns.
///
/// Consecutive tool results are merged into one user turn, and a synthetic
/// user turn is inserted when the window does not start with one.
pub fn messages_to_anthropic(messages: &[Message]) -> Vec<Value> {
    let mut wire: Vec<Value> = Vec::with_capacity(messages.len() + 1);

    for msg in messages {
        match msg.role {
            // The system prompt is sent separately; stray system messages become user context.
            Role::System | Role::User => {
                wire.push(json!({ "role": "user", "content": msg.content }));
            }
            Role::Assistant => {
                let mut content: Vec<Value> = Vec::new();
                if !msg.content.is_empty() {
                    content.push(json!({ "type": "text", "text": msg.content }));
                }
                for tc in &msg.tool_calls {
                    content.push(json!({
                        "type": "tool_use",
                        "id": tc.id,
                        "name": tc.name,
                        "input": tool_input(&tc.arguments),
                    }));
                }
                if content.is_empty() {
                    continue;
                }
                wire.push(json!({ "role": "assistant", "content": content }));
            }
            Role::Tool => {
                let block = json!({
                    "type": "tool_result",
                    "tool_use_id": msg.tool_call_id,
                    "content": msg.content,
                });
                let merged = wire.last_mut().and_then(|last| {
                    let is_results = last["role"] == "user"
                        && last["content"]
                            .as_array()
                            .is_some_and(|c| c.iter().all(|b| b["type"] == "tool_result"));
                    if is_results {
                        last["content"].as_array_mut()
                    } else {
                        None
                    }
                });
                match merged {
                    Some(blocks) => blocks.push(block),
                    None => wire.push(json!({ "role": "user", "content": [block] })),
                }
            }
        }
    }

    if wire.first().is_some_and(|m| m["role"] != "user") {
        wire.insert(0, json!({ "role": "user", "content": CONTINUATION_PROMPT }));
    }

    wire
}

/// Tool inputs must be JSON objects; malformed argument text becomes `{}`
fn tool_input(arguments: &str) -> Value {
    match serde_json::from_str::<Value>(arguments) {
        Ok(v @ Value::Object(_)) => v,
        _ => json!({}),
    }
}

pub fn tools_to_anthropic(tools: &[ToolSchema]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.json_schema(),
                })
            })
            .collect(),
    )
}

fn stop_reason(reason: &str) -> FinishReason {
    match reason {
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolUse,
        "refusal" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

fn token_count(value: &Value) -> u32 {
    value.as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(0)
}

/// Parse a non-streaming Messages API response
pub fn parse_anthropic_response(v: &Value) -> Result<Completion> {
    if v["type"] == "error" {
        return Err(AgentError::Provider(
            v["error"]["message"].as_str().unwrap_or("unknown error").to_owned(),
        ));
    }

    let blocks = v["content"]
        .as_array()
        .ok_or_else(|| AgentError::Provider("missing `content` array in response".into()))?;

    let mut content = String::new();
    let mut tool_calls = Vec::new();
    for block in blocks {
        match block["type"].as_str() {
            Some("text") => content.push_str(block["text"].as_str().unwrap_or_default()),
            Some("tool_use") => tool_calls.push(ToolCallRequest {
                id: block["id"].as_str().unwrap_or_default().to_owned(),
                name: block["name"].as_str().unwrap_or_default().to_owned(),
                arguments: block["input"].to_string(),
            }),
            _ => {}
        }
    }

    let prompt_tokens = token_count(&v["usage"]["input_tokens"]);
    let completion_tokens = token_count(&v["usage"]["output_tokens"]);

    Ok(Completion {
        content,
        tool_calls,
        model: v["model"].as_str().unwrap_or_default().to_owned(),
        usage: Some(TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }),
        finish_reason: v["stop_reason"].as_str().map(stop_reason),
    })
}

/// Maps Messages API stream events onto stream chunks.
///
/// Content blocks are indexed across text and tool-use blocks; tool calls
/// get their own dense index.
#[derive(Debug, Default)]
pub struct AnthropicEventDecoder {
    tool_index: HashMap<u64, usize>,
    input_tokens: u32,
    output_tokens: u32,
    stop_reason: Option<FinishReason>,
}

impl AnthropicEventDecoder {
    pub fn decode(&mut self, event: &SseEvent) -> Result<Vec<StreamChunk>> {
        let v: Value = serde_json::from_str(&event.data)
            .map_err(|e| AgentError::Provider(format!("invalid JSON in SSE data: {e}")))?;

        let kind = v["type"]
            .as_str()
            .or(event.event.as_deref())
            .unwrap_or_default();

        match kind {
            "message_start" => {
                self.input_tokens = token_count(&v["message"]["usage"]["input_tokens"]);
                Ok(Vec::new())
            }
            "content_block_start" => {
                let block = &v["content_block"];
                match block["type"].as_str() {
                    Some("tool_use") => {
                        let next = self.tool_index.len();
                        let index = *self
                            .tool_index
                            .entry(v["index"].as_u64().unwrap_or(0))
                            .or_insert(next);
                        Ok(vec![StreamChunk::ToolCallDelta {
                            index,
                            id: block["id"].as_str().map(str::to_owned),
                            name: block["name"].as_str().map(str::to_owned),
                            arguments: String::new(),
                        }])
                    }
                    Some("text") => Ok(block["text"]
                        .as_str()
                        .filter(|t| !t.is_empty())
                        .map(|t| vec![StreamChunk::Text { delta: t.to_owned() }])
                        .unwrap_or_default()),
                    _ => Ok(Vec::new()),
                }
            }
            "content_block_delta" => {
                let delta = &v["delta"];
                match delta["type"].as_str() {
                    Some("text_delta") => Ok(vec![StreamChunk::Text {
                        delta: delta["text"].as_str().unwrap_or_default().to_owned(),
                    }]),
                    Some("input_json_delta") => {
                        let block = v["index"].as_u64().unwrap_or(0);
                        let Some(&index) = self.tool_index.get(&block) else {
                            tracing::warn!(block, "input delta for unknown content block");
                            return Ok(Vec::new());
                        };
                        Ok(vec![StreamChunk::ToolCallDelta {
                            index,
                            id: None,
                            name: None,
                            arguments: delta["partial_json"].as_str().unwrap_or_default().to_owned(),
                        }])
                    }
                    other => {
                        tracing::trace!(delta_type = ?other, "ignoring delta");
                        Ok(Vec::new())
                    }
                }
            }
            "message_delta" => {
                if let Some(reason) = v["delta"]["stop_reason"].as_str() {
                    self.stop_reason = Some(stop_reason(reason));
                }
                self.output_tokens = token_count(&v["usage"]["output_tokens"]);
                Ok(Vec::new())
            }
            "message_stop" => Ok(vec![StreamChunk::Done {
                usage: Some(TokenUsage {
                    prompt_tokens: self.input_tokens,
                    completion_tokens: self.output_tokens,
                    total_tokens: self.input_tokens + self.output_tokens,
                }),
                finish_reason: self.stop_reason.take(),
            }]),
            "error" => Err(AgentError::Provider(
                v["error"]["message"].as_str().unwrap_or("stream error").to_owned(),
            )),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str, data: &str) -> SseEvent {
        SseEvent {
            event: Some(name.to_owned()),
            data: data.to_owned(),
        }
    }

    #[test]
    fn window_starting_with_assistant_gets_a_user_turn() {
        let messages = vec![Message::assistant("Earlier answer"), Message::user("and now?")];
        let wire = messages_to_anthropic(&messages);
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0]["role"], "user");
        assert_eq!(wire[1]["role"], "assistant");
    }

    #[test]
    fn consecutive_tool_results_share_one_user_turn() {
        let calls = vec![
            ToolCallRequest { id: "a".into(), name: "x".into(), arguments: "{}".into() },
            ToolCallRequest { id: "b".into(), name: "y".into(), arguments: "not json".into() },
        ];
        let messages = vec![
            Message::user("go"),
            Message::assistant("").with_tool_calls(calls),
            Message::tool("one", "a"),
            Message::tool("two", "b"),
        ];
        let wire = messages_to_anthropic(&messages);
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[1]["content"][1]["input"], json!({}));
        let results = wire[2]["content"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1]["tool_use_id"], "b");
    }

    #[test]
    fn stream_events_map_to_chunks() {
        let mut decoder = AnthropicEventDecoder::default();
        decoder
            .decode(&event("message_start", r#"{"type":"message_start","message":{"usage":{"input_tokens":20}}}"#))
            .unwrap();

        let text = decoder
            .decode(&event(
                "content_block_delta",
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Let me look."}}"#,
            ))
            .unwrap();
        assert_eq!(text, vec![StreamChunk::Text { delta: "Let me look.".into() }]);

        let start = decoder
            .decode(&event(
                "content_block_start",
                r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"search_book","input":{}}}"#,
            ))
            .unwrap();
        assert!(matches!(&start[0], StreamChunk::ToolCallDelta { index: 0, name: Some(n), .. } if n == "search_book"));

        let args = decoder
            .decode(&event(
                "content_block_delta",
                r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"title\": \"Du"}}"#,
            ))
            .unwrap();
        assert!(matches!(&args[0], StreamChunk::ToolCallDelta { index: 0, id: None, .. }));

        decoder
            .decode(&event(
                "message_delta",
                r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"},"usage":{"output_tokens":7}}"#,
            ))
            .unwrap();
        let done = decoder.decode(&event("message_stop", r#"{"type":"message_stop"}"#)).unwrap();
        assert_eq!(
            done,
            vec![StreamChunk::Done {
                usage: Some(TokenUsage { prompt_tokens: 20, completion_tokens: 7, total_tokens: 27 }),
                finish_reason: Some(FinishReason::ToolUse),
            }]
        );
    }

    #[test]
    fn error_events_fail_the_stream() {
        let mut decoder = AnthropicEventDecoder::default();
        let err = decoder
            .decode(&event("error", r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#))
            .unwrap_err();
        assert!(err.to_string().contains("Overloaded"));
    }

    #[test]
    fn non_streaming_tool_use_keeps_input_as_text() {
        let v = json!({
            "model": "claude-sonnet-4",
            "content": [
                { "type": "text", "text": "Checking." },
                { "type": "tool_use", "id": "toolu_2", "name": "get_events", "input": { "duration": "3" } }
            ],
            "stop_reason": "tool_use",
            "usage": { "input_tokens": 5, "output_tokens": 2 }
        });
        let completion = parse_anthropic_response(&v).unwrap();
        assert_eq!(completion.content, "Checking.");
        assert_eq!(completion.tool_calls[0].arguments, r#"{"duration":"3"}"#);
        assert_eq!(completion.usage.unwrap().total_tokens, 7);
    }
}
