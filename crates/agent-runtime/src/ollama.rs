//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference. Tool calling
//! uses the fenced-block text protocol: tool descriptions are appended to the
//! system prompt and calls are parsed back out of the reply.

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role, ToolCallRequest},
    provider::{Completion, CompletionRequest, FinishReason, GenerationOptions, LlmProvider, TokenUsage},
    tool::{parse_tool_block, render_tool_prompt},
};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, ChatMessageResponse, MessageRole, request::ChatMessageRequest},
    models::ModelOptions,
};

/// Ollama provider configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama base URL, including port
    pub url: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".into(),
        }
    }
}

impl OllamaConfig {
    /// Read `OLLAMA_HOST` / `OLLAMA_PORT`
    pub fn from_env() -> Self {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost".into());
        let host = if host.contains("://") {
            host
        } else {
            format!("http://{host}")
        };
        // OLLAMA_HOST may already carry a port
        let has_port = host
            .rsplit_once(':')
            .is_some_and(|(_, port)| port.chars().all(|c| c.is_ascii_digit()));
        let url = if has_port {
            host
        } else {
            let port = std::env::var("OLLAMA_PORT")
                .ok()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(11434);
            format!("{host}:{port}")
        };
        Self { url }
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: Ollama,
    model: String,
}

impl OllamaProvider {
    /// Create from configuration
    pub fn from_config(config: &OllamaConfig, model: impl Into<String>) -> Result<Self> {
        let client = Ollama::try_new(config.url.as_str())
            .map_err(|e| AgentError::Config(format!("invalid Ollama URL '{}': {e}", config.url)))?;
        Ok(Self {
            client,
            model: model.into(),
        })
    }

    /// Create from environment variables
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        Self::from_config(&OllamaConfig::from_env(), model)
    }

    /// Convert the request to Ollama chat messages.
    ///
    /// Tool calls and results are rendered as text since the model only sees
    /// the fenced-block protocol.
    fn convert_messages(request: &CompletionRequest) -> Vec<ChatMessage> {
        let mut system = request.system_prompt.clone();
        if !request.tools.is_empty() {
            system.push_str("\n\n");
            system.push_str(&render_tool_prompt(&request.tools));
        }

        let mut out = Vec::with_capacity(request.messages.len() + 1);
        if !system.trim().is_empty() {
            out.push(ChatMessage::new(MessageRole::System, system));
        }
        out.extend(request.messages.iter().map(Self::convert_message));
        out
    }

    fn convert_message(m: &Message) -> ChatMessage {
        match m.role {
            Role::System => ChatMessage::new(MessageRole::System, m.content.clone()),
            Role::User => ChatMessage::new(MessageRole::User, m.content.clone()),
            Role::Assistant => {
                let mut content = m.content.clone();
                for call in &m.tool_calls {
                    if !content.is_empty() {
                        content.push('\n');
                    }
                    content.push_str(&format!(
                        "```tool\n{{\"tool\": \"{}\", \"arguments\": {}}}\n```",
                        call.name,
                        if call.arguments.trim().is_empty() { "{}" } else { &call.arguments }
                    ));
                }
                ChatMessage::new(MessageRole::Assistant, content)
            }
            // Tools appear as user context
            Role::Tool => ChatMessage::new(MessageRole::User, format!("[Tool result]\n{}", m.content)),
        }
    }

    /// Convert Ollama response to agent completion
    fn convert_completion(response: ChatMessageResponse, model: &str) -> Completion {
        let usage = response.final_data.as_ref().map(|d| {
            let prompt = u32::try_from(d.prompt_eval_count).unwrap_or(u32::MAX);
            let completion = u32::try_from(d.eval_count).unwrap_or(u32::MAX);
            TokenUsage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt.saturating_add(completion),
            }
        });

        let text = response.message.content;
        match parse_tool_block(&text) {
            Some((name, arguments)) => {
                let before = text.find("```tool").map_or("", |i| text[..i].trim_end());
                Completion {
                    content: before.to_owned(),
                    tool_calls: vec![ToolCallRequest {
                        id: uuid::Uuid::new_v4().to_string(),
                        name,
                        arguments,
                    }],
                    model: model.to_owned(),
                    usage,
                    finish_reason: Some(FinishReason::ToolUse),
                }
            }
            None => Completion {
                content: text,
                tool_calls: Vec::new(),
                model: model.to_owned(),
                usage,
                finish_reason: Some(FinishReason::Stop),
            },
        }
    }

    /// Build Ollama model options
    fn build_options(opts: &GenerationOptions) -> ModelOptions {
        let options = ModelOptions::default()
            .temperature(opts.temperature)
            .num_predict(i32::try_from(opts.max_tokens).unwrap_or(i32::MAX));
        if opts.stop_sequences.is_empty() {
            options
        } else {
            options.stop(opts.stop_sequences.clone())
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(models) => Ok(models.iter().any(|m| m.name.starts_with(&self.model))),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let chat = ChatMessageRequest::new(request.options.model.clone(), Self::convert_messages(request))
            .options(Self::build_options(&request.options));

        let response = self
            .client
            .send_chat_messages(chat)
            .await
            .map_err(|e| AgentError::Provider(format!("ollama: {e}")))?;

        Ok(Self::convert_completion(response, &request.options.model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::provider::ModelConfig;
    use agent_core::tool::{ParameterSchema, ToolSchema};

    fn request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "You are helpful.".into(),
            messages: vec![
                Message::user("Hello"),
                Message::assistant("").with_tool_calls(vec![ToolCallRequest {
                    id: "1".into(),
                    name: "current_time".into(),
                    arguments: String::new(),
                }]),
                Message::tool("10:00", "1"),
            ],
            tools: vec![ToolSchema {
                name: "current_time".into(),
                description: "Get the time".into(),
                parameters: vec![ParameterSchema::optional("format", "string", "Format")],
                input_schema: None,
                category: None,
                has_side_effects: false,
            }],
            options: GenerationOptions::from_model(&ModelConfig::new("ollama/llama3.1"), "llama3.1"),
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.url, "http://localhost:11434");
    }

    #[test]
    fn test_message_conversion() {
        let converted = OllamaProvider::convert_messages(&request());
        assert_eq!(converted.len(), 4);
        assert!(converted[0].content.contains("### current_time"));
        assert!(converted[2].content.contains("```tool"));
        assert!(converted[3].content.starts_with("[Tool result]"));
    }

    #[test]
    fn tool_block_in_reply_becomes_a_call() {
        let response: ChatMessageResponse = serde_json::from_value(serde_json::json!({
            "model": "llama3.2",
            "created_at": "2024-01-01T00:00:00Z",
            "message": {
                "role": "assistant",
                "content": "Checking.\n```tool\n{\"tool\": \"current_time\", \"arguments\": {}}\n```"
            },
            "done": true
        }))
        .unwrap();
        let completion = OllamaProvider::convert_completion(response, "llama3.2");
        assert_eq!(completion.content, "Checking.");
        assert_eq!(completion.tool_calls[0].name, "current_time");
        assert_eq!(completion.tool_calls[0].arguments, "{}");
    }
}
