//! Backend Registry
//!
//! Maps model-id prefixes to backend constructors. Selection is a pure
//! function of the prefix; unknown prefixes fail with a configuration error
//! before any network activity. Built providers are cached and shared by
//! every agent using the same model settings.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use agent_core::{
    error::{AgentError, Result},
    provider::{LlmProvider, ModelConfig, ProviderResolver},
};

use crate::anthropic::{ANTHROPIC_API_KEY_ENV, AnthropicProvider};
use crate::openai::{OPENROUTER_API_KEY_ENV, OPENROUTER_BASE_URL, OpenAiCompatibleProvider};

/// Which adapter family serves a model id
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BackendKind {
    OpenRouter,
    Anthropic,
    Ollama,
    Custom(String),
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenRouter => write!(f, "openrouter"),
            Self::Anthropic => write!(f, "anthropic"),
            Self::Ollama => write!(f, "ollama"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Builds a provider from the model settings and the wire model name
pub type BackendConstructor =
    Arc<dyn Fn(&ModelConfig, &str) -> Result<Arc<dyn LlmProvider>> + Send + Sync>;

#[derive(Clone)]
struct BackendEntry {
    prefix: String,
    kind: BackendKind,
    credentials_env: Option<&'static str>,
    build: BackendConstructor,
}

/// Prefix-keyed registry of backend constructors
pub struct BackendRegistry {
    entries: Vec<BackendEntry>,
    cache: RwLock<HashMap<String, Arc<dyn LlmProvider>>>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("prefixes", &self.prefixes())
            .finish_non_exhaustive()
    }
}

impl BackendRegistry {
    /// Registry with no backends
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with the `openrouter/`, `anthropic/` and (feature-gated) `ollama/` backends
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register_with_credentials(
            "openrouter/",
            BackendKind::OpenRouter,
            Some(OPENROUTER_API_KEY_ENV),
            |config, model| {
                let key = api_key(config, OPENROUTER_API_KEY_ENV)?;
                let base_url = config.base_url.as_deref().unwrap_or(OPENROUTER_BASE_URL);
                Ok(Arc::new(OpenAiCompatibleProvider::new("openrouter", base_url, key, model)))
            },
        );
        registry.register_with_credentials(
            "anthropic/",
            BackendKind::Anthropic,
            Some(ANTHROPIC_API_KEY_ENV),
            |config, model| {
                let key = api_key(config, ANTHROPIC_API_KEY_ENV)?;
                Ok(Arc::new(match config.base_url.as_deref() {
                    Some(url) => AnthropicProvider::with_base_url(url, key, model),
                    None => AnthropicProvider::new(key, model),
                }))
            },
        );
        #[cfg(feature = "ollama")]
        registry.register("ollama/", BackendKind::Ollama, |config, model| {
            let ollama_config = match config.base_url.as_deref() {
                Some(url) => crate::ollama::OllamaConfig { url: url.to_owned() },
                None => crate::ollama::OllamaConfig::from_env(),
            };
            Ok(Arc::new(crate::ollama::OllamaProvider::from_config(&ollama_config, model)?))
        });
        registry
    }

    /// Add a backend for a prefix; a later registration of the same prefix replaces the earlier one
    pub fn register<F>(&mut self, prefix: impl Into<String>, kind: BackendKind, build: F)
    where
        F: Fn(&ModelConfig, &str) -> Result<Arc<dyn LlmProvider>> + Send + Sync + 'static,
    {
        self.register_with_credentials(prefix, kind, None, build);
    }

    fn register_with_credentials<F>(
        &mut self,
        prefix: impl Into<String>,
        kind: BackendKind,
        credentials_env: Option<&'static str>,
        build: F,
    ) where
        F: Fn(&ModelConfig, &str) -> Result<Arc<dyn LlmProvider>> + Send + Sync + 'static,
    {
        let prefix = prefix.into();
        self.entries.retain(|e| e.prefix != prefix);
        self.entries.push(BackendEntry {
            prefix,
            kind,
            credentials_env,
            build: Arc::new(build),
        });
    }

    /// Registered prefixes, in registration order
    pub fn prefixes(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.prefix.as_str()).collect()
    }

    /// Longest registered prefix matching the model id
    fn select(&self, model_id: &str) -> Result<&BackendEntry> {
        self.entries
            .iter()
            .filter(|e| model_id.starts_with(&e.prefix))
            .max_by_key(|e| e.prefix.len())
            .ok_or_else(|| {
                AgentError::Config(format!(
                    "unsupported model id '{model_id}': expected one of the prefixes {}",
                    self.prefixes().join(", ")
                ))
            })
    }

    /// Backend kind for a model id
    pub fn kind_for(&self, model_id: &str) -> Result<BackendKind> {
        self.select(model_id).map(|e| e.kind.clone())
    }

    /// Model name sent on the wire: the id with its routing prefix removed
    pub fn wire_model<'a>(&self, model_id: &'a str) -> Result<&'a str> {
        let entry = self.select(model_id)?;
        let model = &model_id[entry.prefix.len()..];
        if model.is_empty() {
            return Err(AgentError::Config(format!(
                "model id '{model_id}' names no model after the prefix"
            )));
        }
        Ok(model)
    }

    /// Environment variable holding the credentials for this config, if the backend needs one
    pub fn credentials_env(&self, config: &ModelConfig) -> Result<Option<String>> {
        let entry = self.select(&config.model_id)?;
        Ok(entry
            .credentials_env
            .map(|default| config.credentials_ref.clone().unwrap_or_else(|| default.to_owned())))
    }

    /// Check a config without building anything: known prefix, non-empty model, credentials present
    pub fn validate(&self, config: &ModelConfig) -> Result<()> {
        self.wire_model(&config.model_id)?;
        if let Some(var) = self.credentials_env(config)? {
            if std::env::var(&var).map_or(true, |v| v.trim().is_empty()) {
                return Err(AgentError::Config(format!(
                    "{} requires the environment variable {var}",
                    config.model_id
                )));
            }
        }
        Ok(())
    }

    /// Construct a new, uncached provider
    pub fn build(&self, config: &ModelConfig) -> Result<Arc<dyn LlmProvider>> {
        let entry = self.select(&config.model_id)?;
        let model = self.wire_model(&config.model_id)?;
        tracing::debug!(model_id = %config.model_id, backend = %entry.kind, "building provider");
        (entry.build)(config, model)
    }
}

fn cache_key(config: &ModelConfig) -> String {
    format!(
        "{}|{}|{}",
        config.model_id,
        config.credentials_ref.as_deref().unwrap_or_default(),
        config.base_url.as_deref().unwrap_or_default()
    )
}

fn api_key(config: &ModelConfig, default_env: &str) -> Result<String> {
    let var = config.credentials_ref.as_deref().unwrap_or(default_env);
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(AgentError::Config(format!(
            "{} requires the environment variable {var}",
            config.model_id
        ))),
    }
}

impl ProviderResolver for BackendRegistry {
    fn resolve(&self, config: &ModelConfig) -> Result<Arc<dyn LlmProvider>> {
        let key = cache_key(config);
        if let Some(provider) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(provider));
        }

        let provider = self.build(config)?;
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(key).or_insert(provider)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::testing::ScriptedProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scripted_registry(builds: Arc<AtomicUsize>) -> BackendRegistry {
        let mut registry = BackendRegistry::empty();
        registry.register("fake/", BackendKind::Custom("fake".into()), move |_, _| {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(ScriptedProvider::new([])))
        });
        registry
    }

    #[test]
    fn selection_is_a_pure_function_of_the_prefix() {
        let registry = BackendRegistry::with_defaults();
        for _ in 0..3 {
            assert_eq!(registry.kind_for("openrouter/mistralai/devstral-small").unwrap(), BackendKind::OpenRouter);
            assert_eq!(registry.kind_for("anthropic/claude-sonnet-4").unwrap(), BackendKind::Anthropic);
        }
        assert_eq!(
            registry.wire_model("openrouter/mistralai/devstral-small").unwrap(),
            "mistralai/devstral-small"
        );
    }

    #[test]
    fn unknown_prefix_is_a_configuration_error() {
        let registry = BackendRegistry::with_defaults();
        for id in ["gpt-4o", "bedrock/claude", "", "OpenRouter/x", "openrouter"] {
            let err = registry.build(&ModelConfig::new(id)).err().unwrap();
            assert!(matches!(err, AgentError::Config(_)), "{id}: {err:?}");
            assert!(err.is_fatal());
        }
    }

    #[test]
    fn longest_prefix_wins() {
        let mut registry = BackendRegistry::with_defaults();
        registry.register("openrouter/local/", BackendKind::Custom("local".into()), |_, _| {
            Ok(Arc::new(ScriptedProvider::new([])))
        });
        assert_eq!(
            registry.kind_for("openrouter/local/phi").unwrap(),
            BackendKind::Custom("local".into())
        );
        assert_eq!(registry.kind_for("openrouter/meta/llama").unwrap(), BackendKind::OpenRouter);
        assert_eq!(registry.wire_model("openrouter/local/phi").unwrap(), "phi");
    }

    #[test]
    fn empty_model_name_is_rejected() {
        let registry = BackendRegistry::with_defaults();
        assert!(registry.wire_model("anthropic/").is_err());
    }

    #[test]
    fn missing_credentials_fail_before_any_request() {
        let registry = BackendRegistry::with_defaults();
        let mut config = ModelConfig::new("openrouter/mistralai/devstral-small");
        config.credentials_ref = Some("CONCIERGE_TEST_KEY_THAT_IS_NEVER_SET".into());
        let err = registry.resolve(&config).err().unwrap();
        assert!(err.to_string().contains("CONCIERGE_TEST_KEY_THAT_IS_NEVER_SET"));
        assert!(registry.validate(&config).is_err());
    }

    #[test]
    fn resolved_providers_are_cached() {
        let builds = Arc::new(AtomicUsize::new(0));
        let registry = scripted_registry(Arc::clone(&builds));
        let config = ModelConfig::new("fake/model");
        let a = registry.resolve(&config).unwrap();
        let b = registry.resolve(&config).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);

        registry.resolve(&ModelConfig::new("fake/other")).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }
}
