//! Configuration loading and generator factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use lexiloop_core::daily::DailyConfig;
use lexiloop_core::queue::QueueLimits;
use lexiloop_core::review::ReviewServiceConfig;
use lexiloop_core::traits::ContentGenerator;

use crate::anthropic::AnthropicGenerator;
use crate::mock::MockGenerator;
use crate::openai::OpenAiGenerator;

/// Configuration for a single story generation backend.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
    },
    Anthropic {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    /// Offline generator returning a fixed story.
    Mock {
        #[serde(default)]
        text: Option<String>,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::OpenAI {
                api_key: _,
                base_url,
                org_id,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("org_id", org_id)
                .finish(),
            ProviderConfig::Anthropic {
                api_key: _,
                base_url,
            } => f
                .debug_struct("Anthropic")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Mock { text } => f.debug_struct("Mock").field("text", text).finish(),
        }
    }
}

/// Top-level lexiloop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiloopConfig {
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Provider used for daily stories.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Model passed to the provider.
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Max simultaneous story generations.
    #[serde(default = "default_generation_concurrency")]
    pub generation_concurrency: usize,
    /// Identical story requests answered from memory; 0 disables the cache.
    #[serde(default = "default_story_cache_capacity")]
    pub story_cache_capacity: usize,
    #[serde(default = "default_review_limit")]
    pub review_limit: usize,
    #[serde(default = "default_new_limit")]
    pub new_limit: usize,
    #[serde(default = "default_event_append_attempts")]
    pub event_append_attempts: u32,
    /// Delay before the first event-append retry, in milliseconds.
    #[serde(default = "default_event_retry_delay")]
    pub event_retry_delay_ms: u64,
    /// JSON snapshot the CLI reads and writes.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

fn default_provider() -> String {
    "anthropic".to_string()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_generation_concurrency() -> usize {
    2
}
fn default_story_cache_capacity() -> usize {
    32
}
fn default_review_limit() -> usize {
    20
}
fn default_new_limit() -> usize {
    10
}
fn default_event_append_attempts() -> u32 {
    3
}
fn default_event_retry_delay() -> u64 {
    50
}
fn default_store_path() -> PathBuf {
    PathBuf::from("./lexiloop-store.json")
}

impl Default for LexiloopConfig {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider(),
            default_model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            generation_concurrency: default_generation_concurrency(),
            story_cache_capacity: default_story_cache_capacity(),
            review_limit: default_review_limit(),
            new_limit: default_new_limit(),
            event_append_attempts: default_event_append_attempts(),
            event_retry_delay_ms: default_event_retry_delay(),
            store_path: default_store_path(),
        }
    }
}

impl LexiloopConfig {
    pub fn queue_limits(&self) -> QueueLimits {
        QueueLimits {
            review_limit: self.review_limit,
            new_limit: self.new_limit,
        }
    }

    pub fn review_config(&self) -> ReviewServiceConfig {
        ReviewServiceConfig {
            event_append_attempts: self.event_append_attempts,
            event_retry_delay: Duration::from_millis(self.event_retry_delay_ms),
        }
    }

    pub fn daily_config(&self) -> DailyConfig {
        DailyConfig {
            model: self.default_model.clone(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_provider_config(config: &ProviderConfig) -> ProviderConfig {
    match config {
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => ProviderConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
            org_id: org_id.as_ref().map(|o| resolve_env_vars(o)),
        },
        ProviderConfig::Anthropic { api_key, base_url } => ProviderConfig::Anthropic {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
        },
        ProviderConfig::Mock { text } => ProviderConfig::Mock { text: text.clone() },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `lexiloop.toml` in the current directory
/// 2. `~/.config/lexiloop/config.toml`
///
/// Environment variable overrides: `LEXILOOP_ANTHROPIC_KEY`, `LEXILOOP_OPENAI_KEY`.
pub fn load_config() -> Result<LexiloopConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<LexiloopConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("lexiloop.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<LexiloopConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => LexiloopConfig::default(),
    };

    apply_env_overrides(&mut config);

    config.providers = config
        .providers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_provider_config(v)))
        .collect();

    tracing::debug!(
        providers = config.providers.len(),
        default_provider = %config.default_provider,
        "configuration loaded"
    );
    Ok(config)
}

fn apply_env_overrides(config: &mut LexiloopConfig) {
    if let Ok(key) = std::env::var("LEXILOOP_ANTHROPIC_KEY") {
        let entry = config
            .providers
            .entry("anthropic".into())
            .or_insert(ProviderConfig::Anthropic {
                api_key: String::new(),
                base_url: None,
            });
        if let ProviderConfig::Anthropic { api_key, .. } = entry {
            *api_key = key;
        }
    }

    if let Ok(key) = std::env::var("LEXILOOP_OPENAI_KEY") {
        let entry = config
            .providers
            .entry("openai".into())
            .or_insert(ProviderConfig::OpenAI {
                api_key: String::new(),
                base_url: None,
                org_id: None,
            });
        if let ProviderConfig::OpenAI { api_key, .. } = entry {
            *api_key = key;
        }
    }
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("lexiloop"))
}

/// Create a generator from its configuration.
pub fn create_generator(
    name: &str,
    provider: &ProviderConfig,
    config: &LexiloopConfig,
) -> Result<Arc<dyn ContentGenerator>> {
    match provider {
        ProviderConfig::Anthropic { api_key, base_url } => {
            if api_key.is_empty() {
                anyhow::bail!("provider '{name}' has no API key");
            }
            Ok(Arc::new(AnthropicGenerator::new(
                api_key,
                base_url.clone(),
                config.max_tokens,
                config.temperature,
            )?))
        }
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => {
            if api_key.is_empty() {
                anyhow::bail!("provider '{name}' has no API key");
            }
            Ok(Arc::new(OpenAiGenerator::new(
                api_key,
                base_url.clone(),
                org_id.clone(),
                config.max_tokens,
                config.temperature,
            )?))
        }
        ProviderConfig::Mock { text } => Ok(Arc::new(match text {
            Some(text) => MockGenerator::with_fixed_response(text),
            None => MockGenerator::new(HashMap::new()),
        })),
    }
}
