//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services.
//! Nothing in this crate reads process-wide environment variables during request handling.

use crate::constants::{
    DEFAULT_CACHE_DIR_NAME, DEFAULT_EMBEDDING_MODEL, OPENAI_BASE_URL, OPENAI_DEFAULT_MODEL,
    OPENROUTER_BASE_URL, OPENROUTER_DEFAULT_MODEL,
};
use crate::{NarrativeError, NarrativeResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Chat-completion provider. Both speak the OpenAI wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    #[default]
    OpenAi,
    OpenRouter,
}

impl LlmProvider {
    pub fn base_url(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => OPENAI_BASE_URL,
            LlmProvider::OpenRouter => OPENROUTER_BASE_URL,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => OPENAI_DEFAULT_MODEL,
            LlmProvider::OpenRouter => OPENROUTER_DEFAULT_MODEL,
        }
    }

    /// Environment variable the binaries read the provider's key from.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "OPENAI_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = NarrativeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "openai" => Ok(LlmProvider::OpenAi),
            "openrouter" => Ok(LlmProvider::OpenRouter),
            other => Err(NarrativeError::Config(format!(
                "unknown LLM_PROVIDER '{other}' (expected openai or openrouter)"
            ))),
        }
    }
}

/// Language-model settings.
#[derive(Clone)]
pub struct LlmConfig {
    provider: LlmProvider,
    api_key: String,
    base_url: String,
    chat_model: String,
    embedding_model: String,
}

impl LlmConfig {
    /// Create an `LlmConfig`, falling back to the provider's default models when none are given.
    pub fn new(
        provider: LlmProvider,
        api_key: String,
        chat_model: Option<String>,
        embedding_model: Option<String>,
    ) -> NarrativeResult<Self> {
        if api_key.trim().is_empty() {
            return Err(NarrativeError::Config(format!(
                "{} must be set",
                provider.api_key_var()
            )));
        }

        Ok(Self {
            provider,
            api_key,
            base_url: provider.base_url().to_string(),
            chat_model: non_blank(chat_model).unwrap_or_else(|| provider.default_model().into()),
            embedding_model: non_blank(embedding_model)
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.into()),
        })
    }

    /// Point the client at a different OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

/// Hosted auth/database project settings.
#[derive(Clone)]
pub struct SupabaseConfig {
    url: String,
    anon_key: String,
}

impl SupabaseConfig {
    pub fn new(url: String, anon_key: String) -> NarrativeResult<Self> {
        let url = url.trim().trim_end_matches('/').to_string();
        if url.is_empty() {
            return Err(NarrativeError::Config("SUPABASE_URL must be set".into()));
        }
        if anon_key.trim().is_empty() {
            return Err(NarrativeError::Config(
                "SUPABASE_ANON_KEY must be set".into(),
            ));
        }
        Ok(Self { url, anon_key })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }
}

impl fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .finish()
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    supabase: SupabaseConfig,
    llm: LlmConfig,
    cache_dir: PathBuf,
}

impl CoreConfig {
    pub fn new(supabase: SupabaseConfig, llm: LlmConfig, cache_dir: PathBuf) -> Self {
        Self {
            supabase,
            llm,
            cache_dir,
        }
    }

    pub fn supabase(&self) -> &SupabaseConfig {
        &self.supabase
    }

    pub fn llm(&self) -> &LlmConfig {
        &self.llm
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

/// Raw startup values, normally taken from the process environment by a binary.
#[derive(Debug, Clone, Default)]
pub struct ConfigInputs {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub llm_provider: Option<String>,
    pub openai_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub embedding_model: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub home_dir: Option<PathBuf>,
}

impl ConfigInputs {
    /// Read the inputs from the environment. Call once at startup, after loading `.env`.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self {
            supabase_url: var("SUPABASE_URL"),
            supabase_anon_key: var("SUPABASE_ANON_KEY"),
            llm_provider: var("LLM_PROVIDER"),
            openai_api_key: var("OPENAI_API_KEY"),
            openrouter_api_key: var("OPENROUTER_API_KEY"),
            llm_model: var("LLM_MODEL"),
            embedding_model: var("OPENAI_EMBEDDING_MODEL"),
            cache_dir: var("EZN_CACHE_DIR").map(PathBuf::from),
            home_dir: std::env::var_os("HOME")
                .or_else(|| std::env::var_os("USERPROFILE"))
                .map(PathBuf::from),
        }
    }
}

impl TryFrom<ConfigInputs> for CoreConfig {
    type Error = NarrativeError;

    fn try_from(inputs: ConfigInputs) -> NarrativeResult<Self> {
        let supabase = SupabaseConfig::new(
            inputs.supabase_url.unwrap_or_default(),
            inputs.supabase_anon_key.unwrap_or_default(),
        )?;

        let provider: LlmProvider = inputs.llm_provider.unwrap_or_default().parse()?;
        let api_key = match provider {
            LlmProvider::OpenAi => inputs.openai_api_key,
            LlmProvider::OpenRouter => inputs.openrouter_api_key,
        };
        let llm = LlmConfig::new(
            provider,
            api_key.unwrap_or_default(),
            inputs.llm_model,
            inputs.embedding_model,
        )?;

        let cache_dir = resolve_cache_dir(inputs.cache_dir, inputs.home_dir)?;
        Ok(CoreConfig::new(supabase, llm, cache_dir))
    }
}

/// Resolve the offline cache directory without reading environment variables.
///
/// An explicit override wins; otherwise the cache lives under the user's home directory.
pub fn resolve_cache_dir(
    override_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
) -> NarrativeResult<PathBuf> {
    if let Some(dir) = override_dir.filter(|d| !d.as_os_str().is_empty()) {
        return Ok(dir);
    }

    home_dir
        .filter(|d| !d.as_os_str().is_empty())
        .map(|home| home.join(DEFAULT_CACHE_DIR_NAME))
        .ok_or_else(|| {
            NarrativeError::Config(
                "could not determine a home directory; set EZN_CACHE_DIR".into(),
            )
        })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
