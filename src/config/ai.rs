// src/config/ai.rs
use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_daily_limit() -> u32 {
    50
}
fn default_run_budget() -> u32 {
    10
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache/ai")
}
fn default_timeout_secs() -> u64 {
    10
}

/// `[ai]` section. Disabled unless `enabled = true` (or `AI_TEST_MODE=mock`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub enabled: bool,
    /// "openai" | "groq" | "openrouter" (case-insensitive); all speak the
    /// chat-completions protocol.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Overrides the provider's default endpoint root.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Env var holding the key; defaults per provider (`OPENAI_API_KEY`, ...).
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Real calls per UTC day; cache hits are free.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    /// Real calls per pipeline run.
    #[serde(default = "default_run_budget")]
    pub run_budget: u32,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key_env: None,
            daily_limit: default_daily_limit(),
            run_budget: default_run_budget(),
            cache_dir: default_cache_dir(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AiConfig {
    /// Lowercase the provider name and reject unknown ones.
    pub fn normalized(mut self) -> anyhow::Result<Self> {
        self.provider = self.provider.trim().to_lowercase();
        if !matches!(self.provider.as_str(), "openai" | "groq" | "openrouter") {
            bail!("Unsupported AI provider in config: {}", self.provider);
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
        Ok(self)
    }

    pub fn endpoint_root(&self) -> String {
        if let Some(u) = self.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return u.trim().trim_end_matches('/').to_string();
        }
        match self.provider.as_str() {
            "groq" => "https://api.groq.com/openai/v1",
            "openrouter" => "https://openrouter.ai/api/v1",
            _ => "https://api.openai.com/v1",
        }
        .to_string()
    }

    pub fn key_env(&self) -> String {
        if let Some(k) = self.api_key_env.as_deref().filter(|k| !k.trim().is_empty()) {
            return k.trim().to_string();
        }
        match self.provider.as_str() {
            "groq" => "GROQ_API_KEY",
            "openrouter" => "OPENROUTER_API_KEY",
            _ => "OPENAI_API_KEY",
        }
        .to_string()
    }
}
