//! Gateway configuration: built-in defaults, optional TOML file, then environment.
//!
//! | Key | Default | Env |
//! |-----|---------|-----|
//! | host | 0.0.0.0 | MAMASCOTA__HOST |
//! | port | 3001 | MAMASCOTA__PORT or PORT |
//! | knowledge_base_path | data/knowledge_base.json | MAMASCOTA__KNOWLEDGE_BASE_PATH |
//! | system_prompt_path | profiles/mamascota-familiar.md | MAMASCOTA__SYSTEM_PROMPT_PATH |
//! | default_lang | en | MAMASCOTA__DEFAULT_LANG or DEFAULT_LANG |
//! | level_filter | familiar | MAMASCOTA__LEVEL_FILTER |
//! | llm_api_base | https://api.openai.com/v1 | MAMASCOTA__LLM_API_BASE |
//! | llm_model | gpt-4o-mini | MAMASCOTA__LLM_MODEL |
//! | llm_temperature | 0.5 | MAMASCOTA__LLM_TEMPERATURE |
//! | llm_timeout_secs | 60 | MAMASCOTA__LLM_TIMEOUT_SECS |
//! | history_limit | 20 | MAMASCOTA__HISTORY_LIMIT |
//! | max_conversations | 10000 | MAMASCOTA__MAX_CONVERSATIONS |
//! | body_limit_bytes | 2 MiB | MAMASCOTA__BODY_LIMIT_BYTES |
//!
//! The completion API key is read from `OPENAI_API_KEY` (or `OPENROUTER_API_KEY`) and never
//! from the config file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/gateway";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub knowledge_base_path: String,
    pub system_prompt_path: String,
    pub default_lang: String,
    /// Algorithm audience filter; `all` disables filtering.
    pub level_filter: String,
    pub llm_api_base: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_timeout_secs: u64,
    /// Max turns kept per conversation.
    pub history_limit: usize,
    /// Max conversations held in memory; least recently used are evicted first.
    pub max_conversations: usize,
    pub body_limit_bytes: usize,
}

impl GatewayConfig {
    /// Precedence: env `MAMASCOTA__*` (and legacy `PORT`/`DEFAULT_LANG`) > file at
    /// `MAMASCOTA_CONFIG` (default `config/gateway`) > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("MAMASCOTA_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3001_i64)?
            .set_default("knowledge_base_path", "data/knowledge_base.json")?
            .set_default("system_prompt_path", "profiles/mamascota-familiar.md")?
            .set_default("default_lang", crate::lang::DEFAULT_LANG)?
            .set_default("level_filter", crate::context::DEFAULT_LEVEL_FILTER)?
            .set_default("llm_api_base", "https://api.openai.com/v1")?
            .set_default("llm_model", "gpt-4o-mini")?
            .set_default("llm_temperature", 0.5_f64)?
            .set_default("llm_timeout_secs", 60_i64)?
            .set_default("history_limit", 20_i64)?
            .set_default("max_conversations", 10_000_i64)?
            .set_default("body_limit_bytes", 2_i64 * 1024 * 1024)?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("MAMASCOTA").separator("__"));

        let builder = match env_opt_string("PORT") {
            Some(port) => builder.set_override("port", port)?,
            None => builder,
        };
        let builder = match env_opt_string("DEFAULT_LANG") {
            Some(lang) => builder.set_override("default_lang", lang)?,
            None => builder,
        };

        builder.build()?.try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    /// `None` puts the gateway in echo mode.
    pub fn api_key() -> Option<String> {
        env_opt_string("OPENAI_API_KEY").or_else(|| env_opt_string("OPENROUTER_API_KEY"))
    }
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(
            &path,
            "port = 4010\nlevel_filter = \"all\"\nhistory_limit = 6\n",
        )
        .unwrap();
        let cfg = GatewayConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.level_filter, "all");
        assert_eq!(cfg.history_limit, 6);
        assert_eq!(cfg.max_conversations, 10_000);
        assert_eq!(cfg.llm_model, "gpt-4o-mini");
        assert_eq!(cfg.body_limit_bytes, 2 * 1024 * 1024);
        // PORT may be set by the test environment.
        if std::env::var("PORT").is_err() && std::env::var("MAMASCOTA__PORT").is_err() {
            assert_eq!(cfg.port, 4010);
        }
    }

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = GatewayConfig::load_from("/no/such/mamascota-config").unwrap();
        assert_eq!(cfg.llm_timeout(), Duration::from_secs(60));
        assert!(cfg.bind_addr().ends_with(&cfg.port.to_string()));
        assert!((cfg.llm_temperature - 0.5).abs() < f32::EPSILON);
    }
}
