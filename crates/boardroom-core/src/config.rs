//! Gateway configuration loaded from the environment once at startup.
//!
//! The value is constructed in `main`, wrapped in an `Arc`, and passed into
//! every component that needs it; nothing re-reads the environment
//! mid-process.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | OPENAI_API_KEY | (required) | Completion provider key. |
//! | OPENAI_BASE_URL | https://api.openai.com/v1 | OpenAI-compatible endpoint. |
//! | OPENAI_MODEL | gpt-4o-mini | Provider model name. |
//! | CORS_ALLOW_ORIGINS | * | Comma list of allowed origins, or `*`. |
//! | BOARDROOM_THREADS_PATH | ./data/threads | Sled path for the thread store. |
//! | BOARDROOM_PROMPTS_FILE | (unset) | JSON persona instruction overrides. |
//! | BOARDROOM_BIND | 127.0.0.1:8000 | Listen address. |

use crate::error::CoreError;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// Empty or `["*"]` means any origin.
    pub cors_allow_origins: Vec<String>,
    pub threads_path: PathBuf,
    pub prompts_file: Option<PathBuf>,
    pub bind: String,
}

impl GatewayConfig {
    /// Load from environment. Missing API key is a startup error; everything
    /// else falls back to documented defaults.
    pub fn from_env() -> Result<Self, CoreError> {
        let api_key = env_opt_string("OPENAI_API_KEY")
            .ok_or_else(|| CoreError::Config("OPENAI_API_KEY is not set".to_string()))?;
        Ok(Self {
            api_key,
            base_url: env_opt_string("OPENAI_BASE_URL"),
            model: env_opt_string("OPENAI_MODEL"),
            cors_allow_origins: split_origins(
                &env_opt_string("CORS_ALLOW_ORIGINS").unwrap_or_else(|| "*".to_string()),
            ),
            threads_path: env_opt_string("BOARDROOM_THREADS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/threads")),
            prompts_file: env_opt_string("BOARDROOM_PROMPTS_FILE").map(PathBuf::from),
            bind: env_opt_string("BOARDROOM_BIND").unwrap_or_else(|| "127.0.0.1:8000".to_string()),
        })
    }

    /// True when every origin is allowed.
    pub fn cors_allow_any(&self) -> bool {
        self.cors_allow_origins.is_empty() || self.cors_allow_origins.iter().any(|o| o == "*")
    }
}

/// Split a comma-separated origin list, dropping empties.
pub fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
