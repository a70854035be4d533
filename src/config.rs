//! Configuration for the completion endpoint and token budget.
//!
//! Settings come from four places, highest priority first:
//!
//! 1. command-line flags
//! 2. an optional TOML file passed with `--config`
//! 3. `WUT_API_KEY` / `OPENAI_API_KEY` (API key only)
//! 4. built-in defaults
//!
//! ```toml
//! [llm]
//! model = "mistralai/magistral-small-2509"
//! base_url = "http://localhost:1234/v1"
//! api_key = ""
//! context_length = 128000
//! timeout_secs = 120
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["WUT_API_KEY", "OPENAI_API_KEY"];

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Model context window in tokens; drives the character budget.
    #[serde(default = "default_context_length")]
    pub context_length: usize,
    /// HTTP timeout for completion requests. `None` waits indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key: String::new(),
            context_length: default_context_length(),
            timeout_secs: None,
        }
    }
}

fn default_model() -> String {
    "mistralai/magistral-small-2509".to_string()
}
fn default_base_url() -> String {
    "http://localhost:1234/v1".to_string()
}
fn default_context_length() -> usize {
    128_000
}

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct LlmOverrides {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub context_length: Option<usize>,
}

impl Config {
    fn apply_overrides(&mut self, overrides: LlmOverrides) {
        let llm = &mut self.llm;
        if let Some(model) = overrides.model {
            llm.model = model;
        }
        if let Some(base_url) = overrides.base_url {
            llm.base_url = base_url;
        }
        if let Some(api_key) = overrides.api_key {
            llm.api_key = api_key;
        }
        if let Some(context_length) = overrides.context_length {
            llm.context_length = context_length;
        }
    }

    fn apply_env_api_key(&mut self, env: impl Fn(&str) -> Option<String>) {
        if !self.llm.api_key.is_empty() {
            return;
        }
        if let Some(key) = API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| env(*name))
            .find(|v| !v.is_empty())
        {
            self.llm.api_key = key;
        }
    }
}

/// Parse and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Merge file, environment, and command-line settings into the final config.
pub fn resolve(
    path: Option<&Path>,
    overrides: LlmOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config> {
    let mut config = match path {
        Some(p) => load_config(p)?,
        None => Config::default(),
    };
    config.apply_env_api_key(env);
    config.apply_overrides(overrides);
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let llm = &config.llm;

    if llm.context_length == 0 {
        anyhow::bail!("llm.context_length must be > 0");
    }

    if !(llm.base_url.starts_with("http://") || llm.base_url.starts_with("https://")) {
        anyhow::bail!(
            "llm.base_url must start with http:// or https://, got '{}'",
            llm.base_url
        );
    }

    if llm.model.trim().is_empty() {
        anyhow::bail!("llm.model must not be empty");
    }

    if llm.timeout_secs == Some(0) {
        anyhow::bail!("llm.timeout_secs must be > 0 when set");
    }

    Ok(())
}
