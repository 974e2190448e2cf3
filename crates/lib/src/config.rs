//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.converse/config.json`) and environment.
//! Every key is optional; a missing file means all defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Agent socket settings.
    #[serde(default)]
    pub link: LinkConfig,

    /// Chat panel behavior (welcome text, offline fallback).
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Where the agent backend listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkConfig {
    /// WebSocket URL (default "ws://127.0.0.1:8765/ws"). Overridden by CONVERSE_ENDPOINT env.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

/// Chat session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    /// Greeting shown as the first agent message. Empty string disables it.
    #[serde(default = "default_welcome")]
    pub welcome: String,

    /// Delay before the simulated reply when the socket is not open (default 2000 ms).
    #[serde(default = "default_fallback_delay_ms")]
    pub fallback_delay_ms: u64,
}

pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8765/ws";

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_fallback_delay_ms() -> u64 {
    2000
}

fn default_welcome() -> String {
    "Welcome to Converse Copilot! I can help you draft message templates in seconds. \
     Just tell me what you need. For example:\n\
     • \"Create a welcome message for new customers with a 15% discount\"\n\
     • \"Draft an appointment reminder for tomorrow\"\n\
     • \"Announce a weekend flash sale for Diwali\""
        .to_string()
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            welcome: default_welcome(),
            fallback_delay_ms: default_fallback_delay_ms(),
        }
    }
}

/// Resolve the socket endpoint: env CONVERSE_ENDPOINT overrides config.
pub fn resolve_endpoint(config: &Config) -> String {
    std::env::var("CONVERSE_ENDPOINT")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            let t = config.link.endpoint.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .unwrap_or_else(default_endpoint)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("CONVERSE_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".converse").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path, or the default path (or CONVERSE_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
