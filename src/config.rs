//! Client configuration: environment variables with defaults, optionally
//! overridden by a TOML file at LUUNGS_CONFIG_PATH.
//!
//! Precedence: defaults < TOML file < environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

pub const DEFAULT_API_URL: &str = "https://srv451534.hstgr.cloud/api";
pub const DEFAULT_SUBMIT_PATH: &str = "answers";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

#[derive(Clone, Debug)]
pub struct ClientConfig {
  pub api_url: String,
  pub submit_path: String,
  pub timeout: Duration,
  pub session_path: PathBuf,
  pub assistant: AssistantConfig,
}

#[derive(Clone, Debug)]
pub struct AssistantConfig {
  /// None disables the assistant.
  pub api_key: Option<String>,
  pub base_url: String,
  pub model: String,
  pub system_prompt: String,
  pub temperature: f32,
  pub max_tokens: u32,
}

impl Default for AssistantConfig {
  fn default() -> Self {
    Self {
      api_key: None,
      base_url: "https://api.openai.com/v1".into(),
      model: "gpt-3.5-turbo".into(),
      system_prompt: "You are a helpful assistant.".into(),
      temperature: 0.7,
      max_tokens: 256,
    }
  }
}

/// Shape of the optional TOML file. Every key may be omitted.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct FileConfig {
  #[serde(default)] pub api_url: Option<String>,
  #[serde(default)] pub submit_path: Option<String>,
  #[serde(default)] pub timeout_secs: Option<u64>,
  #[serde(default)] pub session_path: Option<PathBuf>,
  #[serde(default)] pub assistant: AssistantFileConfig,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AssistantFileConfig {
  #[serde(default)] pub base_url: Option<String>,
  #[serde(default)] pub model: Option<String>,
  #[serde(default)] pub system_prompt: Option<String>,
  #[serde(default)] pub temperature: Option<f32>,
  #[serde(default)] pub max_tokens: Option<u32>,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      api_url: DEFAULT_API_URL.into(),
      submit_path: DEFAULT_SUBMIT_PATH.into(),
      timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
      session_path: default_session_path(),
      assistant: AssistantConfig::default(),
    }
  }
}

impl ClientConfig {
  /// Build from LUUNGS_CONFIG_PATH (if set) and the process environment.
  pub fn from_env() -> Self {
    let file = load_file_config_from_env().unwrap_or_default();
    Self::resolve(file, |k| std::env::var(k).ok())
  }

  /// Layer a parsed file and an env lookup over the defaults.
  pub fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
    let mut cfg = Self::default();

    if let Some(v) = file.api_url { cfg.api_url = v; }
    if let Some(v) = file.submit_path { cfg.submit_path = v; }
    if let Some(v) = file.timeout_secs { cfg.timeout = Duration::from_secs(v); }
    if let Some(v) = file.session_path { cfg.session_path = v; }
    let a = file.assistant;
    if let Some(v) = a.base_url { cfg.assistant.base_url = v; }
    if let Some(v) = a.model { cfg.assistant.model = v; }
    if let Some(v) = a.system_prompt { cfg.assistant.system_prompt = v; }
    if let Some(v) = a.temperature { cfg.assistant.temperature = v; }
    if let Some(v) = a.max_tokens { cfg.assistant.max_tokens = v; }

    if let Some(v) = env("LUUNGS_API_URL") { cfg.api_url = v; }
    if let Some(v) = env("LUUNGS_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok()) {
      cfg.timeout = Duration::from_secs(v);
    }
    if let Some(v) = env("LUUNGS_SESSION_PATH") { cfg.session_path = PathBuf::from(v); }
    cfg.assistant.api_key = env("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());
    if let Some(v) = env("OPENAI_BASE_URL") { cfg.assistant.base_url = v; }
    if let Some(v) = env("OPENAI_MODEL") { cfg.assistant.model = v; }

    cfg.api_url = cfg.api_url.trim_end_matches('/').to_string();
    cfg
  }
}

fn default_session_path() -> PathBuf {
  match std::env::var_os("HOME") {
    Some(home) => PathBuf::from(home).join(".luungs").join("user_id"),
    None => PathBuf::from(".luungs_user_id"),
  }
}

/// Attempt to load `FileConfig` from LUUNGS_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_file_config_from_env() -> Option<FileConfig> {
  let path = std::env::var("LUUNGS_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<FileConfig>(&s) {
      Ok(cfg) => {
        info!(target: "luungs", %path, "Loaded client config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "luungs", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "luungs", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  #[test]
  fn env_overrides_file_and_defaults() {
    let file: FileConfig = toml::from_str(
      r#"
        api_url = "http://file.example/api/"
        timeout_secs = 5
        [assistant]
        model = "file-model"
        max_tokens = 64
      "#,
    )
    .unwrap();
    let env: HashMap<&str, &str> = HashMap::from([
      ("LUUNGS_TIMEOUT_SECS", "9"),
      ("OPENAI_API_KEY", "sk-test"),
      ("OPENAI_MODEL", "env-model"),
    ]);
    let cfg = ClientConfig::resolve(file, |k| env.get(k).map(|v| v.to_string()));

    assert_eq!(cfg.api_url, "http://file.example/api");
    assert_eq!(cfg.timeout, Duration::from_secs(9));
    assert_eq!(cfg.submit_path, DEFAULT_SUBMIT_PATH);
    assert_eq!(cfg.assistant.model, "env-model");
    assert_eq!(cfg.assistant.max_tokens, 64);
    assert_eq!(cfg.assistant.api_key.as_deref(), Some("sk-test"));
  }

  #[test]
  fn blank_api_key_disables_assistant() {
    let cfg = ClientConfig::resolve(FileConfig::default(), |k| {
      (k == "OPENAI_API_KEY").then(|| "  ".to_string())
    });
    assert!(cfg.assistant.api_key.is_none());
    assert_eq!(cfg.api_url, DEFAULT_API_URL);
    assert_eq!(cfg.assistant.temperature, 0.7);
  }
}
