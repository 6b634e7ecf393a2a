//! Configuration loading and management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::workflow::{ContextScope, ExecutionMode, RunOptions};
use crate::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Output generator settings
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Session persistence settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Workflow definition file (built-in Level of Care workflow if unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file or default locations
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(PathBuf::from).or_else(|| {
            // Try .caseflow/config.toml in current directory
            let local = PathBuf::from(".caseflow/config.toml");
            if local.exists() {
                return Some(local);
            }

            // Try ~/.caseflow/config.toml
            dirs::home_dir().map(|h| h.join(".caseflow/config.toml"))
        });

        match config_path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(&p)?;
                Self::parse(&content)
            }
            Some(p) if path.is_some() => Err(Error::Config(format!(
                "Config file not found: {}",
                p.display()
            ))),
            _ => Ok(Config::default()),
        }
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Session store directory with `~` and env vars expanded
    pub fn store_dir(&self) -> PathBuf {
        let raw = self.store.directory.to_string_lossy();
        match shellexpand::full(&raw) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(_) => self.store.directory.clone(),
        }
    }

    /// Run options derived from scheduler and generator settings
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            mode: self.scheduler.mode,
            pacing: self.scheduler.pacing,
            context_scope: self.scheduler.context,
            generator_timeout: self.generator.timeout,
        }
    }
}

/// Generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Which generator to use: `none` or `chat`
    #[serde(default = "default_generator_kind")]
    pub kind: String,

    /// Per-call timeout
    #[serde(default = "default_generator_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Chat-completions settings
    #[serde(default)]
    pub chat: ChatConfig,
}

fn default_generator_kind() -> String {
    "none".to_string()
}

fn default_generator_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            kind: default_generator_kind(),
            timeout: default_generator_timeout(),
            chat: ChatConfig::default(),
        }
    }
}

/// Chat-completions generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Model, or deployment name for Azure
    #[serde(default = "default_deployment")]
    pub deployment: String,

    /// Azure API version; when set the Azure URL scheme is used
    #[serde(default)]
    pub api_version: Option<String>,

    /// API key, or `${ENV_VAR}` (falls back to CASEFLOW_API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_deployment() -> String {
    "gpt-4.1".to_string()
}

fn default_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            deployment: default_deployment(),
            api_version: None,
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl ChatConfig {
    /// API key after `${VAR}` expansion, or CASEFLOW_API_KEY
    pub fn resolved_api_key(&self) -> Option<String> {
        let configured = self.api_key.as_deref().and_then(resolve_env);
        configured
            .or_else(|| std::env::var("CASEFLOW_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn api_key_missing(&self) -> bool {
        self.resolved_api_key().is_none()
    }
}

fn resolve_env(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok()
    } else {
        Some(value.to_string())
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Execution mode for new runs
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Honor per-task minimum durations
    #[serde(default = "default_pacing")]
    pub pacing: bool,

    /// Which completed outputs a task sees as context
    #[serde(default)]
    pub context: ContextScope,
}

fn default_pacing() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            pacing: default_pacing(),
            context: ContextScope::default(),
        }
    }
}

/// Session store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one file per session
    #[serde(default = "default_store_dir")]
    pub directory: PathBuf,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".caseflow/sessions")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: default_store_dir(),
        }
    }
}

/// Initialize the .caseflow directory with a default config
pub fn init() -> Result<PathBuf> {
    let dir = PathBuf::from(".caseflow");
    std::fs::create_dir_all(dir.join("sessions"))?;

    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        let content =
            toml::to_string_pretty(&Config::default()).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(&config_path, content)?;
    }

    Ok(config_path)
}

// Duration as a humantime string
mod duration_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.generator.kind, "none");
        assert_eq!(config.generator.timeout, Duration::from_secs(30));
        assert_eq!(config.scheduler.mode, ExecutionMode::Sequential);
        assert!(config.scheduler.pacing);
        assert!(config.workflow.is_none());
    }

    #[test]
    fn test_parse_config() {
        let content = r#"
workflow = "flows/review.toml"

[generator]
kind = "chat"
timeout = "10s"

[generator.chat]
api_base = "https://example.openai.azure.com"
deployment = "gpt-4.1"
api_version = "2024-02-15-preview"
api_key = "${AZURE_KEY}"

[scheduler]
mode = "concurrent"
pacing = false
context = "transitive"

[store]
directory = "/tmp/caseflow"
"#;

        let config = Config::parse(content).unwrap();
        assert_eq!(config.generator.timeout, Duration::from_secs(10));
        assert_eq!(config.generator.chat.api_version.as_deref(), Some("2024-02-15-preview"));
        assert_eq!(config.scheduler.mode, ExecutionMode::Concurrent);
        assert_eq!(config.scheduler.context, ContextScope::Transitive);
        assert_eq!(config.store_dir(), PathBuf::from("/tmp/caseflow"));

        let options = config.run_options();
        assert!(!options.pacing);
        assert_eq!(options.generator_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_config_roundtrip() {
        let content = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed = Config::parse(&content).unwrap();
        assert_eq!(parsed.generator.timeout, Duration::from_secs(30));
        assert_eq!(parsed.store.directory, PathBuf::from(".caseflow/sessions"));
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let result = Config::load(Some(Path::new("/nonexistent/caseflow.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_resolve_env() {
        assert_eq!(resolve_env("plain"), Some("plain".to_string()));
        assert_eq!(resolve_env("${CASEFLOW_SURELY_UNSET_VAR}"), None);
    }
}
