use crate::error::{LaddrrError, Result};
use crate::flow::CallPolicy;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// LlmBackend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmBackend {
    /// Anthropic Messages API over HTTPS.
    Anthropic {
        #[serde(default = "default_model")]
        model: String,
        #[serde(default = "default_api_key_env")]
        api_key_env: String,
        #[serde(default = "default_base_url")]
        base_url: String,
        #[serde(default = "default_max_tokens")]
        max_tokens: u32,
    },
    /// Local `claude` CLI driven as a subprocess.
    ClaudeCli {
        #[serde(default = "default_model")]
        model: String,
        #[serde(default = "default_executable")]
        executable: String,
    },
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_executable() -> String {
    "claude".to_string()
}

impl Default for LlmBackend {
    fn default() -> Self {
        LlmBackend::Anthropic {
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl LlmBackend {
    pub fn model(&self) -> &str {
        match self {
            LlmBackend::Anthropic { model, .. } | LlmBackend::ClaudeCli { model, .. } => model,
        }
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub backend: LlmBackend,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    1
}

fn default_backoff_ms() -> u64 {
    500
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::default(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl LlmConfig {
    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_secs(self.timeout_secs),
            max_attempts: self.max_attempts.max(1),
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediumKind {
    Memory,
    #[default]
    File,
    Redb,
}

impl MediumKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediumKind::Memory => "memory",
            MediumKind::File => "file",
            MediumKind::Redb => "redb",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub medium: MediumKind,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3141
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "laddrr".to_string(),
            description: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self::new("laddrr")
    }
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: default_version(),
            project: ProjectConfig {
                name: project_name.into(),
                description: None,
            },
            llm: LlmConfig::default(),
            store: StoreConfig::default(),
            server: ServerConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(LaddrrError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Like [`Config::load`], but an uninitialized root yields the defaults.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        match Self::load(root) {
            Err(LaddrrError::NotInitialized) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut warn = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message })
        };

        if self.project.name.trim().is_empty() {
            warn(WarnLevel::Warning, "project.name is empty".to_string());
        }

        if self.llm.timeout_secs == 0 {
            warn(
                WarnLevel::Error,
                "llm.timeout_secs is 0; every completion would time out".to_string(),
            );
        }
        if self.llm.max_attempts == 0 {
            warn(
                WarnLevel::Warning,
                "llm.max_attempts is 0; treated as 1".to_string(),
            );
        }
        if self.llm.max_attempts > 5 {
            warn(
                WarnLevel::Warning,
                format!(
                    "llm.max_attempts={} (>5 is unusual)",
                    self.llm.max_attempts
                ),
            );
        }

        match &self.llm.backend {
            LlmBackend::Anthropic {
                api_key_env,
                base_url,
                ..
            } => {
                if std::env::var(api_key_env).map_or(true, |v| v.trim().is_empty()) {
                    warn(
                        WarnLevel::Warning,
                        format!("environment variable '{api_key_env}' is not set; AI flows will fail"),
                    );
                }
                if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                    warn(
                        WarnLevel::Error,
                        format!("llm.backend.base_url '{base_url}' is not an http(s) URL"),
                    );
                }
            }
            LlmBackend::ClaudeCli { executable, .. } => {
                if executable.trim().is_empty() {
                    warn(
                        WarnLevel::Error,
                        "llm.backend.executable is empty".to_string(),
                    );
                }
            }
        }

        if self.store.medium == MediumKind::Memory {
            warn(
                WarnLevel::Warning,
                "store.medium is 'memory'; records are lost when the process exits".to_string(),
            );
        }

        if self.server.port == 0 {
            warn(
                WarnLevel::Warning,
                "server.port is 0; an ephemeral port will be chosen".to_string(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
