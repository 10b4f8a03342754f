//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [server]      # HTTP listener, auth, rate limiting
//! [workflow]    # pipeline defaults and record retention
//! [social]      # X API connection
//! [media]       # media download directory
//! [llm]         # rewrite model
//! [storage]     # SQLite database
//! [logging]     # log file output
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

pub const DEFAULT_PORT: u16 = 8001;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_SOCIAL_BASE_URL: &str = "https://api.x.com/2";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecastConfig {
    pub server: Option<ServerConfig>,
    pub workflow: Option<WorkflowConfig>,
    pub social: Option<SocialConfig>,
    pub media: Option<MediaConfig>,
    pub llm: Option<LlmConfig>,
    pub storage: Option<StorageConfig>,
    pub logging: Option<LoggingConfig>,
}

impl RecastConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole, not field by field.
    pub fn merge(&mut self, other: RecastConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }
        if other.workflow.is_some() {
            self.workflow = other.workflow;
        }
        if other.social.is_some() {
            self.social = other.social;
        }
        if other.media.is_some() {
            self.media = other.media;
        }
        if other.llm.is_some() {
            self.llm = other.llm;
        }
        if other.storage.is_some() {
            self.storage = other.storage;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    pub fn workflow(&self) -> WorkflowConfig {
        self.workflow.clone().unwrap_or_default()
    }

    pub fn social(&self) -> SocialConfig {
        self.social.clone().unwrap_or_default()
    }

    pub fn media(&self) -> MediaConfig {
        self.media.clone().unwrap_or_default()
    }

    pub fn llm(&self) -> LlmConfig {
        self.llm.clone().unwrap_or_default()
    }

    pub fn storage(&self) -> StorageConfig {
        self.storage.clone().unwrap_or_default()
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Check the values the workflow core would otherwise reject at run time.
    pub fn validate(&self) -> Result<()> {
        let workflow = self.workflow();
        if !(1..=100).contains(&workflow.default_count) {
            return Err(ConfigError::Invalid(format!(
                "workflow.default_count must be within 1..=100, got {}",
                workflow.default_count
            )));
        }
        if !(10..=300).contains(&workflow.step_timeout_secs) {
            return Err(ConfigError::Invalid(format!(
                "workflow.step_timeout_secs must be within 10..=300, got {}",
                workflow.step_timeout_secs
            )));
        }
        if workflow.publish_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "workflow.publish_timeout_secs must be positive".to_string(),
            ));
        }

        let server = self.server();
        if server.rate_limiting && server.api_rpm == 0 {
            return Err(ConfigError::Invalid(
                "server.api_rpm must be positive when rate limiting is enabled".to_string(),
            ));
        }
        if let Some(target) = &workflow.default_target
            && target.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "workflow.default_target must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Address to bind to.
    pub bind: String,
    /// Bearer token required on the API (falls back to `RECAST_API_TOKEN`).
    pub auth_token: Option<String>,
    /// Enable rate limiting.
    pub rate_limiting: bool,
    /// API rate limit: requests per minute.
    pub api_rpm: u32,
    /// Enable request logging.
    pub request_logging: bool,
    /// Enable CORS.
    pub cors: bool,
    /// Allowed CORS origins (empty = any).
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            auth_token: None,
            rate_limiting: true,
            api_rpm: 120,
            request_logging: true,
            cors: true,
            cors_origins: Vec::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Workflow Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Pipeline defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Account used when a request names none.
    pub default_target: Option<String>,
    pub default_count: usize,
    pub step_timeout_secs: u64,
    pub publish_timeout_secs: u64,
    /// When false the publish step completes without posting.
    pub auto_posting: bool,
    /// Age after which finished workflow records are evicted.
    pub retention_hours: u64,
    /// Seconds between eviction sweeps (0 disables the sweeper).
    pub sweep_interval_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            default_target: None,
            default_count: 1,
            step_timeout_secs: 60,
            publish_timeout_secs: 1200,
            auto_posting: true,
            retention_hours: 24,
            sweep_interval_secs: 3600,
        }
    }
}

impl WorkflowConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours.saturating_mul(3600))
    }

    /// Sweep interval, or `None` when the sweeper is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Collaborator Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// X API connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialConfig {
    pub base_url: String,
    /// App-only token for reads (falls back to `X_BEARER_TOKEN`).
    pub bearer_token: Option<String>,
    /// User-context token for posting (falls back to `X_USER_ACCESS_TOKEN`).
    pub user_access_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SOCIAL_BASE_URL.to_string(),
            bearer_token: None,
            user_access_token: None,
            timeout_secs: 30,
        }
    }
}

impl SocialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Media download settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub dir: PathBuf,
    pub download_timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/media"),
            download_timeout_secs: 30,
        }
    }
}

impl MediaConfig {
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

/// Rewrite model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// API key (falls back to `OPENAI_API_KEY`).
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub retry_max: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 200,
            timeout_secs: 60,
            retry_max: 2,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Database location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("data/recast.db"),
        }
    }
}

/// Log file output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rolling log files (defaults to `<config dir>/logs`).
    pub dir: Option<PathBuf>,
    /// Write the file layer as JSON lines.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            json: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = RecastConfig::from_toml("").unwrap();
        assert_eq!(config, RecastConfig::new());

        let server = config.server();
        assert_eq!(server.port, 8001);
        assert_eq!(server.bind, "127.0.0.1");
        assert!(server.rate_limiting);
        assert_eq!(server.api_rpm, 120);

        let workflow = config.workflow();
        assert_eq!(workflow.default_count, 1);
        assert_eq!(workflow.step_timeout(), Duration::from_secs(60));
        assert_eq!(workflow.publish_timeout(), Duration::from_secs(1200));
        assert!(workflow.auto_posting);
        assert_eq!(workflow.retention(), Duration::from_secs(24 * 3600));

        assert_eq!(config.llm().model, "gpt-4o-mini");
        assert_eq!(config.storage().database, PathBuf::from("data/recast.db"));
        assert!(config.logging().json);
    }

    #[test]
    fn test_partial_section() {
        let config = RecastConfig::from_toml(
            r#"
[workflow]
default_target = "rustlang"
step_timeout_secs = 90
sweep_interval_secs = 0
"#,
        )
        .unwrap();

        let workflow = config.workflow();
        assert_eq!(workflow.default_target.as_deref(), Some("rustlang"));
        assert_eq!(workflow.step_timeout_secs, 90);
        assert_eq!(workflow.default_count, 1);
        assert_eq!(workflow.sweep_interval(), None);
        assert!(config.server.is_none());
    }

    #[test]
    fn test_merge_replaces_sections() {
        let mut base = RecastConfig::from_toml(
            r#"
[server]
port = 9000

[llm]
model = "base-model"
"#,
        )
        .unwrap();
        let overlay = RecastConfig::from_toml(
            r#"
[server]
bind = "0.0.0.0"
"#,
        )
        .unwrap();

        base.merge(overlay);
        assert_eq!(base.server().bind, "0.0.0.0");
        // Whole-section replacement: the overlay's default port wins.
        assert_eq!(base.server().port, DEFAULT_PORT);
        assert_eq!(base.llm().model, "base-model");
    }

    #[test]
    fn test_roundtrip_toml() {
        let mut config = RecastConfig::new();
        config.workflow = Some(WorkflowConfig {
            default_target: Some("news".to_string()),
            ..Default::default()
        });
        let parsed = RecastConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validate_ranges() {
        assert!(RecastConfig::new().validate().is_ok());

        let bad_count = RecastConfig::from_toml("[workflow]\ndefault_count = 0").unwrap();
        assert!(matches!(bad_count.validate(), Err(ConfigError::Invalid(_))));

        let bad_timeout = RecastConfig::from_toml("[workflow]\nstep_timeout_secs = 5").unwrap();
        assert!(bad_timeout.validate().unwrap_err().to_string().contains("step_timeout_secs"));

        let bad_rpm = RecastConfig::from_toml("[server]\napi_rpm = 0").unwrap();
        assert!(bad_rpm.validate().is_err());

        let blank = RecastConfig::from_toml("[workflow]\ndefault_target = \"  \"").unwrap();
        assert!(blank.validate().is_err());
    }
}
