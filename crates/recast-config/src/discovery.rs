//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/recast/config.toml` (user config)
//! 2. `./recast.toml` (project-local)
//! 3. an explicit `--config` file
//! 4. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use crate::{ConfigError, RecastConfig, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "recast.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for config directory resolution.
const APP_NAME: &str = "recast";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "RECAST_CONFIG_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: RecastConfig,
    /// Sources that were checked, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Warnings generated during loading (malformed layers, plaintext secrets).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration by discovering and merging all config layers.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None, None)
}

/// Load configuration with explicit control over every layer.
///
/// `config_dir` overrides both `RECAST_CONFIG_DIR` and the platform default.
/// `explicit` is layered last and, unlike discovered files, must exist.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = RecastConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    if let Some(path) = explicit {
        config.merge(load_config_file(path)?);
        sources.push(ConfigSource {
            path: path.to_path_buf(),
            loaded: true,
        });
    }

    check_plaintext_secrets(&config, &mut warnings);

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<RecastConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    RecastConfig::from_toml(&contents)
}

/// Save configuration to a file, creating parent directories.
pub fn save_config(config: &RecastConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// Path of the user config file.
pub fn user_config_path() -> Option<PathBuf> {
    user_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// The recast config directory.
///
/// Checks `RECAST_CONFIG_DIR` first, then falls back to the platform default.
pub fn user_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Default directory for rolling log files.
pub fn default_log_dir() -> PathBuf {
    user_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("logs")
}

/// Try to load a config file and merge it into the existing config.
///
/// Missing files are skipped; malformed ones become warnings.
fn load_layer(config: &mut RecastConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

fn check_plaintext_secrets(config: &RecastConfig, warnings: &mut Vec<String>) {
    let mut found = Vec::new();
    if let Some(server) = &config.server
        && server.auth_token.is_some()
    {
        found.push("[server].auth_token");
    }
    if let Some(social) = &config.social {
        if social.bearer_token.is_some() {
            found.push("[social].bearer_token");
        }
        if social.user_access_token.is_some() {
            found.push("[social].user_access_token");
        }
    }
    if let Some(llm) = &config.llm
        && llm.api_key.is_some()
    {
        found.push("[llm].api_key");
    }

    for key in found {
        warnings.push(format!(
            "{} is stored in plaintext. Consider using an environment variable instead.",
            key
        ));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_no_files() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        let loaded =
            load_config_with_options(Some(project.path()), Some(user.path()), None).unwrap();
        assert_eq!(loaded.config, RecastConfig::new());
        assert!(loaded.loaded_from().is_empty());
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_layered_merge() {
        let user = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        fs::write(
            user.path().join("config.toml"),
            r#"
[server]
port = 8080

[llm]
model = "user-model"
"#,
        )
        .unwrap();
        fs::write(
            project.path().join("recast.toml"),
            r#"
[server]
port = 3000
"#,
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project.path()), Some(user.path()), None).unwrap();
        assert_eq!(loaded.config.server().port, 3000);
        assert_eq!(loaded.config.llm().model, "user-model");
        assert_eq!(loaded.loaded_from().len(), 2);
    }

    #[test]
    fn test_explicit_file_layers_last_and_must_exist() {
        let user = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        fs::write(project.path().join("recast.toml"), "[server]\nport = 3000\n").unwrap();
        let explicit = project.path().join("prod.toml");
        fs::write(&explicit, "[server]\nport = 443\n").unwrap();

        let loaded = load_config_with_options(
            Some(project.path()),
            Some(user.path()),
            Some(&explicit),
        )
        .unwrap();
        assert_eq!(loaded.config.server().port, 443);

        let missing = project.path().join("missing.toml");
        let err = load_config_with_options(Some(project.path()), Some(user.path()), Some(&missing))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_malformed_layer_warns_but_continues() {
        let user = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        fs::write(user.path().join("config.toml"), "[workflow]\ndefault_count = 3\n").unwrap();
        fs::write(project.path().join("recast.toml"), "not valid toml {{{{").unwrap();

        let loaded =
            load_config_with_options(Some(project.path()), Some(user.path()), None).unwrap();
        assert_eq!(loaded.config.workflow().default_count, 3);
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("Failed to load"));
    }

    #[test]
    fn test_plaintext_secret_warnings() {
        let user = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        fs::write(
            project.path().join("recast.toml"),
            r#"
[social]
bearer_token = "AAAA"

[llm]
api_key = "sk-secret"
"#,
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project.path()), Some(user.path()), None).unwrap();
        assert_eq!(loaded.warnings.len(), 2);
        assert!(loaded.warnings[0].contains("[social].bearer_token"));
        assert!(loaded.warnings[1].contains("[llm].api_key"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = RecastConfig::from_toml("[storage]\ndatabase = \"/tmp/r.db\"\n").unwrap();

        save_config(&config, &path).unwrap();
        assert_eq!(load_config_file(&path).unwrap(), config);
    }
}
