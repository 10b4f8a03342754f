//! Configuration system for Recast.
//!
//! Provides TOML-based configuration with:
//! - Optional sections with defaults (`[server]`, `[workflow]`, `[social]`, ...)
//! - Config file layering (user config + project-local + explicit file)
//! - Secret resolution (config value, then environment variable)

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, default_log_dir, load_config, load_config_file,
    load_config_with_options, save_config, user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{
    API_TOKEN_ENV, OPENAI_API_KEY_ENV, ResolvedSecret, SecretSource, X_BEARER_TOKEN_ENV,
    X_USER_ACCESS_TOKEN_ENV, resolve_secret,
};
pub use types::*;
