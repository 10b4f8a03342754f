//! Secret resolution: config file value, then environment variable.

/// Environment variable for the X app-only token.
pub const X_BEARER_TOKEN_ENV: &str = "X_BEARER_TOKEN";
/// Environment variable for the X user-context token.
pub const X_USER_ACCESS_TOKEN_ENV: &str = "X_USER_ACCESS_TOKEN";
/// Environment variable for the LLM API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable for the server's bearer token.
pub const API_TOKEN_ENV: &str = "RECAST_API_TOKEN";

/// A resolved secret with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    pub value: String,
    pub source: SecretSource,
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Config file (plaintext).
    ConfigFile,
    /// Environment variable.
    EnvVar(String),
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
        }
    }
}

/// Resolve a secret from the config value, falling back to `env_var`.
///
/// Empty values count as unset.
pub fn resolve_secret(config_value: Option<&str>, env_var: &str) -> Option<ResolvedSecret> {
    if let Some(value) = config_value.filter(|v| !v.is_empty()) {
        return Some(ResolvedSecret {
            value: value.to_string(),
            source: SecretSource::ConfigFile,
        });
    }

    lookup_env(env_var).map(|value| ResolvedSecret {
        value,
        source: SecretSource::EnvVar(env_var.to_string()),
    })
}

fn lookup_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
