//! CLI command handlers.

pub mod run;
pub mod start;
pub mod status;

use recast_config::LoadedConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Server URL to connect to.
    pub server_url: String,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Merged configuration and where it came from.
    pub config: LoadedConfig,
}
