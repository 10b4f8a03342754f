//! Wiring: build the store, collaborators, and orchestrator from config.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::{info, warn};

use recast_config::{
    OPENAI_API_KEY_ENV, RecastConfig, X_BEARER_TOKEN_ENV, X_USER_ACCESS_TOKEN_ENV, resolve_secret,
};
use recast_llm::{LlmRewriter, OpenAiBackend, OpenAiConfig};
use recast_social::{HttpMediaDownloader, RateLimitTracker, XClient, XConfig};
use recast_store::PostStore;
use recast_workflow::{Collaborators, Orchestrator, WorkflowSettings};

/// Everything a command needs to run pipelines.
pub struct App {
    pub orchestrator: Orchestrator,
    pub posts: Arc<PostStore>,
    pub rate_limits: Arc<RateLimitTracker>,
}

impl App {
    pub fn build(config: &RecastConfig) -> Result<Self> {
        config.validate()?;

        let storage = config.storage();
        let posts = Arc::new(
            PostStore::open(&storage.database).with_context(|| {
                format!("Failed to open database {}", storage.database.display())
            })?,
        );

        let x_client = XClient::new(x_config(config))?;
        let rate_limits = x_client.rate_limits();

        let media = config.media();
        let downloader = HttpMediaDownloader::new(&media.dir, media.download_timeout())?;

        let llm = config.llm();
        let mut llm_config = OpenAiConfig::openai("")
            .with_base_url(&llm.base_url)
            .with_model(&llm.model)
            .with_timeout(llm.timeout())
            .with_max_retries(llm.retry_max);
        llm_config.api_key = match resolve_secret(llm.api_key.as_deref(), OPENAI_API_KEY_ENV) {
            Some(secret) => {
                info!(source = %secret.source, "Resolved LLM API key");
                Some(secret.value)
            }
            None => {
                warn!("No LLM API key configured; rewrites will fall back to the original text");
                None
            }
        };
        let backend = OpenAiBackend::new(llm_config)?;
        let rewriter = LlmRewriter::new(Arc::new(backend), &llm.model)
            .with_temperature(llm.temperature)
            .with_max_tokens(llm.max_tokens);

        let collaborators = Collaborators {
            fetcher: Arc::new(x_client.clone()),
            media: Arc::new(downloader),
            rewriter: Arc::new(rewriter),
            publisher: Arc::new(x_client),
            repository: posts.clone(),
        };

        let orchestrator = Orchestrator::new(collaborators, workflow_settings(config));

        Ok(Self {
            orchestrator,
            posts,
            rate_limits,
        })
    }
}

fn x_config(config: &RecastConfig) -> XConfig {
    let social = config.social();
    let mut x = XConfig::default()
        .with_base_url(&social.base_url)
        .with_timeout(social.timeout());

    match resolve_secret(social.bearer_token.as_deref(), X_BEARER_TOKEN_ENV) {
        Some(secret) => {
            info!(source = %secret.source, "Resolved X bearer token");
            x = x.with_bearer_token(secret.value);
        }
        None => warn!("No X bearer token configured; fetching will fail"),
    }
    match resolve_secret(social.user_access_token.as_deref(), X_USER_ACCESS_TOKEN_ENV) {
        Some(secret) => {
            info!(source = %secret.source, "Resolved X user access token");
            x = x.with_user_access_token(secret.value);
        }
        None => warn!("No X user access token configured; publishing will fail"),
    }
    x
}

pub fn workflow_settings(config: &RecastConfig) -> WorkflowSettings {
    let workflow = config.workflow();
    WorkflowSettings {
        default_target: workflow.default_target.clone(),
        default_count: workflow.default_count,
        step_timeout: workflow.step_timeout(),
        publish_timeout: workflow.publish_timeout(),
        auto_posting: workflow.auto_posting,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_workflow_settings_from_config() {
        let config = RecastConfig::from_toml(
            r#"
[workflow]
default_target = "rustlang"
default_count = 5
step_timeout_secs = 30
publish_timeout_secs = 600
auto_posting = false
"#,
        )
        .unwrap();

        let settings = workflow_settings(&config);
        assert_eq!(settings.default_target.as_deref(), Some("rustlang"));
        assert_eq!(settings.default_count, 5);
        assert_eq!(settings.step_timeout, Duration::from_secs(30));
        assert_eq!(settings.publish_timeout, Duration::from_secs(600));
        assert!(!settings.auto_posting);
    }

    #[test]
    fn test_build_opens_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecastConfig::from_toml(&format!(
            "[storage]\ndatabase = \"{}\"\n\n[media]\ndir = \"{}\"\n\n[llm]\napi_key = \"sk-test\"\n",
            dir.path().join("db/recast.db").display(),
            dir.path().join("media").display(),
        ))
        .unwrap();

        let app = App::build(&config).unwrap();
        assert!(dir.path().join("db/recast.db").exists());
        assert!(app.rate_limits.snapshot().is_empty());
        assert_eq!(app.orchestrator.settings().default_count, 1);
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let config = RecastConfig::from_toml("[workflow]\ndefault_count = 0\n").unwrap();
        assert!(App::build(&config).is_err());
    }
}
