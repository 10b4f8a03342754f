//! Common test utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use recast_server::{AppState, Server, ServerConfig};
use recast_store::PostStore;
use recast_types::FetchedPost;
use recast_workflow::testing::Fakes;
use recast_workflow::{Orchestrator, WorkflowSettings};

/// A test server that runs in the background.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// The auth token for the server.
    pub token: String,
    /// HTTP client configured for this server.
    pub client: Client,
    /// The fakes standing in for the social and LLM services.
    pub fakes: Fakes,
    /// The store shared by the pipeline and the `/posts` routes.
    pub posts: Arc<PostStore>,
    /// Handle to the server task.
    _handle: JoinHandle<()>,
    /// Holds the database file.
    _temp_dir: TempDir,
}

impl TestServer {
    /// Start a server whose fetcher returns `posts`.
    pub async fn start(posts: Vec<FetchedPost>) -> Result<Self> {
        Self::start_with(Fakes::new(posts)).await
    }

    /// Start a server around a prepared set of fakes.
    pub async fn start_with(fakes: Fakes) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let token = "test-token".to_string();
        let addr = find_available_port().await?;

        let store = Arc::new(PostStore::open(temp_dir.path().join("recast.db"))?);
        let mut collaborators = fakes.collaborators();
        collaborators.repository = store.clone();

        let settings = WorkflowSettings {
            default_target: Some("acct".to_string()),
            ..WorkflowSettings::default()
        };
        let orchestrator = Orchestrator::new(collaborators, settings);

        let config = ServerConfig::new(Some(token.clone()))
            .with_bind_address(addr)
            .with_rate_limiting(false)
            .with_request_logging(false);
        let state = AppState::new(orchestrator, store.clone(), config);

        let server = Server::from_state(state);
        let handle = tokio::spawn(async move {
            let _ = server.run_on(addr).await;
        });

        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            token,
            client,
            fakes,
            posts: store,
            _handle: handle,
            _temp_dir: temp_dir,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get an authenticated GET request builder.
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url(), path))
            .bearer_auth(&self.token)
    }

    /// Get an authenticated POST request builder.
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url(), path))
            .bearer_auth(&self.token)
    }

    /// Get an authenticated DELETE request builder.
    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .delete(format!("{}{}", self.base_url(), path))
            .bearer_auth(&self.token)
    }

    /// Poll a workflow until it reaches a terminal status.
    pub async fn wait_for_workflow(&self, id: &str) -> Result<serde_json::Value> {
        let path = format!("/api/v1/workflow/status/{id}");
        let result = timeout(Duration::from_secs(10), async {
            loop {
                let view: serde_json::Value = self.get(&path).send().await?.json().await?;
                if matches!(view["status"].as_str(), Some("completed" | "failed")) {
                    return Ok::<_, anyhow::Error>(view);
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await;

        match result {
            Ok(view) => view,
            Err(_) => anyhow::bail!("Timeout waiting for workflow {id}"),
        }
    }
}

/// Find an available port for the test server.
async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
