mod cache;
mod completion;
mod config;
mod debounce;
mod engine;
mod error;
mod protocol;
mod scheduler;
mod server;
mod suggestions;
mod workspace;

use anyhow::Result;
use completion::{CompletionClient, OpenAiBackend};
use config::DaemonConfig;
use server::GridServer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use workspace::Workspace;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = DaemonConfig::load()?;
    let api_key = config.model.resolved_api_key();
    info!(
        socket = %config.server.socket_path.display(),
        request_timeout_ms = config.server.request_timeout_ms,
        rows = config.grid.rows,
        cols = config.grid.cols,
        model = %config.model.model,
        base_url = %config.model.base_url,
        credential = api_key.is_some(),
        default_mode = ?config.suggest.default_mode,
        debounce_ms = config.schedule.debounce_ms,
        cache_capacity = config.cache.capacity,
        cache_ttl_secs = config.cache.ttl_secs,
        "loaded wordgrid config"
    );

    let client = match api_key {
        Some(key) => CompletionClient::configured(OpenAiBackend::new(&config.model, key)?),
        None => {
            warn!(
                env = %config.model.api_key_env,
                "no API key configured, heatmap and suggestions stay idle until set_api_key"
            );
            CompletionClient::NotConfigured
        }
    };
    let workspace = Workspace::new(&config, client)?;
    let server = GridServer::new(config.server.clone(), workspace);
    server.run().await
}
