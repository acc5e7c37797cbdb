use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::protocol::{DaemonRequest, DaemonResponse, ErrorCode, ErrorResponse, ResponseBody};
use crate::workspace::Workspace;

pub struct GridServer {
    config: ServerConfig,
    workspace: Arc<Workspace>,
}

impl GridServer {
    pub fn new(config: ServerConfig, workspace: Workspace) -> Self {
        Self {
            config,
            workspace: Arc::new(workspace),
        }
    }

    pub async fn run(&self) -> Result<()> {
        self.prepare_socket_path().await?;
        if self.config.socket_path.exists() {
            fs::remove_file(&self.config.socket_path)
                .await
                .with_context(|| {
                    format!(
                        "failed to cleanup stale socket {}",
                        self.config.socket_path.display()
                    )
                })?;
        }

        let listener = UnixListener::bind(&self.config.socket_path).with_context(|| {
            format!(
                "failed to bind unix socket at {}",
                self.config.socket_path.display()
            )
        })?;
        info!(
            "wordgrid daemon listening on {}",
            self.config.socket_path.display()
        );

        loop {
            let (stream, _) = listener.accept().await?;
            let workspace = self.workspace.clone();
            let timeout_ms = self.config.request_timeout_ms;
            tokio::spawn(async move {
                if let Err(error) = handle_connection(stream, workspace, timeout_ms).await {
                    warn!("connection closed with error: {error:#}");
                }
            });
        }
    }

    async fn prepare_socket_path(&self) -> Result<()> {
        if let Some(parent) = Path::new(&self.config.socket_path).parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create socket directory {}", parent.display())
            })?;
        }
        Ok(())
    }
}

async fn handle_connection(
    stream: UnixStream,
    workspace: Arc<Workspace>,
    timeout_ms: u64,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = process_line(&line, &workspace, timeout_ms).await;
        let payload = serde_json::to_string(&response)?;
        writer.write_all(payload.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    Ok(())
}

async fn process_line(line: &str, workspace: &Workspace, timeout_ms: u64) -> DaemonResponse {
    match serde_json::from_str::<DaemonRequest>(line) {
        Ok(request) => handle_request(request, workspace, timeout_ms).await,
        Err(error) => {
            error!("invalid request JSON: {error}");
            DaemonResponse {
                id: String::new(),
                body: ResponseBody::Error(ErrorResponse::new(
                    ErrorCode::InvalidRequest,
                    format!("invalid JSON payload: {error}"),
                )),
            }
        }
    }
}

async fn handle_request(
    request: DaemonRequest,
    workspace: &Workspace,
    timeout_ms: u64,
) -> DaemonResponse {
    let id = request.id;
    let limit = Duration::from_millis(timeout_ms.max(1));
    let body = match timeout(limit, workspace.handle(request.body)).await {
        Ok(body) => body,
        Err(_) => ResponseBody::Error(ErrorResponse::new(
            ErrorCode::Timeout,
            format!("request exceeded {}ms", limit.as_millis()),
        )),
    };
    DaemonResponse { id, body }
}
