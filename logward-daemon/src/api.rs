//! Local API server collaborator handle.
//!
//! The real API surface is an external subsystem; the daemon owns a
//! minimal status listener so the reload orchestrator has a concrete
//! stage to start and stop per generation. Every connection receives a
//! one-line JSON status naming the active pipeline generation.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Handle to the running status listener of one pipeline generation.
pub struct ApiServer {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl ApiServer {
    /// Bind the listener and spawn the accept loop.
    pub async fn start(bind: &str, generation: u64) -> Result<Self> {
        let listener = TcpListener::bind(bind)
            .await
            .with_context(|| format!("failed to bind api server to {bind}"))?;
        let local_addr = listener.local_addr().context("api server local_addr")?;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    accepted = listener.accept() => {
                        let Ok((mut socket, _)) = accepted else { continue };
                        let status = serde_json::json!({
                            "status": "ok",
                            "generation": generation,
                        })
                        .to_string();
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status.len(),
                            status
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    }
                }
            }
        });

        tracing::info!(addr = %local_addr, generation, "api server listening");
        Ok(Self {
            local_addr,
            cancel,
            task,
        })
    }

    /// Address the listener actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and wait for the accept loop to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}
