//! Signal handling for graceful shutdown

use anyhow::{Context, Result};
use tracing::debug;

/// Handles shutdown signals (SIGTERM and SIGINT on Unix, Ctrl-C on Windows)
pub struct ShutdownSignal {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    /// Register the handlers. Done up front so a signal arriving during
    /// startup is not lost.
    #[cfg(unix)]
    pub fn new() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigterm: signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?,
            sigint: signal(SignalKind::interrupt()).context("failed to register SIGINT handler")?,
        })
    }

    #[cfg(not(unix))]
    pub fn new() -> Result<Self> {
        Ok(Self {})
    }

    /// Wait for a shutdown signal
    #[cfg(unix)]
    pub async fn wait(&mut self) {
        tokio::select! {
            _ = self.sigterm.recv() => {
                debug!("received SIGTERM");
            }
            _ = self.sigint.recv() => {
                debug!("received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    pub async fn wait(&mut self) {
        match tokio::signal::ctrl_c().await {
            Ok(()) => debug!("received Ctrl-C"),
            Err(e) => {
                tracing::error!(?e, "failed to listen for Ctrl-C, waiting forever");
                std::future::pending::<()>().await;
            }
        }
    }
}
