use anyhow::Result;
use tokio::sync::watch;
use tracing::{info, warn};

/// Graceful shutdown coordinator for the lifecycle driver
pub struct ShutdownCoordinator {
    sender: watch::Sender<bool>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self { sender }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
        }
    }

    /// Signal every subscriber to stop
    pub fn trigger(&self) {
        info!("Initiating graceful shutdown...");
        self.sender.send_replace(true);
    }

    /// Wait for Ctrl-C and then trigger shutdown
    pub async fn wait_for_ctrl_c(&self) -> Result<()> {
        info!("Shutdown coordinator ready - will shutdown gracefully on SIGINT");

        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            return Err(e.into());
        }

        self.trigger();
        Ok(())
    }
}

/// Receiving half handed to long-running tasks
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once shutdown has been triggered or the coordinator is gone
    pub async fn recv(&mut self) {
        while !*self.receiver.borrow_and_update() {
            if self.receiver.changed().await.is_err() {
                return;
            }
        }
    }
}
