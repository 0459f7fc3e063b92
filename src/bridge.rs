//! ==============================================================================
//! bridge.rs - http bridge to the phone app
//! ==============================================================================
//!
//! purpose:
//!     the phone app listens on a local port and accepts commands as
//!     GET {base}/command?commandType=<type>&commandJson=<url-encoded json>
//!
//! delivery:
//!     fire-and-forget. each command runs on its own task, the reply body is
//!     logged, failures are logged, nothing is retried. the poll loop never
//!     waits on the network.
//!
//! relationships:
//!     - implements: command.rs (CommandSink)
//!     - used by: main.rs
//!
//! ==============================================================================

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::command::{Command, CommandSink};
use crate::config::BridgeConfig;

#[derive(Debug, Clone)]
pub struct HttpBridge {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBridge {
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn command_url(&self) -> String {
        format!("{}/command", self.base_url)
    }

    /// Send one command and return the phone's reply body.
    pub async fn request(&self, command: &Command) -> Result<String> {
        let payload = command.payload_text();
        let response = self
            .client
            .get(self.command_url())
            .query(&[("commandType", command.command_type()), ("commandJson", payload.as_str())])
            .send()
            .await
            .with_context(|| format!("failed to send {}", command.command_type()))?
            .error_for_status()
            .context("phone app rejected the command")?;
        response.text().await.context("failed to read reply")
    }
}

impl CommandSink for HttpBridge {
    fn send(&self, command: Command) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(command = command.command_type(), "no async runtime, command dropped");
            return;
        };
        let bridge = self.clone();
        info!(command = command.command_type(), payload = %command.payload_text(), "sending command");
        handle.spawn(async move {
            match bridge.request(&command).await {
                Ok(reply) => info!(command = command.command_type(), %reply, "phone replied"),
                Err(e) => warn!(command = command.command_type(), "command failed: {:#}", e),
            }
        });
    }
}
