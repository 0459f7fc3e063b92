//! inbound events from the phone app (one JSON object per mailbox line)

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::command::Command;

/// the phone wants the wearer to confirm something before it acts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPrompt {
    pub message: String,
    pub return_command_type: String,
    /// echoed back verbatim when the wearer confirms
    #[serde(default)]
    pub return_command_json: serde_json::Value,
}

impl ConfirmPrompt {
    /// message with the phone's `<br/>` markers turned into line breaks
    pub fn lines(&self) -> Vec<&str> {
        self.message
            .split("<br/>")
            .flat_map(|chunk| chunk.split('\n'))
            .filter(|line| !line.is_empty())
            .collect()
    }

    pub fn confirmed_command(&self) -> Command {
        Command::Raw {
            command_type: self.return_command_type.clone(),
            json: self.return_command_json.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    ConfirmAction(ConfirmPrompt),
    /// anything we do not handle, kept by type name for the log
    Unknown(String),
}

impl InboundEvent {
    pub fn parse(line: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(line).context("event is not JSON")?;
        let event_type = value
            .get("eventType")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| anyhow!("event has no eventType"))?
            .to_string();

        match event_type.as_str() {
            "ConfirmAction" => {
                let prompt = serde_json::from_value(value).context("malformed ConfirmAction")?;
                Ok(InboundEvent::ConfirmAction(prompt))
            }
            _ => Ok(InboundEvent::Unknown(event_type)),
        }
    }
}
