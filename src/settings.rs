//! Wearer settings, kept as JSON in the store next to the mailbox files.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::KvStore;

pub const SETTINGS_KEY: &str = "aaps.settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WatchSettings {
    /// app launched by each swipe, empty for none
    pub swipe_up: String,
    pub swipe_down: String,
    pub swipe_left: String,
    pub swipe_right: String,
    pub swipe_bottom_up: String,
    /// how many rotating debug dumps to keep, 0 disables them
    pub debug_logs: u32,
    #[serde(rename = "uploadHR")]
    pub upload_hr: bool,
    pub upload_steps: bool,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            swipe_up: String::new(),
            swipe_down: "messages".to_string(),
            swipe_left: String::new(),
            swipe_right: String::new(),
            swipe_bottom_up: String::new(),
            debug_logs: 0,
            upload_hr: false,
            upload_steps: false,
        }
    }
}

impl WatchSettings {
    /// Settings from the store; anything missing or unreadable falls back to defaults.
    pub fn load<S: KvStore>(store: &S) -> Self {
        match store.read_json(SETTINGS_KEY) {
            Ok(Some(settings)) => settings,
            Ok(None) => Self::default(),
            Err(e) => {
                warn!("ignoring settings: {:#}", e);
                Self::default()
            }
        }
    }

    pub fn save<S: KvStore>(&self, store: &mut S) -> Result<()> {
        store.write_json(SETTINGS_KEY, self)
    }
}
