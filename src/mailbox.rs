//! ==============================================================================
//! mailbox.rs - draining what the phone app left in the store
//! ==============================================================================
//!
//! purpose:
//!     the phone has no way to push to the watch face, so it writes small
//!     files and the watch polls them. every drain is read-then-erase, so
//!     from the buffers' point of view a batch is consumed exactly once.
//!
//! keys:
//!     - aaps.events.00 .. aaps.events.NN   newline-delimited JSON events
//!     - aaps.current.status                 latest status (read, not erased)
//!     - aaps.history.{bg,insulin,basals}    {"data": [...]} history batches
//!
//! failures:
//!     a store read that fails is logged and treated as "nothing new"; the
//!     next poll tries again. a bad line or a bad sample is skipped on its own.
//!
//! ==============================================================================

use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::{parse_sample, Sample};
use crate::events::InboundEvent;
use crate::history::{HistoryBatch, Stream};
use crate::snapshot::StatusSnapshot;
use crate::store::KvStore;

pub const STATUS_KEY: &str = "aaps.current.status";
pub const EVENT_KEY_PREFIX: &str = "aaps.events.";

#[derive(Debug, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy)]
pub struct Mailbox {
    event_slots: usize,
}

impl Mailbox {
    pub fn new(event_slots: usize) -> Self {
        Self { event_slots }
    }

    pub fn event_key(slot: usize) -> String {
        format!("{EVENT_KEY_PREFIX}{slot:02}")
    }

    /// Read and erase every event slot, in slot order.
    pub fn drain_events<S: KvStore>(&self, store: &mut S) -> Vec<InboundEvent> {
        let mut events = Vec::new();
        for slot in 0..self.event_slots {
            let key = Self::event_key(slot);
            let Some(content) = read_logged(store, &key) else {
                continue;
            };
            debug!(%key, "draining event file");
            for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
                match InboundEvent::parse(line) {
                    Ok(event) => events.push(event),
                    Err(e) => warn!(%key, "skipping event line: {:#}", e),
                }
            }
            erase_logged(store, &key);
        }
        events
    }

    /// The latest status record, if present and readable.
    pub fn read_status<S: KvStore>(&self, store: &S) -> Option<StatusSnapshot> {
        let content = read_logged(store, STATUS_KEY)?;
        match serde_json::from_str(&content) {
            Ok(status) => Some(status),
            Err(e) => {
                warn!("unreadable status file: {}", e);
                None
            }
        }
    }

    /// Read and erase one history file.
    pub fn take_history<S: KvStore>(&self, store: &mut S, stream: Stream) -> Option<HistoryBatch> {
        let key = stream.file_name();
        let content = read_logged(store, key)?;
        erase_logged(store, key);

        let file: HistoryFile = match serde_json::from_str(&content) {
            Ok(file) => file,
            Err(e) => {
                warn!(%key, "discarding unreadable history file: {}", e);
                return None;
            }
        };

        let batch = match stream {
            Stream::Glucose => HistoryBatch::Glucose(parse_samples(key, file.data)),
            Stream::Treatments => HistoryBatch::Treatments(parse_samples(key, file.data)),
            Stream::Basals => HistoryBatch::Basals(parse_samples(key, file.data)),
        };
        Some(batch)
    }

    /// Drain all three history files.
    pub fn take_all_history<S: KvStore>(&self, store: &mut S) -> Vec<HistoryBatch> {
        Stream::ALL
            .into_iter()
            .filter_map(|stream| self.take_history(store, stream))
            .collect()
    }
}

fn parse_samples<T>(key: &str, records: Vec<serde_json::Value>) -> Vec<T>
where
    T: Sample + serde::de::DeserializeOwned,
{
    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match parse_sample(record) {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!(%key, index, "skipping sample: {}", e);
                None
            }
        })
        .collect()
}

fn read_logged<S: KvStore>(store: &S, key: &str) -> Option<String> {
    match store.read(key) {
        Ok(content) => content,
        Err(e) => {
            warn!(%key, "store read failed: {:#}", e);
            None
        }
    }
}

fn erase_logged<S: KvStore>(store: &mut S, key: &str) {
    if let Err(e) = store.erase(key) {
        warn!(%key, "store erase failed: {:#}", e);
    }
}
