//! ==============================================================================
//! watchface.rs - the watch face runtime
//! ==============================================================================
//!
//! purpose:
//!     WatchFaceState is everything the face knows: the status snapshot, the
//!     history buffers and the open dialog. WatchFace pairs that state with
//!     the store it drains and the sink it sends commands to.
//!
//! lifecycle:
//!     - constructed at startup with empty, stale history
//!     - `start` asks the phone for initial data and polls once
//!     - `poll` runs on the poll timer: drain events, merge history, read
//!       status, expire the confirmation prompt
//!     - `dispatch` runs for each wearer input
//!     - `render` is the only reader, and is refused while a dialog is open
//!
//! relationships:
//!     - uses: mailbox.rs, history.rs, snapshot.rs, dialog.rs, view.rs,
//!             settings.rs, command.rs
//!     - used by: main.rs
//!
//! ==============================================================================

use anyhow::Result;
use serde_json::json;
use tracing::{debug, info};

use crate::command::{Command, CommandSink};
use crate::config::WatchConfig;
use crate::dialog::{DialogEvent, DialogState, Effect};
use crate::domain::{Timestamp, MINUTE_MS};
use crate::events::InboundEvent;
use crate::history::{HistoryData, RetentionPolicy};
use crate::mailbox::Mailbox;
use crate::settings::WatchSettings;
use crate::snapshot::StatusSnapshot;
use crate::store::KvStore;
use crate::view::{FaceView, RenderInput};

pub const DEBUG_KEY_PREFIX: &str = "aaps.debug.";

#[derive(Debug, Clone, Default)]
pub struct WatchFaceState {
    pub snapshot: StatusSnapshot,
    pub history: HistoryData,
    pub dialog: DialogState,
    /// minute (since epoch) of the last render
    last_drawn_minute: Option<Timestamp>,
}

impl WatchFaceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render_input(&self) -> RenderInput<'_> {
        RenderInput::new(&self.snapshot, &self.history)
    }

    fn minute_changed(&self, now: Timestamp) -> bool {
        self.last_drawn_minute != Some(now / MINUTE_MS)
    }
}

/// what a poll found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub events: usize,
    pub status_updated: bool,
    pub batches: usize,
    pub redraw: bool,
}

pub struct WatchFace<S, C> {
    state: WatchFaceState,
    store: S,
    sink: C,
    mailbox: Mailbox,
    retention: RetentionPolicy,
    confirm_timeout: Timestamp,
    window_ms: Timestamp,
    settings: WatchSettings,
    debug_slot: u32,
}

impl<S: KvStore, C: CommandSink> WatchFace<S, C> {
    pub fn new(store: S, sink: C, config: &WatchConfig) -> Self {
        let settings = WatchSettings::load(&store);
        let retention = config.history.retention();
        Self {
            state: WatchFaceState::new(),
            store,
            sink,
            mailbox: Mailbox::new(config.store.event_slots),
            retention,
            confirm_timeout: config.dialog.confirm_timeout_ms(),
            window_ms: retention.window_ms,
            settings,
            debug_slot: 0,
        }
    }

    pub fn state(&self) -> &WatchFaceState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Ask the phone for a full resync and take a first look at the mailbox.
    pub fn start(&mut self, now: Timestamp) -> PollOutcome {
        self.sink.send(Command::RequestInitialData);
        self.poll(now)
    }

    /// One poll cycle. Never fails: anything unreadable is logged and skipped.
    pub fn poll(&mut self, now: Timestamp) -> PollOutcome {
        let mut outcome = PollOutcome::default();

        for event in self.mailbox.drain_events(&mut self.store) {
            outcome.events += 1;
            match event {
                InboundEvent::ConfirmAction(prompt) => {
                    info!(message = %prompt.message, "confirmation requested, buzzing");
                    self.dispatch(DialogEvent::ConfirmRequested(prompt), now);
                }
                InboundEvent::Unknown(event_type) => {
                    info!(%event_type, "ignoring event");
                }
            }
        }

        for batch in self.mailbox.take_all_history(&mut self.store) {
            let stream = batch.stream();
            let accepted = self.state.history.apply_batch(batch, now, &self.retention);
            info!(?stream, accepted, "history batch merged");
            outcome.batches += 1;
        }

        // live status after history, so a stale reset cannot wipe it
        if let Some(status) = self.mailbox.read_status(&self.store) {
            let change = self.state.snapshot.apply(status);
            if change.updated {
                debug!(ts = self.state.snapshot.ts, "status updated");
                self.state
                    .history
                    .record_status(&self.state.snapshot, change, now, &self.retention);
                outcome.status_updated = true;
            }
        }
        self.state.history.prune(now, &self.retention);

        let dialog_closed = self.dispatch(DialogEvent::Tick, now);

        outcome.redraw = !self.state.dialog.is_active()
            && (dialog_closed
                || outcome.status_updated
                || outcome.batches > 0
                || self.state.minute_changed(now));
        outcome
    }

    /// Feed one wearer input (or a prompt / tick) through the dialog state
    /// machine and carry out its effect. Returns true if the face should be
    /// redrawn.
    pub fn dispatch(&mut self, event: DialogEvent, now: Timestamp) -> bool {
        let was_active = self.state.dialog.is_active();
        let current = std::mem::take(&mut self.state.dialog);
        let transition = current.handle(event, now, self.confirm_timeout);
        self.state.dialog = transition.state;

        match transition.effect {
            Some(Effect::Send(command)) => self.sink.send(command),
            Some(Effect::Refresh) => self.refresh_data(),
            None => {}
        }

        was_active && !self.state.dialog.is_active()
    }

    /// Drop buffered history at the next batch and ask the phone for all of it.
    pub fn refresh_data(&mut self) {
        info!("refreshing data");
        self.state.history.mark_stale();
        self.sink.send(Command::RequestInitialData);
    }

    /// Build the face, unless a dialog is covering it.
    pub fn render(&mut self, now: Timestamp) -> Option<FaceView> {
        if self.state.dialog.is_active() {
            return None;
        }
        self.state.last_drawn_minute = Some(now / MINUTE_MS);
        Some(FaceView::build(&self.state.render_input(), now, self.window_ms))
    }

    /// Write the next rotating debug dump, if enabled. Returns its key.
    pub fn housekeeping(&mut self, now: Timestamp) -> Result<Option<String>> {
        if self.settings.debug_logs == 0 {
            return Ok(None);
        }
        self.debug_slot = (self.debug_slot + 1) % self.settings.debug_logs;
        let key = format!("{DEBUG_KEY_PREFIX}{}", self.debug_slot);

        let history = &self.state.history;
        let dump = json!({
            "ts": now,
            "stale": history.is_stale(),
            "lengths": {
                "glucose": history.glucose.len(),
                "treatments": history.treatments.len(),
                "basals": history.basals.len(),
            },
            "basals": history.basals.as_slice(),
            "snapshot": &self.state.snapshot,
        });
        self.store.write_json(&key, &dump)?;
        debug!(%key, "wrote debug dump");
        Ok(Some(key))
    }
}
