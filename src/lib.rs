//! ==============================================================================
//! aaps_watchface - watch face companion for AndroidAPS
//! ==============================================================================
//!
//! purpose:
//!     mirrors the phone's glucose, insulin and basal status on a watch face,
//!     keeps a 90 minute history of each for the graph, and lets the wearer
//!     start treatments that the phone confirms before delivery.
//!
//! structure:
//!     - domain.rs      sample types, units, parsing
//!     - buffer.rs      time-ordered sample buffer (insert, merge, evict)
//!     - history.rs     the three buffers, watermarks, stale reset
//!     - snapshot.rs    latest status record
//!     - store.rs       key-value file store
//!     - mailbox.rs     draining the files the phone drops in the store
//!     - events.rs      inbound event lines
//!     - command.rs     outbound commands
//!     - bridge.rs      HTTP delivery of commands
//!     - dialog.rs      menus, number entry, confirmation
//!     - view.rs        what the face shows
//!     - settings.rs    wearer settings
//!     - config.rs      runtime configuration
//!     - console.rs     terminal input
//!     - watchface.rs   everything above, wired together
//!
//! ==============================================================================

pub mod bridge;
pub mod buffer;
pub mod command;
pub mod config;
pub mod console;
pub mod dialog;
pub mod domain;
pub mod events;
pub mod history;
pub mod mailbox;
pub mod settings;
pub mod snapshot;
pub mod store;
pub mod view;
pub mod watchface;
