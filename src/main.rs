//! ==============================================================================
//! main.rs - watch face runtime entry point
//! ==============================================================================
//!
//! purpose:
//!     runs the watch face against a directory-backed store that the phone
//!     app writes into, and delivers commands to the phone over its local
//!     HTTP bridge. there is no screen here: the face is printed whenever it
//!     would be redrawn, and wearer input comes from stdin, one word per line.
//!
//! responsibilities:
//!     - load configuration and set up logging
//!     - open the store and the command bridge
//!     - request initial data, then poll the mailbox on a timer
//!     - redraw on the minute, on new data, and after a dialog closes
//!     - write rotating debug dumps when the wearer enabled them
//!
//! relationships:
//!     - uses: watchface.rs (all state and decisions)
//!     - uses: store.rs (FileStore), bridge.rs (HttpBridge), console.rs
//!     - reads: config/watchface.toml (via config.rs)
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────┐
//!     │               single-threaded loop (this file)            │
//!     │  ┌──────────┐ ┌──────────┐ ┌──────────────┐ ┌─────────┐  │
//!     │  │ poll 5s  │ │ clock 60s│ │ housekeeping │ │  stdin  │  │
//!     │  └────┬─────┘ └────┬─────┘ └──────┬───────┘ └────┬────┘  │
//!     │       └────────────┴──────┬───────┴──────────────┘       │
//!     │                     ┌─────┴─────┐                        │
//!     │                     │ WatchFace │ <- watchface.rs        │
//!     │                     └─────┬─────┘                        │
//!     └───────────────────────────┼──────────────────────────────┘
//!                    ┌────────────┴────────────┐
//!                    ▼                         ▼
//!             ┌─────────────┐          ┌──────────────┐
//!             │  FileStore  │          │  HttpBridge  │
//!             │ (mailbox)   │          │ (commands)   │
//!             └─────────────┘          └──────────────┘
//!
//! ==============================================================================

use anyhow::Result;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use aaps_watchface::bridge::HttpBridge;
use aaps_watchface::config::{LoggingConfig, WatchConfig};
use aaps_watchface::console::{parse_console_command, HELP};
use aaps_watchface::domain::Timestamp;
use aaps_watchface::command::CommandSink;
use aaps_watchface::store::{FileStore, KvStore};
use aaps_watchface::view::FaceView;
use aaps_watchface::watchface::WatchFace;

// ==============================================================================
// logging
// ==============================================================================
// RUST_LOG wins over the configured level so a single run can be turned up
// without touching the config file.

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn now_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as Timestamp)
}

fn print_face(view: &FaceView) {
    let trend = view.trend.map_or("", |t| t.arrow());
    let age = view.age_minutes.map(|m| format!(" ({m}m)")).unwrap_or_default();
    println!(
        "[FACE] {}{} {} {} | {} | {} | {} | buf {}",
        view.glucose,
        if view.glucose_out_of_range { "!" } else { "" },
        trend,
        view.delta,
        view.basal,
        view.cob,
        view.iob,
        view.buffer_lengths
    );
    if !age.is_empty() || view.reading_old {
        println!("[FACE] reading age{}{}", age, if view.reading_old { " - old" } else { "" });
    }
}

fn redraw<S: KvStore, C: CommandSink>(face: &mut WatchFace<S, C>, now: Timestamp) {
    if let Some(view) = face.render(now) {
        print_face(&view);
    }
}

fn print_dialog<S: KvStore, C: CommandSink>(face: &WatchFace<S, C>) {
    let dialog = &face.state().dialog;
    if let Some(title) = dialog.title() {
        println!("[DIALOG] {} - {:?}", title, dialog);
    }
}

// ==============================================================================
// main entry point
// ==============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    println!("===========================================================");
    println!("  AAPS Watch Face");
    println!("===========================================================");

    // step 1: configuration and logging
    let config = WatchConfig::load_or_default();
    config.print_summary();
    init_tracing(&config.logging);

    // step 2: store and command bridge
    let store = match FileStore::open(&config.store.root_dir) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("[ERROR] Fatal: cannot open store: {:#}", e);
            return Err(e);
        }
    };
    let bridge = HttpBridge::new(&config.bridge)?;
    println!("[STARTUP] ✓ Store at {}", store.root().display());
    println!("[STARTUP] ✓ Commands go to {}", bridge.command_url());

    // step 3: first contact with the phone
    let mut face = WatchFace::new(store, bridge, &config);
    let now = now_ms();
    if face.start(now).redraw {
        redraw(&mut face, now);
    }

    // step 4: main loop
    let mut poll = tokio::time::interval(Duration::from_secs(config.polling.interval_seconds));
    let mut clock = tokio::time::interval(Duration::from_secs(config.polling.clock_seconds.max(1)));
    let mut housekeeping =
        tokio::time::interval(Duration::from_secs(config.polling.housekeeping_seconds.max(1)));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut console_open = true;
    // must outlive single loop iterations
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    println!("\n[RUNTIME] Polling every {}s. Commands:\n{}", config.polling.interval_seconds, HELP);
    println!("────────────────────────────────────────────────────────────");

    loop {
        tokio::select! {
            _ = poll.tick() => {
                let now = now_ms();
                let outcome = face.poll(now);
                if outcome.events > 0 {
                    print_dialog(&face);
                }
                if outcome.redraw {
                    redraw(&mut face, now);
                }
            }
            _ = clock.tick() => redraw(&mut face, now_ms()),
            _ = housekeeping.tick() => {
                if let Err(e) = face.housekeeping(now_ms()) {
                    warn!("debug dump failed: {:#}", e);
                }
            }
            line = lines.next_line(), if console_open => {
                match line {
                    Ok(Some(line)) => match parse_console_command(&line) {
                        Some(event) => {
                            let now = now_ms();
                            if face.dispatch(event, now) {
                                redraw(&mut face, now);
                            }
                            print_dialog(&face);
                        }
                        None if line.trim().is_empty() => {}
                        None => println!("[CONSOLE] unknown command: {}", line.trim()),
                    },
                    Ok(None) => {
                        info!("stdin closed, console input disabled");
                        console_open = false;
                    }
                    Err(e) => {
                        warn!("console read failed: {}", e);
                        console_open = false;
                    }
                }
            }
            _ = &mut ctrl_c => {
                println!("\n[RUNTIME] Shutting down");
                return Ok(());
            }
        }
    }
}
