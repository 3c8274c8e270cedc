//! macroplay - record and replay input macros with visual anchors.
//!
//! A macro is an ordered sequence of timed events (mouse, keyboard, text,
//! waits, conditional waits). Recording turns raw input notifications into
//! that sequence; playback replays it through a synthetic input adapter
//! with responsive cancellation and speed control. Clicks can carry a
//! small captured image patch ("anchor") that playback re-locates across
//! monitors and template scales, so macros survive windows that moved or
//! displays that changed resolution.
//!
//! Platform concerns (screen capture, input injection, window control,
//! OCR, URL opening) are collaborator traits in [`adapters`]; the engine
//! works against whatever implementations are bound and degrades
//! gracefully when one is absent.

pub mod adapters;
pub mod anchor;
pub mod config;
pub mod error;
pub mod event;
pub mod matcher;
pub mod player;
pub mod recorder;

pub use adapters::{InputNotification, Key, KeySym, Monitor, MouseButton, Rect, WindowGeometry};
pub use anchor::{Anchor, ANCHOR_PAD};
pub use config::{parse_scales, PlaybackConfig, RecorderConfig};
pub use error::{MacroError, MacroResult};
pub use event::{load_events, save_events, EventKind, MacroEvent};
pub use matcher::{locate, MatchResult};
pub use player::{CancelToken, PlaybackStatus, Player};
pub use recorder::Recorder;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging for binaries and harnesses embedding the
/// engine. Honors `RUST_LOG`; defaults to debug for this crate.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "macroplay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("macroplay v{}", env!("CARGO_PKG_VERSION"));
}
