//! Recording sessions: raw input notifications in, timed macro events out.
//!
//! Platform listeners deliver [`InputNotification`]s one at a time to
//! [`Recorder::handle`]. The session owns the inter-event delay baseline,
//! appends whole events atomically to a shared buffer, and mirrors them to
//! an optional subscriber channel so a presentation layer can follow along
//! without the core knowing about it.

use crate::adapters::{InputNotification, KeySym, Rect, ScreenCapture, WindowControl};
use crate::anchor::{Anchor, ANCHOR_PAD};
use crate::config::RecorderConfig;
use crate::error::{MacroError, MacroResult};
use crate::event::MacroEvent;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;

/// Delay stored on the window-geometry prelude event.
const WINDOW_PRELUDE_DELAY: f64 = 0.05;

/// One recording session.
///
/// Multiple independent sessions may coexist (each owns its own delay
/// baseline); only starting the *same* session twice is rejected.
pub struct Recorder {
    config: RecorderConfig,
    capture: Option<Arc<dyn ScreenCapture>>,
    windows: Option<Arc<dyn WindowControl>>,
    events: Arc<Mutex<Vec<MacroEvent>>>,
    running: Arc<AtomicBool>,
    last_tick: Mutex<Instant>,
    subscriber: Mutex<Option<mpsc::Sender<MacroEvent>>>,
}

impl Recorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            capture: None,
            windows: None,
            events: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            last_tick: Mutex::new(Instant::now()),
            subscriber: Mutex::new(None),
        }
    }

    /// Bind a screen capture collaborator (enables anchor grabbing).
    pub fn with_capture(mut self, capture: Arc<dyn ScreenCapture>) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Bind a window geometry collaborator (enables the restore prelude).
    pub fn with_window_control(mut self, windows: Arc<dyn WindowControl>) -> Self {
        self.windows = Some(windows);
        self
    }

    /// Subscribe to the live event stream. Replaces any prior subscriber.
    pub fn subscribe(&self) -> mpsc::Receiver<MacroEvent> {
        let (tx, rx) = mpsc::channel();
        *self.subscriber.lock() = Some(tx);
        rx
    }

    /// Begin a new take. Clears previously recorded events.
    pub fn start(&self) -> MacroResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(MacroError::Busy);
        }

        self.events.lock().clear();
        *self.last_tick.lock() = Instant::now();

        if self.config.record_window {
            if let Some(windows) = &self.windows {
                if let Some(geometry) = windows.active_window() {
                    self.append(MacroEvent::window_restore(WINDOW_PRELUDE_DELAY, &geometry));
                }
            }
        }

        tracing::info!("recording started");
        Ok(())
    }

    /// Stop the session. Idempotent; notifications arriving after stop are
    /// dropped.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::info!("recording stopped ({} events)", self.events.lock().len());
        }
    }

    pub fn is_recording(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<MacroEvent> {
        self.events.lock().clone()
    }

    /// Drain the recorded sequence out of the session.
    pub fn take(&self) -> Vec<MacroEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Deliver one raw notification from a listener.
    ///
    /// Listener callbacks must never die with the session still running,
    /// so anything that goes wrong in here (a failed anchor grab, mostly)
    /// is logged and swallowed.
    pub fn handle(&self, notification: InputNotification) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }

        let delay = {
            let mut last = self.last_tick.lock();
            let now = Instant::now();
            let delay = now.duration_since(*last).as_secs_f64();
            *last = now;
            delay
        };

        let event = match notification {
            InputNotification::MouseMove { x, y } => MacroEvent::mouse_move(delay, x, y),
            InputNotification::MouseClick { x, y, button, pressed } => {
                let mut event = MacroEvent::mouse_click(delay, x, y, button, pressed);
                if pressed && self.config.capture_anchors {
                    self.attach_anchor(&mut event, x, y);
                }
                event
            }
            InputNotification::MouseScroll { x, y, dx, dy } => {
                MacroEvent::mouse_scroll(delay, x, y, dx, dy)
            }
            InputNotification::Key { key, pressed } => {
                let id = normalize_key(&key);
                if pressed {
                    MacroEvent::key_down(delay, &id)
                } else {
                    MacroEvent::key_up(delay, &id)
                }
            }
        };

        self.append(event);
    }

    /// Grab the fixed-size patch around a click point and embed it.
    ///
    /// The capture origin is clamped at the virtual desktop's origin but
    /// the stored offset stays `[ANCHOR_PAD, ANCHOR_PAD]` either way, so
    /// anchors grabbed near an edge can carry a skewed offset. Existing
    /// macro files rely on this, so it stays.
    fn attach_anchor(&self, event: &mut MacroEvent, x: f64, y: f64) {
        let Some(capture) = &self.capture else { return };

        let region = Rect::new(
            (x as i64 - ANCHOR_PAD).max(0),
            (y as i64 - ANCHOR_PAD).max(0),
            (ANCHOR_PAD * 2) as u32,
            (ANCHOR_PAD * 2) as u32,
        );
        match capture.capture(region) {
            Ok(patch) => {
                let anchor = Anchor::new(patch, (ANCHOR_PAD, ANCHOR_PAD));
                if let Err(e) = anchor.embed(event) {
                    tracing::warn!("anchor encoding failed: {e}");
                }
            }
            Err(e) => tracing::warn!("anchor capture failed: {e}"),
        }
    }

    fn append(&self, event: MacroEvent) {
        self.events.lock().push(event.clone());
        if let Some(tx) = &*self.subscriber.lock() {
            // A gone subscriber is not the recorder's problem
            let _ = tx.send(event);
        }
    }
}

/// Normalize a raw key identity to its stable textual form: the literal
/// character when printable, the lowercase symbolic name otherwise.
/// Legacy `Key.enter`-style names lose their prefix.
fn normalize_key(key: &KeySym) -> String {
    match key {
        KeySym::Char(c) => c.to_string(),
        KeySym::Named(name) => {
            let name = name.strip_prefix("Key.").unwrap_or(name);
            name.to_ascii_lowercase()
        }
    }
}
