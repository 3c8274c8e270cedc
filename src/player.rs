//! Playback engine.
//!
//! One background worker replays a macro sequence at a time: sleep out the
//! event's delay in short cancellable slices, then dispatch it through the
//! synthetic input adapter. Anchored clicks and wait-for-image steps go
//! through the matcher with the run's configuration. A failing event is
//! logged and skipped, never fatal; the only hard stop is cancellation.

use crate::adapters::{
    Key, MouseButton, OcrEngine, ScreenCapture, ScreenshotSink, SyntheticInput, UrlOpener,
    WindowControl,
};
use crate::anchor::{decode_image_base64, Anchor};
use crate::config::PlaybackConfig;
use crate::error::{MacroError, MacroResult};
use crate::event::{EventKind, MacroEvent};
use crate::matcher::locate_with_config;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest uninterruptible sleep slice; cancellation is observed at least
/// this often.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Wheel units per recorded scroll tick.
const SCROLL_UNIT: i64 = 120;

/// Base per-character interval for text steps, before speed scaling.
const TYPE_INTERVAL_SECS: f64 = 0.002;

/// Default wait-for-image budget when the event carries no timeout.
const DEFAULT_WAIT_TIMEOUT_SECS: f64 = 30.0;

/// Interval between wait-for-image polls, in seconds.
const POLL_INTERVAL_SECS: f64 = 0.2;

/// Cooperative cancellation signal for one playback run.
///
/// Checked before every event and inside every sleep/poll loop. Once set
/// it stays set; a fresh run gets a fresh token.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Final outcome of a playback run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackStatus {
    Finished,
    Cancelled,
    Failed(String),
}

/// Sleep in short slices so cancellation interrupts within one slice.
pub fn responsive_sleep(seconds: f64, token: &CancelToken) {
    let deadline = Instant::now() + Duration::from_secs_f64(seconds.max(0.0));
    while !token.is_cancelled() {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}

/// The playback engine. Cheap to clone; clones share the same
/// one-run-at-a-time state.
#[derive(Clone)]
pub struct Player {
    input: Arc<dyn SyntheticInput>,
    capture: Option<Arc<dyn ScreenCapture>>,
    windows: Option<Arc<dyn WindowControl>>,
    ocr: Option<Arc<dyn OcrEngine>>,
    urls: Option<Arc<dyn UrlOpener>>,
    screenshots: Option<Arc<dyn ScreenshotSink>>,
    playing: Arc<AtomicBool>,
    current: Arc<Mutex<Option<CancelToken>>>,
}

impl Player {
    pub fn new(input: Arc<dyn SyntheticInput>) -> Self {
        Self {
            input,
            capture: None,
            windows: None,
            ocr: None,
            urls: None,
            screenshots: None,
            playing: Arc::new(AtomicBool::new(false)),
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Bind a screen capture collaborator (enables anchor matching and
    /// wait-for-image).
    pub fn with_capture(mut self, capture: Arc<dyn ScreenCapture>) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn with_window_control(mut self, windows: Arc<dyn WindowControl>) -> Self {
        self.windows = Some(windows);
        self
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn with_url_opener(mut self, urls: Arc<dyn UrlOpener>) -> Self {
        self.urls = Some(urls);
        self
    }

    pub fn with_screenshots(mut self, screenshots: Arc<dyn ScreenshotSink>) -> Self {
        self.screenshots = Some(screenshots);
        self
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Request cancellation of the active run, if any.
    pub fn cancel(&self) {
        if let Some(token) = &*self.current.lock() {
            token.cancel();
        }
    }

    /// Start a playback run on a background worker.
    ///
    /// Rejected with `Busy` while a run is active. The final status
    /// arrives on the returned channel.
    pub fn start(
        &self,
        events: Vec<MacroEvent>,
        config: PlaybackConfig,
    ) -> MacroResult<mpsc::Receiver<PlaybackStatus>> {
        if self.playing.swap(true, Ordering::SeqCst) {
            return Err(MacroError::Busy);
        }

        let token = CancelToken::new();
        *self.current.lock() = Some(token.clone());

        let (tx, rx) = mpsc::channel();
        let player = self.clone();

        let spawned = std::thread::Builder::new()
            .name("macroplay-playback".to_string())
            .spawn(move || {
                let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    player.run(&events, &config, &token)
                }));
                let status = result.unwrap_or_else(|_| {
                    PlaybackStatus::Failed("playback worker panicked".to_string())
                });

                *player.current.lock() = None;
                player.playing.store(false, Ordering::SeqCst);
                let _ = tx.send(status);
            });

        if let Err(e) = spawned {
            *self.current.lock() = None;
            self.playing.store(false, Ordering::SeqCst);
            return Err(e.into());
        }

        Ok(rx)
    }

    /// Replay a sequence synchronously on the calling thread.
    ///
    /// This is the whole engine; `start` only moves it onto a worker.
    /// The sequence is never mutated.
    pub fn run(
        &self,
        events: &[MacroEvent],
        config: &PlaybackConfig,
        token: &CancelToken,
    ) -> PlaybackStatus {
        tracing::info!(events = events.len(), speed = config.speed, "playback started");

        if config.restore_window {
            self.restore_window(events);
        }

        for (index, event) in events.iter().enumerate() {
            if token.is_cancelled() {
                tracing::info!(index, "playback cancelled");
                return PlaybackStatus::Cancelled;
            }

            if event.delay > 0.0 {
                responsive_sleep(event.delay / config.speed_divisor(), token);
            }
            if token.is_cancelled() {
                tracing::info!(index, "playback cancelled");
                return PlaybackStatus::Cancelled;
            }

            // Best-effort completion: one bad event never aborts the rest.
            if let Err(e) = self.dispatch(event, config, token) {
                tracing::warn!(index, kind = %event.kind, "event skipped: {e}");
            }
        }

        tracing::info!("playback finished");
        PlaybackStatus::Finished
    }

    fn dispatch(
        &self,
        event: &MacroEvent,
        config: &PlaybackConfig,
        token: &CancelToken,
    ) -> MacroResult<()> {
        match &event.kind {
            EventKind::MouseMove => {
                let (x, y) = coordinates(event)?;
                self.input.move_pointer(x, y)
            }
            EventKind::MouseClick => self.dispatch_click(event, config),
            EventKind::MouseScroll => {
                // Horizontal scroll is recorded but not replayed
                let dy = event.scroll_dy().unwrap_or(0);
                self.input.scroll(dy * SCROLL_UNIT)
            }
            EventKind::KeyDown => self.dispatch_key(event, true),
            EventKind::KeyUp => self.dispatch_key(event, false),
            EventKind::Text => {
                let text = event
                    .text_value()
                    .ok_or_else(|| MacroError::DispatchFailure("text event without text".into()))?;
                let interval = Duration::from_secs_f64(TYPE_INTERVAL_SECS / config.speed_divisor());
                self.input.type_text(text, interval)
            }
            EventKind::Wait => Ok(()),
            EventKind::WaitForImage => self.wait_for_image(event, config, token),
            EventKind::Screenshot => self.dispatch_screenshot(event),
            EventKind::OcrRegion => self.dispatch_ocr(event),
            EventKind::OpenUrl => {
                let Some(urls) = &self.urls else {
                    tracing::debug!("no URL opener bound, open_url skipped");
                    return Ok(());
                };
                let url = event
                    .url()
                    .ok_or_else(|| MacroError::DispatchFailure("open_url without url".into()))?;
                urls.open(url)
            }
            // Applied in the pre-pass, inert during the timed walk
            EventKind::WindowRestore => Ok(()),
            EventKind::Other(name) => {
                tracing::debug!(kind = %name, "unknown event kind skipped");
                Ok(())
            }
        }
    }

    /// Click presses re-locate their target through the anchor when one is
    /// embedded; on a miss the recorded coordinates are used as-is.
    /// Releases replay the recorded button directly.
    fn dispatch_click(&self, event: &MacroEvent, config: &PlaybackConfig) -> MacroResult<()> {
        let button = event.button().unwrap_or(MouseButton::Left);
        let pressed = event.pressed().unwrap_or(true);

        if !pressed {
            return self.input.button(button, false);
        }

        let (mut x, mut y) = coordinates(event)?;
        if let Some(capture) = &self.capture {
            if let Some(anchor) = Anchor::extract(event) {
                match locate_with_config(capture.as_ref(), &anchor.image, config) {
                    Some(found) => {
                        x = found.x + anchor.offset.0;
                        y = found.y + anchor.offset.1;
                        tracing::debug!(
                            score = found.score,
                            scale = found.scale,
                            x,
                            y,
                            "anchor re-located click target"
                        );
                    }
                    None => {
                        tracing::debug!("anchor not found, using recorded coordinates");
                    }
                }
            }
        }

        self.input.move_pointer(x, y)?;
        self.input.button(button, true)
    }

    fn dispatch_key(&self, event: &MacroEvent, pressed: bool) -> MacroResult<()> {
        let id = event
            .key()
            .ok_or_else(|| MacroError::DispatchFailure("key event without key".into()))?;
        match Key::from_identifier(id) {
            Some(key) => self.input.key(key, pressed),
            None => {
                tracing::debug!(key = id, "unmapped key skipped");
                Ok(())
            }
        }
    }

    /// Poll the matcher until the embedded anchor appears, the timeout
    /// budget runs out, or the run is cancelled. Timeouts are reported as
    /// an error so the caller logs them, but playback continues.
    fn wait_for_image(
        &self,
        event: &MacroEvent,
        config: &PlaybackConfig,
        token: &CancelToken,
    ) -> MacroResult<()> {
        let Some(capture) = &self.capture else {
            tracing::debug!("no capture bound, wait_for_image skipped");
            return Ok(());
        };
        let anchor = Anchor::extract(event).ok_or_else(|| {
            MacroError::DispatchFailure("wait_for_image without a decodable anchor".into())
        })?;

        let timeout = event.timeout().unwrap_or(DEFAULT_WAIT_TIMEOUT_SECS);
        let deadline = Instant::now() + Duration::from_secs_f64(timeout.max(0.0));

        while Instant::now() < deadline && !token.is_cancelled() {
            if let Some(found) = locate_with_config(capture.as_ref(), &anchor.image, config) {
                tracing::debug!(score = found.score, "wait_for_image satisfied");
                return Ok(());
            }
            responsive_sleep(POLL_INTERVAL_SECS, token);
        }

        if token.is_cancelled() {
            return Ok(());
        }
        Err(MacroError::Timeout(timeout))
    }

    fn dispatch_screenshot(&self, event: &MacroEvent) -> MacroResult<()> {
        let Some(sink) = &self.screenshots else {
            tracing::debug!("no screenshot sink bound, screenshot skipped");
            return Ok(());
        };
        let encoded = event.image_b64().ok_or_else(|| {
            MacroError::DispatchFailure("screenshot event without image data".into())
        })?;
        let frame = decode_image_base64(encoded)?;
        sink.save(&frame)
    }

    fn dispatch_ocr(&self, event: &MacroEvent) -> MacroResult<()> {
        let (Some(ocr), Some(capture)) = (&self.ocr, &self.capture) else {
            tracing::debug!("OCR or capture not bound, ocr_region skipped");
            return Ok(());
        };
        let region = event
            .region()
            .ok_or_else(|| MacroError::DispatchFailure("ocr_region without region".into()))?;
        let frame = capture.capture(region)?;
        let text = ocr.recognize(&frame)?;
        tracing::info!(chars = text.len(), "OCR result: {text}");
        Ok(())
    }

    /// Apply the first recorded window geometry before the timed walk.
    /// Best-effort all the way down; nothing here can fail the run.
    fn restore_window(&self, events: &[MacroEvent]) {
        let Some(windows) = &self.windows else {
            tracing::debug!("no window control bound, restore skipped");
            return;
        };
        let Some(event) = events.iter().find(|e| e.kind == EventKind::WindowRestore) else {
            return;
        };
        let Some(geometry) = event.window_geometry() else {
            tracing::warn!("window_restore event with unusable geometry");
            return;
        };

        let target = if geometry.title.is_empty() {
            windows.active_window()
        } else {
            windows
                .find_by_title(&geometry.title)
                .into_iter()
                .next()
                .or_else(|| windows.active_window())
        };

        match target {
            Some(target) => {
                if let Err(e) = windows.resize_and_move(
                    &target,
                    geometry.x,
                    geometry.y,
                    geometry.width,
                    geometry.height,
                ) {
                    tracing::warn!("window restore failed: {e}");
                }
            }
            None => tracing::debug!("no window to restore"),
        }
    }
}

fn coordinates(event: &MacroEvent) -> MacroResult<(i64, i64)> {
    match (event.x(), event.y()) {
        (Some(x), Some(y)) => Ok((x as i64, y as i64)),
        _ => Err(MacroError::DispatchFailure(format!(
            "{} event without coordinates",
            event.kind
        ))),
    }
}
