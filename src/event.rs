//! Macro event model and file format.
//!
//! A macro is an ordered sequence of [`MacroEvent`]s. Each event carries a
//! kind, the delay in seconds since the previous event, and a kind-specific
//! payload map. The payload stays a generic JSON map rather than a typed
//! struct per kind: macro files must load with unknown payload keys intact
//! (forward compatibility) and unknown kinds must round-trip opaquely.

use crate::adapters::{MouseButton, Rect, WindowGeometry};
use crate::error::{MacroError, MacroResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// The kind of one recorded or inserted macro step.
///
/// `Other` preserves kinds this build does not know about; they load, save
/// and display fine and are skipped as no-ops during playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MouseMove,
    MouseClick,
    MouseScroll,
    KeyDown,
    KeyUp,
    Text,
    OpenUrl,
    Screenshot,
    OcrRegion,
    Wait,
    WaitForImage,
    WindowRestore,
    #[serde(untagged)]
    Other(String),
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::MouseMove => write!(f, "mouse_move"),
            EventKind::MouseClick => write!(f, "mouse_click"),
            EventKind::MouseScroll => write!(f, "mouse_scroll"),
            EventKind::KeyDown => write!(f, "key_down"),
            EventKind::KeyUp => write!(f, "key_up"),
            EventKind::Text => write!(f, "text"),
            EventKind::OpenUrl => write!(f, "open_url"),
            EventKind::Screenshot => write!(f, "screenshot"),
            EventKind::OcrRegion => write!(f, "ocr_region"),
            EventKind::Wait => write!(f, "wait"),
            EventKind::WaitForImage => write!(f, "wait_for_image"),
            EventKind::WindowRestore => write!(f, "window_restore"),
            EventKind::Other(name) => write!(f, "{}", name),
        }
    }
}

/// One step in a macro: kind, pre-delay in seconds, payload fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroEvent {
    pub kind: EventKind,
    #[serde(default)]
    pub delay: f64,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl MacroEvent {
    pub fn new(kind: EventKind, delay: f64) -> Self {
        Self {
            kind,
            delay,
            payload: Map::new(),
        }
    }

    pub fn mouse_move(delay: f64, x: f64, y: f64) -> Self {
        let mut event = Self::new(EventKind::MouseMove, delay);
        event.set_f64("x", x);
        event.set_f64("y", y);
        event
    }

    pub fn mouse_click(delay: f64, x: f64, y: f64, button: MouseButton, pressed: bool) -> Self {
        let mut event = Self::new(EventKind::MouseClick, delay);
        event.set_f64("x", x);
        event.set_f64("y", y);
        event.payload.insert("button".into(), button.label().into());
        event.payload.insert("pressed".into(), pressed.into());
        event
    }

    pub fn mouse_scroll(delay: f64, x: f64, y: f64, dx: i64, dy: i64) -> Self {
        let mut event = Self::new(EventKind::MouseScroll, delay);
        event.set_f64("x", x);
        event.set_f64("y", y);
        event.payload.insert("dx".into(), dx.into());
        event.payload.insert("dy".into(), dy.into());
        event
    }

    pub fn key_down(delay: f64, key: &str) -> Self {
        let mut event = Self::new(EventKind::KeyDown, delay);
        event.payload.insert("key".into(), key.into());
        event
    }

    pub fn key_up(delay: f64, key: &str) -> Self {
        let mut event = Self::new(EventKind::KeyUp, delay);
        event.payload.insert("key".into(), key.into());
        event
    }

    pub fn text(delay: f64, text: &str) -> Self {
        let mut event = Self::new(EventKind::Text, delay);
        event.payload.insert("text".into(), text.into());
        event
    }

    pub fn open_url(delay: f64, url: &str) -> Self {
        let mut event = Self::new(EventKind::OpenUrl, delay);
        event.payload.insert("url".into(), url.into());
        event
    }

    pub fn screenshot(delay: f64, image_b64: String) -> Self {
        let mut event = Self::new(EventKind::Screenshot, delay);
        event.payload.insert("image_b64".into(), image_b64.into());
        event
    }

    pub fn ocr_region(delay: f64, region: Rect) -> Self {
        let mut event = Self::new(EventKind::OcrRegion, delay);
        event.payload.insert("x".into(), region.x.into());
        event.payload.insert("y".into(), region.y.into());
        event.payload.insert("w".into(), region.width.into());
        event.payload.insert("h".into(), region.height.into());
        event
    }

    pub fn wait(delay: f64) -> Self {
        Self::new(EventKind::Wait, delay)
    }

    pub fn wait_for_image(timeout: f64) -> Self {
        let mut event = Self::new(EventKind::WaitForImage, 0.0);
        event.set_f64("timeout", timeout);
        event
    }

    pub fn window_restore(delay: f64, geometry: &WindowGeometry) -> Self {
        let mut event = Self::new(EventKind::WindowRestore, delay);
        event.payload.insert("title".into(), geometry.title.clone().into());
        event.payload.insert("x".into(), geometry.x.into());
        event.payload.insert("y".into(), geometry.y.into());
        event.payload.insert("w".into(), geometry.width.into());
        event.payload.insert("h".into(), geometry.height.into());
        event
    }

    fn set_f64(&mut self, key: &str, value: f64) {
        // f64::NAN has no JSON representation; store it as 0
        let number = serde_json::Number::from_f64(value)
            .unwrap_or_else(|| serde_json::Number::from(0));
        self.payload.insert(key.into(), Value::Number(number));
    }

    fn payload_f64(&self, key: &str) -> Option<f64> {
        self.payload.get(key).and_then(Value::as_f64)
    }

    fn payload_i64(&self, key: &str) -> Option<i64> {
        self.payload.get(key).and_then(Value::as_i64)
    }

    fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    pub fn x(&self) -> Option<f64> {
        self.payload_f64("x")
    }

    pub fn y(&self) -> Option<f64> {
        self.payload_f64("y")
    }

    pub fn scroll_dy(&self) -> Option<i64> {
        self.payload_i64("dy")
    }

    pub fn button(&self) -> Option<MouseButton> {
        self.payload_str("button").map(MouseButton::from_label)
    }

    pub fn pressed(&self) -> Option<bool> {
        self.payload.get("pressed").and_then(Value::as_bool)
    }

    pub fn key(&self) -> Option<&str> {
        self.payload_str("key")
    }

    pub fn text_value(&self) -> Option<&str> {
        self.payload_str("text")
    }

    pub fn url(&self) -> Option<&str> {
        self.payload_str("url")
    }

    pub fn image_b64(&self) -> Option<&str> {
        self.payload_str("image_b64")
    }

    pub fn timeout(&self) -> Option<f64> {
        self.payload_f64("timeout")
    }

    /// Region stored by `ocr_region` (and any other x/y/w/h payload).
    pub fn region(&self) -> Option<Rect> {
        Some(Rect::new(
            self.payload_i64("x")?,
            self.payload_i64("y")?,
            self.payload_i64("w")?.max(1) as u32,
            self.payload_i64("h")?.max(1) as u32,
        ))
    }

    /// Window geometry stored by `window_restore`.
    pub fn window_geometry(&self) -> Option<WindowGeometry> {
        Some(WindowGeometry {
            title: self.payload_str("title").unwrap_or_default().to_string(),
            x: self.payload_i64("x")?,
            y: self.payload_i64("y")?,
            width: self.payload_i64("w")?.max(1) as u32,
            height: self.payload_i64("h")?.max(1) as u32,
        })
    }

    /// Decode one event from its structured form.
    pub fn from_value(value: Value) -> MacroResult<Self> {
        serde_json::from_value(value).map_err(|e| MacroError::MalformedEvent(e.to_string()))
    }

    /// Encode one event to its structured form.
    pub fn to_value(&self) -> Value {
        // A struct of plain fields cannot fail to serialize
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Save a macro as a pretty-printed JSON array.
pub fn save_events(path: &Path, events: &[MacroEvent]) -> MacroResult<()> {
    let data = serde_json::to_vec_pretty(events)
        .map_err(|e| MacroError::MalformedEvent(e.to_string()))?;
    std::fs::write(path, data)?;
    Ok(())
}

/// Load a macro from a JSON array file.
///
/// Any shape problem (not an array, non-numeric delay, non-object entry)
/// fails the whole load with `MalformedEvent`; unknown kinds and unknown
/// payload keys are preserved, never dropped.
pub fn load_events(path: &Path) -> MacroResult<Vec<MacroEvent>> {
    let data = std::fs::read(path)?;
    serde_json::from_slice(&data).map_err(|e| MacroError::MalformedEvent(e.to_string()))
}
