//! Collaborator interfaces for the macro engine.
//!
//! The core never talks to a display server or an input stack directly.
//! Screen capture, synthetic input, window control, OCR and URL opening
//! are capability objects bound at construction time; an unbound
//! collaborator simply makes the steps that need it inert.

use crate::error::MacroResult;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A rectangle in virtual-desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// One attached display. `left`/`top` are the monitor's offset within the
/// virtual desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    pub left: i64,
    pub top: i64,
    pub width: u32,
    pub height: u32,
}

impl Monitor {
    pub fn rect(&self) -> Rect {
        Rect::new(self.left, self.top, self.width, self.height)
    }
}

/// Geometry of a top-level window, as recorded for `window_restore`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub title: String,
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Mouse buttons replayed by the synthetic input adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// Stable label stored in macro files.
    pub fn label(&self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }

    /// Lenient parse: legacy files store labels like `Button.left`, so a
    /// substring match is enough. Anything unrecognized is a left click.
    pub fn from_label(label: &str) -> Self {
        let lower = label.to_ascii_lowercase();
        if lower.contains("right") {
            MouseButton::Right
        } else if lower.contains("middle") {
            MouseButton::Middle
        } else {
            MouseButton::Left
        }
    }
}

/// A key as delivered to the synthetic input adapter during playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Space,
    Tab,
    Backspace,
    Escape,
    Delete,
    Shift,
    Ctrl,
    Alt,
    Meta,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
}

/// Fixed mapping from normalized key names to replayable keys.
///
/// Single-character identifiers are sent as literal characters and do not
/// go through this table. Names not listed here are silently skipped at
/// playback time.
const KEY_NAMES: &[(&str, Key)] = &[
    ("enter", Key::Enter),
    ("space", Key::Space),
    ("tab", Key::Tab),
    ("backspace", Key::Backspace),
    ("esc", Key::Escape),
    ("escape", Key::Escape),
    ("delete", Key::Delete),
    ("shift", Key::Shift),
    ("ctrl", Key::Ctrl),
    ("alt", Key::Alt),
    ("cmd", Key::Meta),
    ("meta", Key::Meta),
    ("left", Key::Left),
    ("right", Key::Right),
    ("up", Key::Up),
    ("down", Key::Down),
    ("home", Key::Home),
    ("end", Key::End),
    ("page_up", Key::PageUp),
    ("page_down", Key::PageDown),
];

impl Key {
    /// Map a normalized key identifier back to a replayable key.
    pub fn from_identifier(id: &str) -> Option<Key> {
        let mut chars = id.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Some(Key::Char(c));
        }
        KEY_NAMES
            .iter()
            .find(|(name, _)| *name == id)
            .map(|(_, key)| *key)
    }
}

/// Raw key identity as reported by an input listener, before the recorder
/// normalizes it to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySym {
    /// A printable character.
    Char(char),
    /// A symbolic key name (modifier, function, navigation...).
    Named(String),
}

/// One raw input notification from a platform listener.
///
/// Listeners deliver these one at a time to `Recorder::handle`; the
/// recorder turns them into timed [`crate::event::MacroEvent`]s.
#[derive(Debug, Clone, PartialEq)]
pub enum InputNotification {
    MouseMove { x: f64, y: f64 },
    MouseClick { x: f64, y: f64, button: MouseButton, pressed: bool },
    MouseScroll { x: f64, y: f64, dx: i64, dy: i64 },
    Key { key: KeySym, pressed: bool },
}

/// Screen capture collaborator.
///
/// Buffers are RGBA and every call grabs fresh pixels; the matcher relies
/// on that for wait-for-image polling.
pub trait ScreenCapture: Send + Sync {
    /// Attached displays, primary first.
    fn list_monitors(&self) -> MacroResult<Vec<Monitor>>;

    /// Capture an arbitrary rectangle of the virtual desktop.
    fn capture(&self, region: Rect) -> MacroResult<RgbaImage>;
}

/// Synthetic input collaborator used during playback.
pub trait SyntheticInput: Send + Sync {
    fn move_pointer(&self, x: i64, y: i64) -> MacroResult<()>;

    fn button(&self, button: MouseButton, pressed: bool) -> MacroResult<()>;

    /// Vertical scroll; `amount` is in wheel units (120 per tick).
    fn scroll(&self, amount: i64) -> MacroResult<()>;

    fn key(&self, key: Key, pressed: bool) -> MacroResult<()>;

    /// Type literal text with a fixed per-character interval.
    fn type_text(&self, text: &str, char_interval: Duration) -> MacroResult<()>;
}

/// Window geometry collaborator (optional).
pub trait WindowControl: Send + Sync {
    fn active_window(&self) -> Option<WindowGeometry>;

    fn find_by_title(&self, title: &str) -> Vec<WindowGeometry>;

    fn resize_and_move(
        &self,
        window: &WindowGeometry,
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    ) -> MacroResult<()>;
}

/// OCR collaborator (optional).
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, frame: &RgbaImage) -> MacroResult<String>;
}

/// URL opening collaborator (optional).
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> MacroResult<()>;
}

/// Destination for screenshot steps (optional).
pub trait ScreenshotSink: Send + Sync {
    fn save(&self, frame: &RgbaImage) -> MacroResult<()>;
}
