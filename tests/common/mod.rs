//! Shared fakes for the integration tests: synthetic screens, a scripted
//! input sink, and canned collaborators.

#![allow(dead_code)]

use image::imageops;
use image::{Rgba, RgbaImage};
use macroplay::adapters::{
    OcrEngine, ScreenCapture, ScreenshotSink, SyntheticInput, UrlOpener, WindowControl,
};
use macroplay::{Key, MacroError, MacroResult, Monitor, MouseButton, Rect, WindowGeometry};
use parking_lot::Mutex;
use std::time::Duration;

/// Deterministic high-variance patch used as the anchor target.
pub fn reference_patch(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            ((x * 37 + y * 11) % 251) as u8,
            ((x * 17 + y * 53) % 241) as u8,
            ((x * 71 + y * 29) % 233) as u8,
            255,
        ])
    })
}

pub fn gradient_screen(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    })
}

/// Static multi-monitor desktop. Serves whole monitors and any sub-rect
/// that falls inside one.
pub struct FakeDesktop {
    pub screens: Vec<(Monitor, RgbaImage)>,
}

impl FakeDesktop {
    pub fn single(frame: RgbaImage) -> Self {
        let monitor = Monitor {
            left: 0,
            top: 0,
            width: frame.width(),
            height: frame.height(),
        };
        Self {
            screens: vec![(monitor, frame)],
        }
    }
}

impl ScreenCapture for FakeDesktop {
    fn list_monitors(&self) -> MacroResult<Vec<Monitor>> {
        Ok(self.screens.iter().map(|(m, _)| *m).collect())
    }

    fn capture(&self, region: Rect) -> MacroResult<RgbaImage> {
        for (monitor, frame) in &self.screens {
            let bounds = monitor.rect();
            let fits = region.x >= bounds.x
                && region.y >= bounds.y
                && region.x + region.width as i64 <= bounds.x + bounds.width as i64
                && region.y + region.height as i64 <= bounds.y + bounds.height as i64;
            if fits {
                let local_x = (region.x - bounds.x) as u32;
                let local_y = (region.y - bounds.y) as u32;
                return Ok(
                    imageops::crop_imm(frame, local_x, local_y, region.width, region.height)
                        .to_image(),
                );
            }
        }
        Err(MacroError::CaptureFailure(format!(
            "region {region:?} outside every monitor"
        )))
    }
}

/// One monitor whose content changes: blank for the first few captures,
/// then the prepared frame. Exercises the fresh-capture-per-poll contract.
pub struct AppearingScreen {
    monitor: Monitor,
    before: RgbaImage,
    after: RgbaImage,
    appear_after: u32,
    captures: Mutex<u32>,
}

impl AppearingScreen {
    pub fn new(before: RgbaImage, after: RgbaImage, appear_after: u32) -> Self {
        let monitor = Monitor {
            left: 0,
            top: 0,
            width: before.width(),
            height: before.height(),
        };
        Self {
            monitor,
            before,
            after,
            appear_after,
            captures: Mutex::new(0),
        }
    }
}

impl ScreenCapture for AppearingScreen {
    fn list_monitors(&self) -> MacroResult<Vec<Monitor>> {
        Ok(vec![self.monitor])
    }

    fn capture(&self, region: Rect) -> MacroResult<RgbaImage> {
        if region != self.monitor.rect() {
            return Err(MacroError::CaptureFailure("unexpected region".into()));
        }
        let mut captures = self.captures.lock();
        *captures += 1;
        if *captures > self.appear_after {
            Ok(self.after.clone())
        } else {
            Ok(self.before.clone())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputCall {
    Move(i64, i64),
    Button(MouseButton, bool),
    Scroll(i64),
    Key(Key, bool),
    Text(String),
}

/// Synthetic input sink that records every call it receives.
#[derive(Default)]
pub struct ScriptedInput {
    calls: Mutex<Vec<InputCall>>,
}

impl ScriptedInput {
    pub fn calls(&self) -> Vec<InputCall> {
        self.calls.lock().clone()
    }
}

impl SyntheticInput for ScriptedInput {
    fn move_pointer(&self, x: i64, y: i64) -> MacroResult<()> {
        self.calls.lock().push(InputCall::Move(x, y));
        Ok(())
    }

    fn button(&self, button: MouseButton, pressed: bool) -> MacroResult<()> {
        self.calls.lock().push(InputCall::Button(button, pressed));
        Ok(())
    }

    fn scroll(&self, amount: i64) -> MacroResult<()> {
        self.calls.lock().push(InputCall::Scroll(amount));
        Ok(())
    }

    fn key(&self, key: Key, pressed: bool) -> MacroResult<()> {
        self.calls.lock().push(InputCall::Key(key, pressed));
        Ok(())
    }

    fn type_text(&self, text: &str, _char_interval: Duration) -> MacroResult<()> {
        self.calls.lock().push(InputCall::Text(text.to_string()));
        Ok(())
    }
}

/// Window collaborator with one known window; records restore calls.
#[derive(Default)]
pub struct FakeWindows {
    pub restored: Mutex<Vec<(String, i64, i64, u32, u32)>>,
}

impl WindowControl for FakeWindows {
    fn active_window(&self) -> Option<WindowGeometry> {
        Some(WindowGeometry {
            title: "Workbench".into(),
            x: 5,
            y: 5,
            width: 640,
            height: 480,
        })
    }

    fn find_by_title(&self, title: &str) -> Vec<WindowGeometry> {
        if title == "Workbench" {
            vec![self.active_window().expect("static window")]
        } else {
            vec![]
        }
    }

    fn resize_and_move(
        &self,
        window: &WindowGeometry,
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    ) -> MacroResult<()> {
        self.restored
            .lock()
            .push((window.title.clone(), x, y, width, height));
        Ok(())
    }
}

/// OCR collaborator returning canned text.
pub struct CannedOcr(pub &'static str);

impl OcrEngine for CannedOcr {
    fn recognize(&self, _frame: &RgbaImage) -> MacroResult<String> {
        Ok(self.0.to_string())
    }
}

/// URL opener that records what it was asked to open.
#[derive(Default)]
pub struct RecordingOpener {
    pub opened: Mutex<Vec<String>>,
}

impl UrlOpener for RecordingOpener {
    fn open(&self, url: &str) -> MacroResult<()> {
        self.opened.lock().push(url.to_string());
        Ok(())
    }
}

/// Screenshot sink that keeps saved frames in memory.
#[derive(Default)]
pub struct CollectingSink {
    pub saved: Mutex<Vec<RgbaImage>>,
}

impl ScreenshotSink for CollectingSink {
    fn save(&self, frame: &RgbaImage) -> MacroResult<()> {
        self.saved.lock().push(frame.clone());
        Ok(())
    }
}
