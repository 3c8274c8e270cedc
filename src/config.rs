//! Recording and playback configuration.

use serde::{Deserialize, Serialize};

/// Scale factors outside this range are discarded when parsing a user
/// supplied scale list.
const SCALE_MIN: f64 = 0.2;
const SCALE_MAX: f64 = 3.0;

/// Per-run playback configuration. Immutable once a run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Time compression factor; delays are divided by `max(0.1, speed)`.
    pub speed: f64,
    /// Minimum accepted normalized correlation score in `[0, 1]`.
    pub threshold: f64,
    /// Template scale factors tried per monitor, in order. Never empty.
    pub scales: Vec<f64>,
    /// Search every attached display instead of only the primary.
    pub search_all_monitors: bool,
    /// Apply a recorded `window_restore` event before the timed walk.
    pub restore_window: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            threshold: 0.87,
            scales: vec![1.0],
            search_all_monitors: true,
            restore_window: false,
        }
    }
}

impl PlaybackConfig {
    /// Divisor applied to recorded delays. Floors at 0.1 so a zero or
    /// negative speed cannot stall playback forever.
    pub fn speed_divisor(&self) -> f64 {
        self.speed.max(0.1)
    }

    /// Scales to search, guaranteed non-empty.
    pub fn effective_scales(&self) -> Vec<f64> {
        if self.scales.is_empty() {
            vec![1.0]
        } else {
            self.scales.clone()
        }
    }
}

/// Recording session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Grab a 70x70 anchor patch around every click press.
    pub capture_anchors: bool,
    /// Record the active window's geometry as a leading `window_restore`
    /// event when the session starts.
    pub record_window: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            capture_anchors: true,
            record_window: true,
        }
    }
}

/// Parse a comma-separated scale list like `"0.85,0.9,1.0,1.1,1.2"`.
///
/// Blank items are skipped, values outside `[0.2, 3.0]` are dropped, and
/// an unparsable or empty result falls back to `[1.0]` so the matcher
/// never sees an empty scale set.
pub fn parse_scales(text: &str) -> Vec<f64> {
    let mut scales = Vec::new();
    for item in text.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        match item.parse::<f64>() {
            Ok(value) if (SCALE_MIN..=SCALE_MAX).contains(&value) => scales.push(value),
            Ok(_) => {}
            Err(_) => return vec![1.0],
        }
    }
    if scales.is_empty() {
        vec![1.0]
    } else {
        scales
    }
}
