//! Visual anchor matching.
//!
//! Locates a small reference patch inside fresh full-monitor captures,
//! trying every configured template scale on every searched monitor. The
//! similarity metric is normalized cross-correlation of the zero-mean RGB
//! images, computed jointly over the three channels, so an exact copy of
//! the patch scores 1.0 and the accepted range is `[-1, 1]`.

use crate::adapters::{Monitor, ScreenCapture};
use crate::config::PlaybackConfig;
use image::imageops::{self, FilterType};
use image::RgbaImage;

/// Best match found by [`locate`]: the top-left pixel of the match in
/// absolute virtual-desktop coordinates, its correlation score, and the
/// template scale that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub x: i64,
    pub y: i64,
    pub score: f64,
    pub scale: f64,
}

/// Search one or more monitors for the reference patch.
///
/// Monitors are enumerated outer (primary first), scales inner; the best
/// candidate is kept under strict-greater comparison, so on a perfect tie
/// the earliest monitor and earliest scale win. That order is an artifact
/// of the enumeration, not a contract. A capture, resize or correlation
/// failure for one `(monitor, scale)` pair skips that pair only.
///
/// Returns `None` when nothing scores at or above `threshold`. Every call
/// captures fresh pixels, which is what makes wait-for-image polling see
/// current screen state.
pub fn locate(
    capture: &dyn ScreenCapture,
    reference: &RgbaImage,
    threshold: f64,
    scales: &[f64],
    search_all_monitors: bool,
) -> Option<MatchResult> {
    let monitors = match capture.list_monitors() {
        Ok(monitors) => monitors,
        Err(e) => {
            tracing::warn!("monitor enumeration failed: {e}");
            return None;
        }
    };
    if monitors.is_empty() {
        tracing::warn!("no monitors to search");
        return None;
    }

    let monitors: &[Monitor] = if search_all_monitors {
        &monitors
    } else {
        &monitors[..1]
    };
    let fallback = [1.0];
    let scales: &[f64] = if scales.is_empty() { &fallback } else { scales };

    let mut best: Option<MatchResult> = None;

    for monitor in monitors {
        let frame = match capture.capture(monitor.rect()) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(?monitor, "monitor capture failed: {e}");
                continue;
            }
        };
        let search = RgbPlane::from_rgba(&frame);

        for &scale in scales {
            let resized = resize_template(reference, scale);
            let template = match Template::prepare(&resized) {
                Some(template) => template,
                None => {
                    tracing::debug!(scale, "degenerate template, pair skipped");
                    continue;
                }
            };

            let Some((x, y, score)) = correlate(&search, &template) else {
                tracing::debug!(scale, "template does not fit monitor, pair skipped");
                continue;
            };

            let better = best.map_or(true, |b| score > b.score);
            if better {
                best = Some(MatchResult {
                    x: monitor.left + x as i64,
                    y: monitor.top + y as i64,
                    score,
                    scale,
                });
            }
        }
    }

    match best {
        Some(result) if result.score >= threshold => Some(result),
        Some(result) => {
            tracing::debug!(score = result.score, threshold, "best match below threshold");
            None
        }
        None => None,
    }
}

/// [`locate`] driven by a playback configuration.
pub fn locate_with_config(
    capture: &dyn ScreenCapture,
    reference: &RgbaImage,
    config: &PlaybackConfig,
) -> Option<MatchResult> {
    locate(
        capture,
        reference,
        config.threshold,
        &config.effective_scales(),
        config.search_all_monitors,
    )
}

/// Resize the reference by `scale`. No-op at 1.0; shrinking uses an
/// area-style filter, growing a cubic one.
fn resize_template(reference: &RgbaImage, scale: f64) -> RgbaImage {
    if (scale - 1.0).abs() <= 1e-6 {
        return reference.clone();
    }
    let width = ((reference.width() as f64 * scale).round() as u32).max(1);
    let height = ((reference.height() as f64 * scale).round() as u32).max(1);
    let filter = if scale < 1.0 {
        FilterType::Triangle
    } else {
        FilterType::CatmullRom
    };
    imageops::resize(reference, width, height, filter)
}

/// A search image flattened to interleaved RGB floats, alpha discarded.
struct RgbPlane {
    width: u32,
    height: u32,
    values: Vec<f64>,
}

impl RgbPlane {
    fn from_rgba(image: &RgbaImage) -> Self {
        let mut values = Vec::with_capacity((image.width() * image.height() * 3) as usize);
        for pixel in image.pixels() {
            values.push(pixel.0[0] as f64);
            values.push(pixel.0[1] as f64);
            values.push(pixel.0[2] as f64);
        }
        Self {
            width: image.width(),
            height: image.height(),
            values,
        }
    }
}

/// A reference patch with its mean subtracted, plus its L2 norm.
struct Template {
    width: u32,
    height: u32,
    values: Vec<f64>,
    norm: f64,
}

impl Template {
    /// `None` when the patch has (near-)zero variance: correlation against
    /// a flat template is undefined, so such pairs are skipped.
    fn prepare(image: &RgbaImage) -> Option<Self> {
        let plane = RgbPlane::from_rgba(image);
        let n = plane.values.len() as f64;
        let mean = plane.values.iter().sum::<f64>() / n;
        let values: Vec<f64> = plane.values.iter().map(|v| v - mean).collect();
        let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm <= 1e-9 {
            return None;
        }
        Some(Self {
            width: plane.width,
            height: plane.height,
            values,
            norm,
        })
    }
}

/// Global maximum of the normalized cross-correlation map between
/// `template` and `search`. `None` when the template does not fit.
fn correlate(search: &RgbPlane, template: &Template) -> Option<(u32, u32, f64)> {
    if template.width > search.width || template.height > search.height {
        return None;
    }

    let tw = template.width as usize;
    let th = template.height as usize;
    let sw = search.width as usize;
    let row_len = tw * 3;
    let n = (tw * th * 3) as f64;

    let mut best: Option<(u32, u32, f64)> = None;

    for v in 0..=(search.height - template.height) {
        for u in 0..=(search.width - template.width) {
            let mut dot = 0.0;
            let mut sum = 0.0;
            let mut sum_sq = 0.0;

            for j in 0..th {
                let row_start = ((v as usize + j) * sw + u as usize) * 3;
                let window = &search.values[row_start..row_start + row_len];
                let t_row = &template.values[j * row_len..(j + 1) * row_len];
                for (s, t) in window.iter().zip(t_row) {
                    dot += s * t;
                    sum += s;
                    sum_sq += s * s;
                }
            }

            // Window variance times n; a flat window carries no signal.
            let window_energy = sum_sq - sum * sum / n;
            let score = if window_energy <= 1e-9 {
                0.0
            } else {
                // Template is zero-mean, so `dot` already equals the
                // mean-corrected numerator.
                dot / (template.norm * window_energy.sqrt())
            };

            if best.map_or(true, |(_, _, s)| score > s) {
                best = Some((u, v, score));
            }
        }
    }

    best
}
