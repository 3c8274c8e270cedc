//! Visual anchors: small image patches captured around a click point.
//!
//! An anchor is stored base64-encoded inside the click event's payload and
//! is only consulted when that click is replayed. The offset points from
//! the patch's top-left corner back to the original click position.

use crate::error::{MacroError, MacroResult};
use crate::event::MacroEvent;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

/// Pixels captured on each side of a click point (70x70 patch total).
pub const ANCHOR_PAD: i64 = 35;

/// A captured reference patch plus the click point's offset inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub image: RgbaImage,
    pub offset: (i64, i64),
}

impl Anchor {
    pub fn new(image: RgbaImage, offset: (i64, i64)) -> Self {
        Self { image, offset }
    }

    /// PNG-encode the patch and wrap it in base64 for payload embedding.
    pub fn encode_base64(&self) -> MacroResult<String> {
        encode_image_base64(&self.image)
    }

    /// Write this anchor into an event's payload.
    pub fn embed(&self, event: &mut MacroEvent) -> MacroResult<()> {
        let encoded = self.encode_base64()?;
        event.payload.insert("anchor_b64".into(), encoded.into());
        event.payload.insert(
            "anchor_offset".into(),
            serde_json::json!([self.offset.0, self.offset.1]),
        );
        Ok(())
    }

    /// Read an anchor back out of an event's payload.
    ///
    /// Returns `None` when no anchor is present or it fails to decode;
    /// playback then falls back to the recorded coordinates. A missing
    /// offset means the patch's top-left corner is the click point.
    pub fn extract(event: &MacroEvent) -> Option<Anchor> {
        let encoded = event.payload.get("anchor_b64")?.as_str()?;
        let image = decode_image_base64(encoded).ok()?;

        let offset = event
            .payload
            .get("anchor_offset")
            .and_then(|v| v.as_array())
            .and_then(|pair| {
                Some((pair.first()?.as_i64()?, pair.get(1)?.as_i64()?))
            })
            .unwrap_or((0, 0));

        Some(Anchor::new(image, offset))
    }
}

/// PNG-encode an RGBA image and base64 it (standard alphabet).
pub fn encode_image_base64(image: &RgbaImage) -> MacroResult<String> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(BASE64.encode(bytes))
}

/// Decode a base64 PNG back into an RGBA image, alpha preserved.
pub fn decode_image_base64(encoded: &str) -> MacroResult<RgbaImage> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| MacroError::MalformedEvent(format!("bad anchor base64: {e}")))?;
    let image = image::load_from_memory_with_format(&bytes, ImageFormat::Png)?;
    Ok(image.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MouseButton;
    use image::Rgba;

    fn test_patch() -> RgbaImage {
        RgbaImage::from_fn(8, 6, |x, y| {
            Rgba([(x * 30) as u8, (y * 40) as u8, 128, if x == 0 { 200 } else { 255 }])
        })
    }

    #[test]
    fn base64_round_trip_preserves_pixels() {
        let patch = test_patch();
        let encoded = encode_image_base64(&patch).unwrap();
        let decoded = decode_image_base64(&encoded).unwrap();
        assert_eq!(decoded, patch);
    }

    #[test]
    fn embed_and_extract_round_trip() {
        let anchor = Anchor::new(test_patch(), (ANCHOR_PAD, ANCHOR_PAD));
        let mut event = MacroEvent::mouse_click(0.0, 50.0, 60.0, MouseButton::Left, true);
        anchor.embed(&mut event).unwrap();

        let extracted = Anchor::extract(&event).expect("anchor present");
        assert_eq!(extracted, anchor);
    }

    #[test]
    fn extract_without_anchor_is_none() {
        let event = MacroEvent::mouse_click(0.0, 1.0, 2.0, MouseButton::Left, true);
        assert!(Anchor::extract(&event).is_none());
    }

    #[test]
    fn extract_defaults_missing_offset_to_origin() {
        let anchor = Anchor::new(test_patch(), (5, 7));
        let mut event = MacroEvent::mouse_click(0.0, 1.0, 2.0, MouseButton::Left, true);
        anchor.embed(&mut event).unwrap();
        event.payload.remove("anchor_offset");

        let extracted = Anchor::extract(&event).unwrap();
        assert_eq!(extracted.offset, (0, 0));
    }

    #[test]
    fn garbage_base64_is_rejected_quietly() {
        let mut event = MacroEvent::mouse_click(0.0, 1.0, 2.0, MouseButton::Left, true);
        event.payload.insert("anchor_b64".into(), "not base64!!".into());
        assert!(Anchor::extract(&event).is_none());
    }
}
