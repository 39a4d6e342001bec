//! Frame containers.
//!
//! - `LiveFrame`: one RGB8 frame read from an active stream. Pixels are private and
//!   zeroized on drop; it only lives long enough to be encoded.
//! - `CapturedImage`: the frozen still the guest sees after tapping Capture. JPEG bytes
//!   at the stream's native resolution, immutable, not `Clone`.
//!
//! Raw pixels and encoded bytes are never logged. Logs refer to a captured image by
//! `short_id()`, a truncated SHA-256 of the encoded bytes.

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// JPEG quality used when the configuration does not say otherwise.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Largest frame edge accepted from a stream or configuration, in pixels.
pub const MAX_FRAME_DIMENSION: u32 = 8192;

const RGB_CHANNELS: usize = 3;

/// Byte length of an RGB8 buffer for `width` x `height`.
///
/// Rejects empty frames and frames with an edge above `MAX_FRAME_DIMENSION` before any
/// buffer is sized from them.
pub(crate) fn rgb_buffer_len(width: u32, height: u32) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(anyhow!("frame has no pixels ({}x{})", width, height));
    }
    if width > MAX_FRAME_DIMENSION || height > MAX_FRAME_DIMENSION {
        return Err(anyhow!(
            "frame {}x{} exceeds the {}px edge limit",
            width,
            height,
            MAX_FRAME_DIMENSION
        ));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(RGB_CHANNELS))
        .ok_or_else(|| anyhow!("frame {}x{} is too large to buffer", width, height))
}

// ----------------------------------------------------------------------------
// LiveFrame
// ----------------------------------------------------------------------------

/// One RGB8 frame from a live stream.
pub struct LiveFrame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl LiveFrame {
    /// Wrap RGB8 pixel data. The buffer length must match `width * height * 3`.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = rgb_buffer_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "frame buffer is {} bytes, expected {} for {}x{} rgb",
                data.len(),
                expected,
                width,
                height
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub(crate) fn pixels(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for LiveFrame {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

// ----------------------------------------------------------------------------
// CapturedImage
// ----------------------------------------------------------------------------

/// A still frame frozen from the live preview.
///
/// Explicitly NOT `Clone`: a retake replaces the image wholesale and the old bytes
/// are zeroized when the session drops them.
pub struct CapturedImage {
    jpeg: Vec<u8>,
    width: u32,
    height: u32,
    digest: [u8; 32],
}

impl CapturedImage {
    /// Encode a live frame as JPEG at its native resolution.
    pub fn encode(frame: &LiveFrame, quality: u8) -> Result<Self> {
        if !(1..=100).contains(&quality) {
            return Err(anyhow!("jpeg quality must be within 1..=100, got {}", quality));
        }
        let mut jpeg = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality);
            encoder
                .encode(
                    frame.pixels(),
                    frame.width,
                    frame.height,
                    ExtendedColorType::Rgb8,
                )
                .context("encode captured frame as jpeg")?;
        }
        let digest: [u8; 32] = Sha256::digest(&jpeg).into();
        Ok(Self {
            jpeg,
            width: frame.width,
            height: frame.height,
            digest,
        })
    }

    /// Encoded JPEG bytes, for binding to the rendering surface.
    pub fn bytes(&self) -> &[u8] {
        &self.jpeg
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn byte_len(&self) -> usize {
        self.jpeg.len()
    }

    /// Short hex identifier for logs.
    pub fn short_id(&self) -> String {
        hex::encode(&self.digest[..6])
    }
}

impl std::fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedImage")
            .field("id", &self.short_id())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.jpeg.len())
            .finish()
    }
}

impl Drop for CapturedImage {
    fn drop(&mut self) {
        self.jpeg.zeroize();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(width: u32, height: u32) -> LiveFrame {
        let len = (width * height * 3) as usize;
        let data = (0..len).map(|i| (i % 251) as u8).collect();
        LiveFrame::new(data, width, height).expect("frame")
    }

    #[test]
    fn live_frame_rejects_mismatched_buffer() {
        assert!(LiveFrame::new(vec![0u8; 10], 4, 4).is_err());
        assert!(LiveFrame::new(Vec::new(), 0, 0).is_err());
    }

    #[test]
    fn oversized_frames_are_rejected_before_allocation() {
        assert!(rgb_buffer_len(70_000, 70_000).is_err());
        assert!(rgb_buffer_len(MAX_FRAME_DIMENSION + 1, 1).is_err());
        assert_eq!(rgb_buffer_len(4, 2).unwrap(), 24);
        assert_eq!(
            rgb_buffer_len(MAX_FRAME_DIMENSION, MAX_FRAME_DIMENSION).unwrap(),
            8192 * 8192 * 3
        );
    }

    #[test]
    fn captured_image_keeps_native_resolution() -> Result<()> {
        let frame = gradient_frame(64, 48);
        let image = CapturedImage::encode(&frame, DEFAULT_JPEG_QUALITY)?;

        assert_eq!(image.width(), 64);
        assert_eq!(image.height(), 48);
        // JPEG SOI marker
        assert_eq!(&image.bytes()[..2], &[0xFF, 0xD8]);
        assert_eq!(image.byte_len(), image.bytes().len());
        Ok(())
    }

    #[test]
    fn short_id_is_stable_for_same_bytes() -> Result<()> {
        let a = CapturedImage::encode(&gradient_frame(16, 16), 85)?;
        let b = CapturedImage::encode(&gradient_frame(16, 16), 85)?;
        assert_eq!(a.short_id(), b.short_id());
        assert_eq!(a.short_id().len(), 12);
        Ok(())
    }

    #[test]
    fn rejects_out_of_range_quality() {
        let frame = gradient_frame(8, 8);
        assert!(CapturedImage::encode(&frame, 0).is_err());
        assert!(CapturedImage::encode(&frame, 101).is_err());
    }

    #[test]
    fn debug_output_omits_bytes() -> Result<()> {
        let image = CapturedImage::encode(&gradient_frame(8, 8), 85)?;
        let rendered = format!("{:?}", image);
        assert!(rendered.contains("CapturedImage"));
        assert!(rendered.contains(&image.short_id()));
        Ok(())
    }
}
