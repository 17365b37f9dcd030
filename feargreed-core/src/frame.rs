//! Frame buffers and frame sequences.

use crate::error::RenderError;

use embedded_graphics::pixelcolor::{IntoStorage, Rgb565, Rgb888};
use embedded_graphics::prelude::*;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Panel width in pixels.
pub const WIDTH: u32 = 320;
/// Panel height in pixels.
pub const HEIGHT: u32 = 240;

/// Default per-frame duration of animated sequences.
pub const DEFAULT_FRAME_DURATION: Duration = Duration::from_millis(50);

// =============================================================================
// Frame
// =============================================================================

/// One full-panel RGB image.
///
/// `Frame` is an embedded-graphics [`DrawTarget`], so visuals are drawn on it
/// with the usual primitives and fonts. Pixels outside the panel are ignored.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: Vec<Rgb888>,
}

impl Frame {
    /// Create a frame filled with one color.
    pub fn filled(color: Rgb888) -> Self {
        Self {
            pixels: vec![color; (WIDTH * HEIGHT) as usize],
        }
    }

    /// Create a black frame.
    pub fn black() -> Self {
        Self::filled(Rgb888::BLACK)
    }

    /// Build a frame from packed RGB bytes, row-major, `WIDTH * HEIGHT * 3` long.
    pub fn from_rgb_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != (WIDTH * HEIGHT * 3) as usize {
            return None;
        }
        let pixels = bytes
            .chunks_exact(3)
            .map(|px| Rgb888::new(px[0], px[1], px[2]))
            .collect();
        Some(Self { pixels })
    }

    /// The color at `(x, y)`, if inside the panel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb888> {
        if x >= WIDTH || y >= HEIGHT {
            return None;
        }
        self.pixels.get((y * WIDTH + x) as usize).copied()
    }

    /// All pixels, row-major.
    pub fn pixels(&self) -> &[Rgb888] {
        &self.pixels
    }

    /// The frame as little-endian RGB565, the layout of 16 bit Linux framebuffers.
    pub fn to_rgb565_le(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|p| Rgb565::from(*p).into_storage().to_le_bytes())
            .collect()
    }

    /// Number of pixels that are not black.
    pub fn lit_pixels(&self) -> usize {
        self.pixels.iter().filter(|p| **p != Rgb888::BLACK).count()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("size", &(WIDTH, HEIGHT))
            .field("lit_pixels", &self.lit_pixels())
            .finish()
    }
}

impl OriginDimensions for Frame {
    fn size(&self) -> Size {
        Size::new(WIDTH, HEIGHT)
    }
}

impl DrawTarget for Frame {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x < WIDTH && y < HEIGHT {
                self.pixels[(y * WIDTH + x) as usize] = color;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Frame Sequence
// =============================================================================

/// The ordered, non-empty frames a mode produces for one activation.
///
/// A sequence with one frame is static. Animated sequences advance every
/// [`frame_duration`](FrameSequence::frame_duration).
#[derive(Debug, Clone)]
pub struct FrameSequence {
    frames: Vec<Arc<Frame>>,
    frame_duration: Option<Duration>,
}

impl FrameSequence {
    /// Create a sequence from shared frames.
    ///
    /// Fails with [`RenderError::EmptySequence`] when `frames` is empty.
    pub fn new(
        frames: Vec<Arc<Frame>>,
        frame_duration: Option<Duration>,
    ) -> Result<Self, RenderError> {
        if frames.is_empty() {
            return Err(RenderError::EmptySequence);
        }
        Ok(Self {
            frames,
            frame_duration,
        })
    }

    /// Create an animated sequence from owned frames.
    pub fn animated(frames: Vec<Frame>, frame_duration: Duration) -> Result<Self, RenderError> {
        Self::new(
            frames.into_iter().map(Arc::new).collect(),
            Some(frame_duration),
        )
    }

    /// Create a single-frame sequence.
    pub fn still(frame: Frame) -> Self {
        Self {
            frames: vec![Arc::new(frame)],
            frame_duration: None,
        }
    }

    /// Append `count` more showings of the current last frame.
    pub fn hold_last(mut self, count: usize) -> Self {
        if let Some(last) = self.frames.last().cloned() {
            self.frames.extend(std::iter::repeat_n(last, count));
        }
        self
    }

    /// The frame at `cursor`, wrapping around the sequence.
    pub fn frame_at(&self, cursor: usize) -> &Arc<Frame> {
        &self.frames[cursor % self.frames.len()]
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false; sequences are never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// How long each frame is shown before the next one, if animated.
    pub fn frame_duration(&self) -> Option<Duration> {
        if self.frames.len() > 1 {
            Some(self.frame_duration.unwrap_or(DEFAULT_FRAME_DURATION))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

    #[test]
    fn test_rgb565_encoding() {
        let bytes = Frame::filled(Rgb888::RED).to_rgb565_le();
        assert_eq!(bytes.len(), (WIDTH * HEIGHT * 2) as usize);
        assert_eq!(&bytes[..2], &[0x00, 0xF8]);
        assert!(Frame::black().to_rgb565_le().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_draw_clips_out_of_bounds() {
        let mut frame = Frame::black();
        Rectangle::new(Point::new(-10, -10), Size::new(20, 20))
            .into_styled(PrimitiveStyle::with_fill(Rgb888::RED))
            .draw(&mut frame)
            .unwrap();

        assert_eq!(frame.pixel(0, 0), Some(Rgb888::RED));
        assert_eq!(frame.pixel(9, 9), Some(Rgb888::RED));
        assert_eq!(frame.pixel(10, 10), Some(Rgb888::BLACK));
        assert_eq!(frame.lit_pixels(), 100);
        assert_eq!(frame.pixel(WIDTH, 0), None);
    }

    #[test]
    fn test_sequence_rejects_empty() {
        assert!(matches!(
            FrameSequence::new(Vec::new(), None),
            Err(RenderError::EmptySequence)
        ));
    }

    #[test]
    fn test_sequence_wraps_and_holds() {
        let seq = FrameSequence::animated(
            vec![Frame::black(), Frame::filled(Rgb888::GREEN)],
            Duration::from_millis(20),
        )
        .unwrap()
        .hold_last(3);

        assert_eq!(seq.len(), 5);
        assert!(Arc::ptr_eq(seq.frame_at(1), seq.frame_at(4)));
        assert!(Arc::ptr_eq(seq.frame_at(0), seq.frame_at(5)));
        assert_eq!(seq.frame_duration(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_still_has_no_frame_duration() {
        let seq = FrameSequence::still(Frame::black());
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.frame_duration(), None);
    }

    #[test]
    fn test_from_rgb_bytes_checks_length() {
        assert!(Frame::from_rgb_bytes(&[0; 3]).is_none());
        let bytes = vec![255u8; (WIDTH * HEIGHT * 3) as usize];
        let frame = Frame::from_rgb_bytes(&bytes).unwrap();
        assert_eq!(frame.pixel(5, 5), Some(Rgb888::WHITE));
    }
}
