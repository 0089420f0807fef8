use std::fmt;

use crate::coords::Viewport;
use crate::error::RenderError;

/// One rendered frame: tightly packed RGBA8, top row first.
///
/// Deliberately not `Clone`: a frame is produced once, moved across the
/// worker boundary, then consumed by the encoder.
pub struct PixelBuffer {
    viewport: Viewport,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps `data`, checking it holds exactly `width * height * 4` bytes.
    pub fn from_rgba8(viewport: Viewport, data: Vec<u8>) -> Result<Self, RenderError> {
        let expected = viewport.rgba_len();
        if data.len() != expected {
            return Err(RenderError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { viewport, data })
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.viewport.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.viewport.height
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// RGBA of the pixel at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let at = y as usize * self.viewport.row_bytes() + x as usize * 4;
        let px = &self.data[at..at + 4];
        Some([px[0], px[1], px[2], px[3]])
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.viewport.width)
            .field("height", &self.viewport.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_must_match_viewport() {
        let vp = Viewport::from_width(4).unwrap();
        assert!(PixelBuffer::from_rgba8(vp, vec![0; 4 * 2 * 4]).is_ok());
        assert_eq!(
            PixelBuffer::from_rgba8(vp, vec![0; 5]).unwrap_err(),
            RenderError::SizeMismatch { expected: 32, actual: 5 }
        );
    }

    #[test]
    fn pixel_addresses_rows_top_first() {
        let vp = Viewport::from_width(2).unwrap();
        let buf = PixelBuffer::from_rgba8(vp, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(buf.pixel(0, 0), Some([1, 2, 3, 4]));
        assert_eq!(buf.pixel(1, 0), Some([5, 6, 7, 8]));
        assert_eq!(buf.pixel(0, 1), None);
    }
}
