/// Output image size in physical pixels.
///
/// The render target is always a 2:1 equirectangular image, so the height is
/// derived from the width.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Builds a 2:1 viewport. Returns `None` for widths that are zero or odd.
    #[inline]
    pub const fn from_width(width: u32) -> Option<Self> {
        if width < 2 || width % 2 != 0 {
            return None;
        }
        Some(Self { width, height: width / 2 })
    }

    /// Bytes in one tightly packed RGBA8 row.
    #[inline]
    pub const fn row_bytes(self) -> usize {
        self.width as usize * 4
    }

    /// Bytes in a full tightly packed RGBA8 frame.
    #[inline]
    pub const fn rgba_len(self) -> usize {
        self.row_bytes() * self.height as usize
    }

    /// `[width, height]` as shader-facing floats.
    #[inline]
    pub fn resolution(self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }
}
