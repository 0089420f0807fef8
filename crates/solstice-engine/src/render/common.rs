//! Shared GPU types and readback utilities.

use bytemuck::{Pod, Zeroable};

// ── frame uniform ─────────────────────────────────────────────────────────

/// Mirrors `FrameUniforms` in `planet.frag.wgsl`.
///
/// Only `sun_dir` changes between frames; the rest is written once at
/// initialization.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct FrameUniforms {
    pub sun_dir: [f32; 3],
    pub twilight: f32,
    pub resolution: [f32; 2],
    pub _pad: [f32; 2], // 16-byte alignment
}

/// Byte range of `sun_dir` inside the uniform buffer.
pub(super) const SUN_DIR_OFFSET: u64 = 0;

/// Half-width of the day/night blend, in units of `dot(normal, sun)`.
pub(super) const TWILIGHT_BAND: f32 = 0.1;

/// Returns the `wgpu` minimum binding size for the frame uniform buffer.
pub(super) fn frame_ubo_min_binding_size() -> std::num::NonZeroU64 {
    std::num::NonZeroU64::new(std::mem::size_of::<FrameUniforms>() as u64)
        .expect("FrameUniforms has non-zero size by construction")
}

// ── quad vertex ───────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct QuadVertex {
    pub pos: [f32; 2], // NDC
}

impl QuadVertex {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    pub(super) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Two triangles covering the whole NDC square.
pub(super) const FULLSCREEN_QUAD: [QuadVertex; 6] = [
    QuadVertex { pos: [-1.0, -1.0] },
    QuadVertex { pos: [-1.0, 1.0] },
    QuadVertex { pos: [1.0, 1.0] },
    QuadVertex { pos: [-1.0, -1.0] },
    QuadVertex { pos: [1.0, 1.0] },
    QuadVertex { pos: [1.0, -1.0] },
];

// ── readback ──────────────────────────────────────────────────────────────

/// Rounds `value` up to the next multiple of `alignment` (a power of two).
pub(super) fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

/// Strips per-row padding from a mapped readback buffer.
///
/// Returns `None` when `mapped` is too short to hold `height` padded rows.
pub(super) fn copy_tight_rows(
    mapped: &[u8],
    unpadded_bytes_per_row: u32,
    padded_bytes_per_row: u32,
    height: u32,
) -> Option<Vec<u8>> {
    let unpadded = unpadded_bytes_per_row as usize;
    let padded = padded_bytes_per_row as usize;
    if mapped.len() < padded * height as usize {
        return None;
    }

    let mut frame = Vec::with_capacity(unpadded * height as usize);
    for row in mapped.chunks_exact(padded).take(height as usize) {
        frame.extend_from_slice(&row[..unpadded]);
    }
    Some(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layout_matches_wgsl() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 32);
        assert_eq!(frame_ubo_min_binding_size().get(), 32);
    }

    #[test]
    fn align_rounds_up_to_copy_alignment() {
        let a = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        assert_eq!(align_to(1, a), a);
        assert_eq!(align_to(a, a), a);
        assert_eq!(align_to(a + 1, a), 2 * a);
    }

    #[test]
    fn tight_rows_drop_padding() {
        // 2 rows of 3 bytes padded to 4.
        let mapped = [1, 2, 3, 0, 4, 5, 6, 0];
        assert_eq!(copy_tight_rows(&mapped, 3, 4, 2), Some(vec![1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn tight_rows_reject_short_buffer() {
        assert_eq!(copy_tight_rows(&[0; 7], 3, 4, 2), None);
    }

    #[test]
    fn quad_covers_ndc_square() {
        let xs: Vec<f32> = FULLSCREEN_QUAD.iter().map(|v| v.pos[0]).collect();
        let ys: Vec<f32> = FULLSCREEN_QUAD.iter().map(|v| v.pos[1]).collect();
        assert!(xs.contains(&-1.0) && xs.contains(&1.0));
        assert!(ys.contains(&-1.0) && ys.contains(&1.0));
        assert_eq!(FULLSCREEN_QUAD.len(), 6);
    }
}
