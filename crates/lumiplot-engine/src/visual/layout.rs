//! GPU-side layouts filled by `Visual::update` and read by the shaders.

use bytemuck::{Pod, Zeroable};

use crate::coords::Viewport;

use super::data::{MAT4_IDENTITY, Mat4};

// ── bindings ──────────────────────────────────────────────────────────────

pub const BINDING_MVP: u32 = 0;
pub const BINDING_VIEWPORT: u32 = 1;
pub const BINDING_PARAMS: u32 = 2;
pub const BINDING_TEXTURE: u32 = 3;
/// Sampler paired with `BINDING_TEXTURE`; bound by the renderer.
pub const BINDING_SAMPLER: u32 = 4;

pub const VERTEX_SLOT: u32 = 0;

/// Corners of the instanced quad each item is drawn with.
pub const QUAD_CORNERS: u32 = 6;

// ── vertices ──────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct MarkerVertex {
    pub pos: [f32; 3],
    /// Diameter in pixels.
    pub size: f32,
    pub color: [u8; 4],
}

impl MarkerVertex {
    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32,
        2 => Unorm8x4,
    ];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MarkerVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRS,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SegmentVertex {
    pub p0: [f32; 3],
    pub p1: [f32; 3],
    pub color: [u8; 4],
}

impl SegmentVertex {
    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Unorm8x4,
    ];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SegmentVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRS,
        }
    }
}

// ── uniforms ──────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct MvpUniform {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

impl Default for MvpUniform {
    fn default() -> Self {
        Self {
            model: MAT4_IDENTITY,
            view: MAT4_IDENTITY,
            proj: MAT4_IDENTITY,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct ViewportUniform {
    /// `x, y, w, h` in framebuffer pixels.
    pub rect: [f32; 4],
    pub framebuffer: [f32; 2],
    pub _pad: [f32; 2], // 16-byte alignment
    /// Top, right, bottom, left.
    pub margins: [f32; 4],
}

impl From<Viewport> for ViewportUniform {
    fn from(v: Viewport) -> Self {
        Self {
            rect: [v.rect.origin.x, v.rect.origin.y, v.rect.size.x, v.rect.size.y],
            framebuffer: [v.framebuffer.x, v.framebuffer.y],
            _pad: [0.0; 2],
            margins: v.margins.to_array(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ParamsUniform {
    pub color: [f32; 4],
    pub marker_size: f32,
    pub line_width: f32,
    pub _pad: [f32; 2],
}

pub const DEFAULT_MARKER_SIZE: f32 = 10.0;
pub const DEFAULT_LINE_WIDTH: f32 = 2.0;

impl Default for ParamsUniform {
    fn default() -> Self {
        Self {
            color: [0.0, 0.0, 0.0, 1.0],
            marker_size: DEFAULT_MARKER_SIZE,
            line_width: DEFAULT_LINE_WIDTH,
            _pad: [0.0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_have_expected_sizes() {
        assert_eq!(std::mem::size_of::<MarkerVertex>(), 20);
        assert_eq!(std::mem::size_of::<SegmentVertex>(), 28);
        assert_eq!(std::mem::size_of::<MvpUniform>(), 192);
        assert_eq!(std::mem::size_of::<ViewportUniform>(), 48);
        assert_eq!(std::mem::size_of::<ParamsUniform>(), 32);
    }
}
