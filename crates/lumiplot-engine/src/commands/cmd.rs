use crate::context::{BufferRegions, TextureId};
use crate::coords::{ColorRgba, Rect};

/// GPU pipeline a draw is recorded against.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum PipelineKey {
    /// Instanced point sprites (markers, scatter).
    Marker,
    /// Instanced thick lines (segments, axes).
    Segment,
}

/// Renderer-agnostic command stream entry.
///
/// Bindings refer to `Context` handles; the renderer resolves them to GPU
/// objects at replay time.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Opens the render pass. `clear` is used when this is the first pass
    /// of the frame; later passes load the existing contents.
    BeginRenderPass { clear: ColorRgba },
    /// Pixel viewport on the framebuffer.
    SetViewport(Rect),
    SetScissor { x: u32, y: u32, width: u32, height: u32 },
    BindPipeline(PipelineKey),
    BindVertexBuffer { slot: u32, region: BufferRegions },
    /// Binds one uniform item; `region.count` is always 1.
    BindUniform { binding: u32, region: BufferRegions },
    BindTexture { binding: u32, texture: TextureId },
    /// Instanced quad draw: `vertex_count` corners per instance.
    Draw { vertex_count: u32, instance_count: u32 },
    EndRenderPass,
}
