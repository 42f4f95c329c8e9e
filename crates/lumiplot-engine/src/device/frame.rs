/// A single acquired frame: surface texture, its view and the encoder the
/// renderer replays command buffers into.
///
/// Short-lived; holding the surface texture blocks acquisition of the next
/// frame.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}
