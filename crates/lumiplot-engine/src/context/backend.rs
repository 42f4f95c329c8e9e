use std::any::Any;

use anyhow::Result;

use super::buffer::BufferKind;
use super::memory::MemoryProperties;
use super::texture::TextureFormat;
use super::transfer::TransferOp;

/// Backend-side buffer handle.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct RawBuffer(pub u64);

/// Backend-side texture handle.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct RawTexture(pub u64);

/// Device limits the memory manager depends on.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DeviceLimits {
    pub min_uniform_alignment: u64,
    pub min_storage_alignment: u64,
    /// Row pitch alignment for buffer-to-texture copies.
    pub copy_bytes_per_row_alignment: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            min_uniform_alignment: 256,
            min_storage_alignment: 256,
            copy_bytes_per_row_alignment: wgpu::COPY_BYTES_PER_ROW_ALIGNMENT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub size: u64,
    pub kind: BufferKind,
    pub memory_type: u32,
}

#[derive(Debug, Clone)]
pub struct TextureDesc<'a> {
    pub label: &'a str,
    pub dims: [u32; 3],
    pub format: TextureFormat,
}

/// The narrow GPU interface the `Context` is built on.
///
/// Implementations own the raw objects; the `Context` decides placement,
/// alignment and which upload path to take.
pub trait GpuBackend {
    fn name(&self) -> &'static str;

    fn limits(&self) -> DeviceLimits;

    fn memory_properties(&self) -> &MemoryProperties;

    /// Bitmask of memory types a buffer of `kind` may live in.
    fn memory_type_bits(&self, kind: BufferKind) -> u32 {
        let _ = kind;
        u32::MAX
    }

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> RawBuffer;

    fn destroy_buffer(&mut self, buffer: RawBuffer);

    /// Map, copy and unmap host-visible memory.
    fn write_mapped(&mut self, buffer: RawBuffer, offset: u64, data: &[u8]);

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> RawTexture;

    fn destroy_texture(&mut self, texture: RawTexture);

    /// Records `ops` into a transient command buffer, submits it and blocks
    /// until the GPU has finished executing it.
    fn submit_and_wait(&mut self, ops: &[TransferOp]) -> Result<()>;

    /// Reads back `size` bytes at `offset`. Blocks until the data is available.
    fn read_buffer(&mut self, buffer: RawBuffer, offset: u64, size: u64) -> Result<Vec<u8>>;

    fn as_any(&self) -> &dyn Any;
}
