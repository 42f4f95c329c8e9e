use std::any::Any;
use std::collections::HashMap;

use anyhow::{Context as _, Result, bail, ensure};

use super::backend::{BufferDesc, DeviceLimits, GpuBackend, RawBuffer, RawTexture, TextureDesc};
use super::buffer::BufferKind;
use super::memory::MemoryProperties;
use super::texture::{TextureFormat, TextureLayout, texture_size_bytes};
use super::transfer::TransferOp;

struct HeadlessBuffer {
    data: Vec<u8>,
    kind: BufferKind,
    memory_type: u32,
}

struct HeadlessTexture {
    dims: [u32; 3],
    format: TextureFormat,
    data: Vec<u8>,
    layout: TextureLayout,
}

/// CPU-memory backend.
///
/// Executes transfers synchronously on plain byte vectors. Used for tests and
/// offscreen runs where no adapter is available. Limits and memory types are
/// configurable so alignment and fallback paths can be exercised.
pub struct HeadlessBackend {
    limits: DeviceLimits,
    memory: MemoryProperties,
    buffers: HashMap<RawBuffer, HeadlessBuffer>,
    textures: HashMap<RawTexture, HeadlessTexture>,
    next_id: u64,
    submissions: u64,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            limits: DeviceLimits::default(),
            memory: MemoryProperties::default(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            next_id: 1,
            submissions: 0,
        }
    }

    pub fn with_limits(mut self, limits: DeviceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_memory_properties(mut self, memory: MemoryProperties) -> Self {
        self.memory = memory;
        self
    }

    /// Number of live buffers, staging buffers included.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    pub fn texture_data(&self, texture: RawTexture) -> Option<&[u8]> {
        self.textures.get(&texture).map(|t| t.data.as_slice())
    }

    pub fn texture_layout(&self, texture: RawTexture) -> Option<TextureLayout> {
        self.textures.get(&texture).map(|t| t.layout)
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn execute(&mut self, op: &TransferOp) -> Result<()> {
        match *op {
            TransferOp::CopyBuffer { src, src_offset, dst, dst_offset, size } => {
                let (s, n) = (src_offset as usize, size as usize);
                let bytes = {
                    let src = self.buffers.get(&src).context("copy from unknown buffer")?;
                    ensure!(s + n <= src.data.len(), "copy source out of range");
                    src.data[s..s + n].to_vec()
                };
                let dst = self.buffers.get_mut(&dst).context("copy into unknown buffer")?;
                let d = dst_offset as usize;
                ensure!(d + n <= dst.data.len(), "copy destination out of range");
                dst.data[d..d + n].copy_from_slice(&bytes);
            }

            TransferOp::CopyBufferToTexture { src, src_offset, bytes_per_row, dst, dims } => {
                let src = self.buffers.get(&src).context("copy from unknown buffer")?;
                let tex = self.textures.get_mut(&dst).context("copy into unknown texture")?;
                ensure!(tex.dims == dims, "copy extent does not match texture");
                if tex.layout != TextureLayout::TransferDst {
                    bail!("texture copy while in {:?} layout", tex.layout);
                }

                let row = (dims[0] * tex.format.bytes_per_texel()) as usize;
                let rows = (dims[1] * dims[2]) as usize;
                let pitch = bytes_per_row as usize;
                let start = src_offset as usize;
                ensure!(start + pitch * rows <= src.data.len(), "texture copy source out of range");

                for r in 0..rows {
                    let from = start + r * pitch;
                    tex.data[r * row..(r + 1) * row].copy_from_slice(&src.data[from..from + row]);
                }
            }

            TransferOp::Transition { texture, from, to } => {
                let tex = self.textures.get_mut(&texture).context("transition of unknown texture")?;
                ensure!(tex.layout == from, "texture is in {:?}, not {:?}", tex.layout, from);
                tex.layout = to;
            }
        }
        Ok(())
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn memory_properties(&self) -> &MemoryProperties {
        &self.memory
    }

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> RawBuffer {
        let id = RawBuffer(self.next_id());
        self.buffers.insert(
            id,
            HeadlessBuffer {
                data: vec![0; desc.size as usize],
                kind: desc.kind,
                memory_type: desc.memory_type,
            },
        );
        id
    }

    fn destroy_buffer(&mut self, buffer: RawBuffer) {
        self.buffers.remove(&buffer);
    }

    fn write_mapped(&mut self, buffer: RawBuffer, offset: u64, data: &[u8]) {
        let host_visible = |ty: u32| {
            self.memory
                .types
                .get(ty as usize)
                .is_some_and(|t| t.flags.host_visible)
        };

        let Some(buf) = self.buffers.get(&buffer) else {
            log::error!("write to unknown buffer {buffer:?}");
            return;
        };
        if !host_visible(buf.memory_type) {
            log::error!("mapping {:?} buffer in non host-visible memory", buf.kind);
        }

        let Some(buf) = self.buffers.get_mut(&buffer) else { return };
        let start = offset as usize;
        let end = start + data.len();
        if end > buf.data.len() {
            log::error!("mapped write of {} bytes at {offset} overflows buffer", data.len());
            return;
        }
        buf.data[start..end].copy_from_slice(data);
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> RawTexture {
        let id = RawTexture(self.next_id());
        self.textures.insert(
            id,
            HeadlessTexture {
                dims: desc.dims,
                format: desc.format,
                data: vec![0; texture_size_bytes(desc.dims, desc.format) as usize],
                layout: TextureLayout::Undefined,
            },
        );
        id
    }

    fn destroy_texture(&mut self, texture: RawTexture) {
        self.textures.remove(&texture);
    }

    fn submit_and_wait(&mut self, ops: &[TransferOp]) -> Result<()> {
        for op in ops {
            self.execute(op)?;
        }
        self.submissions += 1;
        Ok(())
    }

    fn read_buffer(&mut self, buffer: RawBuffer, offset: u64, size: u64) -> Result<Vec<u8>> {
        let buf = self.buffers.get(&buffer).context("read of unknown buffer")?;
        let (start, end) = (offset as usize, (offset + size) as usize);
        ensure!(end <= buf.data.len(), "read out of range");
        Ok(buf.data[start..end].to_vec())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
