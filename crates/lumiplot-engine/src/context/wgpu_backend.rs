use std::any::Any;
use std::collections::HashMap;
use std::sync::mpsc;

use anyhow::{Context as _, Result, anyhow};

use super::backend::{BufferDesc, DeviceLimits, GpuBackend, RawBuffer, RawTexture, TextureDesc};
use super::buffer::{COPY_ALIGNMENT, align_up};
use super::memory::{MemoryFlags, MemoryProperties};
use super::transfer::TransferOp;

struct WgpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// `GpuBackend` on top of a wgpu device and queue.
///
/// wgpu hides memory heaps, so two logical memory types are reported: a
/// device-local one and a host-visible one. Host-visible writes go through
/// `Queue::write_buffer`, which wgpu orders before the next submission.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    limits: DeviceLimits,
    memory: MemoryProperties,
    buffers: HashMap<RawBuffer, wgpu::Buffer>,
    textures: HashMap<RawTexture, WgpuTexture>,
    sampler: wgpu::Sampler,
    next_id: u64,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let dl = device.limits();
        let limits = DeviceLimits {
            min_uniform_alignment: dl.min_uniform_buffer_offset_alignment as u64,
            min_storage_alignment: dl.min_storage_buffer_offset_alignment as u64,
            copy_bytes_per_row_alignment: wgpu::COPY_BYTES_PER_ROW_ALIGNMENT,
        };

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("lumiplot visual sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        log::debug!(
            "wgpu backend: min uniform alignment {}, min storage alignment {}",
            limits.min_uniform_alignment,
            limits.min_storage_alignment
        );

        Self {
            device,
            queue,
            limits,
            memory: MemoryProperties::from_flags(&[MemoryFlags::DEVICE_LOCAL, MemoryFlags::HOST_VISIBLE]),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            sampler,
            next_id: 1,
        }
    }

    #[inline]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn buffer(&self, raw: RawBuffer) -> Option<&wgpu::Buffer> {
        self.buffers.get(&raw)
    }

    pub fn texture_view(&self, raw: RawTexture) -> Option<&wgpu::TextureView> {
        self.textures.get(&raw).map(|t| &t.view)
    }

    #[inline]
    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn wait_idle(&self) -> Result<()> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| anyhow!("device poll failed: {e}"))
    }
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn memory_properties(&self) -> &MemoryProperties {
        &self.memory
    }

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> RawBuffer {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: align_up(desc.size, COPY_ALIGNMENT),
            usage: desc.kind.wgpu_usages(),
            mapped_at_creation: false,
        });
        let id = RawBuffer(self.next_id());
        self.buffers.insert(id, buffer);
        id
    }

    fn destroy_buffer(&mut self, buffer: RawBuffer) {
        if let Some(b) = self.buffers.remove(&buffer) {
            b.destroy();
        }
    }

    fn write_mapped(&mut self, buffer: RawBuffer, offset: u64, data: &[u8]) {
        match self.buffers.get(&buffer) {
            Some(b) => self.queue.write_buffer(b, offset, data),
            None => log::error!("write to unknown buffer {buffer:?}"),
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> RawTexture {
        let [w, h, d] = desc.dims;
        let (dimension, view_dimension) = if d > 1 {
            (wgpu::TextureDimension::D3, wgpu::TextureViewDimension::D3)
        } else {
            (wgpu::TextureDimension::D2, wgpu::TextureViewDimension::D2)
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: w,
                height: h,
                depth_or_array_layers: d,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension,
            format: desc.format.to_wgpu(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(view_dimension),
            ..Default::default()
        });

        let id = RawTexture(self.next_id());
        self.textures.insert(id, WgpuTexture { texture, view });
        id
    }

    fn destroy_texture(&mut self, texture: RawTexture) {
        if let Some(t) = self.textures.remove(&texture) {
            t.texture.destroy();
        }
    }

    fn submit_and_wait(&mut self, ops: &[TransferOp]) -> Result<()> {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("lumiplot transfer encoder"),
        });

        for op in ops {
            match *op {
                TransferOp::CopyBuffer { src, src_offset, dst, dst_offset, size } => {
                    let src = self.buffers.get(&src).context("copy from unknown buffer")?;
                    let dst = self.buffers.get(&dst).context("copy into unknown buffer")?;
                    encoder.copy_buffer_to_buffer(src, src_offset, dst, dst_offset, size);
                }

                TransferOp::CopyBufferToTexture { src, src_offset, bytes_per_row, dst, dims } => {
                    let src = self.buffers.get(&src).context("copy from unknown buffer")?;
                    let dst = self.textures.get(&dst).context("copy into unknown texture")?;
                    encoder.copy_buffer_to_texture(
                        wgpu::TexelCopyBufferInfo {
                            buffer: src,
                            layout: wgpu::TexelCopyBufferLayout {
                                offset: src_offset,
                                bytes_per_row: Some(bytes_per_row),
                                rows_per_image: Some(dims[1]),
                            },
                        },
                        wgpu::TexelCopyTextureInfo {
                            texture: &dst.texture,
                            mip_level: 0,
                            origin: wgpu::Origin3d::ZERO,
                            aspect: wgpu::TextureAspect::All,
                        },
                        wgpu::Extent3d {
                            width: dims[0],
                            height: dims[1],
                            depth_or_array_layers: dims[2],
                        },
                    );
                }

                // wgpu tracks texture usage itself.
                TransferOp::Transition { texture, from, to } => {
                    log::trace!("texture {texture:?}: {from:?} -> {to:?}");
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.wait_idle()
    }

    fn read_buffer(&mut self, buffer: RawBuffer, offset: u64, size: u64) -> Result<Vec<u8>> {
        let src = self.buffers.get(&buffer).context("read of unknown buffer")?;
        let padded = align_up(size, COPY_ALIGNMENT);

        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lumiplot readback buffer"),
            size: padded,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("lumiplot readback encoder"),
        });
        encoder.copy_buffer_to_buffer(src, offset, &readback, 0, padded);
        self.queue.submit(std::iter::once(encoder.finish()));

        let (tx, rx) = mpsc::channel();
        readback.slice(..).map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.wait_idle()?;
        rx.recv()
            .context("readback callback dropped")?
            .map_err(|e| anyhow!("buffer map failed: {e}"))?;

        let bytes = readback.slice(..).get_mapped_range()[..size as usize].to_vec();
        readback.unmap();
        readback.destroy();
        Ok(bytes)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
