//! GPU memory manager.
//!
//! The `Context` owns one growable pool per `BufferKind`, every texture, and
//! the transfer path used to fill them. Callers deal in `BufferRegions` and
//! `TextureId` handles; whether bytes go through a staging buffer or a direct
//! mapped write is decided here from the pool's memory type.

mod backend;
mod buffer;
mod headless;
mod memory;
mod texture;
mod transfer;
mod wgpu_backend;

use std::collections::HashMap;

use anyhow::{Context as _, anyhow};

use crate::error::{Error, Result};

pub use backend::{BufferDesc, DeviceLimits, GpuBackend, RawBuffer, RawTexture, TextureDesc};
pub use buffer::{BufferKind, BufferRegions, COPY_ALIGNMENT, align_up, compute_dynamic_alignment, next_pow2};
pub use headless::HeadlessBackend;
pub use memory::{MemoryFallback, MemoryFlags, MemoryProperties, MemoryType, find_memory_type};
pub use texture::{Texture, TextureFormat, TextureId, TextureLayout, padded_bytes_per_row, texture_size_bytes};
pub use transfer::{TransferBatch, TransferOp};
pub use wgpu_backend::WgpuBackend;

use buffer::BufferPool;
use texture::pad_rows;

/// Memory manager settings.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Bytes reserved when a pool is first created.
    pub initial_pool_size: u64,
    /// Behavior when no memory type satisfies a buffer kind.
    pub memory_fallback: MemoryFallback,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            initial_pool_size: 64 * 1024,
            memory_fallback: MemoryFallback::default(),
        }
    }
}

/// Running counters, mostly useful to tests and debug overlays.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct ContextStats {
    /// Scoped transfers submitted.
    pub transfers: u64,
    /// Staging buffers created for device-local uploads.
    pub staging_buffers: u64,
    /// Uploads written straight into host-visible memory.
    pub direct_writes: u64,
    pub pool_growths: u64,
    pub bytes_uploaded: u64,
}

pub struct Context {
    backend: Box<dyn GpuBackend>,
    config: ContextConfig,
    limits: DeviceLimits,
    pools: HashMap<BufferKind, BufferPool>,
    /// Reference count per live region, keyed by pool and offset.
    refs: HashMap<(BufferKind, u64), u32>,
    textures: HashMap<TextureId, Texture>,
    next_texture: u64,
    stats: ContextStats,
}

impl Context {
    pub fn new(backend: Box<dyn GpuBackend>, config: ContextConfig) -> Self {
        let limits = backend.limits();
        log::info!(
            "context on {} backend (uniform alignment {}, storage alignment {})",
            backend.name(),
            limits.min_uniform_alignment,
            limits.min_storage_alignment
        );
        Self {
            backend,
            config,
            limits,
            pools: HashMap::new(),
            refs: HashMap::new(),
            textures: HashMap::new(),
            next_texture: 1,
            stats: ContextStats::default(),
        }
    }

    /// Context over a fresh `HeadlessBackend` with default settings.
    pub fn headless() -> Self {
        Self::new(Box::new(HeadlessBackend::new()), ContextConfig::default())
    }

    #[inline]
    pub fn backend(&self) -> &dyn GpuBackend {
        self.backend.as_ref()
    }

    #[inline]
    pub fn limits(&self) -> DeviceLimits {
        self.limits
    }

    #[inline]
    pub fn stats(&self) -> ContextStats {
        self.stats
    }

    #[inline]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Number of regions with a non-zero reference count.
    pub fn live_regions(&self) -> usize {
        self.refs.len()
    }

    /// Backing buffer of a pool and its generation. The generation changes
    /// whenever the pool is reallocated, invalidating cached bindings.
    pub fn pool_buffer(&self, kind: BufferKind) -> Option<(RawBuffer, u64)> {
        self.pools.get(&kind).map(|p| (p.raw, p.generation))
    }

    // ── buffers ───────────────────────────────────────────────────────────

    /// Reserves `count` items of `item_size` bytes in the pool of `kind`.
    ///
    /// Uniform and storage items are strided by
    /// [`compute_dynamic_alignment`] so each item can be bound at a dynamic
    /// offset. The returned region starts with a reference count of one.
    pub fn allocate_buffers(&mut self, kind: BufferKind, count: u32, item_size: u64) -> Result<BufferRegions> {
        if count == 0 || item_size == 0 {
            return Err(Error::InvalidDimension(format!(
                "buffer region needs at least one item of at least one byte (count {count}, item size {item_size})"
            )));
        }

        let min_alignment = self.min_alignment(kind);
        let stride = if kind.needs_alignment() {
            compute_dynamic_alignment(item_size, min_alignment)
        } else {
            item_size
        };
        let size = stride * count as u64;

        self.ensure_pool(kind, size)?;
        let offset = self.reserve(kind, size)?;
        self.refs.insert((kind, offset), 1);

        log::trace!("allocated {count} x {item_size}B {kind:?} (stride {stride}) at {offset}");
        Ok(BufferRegions {
            kind,
            offset,
            count,
            item_size,
            stride,
        })
    }

    /// Adds a reference to a shared region.
    pub fn retain(&mut self, regions: &BufferRegions) {
        match self.refs.get_mut(&(regions.kind, regions.offset)) {
            Some(n) => *n += 1,
            None => log::warn!("retain of released {:?} region at {}", regions.kind, regions.offset),
        }
    }

    /// Drops a reference; the last one returns the memory to the pool.
    pub fn release(&mut self, regions: &BufferRegions) {
        let key = (regions.kind, regions.offset);
        let Some(n) = self.refs.get_mut(&key) else {
            log::warn!("release of unknown {:?} region at {}", regions.kind, regions.offset);
            return;
        };
        *n -= 1;
        if *n > 0 {
            return;
        }
        self.refs.remove(&key);
        if let Some(pool) = self.pools.get_mut(&regions.kind) {
            pool.release(regions.offset, regions.size());
        }
    }

    /// Writes `data` at byte `offset` inside `regions`.
    ///
    /// Host-visible pools are written directly. Device-local pools go through
    /// a staging buffer and a scoped transfer that blocks until the copy is
    /// done.
    pub fn upload(&mut self, regions: &BufferRegions, offset: u64, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if offset % COPY_ALIGNMENT != 0 {
            return Err(Error::Misaligned {
                offset,
                alignment: COPY_ALIGNMENT,
            });
        }
        let len = data.len() as u64;
        if offset + len > regions.size() {
            return Err(Error::RegionOverflow {
                offset,
                size: len,
                capacity: regions.size(),
            });
        }
        if !self.refs.contains_key(&(regions.kind, regions.offset)) {
            return Err(Error::Destroyed);
        }
        let pool = self.pools.get(&regions.kind).ok_or(Error::Destroyed)?;
        let (dst, host_visible) = (pool.raw, pool.host_visible);
        let dst_offset = regions.offset + offset;

        // Copies must cover whole words; the pool reserved the tail already.
        // The bytes past `data` in the last word keep their current contents.
        let padded;
        let bytes = if len % COPY_ALIGNMENT == 0 {
            data
        } else {
            let keep = len % COPY_ALIGNMENT;
            let last_word = self.backend.read_buffer(dst, dst_offset + len - keep, COPY_ALIGNMENT)?;
            let mut v = data.to_vec();
            v.extend_from_slice(&last_word[keep as usize..]);
            padded = v;
            &padded[..]
        };

        if host_visible {
            self.backend.write_mapped(dst, dst_offset, bytes);
            self.stats.direct_writes += 1;
        } else {
            let staging = self.create_staging(bytes)?;
            let size = bytes.len() as u64;
            let res = self.scoped_transfer("buffer upload", |batch| {
                batch.copy_buffer(staging, 0, dst, dst_offset, size);
            });
            self.backend.destroy_buffer(staging);
            res?;
        }

        self.stats.bytes_uploaded += len;
        Ok(())
    }

    /// Writes one item at `index`, starting at its strided offset.
    pub fn upload_item(&mut self, regions: &BufferRegions, index: u32, data: &[u8]) -> Result<()> {
        if index >= regions.count {
            return Err(Error::RegionOverflow {
                offset: regions.stride * index as u64,
                size: data.len() as u64,
                capacity: regions.size(),
            });
        }
        if data.len() as u64 > regions.stride {
            return Err(Error::DataLength {
                expected: regions.stride,
                actual: data.len() as u64,
            });
        }
        self.upload(regions, regions.stride * index as u64, data)
    }

    /// Reads `size` bytes at `offset` inside `regions` back to the CPU.
    pub fn download(&mut self, regions: &BufferRegions, offset: u64, size: u64) -> Result<Vec<u8>> {
        if offset + size > regions.size() {
            return Err(Error::RegionOverflow {
                offset,
                size,
                capacity: regions.size(),
            });
        }
        let pool = self.pools.get(&regions.kind).ok_or(Error::Destroyed)?;
        let raw = pool.raw;

        let start = regions.offset + offset;
        let aligned_start = start - start % COPY_ALIGNMENT;
        let aligned_end = align_up(start + size, COPY_ALIGNMENT);
        let bytes = self.backend.read_buffer(raw, aligned_start, aligned_end - aligned_start)?;

        let skip = (start - aligned_start) as usize;
        Ok(bytes[skip..skip + size as usize].to_vec())
    }

    // ── textures ──────────────────────────────────────────────────────────

    pub fn allocate_texture(&mut self, dims: [u32; 3], format: TextureFormat) -> Result<TextureId> {
        if dims.contains(&0) {
            return Err(Error::InvalidDimension(format!(
                "texture dimensions must all be at least 1, got {dims:?}"
            )));
        }

        let raw = self.backend.create_texture(&TextureDesc {
            label: "lumiplot visual texture",
            dims,
            format,
        });
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(
            id,
            Texture {
                id,
                raw,
                dims,
                format,
                layout: TextureLayout::Undefined,
            },
        );
        Ok(id)
    }

    /// Moves the texture to transfer-destination, copies `data` when given,
    /// then moves it to shader-read. One scoped transfer covers all three.
    pub fn upload_texture(&mut self, id: TextureId, data: Option<&[u8]>) -> Result<()> {
        let tex = self.textures.get(&id).ok_or(Error::UnknownTexture(id.0))?.clone();

        if let Some(data) = data {
            let expected = tex.size_bytes();
            if data.len() as u64 != expected {
                return Err(Error::DataLength {
                    expected,
                    actual: data.len() as u64,
                });
            }
        }

        let from = tex.layout;
        if from != TextureLayout::TransferDst && !TextureLayout::can_transition(from, TextureLayout::TransferDst) {
            log::error!("texture {} cannot leave {from:?} layout", id.0);
            return Ok(());
        }

        let staged = match data {
            Some(data) => {
                let row_bytes = tex.dims[0] * tex.format.bytes_per_texel();
                let pitch = padded_bytes_per_row(row_bytes, self.limits.copy_bytes_per_row_alignment);
                let rows = (tex.dims[1] * tex.dims[2]) as usize;
                let bytes = pad_rows(data, row_bytes as usize, pitch as usize, rows);
                Some((self.create_staging(&bytes)?, pitch))
            }
            None => None,
        };

        let res = self.scoped_transfer("texture upload", |batch| {
            if from != TextureLayout::TransferDst {
                batch.transition(tex.raw, from, TextureLayout::TransferDst);
            }
            if let Some((staging, pitch)) = staged {
                batch.copy_buffer_to_texture(staging, 0, pitch, tex.raw, tex.dims);
            }
            batch.transition(tex.raw, TextureLayout::TransferDst, TextureLayout::ShaderRead);
        });
        if let Some((staging, _)) = staged {
            self.backend.destroy_buffer(staging);
        }
        res?;

        if let Some(t) = self.textures.get_mut(&id) {
            t.layout = TextureLayout::ShaderRead;
        }
        if let Some(data) = data {
            self.stats.bytes_uploaded += data.len() as u64;
        }
        Ok(())
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(&id)
    }

    pub fn destroy_texture(&mut self, id: TextureId) {
        if let Some(t) = self.textures.remove(&id) {
            self.backend.destroy_texture(t.raw);
        }
    }

    // ── transfers ─────────────────────────────────────────────────────────

    /// Records a one-shot transfer, submits it and waits for completion.
    ///
    /// The batch exists only inside `record`; nothing is submitted when it
    /// stays empty.
    pub fn scoped_transfer<F>(&mut self, label: &str, record: F) -> Result<()>
    where
        F: FnOnce(&mut TransferBatch),
    {
        let mut batch = TransferBatch::new();
        record(&mut batch);
        if batch.is_empty() {
            return Ok(());
        }

        self.backend
            .submit_and_wait(batch.ops())
            .with_context(|| format!("{label} transfer failed"))?;
        self.stats.transfers += 1;
        Ok(())
    }

    /// Releases every pool and texture. The context is empty afterwards.
    pub fn destroy(&mut self) {
        for (_, pool) in self.pools.drain() {
            self.backend.destroy_buffer(pool.raw);
        }
        for (_, tex) in self.textures.drain() {
            self.backend.destroy_texture(tex.raw);
        }
        self.refs.clear();
    }

    // ── internals ─────────────────────────────────────────────────────────

    fn min_alignment(&self, kind: BufferKind) -> u64 {
        match kind {
            BufferKind::Uniform | BufferKind::UniformMappable => self.limits.min_uniform_alignment,
            BufferKind::Storage => self.limits.min_storage_alignment,
            _ => COPY_ALIGNMENT,
        }
    }

    fn select_memory_type(&self, kind: BufferKind) -> Result<u32> {
        let filter = self.backend.memory_type_bits(kind);
        let required = kind.required_memory();
        if let Some(index) = find_memory_type(filter, required, self.backend.memory_properties()) {
            return Ok(index);
        }

        match self.config.memory_fallback {
            MemoryFallback::FirstType => {
                log::error!("no memory type for {kind:?} buffers ({required:?}), falling back to type 0");
                Ok(0)
            }
            MemoryFallback::Fail => Err(Error::NoCompatibleMemory { kind }),
        }
    }

    fn is_host_visible(&self, memory_type: u32) -> bool {
        self.backend
            .memory_properties()
            .types
            .get(memory_type as usize)
            .is_some_and(|t| t.flags.host_visible)
    }

    fn create_staging(&mut self, bytes: &[u8]) -> Result<RawBuffer> {
        let memory_type = self.select_memory_type(BufferKind::Staging)?;
        let raw = self.backend.create_buffer(&BufferDesc {
            label: BufferKind::Staging.label(),
            size: align_up(bytes.len() as u64, COPY_ALIGNMENT),
            kind: BufferKind::Staging,
            memory_type,
        });
        self.backend.write_mapped(raw, 0, bytes);
        self.stats.staging_buffers += 1;
        Ok(raw)
    }

    fn ensure_pool(&mut self, kind: BufferKind, size: u64) -> Result<()> {
        if self.pools.contains_key(&kind) {
            return Ok(());
        }

        let memory_type = self.select_memory_type(kind)?;
        let capacity = next_pow2(self.config.initial_pool_size.max(size));
        let raw = self.backend.create_buffer(&BufferDesc {
            label: kind.label(),
            size: capacity,
            kind,
            memory_type,
        });
        let host_visible = self.is_host_visible(memory_type);
        log::debug!("created {kind:?} pool: {capacity} bytes, memory type {memory_type} (host visible: {host_visible})");

        self.pools.insert(
            kind,
            BufferPool {
                kind,
                raw,
                memory_type,
                host_visible,
                capacity,
                cursor: 0,
                alignment: self.min_alignment(kind),
                free: Vec::new(),
                generation: 0,
            },
        );
        Ok(())
    }

    fn reserve(&mut self, kind: BufferKind, size: u64) -> Result<u64> {
        let pool = self.pools.get_mut(&kind).ok_or(Error::Destroyed)?;
        if let Some(offset) = pool.reserve(size) {
            return Ok(offset);
        }

        let required = pool.required_end(size);
        self.grow_pool(kind, required)?;

        let pool = self.pools.get_mut(&kind).ok_or(Error::Destroyed)?;
        pool.reserve(size)
            .ok_or_else(|| anyhow!("{kind:?} pool still full after growing to {}", pool.capacity).into())
    }

    /// Replaces the pool's buffer with one of `next_pow2(required)` bytes and
    /// copies the used range across. Region offsets stay valid.
    fn grow_pool(&mut self, kind: BufferKind, required: u64) -> Result<()> {
        let (old_raw, used, memory_type, old_capacity) = {
            let pool = self.pools.get(&kind).ok_or(Error::Destroyed)?;
            (pool.raw, align_up(pool.cursor, COPY_ALIGNMENT), pool.memory_type, pool.capacity)
        };
        let capacity = next_pow2(required);

        let new_raw = self.backend.create_buffer(&BufferDesc {
            label: kind.label(),
            size: capacity,
            kind,
            memory_type,
        });
        let res = self.scoped_transfer("pool growth", |batch| {
            if used > 0 {
                batch.copy_buffer(old_raw, 0, new_raw, 0, used);
            }
        });
        if let Err(e) = res {
            self.backend.destroy_buffer(new_raw);
            return Err(e);
        }
        self.backend.destroy_buffer(old_raw);

        if let Some(pool) = self.pools.get_mut(&kind) {
            pool.raw = new_raw;
            pool.capacity = capacity;
            pool.generation += 1;
        }
        self.stats.pool_growths += 1;
        log::debug!("grew {kind:?} pool {old_capacity} -> {capacity} bytes");
        Ok(())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.destroy();
    }
}
