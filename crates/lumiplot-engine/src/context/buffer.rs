use super::backend::RawBuffer;
use super::memory::MemoryFlags;

/// Copy offsets and sizes must be multiples of this many bytes.
pub const COPY_ALIGNMENT: u64 = wgpu::COPY_BUFFER_ALIGNMENT;

/// Kind of pooled buffer. Each kind is backed by one growable GPU buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum BufferKind {
    /// Host-visible transfer source. Never pooled; created per transfer.
    Staging,
    Vertex,
    Index,
    Storage,
    /// Device-local uniforms, written through staging transfers.
    Uniform,
    /// Host-visible uniforms, written directly.
    UniformMappable,
}

impl BufferKind {
    /// Every pooled kind.
    pub const POOLED: [BufferKind; 5] = [
        BufferKind::Vertex,
        BufferKind::Index,
        BufferKind::Storage,
        BufferKind::Uniform,
        BufferKind::UniformMappable,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            BufferKind::Staging => "lumiplot staging buffer",
            BufferKind::Vertex => "lumiplot vertex pool",
            BufferKind::Index => "lumiplot index pool",
            BufferKind::Storage => "lumiplot storage pool",
            BufferKind::Uniform => "lumiplot uniform pool",
            BufferKind::UniformMappable => "lumiplot mappable uniform pool",
        }
    }

    /// Memory flags a buffer of this kind must be allocated with.
    pub fn required_memory(self) -> MemoryFlags {
        match self {
            BufferKind::Staging | BufferKind::UniformMappable => MemoryFlags::HOST_VISIBLE,
            _ => MemoryFlags::DEVICE_LOCAL,
        }
    }

    /// True for kinds whose regions are bound with dynamic offsets and so need
    /// aligned strides.
    pub fn needs_alignment(self) -> bool {
        matches!(self, BufferKind::Uniform | BufferKind::UniformMappable | BufferKind::Storage)
    }

    pub(crate) fn wgpu_usages(self) -> wgpu::BufferUsages {
        let base = wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC;
        base | match self {
            BufferKind::Staging => wgpu::BufferUsages::empty(),
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
            BufferKind::Storage => wgpu::BufferUsages::STORAGE,
            BufferKind::Uniform | BufferKind::UniformMappable => wgpu::BufferUsages::UNIFORM,
        }
    }
}

/// A run of `count` equally strided items inside a pooled buffer.
///
/// Regions are plain handles: the pool they point into belongs to the
/// `Context`, which keeps a reference count per region. Copies of a handle
/// refer to the same memory.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BufferRegions {
    pub kind: BufferKind,
    /// Byte offset of item 0 inside the pool.
    pub offset: u64,
    pub count: u32,
    /// Requested bytes per item.
    pub item_size: u64,
    /// Distance between consecutive items, `>= item_size`.
    pub stride: u64,
}

impl BufferRegions {
    /// Total bytes spanned by the region.
    #[inline]
    pub fn size(&self) -> u64 {
        self.stride * self.count as u64
    }

    /// Pool offset of item `index`.
    #[inline]
    pub fn item_offset(&self, index: u32) -> u64 {
        debug_assert!(index < self.count, "item {index} out of {} items", self.count);
        self.offset + self.stride * index as u64
    }

    /// Region covering only item `index`, with a count of one.
    #[inline]
    pub fn item(&self, index: u32) -> BufferRegions {
        BufferRegions {
            offset: self.item_offset(index),
            count: 1,
            ..*self
        }
    }

    /// Pool offsets of every item.
    pub fn offsets(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.count).map(|i| self.item_offset(i))
    }
}

/// Smallest power of two `>= x` (1 for 0).
#[inline]
pub fn next_pow2(x: u64) -> u64 {
    x.max(1).next_power_of_two()
}

#[inline]
pub fn align_up(x: u64, align: u64) -> u64 {
    if align <= 1 {
        return x;
    }
    x.div_ceil(align) * align
}

/// Stride for items of `item_size` bytes bound at dynamic offsets.
///
/// Rounded up to the device's minimum offset alignment, then to the next power
/// of two so stride arithmetic stays consistent across devices.
pub fn compute_dynamic_alignment(item_size: u64, min_alignment: u64) -> u64 {
    let aligned = if min_alignment > 0 {
        align_up(item_size, min_alignment)
    } else {
        item_size
    };
    next_pow2(aligned)
}

/// One growable GPU buffer plus a sub-allocator.
#[derive(Debug)]
pub(crate) struct BufferPool {
    pub kind: BufferKind,
    pub raw: RawBuffer,
    pub memory_type: u32,
    pub host_visible: bool,
    pub capacity: u64,
    /// End of the highest allocation made so far.
    pub cursor: u64,
    /// Alignment for region offsets.
    pub alignment: u64,
    /// Released `(offset, size)` blocks available for reuse.
    pub free: Vec<(u64, u64)>,
    /// Bumped every time the backing buffer is replaced.
    pub generation: u64,
}

impl BufferPool {
    /// Reserves `size` bytes. Returns `None` if the pool must grow first.
    pub fn reserve(&mut self, size: u64) -> Option<u64> {
        let size = align_up(size, COPY_ALIGNMENT);

        if let Some(offset) = self.reserve_from_free_list(size) {
            return Some(offset);
        }

        let offset = align_up(self.cursor, self.alignment.max(COPY_ALIGNMENT));
        if offset + size > self.capacity {
            return None;
        }
        self.cursor = offset + size;
        Some(offset)
    }

    /// Returns the end offset a reservation of `size` would need.
    pub fn required_end(&self, size: u64) -> u64 {
        align_up(self.cursor, self.alignment.max(COPY_ALIGNMENT)) + align_up(size, COPY_ALIGNMENT)
    }

    pub fn release(&mut self, offset: u64, size: u64) {
        let size = align_up(size, COPY_ALIGNMENT);
        if offset + size == self.cursor {
            self.cursor = offset;
        } else {
            self.free.push((offset, size));
        }
    }

    fn reserve_from_free_list(&mut self, size: u64) -> Option<u64> {
        let align = self.alignment.max(COPY_ALIGNMENT);
        let idx = self.free.iter().position(|&(off, len)| {
            let start = align_up(off, align);
            start + size <= off + len
        })?;

        let (off, len) = self.free.swap_remove(idx);
        let start = align_up(off, align);
        if start > off {
            self.free.push((off, start - off));
        }
        let tail = off + len - (start + size);
        if tail > 0 {
            self.free.push((start + size, tail));
        }
        Some(start)
    }
}
