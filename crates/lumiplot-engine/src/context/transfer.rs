use super::backend::{RawBuffer, RawTexture};
use super::texture::TextureLayout;

/// One command of a one-shot transfer submission.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOp {
    CopyBuffer {
        src: RawBuffer,
        src_offset: u64,
        dst: RawBuffer,
        dst_offset: u64,
        size: u64,
    },
    CopyBufferToTexture {
        src: RawBuffer,
        src_offset: u64,
        /// Row pitch in `src`, already padded for the device.
        bytes_per_row: u32,
        dst: RawTexture,
        dims: [u32; 3],
    },
    Transition {
        texture: RawTexture,
        from: TextureLayout,
        to: TextureLayout,
    },
}

/// Transient command list filled inside `Context::scoped_transfer`.
///
/// The batch only lives for the duration of the closure; submission, the
/// completion wait and release happen when the closure returns.
#[derive(Debug, Default)]
pub struct TransferBatch {
    ops: Vec<TransferOp>,
}

impl TransferBatch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn copy_buffer(&mut self, src: RawBuffer, src_offset: u64, dst: RawBuffer, dst_offset: u64, size: u64) {
        self.ops.push(TransferOp::CopyBuffer { src, src_offset, dst, dst_offset, size });
    }

    pub fn copy_buffer_to_texture(
        &mut self,
        src: RawBuffer,
        src_offset: u64,
        bytes_per_row: u32,
        dst: RawTexture,
        dims: [u32; 3],
    ) {
        self.ops.push(TransferOp::CopyBufferToTexture { src, src_offset, bytes_per_row, dst, dims });
    }

    pub fn transition(&mut self, texture: RawTexture, from: TextureLayout, to: TextureLayout) {
        self.ops.push(TransferOp::Transition { texture, from, to });
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[inline]
    pub fn ops(&self) -> &[TransferOp] {
        &self.ops
    }
}
