use super::backend::RawTexture;

/// Texel formats accepted for visual textures.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    R8Unorm,
}

impl TextureFormat {
    #[inline]
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm => 4,
            TextureFormat::R8Unorm => 1,
        }
    }

    pub(crate) fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
        }
    }
}

/// Image layout state tracked per texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureLayout {
    Undefined,
    TransferDst,
    ShaderRead,
}

impl TextureLayout {
    /// Layout transitions the transfer path knows how to perform.
    pub fn can_transition(from: TextureLayout, to: TextureLayout) -> bool {
        matches!(
            (from, to),
            (TextureLayout::Undefined, TextureLayout::TransferDst)
                | (TextureLayout::TransferDst, TextureLayout::ShaderRead)
                | (TextureLayout::ShaderRead, TextureLayout::TransferDst)
        )
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// A texture owned by the `Context`.
#[derive(Debug, Clone)]
pub struct Texture {
    pub id: TextureId,
    pub raw: RawTexture,
    pub dims: [u32; 3],
    pub format: TextureFormat,
    pub layout: TextureLayout,
}

impl Texture {
    #[inline]
    pub fn size_bytes(&self) -> u64 {
        texture_size_bytes(self.dims, self.format)
    }
}

/// `width * height * depth * bytes_per_texel`.
#[inline]
pub fn texture_size_bytes(dims: [u32; 3], format: TextureFormat) -> u64 {
    dims.iter().map(|&d| d as u64).product::<u64>() * format.bytes_per_texel() as u64
}

/// Row pitch for buffer-to-texture copies, padded to `align` bytes.
#[inline]
pub fn padded_bytes_per_row(row_bytes: u32, align: u32) -> u32 {
    if align <= 1 {
        return row_bytes;
    }
    row_bytes.div_ceil(align) * align
}

/// Copies `rows` rows of `row_bytes` into a buffer with `padded_row` pitch.
pub(crate) fn pad_rows(data: &[u8], row_bytes: usize, padded_row: usize, rows: usize) -> Vec<u8> {
    if row_bytes == padded_row {
        return data.to_vec();
    }
    let mut out = vec![0u8; padded_row * rows];
    for (src, dst) in data.chunks_exact(row_bytes).zip(out.chunks_exact_mut(padded_row)) {
        dst[..row_bytes].copy_from_slice(src);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_product_of_dims_and_texel_size() {
        assert_eq!(texture_size_bytes([4, 2, 3], TextureFormat::Rgba8Unorm), 96);
        assert_eq!(texture_size_bytes([1, 1, 1], TextureFormat::R8Unorm), 1);
    }

    #[test]
    fn rows_are_padded_to_alignment() {
        assert_eq!(padded_bytes_per_row(12, 256), 256);
        assert_eq!(padded_bytes_per_row(256, 256), 256);
        assert_eq!(padded_bytes_per_row(12, 1), 12);

        let data = [1u8, 2, 3, 4, 5, 6];
        let padded = pad_rows(&data, 3, 4, 2);
        assert_eq!(padded, vec![1, 2, 3, 0, 4, 5, 6, 0]);
    }

    #[test]
    fn only_known_transitions_are_allowed() {
        use TextureLayout::*;
        assert!(TextureLayout::can_transition(Undefined, TransferDst));
        assert!(TextureLayout::can_transition(TransferDst, ShaderRead));
        assert!(TextureLayout::can_transition(ShaderRead, TransferDst));
        assert!(!TextureLayout::can_transition(Undefined, ShaderRead));
        assert!(!TextureLayout::can_transition(ShaderRead, Undefined));
    }
}
