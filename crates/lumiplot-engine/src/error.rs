use thiserror::Error;

use crate::context::BufferKind;
use crate::visual::{DataType, PropKind, SourceKind, VisualKind};

/// Errors returned by the visual, compositor and memory APIs.
///
/// Device and window setup report through `anyhow` instead; these variants
/// cover misuse of the data pipeline that a caller can act on.
#[derive(Error, Debug)]
pub enum Error {
    #[error("property {prop:?} is not supported by {kind:?} visuals")]
    InvalidProperty { kind: VisualKind, prop: PropKind },

    #[error("property {prop:?} has {parts} part(s); index {index} is out of range")]
    InvalidIndex { prop: PropKind, index: u32, parts: u32 },

    #[error("property {prop:?} expects {expected:?} data, got {actual:?}")]
    DataType { prop: PropKind, expected: DataType, actual: DataType },

    #[error("property {prop:?} holds {expected} item(s) but {actual} were given")]
    CountMismatch { prop: PropKind, expected: u32, actual: u32 },

    #[error("{kind:?} visual is missing required property {prop:?} (index {index})")]
    MissingProperty { kind: VisualKind, prop: PropKind, index: u32 },

    #[error("source {source_kind:?} binding {binding} is not declared by {kind:?} visuals")]
    InvalidSource { kind: VisualKind, source_kind: SourceKind, binding: u32 },

    #[error("source {source_kind:?} binding {binding} needs {required} bytes per item, region has {available}")]
    SourceTooSmall { source_kind: SourceKind, binding: u32, required: u64, available: u64 },

    #[error("invalid dimensions: {0}")]
    InvalidDimension(String),

    #[error("cell ({row}, {col}) is outside a {rows}x{cols} grid")]
    OutOfBounds { row: u32, col: u32, rows: u32, cols: u32 },

    #[error("panel at ({row}, {col}) would overlap an existing panel")]
    CellOverlap { row: u32, col: u32 },

    #[error("no memory type compatible with {kind:?} buffers")]
    NoCompatibleMemory { kind: BufferKind },

    #[error("texture {0} does not exist")]
    UnknownTexture(u64),

    #[error("expected {expected} bytes of data, got {actual}")]
    DataLength { expected: u64, actual: u64 },

    #[error("write of {size} bytes at offset {offset} exceeds a {capacity}-byte region")]
    RegionOverflow { offset: u64, size: u64, capacity: u64 },

    #[error("offset {offset} is not aligned to {alignment} bytes")]
    Misaligned { offset: u64, alignment: u64 },

    #[error("object has been destroyed")]
    Destroyed,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
