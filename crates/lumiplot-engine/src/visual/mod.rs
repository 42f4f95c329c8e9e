//! Visuals: typed properties packed into GPU sources.
//!
//! Each [`VisualKind`] has a fixed [`VisualSpec`] listing the property slots
//! and source bindings it accepts. `set_data` and `bind_source` are checked
//! against that table; `update` packs the CPU data into the vertex and uniform
//! layouts in [`layout`] and uploads it through the `Context`.

mod data;
mod descriptor;
mod kind;
pub mod layout;
mod visual;

pub use data::{DataCoords, MAT4_IDENTITY, Mat4, PropData};
pub use descriptor::{PropCount, PropSpec, Requirement, SourceSpec, VisualSpec};
pub use kind::{Axis, AxisLevel, DataType, PropKind, SourceKind, VisualFlags, VisualKind};
pub use visual::{Visual, VisualHandle};
