//! Lumiplot engine crate.
//!
//! GPU plotting toolkit: visuals pack typed data into pooled GPU buffers,
//! panels lay them out on a grid, and a canvas records and replays their
//! draw commands every frame.

pub mod canvas;
pub mod commands;
pub mod context;
pub mod coords;
pub mod core;
pub mod device;
pub mod input;
pub mod logging;
pub mod panel;
pub mod render;
pub mod time;
pub mod visual;
pub mod window;

mod error;
mod status;

pub use error::{Error, Result};
pub use status::ObjStatus;
