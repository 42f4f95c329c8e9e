//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Window, wires them to the GPU layer and
//! drives one `Canvas` per run: input is translated and dispatched, every
//! redraw runs a canvas frame and replays its command buffers.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
