//! Contract between the window runtime and applications.
//!
//! An application never sees winit or wgpu objects: it receives the canvas
//! once at setup and again every frame.

mod app;

pub use app::{App, AppControl};
