//! Geometry types shared by the compositor, visuals and renderer.
//!
//! Canonical CPU space:
//! - physical pixels of the canvas framebuffer
//! - origin top-left
//! - +X right, +Y down
//!
//! Visual data lives in normalized device coordinates; `Viewport` maps NDC
//! onto a pixel rectangle at draw time.

mod color;
mod rect;
mod vec2;
mod viewport;

pub use color::ColorRgba;
pub use rect::Rect;
pub use vec2::Vec2;
pub use viewport::{Margins, Viewport, ViewportMode};
