//! Input subsystem.
//!
//! Public API is platform-agnostic and does not expose winit types.
//! The runtime translates platform events into `InputEvent`s and hands them
//! to `Canvas::dispatch_event`.

mod mouse;
pub mod platform;
mod types;

pub use mouse::{Mouse, MouseState};
pub use types::{ButtonState, EventKind, InputEvent, Key, Modifiers, MouseButton, MouseWheelDelta};
