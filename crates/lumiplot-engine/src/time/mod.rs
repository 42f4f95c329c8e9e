//! Frame timing.
//!
//! Each canvas owns one `FrameClock` and ticks it once per `Canvas::frame`.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
