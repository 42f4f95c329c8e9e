//! Recorded command streams.
//!
//! Visuals record into `CommandBuffer`s without touching the GPU. The
//! renderer replays executable buffers into a frame encoder. Buffers carry a
//! `CommandGroup` tag so refill handlers only rewrite the buffers they own.

mod buffer;
mod cmd;

pub use buffer::{CommandBuffer, CommandBufferId, CommandBufferState, CommandGroup};
pub use cmd::{Command, PipelineKey};
