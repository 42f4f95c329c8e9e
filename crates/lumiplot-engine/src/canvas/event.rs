use crate::commands::CommandBuffer;
use crate::context::Context;
use crate::coords::{ColorRgba, Vec2};
use crate::input::{InputEvent, Mouse};
use crate::time::FrameTime;

/// Canvas-internal event kinds, as opposed to public input events.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PrivateEventKind {
    /// Command buffers must be re-recorded.
    Refill,
    Resize,
    Frame,
}

/// Command buffers to re-record. Handlers touch only the groups they own.
pub struct RefillEvent<'a> {
    pub cmds: &'a mut [CommandBuffer],
    pub image_index: u32,
    pub clear_color: ColorRgba,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ResizeEvent {
    /// New framebuffer size in pixels.
    pub size: Vec2,
    pub old_size: Vec2,
}

#[derive(Debug, Copy, Clone)]
pub struct FrameEvent {
    pub time: FrameTime,
}

pub enum PrivateEvent<'a> {
    Refill(RefillEvent<'a>),
    Resize(ResizeEvent),
    Frame(FrameEvent),
}

impl PrivateEvent<'_> {
    pub fn kind(&self) -> PrivateEventKind {
        match self {
            PrivateEvent::Refill(_) => PrivateEventKind::Refill,
            PrivateEvent::Resize(_) => PrivateEventKind::Resize,
            PrivateEvent::Frame(_) => PrivateEventKind::Frame,
        }
    }
}

/// Render context injected into every canvas callback.
///
/// Handlers reach the memory manager and canvas parameters through this
/// instead of captured globals.
pub struct CanvasCtx<'a> {
    pub context: &'a mut Context,
    pub size: Vec2,
    pub clear_color: ColorRgba,
    pub frame_index: u64,
    pub(super) refill: bool,
}

impl CanvasCtx<'_> {
    /// Schedules a refill before the next frame.
    #[inline]
    pub fn request_refill(&mut self) {
        self.refill = true;
    }
}

pub type PrivateCallback = Box<dyn FnMut(&mut CanvasCtx<'_>, &mut PrivateEvent<'_>)>;
pub type EventCallback = Box<dyn FnMut(&mut CanvasCtx<'_>, &InputEvent, &Mouse)>;
