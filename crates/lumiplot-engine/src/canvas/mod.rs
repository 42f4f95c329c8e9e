//! Canvas: frame lifecycle, command buffer ownership and event routing.
//!
//! The canvas owns the `Context` and every command buffer. Compositors and
//! visuals never hold buffers themselves; they register refill handlers and
//! record into the buffers handed to them.

mod event;

use std::mem;
use std::rc::Rc;

pub use event::{
    CanvasCtx, EventCallback, FrameEvent, PrivateCallback, PrivateEvent, PrivateEventKind, RefillEvent, ResizeEvent,
};

use crate::commands::{CommandBuffer, CommandBufferId, CommandGroup};
use crate::context::Context;
use crate::coords::{ColorRgba, Vec2, Viewport};
use crate::input::{EventKind, InputEvent, Mouse};
use crate::status::ObjStatus;
use crate::time::{FrameClock, FrameTime};
use crate::visual::VisualHandle;

#[derive(Debug, Clone)]
pub struct CanvasConfig {
    /// Initial framebuffer size in pixels.
    pub width: u32,
    pub height: u32,
    pub clear_color: ColorRgba,
    /// Number of presentation images the image index cycles through.
    pub image_count: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            clear_color: ColorRgba::black(),
            image_count: 2,
        }
    }
}

pub struct Canvas {
    size: Vec2,
    clear_color: ColorRgba,
    context: Context,
    commands: Vec<CommandBuffer>,
    next_commands: u32,

    private_callbacks: Vec<(PrivateEventKind, PrivateCallback)>,
    event_callbacks: Vec<(EventKind, EventCallback)>,

    clock: FrameClock,
    frame_index: u64,
    image_index: u32,
    image_count: u32,
    refill_pending: bool,

    mouse: Mouse,
    status: ObjStatus,
}

impl Canvas {
    pub fn new(context: Context, config: CanvasConfig) -> Self {
        log::debug!("canvas {}x{}", config.width, config.height);
        Self {
            size: Vec2::new(config.width as f32, config.height as f32),
            clear_color: config.clear_color,
            context,
            commands: Vec::new(),
            next_commands: 0,
            private_callbacks: Vec::new(),
            event_callbacks: Vec::new(),
            clock: FrameClock::new(),
            frame_index: 0,
            image_index: 0,
            image_count: config.image_count.max(1),
            // The first frame records everything.
            refill_pending: true,
            mouse: Mouse::new(),
            status: ObjStatus::Created,
        }
    }

    /// Canvas backed by a `HeadlessBackend` context.
    pub fn headless(config: CanvasConfig) -> Self {
        Self::new(Context::headless(), config)
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.size
    }

    #[inline]
    pub fn clear_color(&self) -> ColorRgba {
        self.clear_color
    }

    pub fn set_clear_color(&mut self, color: ColorRgba) {
        self.clear_color = color;
        self.refill_pending = true;
    }

    #[inline]
    pub fn context(&self) -> &Context {
        &self.context
    }

    #[inline]
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    #[inline]
    pub fn status(&self) -> ObjStatus {
        self.status
    }

    #[inline]
    pub fn mouse(&self) -> &Mouse {
        &self.mouse
    }

    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    #[inline]
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    #[inline]
    pub fn refill_pending(&self) -> bool {
        self.refill_pending
    }

    // ── command buffers ───────────────────────────────────────────────────

    /// Creates an empty command buffer tagged with `group`.
    pub fn allocate_commands(&mut self, group: CommandGroup) -> CommandBufferId {
        let id = CommandBufferId(self.next_commands);
        self.next_commands += 1;
        self.commands.push(CommandBuffer::new(id, group));
        id
    }

    #[inline]
    pub fn command_buffers(&self) -> &[CommandBuffer] {
        &self.commands
    }

    pub fn command_buffer(&self, id: CommandBufferId) -> Option<&CommandBuffer> {
        self.commands.iter().find(|c| c.id() == id)
    }

    pub fn command_buffer_mut(&mut self, id: CommandBufferId) -> Option<&mut CommandBuffer> {
        self.commands.iter_mut().find(|c| c.id() == id)
    }

    /// Context and command buffers at once, for replaying a frame.
    pub fn render_parts(&self) -> (&Context, &[CommandBuffer]) {
        (&self.context, &self.commands)
    }

    // ── callbacks ─────────────────────────────────────────────────────────

    pub fn on_private<F>(&mut self, kind: PrivateEventKind, callback: F)
    where
        F: FnMut(&mut CanvasCtx<'_>, &mut PrivateEvent<'_>) + 'static,
    {
        self.private_callbacks.push((kind, Box::new(callback)));
    }

    pub fn on_event<F>(&mut self, kind: EventKind, callback: F)
    where
        F: FnMut(&mut CanvasCtx<'_>, &InputEvent, &Mouse) + 'static,
    {
        self.event_callbacks.push((kind, Box::new(callback)));
    }

    /// Draws `visual` over the whole canvas.
    ///
    /// Allocates a `CANVAS` command buffer and registers a refill handler that
    /// re-records it. The canvas only keeps a weak reference to the visual.
    pub fn attach_visual(&mut self, visual: &VisualHandle) -> CommandBufferId {
        let id = self.allocate_commands(CommandGroup::CANVAS);
        let weak = Rc::downgrade(visual);

        self.on_private(PrivateEventKind::Refill, move |ctx, ev| {
            let PrivateEvent::Refill(rf) = ev else { return };
            let Some(cmds) = rf.cmds.iter_mut().find(|c| c.id() == id) else { return };

            cmds.reset();
            let Some(visual) = weak.upgrade() else { return };
            let viewport = Viewport::full(ctx.size);
            let mut visual = visual.borrow_mut();
            if let Err(e) = visual.update_viewport(ctx.context, viewport) {
                log::error!("viewport upload failed: {e}");
            }

            cmds.begin();
            visual.record_draw(cmds, viewport, rf.clear_color);
            cmds.end();
        });
        self.request_refill();
        id
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    /// Changes the framebuffer size, runs resize handlers and schedules a
    /// refill. No-op when the size is unchanged.
    pub fn resize(&mut self, size: Vec2) {
        if size == self.size {
            return;
        }
        let old_size = self.size;
        self.size = size;
        log::debug!("canvas resized to {}x{}", size.x, size.y);

        let mut ev = PrivateEvent::Resize(ResizeEvent { size, old_size });
        self.emit_private(&mut ev);
        self.refill_pending = true;
    }

    #[inline]
    pub fn request_refill(&mut self) {
        self.refill_pending = true;
    }

    /// Runs every refill handler now, over all command buffers.
    pub fn refill(&mut self) {
        self.refill_pending = false;
        let mut ctx = CanvasCtx {
            context: &mut self.context,
            size: self.size,
            clear_color: self.clear_color,
            frame_index: self.frame_index,
            refill: false,
        };
        let mut ev = PrivateEvent::Refill(RefillEvent {
            cmds: &mut self.commands,
            image_index: self.image_index,
            clear_color: self.clear_color,
        });
        emit(&mut self.private_callbacks, &mut ctx, &mut ev);
        // A refill handler asking for another refill would loop forever.
        if ctx.refill {
            log::warn!("refill requested from inside a refill handler; ignored");
        }
    }

    /// Advances one frame: pending refill first, then frame handlers.
    pub fn frame(&mut self) -> FrameTime {
        let time = self.clock.tick();
        if self.refill_pending {
            self.refill();
        }

        let mut ev = PrivateEvent::Frame(FrameEvent { time });
        self.emit_private(&mut ev);

        self.mouse.end_frame();
        self.frame_index += 1;
        self.image_index = (self.image_index + 1) % self.image_count;
        time
    }

    /// Runs `frames` frames without presenting.
    pub fn run(&mut self, frames: u64) {
        for _ in 0..frames {
            self.frame();
        }
    }

    /// Updates the mouse state and routes `event` to matching handlers.
    pub fn dispatch_event(&mut self, event: &InputEvent) {
        self.mouse.handle(event);
        let kind = event.kind();

        let mut callbacks = mem::take(&mut self.event_callbacks);
        let mut ctx = CanvasCtx {
            context: &mut self.context,
            size: self.size,
            clear_color: self.clear_color,
            frame_index: self.frame_index,
            refill: false,
        };
        for (k, cb) in callbacks.iter_mut() {
            if *k == kind {
                cb(&mut ctx, event, &self.mouse);
            }
        }
        let refill = ctx.refill;
        self.event_callbacks = callbacks;
        self.refill_pending |= refill;
    }

    /// Drops callbacks and command buffers and frees GPU memory.
    pub fn destroy(&mut self) {
        if self.status.is_destroyed() {
            return;
        }
        self.private_callbacks.clear();
        self.event_callbacks.clear();
        self.commands.clear();
        self.context.destroy();
        self.status = ObjStatus::Destroyed;
    }

    fn emit_private(&mut self, ev: &mut PrivateEvent<'_>) {
        let mut ctx = CanvasCtx {
            context: &mut self.context,
            size: self.size,
            clear_color: self.clear_color,
            frame_index: self.frame_index,
            refill: false,
        };
        emit(&mut self.private_callbacks, &mut ctx, ev);
        let refill = ctx.refill;
        self.refill_pending |= refill;
    }
}

fn emit(
    callbacks: &mut [(PrivateEventKind, PrivateCallback)],
    ctx: &mut CanvasCtx<'_>,
    ev: &mut PrivateEvent<'_>,
) {
    let kind = ev.kind();
    for (k, cb) in callbacks.iter_mut() {
        if *k == kind {
            cb(ctx, ev);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::input::{Modifiers, MouseState};
    use crate::visual::{DataCoords, PropKind, Visual, VisualFlags, VisualKind};

    fn canvas() -> Canvas {
        Canvas::headless(CanvasConfig::default())
    }

    // ── resize / refill ───────────────────────────────────────────────────

    #[test]
    fn resize_runs_handlers_and_schedules_refill() {
        let mut c = canvas();
        c.frame();
        assert!(!c.refill_pending());

        let seen = Rc::new(Cell::new(None));
        let s = seen.clone();
        c.on_private(PrivateEventKind::Resize, move |_, ev| {
            if let PrivateEvent::Resize(r) = ev {
                s.set(Some((r.old_size, r.size)));
            }
        });

        c.resize(Vec2::new(1600.0, 1200.0));
        assert_eq!(seen.get(), Some((Vec2::new(800.0, 600.0), Vec2::new(1600.0, 1200.0))));
        assert!(c.refill_pending());

        // Same size again: nothing happens.
        seen.set(None);
        c.resize(Vec2::new(1600.0, 1200.0));
        assert_eq!(seen.get(), None);
    }

    #[test]
    fn refill_handlers_see_every_buffer() {
        let mut c = canvas();
        c.allocate_commands(CommandGroup::CANVAS);
        c.allocate_commands(CommandGroup::PANELS);
        c.allocate_commands(CommandGroup(42));

        let groups = Rc::new(RefCell::new(Vec::new()));
        let g = groups.clone();
        c.on_private(PrivateEventKind::Refill, move |ctx, ev| {
            if let PrivateEvent::Refill(rf) = ev {
                assert_eq!(rf.clear_color, ctx.clear_color);
                g.borrow_mut().extend(rf.cmds.iter().map(|b| b.group()));
            }
        });

        c.frame();
        assert_eq!(
            *groups.borrow(),
            vec![CommandGroup::CANVAS, CommandGroup::PANELS, CommandGroup(42)]
        );

        // No refill without a reason.
        c.frame();
        assert_eq!(groups.borrow().len(), 3);
    }

    #[test]
    fn frame_handlers_run_every_frame() {
        let mut c = canvas();
        let frames = Rc::new(Cell::new(0u64));
        let f = frames.clone();
        c.on_private(PrivateEventKind::Frame, move |_, ev| {
            if let PrivateEvent::Frame(fe) = ev {
                f.set(fe.time.frame_index + 1);
            }
        });

        c.run(5);
        assert_eq!(frames.get(), 5);
        assert_eq!(c.frame_index(), 5);
        assert_eq!(c.image_index(), 1);
    }

    // ── public events ─────────────────────────────────────────────────────

    #[test]
    fn events_are_routed_by_kind() {
        let mut c = canvas();
        let moves = Rc::new(Cell::new(0));
        let keys = Rc::new(Cell::new(0));
        let (m, k) = (moves.clone(), keys.clone());
        c.on_event(EventKind::MouseMove, move |_, _, _| m.set(m.get() + 1));
        c.on_event(EventKind::Key, move |_, _, _| k.set(k.get() + 1));

        c.dispatch_event(&InputEvent::MouseMove {
            pos: Vec2::new(5.0, 5.0),
            modifiers: Modifiers::default(),
        });
        assert_eq!((moves.get(), keys.get()), (1, 0));
        assert_eq!(c.mouse().pos, Vec2::new(5.0, 5.0));
    }

    #[test]
    fn event_handler_can_request_refill() {
        let mut c = canvas();
        c.frame();
        c.on_event(EventKind::MouseWheel, |ctx, _, mouse| {
            assert_eq!(mouse.state, MouseState::Wheeling);
            ctx.request_refill();
        });

        c.dispatch_event(&InputEvent::MouseWheel {
            delta: crate::input::MouseWheelDelta::Line { x: 0.0, y: 1.0 },
            pos: Vec2::zero(),
            modifiers: Modifiers::default(),
        });
        assert!(c.refill_pending());
    }

    // ── visuals ───────────────────────────────────────────────────────────

    #[test]
    fn attached_visual_records_into_its_canvas_buffer() {
        let mut c = canvas();
        let visual = Visual::new(VisualKind::Marker, VisualFlags::NONE).shared();
        {
            let mut v = visual.borrow_mut();
            v.set_data(PropKind::Pos, 0, vec![[0.0f32; 3]; 3]).unwrap();
            v.set_data(PropKind::Color, 0, vec![[255u8; 4]; 3]).unwrap();
            let viewport = Viewport::full(c.size());
            v.update(viewport, DataCoords::ndc(), c.context_mut()).unwrap();
        }

        let id = c.attach_visual(&visual);
        c.frame();

        let cmds = c.command_buffer(id).unwrap();
        assert_eq!(cmds.group(), CommandGroup::CANVAS);
        assert_eq!(cmds.draw_count(), 1);

        // Dropped visual: the buffer is emptied on the next refill.
        drop(visual);
        c.request_refill();
        c.frame();
        assert!(c.command_buffer(id).unwrap().is_empty());
    }

    #[test]
    fn destroy_clears_everything() {
        let mut c = canvas();
        c.allocate_commands(CommandGroup::PANELS);
        c.destroy();
        assert!(c.status().is_destroyed());
        assert!(c.command_buffers().is_empty());
    }
}
