use anyhow::{Context as _, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::canvas::{Canvas, CanvasConfig};
use crate::context::ContextConfig;
use crate::coords::{ColorRgba, Vec2};
use crate::core::{App, AppControl};
use crate::device::{Gpu, GpuInit};
use crate::input::platform::winit::WinitTranslator;
use crate::render::{RenderCtx, RenderTarget, Renderer};

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub clear_color: ColorRgba,
    pub context: ContextConfig,
    /// Close after this many frames. `None` runs until the window closes.
    pub max_frames: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "lumiplot".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            clear_color: ColorRgba::black(),
            context: ContextConfig::default(),
            max_frames: None,
        }
    }
}

/// Entry point: opens one window and drives a canvas in it.
pub struct Runtime;

impl Runtime {
    pub fn run<A>(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: 'static + App,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

struct AppState<A>
where
    A: App + 'static,
{
    config: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,

    entry: Option<WindowEntry>,
    canvas: Option<Canvas>,
    renderer: Renderer,
    translator: WinitTranslator,

    frames: u64,
    exit_requested: bool,
    /// First fatal error; returned from `Runtime::run`.
    error: Option<anyhow::Error>,
}

impl<A> AppState<A>
where
    A: App + 'static,
{
    fn new(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Self {
        Self {
            config,
            gpu_init,
            app,
            entry: None,
            canvas: None,
            renderer: Renderer::new(),
            translator: WinitTranslator::new(),
            frames: 0,
            exit_requested: false,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        if self.error.is_none() {
            self.error = Some(err);
        }
        self.exit(event_loop);
    }

    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.destroy();
        }
        event_loop.exit();
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop.create_window(attrs).context("failed to create window")?;
        let gpu_init = self.gpu_init.clone();

        let entry = WindowEntryTryBuilder {
            window,
            gpu_builder: |w| pollster::block_on(Gpu::new(w, gpu_init)),
        }
        .try_build()
        .context("GPU initialization failed for window")?;

        let PhysicalSize { width, height } = entry.borrow_gpu().size();
        let context = entry.borrow_gpu().create_context(self.config.context.clone());
        let mut canvas = Canvas::new(
            context,
            CanvasConfig {
                width,
                height,
                clear_color: self.config.clear_color,
                ..CanvasConfig::default()
            },
        );

        self.app.setup(&mut canvas).context("application setup failed")?;

        entry.with_window(|w| w.request_redraw());
        self.entry = Some(entry);
        self.canvas = Some(canvas);
        Ok(())
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        let Some(entry) = self.entry.as_mut() else { return };
        entry.with_gpu_mut(|gpu| gpu.resize(new_size));
        if new_size.width > 0 && new_size.height > 0 {
            if let Some(canvas) = self.canvas.as_mut() {
                canvas.resize(Vec2::new(new_size.width as f32, new_size.height as f32));
            }
        }
        entry.with_window(|w| w.request_redraw());
    }

    /// One canvas frame, then replay into the surface.
    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(entry), Some(canvas)) = (self.entry.as_mut(), self.canvas.as_mut()) else {
            return;
        };

        let time = canvas.frame();
        let control = self.app.on_frame(canvas, time);

        let renderer = &mut self.renderer;
        let fatal = entry.with_gpu_mut(|gpu| {
            let size = gpu.size();
            if size.width == 0 || size.height == 0 {
                return false;
            }
            match gpu.begin_frame() {
                Ok(mut frame) => {
                    {
                        let ctx = RenderCtx::new(gpu.device(), gpu.queue(), gpu.surface_format());
                        let mut target = RenderTarget::new(&mut frame.encoder, &frame.view);
                        renderer.render_canvas(&ctx, &mut target, canvas);
                    }
                    gpu.submit(frame);
                    false
                }
                Err(e) => gpu.handle_surface_error(e).is_fatal(),
            }
        });

        self.frames += 1;
        if fatal {
            self.fail(event_loop, anyhow::anyhow!("surface lost beyond recovery"));
            return;
        }

        let done = self.config.max_frames.is_some_and(|max| self.frames >= max);
        if control == AppControl::Exit || done {
            log::info!("exiting after {} frames", self.frames);
            self.exit(event_loop);
        }
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: App + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() {
            return;
        }
        if let Err(e) = self.create_window(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        // Continuous redraw; frame handlers may animate.
        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(entry) = self.entry.as_ref() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }
        let ours = self
            .entry
            .as_ref()
            .is_some_and(|e| e.with_window(|w| w.id()) == window_id);
        if !ours {
            return;
        }

        if let Some(ev) = self.translator.translate(&event) {
            if let Some(canvas) = self.canvas.as_mut() {
                canvas.dispatch_event(&ev);
            }
        }

        match &event {
            WindowEvent::CloseRequested => self.exit(event_loop),

            WindowEvent::Resized(new_size) => self.resize(*new_size),

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.entry.as_ref().map(|e| e.with_window(|w| w.inner_size())) {
                    self.resize(size);
                }
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }
}
