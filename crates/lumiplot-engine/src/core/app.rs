use crate::canvas::Canvas;
use crate::time::FrameTime;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract driven by `Runtime`.
pub trait App {
    /// Called once, after the window, GPU and canvas exist. Build grids and
    /// visuals and register canvas handlers here.
    fn setup(&mut self, canvas: &mut Canvas) -> anyhow::Result<()>;

    /// Called once per frame, after the canvas ran its refill and frame
    /// handlers and before the frame is rendered.
    fn on_frame(&mut self, canvas: &mut Canvas, time: FrameTime) -> AppControl {
        let _ = (canvas, time);
        AppControl::Continue
    }
}
