use std::cell::{Cell, RefCell};
use std::f32::consts::TAU;
use std::rc::Rc;

use anyhow::{Result, bail};
use rand::Rng;

use lumiplot_engine::canvas::Canvas;
use lumiplot_engine::coords::{ColorRgba, Viewport, ViewportMode};
use lumiplot_engine::core::{App, AppControl};
use lumiplot_engine::device::GpuInit;
use lumiplot_engine::input::{ButtonState, EventKind, InputEvent, Key};
use lumiplot_engine::logging::{LoggingConfig, init_logging};
use lumiplot_engine::panel::{Grid, Panel};
use lumiplot_engine::time::FrameTime;
use lumiplot_engine::visual::{AxisLevel, DataCoords, PropKind, Visual, VisualFlags, VisualHandle, VisualKind};
use lumiplot_engine::window::{Runtime, RuntimeConfig};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Demo {
    /// 2x3 grid: scatter, markers, segments, then a spanned line plot.
    Panels,
    /// One canvas-wide marker cloud, slowly rotating.
    Markers,
    /// Canvas-wide starburst of segments between two rings.
    Segments,
    /// Canvas-wide x and y grid lines on a white background.
    Axes,
}

impl Demo {
    fn from_arg(arg: Option<&str>) -> Result<Self> {
        match arg {
            None | Some("panels") => Ok(Demo::Panels),
            Some("markers") => Ok(Demo::Markers),
            Some("segments") => Ok(Demo::Segments),
            Some("axes") => Ok(Demo::Axes),
            Some(other) => bail!("unknown demo {other:?} (expected panels, markers, segments or axes)"),
        }
    }
}

struct Studio {
    demo: Demo,
    grid: Option<Rc<RefCell<Grid>>>,
    /// Strong owners; panels and the canvas only hold weak references.
    visuals: Vec<VisualHandle>,
    cloud: Option<(VisualHandle, Vec<[f32; 3]>)>,
    quit: Rc<Cell<bool>>,
}

impl Studio {
    fn new(demo: Demo) -> Self {
        Self {
            demo,
            grid: None,
            visuals: Vec::new(),
            cloud: None,
            quit: Rc::new(Cell::new(false)),
        }
    }

    fn keep(&mut self, visual: Visual) -> VisualHandle {
        let handle = visual.shared();
        self.visuals.push(handle.clone());
        handle
    }

    /// Uploads `visual` for the whole canvas and attaches it there.
    fn place_full(&mut self, canvas: &mut Canvas, visual: Visual) -> Result<VisualHandle> {
        let handle = self.keep(visual);
        handle
            .borrow_mut()
            .update(Viewport::full(canvas.size()), DataCoords::ndc(), canvas.context_mut())?;
        canvas.attach_visual(&handle);
        Ok(handle)
    }

    /// Uploads `visual` for the panel's viewport and attaches it.
    fn place(
        &mut self,
        canvas: &mut Canvas,
        panel: &mut Panel,
        visual: Visual,
        coords: DataCoords,
        mode: ViewportMode,
    ) -> Result<()> {
        let handle = self.keep(visual);
        handle
            .borrow_mut()
            .update(panel.viewport(mode), coords, canvas.context_mut())?;
        panel.attach_visual(&handle, mode);
        Ok(())
    }

    fn setup_panels(&mut self, canvas: &mut Canvas) -> Result<()> {
        let mut rng = rand::rng();
        let grid = Rc::new(RefCell::new(Grid::new(canvas, 2, 3)?));
        grid.borrow_mut().set_row_weights(&[1.0, 1.5])?;

        {
            let mut g = grid.borrow_mut();

            // (0, 0): scatter with per-item sizes, framed by axes.
            let n = 2_000;
            let mut scatter = Visual::new(VisualKind::Scatter, VisualFlags::NONE);
            let pos: Vec<[f32; 3]> = (0..n)
                .map(|_| [rng.random_range(-0.9..0.9), rng.random_range(-0.9..0.9), 0.0])
                .collect();
            scatter.set_data(PropKind::Pos, 0, pos)?;
            scatter.set_data(PropKind::Color, 0, random_colors(&mut rng, n, 160))?;
            scatter.set_data(
                PropKind::Size,
                0,
                (0..n).map(|_| rng.random_range(2.0..12.0)).collect::<Vec<f32>>(),
            )?;
            let panel = g.panel(0, 0)?;
            self.place(canvas, panel, scatter, DataCoords::ndc(), ViewportMode::Inner)?;
            for axis in [VisualFlags::AXIS_X, VisualFlags::AXIS_Y] {
                self.place(canvas, panel, axes(axis)?, DataCoords::ndc(), ViewportMode::Inner)?;
            }

            // (0, 1): a regular marker lattice.
            let mut lattice = Visual::new(VisualKind::Marker, VisualFlags::NONE);
            let side: usize = 12;
            let step = 1.8 / (side - 1) as f32;
            let pos: Vec<[f32; 3]> = (0..side * side)
                .map(|i| [-0.9 + (i % side) as f32 * step, -0.9 + (i / side) as f32 * step, 0.0])
                .collect();
            lattice.set_data(PropKind::Pos, 0, pos)?;
            lattice.set_data(PropKind::Color, 0, vec![[255u8, 200, 40, 255]; side * side])?;
            lattice.set_data(PropKind::MarkerSize, 0, 10.0)?;
            self.place(canvas, g.panel(0, 1)?, lattice, DataCoords::ndc(), ViewportMode::Full)?;

            // (0, 2): random walk drawn as segments.
            let steps = 400;
            let mut walk = Vec::with_capacity(steps + 1);
            let mut p = [0.0f32, 0.0, 0.0];
            walk.push(p);
            for _ in 0..steps {
                p[0] = (p[0] + rng.random_range(-0.05..0.05)).clamp(-1.0, 1.0);
                p[1] = (p[1] + rng.random_range(-0.05..0.05)).clamp(-1.0, 1.0);
                walk.push(p);
            }
            let segments = polyline(&walk, random_colors(&mut rng, steps, 255), 2.0)?;
            self.place(canvas, g.panel(0, 2)?, segments, DataCoords::ndc(), ViewportMode::Full)?;

            // Row 1: one panel across all columns with a damped sine.
            let samples = 1_000;
            let curve: Vec<[f32; 3]> = (0..samples)
                .map(|i| {
                    let x = 10.0 * i as f32 / (samples - 1) as f32;
                    [x, (x * 2.0).sin() * (-0.2 * x).exp(), 0.0]
                })
                .collect();
            let colors = vec![[80u8, 180, 255, 255]; samples - 1];
            let coords = DataCoords::with_bounds(0.0, -1.2, 10.0, 1.2);
            let panel = g.panel_span(1, 0, 1, 3)?;
            self.place(canvas, panel, polyline(&curve, colors, 3.0)?, coords, ViewportMode::Inner)?;
            for axis in [VisualFlags::AXIS_X, VisualFlags::AXIS_Y] {
                self.place(canvas, panel, axes(axis)?, DataCoords::ndc(), ViewportMode::Inner)?;
            }
        }

        Grid::install(&grid, canvas);
        canvas.request_refill();
        self.grid = Some(grid);
        Ok(())
    }

    fn setup_markers(&mut self, canvas: &mut Canvas) -> Result<()> {
        let mut rng = rand::rng();
        let n = 10_000;

        let pos: Vec<[f32; 3]> = (0..n)
            .map(|_| {
                let r = rng.random::<f32>().sqrt() * 0.95;
                let a = rng.random_range(0.0..TAU);
                [r * a.cos(), r * a.sin(), 0.0]
            })
            .collect();

        let mut cloud = Visual::new(VisualKind::Marker, VisualFlags::NONE);
        cloud.set_data(PropKind::Pos, 0, pos.clone())?;
        cloud.set_data(PropKind::Color, 0, random_colors(&mut rng, n, 128))?;
        cloud.set_data(PropKind::MarkerSize, 0, 4.0)?;

        let handle = self.place_full(canvas, cloud)?;
        self.cloud = Some((handle, pos));
        Ok(())
    }

    fn setup_segments(&mut self, canvas: &mut Canvas) -> Result<()> {
        let mut rng = rand::rng();
        let n = 100;
        let ring = |r: f32| -> Vec<[f32; 3]> {
            (0..n)
                .map(|i| {
                    let t = TAU * i as f32 / n as f32;
                    [r * t.cos(), r * t.sin(), 0.0]
                })
                .collect()
        };

        let mut burst = Visual::new(VisualKind::Segment, VisualFlags::NONE);
        burst.set_data(PropKind::Pos, 0, ring(0.25))?;
        burst.set_data(PropKind::Pos, 1, ring(0.75))?;
        burst.set_data(PropKind::Color, 0, random_colors(&mut rng, n, 255))?;
        burst.set_data(PropKind::LineWidth, 0, 4.0)?;
        self.place_full(canvas, burst)?;
        Ok(())
    }

    fn setup_axes(&mut self, canvas: &mut Canvas) -> Result<()> {
        canvas.set_clear_color(ColorRgba::white());
        let n = 10;
        let ticks: Vec<f32> = (0..n).map(|i| -1.0 + 2.0 * i as f32 / (n - 1) as f32).collect();

        for flags in [VisualFlags::AXIS_X, VisualFlags::AXIS_Y] {
            let mut v = Visual::new(VisualKind::Axes2D, flags);
            v.set_data(PropKind::Pos, AxisLevel::Grid.index(), ticks.clone())?;
            v.set_data(PropKind::Color, 0, [255u8, 0, 0, 255])?;
            self.place_full(canvas, v)?;
        }
        Ok(())
    }

    /// Rotates the cloud in place; the item count is unchanged so the
    /// recorded draw stays valid.
    fn animate_cloud(&mut self, canvas: &mut Canvas, time: FrameTime) {
        let Some((handle, base)) = self.cloud.as_ref() else { return };
        let (s, c) = (time.elapsed * 0.2).sin_cos();
        let rotated: Vec<[f32; 3]> = base.iter().map(|p| [p[0] * c - p[1] * s, p[0] * s + p[1] * c, p[2]]).collect();

        let mut visual = handle.borrow_mut();
        let result = visual
            .set_data(PropKind::Pos, 0, rotated)
            .and_then(|()| visual.update(Viewport::full(canvas.size()), DataCoords::ndc(), canvas.context_mut()));
        if let Err(e) = result {
            log::warn!("cloud update failed: {e}");
        }
    }
}

impl App for Studio {
    fn setup(&mut self, canvas: &mut Canvas) -> Result<()> {
        let quit = Rc::clone(&self.quit);
        canvas.on_event(EventKind::Key, move |_, ev, _| {
            if let InputEvent::Key { key: Key::Escape | Key::Q, state: ButtonState::Pressed, .. } = ev {
                quit.set(true);
            }
        });

        match self.demo {
            Demo::Panels => self.setup_panels(canvas),
            Demo::Markers => self.setup_markers(canvas),
            Demo::Segments => self.setup_segments(canvas),
            Demo::Axes => self.setup_axes(canvas),
        }
    }

    fn on_frame(&mut self, canvas: &mut Canvas, time: FrameTime) -> AppControl {
        if self.quit.get() {
            return AppControl::Exit;
        }
        if self.demo == Demo::Markers {
            self.animate_cloud(canvas, time);
        }
        AppControl::Continue
    }
}

fn random_colors(rng: &mut impl Rng, n: usize, alpha: u8) -> Vec<[u8; 4]> {
    (0..n).map(|_| [rng.random(), rng.random(), rng.random(), alpha]).collect()
}

/// Consecutive points joined by segments; `colors` holds one entry per segment.
fn polyline(points: &[[f32; 3]], colors: Vec<[u8; 4]>, width: f32) -> Result<Visual> {
    let mut v = Visual::new(VisualKind::Segment, VisualFlags::NONE);
    let n = points.len().saturating_sub(1);
    v.set_data(PropKind::Pos, 0, points[..n].to_vec())?;
    v.set_data(PropKind::Pos, 1, points[1..].to_vec())?;
    v.set_data(PropKind::Color, 0, colors)?;
    v.set_data(PropKind::LineWidth, 0, width)?;
    Ok(v)
}

fn axes(flags: VisualFlags) -> Result<Visual> {
    let mut v = Visual::new(VisualKind::Axes2D, flags);
    let ticks = |n: usize| -> Vec<f32> { (0..=n).map(|i| -1.0 + 2.0 * i as f32 / n as f32).collect() };
    v.set_data(PropKind::Pos, AxisLevel::Minor.index(), ticks(20))?;
    v.set_data(PropKind::Pos, AxisLevel::Major.index(), ticks(4))?;
    v.set_data(PropKind::Pos, AxisLevel::Grid.index(), ticks(4))?;
    v.set_data(PropKind::Pos, AxisLevel::Lim.index(), vec![-1.0f32])?;
    v.set_data(PropKind::Color, 0, [200u8, 200, 200, 255])?;
    Ok(v)
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let demo = Demo::from_arg(std::env::args().nth(1).as_deref())?;
    log::info!("starting {demo:?} demo");

    let config = RuntimeConfig {
        title: format!("lumiplot studio ({demo:?})"),
        clear_color: ColorRgba::new(0.08, 0.08, 0.1, 1.0),
        ..RuntimeConfig::default()
    };

    Runtime::run(config, GpuInit::default(), Studio::new(demo))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_demo_has_a_name() {
        assert_eq!(Demo::from_arg(None).unwrap(), Demo::Panels);
        assert_eq!(Demo::from_arg(Some("panels")).unwrap(), Demo::Panels);
        assert_eq!(Demo::from_arg(Some("markers")).unwrap(), Demo::Markers);
        assert_eq!(Demo::from_arg(Some("segments")).unwrap(), Demo::Segments);
        assert_eq!(Demo::from_arg(Some("axes")).unwrap(), Demo::Axes);
        assert!(Demo::from_arg(Some("surface")).is_err());
    }

    #[test]
    fn starburst_and_axes_set_up_headless() {
        let mut canvas = Canvas::headless(Default::default());
        Studio::new(Demo::Segments).setup(&mut canvas).unwrap();
        canvas.frame();
        assert_eq!(canvas.command_buffers().iter().map(|b| b.draw_count()).sum::<usize>(), 1);

        let mut canvas = Canvas::headless(Default::default());
        let mut studio = Studio::new(Demo::Axes);
        studio.setup(&mut canvas).unwrap();
        canvas.frame();
        assert_eq!(canvas.clear_color(), ColorRgba::white());
        assert_eq!(studio.visuals.len(), 2);
    }
}
