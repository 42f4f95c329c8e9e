use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::canvas::{Canvas, CanvasCtx, PrivateEvent, PrivateEventKind, RefillEvent};
use crate::commands::{CommandBufferId, CommandGroup};
use crate::coords::Vec2;
use crate::error::{Error, Result};
use crate::status::ObjStatus;

use super::layout::{Cell, GridLayout, compute_viewport};
use super::panel::Panel;

/// Fixed rows × cols of optional panels over one canvas.
///
/// Every cell owns one `PANELS` command buffer. A spanned panel records into
/// the buffer of its anchor cell; the other cells it covers stay empty.
#[derive(Debug)]
pub struct Grid {
    layout: GridLayout,
    canvas_size: Vec2,
    panels: Vec<Panel>,
    /// Command buffer id → cell it belongs to.
    buffers: HashMap<CommandBufferId, (u32, u32)>,
    /// Row-major, one per cell.
    cell_buffers: Vec<CommandBufferId>,
    status: ObjStatus,
}

impl Grid {
    /// Creates the grid and allocates its command buffers on `canvas`.
    pub fn new(canvas: &mut Canvas, rows: u32, cols: u32) -> Result<Self> {
        let cells = rows
            .checked_mul(cols)
            .ok_or_else(|| Error::InvalidDimension(format!("grid of {rows}x{cols} cells")))?;
        let layout = GridLayout::uniform(rows, cols)?;

        let mut buffers = HashMap::with_capacity(cells as usize);
        let mut cell_buffers = Vec::with_capacity(cells as usize);
        for row in 0..rows {
            for col in 0..cols {
                let id = canvas.allocate_commands(CommandGroup::PANELS);
                buffers.insert(id, (row, col));
                cell_buffers.push(id);
            }
        }
        log::debug!("grid {rows}x{cols}");

        Ok(Self {
            layout,
            canvas_size: canvas.size(),
            panels: Vec::new(),
            buffers,
            cell_buffers,
            status: ObjStatus::Created,
        })
    }

    /// Registers the grid's refill and resize handlers on `canvas`.
    ///
    /// The handlers hold weak references; once the grid is dropped they do
    /// nothing.
    pub fn install(grid: &Rc<RefCell<Grid>>, canvas: &mut Canvas) {
        let weak = Rc::downgrade(grid);
        canvas.on_private(PrivateEventKind::Refill, move |ctx, ev| {
            let PrivateEvent::Refill(rf) = ev else { return };
            if let Some(grid) = weak.upgrade() {
                grid.borrow_mut().refill(ctx, rf);
            }
        });

        let weak = Rc::downgrade(grid);
        canvas.on_private(PrivateEventKind::Resize, move |_, ev| {
            let PrivateEvent::Resize(rs) = ev else { return };
            if let Some(grid) = weak.upgrade() {
                grid.borrow_mut().resize(rs.size);
            }
        });
        canvas.request_refill();
    }

    #[inline]
    pub fn rows(&self) -> u32 {
        self.layout.rows()
    }

    #[inline]
    pub fn cols(&self) -> u32 {
        self.layout.cols()
    }

    #[inline]
    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    #[inline]
    pub fn status(&self) -> ObjStatus {
        self.status
    }

    /// Command buffer of cell `(row, col)`.
    pub fn command_buffer(&self, row: u32, col: u32) -> Option<CommandBufferId> {
        if row >= self.rows() || col >= self.cols() {
            return None;
        }
        self.cell_buffers.get((row * self.cols() + col) as usize).copied()
    }

    // ── panels ────────────────────────────────────────────────────────────

    /// The panel covering `(row, col)`, created as a single cell if absent.
    pub fn panel(&mut self, row: u32, col: u32) -> Result<&mut Panel> {
        self.check_bounds(row, col)?;
        if let Some(i) = self.panel_index(row, col) {
            return Ok(&mut self.panels[i]);
        }
        Ok(self.insert(Cell::new(row, col)))
    }

    /// A panel anchored at `(row, col)` covering `vspan` rows and `hspan`
    /// columns. Returns the existing panel if one with the same span exists.
    pub fn panel_span(&mut self, row: u32, col: u32, vspan: u32, hspan: u32) -> Result<&mut Panel> {
        if vspan == 0 || hspan == 0 {
            return Err(Error::InvalidDimension(format!("panel span {vspan}x{hspan}")));
        }
        self.check_bounds(row, col)?;
        let last = row.checked_add(vspan - 1).zip(col.checked_add(hspan - 1));
        let Some((last_row, last_col)) = last else {
            return Err(Error::OutOfBounds {
                row: row.saturating_add(vspan - 1),
                col: col.saturating_add(hspan - 1),
                rows: self.rows(),
                cols: self.cols(),
            });
        };
        self.check_bounds(last_row, last_col)?;

        let cell = Cell::spanned(row, col, vspan, hspan);
        if let Some(i) = self.panels.iter().position(|p| p.cell() == cell) {
            return Ok(&mut self.panels[i]);
        }
        for r in row..row + vspan {
            for c in col..col + hspan {
                if self.panel_index(r, c).is_some() {
                    return Err(Error::CellOverlap { row: r, col: c });
                }
            }
        }
        Ok(self.insert(cell))
    }

    pub fn get(&self, row: u32, col: u32) -> Option<&Panel> {
        self.panel_index(row, col).map(|i| &self.panels[i])
    }

    pub fn get_mut(&mut self, row: u32, col: u32) -> Option<&mut Panel> {
        self.panel_index(row, col).map(|i| &mut self.panels[i])
    }

    pub fn panels(&self) -> impl Iterator<Item = &Panel> {
        self.panels.iter()
    }

    /// Removes and destroys the panel covering `(row, col)`. Its cells record
    /// nothing from the next refill on.
    pub fn remove_panel(&mut self, row: u32, col: u32) -> Option<Panel> {
        let i = self.panel_index(row, col)?;
        let mut panel = self.panels.swap_remove(i);
        panel.destroy();
        Some(panel)
    }

    // ── layout ────────────────────────────────────────────────────────────

    pub fn set_row_weights(&mut self, weights: &[f32]) -> Result<()> {
        self.layout.set_row_weights(weights)?;
        self.relayout();
        Ok(())
    }

    pub fn set_col_weights(&mut self, weights: &[f32]) -> Result<()> {
        self.layout.set_col_weights(weights)?;
        self.relayout();
        Ok(())
    }

    /// Recomputes every panel rectangle for a canvas of `size` pixels.
    pub fn resize(&mut self, size: Vec2) {
        self.canvas_size = size;
        self.relayout();
    }

    // ── refill ────────────────────────────────────────────────────────────

    /// Re-records the `PANELS` buffers this grid owns.
    ///
    /// Every other buffer in the event is left untouched.
    ///
    /// # Panics
    ///
    /// If a panel that is not created (e.g. destroyed but still in the grid)
    /// would be drawn.
    pub fn refill(&mut self, ctx: &mut CanvasCtx<'_>, ev: &mut RefillEvent<'_>) {
        if self.status.is_destroyed() {
            return;
        }
        if ctx.size != self.canvas_size {
            self.resize(ctx.size);
        }

        for cmds in ev.cmds.iter_mut() {
            if cmds.group() != CommandGroup::PANELS {
                continue;
            }
            let Some(&(row, col)) = self.buffers.get(&cmds.id()) else {
                continue;
            };

            cmds.reset();
            let Some(panel) = self.panels.iter_mut().find(|p| p.cell().row == row && p.cell().col == col)
            else {
                continue;
            };
            assert!(
                panel.status().is_created(),
                "panel ({row}, {col}) drawn while {:?}",
                panel.status()
            );

            let rect = compute_viewport(ctx.size, &self.layout, panel.cell());
            panel.set_layout(rect, ctx.size);
            panel.mark_created();

            cmds.begin();
            for (visual, mode) in panel.live_visuals() {
                let viewport = panel.viewport(mode);
                let mut visual = visual.borrow_mut();
                if let Err(e) = visual.update_viewport(ctx.context, viewport) {
                    log::error!("panel ({row}, {col}): viewport upload failed: {e}");
                }
                visual.record_draw(cmds, viewport, ev.clear_color);
            }
            cmds.end();
        }
    }

    /// Destroys every panel. Command buffers stay with the canvas and are
    /// no longer touched.
    pub fn destroy(&mut self) {
        for panel in &mut self.panels {
            panel.destroy();
        }
        self.panels.clear();
        self.status = ObjStatus::Destroyed;
    }

    // ── internals ─────────────────────────────────────────────────────────

    fn check_bounds(&self, row: u32, col: u32) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::OutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(())
    }

    fn panel_index(&self, row: u32, col: u32) -> Option<usize> {
        self.panels.iter().position(|p| p.cell().covers(row, col))
    }

    fn insert(&mut self, cell: Cell) -> &mut Panel {
        let rect = compute_viewport(self.canvas_size, &self.layout, cell);
        self.panels.push(Panel::new(cell, rect, self.canvas_size));
        let last = self.panels.len() - 1;
        &mut self.panels[last]
    }

    fn relayout(&mut self) {
        for panel in &mut self.panels {
            let rect = compute_viewport(self.canvas_size, &self.layout, panel.cell());
            panel.set_layout(rect, self.canvas_size);
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;
    use crate::canvas::CanvasConfig;
    use crate::commands::Command;
    use crate::coords::{ColorRgba, Rect, ViewportMode};
    use crate::panel::DEFAULT_MARGINS;
    use crate::visual::{DataCoords, PropKind, Visual, VisualFlags, VisualHandle, VisualKind};

    fn canvas(width: u32, height: u32) -> Canvas {
        Canvas::headless(CanvasConfig {
            width,
            height,
            ..CanvasConfig::default()
        })
    }

    fn installed(canvas: &mut Canvas, rows: u32, cols: u32) -> Rc<RefCell<Grid>> {
        let grid = Rc::new(RefCell::new(Grid::new(canvas, rows, cols).unwrap()));
        Grid::install(&grid, canvas);
        grid
    }

    fn markers(canvas: &mut Canvas, panel: &Panel, n: usize, size: f32) -> VisualHandle {
        let mut rng = rand::rng();
        let pos: Vec<[f32; 3]> = (0..n)
            .map(|_| [rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0), 0.0])
            .collect();
        let color: Vec<[u8; 4]> = (0..n).map(|_| [rng.random(), rng.random(), rng.random(), 255]).collect();

        let mut v = Visual::new(VisualKind::Marker, VisualFlags::NONE);
        v.set_data(PropKind::Pos, 0, pos).unwrap();
        v.set_data(PropKind::Color, 0, color).unwrap();
        v.set_data(PropKind::MarkerSize, 0, size).unwrap();
        v.update(panel.viewport(ViewportMode::Inner), DataCoords::ndc(), canvas.context_mut())
            .unwrap();
        v.shared()
    }

    // ── construction ──────────────────────────────────────────────────────

    #[test]
    fn zero_dimension_is_rejected() {
        let mut c = canvas(800, 600);
        assert!(matches!(Grid::new(&mut c, 0, 2), Err(Error::InvalidDimension(_))));
        assert!(matches!(Grid::new(&mut c, 2, 0), Err(Error::InvalidDimension(_))));
    }

    #[test]
    fn one_buffer_per_cell() {
        let mut c = canvas(800, 600);
        let grid = Grid::new(&mut c, 2, 3).unwrap();
        let panels: Vec<_> = c
            .command_buffers()
            .iter()
            .filter(|b| b.group() == CommandGroup::PANELS)
            .collect();
        assert_eq!(panels.len(), 6);
        assert_eq!(grid.command_buffer(1, 2), Some(panels[5].id()));
        assert_eq!(grid.command_buffer(2, 0), None);
    }

    #[test]
    fn panel_out_of_bounds() {
        let mut c = canvas(800, 600);
        let mut grid = Grid::new(&mut c, 2, 2).unwrap();
        assert!(matches!(
            grid.panel(2, 0),
            Err(Error::OutOfBounds { row: 2, col: 0, rows: 2, cols: 2 })
        ));
        assert!(matches!(grid.panel_span(1, 1, 1, 2), Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn huge_span_is_out_of_bounds() {
        let mut c = canvas(800, 600);
        let mut grid = Grid::new(&mut c, 2, 2).unwrap();
        assert!(matches!(grid.panel_span(1, 0, u32::MAX, 1), Err(Error::OutOfBounds { .. })));
        assert!(matches!(grid.panel_span(0, 1, 1, u32::MAX), Err(Error::OutOfBounds { .. })));
        assert!(matches!(
            grid.panel_span(1, 1, u32::MAX, u32::MAX),
            Err(Error::OutOfBounds { rows: 2, cols: 2, .. })
        ));
        assert_eq!(grid.panels().count(), 0);
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let mut c = canvas(800, 600);
        assert!(matches!(
            Grid::new(&mut c, u32::MAX, 2),
            Err(Error::InvalidDimension(_))
        ));
    }

    #[test]
    fn spans_do_not_overlap() {
        let mut c = canvas(800, 600);
        let mut grid = Grid::new(&mut c, 3, 3).unwrap();
        grid.panel_span(0, 0, 2, 2).unwrap();

        // Any cell of the span resolves to the spanned panel.
        assert_eq!(grid.panel(1, 1).unwrap().cell(), Cell::spanned(0, 0, 2, 2));
        assert!(matches!(grid.panel_span(1, 1, 2, 2), Err(Error::CellOverlap { row: 1, col: 1 })));
        assert!(grid.panel_span(0, 2, 3, 1).is_ok());
        assert!(matches!(grid.panel_span(0, 0, 2, 2), Ok(_)));
    }

    #[test]
    fn removed_panel_frees_its_cells() {
        let mut c = canvas(800, 600);
        let mut grid = Grid::new(&mut c, 2, 2).unwrap();
        grid.panel_span(0, 0, 2, 1).unwrap();

        let removed = grid.remove_panel(1, 0).unwrap();
        assert!(removed.status().is_destroyed());
        assert!(grid.get(0, 0).is_none());
        assert!(grid.panel(1, 0).is_ok());
    }

    // ── refill ────────────────────────────────────────────────────────────

    #[test]
    fn thousand_markers_fill_panel_buffer() {
        let mut c = canvas(800, 600);
        let grid = installed(&mut c, 1, 1);

        let visual = {
            let mut g = grid.borrow_mut();
            let panel = g.panel(0, 0).unwrap();
            let v = markers(&mut c, panel, 1000, 20.0);
            panel.attach_visual(&v, ViewportMode::Inner);
            v
        };
        assert_eq!(visual.borrow().item_count(), 1000);

        c.frame();

        let id = grid.borrow().command_buffer(0, 0).unwrap();
        let cmds = c.command_buffer(id).unwrap();
        assert!(!cmds.is_empty());
        assert_eq!(cmds.draw_count(), 1);
        assert!(cmds.commands().iter().any(|cmd| matches!(
            cmd,
            Command::Draw { instance_count: 1000, .. }
        )));
    }

    #[test]
    fn spanned_panel_draws_into_anchor_buffer() {
        let mut c = canvas(800, 600);
        let grid = installed(&mut c, 2, 2);

        let _visual = {
            let mut g = grid.borrow_mut();
            let panel = g.panel_span(0, 0, 2, 2).unwrap();
            let v = markers(&mut c, panel, 50, 8.0);
            panel.attach_visual(&v, ViewportMode::Inner);
            v
        };

        c.frame();

        let g = grid.borrow();
        let anchor = c.command_buffer(g.command_buffer(0, 0).unwrap()).unwrap();
        assert_eq!(anchor.draw_count(), 1);
        assert!(anchor.commands().iter().any(|cmd| matches!(
            cmd,
            Command::SetViewport(r) if *r == Rect::new(0.0, 0.0, 800.0, 600.0).inset(DEFAULT_MARGINS)
        )));
        for (row, col) in [(0, 1), (1, 0), (1, 1)] {
            let covered = c.command_buffer(g.command_buffer(row, col).unwrap()).unwrap();
            assert!(covered.is_empty(), "cell ({row}, {col}) recorded commands");
        }
    }

    #[test]
    fn refill_leaves_foreign_buffers_unchanged() {
        let mut c = canvas(800, 600);
        let canvas_buf = c.allocate_commands(CommandGroup::CANVAS);
        let user_buf = c.allocate_commands(CommandGroup(7));
        // A PANELS buffer that belongs to no grid.
        let stray_buf = c.allocate_commands(CommandGroup::PANELS);
        for id in [canvas_buf, user_buf, stray_buf] {
            let b = c.command_buffer_mut(id).unwrap();
            b.begin();
            b.begin_render_pass_if_needed(ColorRgba::white());
            b.push(Command::SetViewport(Rect::new(1.0, 2.0, 3.0, 4.0)));
            b.end();
        }
        let before: Vec<_> = [canvas_buf, user_buf, stray_buf]
            .iter()
            .map(|id| c.command_buffer(*id).unwrap().clone())
            .collect();

        let grid = installed(&mut c, 2, 2);
        grid.borrow_mut().panel(0, 0).unwrap();
        c.frame();
        c.resize(Vec2::new(400.0, 300.0));
        c.frame();

        let after: Vec<_> = [canvas_buf, user_buf, stray_buf]
            .iter()
            .map(|id| c.command_buffer(*id).unwrap().clone())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn empty_cells_are_reset() {
        let mut c = canvas(800, 600);
        let grid = installed(&mut c, 1, 2);
        let id = grid.borrow().command_buffer(0, 1).unwrap();
        c.command_buffer_mut(id).unwrap().push(Command::Draw { vertex_count: 6, instance_count: 1 });

        c.frame();
        assert!(c.command_buffer(id).unwrap().is_empty());
    }

    #[test]
    fn dead_visuals_are_detached() {
        let mut c = canvas(800, 600);
        let grid = installed(&mut c, 1, 1);
        let v = {
            let mut g = grid.borrow_mut();
            let panel = g.panel(0, 0).unwrap();
            let v = markers(&mut c, panel, 10, 5.0);
            panel.attach_visual(&v, ViewportMode::Full);
            v
        };
        c.frame();
        assert_eq!(grid.borrow().get(0, 0).unwrap().visual_count(), 1);

        drop(v);
        c.request_refill();
        c.frame();
        let id = grid.borrow().command_buffer(0, 0).unwrap();
        assert!(c.command_buffer(id).unwrap().is_empty());
        assert_eq!(grid.borrow().get(0, 0).unwrap().visual_count(), 0);
    }

    #[test]
    #[should_panic(expected = "drawn while")]
    fn drawing_destroyed_panel_panics() {
        let mut c = canvas(800, 600);
        let grid = installed(&mut c, 1, 1);
        grid.borrow_mut().panel(0, 0).unwrap().destroy();
        c.frame();
    }

    // ── resize ────────────────────────────────────────────────────────────

    #[test]
    fn resize_scales_panel_viewports() {
        let (w, h) = (900.0, 600.0);
        let mut c = canvas(w as u32, h as u32);
        let grid = installed(&mut c, 2, 3);
        grid.borrow_mut().panel(0, 0).unwrap();
        c.frame();

        let before = grid.borrow().get(0, 0).unwrap().rect();
        assert_eq!(before.origin, Vec2::zero());
        assert!((before.size.x - w / 3.0).abs() < 1e-3);
        assert!((before.size.y - h / 2.0).abs() < 1e-3);

        c.resize(Vec2::new(2.0 * w, 2.0 * h));
        c.frame();
        let after = grid.borrow().get(0, 0).unwrap().rect();
        assert_eq!(after.origin, Vec2::zero());
        assert_eq!(after.size, before.size * 2.0);
    }

    #[test]
    fn resize_and_back_restores_viewports() {
        let mut c = canvas(1024, 768);
        let grid = installed(&mut c, 2, 3);
        for (row, col) in [(0, 0), (1, 2)] {
            grid.borrow_mut().panel(row, col).unwrap();
        }
        grid.borrow_mut().set_col_weights(&[1.0, 2.0, 3.0]).unwrap();
        c.frame();
        let original: Vec<_> = grid.borrow().panels().map(|p| p.viewport(ViewportMode::Inner)).collect();

        c.resize(Vec2::new(333.0, 217.0));
        c.frame();
        c.resize(Vec2::new(1024.0, 768.0));
        c.frame();

        let restored: Vec<_> = grid.borrow().panels().map(|p| p.viewport(ViewportMode::Inner)).collect();
        assert_eq!(original, restored);
    }

    #[test]
    fn inner_viewport_applies_margins() {
        let mut c = canvas(800, 600);
        let mut grid = Grid::new(&mut c, 1, 1).unwrap();
        let panel = grid.panel(0, 0).unwrap();
        let full = panel.viewport(ViewportMode::Full);
        let inner = panel.viewport(ViewportMode::Inner);

        assert_eq!(full.rect, Rect::new(0.0, 0.0, 800.0, 600.0));
        let m = panel.margins();
        assert_eq!(inner.rect.origin, Vec2::new(m.left, m.top));
        assert_eq!(inner.rect.size, Vec2::new(800.0 - m.left - m.right, 600.0 - m.top - m.bottom));
    }
}
