use crate::coords::{Rect, Vec2};
use crate::error::{Error, Result};

/// Grid cell occupied by a panel: anchor plus spans.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
    pub vspan: u32,
    pub hspan: u32,
}

impl Cell {
    #[inline]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col, vspan: 1, hspan: 1 }
    }

    #[inline]
    pub const fn spanned(row: u32, col: u32, vspan: u32, hspan: u32) -> Self {
        Self { row, col, vspan, hspan }
    }

    /// Whether `(row, col)` lies inside this cell's span.
    #[inline]
    pub fn covers(self, row: u32, col: u32) -> bool {
        row >= self.row && row - self.row < self.vspan && col >= self.col && col - self.col < self.hspan
    }
}

/// Row and column weights of a grid. Each row (column) gets a share of the
/// canvas height (width) proportional to its weight.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLayout {
    row_weights: Vec<f32>,
    col_weights: Vec<f32>,
}

impl GridLayout {
    /// Uniform layout. Dimensions must be non-zero.
    pub fn uniform(rows: u32, cols: u32) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidDimension(format!("grid of {rows}x{cols} cells")));
        }
        Ok(Self {
            row_weights: vec![1.0; rows as usize],
            col_weights: vec![1.0; cols as usize],
        })
    }

    #[inline]
    pub fn rows(&self) -> u32 {
        self.row_weights.len() as u32
    }

    #[inline]
    pub fn cols(&self) -> u32 {
        self.col_weights.len() as u32
    }

    #[inline]
    pub fn row_weights(&self) -> &[f32] {
        &self.row_weights
    }

    #[inline]
    pub fn col_weights(&self) -> &[f32] {
        &self.col_weights
    }

    pub fn set_row_weights(&mut self, weights: &[f32]) -> Result<()> {
        check_weights("row", weights, self.rows())?;
        self.row_weights = weights.to_vec();
        Ok(())
    }

    pub fn set_col_weights(&mut self, weights: &[f32]) -> Result<()> {
        check_weights("column", weights, self.cols())?;
        self.col_weights = weights.to_vec();
        Ok(())
    }

    /// Whether `cell` fits inside the grid.
    pub fn contains(&self, cell: Cell) -> bool {
        cell.vspan >= 1
            && cell.hspan >= 1
            && cell.row.checked_add(cell.vspan).is_some_and(|end| end <= self.rows())
            && cell.col.checked_add(cell.hspan).is_some_and(|end| end <= self.cols())
    }
}

fn check_weights(what: &str, weights: &[f32], expected: u32) -> Result<()> {
    if weights.len() != expected as usize {
        return Err(Error::InvalidDimension(format!(
            "{} {what} weights for {expected} {what}s",
            weights.len()
        )));
    }
    if weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
        return Err(Error::InvalidDimension(format!("{what} weights must be positive")));
    }
    Ok(())
}

/// Start and length of `span` entries from `start`, as fractions of the total.
fn share(weights: &[f32], start: u32, span: u32) -> (f32, f32) {
    let total: f32 = weights.iter().sum();
    let (start, end) = (start as usize, (start + span) as usize);
    let before: f32 = weights[..start].iter().sum();
    let inside: f32 = weights[start..end].iter().sum();
    (before / total, inside / total)
}

/// Pixel rectangle of `cell` on a canvas of `canvas_size` pixels.
///
/// Pure: the same inputs always give the same rectangle, and scaling the
/// canvas scales the rectangle by the same factor. `cell` must fit `layout`.
pub fn compute_viewport(canvas_size: Vec2, layout: &GridLayout, cell: Cell) -> Rect {
    debug_assert!(layout.contains(cell));
    let (x, w) = share(&layout.col_weights, cell.col, cell.hspan);
    let (y, h) = share(&layout.row_weights, cell.row, cell.vspan);
    Rect::new(x * canvas_size.x, y * canvas_size.y, w * canvas_size.x, h * canvas_size.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── compute_viewport ──────────────────────────────────────────────────

    #[test]
    fn uniform_grid_splits_evenly() {
        let layout = GridLayout::uniform(2, 4).unwrap();
        let size = Vec2::new(800.0, 600.0);

        assert_eq!(compute_viewport(size, &layout, Cell::new(0, 0)), Rect::new(0.0, 0.0, 200.0, 300.0));
        assert_eq!(compute_viewport(size, &layout, Cell::new(1, 3)), Rect::new(600.0, 300.0, 200.0, 300.0));
        assert_eq!(
            compute_viewport(size, &layout, Cell::spanned(0, 1, 2, 2)),
            Rect::new(200.0, 0.0, 400.0, 600.0)
        );
    }

    #[test]
    fn weights_change_shares() {
        let mut layout = GridLayout::uniform(1, 2).unwrap();
        layout.set_col_weights(&[3.0, 1.0]).unwrap();

        let size = Vec2::new(400.0, 100.0);
        assert_eq!(compute_viewport(size, &layout, Cell::new(0, 0)), Rect::new(0.0, 0.0, 300.0, 100.0));
        assert_eq!(compute_viewport(size, &layout, Cell::new(0, 1)), Rect::new(300.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn viewport_is_pure() {
        let layout = GridLayout::uniform(3, 3).unwrap();
        let size = Vec2::new(1024.0, 768.0);
        let a = compute_viewport(size, &layout, Cell::new(1, 2));
        let b = compute_viewport(size, &layout, Cell::new(1, 2));
        assert_eq!(a, b);
    }

    // ── validation ────────────────────────────────────────────────────────

    #[test]
    fn zero_dimension_rejected() {
        assert!(matches!(GridLayout::uniform(0, 3), Err(Error::InvalidDimension(_))));
        assert!(matches!(GridLayout::uniform(2, 0), Err(Error::InvalidDimension(_))));
    }

    #[test]
    fn bad_weights_rejected() {
        let mut layout = GridLayout::uniform(2, 2).unwrap();
        assert!(layout.set_row_weights(&[1.0]).is_err());
        assert!(layout.set_row_weights(&[1.0, 0.0]).is_err());
        assert!(layout.set_col_weights(&[1.0, f32::NAN]).is_err());
        assert_eq!(layout.row_weights(), &[1.0, 1.0]);
    }

    #[test]
    fn cell_coverage() {
        let c = Cell::spanned(1, 1, 2, 3);
        assert!(c.covers(1, 1));
        assert!(c.covers(2, 3));
        assert!(!c.covers(3, 1));
        assert!(!c.covers(1, 0));

        let layout = GridLayout::uniform(3, 4).unwrap();
        assert!(layout.contains(c));
        assert!(!layout.contains(Cell::spanned(2, 0, 2, 1)));
    }

    #[test]
    fn huge_spans_do_not_wrap() {
        let layout = GridLayout::uniform(3, 4).unwrap();
        assert!(!layout.contains(Cell::spanned(1, 0, u32::MAX, 1)));
        assert!(!layout.contains(Cell::spanned(0, 2, 1, u32::MAX)));

        let wide = Cell::spanned(5, 5, u32::MAX, u32::MAX);
        assert!(wide.covers(u32::MAX, u32::MAX));
        assert!(!wide.covers(4, 5));
    }
}
