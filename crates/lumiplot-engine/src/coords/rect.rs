use super::{Margins, Vec2};

/// Axis-aligned rectangle in pixels (top-left origin).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    #[inline]
    pub const fn from_origin_size(origin: Vec2, size: Vec2) -> Self {
        Self { origin, size }
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        self.origin + self.size
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.size.x <= 0.0 || self.size.y <= 0.0
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.origin.is_finite() && self.size.is_finite()
    }

    /// Shrinks the rectangle by `m` on each side. Sizes never go negative.
    #[inline]
    pub fn inset(self, m: Margins) -> Rect {
        let w = (self.size.x - m.left - m.right).max(0.0);
        let h = (self.size.y - m.top - m.bottom).max(0.0);
        Rect::new(self.origin.x + m.left, self.origin.y + m.top, w, h)
    }

    /// Half-open containment: [min, max).
    #[inline]
    pub fn contains(self, p: Vec2) -> bool {
        let max = self.max();
        p.x >= self.origin.x && p.y >= self.origin.y && p.x < max.x && p.y < max.y
    }

    #[inline]
    pub fn intersect(self, other: Rect) -> Option<Rect> {
        let x0 = self.origin.x.max(other.origin.x);
        let y0 = self.origin.y.max(other.origin.y);
        let x1 = self.max().x.min(other.max().x);
        let y1 = self.max().y.min(other.max().y);

        let w = x1 - x0;
        let h = y1 - y0;

        if w <= 0.0 || h <= 0.0 {
            None
        } else {
            Some(Rect::new(x0, y0, w, h))
        }
    }

    /// Integer scissor rectangle `(x, y, w, h)` clamped to `bounds` pixels.
    ///
    /// Returns `None` when the clamped area is empty; the draw must be skipped.
    pub fn to_scissor(self, bounds: Vec2) -> Option<(u32, u32, u32, u32)> {
        let bw = bounds.x.max(0.0) as u32;
        let bh = bounds.y.max(0.0) as u32;

        let x = (self.origin.x.max(0.0) as u32).min(bw);
        let y = (self.origin.y.max(0.0) as u32).min(bh);
        let x2 = (self.max().x.max(0.0).round() as u32).min(bw);
        let y2 = (self.max().y.max(0.0).round() as u32).min(bh);

        let (w, h) = (x2.saturating_sub(x), y2.saturating_sub(y));
        if w == 0 || h == 0 { None } else { Some((x, y, w, h)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: f32, y: f32, w: f32, h: f32) -> Rect { Rect::new(x, y, w, h) }

    // ── contains ──────────────────────────────────────────────────────────

    #[test]
    fn contains_top_left_inclusive() {
        assert!(r(0.0, 0.0, 10.0, 10.0).contains(Vec2::new(0.0, 0.0)));
    }

    #[test]
    fn contains_bottom_right_exclusive() {
        assert!(!r(0.0, 0.0, 10.0, 10.0).contains(Vec2::new(10.0, 10.0)));
    }

    // ── intersect ─────────────────────────────────────────────────────────

    #[test]
    fn intersect_overlapping() {
        let a = r(0.0, 0.0, 10.0, 10.0);
        let b = r(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.intersect(b), Some(r(5.0, 5.0, 5.0, 5.0)));
    }

    #[test]
    fn intersect_touching_edge_returns_none() {
        let a = r(0.0, 0.0, 10.0, 10.0);
        let b = r(10.0, 0.0, 10.0, 10.0);
        assert!(a.intersect(b).is_none());
    }

    // ── inset ─────────────────────────────────────────────────────────────

    #[test]
    fn inset_shrinks_each_side() {
        let m = Margins::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(r(0.0, 0.0, 200.0, 100.0).inset(m), r(40.0, 10.0, 140.0, 60.0));
    }

    #[test]
    fn inset_larger_than_rect_is_empty() {
        let out = r(0.0, 0.0, 10.0, 10.0).inset(Margins::uniform(20.0));
        assert!(out.is_empty());
        assert_eq!(out.size, Vec2::zero());
    }

    // ── to_scissor ────────────────────────────────────────────────────────

    #[test]
    fn scissor_clamps_to_bounds() {
        let s = r(-5.0, 10.0, 100.0, 100.0).to_scissor(Vec2::new(50.0, 60.0));
        assert_eq!(s, Some((0, 10, 50, 50)));
    }

    #[test]
    fn scissor_outside_bounds_is_none() {
        assert!(r(100.0, 100.0, 10.0, 10.0).to_scissor(Vec2::new(50.0, 50.0)).is_none());
    }
}
