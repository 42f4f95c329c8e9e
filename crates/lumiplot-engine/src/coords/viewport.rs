use super::{Rect, Vec2};

/// Which part of a panel a visual draws into.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum ViewportMode {
    /// The whole panel rectangle.
    #[default]
    Full,
    /// The panel rectangle minus its margins (room for axes and labels).
    Inner,
}

/// Per-side insets in pixels, CSS order: top, right, bottom, left.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    #[inline]
    pub const fn new(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self { top, right, bottom, left }
    }

    #[inline]
    pub const fn uniform(v: f32) -> Self {
        Self::new(v, v, v, v)
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.top, self.right, self.bottom, self.left]
    }
}

/// A pixel rectangle of the canvas framebuffer that a draw is scoped to.
///
/// `rect` is already adjusted for `mode`: an `Inner` viewport has its margins
/// applied. `margins` is kept so shaders and axes know how much room surrounds
/// the data area.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Viewport {
    pub rect: Rect,
    pub margins: Margins,
    pub framebuffer: Vec2,
    pub mode: ViewportMode,
}

impl Viewport {
    /// Viewport covering the whole framebuffer.
    #[inline]
    pub fn full(framebuffer: Vec2) -> Self {
        Self {
            rect: Rect::from_origin_size(Vec2::zero(), framebuffer),
            margins: Margins::default(),
            framebuffer,
            mode: ViewportMode::Full,
        }
    }

    /// Viewport for a panel rectangle, adjusted for `mode`.
    pub fn for_panel(panel: Rect, margins: Margins, framebuffer: Vec2, mode: ViewportMode) -> Self {
        let rect = match mode {
            ViewportMode::Full => panel,
            ViewportMode::Inner => panel.inset(margins),
        };
        Self { rect, margins, framebuffer, mode }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        !self.rect.is_empty() && self.rect.is_finite()
    }

    /// Integer scissor rectangle for this viewport, `None` if nothing is visible.
    #[inline]
    pub fn scissor(self) -> Option<(u32, u32, u32, u32)> {
        self.rect.to_scissor(self.framebuffer)
    }
}
