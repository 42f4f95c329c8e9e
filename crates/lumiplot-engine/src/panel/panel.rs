use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::coords::{Margins, Rect, Vec2, Viewport, ViewportMode};
use crate::status::ObjStatus;
use crate::visual::{Visual, VisualHandle};

use super::layout::Cell;

/// Room left around the data area for axes and tick labels.
pub const DEFAULT_MARGINS: Margins = Margins::new(20.0, 20.0, 40.0, 60.0);

/// One grid cell (or span of cells) drawing a set of visuals.
///
/// Panels only hold weak references: dropping the last strong handle of a
/// visual detaches it on the next refill.
#[derive(Debug)]
pub struct Panel {
    cell: Cell,
    margins: Margins,
    status: ObjStatus,
    visuals: Vec<(Weak<RefCell<Visual>>, ViewportMode)>,
    rect: Rect,
    framebuffer: Vec2,
}

impl Panel {
    pub(crate) fn new(cell: Cell, rect: Rect, framebuffer: Vec2) -> Self {
        Self {
            cell,
            margins: DEFAULT_MARGINS,
            status: ObjStatus::Created,
            visuals: Vec::new(),
            rect,
            framebuffer,
        }
    }

    #[inline]
    pub fn cell(&self) -> Cell {
        self.cell
    }

    #[inline]
    pub fn status(&self) -> ObjStatus {
        self.status
    }

    #[inline]
    pub fn margins(&self) -> Margins {
        self.margins
    }

    /// Takes effect on the next refill.
    pub fn set_margins(&mut self, margins: Margins) {
        self.margins = margins;
        if self.status == ObjStatus::Created {
            self.status = ObjStatus::NeedUpdate;
        }
    }

    /// Panel rectangle in framebuffer pixels, as of the last layout.
    #[inline]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Viewport a visual attached with `mode` draws into.
    pub fn viewport(&self, mode: ViewportMode) -> Viewport {
        Viewport::for_panel(self.rect, self.margins, self.framebuffer, mode)
    }

    pub fn attach_visual(&mut self, visual: &VisualHandle, mode: ViewportMode) {
        self.visuals.push((Rc::downgrade(visual), mode));
    }

    /// Number of attached visuals that are still alive.
    pub fn visual_count(&self) -> usize {
        self.visuals.iter().filter(|(v, _)| v.strong_count() > 0).count()
    }

    /// Live visuals with their modes; dead references are pruned.
    pub(crate) fn live_visuals(&mut self) -> Vec<(VisualHandle, ViewportMode)> {
        self.visuals.retain(|(v, _)| v.strong_count() > 0);
        self.visuals
            .iter()
            .filter_map(|(v, mode)| v.upgrade().map(|v| (v, *mode)))
            .collect()
    }

    pub(crate) fn set_layout(&mut self, rect: Rect, framebuffer: Vec2) {
        self.rect = rect;
        self.framebuffer = framebuffer;
    }

    /// Marks a pending margin change as applied.
    pub(crate) fn mark_created(&mut self) {
        if self.status == ObjStatus::NeedUpdate {
            self.status = ObjStatus::Created;
        }
    }

    /// Detaches every visual. The visuals themselves stay with their owners.
    pub fn destroy(&mut self) {
        if self.status.is_destroyed() {
            return;
        }
        self.visuals.clear();
        self.status = ObjStatus::Destroyed;
    }
}
