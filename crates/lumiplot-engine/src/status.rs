/// Lifecycle state shared by visuals, panels, grids and canvases.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum ObjStatus {
    /// Constructed; GPU-side objects not created yet.
    #[default]
    Init,
    /// GPU-side objects exist and are current.
    Created,
    /// GPU-side objects exist but CPU state changed since the last update.
    NeedUpdate,
    Destroyed,
}

impl ObjStatus {
    /// True once GPU-side objects exist and until destruction.
    #[inline]
    pub fn is_created(self) -> bool {
        matches!(self, ObjStatus::Created | ObjStatus::NeedUpdate)
    }

    #[inline]
    pub fn is_destroyed(self) -> bool {
        self == ObjStatus::Destroyed
    }
}
