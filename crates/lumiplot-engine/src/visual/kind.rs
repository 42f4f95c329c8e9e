use crate::commands::PipelineKey;

/// Built-in visual kinds.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VisualKind {
    /// Point sprites with one shared size.
    Marker,
    /// Thick lines between two endpoint arrays.
    Segment,
    /// Tick and grid lines along one axis.
    Axes2D,
    /// Markers with an optional per-item size.
    Scatter,
}

impl VisualKind {
    #[inline]
    pub fn pipeline(self) -> PipelineKey {
        match self {
            VisualKind::Marker | VisualKind::Scatter => PipelineKey::Marker,
            VisualKind::Segment | VisualKind::Axes2D => PipelineKey::Segment,
        }
    }
}

/// Kind-specific creation flags.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct VisualFlags(pub u32);

impl VisualFlags {
    pub const NONE: VisualFlags = VisualFlags(0);
    /// `Axes2D` along the horizontal axis.
    pub const AXIS_X: VisualFlags = VisualFlags(0);
    /// `Axes2D` along the vertical axis.
    pub const AXIS_Y: VisualFlags = VisualFlags(1);

    #[inline]
    pub fn axis(self) -> Axis {
        if self.0 & 1 == 1 { Axis::Y } else { Axis::X }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Axis {
    X,
    Y,
}

/// Tick levels of an `Axes2D` visual, used as the `Pos` sub-index.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum AxisLevel {
    Minor = 0,
    Major = 1,
    Grid = 2,
    Lim = 3,
}

impl AxisLevel {
    pub const ALL: [AxisLevel; 4] = [AxisLevel::Minor, AxisLevel::Major, AxisLevel::Grid, AxisLevel::Lim];

    #[inline]
    pub fn index(self) -> u32 {
        self as u32
    }

    /// Tick length in normalized device units; `None` spans the whole panel.
    pub fn tick_length(self) -> Option<f32> {
        match self {
            AxisLevel::Minor => Some(0.02),
            AxisLevel::Major => Some(0.05),
            AxisLevel::Grid | AxisLevel::Lim => None,
        }
    }
}

/// Semantic data slots a visual may expose.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum PropKind {
    Pos,
    Color,
    /// Shared marker size in pixels.
    MarkerSize,
    /// Per-item marker size in pixels.
    Size,
    LineWidth,
    Model,
    View,
    Proj,
    ColorTexture,
}

impl PropKind {
    /// Properties baked into the interleaved vertex buffer.
    #[inline]
    pub(crate) fn affects_vertex(self) -> bool {
        matches!(self, PropKind::Pos | PropKind::Color | PropKind::Size | PropKind::MarkerSize)
    }

    #[inline]
    pub(crate) fn affects_mvp(self) -> bool {
        matches!(self, PropKind::Model | PropKind::View | PropKind::Proj)
    }

    #[inline]
    pub(crate) fn affects_params(self) -> bool {
        matches!(self, PropKind::MarkerSize | PropKind::LineWidth | PropKind::Color)
    }
}

/// Element type of property data.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DataType {
    Vec3F32,
    Vec2F32,
    F32,
    /// 8-bit RGBA.
    Cvec4,
    Mat4,
}

/// GPU-side binding categories.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SourceKind {
    Vertex,
    Uniform,
    Texture,
}
