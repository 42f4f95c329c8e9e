use std::mem::size_of;

use super::layout::{
    BINDING_MVP, BINDING_PARAMS, BINDING_TEXTURE, BINDING_VIEWPORT, MarkerVertex, MvpUniform, ParamsUniform,
    SegmentVertex, VERTEX_SLOT, ViewportUniform,
};
use super::{DataType, PropKind, SourceKind, VisualKind};

/// Whether a property must be set before `update`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Requirement {
    Optional,
    /// Every part must be set.
    Required,
    /// At least one part must be set.
    AnyPart,
}

/// How many values a property holds.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PropCount {
    /// One value per item; the item count comes from `Pos`.
    PerItem,
    /// Exactly one value.
    Single,
    /// Free count; defines the items.
    Items,
}

/// One property slot of a visual kind.
#[derive(Debug, Copy, Clone)]
pub struct PropSpec {
    pub prop: PropKind,
    /// Number of sub-indices.
    pub parts: u32,
    pub dtype: DataType,
    pub requirement: Requirement,
    pub count: PropCount,
    /// Parts must all hold the same number of items.
    pub coupled: bool,
}

/// One source binding of a visual kind.
#[derive(Debug, Copy, Clone)]
pub struct SourceSpec {
    pub kind: SourceKind,
    pub binding: u32,
    /// Bytes per item a bound region must provide.
    pub item_size: u64,
}

/// Closed table of the properties and sources a visual kind accepts.
#[derive(Debug)]
pub struct VisualSpec {
    pub kind: VisualKind,
    pub props: &'static [PropSpec],
    pub sources: &'static [SourceSpec],
}

impl VisualSpec {
    pub fn for_kind(kind: VisualKind) -> &'static VisualSpec {
        match kind {
            VisualKind::Marker => &MARKER,
            VisualKind::Segment => &SEGMENT,
            VisualKind::Axes2D => &AXES_2D,
            VisualKind::Scatter => &SCATTER,
        }
    }

    pub fn prop(&self, prop: PropKind) -> Option<&PropSpec> {
        self.props.iter().find(|p| p.prop == prop)
    }

    pub fn source(&self, kind: SourceKind, binding: u32) -> Option<&SourceSpec> {
        self.sources.iter().find(|s| s.kind == kind && s.binding == binding)
    }

    /// Bytes per vertex-buffer item.
    pub fn vertex_size(&self) -> u64 {
        self.source(SourceKind::Vertex, VERTEX_SLOT)
            .map(|s| s.item_size)
            .unwrap_or(0)
    }
}

const fn prop(
    prop: PropKind,
    parts: u32,
    dtype: DataType,
    requirement: Requirement,
    count: PropCount,
    coupled: bool,
) -> PropSpec {
    PropSpec { prop, parts, dtype, requirement, count, coupled }
}

const fn source(kind: SourceKind, binding: u32, item_size: usize) -> SourceSpec {
    SourceSpec { kind, binding, item_size: item_size as u64 }
}

const MVP_PROPS: [PropSpec; 4] = [
    prop(PropKind::Model, 1, DataType::Mat4, Requirement::Optional, PropCount::Single, false),
    prop(PropKind::View, 1, DataType::Mat4, Requirement::Optional, PropCount::Single, false),
    prop(PropKind::Proj, 1, DataType::Mat4, Requirement::Optional, PropCount::Single, false),
    prop(PropKind::ColorTexture, 1, DataType::Cvec4, Requirement::Optional, PropCount::Single, false),
];

const fn common_sources(vertex_size: usize) -> [SourceSpec; 5] {
    [
        source(SourceKind::Vertex, VERTEX_SLOT, vertex_size),
        source(SourceKind::Uniform, BINDING_MVP, size_of::<MvpUniform>()),
        source(SourceKind::Uniform, BINDING_VIEWPORT, size_of::<ViewportUniform>()),
        source(SourceKind::Uniform, BINDING_PARAMS, size_of::<ParamsUniform>()),
        source(SourceKind::Texture, BINDING_TEXTURE, 0),
    ]
}

const MARKER_SOURCES: [SourceSpec; 5] = common_sources(size_of::<MarkerVertex>());
const SEGMENT_SOURCES: [SourceSpec; 5] = common_sources(size_of::<SegmentVertex>());

static MARKER: VisualSpec = VisualSpec {
    kind: VisualKind::Marker,
    props: &[
        prop(PropKind::Pos, 1, DataType::Vec3F32, Requirement::Required, PropCount::Items, false),
        prop(PropKind::Color, 1, DataType::Cvec4, Requirement::Required, PropCount::PerItem, false),
        prop(PropKind::MarkerSize, 1, DataType::F32, Requirement::Optional, PropCount::Single, false),
        MVP_PROPS[0],
        MVP_PROPS[1],
        MVP_PROPS[2],
        MVP_PROPS[3],
    ],
    sources: &MARKER_SOURCES,
};

static SCATTER: VisualSpec = VisualSpec {
    kind: VisualKind::Scatter,
    props: &[
        prop(PropKind::Pos, 1, DataType::Vec3F32, Requirement::Required, PropCount::Items, false),
        prop(PropKind::Color, 1, DataType::Cvec4, Requirement::Required, PropCount::PerItem, false),
        prop(PropKind::Size, 1, DataType::F32, Requirement::Optional, PropCount::PerItem, false),
        prop(PropKind::MarkerSize, 1, DataType::F32, Requirement::Optional, PropCount::Single, false),
        MVP_PROPS[0],
        MVP_PROPS[1],
        MVP_PROPS[2],
        MVP_PROPS[3],
    ],
    sources: &MARKER_SOURCES,
};

static SEGMENT: VisualSpec = VisualSpec {
    kind: VisualKind::Segment,
    props: &[
        prop(PropKind::Pos, 2, DataType::Vec3F32, Requirement::Required, PropCount::Items, true),
        prop(PropKind::Color, 1, DataType::Cvec4, Requirement::Required, PropCount::PerItem, false),
        prop(PropKind::LineWidth, 1, DataType::F32, Requirement::Optional, PropCount::Single, false),
        MVP_PROPS[0],
        MVP_PROPS[1],
        MVP_PROPS[2],
        MVP_PROPS[3],
    ],
    sources: &SEGMENT_SOURCES,
};

static AXES_2D: VisualSpec = VisualSpec {
    kind: VisualKind::Axes2D,
    props: &[
        // One part per `AxisLevel`; each holds tick positions along the axis.
        prop(PropKind::Pos, 4, DataType::F32, Requirement::AnyPart, PropCount::Items, false),
        prop(PropKind::Color, 1, DataType::Cvec4, Requirement::Optional, PropCount::Single, false),
        prop(PropKind::LineWidth, 1, DataType::F32, Requirement::Optional, PropCount::Single, false),
        MVP_PROPS[0],
        MVP_PROPS[1],
        MVP_PROPS[2],
        MVP_PROPS[3],
    ],
    sources: &SEGMENT_SOURCES,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_declares_position_and_all_bindings() {
        for kind in [VisualKind::Marker, VisualKind::Segment, VisualKind::Axes2D, VisualKind::Scatter] {
            let spec = VisualSpec::for_kind(kind);
            assert_eq!(spec.kind, kind);
            assert!(spec.prop(PropKind::Pos).is_some());
            for binding in [BINDING_MVP, BINDING_VIEWPORT, BINDING_PARAMS] {
                assert!(spec.source(SourceKind::Uniform, binding).is_some());
            }
            assert!(spec.source(SourceKind::Texture, BINDING_TEXTURE).is_some());
        }
    }

    #[test]
    fn per_kind_tables_differ() {
        assert!(VisualSpec::for_kind(VisualKind::Marker).prop(PropKind::Size).is_none());
        assert!(VisualSpec::for_kind(VisualKind::Scatter).prop(PropKind::Size).is_some());
        assert!(VisualSpec::for_kind(VisualKind::Marker).prop(PropKind::LineWidth).is_none());

        let seg = VisualSpec::for_kind(VisualKind::Segment).prop(PropKind::Pos).unwrap();
        assert_eq!(seg.parts, 2);
        assert!(seg.coupled);

        assert_eq!(VisualSpec::for_kind(VisualKind::Marker).vertex_size(), 20);
        assert_eq!(VisualSpec::for_kind(VisualKind::Axes2D).vertex_size(), 28);
    }
}
