use super::DataType;

pub type Mat4 = [[f32; 4]; 4];

pub const MAT4_IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Typed CPU-side property array.
#[derive(Debug, Clone, PartialEq)]
pub enum PropData {
    Vec3(Vec<[f32; 3]>),
    Vec2(Vec<[f32; 2]>),
    Float(Vec<f32>),
    Color(Vec<[u8; 4]>),
    Mat4(Vec<Mat4>),
}

impl PropData {
    pub fn data_type(&self) -> DataType {
        match self {
            PropData::Vec3(_) => DataType::Vec3F32,
            PropData::Vec2(_) => DataType::Vec2F32,
            PropData::Float(_) => DataType::F32,
            PropData::Color(_) => DataType::Cvec4,
            PropData::Mat4(_) => DataType::Mat4,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PropData::Vec3(v) => v.len(),
            PropData::Vec2(v) => v.len(),
            PropData::Float(v) => v.len(),
            PropData::Color(v) => v.len(),
            PropData::Mat4(v) => v.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Item `i` as a 3D position. 2D data gets `z = 0`.
    pub(crate) fn pos(&self, i: usize) -> Option<[f32; 3]> {
        match self {
            PropData::Vec3(v) => v.get(i).copied(),
            PropData::Vec2(v) => v.get(i).map(|p| [p[0], p[1], 0.0]),
            _ => None,
        }
    }

    pub(crate) fn float(&self, i: usize) -> Option<f32> {
        match self {
            PropData::Float(v) => v.get(i).copied(),
            _ => None,
        }
    }

    pub(crate) fn color(&self, i: usize) -> Option<[u8; 4]> {
        match self {
            PropData::Color(v) => v.get(i).copied(),
            _ => None,
        }
    }

    pub(crate) fn mat4(&self) -> Option<Mat4> {
        match self {
            PropData::Mat4(v) => v.first().copied(),
            _ => None,
        }
    }
}

impl From<Vec<[f32; 3]>> for PropData {
    fn from(v: Vec<[f32; 3]>) -> Self {
        PropData::Vec3(v)
    }
}

impl From<Vec<[f32; 2]>> for PropData {
    fn from(v: Vec<[f32; 2]>) -> Self {
        PropData::Vec2(v)
    }
}

impl From<Vec<f32>> for PropData {
    fn from(v: Vec<f32>) -> Self {
        PropData::Float(v)
    }
}

impl From<f32> for PropData {
    fn from(v: f32) -> Self {
        PropData::Float(vec![v])
    }
}

impl From<Vec<[u8; 4]>> for PropData {
    fn from(v: Vec<[u8; 4]>) -> Self {
        PropData::Color(v)
    }
}

impl From<[u8; 4]> for PropData {
    fn from(v: [u8; 4]) -> Self {
        PropData::Color(vec![v])
    }
}

impl From<Mat4> for PropData {
    fn from(m: Mat4) -> Self {
        PropData::Mat4(vec![m])
    }
}

/// Data-space bounds mapped onto normalized device coordinates.
///
/// `bounds = [xmin, ymin, xmax, ymax]`. With `None`, positions are taken as
/// already normalized.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct DataCoords {
    pub bounds: Option<[f32; 4]>,
}

impl DataCoords {
    #[inline]
    pub const fn ndc() -> Self {
        Self { bounds: None }
    }

    #[inline]
    pub const fn with_bounds(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self { bounds: Some([xmin, ymin, xmax, ymax]) }
    }

    /// Maps `p` into `[-1, 1]` along x and y. A degenerate range maps to 0.
    pub fn normalize(&self, p: [f32; 3]) -> [f32; 3] {
        let Some([x0, y0, x1, y1]) = self.bounds else {
            return p;
        };
        let norm = |v: f32, lo: f32, hi: f32| {
            let span = hi - lo;
            if span.abs() <= f32::EPSILON { 0.0 } else { 2.0 * (v - lo) / span - 1.0 }
        };
        [norm(p[0], x0, x1), norm(p[1], y0, y1), p[2]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndc_coords_pass_through() {
        assert_eq!(DataCoords::ndc().normalize([0.3, -0.7, 0.1]), [0.3, -0.7, 0.1]);
    }

    #[test]
    fn bounds_map_to_unit_square() {
        let c = DataCoords::with_bounds(0.0, 10.0, 100.0, 20.0);
        assert_eq!(c.normalize([0.0, 10.0, 0.0]), [-1.0, -1.0, 0.0]);
        assert_eq!(c.normalize([100.0, 20.0, 0.0]), [1.0, 1.0, 0.0]);
        assert_eq!(c.normalize([50.0, 15.0, 2.0]), [0.0, 0.0, 2.0]);
    }

    #[test]
    fn degenerate_bounds_collapse_to_origin() {
        let c = DataCoords::with_bounds(5.0, 5.0, 5.0, 6.0);
        assert_eq!(c.normalize([5.0, 6.0, 0.0]), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn two_d_positions_get_zero_depth() {
        let d = PropData::from(vec![[1.0f32, 2.0]]);
        assert_eq!(d.pos(0), Some([1.0, 2.0, 0.0]));
        assert_eq!(d.data_type(), DataType::Vec2F32);
    }
}
