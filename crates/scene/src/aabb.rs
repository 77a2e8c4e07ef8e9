//! Axis-aligned bounding boxes.

use glam::{Mat4, Vec3};

/// An axis-aligned bounding box in some coordinate space.
///
/// The box may be degenerate (zero extent on any axis); operations on it are
/// defined to stay finite rather than producing NaN or infinite results.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// The twelve edges of a box as pairs of indices into [`Aabb::corners`].
    pub const EDGES: [(usize, usize); 12] = [
        (0, 1),
        (0, 2),
        (0, 3),
        (1, 4),
        (1, 6),
        (2, 4),
        (2, 5),
        (3, 5),
        (3, 6),
        (4, 7),
        (5, 7),
        (6, 7),
    ];

    /// Creates a box from its two corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// A zero-size box at the origin.
    pub fn zero() -> Self {
        Self {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }

    /// The smallest box containing every given point.
    ///
    /// An empty point set yields the zero box rather than an inverted
    /// infinite one.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut iter = points.into_iter();
        let Some(first) = iter.next() else {
            return Self::zero();
        };
        let mut min = first;
        let mut max = first;
        for p in iter {
            min = min.min(p);
            max = max.max(p);
        }
        Self { min, max }
    }

    /// The eight corners of the box.
    ///
    /// Corner order matches the index pairs in [`Aabb::EDGES`].
    pub fn corners(&self) -> [Vec3; 8] {
        let (m, p) = (self.min, self.max);
        [
            Vec3::new(m.x, m.y, m.z),
            Vec3::new(p.x, m.y, m.z),
            Vec3::new(m.x, p.y, m.z),
            Vec3::new(m.x, m.y, p.z),
            Vec3::new(p.x, p.y, m.z),
            Vec3::new(m.x, p.y, p.z),
            Vec3::new(p.x, m.y, p.z),
            Vec3::new(p.x, p.y, p.z),
        ]
    }

    /// The axis-aligned box enclosing this box under an affine transform.
    ///
    /// Transforms all eight corners and takes their component-wise extremes,
    /// so rotation produces a conservative (enclosing) box. A degenerate
    /// input stays a finite, possibly zero-size, output.
    pub fn transform(&self, matrix: Mat4) -> Self {
        Self::from_points(self.corners().map(|c| matrix.transform_point3(c)))
    }

    /// Box extent per axis.
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_translation_moves_bounds_exactly() {
        let aabb = Aabb::new(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(1.0, 2.0, 3.0));
        let t = Vec3::new(5.0, -4.0, 0.5);
        let moved = aabb.transform(Mat4::from_translation(t));

        assert_relative_eq!(moved.min.x, aabb.min.x + t.x);
        assert_relative_eq!(moved.min.y, aabb.min.y + t.y);
        assert_relative_eq!(moved.min.z, aabb.min.z + t.z);
        assert_relative_eq!(moved.max.x, aabb.max.x + t.x);
        assert_relative_eq!(moved.max.y, aabb.max.y + t.y);
        assert_relative_eq!(moved.max.z, aabb.max.z + t.z);
    }

    #[test]
    fn test_rotation_encloses() {
        let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let rotated = aabb.transform(Mat4::from_rotation_y(std::f32::consts::FRAC_PI_4));
        // A rotated unit cube needs a wider enclosing box on x/z.
        assert!(rotated.max.x > aabb.max.x);
        assert!(rotated.max.z > aabb.max.z);
        assert_relative_eq!(rotated.max.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_extent_stays_finite() {
        let aabb = Aabb::zero();
        let out = aabb.transform(Mat4::from_rotation_x(1.3) * Mat4::from_translation(Vec3::X));
        assert_eq!(out.extent(), Vec3::ZERO);
        assert!(out.min.is_finite());
        assert!(out.max.is_finite());
    }

    #[test]
    fn test_from_points_empty() {
        let aabb = Aabb::from_points(std::iter::empty());
        assert_eq!(aabb, Aabb::zero());
    }

    #[test]
    fn test_edges_reference_all_corners() {
        let mut seen = [0usize; 8];
        for (a, b) in Aabb::EDGES {
            seen[a] += 1;
            seen[b] += 1;
        }
        // Every corner of a box has exactly three incident edges.
        assert!(seen.iter().all(|&count| count == 3));
    }
}
