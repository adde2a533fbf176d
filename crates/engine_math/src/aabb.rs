use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box stored as center and half-extents.
///
/// Invariant: every half-extent is non-negative. The constructors enforce
/// this by taking absolute values.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Aabb {
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl Aabb {
    /// Create an AABB from a center point and half-extents.
    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents: half_extents.abs(),
        }
    }

    /// Create an AABB from two corners, in any order.
    pub fn from_corners(a: Vec3, b: Vec3) -> Self {
        let min = a.min(b);
        let max = a.max(b);
        Self {
            center: (min + max) * 0.5,
            half_extents: (max - min) * 0.5,
        }
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.half_extents
    }

    /// Returns true if the point lies inside or on the boundary.
    pub fn contains_point(&self, p: Vec3) -> bool {
        let d = (p - self.center).abs();
        d.cmple(self.half_extents).all()
    }

    /// Returns true if this AABB overlaps with other
    /// (including touching faces).
    pub fn intersects(&self, other: &Aabb) -> bool {
        let d = (other.center - self.center).abs();
        d.cmple(self.half_extents + other.half_extents).all()
    }

    /// The smallest AABB enclosing this box after applying `matrix`.
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        let center = matrix.transform_point3(self.center);
        let x = matrix.x_axis.truncate().abs() * self.half_extents.x;
        let y = matrix.y_axis.truncate().abs() * self.half_extents.y;
        let z = matrix.z_axis.truncate().abs() * self.half_extents.z;
        Aabb {
            center,
            half_extents: x + y + z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corners_are_sorted() {
        let aabb = Aabb::from_corners(Vec3::new(2.0, -1.0, 4.0), Vec3::new(-2.0, 1.0, 0.0));
        assert_eq!(aabb.min(), Vec3::new(-2.0, -1.0, 0.0));
        assert_eq!(aabb.max(), Vec3::new(2.0, 1.0, 4.0));
    }

    #[test]
    fn test_contains_point_includes_boundary() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(aabb.contains_point(Vec3::ZERO));
        assert!(aabb.contains_point(Vec3::new(1.0, 1.0, 1.0)));
        assert!(!aabb.contains_point(Vec3::new(1.01, 0.0, 0.0)));
    }

    #[test]
    fn test_intersects_touching_and_disjoint() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let touching = Aabb::new(Vec3::new(2.0, 0.0, 0.0), Vec3::ONE);
        let apart = Aabb::new(Vec3::new(3.5, 0.0, 0.0), Vec3::ONE);
        assert!(a.intersects(&touching));
        assert!(touching.intersects(&a));
        assert!(!a.intersects(&apart));
    }

    #[test]
    fn test_transformed_by_translation_and_rotation() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::new(2.0, 1.0, 1.0));
        let moved = aabb.transformed(&Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        assert_eq!(moved.center, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(moved.half_extents, aabb.half_extents);

        let turned = aabb.transformed(&Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2));
        assert!(turned.half_extents.abs_diff_eq(Vec3::new(1.0, 2.0, 1.0), 1e-5));
    }
}
