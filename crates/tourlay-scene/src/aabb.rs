use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in scene space (meters).
///
/// Invariant: min.x <= max.x, min.y <= max.y, min.z <= max.z.
/// The constructor enforces this by swapping components if needed; boxes that
/// arrive through deserialization are checked by [`Aabb::is_well_formed`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// Create an AABB from two corners. Automatically sorts
    /// components so that min <= max on every axis.
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Bounds assumed for a site whose geometry carries none: 100 m square,
    /// 20 m tall, centered on the origin.
    pub fn default_site() -> Self {
        Self {
            min: DVec3::new(-50.0, -10.0, -50.0),
            max: DVec3::new(50.0, 10.0, 50.0),
        }
    }

    /// Returns true if the point lies inside or on the boundary.
    pub fn contains_point(&self, p: DVec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Returns the center point of the AABB.
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Distance from the center to a corner.
    pub fn half_diagonal(&self) -> f64 {
        (self.max - self.center()).length()
    }

    /// Clamp a point onto the box.
    pub fn clamp_point(&self, p: DVec3) -> DVec3 {
        p.clamp(self.min, self.max)
    }

    /// Sum over the three axes of how far `p` lies outside the box.
    ///
    /// Zero for points inside or on the boundary.
    pub fn violation(&self, p: DVec3) -> f64 {
        let below = (self.min - p).max(DVec3::ZERO);
        let above = (p - self.max).max(DVec3::ZERO);
        (below + above).element_sum()
    }

    /// Returns true if every component is finite and min <= max on every axis.
    pub fn is_well_formed(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min.cmple(self.max).all()
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::default_site()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(size: f64) -> Aabb {
        Aabb::new(DVec3::ZERO, DVec3::splat(size))
    }

    #[test]
    fn test_contains_point_inside() {
        assert!(unit_box(10.0).contains_point(DVec3::splat(5.0)));
    }

    #[test]
    fn test_contains_point_outside() {
        assert!(!unit_box(10.0).contains_point(DVec3::new(11.0, 5.0, 5.0)));
    }

    #[test]
    fn test_contains_point_on_edge() {
        let aabb = unit_box(10.0);
        assert!(aabb.contains_point(DVec3::ZERO)); // min corner
        assert!(aabb.contains_point(DVec3::splat(10.0))); // max corner
        assert!(aabb.contains_point(DVec3::new(10.0, 5.0, 5.0))); // face
    }

    #[test]
    fn test_constructor_auto_sorts() {
        let aabb = Aabb::new(DVec3::splat(10.0), DVec3::ZERO);
        assert_eq!(aabb.min, DVec3::ZERO);
        assert_eq!(aabb.max, DVec3::splat(10.0));
    }

    #[test]
    fn test_center_and_half_diagonal() {
        let aabb = Aabb::new(DVec3::new(-3.0, -4.0, 0.0), DVec3::new(3.0, 4.0, 0.0));
        assert_eq!(aabb.center(), DVec3::ZERO);
        assert!((aabb.half_diagonal() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_violation_zero_inside() {
        assert_eq!(unit_box(10.0).violation(DVec3::splat(2.0)), 0.0);
    }

    /// Violation sums the per-axis overshoot on both sides.
    #[test]
    fn test_violation_sums_axes() {
        let v = unit_box(10.0).violation(DVec3::new(-1.0, 12.0, 5.0));
        assert!((v - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_clamp_point() {
        let p = unit_box(10.0).clamp_point(DVec3::new(-5.0, 20.0, 3.0));
        assert_eq!(p, DVec3::new(0.0, 10.0, 3.0));
    }

    /// Boxes built by hand (or deserialized) can violate the ordering invariant.
    #[test]
    fn test_well_formed_detects_inverted_box() {
        let inverted = Aabb {
            min: DVec3::splat(1.0),
            max: DVec3::ZERO,
        };
        assert!(!inverted.is_well_formed());
        let nan = Aabb {
            min: DVec3::new(f64::NAN, 0.0, 0.0),
            max: DVec3::ONE,
        };
        assert!(!nan.is_well_formed());
        assert!(unit_box(1.0).is_well_formed());
    }
}
