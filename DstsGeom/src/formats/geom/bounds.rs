//! Axis-aligned bounds and bounding spheres over point sets

use glam::Vec3;

/// Bounding box plus the sphere around its centre.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
    pub centre: Vec3,
    pub half_extents: Vec3,
    /// Largest distance from `centre` to any point.
    pub radius: f32,
}

impl Bounds {
    /// Compute bounds over `points`. No points gives all-zero bounds.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Vec3>,
    {
        let points: Vec<Vec3> = points.into_iter().collect();
        let Some(&first) = points.first() else {
            return Self::default();
        };

        let (min, max) = points
            .iter()
            .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        let centre = (min + max) * 0.5;
        let half_extents = (max - min) * 0.5;
        let radius = points
            .iter()
            .map(|p| p.distance(centre))
            .fold(0.0f32, f32::max);

        Self {
            min,
            max,
            centre,
            half_extents,
            radius,
        }
    }

    /// Same bounds with the sphere radius cleared.
    #[must_use]
    pub fn without_radius(mut self) -> Self {
        self.radius = 0.0;
        self
    }

    /// Compare the stored fields (centre, half extents, radius) per component.
    pub fn approx_eq(&self, other: &Bounds, tolerance: f32) -> bool {
        self.centre.abs_diff_eq(other.centre, tolerance)
            && self.half_extents.abs_diff_eq(other.half_extents, tolerance)
            && (self.radius - other.radius).abs() <= tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_zero() {
        let bounds = Bounds::from_points(std::iter::empty());
        assert_eq!(bounds, Bounds::default());
        assert_eq!(bounds.radius, 0.0);
    }

    #[test]
    fn test_single_point() {
        let p = Vec3::new(1.0, -2.0, 3.5);
        let bounds = Bounds::from_points([p]);
        assert_eq!(bounds.centre, p);
        assert_eq!(bounds.half_extents, Vec3::ZERO);
        assert_eq!(bounds.radius, 0.0);
    }

    #[test]
    fn test_box_and_sphere() {
        let bounds = Bounds::from_points([
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(3.0, 2.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        ]);
        assert_eq!(bounds.centre, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(bounds.half_extents, Vec3::new(2.0, 1.0, 0.0));
        assert!((bounds.radius - 5.0f32.sqrt()).abs() < 1e-6);
        assert!(bounds.approx_eq(&bounds.without_radius(), 3.0));
        assert!(!bounds.approx_eq(&bounds.without_radius(), 1e-4));
    }
}
