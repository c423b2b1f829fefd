//! Infinite planes.

use crate::geometry::point::{Point, Vector, SMALL};
use serde::{Deserialize, Serialize};

/// Which side of a plane a point lies on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// On the normal side.
    Front,
    /// Opposite the normal.
    Back,
    /// Within tolerance of the plane.
    On,
}

/// A plane given by a reference point and a unit normal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    point: Point,
    normal: Vector,
}

impl Plane {
    /// Plane through `point` with direction `normal`.
    ///
    /// Returns `None` when the normal magnitude falls under the degeneracy
    /// threshold.
    #[must_use]
    pub fn new(point: Point, normal: Vector) -> Option<Self> {
        let n = normal.normalised();
        if n == Vector::zero() {
            None
        } else {
            Some(Self { point, normal: n })
        }
    }

    /// Reference point.
    #[must_use]
    pub const fn point(&self) -> Point {
        self.point
    }

    /// Unit normal.
    #[must_use]
    pub const fn normal(&self) -> Vector {
        self.normal
    }

    /// Signed distance of a point; positive on the normal side.
    #[must_use]
    pub fn signed_distance(&self, p: &Point) -> f64 {
        (*p - self.point).dot(&self.normal)
    }

    /// Side classification with tolerance `tol`.
    #[must_use]
    pub fn side(&self, p: &Point, tol: f64) -> Side {
        let d = self.signed_distance(p);
        if d > tol {
            Side::Front
        } else if d < -tol {
            Side::Back
        } else {
            Side::On
        }
    }

    /// Parameter `t` in `[0, 1]` where the segment `start..end` crosses the
    /// plane, or `None` for a parallel or non-crossing segment.
    #[must_use]
    pub fn cut_segment(&self, start: &Point, end: &Point) -> Option<f64> {
        let d0 = self.signed_distance(start);
        let d1 = self.signed_distance(end);
        let denom = d0 - d1;
        if denom.abs() < SMALL {
            return None;
        }
        let t = d0 / denom;
        (0.0..=1.0).contains(&t).then_some(t)
    }
}

#[cfg(test)]
mod tests {
    use super::{Plane, Side};
    use crate::geometry::point::{Point, Vector};
    use approx::assert_relative_eq;

    #[test]
    fn test_signed_distance_and_side() {
        let plane = Plane::new(Point::zero(), Vector::new(0.0, 0.0, 2.0)).unwrap();
        assert_relative_eq!(plane.signed_distance(&Point::new(5.0, 1.0, 3.0)), 3.0);
        assert_eq!(plane.side(&Point::new(0.0, 0.0, -1.0), 1e-12), Side::Back);
        assert_eq!(plane.side(&Point::new(1.0, 2.0, 0.0), 1e-12), Side::On);
    }

    #[test]
    fn test_cut_segment() {
        let plane = Plane::new(Point::new(0.0, 0.0, 1.0), Vector::new(0.0, 0.0, 1.0)).unwrap();
        let t = plane
            .cut_segment(&Point::zero(), &Point::new(0.0, 0.0, 4.0))
            .unwrap();
        assert_relative_eq!(t, 0.25);

        // Parallel segment never crosses.
        assert!(plane
            .cut_segment(&Point::zero(), &Point::new(1.0, 0.0, 0.0))
            .is_none());
    }

    #[test]
    fn test_degenerate_normal_rejected() {
        assert!(Plane::new(Point::zero(), Vector::zero()).is_none());
    }
}
