//! Axis-aligned bounding boxes with octant subdivision.
//!
//! [`BoundBox`] is the workhorse of the octree: it supports containment and
//! overlap predicates, lower/upper distance bounds for search pruning,
//! mid-split octant subdivision, and slab-method segment clipping for the
//! leaf-to-leaf line walk.
//!
//! Octants are numbered 0–7 with bit 0 selecting the upper x half, bit 1 the
//! upper y half, and bit 2 the upper z half.

use crate::geometry::point::{Point, Vector};
use serde::{Deserialize, Serialize};

/// An axis-aligned box spanning `min..=max` per component.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundBox {
    min: Point,
    max: Point,
}

impl BoundBox {
    /// Create a box from its extreme corners.
    ///
    /// The corners are normalised component-wise, so argument order does not
    /// matter.
    #[must_use]
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            min: a.min_components(&b),
            max: a.max_components(&b),
        }
    }

    /// The inverted box: greater than everything, accumulates via
    /// [`BoundBox::extend`]. Contains nothing and overlaps nothing.
    #[must_use]
    pub const fn inverted() -> Self {
        Self {
            min: Point::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Tight box around a set of points, or the inverted box for an empty
    /// set.
    #[must_use]
    pub fn around<'a, I>(points: I) -> Self
    where
        I: IntoIterator<Item = &'a Point>,
    {
        let mut bb = Self::inverted();
        for p in points {
            bb.extend(p);
        }
        bb
    }

    /// Minimum corner.
    #[must_use]
    pub const fn min(&self) -> Point {
        self.min
    }

    /// Maximum corner.
    #[must_use]
    pub const fn max(&self) -> Point {
        self.max
    }

    /// `true` while no point has been accumulated.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.min.x > self.max.x
    }

    /// Grow to include a point.
    pub fn extend(&mut self, p: &Point) {
        self.min = self.min.min_components(p);
        self.max = self.max.max_components(p);
    }

    /// Grow to include another box.
    pub fn extend_box(&mut self, other: &Self) {
        self.min = self.min.min_components(&other.min);
        self.max = self.max.max_components(&other.max);
    }

    /// Grow by an absolute margin on all sides.
    #[must_use]
    pub fn inflated(&self, margin: f64) -> Self {
        let d = Vector::new(margin, margin, margin);
        Self {
            min: self.min - d,
            max: self.max + d,
        }
    }

    /// Geometric centre.
    #[must_use]
    pub fn mid(&self) -> Point {
        Point::new(
            0.5 * (self.min.x + self.max.x),
            0.5 * (self.min.y + self.max.y),
            0.5 * (self.min.z + self.max.z),
        )
    }

    /// Edge lengths.
    #[must_use]
    pub fn span(&self) -> Vector {
        self.max - self.min
    }

    /// Inclusive point containment.
    #[must_use]
    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Closed-interval overlap with another box.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Overlap with the sphere of squared radius `radius_sqr` around
    /// `centre`.
    #[must_use]
    pub fn overlaps_sphere(&self, centre: &Point, radius_sqr: f64) -> bool {
        self.dist_sqr(centre) <= radius_sqr
    }

    /// Squared distance from a point to the box: zero inside, otherwise the
    /// distance to the nearest boundary point. A lower bound on the distance
    /// to anything contained in the box.
    #[must_use]
    pub fn dist_sqr(&self, p: &Point) -> f64 {
        let mut d = 0.0;
        for axis in 0..3 {
            let v = p.component(axis);
            let lo = self.min.component(axis);
            let hi = self.max.component(axis);
            if v < lo {
                d += (lo - v) * (lo - v);
            } else if v > hi {
                d += (v - hi) * (v - hi);
            }
        }
        d
    }

    /// Squared distance from a point to the farthest corner of the box. An
    /// upper bound on the distance to anything contained in the box.
    #[must_use]
    pub fn max_dist_sqr(&self, p: &Point) -> f64 {
        let mut d = 0.0;
        for axis in 0..3 {
            let v = p.component(axis);
            let lo = self.min.component(axis);
            let hi = self.max.component(axis);
            let far = (v - lo).abs().max((v - hi).abs());
            d += far * far;
        }
        d
    }

    /// The octant sub-box selected by `octant` (0–7; bit 0 = upper x half,
    /// bit 1 = upper y, bit 2 = upper z).
    #[must_use]
    pub fn sub_box(&self, octant: usize) -> Self {
        debug_assert!(octant < 8);
        let mid = self.mid();
        let mut min = self.min;
        let mut max = mid;
        if octant & 1 != 0 {
            min.x = mid.x;
            max.x = self.max.x;
        }
        if octant & 2 != 0 {
            min.y = mid.y;
            max.y = self.max.y;
        }
        if octant & 4 != 0 {
            min.z = mid.z;
            max.z = self.max.z;
        }
        Self { min, max }
    }

    /// The octant a point falls in. Points exactly on a mid-plane go to the
    /// upper half, so the assignment is deterministic.
    #[must_use]
    pub fn octant(&self, p: &Point) -> usize {
        let mid = self.mid();
        let mut oct = 0;
        if p.x >= mid.x {
            oct |= 1;
        }
        if p.y >= mid.y {
            oct |= 2;
        }
        if p.z >= mid.z {
            oct |= 4;
        }
        oct
    }

    /// Clip the segment `start + t * (end - start)`, `t` in `[0, 1]`, against
    /// the box. Returns the parameter interval inside the box, or `None`
    /// when the segment misses it entirely.
    #[must_use]
    pub fn clip_segment(&self, start: &Point, end: &Point) -> Option<(f64, f64)> {
        let dir = *end - *start;
        let mut t0: f64 = 0.0;
        let mut t1: f64 = 1.0;

        for axis in 0..3 {
            let s = start.component(axis);
            let d = dir.component(axis);
            let lo = self.min.component(axis);
            let hi = self.max.component(axis);

            if d.abs() < f64::EPSILON {
                if s < lo || s > hi {
                    return None;
                }
            } else {
                let inv = 1.0 / d;
                let (ta, tb) = ((lo - s) * inv, (hi - s) * inv);
                let (near, far) = if ta < tb { (ta, tb) } else { (tb, ta) };
                t0 = t0.max(near);
                t1 = t1.min(far);
                if t0 > t1 {
                    return None;
                }
            }
        }
        Some((t0, t1))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::BoundBox;
    use crate::geometry::point::Point;
    use approx::assert_relative_eq;

    fn unit_box() -> BoundBox {
        BoundBox::new(Point::zero(), Point::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_octant_subdivision_partitions_box() {
        let bb = unit_box();
        for oct in 0..8 {
            let sub = bb.sub_box(oct);
            assert!(bb.contains(&sub.mid()));
            assert_eq!(bb.octant(&sub.mid()), oct);
        }
    }

    #[test]
    fn test_mid_plane_points_go_to_upper_half() {
        let bb = unit_box();
        assert_eq!(bb.octant(&Point::new(0.5, 0.5, 0.5)), 7);
        assert_eq!(bb.octant(&Point::new(0.25, 0.5, 0.25)), 2);
    }

    #[test]
    fn test_dist_sqr_bounds() {
        let bb = unit_box();
        assert_eq!(bb.dist_sqr(&Point::new(0.5, 0.5, 0.5)), 0.0);
        assert_relative_eq!(bb.dist_sqr(&Point::new(2.0, 0.5, 0.5)), 1.0);
        assert_relative_eq!(bb.dist_sqr(&Point::new(2.0, 2.0, 0.5)), 2.0);

        let far = bb.max_dist_sqr(&Point::zero());
        assert_relative_eq!(far, 3.0);
    }

    #[test]
    fn test_clip_segment_through_box() {
        let bb = unit_box();
        let (t0, t1) = bb
            .clip_segment(&Point::new(-1.0, 0.5, 0.5), &Point::new(2.0, 0.5, 0.5))
            .unwrap();
        assert_relative_eq!(t0, 1.0 / 3.0);
        assert_relative_eq!(t1, 2.0 / 3.0);

        assert!(bb
            .clip_segment(&Point::new(-1.0, 2.0, 0.5), &Point::new(2.0, 2.0, 0.5))
            .is_none());
    }

    #[test]
    fn test_inverted_box_accumulates() {
        let mut bb = BoundBox::inverted();
        assert!(bb.is_inverted());
        bb.extend(&Point::new(1.0, -1.0, 0.0));
        bb.extend(&Point::new(-1.0, 1.0, 2.0));
        assert_eq!(bb.min(), Point::new(-1.0, -1.0, 0.0));
        assert_eq!(bb.max(), Point::new(1.0, 1.0, 2.0));
    }

    #[test]
    fn test_overlaps_sphere() {
        let bb = unit_box();
        assert!(bb.overlaps_sphere(&Point::new(1.5, 0.5, 0.5), 0.26));
        assert!(!bb.overlaps_sphere(&Point::new(1.5, 0.5, 0.5), 0.2));
    }
}
