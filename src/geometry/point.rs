//! Points, vectors, and the integer label convention.
//!
//! All mesh entities are referenced by dense integer indices ([`Label`]) into
//! parallel arrays, with [`NONE`] (`-1`) as the null index. Coordinates are
//! concrete `f64` triples: [`Point`] for positions, [`Vector`] for
//! displacements, areas, and normals. The two are distinct types; a
//! difference of points is a vector and a point translated by a vector is a
//! point.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Dense integer index of a mesh entity (point, face, cell, patch, or zone).
pub type Label = i32;

/// The null label: "no entity on that side".
pub const NONE: Label = -1;

/// Magnitude threshold below which geometric quantities are treated as
/// degenerate (zero-area faces, zero-length edges).
pub const SMALL: f64 = 1.0e-15;

/// A position in 3D space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// x coordinate.
    pub x: f64,
    /// y coordinate.
    pub y: f64,
    /// z coordinate.
    pub z: f64,
}

/// A displacement, normal, or area vector in 3D space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    /// x component.
    pub x: f64,
    /// y component.
    pub y: f64,
    /// z component.
    pub z: f64,
}

/// Construct a [`Point`] from three coordinates.
///
/// ```rust
/// use polytopo::point;
///
/// let p = point![1.0, 2.0, 3.0];
/// assert_eq!(p.y, 2.0);
/// ```
#[macro_export]
macro_rules! point {
    ($x:expr, $y:expr, $z:expr $(,)?) => {
        $crate::geometry::point::Point::new($x, $y, $z)
    };
}

impl Point {
    /// Create a point from its coordinates.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The origin.
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Coordinate along axis `0`, `1`, or `2`.
    ///
    /// # Panics
    ///
    /// Panics if `axis > 2`.
    #[must_use]
    pub fn component(&self, axis: usize) -> f64 {
        match axis {
            0 => self.x,
            1 => self.y,
            2 => self.z,
            _ => panic!("axis {axis} out of range 0..3"),
        }
    }

    /// Squared distance to another point.
    #[must_use]
    pub fn distance_sqr(&self, other: &Self) -> f64 {
        (*self - *other).mag_sqr()
    }

    /// Distance to another point.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        self.distance_sqr(other).sqrt()
    }

    /// Component-wise minimum.
    #[must_use]
    pub fn min_components(&self, other: &Self) -> Self {
        Self::new(
            self.x.min(other.x),
            self.y.min(other.y),
            self.z.min(other.z),
        )
    }

    /// Component-wise maximum.
    #[must_use]
    pub fn max_components(&self, other: &Self) -> Self {
        Self::new(
            self.x.max(other.x),
            self.y.max(other.y),
            self.z.max(other.z),
        )
    }

    /// `true` if all three coordinates are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Vector {
    /// Create a vector from its components.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Component along axis `0`, `1`, or `2`.
    ///
    /// # Panics
    ///
    /// Panics if `axis > 2`.
    #[must_use]
    pub fn component(&self, axis: usize) -> f64 {
        match axis {
            0 => self.x,
            1 => self.y,
            2 => self.z,
            _ => panic!("axis {axis} out of range 0..3"),
        }
    }

    /// Dot product.
    #[must_use]
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product.
    #[must_use]
    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Squared magnitude.
    #[must_use]
    pub fn mag_sqr(&self) -> f64 {
        self.dot(self)
    }

    /// Magnitude.
    #[must_use]
    pub fn mag(&self) -> f64 {
        self.mag_sqr().sqrt()
    }

    /// Unit vector in the same direction, or the zero vector when the
    /// magnitude falls under [`SMALL`].
    #[must_use]
    pub fn normalised(&self) -> Self {
        let m = self.mag();
        if m < SMALL {
            Self::zero()
        } else {
            *self / m
        }
    }

    /// `true` if the magnitude falls under [`SMALL`].
    #[must_use]
    pub fn is_small(&self) -> bool {
        self.mag_sqr() < SMALL * SMALL
    }
}

// =============================================================================
// OPERATORS
// =============================================================================

impl Sub for Point {
    type Output = Vector;

    fn sub(self, rhs: Self) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Add<Vector> for Point {
    type Output = Self;

    fn add(self, rhs: Vector) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub<Vector> for Point {
    type Output = Self;

    fn sub(self, rhs: Vector) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl AddAssign<Vector> for Point {
    fn add_assign(&mut self, rhs: Vector) {
        *self = *self + rhs;
    }
}

impl Add for Vector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl AddAssign for Vector {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Vector {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Neg for Vector {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f64> for Vector {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f64> for Vector {
    type Output = Self;

    fn div(self, rhs: f64) -> Self {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl From<Point> for Vector {
    fn from(p: Point) -> Self {
        Self::new(p.x, p.y, p.z)
    }
}

impl From<Vector> for Point {
    fn from(v: Vector) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::{Point, Vector};
    use approx::assert_relative_eq;

    #[test]
    fn test_point_vector_arithmetic() {
        let a = point![1.0, 2.0, 3.0];
        let b = point![4.0, 6.0, 8.0];

        let d = b - a;
        assert_eq!(d, Vector::new(3.0, 4.0, 5.0));
        assert_eq!(a + d, b);
        assert_relative_eq!(a.distance_sqr(&b), 50.0);
    }

    #[test]
    fn test_cross_product_orientation() {
        let x = Vector::new(1.0, 0.0, 0.0);
        let y = Vector::new(0.0, 1.0, 0.0);
        assert_eq!(x.cross(&y), Vector::new(0.0, 0.0, 1.0));
        assert_eq!(y.cross(&x), Vector::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_normalised_degenerate_is_zero() {
        let tiny = Vector::new(1.0e-300, 0.0, 0.0);
        assert_eq!(tiny.normalised(), Vector::zero());

        let unit = Vector::new(3.0, 4.0, 0.0).normalised();
        assert_relative_eq!(unit.mag(), 1.0);
    }

    #[test]
    fn test_component_access() {
        let p = point![1.0, 2.0, 3.0];
        assert_eq!(p.component(0), 1.0);
        assert_eq!(p.component(2), 3.0);
    }
}
