//! Measures and queries on planar (or mildly warped) polygons.
//!
//! Mesh faces are vertex loops of arbitrary length, not guaranteed to be
//! exactly planar. All routines here therefore work on the triangle fan
//! around the loop's average point, which is well defined for warped loops
//! and agrees with the exact result for planar ones.
//!
//! Degenerate input rule: when the accumulated area magnitude falls under
//! [`SMALL`], [`centre`] falls back to the average of the vertices and
//! [`area_vector`] reports the (near-)zero vector — there is no division by a
//! near-zero area anywhere downstream.

use crate::geometry::point::{Point, Vector, SMALL};

/// Average of the vertices. The fallback centroid for degenerate loops.
#[must_use]
pub fn average(points: &[Point]) -> Point {
    if points.is_empty() {
        return Point::zero();
    }
    let mut sum = Vector::zero();
    for p in points {
        sum += Vector::from(*p);
    }
    Point::from(sum / points.len() as f64)
}

/// Area vector of the loop: half the fan cross-product sum, directed by the
/// right-hand rule around the loop orientation.
#[must_use]
pub fn area_vector(points: &[Point]) -> Vector {
    if points.len() < 3 {
        return Vector::zero();
    }
    let origin = average(points);
    let mut sum = Vector::zero();
    for i in 0..points.len() {
        let a = points[i] - origin;
        let b = points[(i + 1) % points.len()] - origin;
        sum += a.cross(&b);
    }
    sum * 0.5
}

/// Area-weighted centroid of the loop.
///
/// Triangles of the fan are weighted by their area magnitude; when the total
/// magnitude falls under [`SMALL`] the average of the vertices is returned
/// instead.
#[must_use]
pub fn centre(points: &[Point]) -> Point {
    let avg = average(points);
    if points.len() < 3 {
        return avg;
    }

    let mut weighted = Vector::zero();
    let mut total_area = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        let area = 0.5 * (a - avg).cross(&(b - avg)).mag();
        let tri_centre = (Vector::from(a) + Vector::from(b) + Vector::from(avg)) / 3.0;
        weighted += tri_centre * area;
        total_area += area;
    }

    if total_area < SMALL {
        avg
    } else {
        Point::from(weighted / total_area)
    }
}

/// Nearest point on the closed segment `a..b` to `p`.
#[must_use]
pub fn nearest_on_segment(a: &Point, b: &Point, p: &Point) -> Point {
    let ab = *b - *a;
    let len_sqr = ab.mag_sqr();
    if len_sqr < SMALL * SMALL {
        return *a;
    }
    let t = ((*p - *a).dot(&ab) / len_sqr).clamp(0.0, 1.0);
    *a + ab * t
}

/// Nearest pair of points between the closed segments `a0..a1` and
/// `b0..b1`, returned as `(on_first, on_second)`.
#[must_use]
pub fn nearest_between_segments(a0: &Point, a1: &Point, b0: &Point, b1: &Point) -> (Point, Point) {
    let d1 = *a1 - *a0;
    let d2 = *b1 - *b0;
    let r = *a0 - *b0;

    let len1 = d1.mag_sqr();
    let len2 = d2.mag_sqr();
    let f = d2.dot(&r);

    // Degenerate segments reduce to point-segment cases.
    if len1 < SMALL * SMALL && len2 < SMALL * SMALL {
        return (*a0, *b0);
    }
    if len1 < SMALL * SMALL {
        let t = (f / len2).clamp(0.0, 1.0);
        return (*a0, *b0 + d2 * t);
    }

    let c = d1.dot(&r);
    let (s, t) = if len2 < SMALL * SMALL {
        ((-c / len1).clamp(0.0, 1.0), 0.0)
    } else {
        let b = d1.dot(&d2);
        let denom = len1 * len2 - b * b;
        // Parallel segments leave s free; anchor at 0 and let the t pass
        // pick the compatible point.
        let mut s = if denom > SMALL {
            ((b * f - c * len2) / denom).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let mut t = (b * s + f) / len2;
        if t < 0.0 {
            t = 0.0;
            s = (-c / len1).clamp(0.0, 1.0);
        } else if t > 1.0 {
            t = 1.0;
            s = ((b - c) / len1).clamp(0.0, 1.0);
        }
        (s, t)
    };

    (*a0 + d1 * s, *b0 + d2 * t)
}

/// Nearest point on the triangle `(a, b, c)` to `p`.
#[must_use]
pub fn nearest_on_triangle(a: &Point, b: &Point, c: &Point, p: &Point) -> Point {
    let ab = *b - *a;
    let ac = *c - *a;
    let normal = ab.cross(&ac);
    let n_sqr = normal.mag_sqr();

    if n_sqr >= SMALL * SMALL {
        // Project onto the triangle plane and test the barycentric sign of
        // the projection against each edge.
        let ap = *p - *a;
        let dist = ap.dot(&normal) / n_sqr;
        let proj = *p - normal * dist;

        let inside = |e0: &Point, e1: &Point| {
            let edge = *e1 - *e0;
            let to_proj = proj - *e0;
            edge.cross(&to_proj).dot(&normal) >= 0.0
        };

        if inside(a, b) && inside(b, c) && inside(c, a) {
            return proj;
        }
    }

    // Outside (or degenerate triangle): best of the three edges.
    let candidates = [
        nearest_on_segment(a, b, p),
        nearest_on_segment(b, c, p),
        nearest_on_segment(c, a, p),
    ];
    let mut best = candidates[0];
    for cand in &candidates[1..] {
        if p.distance_sqr(cand) < p.distance_sqr(&best) {
            best = *cand;
        }
    }
    best
}

/// Nearest point on the polygon to `p`, via the fan around the average
/// point. Returns the average for loops of fewer than three vertices.
#[must_use]
pub fn nearest_point(points: &[Point], p: &Point) -> Point {
    if points.len() < 3 {
        return match points {
            [] => Point::zero(),
            [a] => *a,
            _ => nearest_on_segment(&points[0], &points[1], p),
        };
    }
    let origin = average(points);
    let mut best = origin;
    let mut best_d = f64::INFINITY;
    for i in 0..points.len() {
        let cand = nearest_on_triangle(&points[i], &points[(i + 1) % points.len()], &origin, p);
        let d = p.distance_sqr(&cand);
        if d < best_d {
            best_d = d;
            best = cand;
        }
    }
    best
}

/// Nearest pair of points between the polygon and the closed segment
/// `start..end`, returned as `(on_polygon, on_segment)`.
///
/// An intersecting segment yields the intersection point twice. Otherwise
/// the minimum over each fan triangle is taken: triangle-edge against
/// segment, and segment endpoints against the triangle (the endpoint cases
/// cover the face-parallel configurations the edge cases miss).
#[must_use]
pub fn nearest_to_segment(points: &[Point], start: &Point, end: &Point) -> (Point, Point) {
    if points.len() < 3 {
        return match points {
            [] => (Point::zero(), *start),
            [a] => (*a, nearest_on_segment(start, end, a)),
            _ => nearest_between_segments(&points[0], &points[1], start, end),
        };
    }

    if let Some((_, hit)) = intersect_segment(points, start, end) {
        return (hit, hit);
    }

    let origin = average(points);
    let mut best = (origin, *start);
    let mut best_d = f64::INFINITY;
    let mut consider = |on_poly: Point, on_seg: Point| {
        let d = on_poly.distance_sqr(&on_seg);
        if d < best_d {
            best_d = d;
            best = (on_poly, on_seg);
        }
    };

    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];

        for (e0, e1) in [(&a, &b), (&b, &origin), (&origin, &a)] {
            let (on_poly, on_seg) = nearest_between_segments(e0, e1, start, end);
            consider(on_poly, on_seg);
        }
        consider(nearest_on_triangle(&a, &b, &origin, start), *start);
        consider(nearest_on_triangle(&a, &b, &origin, end), *end);
    }
    best
}

/// Intersection of the segment `start..end` with the triangle `(a, b, c)`,
/// as the segment parameter `t`, or `None`. Watertight enough for mesh faces
/// meeting at shared edges; hits exactly on an edge are accepted.
#[must_use]
pub fn segment_triangle_cut(
    a: &Point,
    b: &Point,
    c: &Point,
    start: &Point,
    end: &Point,
) -> Option<f64> {
    let dir = *end - *start;
    let ab = *b - *a;
    let ac = *c - *a;

    let pvec = dir.cross(&ac);
    let det = ab.dot(&pvec);
    if det.abs() < SMALL {
        return None;
    }
    let inv_det = 1.0 / det;

    let tvec = *start - *a;
    let u = tvec.dot(&pvec) * inv_det;
    if !(-SMALL..=1.0 + SMALL).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(&ab);
    let v = dir.dot(&qvec) * inv_det;
    if v < -SMALL || u + v > 1.0 + SMALL {
        return None;
    }

    let t = ac.dot(&qvec) * inv_det;
    (0.0..=1.0).contains(&t).then_some(t)
}

/// First intersection of the segment with the polygon (fan decomposition),
/// as `(t, point)`, or `None` when the segment misses every fan triangle.
#[must_use]
pub fn intersect_segment(points: &[Point], start: &Point, end: &Point) -> Option<(f64, Point)> {
    if points.len() < 3 {
        return None;
    }
    let origin = average(points);
    let mut best_t: Option<f64> = None;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        if let Some(t) = segment_triangle_cut(&a, &b, &origin, start, end) {
            if best_t.map_or(true, |bt| t < bt) {
                best_t = Some(t);
            }
        }
    }
    best_t.map(|t| (t, *start + (*end - *start) * t))
}

// =============================================================================
// TESTS
// =============================================================================
