//! Shape collections searchable by an octree.
//!
//! [`ShapeSet`] is the capability interface between a tree and whatever
//! geometry it indexes: a shape count plus per-shape bounds, nearest-point,
//! overlap, and intersection queries. Concrete collections are selected at
//! compile time through the tree's type parameter; there is no runtime
//! registry.
//!
//! A shape set is a *view*: it borrows the backing geometry (a point slice,
//! a mesh) and must outlive any tree built over it. Shapes are addressed by
//! their dense position in the collection, which is what the trees store and
//! return.
//!
//! Three collections cover the mesh-editing use cases: [`PointShapes`] for
//! point clouds, [`FaceShapes`] for (subsets of) mesh faces, and
//! [`CellShapes`] for cell-location queries.

use crate::geometry::bound_box::BoundBox;
use crate::geometry::point::{Label, Point, SMALL};
use crate::geometry::polygon;
use crate::mesh::poly_mesh::PolyMesh;
use crate::spatial::octree::VolumeType;

/// Capabilities a collection must expose to be indexed by an octree.
///
/// Only `len`, [`ShapeSet::bounds`], and [`ShapeSet::nearest_point`] are
/// mandatory; the rest default to conservative or "unsupported" answers, so
/// a collection only pays for the queries it can actually serve. Trees pass
/// unsupported capabilities through as query misses.
pub trait ShapeSet {
    /// Number of shapes in the collection.
    fn len(&self) -> usize;

    /// `true` for a collection with no shapes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tight bounding box of one shape.
    fn bounds(&self, shape: usize) -> BoundBox;

    /// Nearest point on the shape to `p`.
    fn nearest_point(&self, shape: usize, p: &Point) -> Point;

    /// Nearest pair between the shape and the segment `start..end`, as
    /// `(on_shape, on_segment)`, or `None` when the collection does not
    /// support line queries.
    fn nearest_to_line(&self, _shape: usize, _start: &Point, _end: &Point) -> Option<(Point, Point)> {
        None
    }

    /// First intersection of the segment `start..end` with the shape, as
    /// `(t, point)` along the segment, or `None` for a miss (or when the
    /// collection does not support intersection).
    fn intersects_line(&self, _shape: usize, _start: &Point, _end: &Point) -> Option<(f64, Point)> {
        None
    }

    /// Exact overlap of the shape with a box. The default tests bounding
    /// boxes only, which is conservative (never a false negative).
    fn overlaps_box(&self, shape: usize, bb: &BoundBox) -> bool {
        self.bounds(shape).overlaps(bb)
    }

    /// Exact overlap of the shape with the sphere of squared radius
    /// `radius_sqr` around `centre`.
    fn overlaps_sphere(&self, shape: usize, centre: &Point, radius_sqr: f64) -> bool {
        centre.distance_sqr(&self.nearest_point(shape, centre)) <= radius_sqr
    }

    /// Which side of the (closed) shape surface `query` lies on, given the
    /// nearest surface point `hit` on this shape. Collections that do not
    /// describe a closed surface answer [`VolumeType::Unknown`].
    fn volume_side(&self, _shape: usize, _hit: &Point, _query: &Point) -> VolumeType {
        VolumeType::Unknown
    }
}

// =============================================================================
// POINT SHAPES
// =============================================================================

/// A point cloud: shape `i` is `points[i]`.
///
/// Points have no extent, so line intersection stays unsupported; bounds are
/// degenerate single-point boxes.
#[derive(Clone, Copy, Debug)]
pub struct PointShapes<'p> {
    points: &'p [Point],
}

impl<'p> PointShapes<'p> {
    /// A shape set over a point slice.
    #[must_use]
    pub const fn new(points: &'p [Point]) -> Self {
        Self { points }
    }

    /// The backing points.
    #[must_use]
    pub const fn points(&self) -> &'p [Point] {
        self.points
    }
}

impl ShapeSet for PointShapes<'_> {
    fn len(&self) -> usize {
        self.points.len()
    }

    fn bounds(&self, shape: usize) -> BoundBox {
        BoundBox::new(self.points[shape], self.points[shape])
    }

    fn nearest_point(&self, shape: usize, _p: &Point) -> Point {
        self.points[shape]
    }

    fn nearest_to_line(&self, shape: usize, start: &Point, end: &Point) -> Option<(Point, Point)> {
        let p = self.points[shape];
        Some((p, polygon::nearest_on_segment(start, end, &p)))
    }

    fn overlaps_box(&self, shape: usize, bb: &BoundBox) -> bool {
        bb.contains(&self.points[shape])
    }
}

// =============================================================================
// FACE SHAPES
// =============================================================================

/// A subset of a mesh's faces: shape `i` is face `face_labels[i]`.
///
/// Supports the full capability set. When the subset is the boundary of a
/// closed mesh (see [`FaceShapes::boundary`]), the outward face orientation
/// makes [`ShapeSet::volume_side`] meaningful and the tree's volume-type
/// queries work.
#[derive(Clone, Debug)]
pub struct FaceShapes<'m> {
    mesh: &'m PolyMesh,
    face_labels: Vec<Label>,
}

impl<'m> FaceShapes<'m> {
    /// A shape set over an explicit face subset.
    #[must_use]
    pub const fn new(mesh: &'m PolyMesh, face_labels: Vec<Label>) -> Self {
        Self { mesh, face_labels }
    }

    /// All boundary faces of the mesh, which for a closed mesh form a
    /// closed, outward-oriented surface.
    #[must_use]
    pub fn boundary(mesh: &'m PolyMesh) -> Self {
        let face_labels = (mesh.n_internal_faces() as Label..mesh.n_faces() as Label).collect();
        Self { mesh, face_labels }
    }

    /// Mesh face label behind shape index `shape`.
    #[must_use]
    pub fn face_label(&self, shape: usize) -> Label {
        self.face_labels[shape]
    }

    fn face_points(&self, shape: usize) -> Vec<Point> {
        self.mesh.faces()[self.face_labels[shape] as usize].points(self.mesh.points())
    }
}

impl ShapeSet for FaceShapes<'_> {
    fn len(&self) -> usize {
        self.face_labels.len()
    }

    fn bounds(&self, shape: usize) -> BoundBox {
        BoundBox::around(&self.face_points(shape))
    }

    fn nearest_point(&self, shape: usize, p: &Point) -> Point {
        polygon::nearest_point(&self.face_points(shape), p)
    }

    fn nearest_to_line(&self, shape: usize, start: &Point, end: &Point) -> Option<(Point, Point)> {
        Some(polygon::nearest_to_segment(
            &self.face_points(shape),
            start,
            end,
        ))
    }

    fn intersects_line(&self, shape: usize, start: &Point, end: &Point) -> Option<(f64, Point)> {
        polygon::intersect_segment(&self.face_points(shape), start, end)
    }

    fn volume_side(&self, shape: usize, hit: &Point, query: &Point) -> VolumeType {
        let area = self.mesh.face_area(self.face_labels[shape]);
        let d = area.dot(&(*query - *hit));
        if d > SMALL {
            VolumeType::Outside
        } else if d < -SMALL {
            VolumeType::Inside
        } else {
            VolumeType::Unknown
        }
    }
}

// =============================================================================
// CELL SHAPES
// =============================================================================

/// A subset of a mesh's cells: shape `i` is cell `cell_labels[i]`.
///
/// Built for cell-location queries: overlap a query box or sphere with cell
/// bounds, then confirm with [`CellShapes::contains`]. The containment test
/// classifies against every face plane of the cell, which is exact for
/// convex cells and the usual approximation for mildly non-convex ones.
#[derive(Clone, Debug)]
pub struct CellShapes<'m> {
    mesh: &'m PolyMesh,
    cell_labels: Vec<Label>,
}

impl<'m> CellShapes<'m> {
    /// A shape set over an explicit cell subset.
    #[must_use]
    pub const fn new(mesh: &'m PolyMesh, cell_labels: Vec<Label>) -> Self {
        Self { mesh, cell_labels }
    }

    /// All cells of the mesh.
    #[must_use]
    pub fn all(mesh: &'m PolyMesh) -> Self {
        Self {
            mesh,
            cell_labels: (0..mesh.n_cells() as Label).collect(),
        }
    }

    /// Mesh cell label behind shape index `shape`.
    #[must_use]
    pub fn cell_label(&self, shape: usize) -> Label {
        self.cell_labels[shape]
    }

    /// `true` when `p` lies on the inner side of every face of the cell
    /// (within tolerance).
    #[must_use]
    pub fn contains(&self, shape: usize, p: &Point) -> bool {
        let cell = self.cell_labels[shape];
        for &f in self.mesh.cell_faces(cell) {
            let outward = if self.mesh.owner_of(f) == cell {
                self.mesh.face_area(f)
            } else {
                -self.mesh.face_area(f)
            };
            if outward.dot(&(*p - self.mesh.face_centre(f))) > SMALL {
                return false;
            }
        }
        true
    }

    fn face_points(&self, f: Label) -> Vec<Point> {
        self.mesh.faces()[f as usize].points(self.mesh.points())
    }
}

impl ShapeSet for CellShapes<'_> {
    fn len(&self) -> usize {
        self.cell_labels.len()
    }

    fn bounds(&self, shape: usize) -> BoundBox {
        let cell = self.cell_labels[shape];
        let points = self.mesh.points();
        let mut bb = BoundBox::inverted();
        for p in self.mesh.cell_points(cell) {
            bb.extend(&points[p as usize]);
        }
        bb
    }

    fn nearest_point(&self, shape: usize, p: &Point) -> Point {
        if self.contains(shape, p) {
            return *p;
        }
        let cell = self.cell_labels[shape];
        let mut best = self.mesh.cell_centre(cell);
        let mut best_d = p.distance_sqr(&best);
        for &f in self.mesh.cell_faces(cell) {
            let cand = polygon::nearest_point(&self.face_points(f), p);
            let d = p.distance_sqr(&cand);
            if d < best_d {
                best_d = d;
                best = cand;
            }
        }
        best
    }

    fn intersects_line(&self, shape: usize, start: &Point, end: &Point) -> Option<(f64, Point)> {
        let cell = self.cell_labels[shape];
        let mut best: Option<(f64, Point)> = None;
        for &f in self.mesh.cell_faces(cell) {
            if let Some((t, hit)) = polygon::intersect_segment(&self.face_points(f), start, end) {
                if best.map_or(true, |(bt, _)| t < bt) {
                    best = Some((t, hit));
                }
            }
        }
        best
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::{CellShapes, FaceShapes, PointShapes, ShapeSet};
    use crate::geometry::bound_box::BoundBox;
    use crate::geometry::point::Point;
    use crate::mesh::poly_mesh::PolyMesh;
    use crate::spatial::octree::VolumeType;
    use approx::assert_relative_eq;

    #[test]
    fn test_point_shapes_queries() {
        let points = vec![Point::zero(), Point::new(2.0, 0.0, 0.0)];
        let shapes = PointShapes::new(&points);

        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes.nearest_point(1, &Point::zero()), points[1]);
        assert!(shapes.overlaps_box(0, &BoundBox::new(Point::new(-1.0, -1.0, -1.0), Point::new(1.0, 1.0, 1.0))));
        assert!(!shapes.overlaps_box(1, &BoundBox::new(Point::new(-1.0, -1.0, -1.0), Point::new(1.0, 1.0, 1.0))));
        assert!(shapes.overlaps_sphere(1, &Point::new(2.5, 0.0, 0.0), 0.3));

        // No extent: line intersection is unsupported.
        assert!(shapes
            .intersects_line(0, &Point::new(-1.0, 0.0, 0.0), &Point::new(1.0, 0.0, 0.0))
            .is_none());

        let (on_shape, on_line) = shapes
            .nearest_to_line(1, &Point::new(0.0, 1.0, 0.0), &Point::new(4.0, 1.0, 0.0))
            .unwrap();
        assert_eq!(on_shape, points[1]);
        assert_relative_eq!(on_line.x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(on_line.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_boundary_face_shapes_classify_sides() {
        let mesh = PolyMesh::hex_block([1.0, 1.0, 1.0]).unwrap();
        let shapes = FaceShapes::boundary(&mesh);
        assert_eq!(shapes.len(), 6);

        let inside = Point::new(0.5, 0.5, 0.5);
        let outside = Point::new(0.5, 0.5, 2.0);
        for shape in 0..shapes.len() {
            let hit = shapes.nearest_point(shape, &inside);
            assert_eq!(shapes.volume_side(shape, &hit, &inside), VolumeType::Inside);
        }
        // The zMax face sees the point above it as outside.
        let z_max = shapes.len() - 1;
        let hit = shapes.nearest_point(z_max, &outside);
        assert_eq!(shapes.volume_side(z_max, &hit, &outside), VolumeType::Outside);
    }

    #[test]
    fn test_face_shapes_intersection() {
        let mesh = PolyMesh::hex_block([1.0, 1.0, 1.0]).unwrap();
        let shapes = FaceShapes::boundary(&mesh);

        // A vertical segment through the cell crosses zMin and zMax.
        let start = Point::new(0.5, 0.5, -1.0);
        let end = Point::new(0.5, 0.5, 2.0);
        let mut hits = 0;
        for shape in 0..shapes.len() {
            if let Some((t, hit)) = shapes.intersects_line(shape, &start, &end) {
                hits += 1;
                assert!((0.0..=1.0).contains(&t));
                assert_relative_eq!(hit.x, 0.5, epsilon = 1e-12);
            }
        }
        assert_eq!(hits, 2);
    }

    #[test]
    fn test_cell_shapes_containment_and_nearest() {
        let mesh = PolyMesh::block(2, 1, 1, [2.0, 1.0, 1.0]).unwrap();
        let shapes = CellShapes::all(&mesh);
        assert_eq!(shapes.len(), 2);

        let in_first = Point::new(0.5, 0.5, 0.5);
        assert!(shapes.contains(0, &in_first));
        assert!(!shapes.contains(1, &in_first));

        // Inside: the point itself; outside: a boundary point.
        assert_eq!(shapes.nearest_point(0, &in_first), in_first);
        let near = shapes.nearest_point(0, &Point::new(-1.0, 0.5, 0.5));
        assert_relative_eq!(near.x, 0.0, epsilon = 1e-12);

        let bb = shapes.bounds(1);
        assert_relative_eq!(bb.min().x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(bb.max().x, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cell_shapes_line_entry() {
        let mesh = PolyMesh::block(2, 1, 1, [2.0, 1.0, 1.0]).unwrap();
        let shapes = CellShapes::all(&mesh);

        // Segment entering cell 1 from the right hits its xMax face first.
        let (t, hit) = shapes
            .intersects_line(1, &Point::new(3.0, 0.5, 0.5), &Point::new(1.25, 0.5, 0.5))
            .unwrap();
        assert_relative_eq!(hit.x, 2.0, epsilon = 1e-12);
        assert!(t < 1.0);
    }
}
