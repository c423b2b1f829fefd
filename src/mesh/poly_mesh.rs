//! The polyhedral mesh snapshot.
//!
//! [`PolyMesh`] is an immutable arena-of-arrays mesh description: point
//! positions, face vertex loops, per-face owner and neighbour cells, boundary
//! patches, and point/face/cell zones. Faces are stored internal-first with
//! boundary faces grouped into contiguous patches; every internal face obeys
//! the convention that its owner cell index is strictly less than its
//! neighbour cell index and its normal points from owner to neighbour.
//!
//! Topology-editing algorithms never mutate a `PolyMesh`; they read it
//! through the query surface here and emit actions into a
//! [`crate::topo::change::TopoChange`] journal, whose commit produces a fresh
//! `PolyMesh`.
//!
//! # Validation
//!
//! Construction runs the structural checks once (index ranges, vertex-loop
//! sizes, owner<neighbour, patch coverage) and returns [`MeshError`] on the
//! first violation, so downstream algorithms can index without re-checking.

use crate::geometry::bound_box::BoundBox;
use crate::geometry::point::{Label, Point, Vector, NONE, SMALL};
use crate::mesh::face::{Edge, Face};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A contiguous slab of boundary faces sharing a boundary-condition role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Patch name.
    pub name: String,
    /// Index of the first face of the patch.
    pub start: Label,
    /// Number of faces in the patch.
    pub size: Label,
}

impl Patch {
    /// Create a patch descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, start: Label, size: Label) -> Self {
        Self {
            name: name.into(),
            start,
            size,
        }
    }

    /// `true` when `face` lies within this patch's slab.
    #[must_use]
    pub fn contains(&self, face: Label) -> bool {
        face >= self.start && face < self.start + self.size
    }
}

/// A named tagging of points, faces, or cells.
///
/// For face zones, `flips` parallels `entities` and records whether the
/// face's stored orientation is opposite the zone's reference orientation.
/// Point and cell zones leave `flips` empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Zone name.
    pub name: String,
    /// Member entity labels, ascending.
    pub entities: Vec<Label>,
    /// Per-face flip polarity (face zones only).
    pub flips: Vec<bool>,
}

impl Zone {
    /// An empty zone with a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: Vec::new(),
            flips: Vec::new(),
        }
    }
}

/// Structural defects detected when assembling a mesh.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MeshError {
    /// Parallel arrays disagree about the number of faces.
    #[error("owner list has {owners} entries for {faces} faces")]
    OwnerSize {
        /// Number of owner entries.
        owners: usize,
        /// Number of faces.
        faces: usize,
    },

    /// More neighbour entries than faces.
    #[error("neighbour list has {neighbours} entries for {faces} faces")]
    NeighbourSize {
        /// Number of neighbour entries.
        neighbours: usize,
        /// Number of faces.
        faces: usize,
    },

    /// A face with fewer than three vertices.
    #[error("face {face} has {n_verts} vertices; a face needs at least 3")]
    FaceTooSmall {
        /// Offending face.
        face: Label,
        /// Vertex count found.
        n_verts: usize,
    },

    /// A face referencing a point outside the point list.
    #[error("face {face} references point {point} outside 0..{n_points}")]
    FaceVertexOutOfRange {
        /// Offending face.
        face: Label,
        /// Offending vertex label.
        point: Label,
        /// Number of points.
        n_points: usize,
    },

    /// An owner or neighbour cell index outside the cell range.
    #[error("face {face} references cell {cell} outside 0..{n_cells}")]
    CellOutOfRange {
        /// Offending face.
        face: Label,
        /// Offending cell label.
        cell: Label,
        /// Number of cells.
        n_cells: usize,
    },

    /// An internal face whose owner is not below its neighbour.
    #[error("internal face {face} has owner {owner} >= neighbour {neighbour}")]
    OwnerNotBelowNeighbour {
        /// Offending face.
        face: Label,
        /// Owner cell.
        owner: Label,
        /// Neighbour cell.
        neighbour: Label,
    },

    /// Patch slabs fail to tile the boundary face range exactly.
    #[error("patches cover faces {covered_from}..{covered_to}, expected {expected_from}..{expected_to}")]
    PatchCoverage {
        /// First face covered by the patch slabs.
        covered_from: Label,
        /// One past the last covered face.
        covered_to: Label,
        /// Expected first boundary face.
        expected_from: Label,
        /// Expected end of the face range.
        expected_to: Label,
    },

    /// A zone referencing an entity outside its range.
    #[error("zone '{zone}' references entity {entity} outside 0..{n_entities}")]
    ZoneEntityOutOfRange {
        /// Zone name.
        zone: String,
        /// Offending entity label.
        entity: Label,
        /// Entity count for the zone's kind.
        n_entities: usize,
    },
}

/// An immutable polyhedral mesh.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolyMesh {
    points: Vec<Point>,
    faces: Vec<Face>,
    owner: Vec<Label>,
    /// Neighbour cells of the internal faces only.
    neighbour: Vec<Label>,
    patches: Vec<Patch>,
    point_zones: Vec<Zone>,
    face_zones: Vec<Zone>,
    cell_zones: Vec<Zone>,
    n_cells: usize,
    // Derived adjacency, built once at construction.
    cell_faces: Vec<Vec<Label>>,
    point_faces: Vec<Vec<Label>>,
}

impl PolyMesh {
    /// Assemble a mesh from its primitive arrays.
    ///
    /// `neighbour` covers only the internal faces, which must come first in
    /// `faces`; the remaining faces are boundary faces tiled exactly by
    /// `patches` in order.
    ///
    /// # Errors
    ///
    /// Returns a [`MeshError`] describing the first structural defect found.
    pub fn new(
        points: Vec<Point>,
        faces: Vec<Face>,
        owner: Vec<Label>,
        neighbour: Vec<Label>,
        patches: Vec<Patch>,
    ) -> Result<Self, MeshError> {
        Self::with_zones(
            points,
            faces,
            owner,
            neighbour,
            patches,
            Vec::new(),
            Vec::new(),
            Vec::new(),
        )
    }

    /// [`PolyMesh::new`] plus point/face/cell zones.
    ///
    /// # Errors
    ///
    /// Returns a [`MeshError`] describing the first structural defect found.
    #[allow(clippy::too_many_arguments)]
    pub fn with_zones(
        points: Vec<Point>,
        faces: Vec<Face>,
        owner: Vec<Label>,
        neighbour: Vec<Label>,
        patches: Vec<Patch>,
        point_zones: Vec<Zone>,
        face_zones: Vec<Zone>,
        cell_zones: Vec<Zone>,
    ) -> Result<Self, MeshError> {
        if owner.len() != faces.len() {
            return Err(MeshError::OwnerSize {
                owners: owner.len(),
                faces: faces.len(),
            });
        }
        if neighbour.len() > faces.len() {
            return Err(MeshError::NeighbourSize {
                neighbours: neighbour.len(),
                faces: faces.len(),
            });
        }

        let n_cells = owner
            .iter()
            .chain(neighbour.iter())
            .map(|&c| c + 1)
            .max()
            .unwrap_or(0)
            .max(0) as usize;

        for (fi, f) in faces.iter().enumerate() {
            let face = fi as Label;
            if f.len() < 3 {
                return Err(MeshError::FaceTooSmall {
                    face,
                    n_verts: f.len(),
                });
            }
            for v in f.iter() {
                if v < 0 || v as usize >= points.len() {
                    return Err(MeshError::FaceVertexOutOfRange {
                        face,
                        point: v,
                        n_points: points.len(),
                    });
                }
            }
            let own = owner[fi];
            if own < 0 || own as usize >= n_cells {
                return Err(MeshError::CellOutOfRange {
                    face,
                    cell: own,
                    n_cells,
                });
            }
            if fi < neighbour.len() {
                let nei = neighbour[fi];
                if nei < 0 || nei as usize >= n_cells {
                    return Err(MeshError::CellOutOfRange {
                        face,
                        cell: nei,
                        n_cells,
                    });
                }
                if own >= nei {
                    return Err(MeshError::OwnerNotBelowNeighbour {
                        face,
                        owner: own,
                        neighbour: nei,
                    });
                }
            }
        }

        // Patch slabs must tile [n_internal, n_faces) in order.
        let mut cursor = neighbour.len() as Label;
        let covered_from = patches.first().map_or(cursor, |p| p.start);
        for p in &patches {
            if p.start != cursor || p.size < 0 {
                return Err(MeshError::PatchCoverage {
                    covered_from,
                    covered_to: p.start,
                    expected_from: neighbour.len() as Label,
                    expected_to: faces.len() as Label,
                });
            }
            cursor += p.size;
        }
        if cursor != faces.len() as Label {
            return Err(MeshError::PatchCoverage {
                covered_from,
                covered_to: cursor,
                expected_from: neighbour.len() as Label,
                expected_to: faces.len() as Label,
            });
        }

        for (zones, n_entities) in [
            (&point_zones, points.len()),
            (&face_zones, faces.len()),
            (&cell_zones, n_cells),
        ] {
            for z in zones {
                for &e in &z.entities {
                    if e < 0 || e as usize >= n_entities {
                        return Err(MeshError::ZoneEntityOutOfRange {
                            zone: z.name.clone(),
                            entity: e,
                            n_entities,
                        });
                    }
                }
            }
        }

        let mut cell_faces: Vec<Vec<Label>> = vec![Vec::new(); n_cells];
        for (fi, &own) in owner.iter().enumerate() {
            cell_faces[own as usize].push(fi as Label);
        }
        for (fi, &nei) in neighbour.iter().enumerate() {
            cell_faces[nei as usize].push(fi as Label);
        }

        let mut point_faces: Vec<Vec<Label>> = vec![Vec::new(); points.len()];
        for (fi, f) in faces.iter().enumerate() {
            for v in f.iter() {
                point_faces[v as usize].push(fi as Label);
            }
        }

        Ok(Self {
            points,
            faces,
            owner,
            neighbour,
            patches,
            point_zones,
            face_zones,
            cell_zones,
            n_cells,
            cell_faces,
            point_faces,
        })
    }

    // =========================================================================
    // COUNTS AND RAW ARRAYS
    // =========================================================================

    /// Number of points.
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    /// Number of faces (internal plus boundary).
    #[must_use]
    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    /// Number of internal faces; these precede all boundary faces.
    #[must_use]
    pub fn n_internal_faces(&self) -> usize {
        self.neighbour.len()
    }

    /// Number of cells.
    #[must_use]
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// Point positions.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Face vertex loops.
    #[must_use]
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Owner cell per face.
    #[must_use]
    pub fn owner(&self) -> &[Label] {
        &self.owner
    }

    /// Neighbour cell per internal face.
    #[must_use]
    pub fn neighbour(&self) -> &[Label] {
        &self.neighbour
    }

    /// Boundary patches.
    #[must_use]
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Point zones.
    #[must_use]
    pub fn point_zones(&self) -> &[Zone] {
        &self.point_zones
    }

    /// Face zones.
    #[must_use]
    pub fn face_zones(&self) -> &[Zone] {
        &self.face_zones
    }

    /// Cell zones.
    #[must_use]
    pub fn cell_zones(&self) -> &[Zone] {
        &self.cell_zones
    }

    // =========================================================================
    // TOPOLOGY QUERIES
    // =========================================================================

    /// `true` for faces with a cell on both sides.
    #[must_use]
    pub fn is_internal_face(&self, face: Label) -> bool {
        (face as usize) < self.neighbour.len()
    }

    /// Owner cell of a face.
    #[must_use]
    pub fn owner_of(&self, face: Label) -> Label {
        self.owner[face as usize]
    }

    /// Neighbour cell of a face, [`NONE`] for boundary faces.
    #[must_use]
    pub fn neighbour_of(&self, face: Label) -> Label {
        if self.is_internal_face(face) {
            self.neighbour[face as usize]
        } else {
            NONE
        }
    }

    /// Patch holding `face`, [`NONE`] for internal faces.
    #[must_use]
    pub fn which_patch(&self, face: Label) -> Label {
        if self.is_internal_face(face) {
            return NONE;
        }
        for (pi, p) in self.patches.iter().enumerate() {
            if p.contains(face) {
                return pi as Label;
            }
        }
        NONE
    }

    /// Face zone holding `face` with its flip polarity, or `(NONE, false)`.
    #[must_use]
    pub fn which_face_zone(&self, face: Label) -> (Label, bool) {
        for (zi, z) in self.face_zones.iter().enumerate() {
            if let Some(pos) = z.entities.iter().position(|&f| f == face) {
                let flip = z.flips.get(pos).copied().unwrap_or(false);
                return (zi as Label, flip);
            }
        }
        (NONE, false)
    }

    /// Point zone holding `point`, or [`NONE`].
    #[must_use]
    pub fn which_point_zone(&self, point: Label) -> Label {
        for (zi, z) in self.point_zones.iter().enumerate() {
            if z.entities.contains(&point) {
                return zi as Label;
            }
        }
        NONE
    }

    /// Cell zone holding `cell`, or [`NONE`].
    #[must_use]
    pub fn which_cell_zone(&self, cell: Label) -> Label {
        for (zi, z) in self.cell_zones.iter().enumerate() {
            if z.entities.contains(&cell) {
                return zi as Label;
            }
        }
        NONE
    }

    /// Faces bounding a cell, in first-encountered order (owner faces before
    /// neighbour faces of equal index).
    #[must_use]
    pub fn cell_faces(&self, cell: Label) -> &[Label] {
        &self.cell_faces[cell as usize]
    }

    /// Faces using a point.
    #[must_use]
    pub fn point_faces(&self, point: Label) -> &[Label] {
        &self.point_faces[point as usize]
    }

    /// Distinct points of a cell, in first-encountered order over its faces.
    #[must_use]
    pub fn cell_points(&self, cell: Label) -> Vec<Label> {
        let mut seen = Vec::new();
        for &f in self.cell_faces(cell) {
            for v in self.faces[f as usize].iter() {
                if !seen.contains(&v) {
                    seen.push(v);
                }
            }
        }
        seen
    }

    /// Distinct edges of a cell, in first-encountered order over its faces.
    #[must_use]
    pub fn cell_edges(&self, cell: Label) -> Vec<Edge> {
        let mut seen: Vec<Edge> = Vec::new();
        for &f in self.cell_faces(cell) {
            for e in self.faces[f as usize].edges() {
                if !seen.contains(&e) {
                    seen.push(e);
                }
            }
        }
        seen
    }

    /// Faces whose vertex loop traverses `edge` (in either direction).
    #[must_use]
    pub fn edge_faces(&self, edge: &Edge) -> Vec<Label> {
        let mut out = Vec::new();
        for &f in self.point_faces(edge.a()) {
            if self.faces[f as usize].edge_direction(edge) != 0 {
                out.push(f);
            }
        }
        out
    }

    /// The two faces of `cell` whose loops traverse `edge`, or `None` when
    /// the cell is not closed around the edge.
    #[must_use]
    pub fn cell_edge_faces(&self, cell: Label, edge: &Edge) -> Option<(Label, Label)> {
        let mut found: Option<Label> = None;
        for &f in self.cell_faces(cell) {
            if self.faces[f as usize].edge_direction(edge) != 0 {
                match found {
                    None => found = Some(f),
                    Some(first) => return Some((first, f)),
                }
            }
        }
        None
    }

    // =========================================================================
    // GEOMETRY
    // =========================================================================

    /// Area-weighted centroid of a face.
    #[must_use]
    pub fn face_centre(&self, face: Label) -> Point {
        self.faces[face as usize].centre(&self.points)
    }

    /// Area vector of a face (owner-to-neighbour or outward orientation).
    #[must_use]
    pub fn face_area(&self, face: Label) -> Vector {
        self.faces[face as usize].area(&self.points)
    }

    /// Volume-weighted centroid of a cell.
    ///
    /// Degenerate cells (accumulated volume under [`SMALL`]) fall back to
    /// the average of the face centres.
    #[must_use]
    pub fn cell_centre(&self, cell: Label) -> Point {
        self.cell_centre_and_volume(cell).0
    }

    /// Volume of a cell by pyramid decomposition over its faces.
    #[must_use]
    pub fn cell_volume(&self, cell: Label) -> f64 {
        self.cell_centre_and_volume(cell).1
    }

    fn cell_centre_and_volume(&self, cell: Label) -> (Point, f64) {
        let faces = self.cell_faces(cell);
        if faces.is_empty() {
            return (Point::zero(), 0.0);
        }

        let mut estimate = Vector::zero();
        for &f in faces {
            estimate += Vector::from(self.face_centre(f));
        }
        let estimate = Point::from(estimate / faces.len() as f64);

        let mut volume = 0.0;
        let mut weighted = Vector::zero();
        for &f in faces {
            let sign = if self.owner_of(f) == cell { 1.0 } else { -1.0 };
            let fc = self.face_centre(f);
            let pyramid = sign * self.face_area(f).dot(&(fc - estimate)) / 3.0;
            // Pyramid centroid sits 3/4 of the way from apex to base centre.
            let centroid = Vector::from(estimate) * 0.25 + Vector::from(fc) * 0.75;
            volume += pyramid;
            weighted += centroid * pyramid;
        }

        if volume.abs() < SMALL {
            (estimate, volume)
        } else {
            (Point::from(weighted / volume), volume)
        }
    }

    /// Tight bounding box around all points.
    #[must_use]
    pub fn bound_box(&self) -> BoundBox {
        BoundBox::around(&self.points)
    }

    // =========================================================================
    // GENERATORS
    // =========================================================================

    /// Structured block of `nx * ny * nz` hexahedral cells spanning
    /// `[0, dims]`, with the six sides as patches named `xMin`, `xMax`,
    /// `yMin`, `yMax`, `zMin`, `zMax` (in that order).
    ///
    /// # Errors
    ///
    /// Returns [`MeshError`] only if the requested block is empty in any
    /// direction.
    pub fn block(nx: usize, ny: usize, nz: usize, dims: [f64; 3]) -> Result<Self, MeshError> {
        let vertex = |i: usize, j: usize, k: usize| -> Label {
            (i + (nx + 1) * (j + (ny + 1) * k)) as Label
        };
        let cell = |i: usize, j: usize, k: usize| -> Label { (i + nx * (j + ny * k)) as Label };

        let mut points = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    points.push(Point::new(
                        dims[0] * i as f64 / nx.max(1) as f64,
                        dims[1] * j as f64 / ny.max(1) as f64,
                        dims[2] * k as f64 / nz.max(1) as f64,
                    ));
                }
            }
        }

        let mut faces = Vec::new();
        let mut owner = Vec::new();
        let mut neighbour = Vec::new();

        // Internal faces, upper-triangular: per cell in index order, the
        // +x, +y, +z faces towards higher-indexed neighbours.
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let c = cell(i, j, k);
                    if i + 1 < nx {
                        faces.push(Face::new([
                            vertex(i + 1, j, k),
                            vertex(i + 1, j + 1, k),
                            vertex(i + 1, j + 1, k + 1),
                            vertex(i + 1, j, k + 1),
                        ]));
                        owner.push(c);
                        neighbour.push(cell(i + 1, j, k));
                    }
                    if j + 1 < ny {
                        faces.push(Face::new([
                            vertex(i, j + 1, k),
                            vertex(i, j + 1, k + 1),
                            vertex(i + 1, j + 1, k + 1),
                            vertex(i + 1, j + 1, k),
                        ]));
                        owner.push(c);
                        neighbour.push(cell(i, j + 1, k));
                    }
                    if k + 1 < nz {
                        faces.push(Face::new([
                            vertex(i, j, k + 1),
                            vertex(i + 1, j, k + 1),
                            vertex(i + 1, j + 1, k + 1),
                            vertex(i, j + 1, k + 1),
                        ]));
                        owner.push(c);
                        neighbour.push(cell(i, j, k + 1));
                    }
                }
            }
        }

        let mut patches = Vec::with_capacity(6);
        let mut start = faces.len() as Label;
        let mut push_patch = |name: &str,
                              patch_faces: Vec<(Face, Label)>,
                              faces: &mut Vec<Face>,
                              owner: &mut Vec<Label>| {
            let size = patch_faces.len() as Label;
            for (f, own) in patch_faces {
                faces.push(f);
                owner.push(own);
            }
            patches.push(Patch::new(name, start, size));
            start += size;
        };

        let mut x_min = Vec::new();
        let mut x_max = Vec::new();
        for k in 0..nz {
            for j in 0..ny {
                x_min.push((
                    Face::new([
                        vertex(0, j, k),
                        vertex(0, j, k + 1),
                        vertex(0, j + 1, k + 1),
                        vertex(0, j + 1, k),
                    ]),
                    cell(0, j, k),
                ));
                x_max.push((
                    Face::new([
                        vertex(nx, j, k),
                        vertex(nx, j + 1, k),
                        vertex(nx, j + 1, k + 1),
                        vertex(nx, j, k + 1),
                    ]),
                    cell(nx - 1, j, k),
                ));
            }
        }
        push_patch("xMin", x_min, &mut faces, &mut owner);
        push_patch("xMax", x_max, &mut faces, &mut owner);

        let mut y_min = Vec::new();
        let mut y_max = Vec::new();
        for k in 0..nz {
            for i in 0..nx {
                y_min.push((
                    Face::new([
                        vertex(i, 0, k),
                        vertex(i + 1, 0, k),
                        vertex(i + 1, 0, k + 1),
                        vertex(i, 0, k + 1),
                    ]),
                    cell(i, 0, k),
                ));
                y_max.push((
                    Face::new([
                        vertex(i, ny, k),
                        vertex(i, ny, k + 1),
                        vertex(i + 1, ny, k + 1),
                        vertex(i + 1, ny, k),
                    ]),
                    cell(i, ny - 1, k),
                ));
            }
        }
        push_patch("yMin", y_min, &mut faces, &mut owner);
        push_patch("yMax", y_max, &mut faces, &mut owner);

        let mut z_min = Vec::new();
        let mut z_max = Vec::new();
        for j in 0..ny {
            for i in 0..nx {
                z_min.push((
                    Face::new([
                        vertex(i, j, 0),
                        vertex(i, j + 1, 0),
                        vertex(i + 1, j + 1, 0),
                        vertex(i + 1, j, 0),
                    ]),
                    cell(i, j, 0),
                ));
                z_max.push((
                    Face::new([
                        vertex(i, j, nz),
                        vertex(i + 1, j, nz),
                        vertex(i + 1, j + 1, nz),
                        vertex(i, j + 1, nz),
                    ]),
                    cell(i, j, nz - 1),
                ));
            }
        }
        push_patch("zMin", z_min, &mut faces, &mut owner);
        push_patch("zMax", z_max, &mut faces, &mut owner);

        Self::new(points, faces, owner, neighbour, patches)
    }

    /// Single hexahedral cell spanning `[0, dims]` with one patch per side.
    ///
    /// # Errors
    ///
    /// Propagates [`MeshError`] from assembly (does not occur for finite
    /// positive `dims`).
    pub fn hex_block(dims: [f64; 3]) -> Result<Self, MeshError> {
        Self::block(1, 1, 1, dims)
    }
}

// =============================================================================
// TESTS
// =============================================================================
