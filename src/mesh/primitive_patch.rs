//! Indirect addressing of a face subset.
//!
//! A [`PrimitivePatch`] wraps a list of mesh face labels (typically one
//! boundary patch, but any subset works) and derives a compact local
//! numbering: local points in order of first appearance, faces rewritten
//! into local labels, and the patch edge list with internal edges (shared by
//! two patch faces) ordered before boundary edges (on the patch perimeter).
//!
//! The layer extruder walks this structure rather than the full mesh: per
//! patch point it needs the faces around the point, per patch edge the one
//! or two faces beside it, and the translation back to global mesh labels.

use crate::collections::{FastHashMap, SmallBuffer};
use crate::geometry::point::Label;
use crate::mesh::face::{Edge, Face};
use crate::mesh::poly_mesh::PolyMesh;

/// A face subset of a mesh with local point and edge numbering.
#[derive(Clone, Debug)]
pub struct PrimitivePatch {
    face_labels: Vec<Label>,
    local_faces: Vec<Face>,
    mesh_points: Vec<Label>,
    point_map: FastHashMap<Label, Label>,
    /// Local-label edges, internal first.
    edges: Vec<Edge>,
    n_internal_edges: usize,
    edge_faces: Vec<SmallBuffer<Label, 2>>,
    face_edges: Vec<SmallBuffer<Label, 4>>,
    point_faces: Vec<Vec<Label>>,
}

impl PrimitivePatch {
    /// Build the local addressing for `face_labels` of `mesh`.
    #[must_use]
    pub fn new(mesh: &PolyMesh, face_labels: Vec<Label>) -> Self {
        let mut mesh_points = Vec::new();
        let mut point_map: FastHashMap<Label, Label> = FastHashMap::default();
        let mut local_faces = Vec::with_capacity(face_labels.len());

        for &f in &face_labels {
            let local: Face = mesh.faces()[f as usize]
                .iter()
                .map(|global| {
                    *point_map.entry(global).or_insert_with(|| {
                        mesh_points.push(global);
                        (mesh_points.len() - 1) as Label
                    })
                })
                .collect();
            local_faces.push(local);
        }

        // Edge extraction with stable first-seen numbering, then internal
        // edges (two faces) ahead of perimeter edges (one face).
        let mut edge_index: FastHashMap<Edge, usize> = FastHashMap::default();
        let mut edges: Vec<Edge> = Vec::new();
        let mut edge_faces: Vec<SmallBuffer<Label, 2>> = Vec::new();
        let mut face_edges: Vec<SmallBuffer<Label, 4>> = Vec::new();

        for (fi, f) in local_faces.iter().enumerate() {
            let mut fe: SmallBuffer<Label, 4> = SmallBuffer::new();
            for e in f.edges() {
                let ei = *edge_index.entry(e).or_insert_with(|| {
                    edges.push(e);
                    edge_faces.push(SmallBuffer::new());
                    edges.len() - 1
                });
                edge_faces[ei].push(fi as Label);
                fe.push(ei as Label);
            }
            face_edges.push(fe);
        }

        let mut order: Vec<usize> = (0..edges.len()).collect();
        order.sort_by_key(|&ei| (edge_faces[ei].len() < 2, ei));
        let mut new_of_old = vec![0 as Label; edges.len()];
        for (new, &old) in order.iter().enumerate() {
            new_of_old[old] = new as Label;
        }

        let reordered_edges = order.iter().map(|&old| edges[old]).collect();
        let reordered_edge_faces: Vec<SmallBuffer<Label, 2>> =
            order.iter().map(|&old| edge_faces[old].clone()).collect();
        let n_internal_edges = reordered_edge_faces.iter().filter(|ef| ef.len() >= 2).count();
        for fe in &mut face_edges {
            for e in fe.iter_mut() {
                *e = new_of_old[*e as usize];
            }
        }

        let mut point_faces: Vec<Vec<Label>> = vec![Vec::new(); mesh_points.len()];
        for (fi, f) in local_faces.iter().enumerate() {
            for v in f.iter() {
                point_faces[v as usize].push(fi as Label);
            }
        }

        Self {
            face_labels,
            local_faces,
            mesh_points,
            point_map,
            edges: reordered_edges,
            n_internal_edges,
            edge_faces: reordered_edge_faces,
            face_edges,
            point_faces,
        }
    }

    /// Number of faces in the patch.
    #[must_use]
    pub fn n_faces(&self) -> usize {
        self.face_labels.len()
    }

    /// Number of distinct points used by the patch.
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.mesh_points.len()
    }

    /// Global face labels, in patch order.
    #[must_use]
    pub fn face_labels(&self) -> &[Label] {
        &self.face_labels
    }

    /// Global face label of local face `f`.
    #[must_use]
    pub fn face_label(&self, f: Label) -> Label {
        self.face_labels[f as usize]
    }

    /// Faces in local point numbering.
    #[must_use]
    pub fn local_faces(&self) -> &[Face] {
        &self.local_faces
    }

    /// Local point to global mesh point.
    #[must_use]
    pub fn mesh_points(&self) -> &[Label] {
        &self.mesh_points
    }

    /// Global point of local point `p`.
    #[must_use]
    pub fn mesh_point(&self, p: Label) -> Label {
        self.mesh_points[p as usize]
    }

    /// Local point of a global mesh point, or `None` if off the patch.
    #[must_use]
    pub fn which_point(&self, global: Label) -> Option<Label> {
        self.point_map.get(&global).copied()
    }

    /// Patch edges in local point labels, internal edges first.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of edges shared by two patch faces; these come first in
    /// [`PrimitivePatch::edges`].
    #[must_use]
    pub fn n_internal_edges(&self) -> usize {
        self.n_internal_edges
    }

    /// Local faces either side of a local edge (one entry on the
    /// perimeter).
    #[must_use]
    pub fn edge_faces(&self, edge: Label) -> &[Label] {
        &self.edge_faces[edge as usize]
    }

    /// Local edges around a local face, in loop order.
    #[must_use]
    pub fn face_edges(&self, face: Label) -> &[Label] {
        &self.face_edges[face as usize]
    }

    /// Local faces around a local point.
    #[must_use]
    pub fn point_faces(&self, point: Label) -> &[Label] {
        &self.point_faces[point as usize]
    }

    /// A local edge translated to global mesh point labels.
    #[must_use]
    pub fn global_edge(&self, edge: Label) -> Edge {
        let e = self.edges[edge as usize];
        Edge::new(self.mesh_point(e.a()), self.mesh_point(e.b()))
    }
}

// =============================================================================
// TESTS
// =============================================================================
