//! Extruding a boundary patch into layers of new cells.
//!
//! [`PatchLayerExtruder::set_refinement`] grows a stack of cells off every
//! face of a boundary patch: per patch point a chain of new points marches
//! along a supplied displacement (spaced as a geometric series), per patch
//! face and layer a new cell and a new horizontal face are added, and the
//! stacks are walled off with side faces along the patch edges. The original
//! patch face turns into an internal face against the first layer cell; the
//! outermost horizontal face takes over the face's place on its patch.
//!
//! Layer counts may differ per face. Where two faces sharing a patch edge
//! disagree, the shorter stack terminates flush with its own boundary face
//! and the taller stack's exposed wall becomes boundary faces carrying the
//! patch and zone of the side that is still extruding. Walls along the patch
//! perimeter take their patch and zone from an existing mesh face connected
//! to the edge (boundary faces preferred), with zone polarity kept
//! consistent with the patch's edge ordering.
//!
//! A point with zero displacement (or a zero per-point layer count) gets no
//! chain: faces using it extrude into prisms that collapse onto the original
//! point, and side faces degenerate from quadrilaterals to triangles (or
//! vanish).
//!
//! # Preconditions
//!
//! - Every per-point layer count equals the maximum layer count of the
//!   faces using the point, or zero (checked; see
//!   [`ActionError::LayerCountMismatch`]).
//! - Non-manifold patch points (faces around the point with inconsistent
//!   edge orientation) must carry zero displacement (checked; see
//!   [`ActionError::NonManifoldPoint`]).
//! - The patch faces must be boundary faces of the mesh the journal was
//!   seeded from.

use crate::collections::{fast_hash_set_with_capacity, FastHashSet};
use crate::geometry::point::{Label, Vector, NONE};
use crate::mesh::face::{Edge, Face};
use crate::mesh::poly_mesh::PolyMesh;
use crate::mesh::primitive_patch::PrimitivePatch;
use crate::topo::action::{ActionError, TopoAction};
use crate::topo::change::TopoChange;
use crate::topo::map::MeshMap;
use tracing::debug;

/// Generates the journal entries that extrude a patch into cell layers.
#[derive(Debug)]
pub struct PatchLayerExtruder<'m> {
    mesh: &'m PolyMesh,
    patch: PrimitivePatch,
    /// Per local patch point: added chain points, nearest the original
    /// point first.
    added_points: Vec<Vec<Label>>,
    /// Per local patch face: the face stack, original face first, outermost
    /// boundary face last. Empty for faces that did not extrude.
    layer_faces: Vec<Vec<Label>>,
}

impl<'m> PatchLayerExtruder<'m> {
    /// An extruder over `patch` (a boundary face subset of `mesh`).
    #[must_use]
    pub fn new(mesh: &'m PolyMesh, patch: PrimitivePatch) -> Self {
        let n_points = patch.n_points();
        let n_faces = patch.n_faces();
        Self {
            mesh,
            patch,
            added_points: vec![Vec::new(); n_points],
            layer_faces: vec![Vec::new(); n_faces],
        }
    }

    /// The patch being extruded.
    #[must_use]
    pub fn patch(&self) -> &PrimitivePatch {
        &self.patch
    }

    /// Per local patch point: chain of added point labels, nearest the
    /// original first. Provisional until [`PatchLayerExtruder::update_mesh`].
    #[must_use]
    pub fn added_points(&self) -> &[Vec<Label>] {
        &self.added_points
    }

    /// Per local patch face: the face stack (original first, outermost
    /// boundary face last; `n + 1` entries for an `n`-layer face). Empty for
    /// faces that did not extrude.
    #[must_use]
    pub fn layer_faces(&self) -> &[Vec<Label>] {
        &self.layer_faces
    }

    /// Per local patch face: the added cells of its stack, innermost first,
    /// derived from [`PatchLayerExtruder::layer_faces`] by owner lookup in
    /// the committed mesh.
    #[must_use]
    pub fn added_cells(&self, new_mesh: &PolyMesh) -> Vec<Vec<Label>> {
        self.layer_faces
            .iter()
            .map(|stack| {
                stack
                    .iter()
                    .skip(1)
                    .map(|&f| new_mesh.owner_of(f))
                    .collect()
            })
            .collect()
    }

    /// Emit the extrusion into `journal`.
    ///
    /// Arguments are per local patch entity: `displacement` and
    /// `expansion_ratio` per point (a non-positive ratio is treated as 1,
    /// i.e. uniform spacing), `n_face_layers` per face, `n_point_layers` per
    /// point. The journal must be seeded from the mesh this extruder reads.
    ///
    /// # Errors
    ///
    /// [`ActionError::ArgumentSize`] on length mismatches,
    /// [`ActionError::LayerCountMismatch`] and
    /// [`ActionError::NonManifoldPoint`] on violated preconditions.
    pub fn set_refinement(
        &mut self,
        displacement: &[Vector],
        expansion_ratio: &[f64],
        n_face_layers: &[Label],
        n_point_layers: &[Label],
        journal: &mut TopoChange,
    ) -> Result<(), ActionError> {
        let n_points = self.patch.n_points();
        let n_faces = self.patch.n_faces();

        for (what, expected, found) in [
            ("displacement", n_points, displacement.len()),
            ("expansion_ratio", n_points, expansion_ratio.len()),
            ("n_face_layers", n_faces, n_face_layers.len()),
            ("n_point_layers", n_points, n_point_layers.len()),
        ] {
            if found != expected {
                return Err(ActionError::ArgumentSize {
                    what,
                    expected,
                    found,
                });
            }
        }

        // A face extrudes only when it has layers and at least one displaced
        // point; a point chain exists only when the point is displaced.
        let face_layers: Vec<Label> = (0..n_faces)
            .map(|f| {
                let any_displaced = self.patch.local_faces()[f]
                    .iter()
                    .any(|p| !displacement[p as usize].is_small());
                if any_displaced {
                    n_face_layers[f].max(0)
                } else {
                    0
                }
            })
            .collect();
        let point_layers: Vec<Label> = (0..n_points)
            .map(|p| {
                if displacement[p].is_small() {
                    0
                } else {
                    n_point_layers[p].max(0)
                }
            })
            .collect();

        // Per-point counts must peak with the surrounding faces (or opt out
        // entirely with zero).
        for p in 0..n_points {
            let max_face = self
                .patch
                .point_faces(p as Label)
                .iter()
                .map(|&f| face_layers[f as usize])
                .max()
                .unwrap_or(0);
            let claimed = point_layers[p];
            if claimed != 0 && claimed != max_face {
                return Err(ActionError::LayerCountMismatch {
                    point: p as Label,
                    n_point_layers: claimed,
                    n_face_layers: max_face,
                });
            }
        }

        // Displaced points must be manifold: every internal patch edge is
        // traversed in opposite directions by its two faces.
        let mut non_manifold: FastHashSet<Label> = FastHashSet::default();
        for ei in 0..self.patch.edges().len() {
            let faces = self.patch.edge_faces(ei as Label);
            let e = self.patch.edges()[ei];
            let consistent = match faces {
                [f0, f1] => {
                    let d0 = self.patch.local_faces()[*f0 as usize].edge_direction(&e);
                    let d1 = self.patch.local_faces()[*f1 as usize].edge_direction(&e);
                    d0 * d1 == -1
                }
                [_] => true,
                _ => false,
            };
            if !consistent {
                non_manifold.insert(e.a());
                non_manifold.insert(e.b());
            }
        }
        for &p in &non_manifold {
            if !displacement[p as usize].is_small() {
                return Err(ActionError::NonManifoldPoint { point: p });
            }
        }

        // Point chains: geometric-series spacing along the displacement,
        // each point mastered by its predecessor in the chain.
        let mut chains: Vec<Vec<Label>> = vec![Vec::new(); n_points];
        for p in 0..n_points {
            let n = point_layers[p];
            if n == 0 {
                continue;
            }
            let base = self.mesh.points()[self.patch.mesh_point(p as Label) as usize];
            let disp = displacement[p];
            let ratio = if expansion_ratio[p] > 0.0 {
                expansion_ratio[p]
            } else {
                1.0
            };

            let mut master = self.patch.mesh_point(p as Label);
            let total = geometric_sum(ratio, n);
            for layer in 1..=n {
                let fraction = geometric_sum(ratio, layer) / total;
                let added = journal.apply(TopoAction::add_point(
                    base + disp * fraction,
                    master,
                    NONE,
                    true,
                )?)?;
                chains[p].push(added);
                master = added;
            }
        }

        // Stack cells: one per face per layer, mastered by the face's owner
        // cell and inheriting its zone.
        let mut stack_cells: Vec<Vec<Label>> = vec![Vec::new(); n_faces];
        for f in 0..n_faces {
            let global = self.patch.face_label(f as Label);
            let owner = self.mesh.owner_of(global);
            let zone = self.mesh.which_cell_zone(owner);
            for _ in 0..face_layers[f] {
                stack_cells[f].push(journal.apply(TopoAction::add_cell(
                    NONE,
                    NONE,
                    global,
                    owner,
                    zone,
                ))?);
            }
        }

        // The mesh point standing at `level` above local point `p`:
        // collapsed chains cap at their own length, empty chains stay on the
        // original point.
        let patch = &self.patch;
        let point_at = |p: Label, level: Label| -> Label {
            let chain = &chains[p as usize];
            let capped = level.min(chain.len() as Label);
            if capped == 0 {
                patch.mesh_point(p)
            } else {
                chain[capped as usize - 1]
            }
        };

        // Horizontal faces: rewrite the original face onto the first stack
        // cell, add one face per interior level, and close the stack with a
        // boundary face on the original patch.
        let mut layer_faces: Vec<Vec<Label>> = vec![Vec::new(); n_faces];
        for f in 0..n_faces {
            let n = face_layers[f];
            if n == 0 {
                continue;
            }
            let global = self.patch.face_label(f as Label);
            let local = &self.patch.local_faces()[f];
            let old_owner = self.mesh.owner_of(global);
            let (zone, zone_flip) = self.mesh.which_face_zone(global);
            let face_patch = self.mesh.which_patch(global);

            layer_faces[f].push(global);

            journal.apply(TopoAction::modify_face(
                global,
                self.mesh.faces()[global as usize].clone(),
                old_owner,
                stack_cells[f][0],
                false,
                None,
                None,
            )?)?;

            for level in 1..=n {
                let verts: Face = local.iter().map(|p| point_at(p, level)).collect();
                let verts = verts.collapsed();
                if verts.len() < 3 {
                    continue;
                }
                let (owner, neighbour, patch_id) = if level < n {
                    (
                        stack_cells[f][level as usize - 1],
                        stack_cells[f][level as usize],
                        NONE,
                    )
                } else {
                    (stack_cells[f][level as usize - 1], NONE, face_patch)
                };
                let added = journal.apply(TopoAction::add_face(
                    verts,
                    owner,
                    neighbour,
                    NONE,
                    NONE,
                    global,
                    false,
                    patch_id,
                    zone,
                    zone_flip,
                )?)?;
                layer_faces[f].push(added);
            }
        }

        // Side faces along every patch edge.
        let mut n_side_faces = 0usize;
        for ei in 0..self.patch.edges().len() {
            let e = self.patch.edges()[ei];
            let faces = self.patch.edge_faces(ei as Label);

            let (f_lo, f_hi, n_lo, n_hi) = match faces {
                [f0, f1] => {
                    let (n0, n1) = (face_layers[*f0 as usize], face_layers[*f1 as usize]);
                    if n0 <= n1 {
                        (*f0, *f1, n0, n1)
                    } else {
                        (*f1, *f0, n1, n0)
                    }
                }
                [f0] => (NONE, *f0, 0, face_layers[*f0 as usize]),
                _ => continue,
            };
            if n_hi == 0 {
                continue;
            }

            // Shared wall between the two stacks while both are extruding.
            for level in 1..=n_lo {
                let c_lo = stack_cells[f_lo as usize][level as usize - 1];
                let c_hi = stack_cells[f_hi as usize][level as usize - 1];
                let (owner, neighbour, owner_face) = if c_lo < c_hi {
                    (c_lo, c_hi, f_lo)
                } else {
                    (c_hi, c_lo, f_hi)
                };
                if let Some(verts) = side_face_verts(
                    &self.patch.local_faces()[owner_face as usize],
                    &e,
                    level,
                    &point_at,
                ) {
                    journal.apply(TopoAction::add_face(
                        verts,
                        owner,
                        neighbour,
                        self.patch.mesh_point(e.a()),
                        NONE,
                        NONE,
                        false,
                        NONE,
                        NONE,
                        false,
                    )?)?;
                    n_side_faces += 1;
                }
            }

            // Exposed wall of the taller (or only) stack.
            let (side_patch, side_zone, side_flip) = if f_lo == NONE {
                self.find_zone_face(&e, f_hi)
            } else {
                // Mismatched stacks: the side still extruding donates its
                // patch and zone.
                let global = self.patch.face_label(f_hi);
                let (zone, flip) = self.mesh.which_face_zone(global);
                (self.mesh.which_patch(global), zone, flip)
            };

            for level in (n_lo + 1)..=n_hi {
                let owner = stack_cells[f_hi as usize][level as usize - 1];
                if let Some(verts) = side_face_verts(
                    &self.patch.local_faces()[f_hi as usize],
                    &e,
                    level,
                    &point_at,
                ) {
                    journal.apply(TopoAction::add_face(
                        verts,
                        owner,
                        NONE,
                        self.patch.mesh_point(e.a()),
                        NONE,
                        NONE,
                        false,
                        side_patch,
                        side_zone,
                        side_flip,
                    )?)?;
                    n_side_faces += 1;
                }
            }
        }

        debug!(
            faces = n_faces,
            points = n_points,
            side_faces = n_side_faces,
            "patch layer refinement queued"
        );

        self.added_points = chains;
        self.layer_faces = layer_faces;
        Ok(())
    }

    /// Patch, zone, and flip for a perimeter side face along `local_edge`,
    /// taken from an existing mesh face connected to the edge. Boundary
    /// faces win over internal ones; the extruded face itself is the
    /// fallback when the edge connects to nothing else usable.
    fn find_zone_face(&self, local_edge: &Edge, local_face: Label) -> (Label, Label, bool) {
        let global_edge = Edge::new(
            self.patch.mesh_point(local_edge.a()),
            self.patch.mesh_point(local_edge.b()),
        );
        let mut own: FastHashSet<Label> = fast_hash_set_with_capacity(self.patch.n_faces());
        own.extend(self.patch.face_labels().iter().copied());

        let mut candidates: Vec<Label> = self
            .mesh
            .edge_faces(&global_edge)
            .into_iter()
            .filter(|f| !own.contains(f))
            .collect();
        candidates.sort_unstable();

        let chosen = candidates
            .iter()
            .copied()
            .find(|&f| self.mesh.which_patch(f) != NONE)
            .or_else(|| candidates.first().copied());

        let fallback = self.patch.face_label(local_face);
        let reference = chosen.unwrap_or(fallback);

        let patch = if self.mesh.which_patch(reference) != NONE {
            self.mesh.which_patch(reference)
        } else {
            self.mesh.which_patch(fallback)
        };

        let (zone, mut flip) = self.mesh.which_face_zone(reference);
        if zone != NONE {
            // The new wall traverses the edge the way the extruded face
            // does; if the reference face runs the edge the other way, its
            // polarity inverts on the wall.
            let d_ref = self.mesh.faces()[reference as usize].edge_direction(&global_edge);
            let d_patch =
                self.patch.local_faces()[local_face as usize].edge_direction(local_edge);
            if d_ref != 0 && d_patch != 0 && d_ref == d_patch {
                flip = !flip;
            }
        }
        (patch, zone, flip)
    }

    /// Re-key the bookkeeping through a commit's map plus a local patch
    /// renumbering (`face_map[old_local] -> new_local`, [`NONE`] dropped;
    /// likewise `point_map`), as produced when the patch is rebuilt on the
    /// new mesh.
    pub fn update_mesh(&mut self, map: &MeshMap, face_map: &[Label], point_map: &[Label]) {
        let n_new_points = point_map
            .iter()
            .filter(|&&p| p != NONE)
            .count()
            .max(self.added_points.len());
        let mut new_added_points = vec![Vec::new(); n_new_points];
        for (old_local, chain) in self.added_points.iter().enumerate() {
            let new_local = point_map.get(old_local).copied().unwrap_or(NONE);
            if new_local == NONE {
                continue;
            }
            let rekeyed: Vec<Label> = chain
                .iter()
                .map(|&p| map.new_point(p))
                .filter(|&p| p != NONE)
                .collect();
            new_added_points[new_local as usize] = rekeyed;
        }

        let n_new_faces = face_map
            .iter()
            .filter(|&&f| f != NONE)
            .count()
            .max(self.layer_faces.len());
        let mut new_layer_faces = vec![Vec::new(); n_new_faces];
        for (old_local, stack) in self.layer_faces.iter().enumerate() {
            let new_local = face_map.get(old_local).copied().unwrap_or(NONE);
            if new_local == NONE {
                continue;
            }
            let rekeyed: Vec<Label> = stack
                .iter()
                .map(|&f| map.new_face(f))
                .filter(|&f| f != NONE)
                .collect();
            new_layer_faces[new_local as usize] = rekeyed;
        }

        self.added_points = new_added_points;
        self.layer_faces = new_layer_faces;
    }
}

/// Wall face for `edge` at `level` above the stack of `owner_face`, wound so
/// the normal leaves the stack: the bottom run follows the edge direction in
/// the owner face's loop. Collapses duplicate corners; `None` when fewer
/// than three distinct corners remain.
fn side_face_verts(
    owner_face: &Face,
    edge: &Edge,
    level: Label,
    point_at: &dyn Fn(Label, Label) -> Label,
) -> Option<Face> {
    let (a, b) = match owner_face.edge_direction(edge) {
        1 => (edge.a(), edge.b()),
        -1 => (edge.b(), edge.a()),
        _ => return None,
    };
    let verts = Face::new([
        point_at(a, level - 1),
        point_at(b, level - 1),
        point_at(b, level),
        point_at(a, level),
    ])
    .collapsed();
    (verts.len() >= 3).then_some(verts)
}

/// Sum of the first `n` terms of the geometric series with ratio `r`,
/// starting at 1.
fn geometric_sum(r: f64, n: Label) -> f64 {
    if (r - 1.0).abs() < 1e-12 {
        f64::from(n)
    } else {
        (r.powi(n) - 1.0) / (r - 1.0)
    }
}

// =============================================================================
// TESTS
// =============================================================================
