//! The topology-change journal and its commit protocol.
//!
//! A [`TopoChange`] is seeded from a [`PolyMesh`] snapshot and then fed an
//! ordered sequence of [`TopoAction`]s through [`TopoChange::apply`], which
//! hands back a provisional label for every added entity so that later
//! actions in the same batch can reference it (a freshly added cell as the
//! neighbour of a subsequently added face, and so on). Every mesh-editing
//! algorithm in the crate funnels through this one entry point.
//!
//! [`TopoChange::commit`] consumes the journal — a journal is spent exactly
//! once, enforced by move semantics — and produces the new mesh plus a
//! [`MeshMap`]. The commit:
//!
//! - compacts points and cells, dropping removed entities while preserving
//!   order;
//! - validates every surviving face (vertex loop size, live vertices, live
//!   owner) and fails fatally on dangling references — the journal is not
//!   validated incrementally, only action-locally and here;
//! - restores the owner<neighbour convention by reversing offending faces
//!   and swapping their cells (with flux/zone flip bookkeeping);
//! - orders faces upper-triangular — internal faces sorted by (owner,
//!   neighbour), then boundary faces grouped by patch — and rebuilds the
//!   patch table and all zones.
//!
//! A failed commit returns a [`CommitError`] and no mesh; there is no
//! partially-applied state to clean up.

use crate::geometry::point::{Label, Point, NONE};
use crate::mesh::face::Face;
use crate::mesh::poly_mesh::{MeshError, Patch, PolyMesh, Zone};
use crate::topo::action::{ActionError, TopoAction};
use crate::topo::map::MeshMap;
use thiserror::Error;
use tracing::debug;

/// Fatal defects detected while committing a journal.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommitError {
    /// A surviving face references a removed or unknown point.
    #[error("face {face} references removed or unknown point {point}")]
    DanglingVertex {
        /// Offending journal face label.
        face: Label,
        /// Offending point label.
        point: Label,
    },

    /// A surviving face references a removed or unknown cell.
    #[error("face {face} references removed or unknown cell {cell}")]
    DanglingCell {
        /// Offending journal face label.
        face: Label,
        /// Offending cell label.
        cell: Label,
    },

    /// A face with the same cell on both sides.
    #[error("face {face} has cell {cell} as both owner and neighbour")]
    OwnerIsNeighbour {
        /// Offending journal face label.
        face: Label,
        /// The duplicated cell.
        cell: Label,
    },

    /// A boundary face without a valid patch.
    #[error("boundary face {face} has patch {patch}, valid range 0..{n_patches}")]
    FaceWithoutPatch {
        /// Offending journal face label.
        face: Label,
        /// Patch label found.
        patch: Label,
        /// Number of patches.
        n_patches: usize,
    },

    /// The assembled mesh failed its own structural validation.
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

/// An ordered journal of topology actions against one mesh snapshot.
///
/// Zone bookkeeping note: the journal tracks at most one zone per entity.
/// When the seed mesh holds an entity in several (overlapping) zones, the
/// last zone in declaration order wins at seeding time.
#[derive(Clone, Debug)]
pub struct TopoChange {
    n_old_points: usize,
    n_old_faces: usize,
    n_old_cells: usize,

    points: Vec<Point>,
    point_master: Vec<Label>,
    point_origin: Vec<Label>,
    point_zone: Vec<Label>,
    point_removed: Vec<bool>,

    faces: Vec<Face>,
    face_owner: Vec<Label>,
    face_neighbour: Vec<Label>,
    face_origin: Vec<Label>,
    face_master: Vec<Label>,
    face_patch: Vec<Label>,
    face_zone: Vec<Label>,
    face_zone_flip: Vec<bool>,
    face_flip_flux: Vec<bool>,
    face_removed: Vec<bool>,

    cell_origin: Vec<Label>,
    cell_master: Vec<Label>,
    cell_zone: Vec<Label>,
    cell_removed: Vec<bool>,

    patch_names: Vec<String>,
    point_zone_names: Vec<String>,
    face_zone_names: Vec<String>,
    cell_zone_names: Vec<String>,

    n_actions: usize,
}

impl TopoChange {
    /// Start an empty journal over a mesh snapshot.
    #[must_use]
    pub fn new(mesh: &PolyMesh) -> Self {
        let n_points = mesh.n_points();
        let n_faces = mesh.n_faces();
        let n_cells = mesh.n_cells();

        let mut point_zone = vec![NONE; n_points];
        for (zi, z) in mesh.point_zones().iter().enumerate() {
            for &p in &z.entities {
                point_zone[p as usize] = zi as Label;
            }
        }
        let mut face_zone = vec![NONE; n_faces];
        let mut face_zone_flip = vec![false; n_faces];
        for (zi, z) in mesh.face_zones().iter().enumerate() {
            for (pos, &f) in z.entities.iter().enumerate() {
                face_zone[f as usize] = zi as Label;
                face_zone_flip[f as usize] = z.flips.get(pos).copied().unwrap_or(false);
            }
        }
        let mut cell_zone = vec![NONE; n_cells];
        for (zi, z) in mesh.cell_zones().iter().enumerate() {
            for &c in &z.entities {
                cell_zone[c as usize] = zi as Label;
            }
        }

        let face_patch = (0..n_faces as Label)
            .map(|f| mesh.which_patch(f))
            .collect();
        let face_neighbour = (0..n_faces as Label)
            .map(|f| mesh.neighbour_of(f))
            .collect();

        Self {
            n_old_points: n_points,
            n_old_faces: n_faces,
            n_old_cells: n_cells,

            points: mesh.points().to_vec(),
            point_master: (0..n_points as Label).collect(),
            point_origin: (0..n_points as Label).collect(),
            point_zone,
            point_removed: vec![false; n_points],

            faces: mesh.faces().to_vec(),
            face_owner: mesh.owner().to_vec(),
            face_neighbour,
            face_origin: (0..n_faces as Label).collect(),
            face_master: (0..n_faces as Label).collect(),
            face_patch,
            face_zone,
            face_zone_flip,
            face_flip_flux: vec![false; n_faces],
            face_removed: vec![false; n_faces],

            cell_origin: (0..n_cells as Label).collect(),
            cell_master: (0..n_cells as Label).collect(),
            cell_zone,
            cell_removed: vec![false; n_cells],

            patch_names: mesh.patches().iter().map(|p| p.name.clone()).collect(),
            point_zone_names: mesh.point_zones().iter().map(|z| z.name.clone()).collect(),
            face_zone_names: mesh.face_zones().iter().map(|z| z.name.clone()).collect(),
            cell_zone_names: mesh.cell_zones().iter().map(|z| z.name.clone()).collect(),

            n_actions: 0,
        }
    }

    /// Current number of points in the journal's label space (old plus
    /// provisional).
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    /// Current number of faces in the journal's label space.
    #[must_use]
    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    /// Current number of cells in the journal's label space.
    #[must_use]
    pub fn n_cells(&self) -> usize {
        self.cell_origin.len()
    }

    /// Append one action.
    ///
    /// Returns the label of the affected entity: for additions the newly
    /// assigned provisional label, usable as a reference by later actions in
    /// the same batch; for modify/remove actions the target's own label.
    ///
    /// # Errors
    ///
    /// [`ActionError`] when the action is malformed or targets a label the
    /// journal does not know. The journal is unchanged on error.
    pub fn apply(&mut self, action: TopoAction) -> Result<Label, ActionError> {
        action.validate()?;
        let label = match action {
            TopoAction::AddPoint {
                point,
                master_point,
                zone,
                ..
            } => {
                self.points.push(point);
                self.point_master.push(master_point);
                self.point_origin.push(NONE);
                self.point_zone.push(zone);
                self.point_removed.push(false);
                (self.points.len() - 1) as Label
            }

            TopoAction::ModifyPoint {
                point,
                position,
                zone,
            } => {
                self.check_label("point", point, self.points.len())?;
                self.points[point as usize] = position;
                if zone >= 0 {
                    self.point_zone[point as usize] = zone;
                }
                point
            }

            TopoAction::AddFace {
                verts,
                owner,
                neighbour,
                master_face,
                flip_flux,
                patch,
                zone,
                zone_flip,
                ..
            } => {
                self.faces.push(verts);
                self.face_owner.push(owner);
                self.face_neighbour.push(neighbour);
                self.face_origin.push(NONE);
                self.face_master.push(master_face);
                self.face_patch.push(patch);
                self.face_zone.push(zone);
                self.face_zone_flip.push(zone_flip);
                self.face_flip_flux.push(flip_flux);
                self.face_removed.push(false);
                (self.faces.len() - 1) as Label
            }

            TopoAction::ModifyFace {
                face,
                verts,
                owner,
                neighbour,
                flip_flux,
                patch,
                zone,
            } => {
                self.check_label("face", face, self.faces.len())?;
                let f = face as usize;
                self.faces[f] = verts;
                self.face_owner[f] = owner;
                self.face_neighbour[f] = neighbour;
                self.face_flip_flux[f] = flip_flux;
                if let Some(p) = patch {
                    self.face_patch[f] = p;
                }
                if let Some((z, flip)) = zone {
                    self.face_zone[f] = z;
                    self.face_zone_flip[f] = flip;
                }
                self.face_removed[f] = false;
                face
            }

            TopoAction::AddCell {
                master_cell, zone, ..
            } => {
                self.cell_origin.push(NONE);
                self.cell_master.push(master_cell);
                self.cell_zone.push(zone);
                self.cell_removed.push(false);
                (self.cell_origin.len() - 1) as Label
            }

            TopoAction::ModifyCell { cell, zone } => {
                self.check_label("cell", cell, self.cell_origin.len())?;
                if zone >= 0 {
                    self.cell_zone[cell as usize] = zone;
                }
                cell
            }

            TopoAction::RemovePoint { point, .. } => {
                self.check_label("point", point, self.points.len())?;
                self.point_removed[point as usize] = true;
                point
            }

            TopoAction::RemoveFace { face, .. } => {
                self.check_label("face", face, self.faces.len())?;
                self.face_removed[face as usize] = true;
                face
            }

            TopoAction::RemoveCell { cell, .. } => {
                self.check_label("cell", cell, self.cell_origin.len())?;
                self.cell_removed[cell as usize] = true;
                cell
            }
        };
        self.n_actions += 1;
        Ok(label)
    }

    fn check_label(&self, entity: &'static str, label: Label, size: usize) -> Result<(), ActionError> {
        if label < 0 || label as usize >= size {
            Err(ActionError::LabelOutOfRange {
                entity,
                label,
                size,
            })
        } else {
            Ok(())
        }
    }

    /// Commit the journal, producing the new mesh and the old↔new index
    /// map. Consumes the journal: a spent journal cannot be reused.
    ///
    /// # Errors
    ///
    /// [`CommitError`] on any dangling reference or patch defect; nothing is
    /// produced on error.
    pub fn commit(self) -> Result<(PolyMesh, MeshMap), CommitError> {
        debug!(
            n_actions = self.n_actions,
            points = self.points.len(),
            faces = self.faces.len(),
            cells = self.cell_origin.len(),
            "committing topology journal"
        );

        // Compact points and cells, preserving order.
        let mut point_renum = vec![NONE; self.points.len()];
        let mut new_points = Vec::with_capacity(self.points.len());
        let mut point_map = Vec::with_capacity(self.points.len());
        for (i, removed) in self.point_removed.iter().enumerate() {
            if !removed {
                point_renum[i] = new_points.len() as Label;
                new_points.push(self.points[i]);
                point_map.push(self.point_origin[i]);
            }
        }

        let mut cell_renum = vec![NONE; self.cell_origin.len()];
        let mut cell_map = Vec::with_capacity(self.cell_origin.len());
        for (i, removed) in self.cell_removed.iter().enumerate() {
            if !removed {
                cell_renum[i] = cell_map.len() as Label;
                cell_map.push(self.cell_origin[i]);
            }
        }

        // Renumber, orient, and partition the surviving faces.
        struct PendingFace {
            journal: Label,
            verts: Face,
            owner: Label,
            neighbour: Label,
        }
        let mut internal: Vec<PendingFace> = Vec::new();
        let mut boundary: Vec<PendingFace> = Vec::new();
        // Faces whose loop the commit itself reverses; combined with the
        // action-level flip for the map's flux table and with the zone flip
        // polarity below.
        let mut commit_flipped = vec![false; self.faces.len()];

        for (i, removed) in self.face_removed.iter().enumerate() {
            if *removed {
                continue;
            }
            let journal = i as Label;
            let f = &self.faces[i];
            for v in f.iter() {
                if v < 0 || point_renum[v as usize] == NONE {
                    return Err(CommitError::DanglingVertex {
                        face: journal,
                        point: v,
                    });
                }
            }
            let mut verts = f.renumbered(&point_renum);

            let own = self.face_owner[i];
            if own < 0 || own as usize >= cell_renum.len() || cell_renum[own as usize] == NONE {
                return Err(CommitError::DanglingCell {
                    face: journal,
                    cell: own,
                });
            }
            let mut owner = cell_renum[own as usize];

            let nei = self.face_neighbour[i];
            let mut neighbour = if nei < 0 {
                NONE
            } else {
                if nei as usize >= cell_renum.len() || cell_renum[nei as usize] == NONE {
                    return Err(CommitError::DanglingCell {
                        face: journal,
                        cell: nei,
                    });
                }
                cell_renum[nei as usize]
            };

            if neighbour != NONE {
                if owner == neighbour {
                    return Err(CommitError::OwnerIsNeighbour {
                        face: journal,
                        cell: owner,
                    });
                }
                if owner > neighbour {
                    // Restore the convention: reverse the loop so the normal
                    // still points from (new) owner to neighbour.
                    std::mem::swap(&mut owner, &mut neighbour);
                    verts = verts.reversed();
                    commit_flipped[i] = true;
                }
                internal.push(PendingFace {
                    journal,
                    verts,
                    owner,
                    neighbour,
                });
            } else {
                let patch = self.face_patch[i];
                if patch < 0 || patch as usize >= self.patch_names.len() {
                    return Err(CommitError::FaceWithoutPatch {
                        face: journal,
                        patch,
                        n_patches: self.patch_names.len(),
                    });
                }
                boundary.push(PendingFace {
                    journal,
                    verts,
                    owner,
                    neighbour: NONE,
                });
            }
        }

        internal.sort_by_key(|pf| (pf.owner, pf.neighbour, pf.journal));
        boundary.sort_by_key(|pf| (self.face_patch[pf.journal as usize], pf.journal));

        let n_internal = internal.len();
        let mut faces = Vec::with_capacity(n_internal + boundary.len());
        let mut owner = Vec::with_capacity(n_internal + boundary.len());
        let mut neighbour = Vec::with_capacity(n_internal);
        let mut face_map = Vec::with_capacity(n_internal + boundary.len());
        let mut face_renum = vec![NONE; self.faces.len()];

        for pf in &internal {
            face_renum[pf.journal as usize] = faces.len() as Label;
            face_map.push(self.face_origin[pf.journal as usize]);
            faces.push(pf.verts.clone());
            owner.push(pf.owner);
            neighbour.push(pf.neighbour);
        }

        let mut patches = Vec::with_capacity(self.patch_names.len());
        let mut cursor = n_internal as Label;
        let mut boundary_iter = boundary.iter().peekable();
        for (pi, name) in self.patch_names.iter().enumerate() {
            let start = cursor;
            while let Some(pf) =
                boundary_iter.next_if(|pf| self.face_patch[pf.journal as usize] == pi as Label)
            {
                face_renum[pf.journal as usize] = faces.len() as Label;
                face_map.push(self.face_origin[pf.journal as usize]);
                faces.push(pf.verts.clone());
                owner.push(pf.owner);
                cursor += 1;
            }
            patches.push(Patch::new(name.clone(), start, cursor - start));
        }

        // Rebuild zones from the per-entity labels, in new-index order.
        let point_zones = rebuild_zones(
            &self.point_zone_names,
            self.point_zone
                .iter()
                .enumerate()
                .filter(|&(i, _)| point_renum[i] != NONE)
                .map(|(i, &z)| (point_renum[i], z, false)),
        );
        let mut face_zone_members: Vec<(Label, Label, bool)> = (0..self.faces.len())
            .filter(|&i| face_renum[i] != NONE)
            .map(|i| {
                (
                    face_renum[i],
                    self.face_zone[i],
                    self.face_zone_flip[i] ^ commit_flipped[i],
                )
            })
            .collect();
        face_zone_members.sort_by_key(|&(new, _, _)| new);
        let face_zones = rebuild_zones(&self.face_zone_names, face_zone_members.into_iter());
        let cell_zones = rebuild_zones(
            &self.cell_zone_names,
            self.cell_zone
                .iter()
                .enumerate()
                .filter(|&(i, _)| cell_renum[i] != NONE)
                .map(|(i, &z)| (cell_renum[i], z, false)),
        );

        let mesh = PolyMesh::with_zones(
            new_points, faces, owner, neighbour, patches, point_zones, face_zones, cell_zones,
        )?;

        // Master tables for field mapping: surviving entities master
        // themselves, created ones have their provenance chains resolved
        // down to a pre-change label.
        let point_masters = (0..self.points.len())
            .filter(|&i| point_renum[i] != NONE)
            .map(|i| match self.point_origin[i] {
                NONE => resolve_master(&self.point_master, self.n_old_points, self.point_master[i]),
                origin => origin,
            })
            .collect();
        let cell_masters = (0..self.cell_origin.len())
            .filter(|&i| cell_renum[i] != NONE)
            .map(|i| match self.cell_origin[i] {
                NONE => resolve_master(&self.cell_master, self.n_old_cells, self.cell_master[i]),
                origin => origin,
            })
            .collect();

        let mut face_masters = vec![NONE; mesh.n_faces()];
        let mut flux_flip = vec![false; mesh.n_faces()];
        for (i, &new) in face_renum.iter().enumerate() {
            if new == NONE {
                continue;
            }
            face_masters[new as usize] = match self.face_origin[i] {
                NONE => resolve_master(&self.face_master, self.n_old_faces, self.face_master[i]),
                origin => origin,
            };
            flux_flip[new as usize] = self.face_flip_flux[i] ^ commit_flipped[i];
        }

        let map = MeshMap::new(
            self.n_old_points,
            self.n_old_faces,
            self.n_old_cells,
            point_map,
            point_renum,
            face_map,
            face_renum,
            cell_map,
            cell_renum,
            point_masters,
            face_masters,
            cell_masters,
            flux_flip,
        );

        debug!(
            points = mesh.n_points(),
            faces = mesh.n_faces(),
            cells = mesh.n_cells(),
            "journal committed"
        );

        Ok((mesh, map))
    }
}

/// Follow a same-kind provenance chain from `label` down to a pre-change
/// label, or [`NONE`]. Added entities may be mastered by other added
/// entities (extrusion chains each point to the layer below); the hop cap
/// turns a pathological cycle into "underived" instead of a hang.
fn resolve_master(masters: &[Label], n_old: usize, mut label: Label) -> Label {
    let mut hops = 0;
    while label >= n_old as Label {
        label = masters.get(label as usize).copied().unwrap_or(NONE);
        hops += 1;
        if hops > masters.len() {
            return NONE;
        }
    }
    if label < 0 {
        NONE
    } else {
        label
    }
}

/// Collect `(new_index, zone, flip)` rows into per-zone entity lists.
/// Rows must arrive in ascending `new_index` order per zone.
fn rebuild_zones<I>(names: &[String], members: I) -> Vec<Zone>
where
    I: Iterator<Item = (Label, Label, bool)>,
{
    let mut zones: Vec<Zone> = names.iter().map(Zone::named).collect();
    for (new, zone, flip) in members {
        if zone >= 0 && (zone as usize) < zones.len() {
            let z = &mut zones[zone as usize];
            z.entities.push(new);
            z.flips.push(flip);
        }
    }
    zones
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::{CommitError, TopoChange};
    use crate::geometry::point::{Point, NONE};
    use crate::mesh::face::Face;
    use crate::mesh::poly_mesh::{PolyMesh, Zone};
    use crate::topo::action::{ActionError, TopoAction};

    #[test]
    fn test_identity_commit() {
        let mesh = PolyMesh::block(2, 2, 2, [1.0, 1.0, 1.0]).unwrap();
        let journal = TopoChange::new(&mesh);
        let (out, map) = journal.commit().unwrap();

        assert_eq!(out.n_points(), mesh.n_points());
        assert_eq!(out.n_faces(), mesh.n_faces());
        assert_eq!(out.n_cells(), mesh.n_cells());
        for f in 0..mesh.n_faces() as i32 {
            assert_eq!(map.new_face(f), f);
            assert_eq!(map.face_origin(f), f);
        }
        assert_eq!(out.patches(), mesh.patches());
    }

    #[test]
    fn test_add_point_and_cell_round_trip() {
        let mesh = PolyMesh::hex_block([1.0, 1.0, 1.0]).unwrap();
        let mut journal = TopoChange::new(&mesh);

        let p = journal
            .apply(TopoAction::add_point(Point::new(0.5, 0.5, 0.5), 0, NONE, true).unwrap())
            .unwrap();
        assert_eq!(p, 8);

        let c = journal
            .apply(TopoAction::add_cell(NONE, NONE, NONE, 0, NONE))
            .unwrap();
        assert_eq!(c, 1);

        // Tie the new point and cell into the mesh so the commit is
        // consistent: split the zMin face region crudely by a new internal
        // triangle fan is overkill here; instead just reuse the new cell as
        // neighbour of a new internal face between existing points and the
        // new point.
        let f = journal
            .apply(
                TopoAction::add_face(
                    Face::new([0, 1, p]),
                    0,
                    c,
                    NONE,
                    NONE,
                    NONE,
                    false,
                    NONE,
                    NONE,
                    false,
                )
                .unwrap(),
            )
            .unwrap();
        assert_eq!(f as usize, mesh.n_faces());

        let (out, map) = journal.commit().unwrap();
        assert_eq!(out.n_points(), 9);
        assert_eq!(out.n_cells(), 2);
        assert_eq!(out.n_internal_faces(), 1);

        // Provisional labels resolve through the reverse maps.
        assert_eq!(map.point_origin(map.new_point(p)), NONE);
        assert_eq!(map.new_cell(c), 1);
        // The added internal face sorts ahead of the boundary faces.
        assert_eq!(map.new_face(f), 0);
    }

    #[test]
    fn test_commit_flips_misordered_internal_face() {
        let mesh = PolyMesh::hex_block([1.0, 1.0, 1.0]).unwrap();
        let mut journal = TopoChange::new(&mesh);

        let p = journal
            .apply(TopoAction::add_point(Point::new(0.5, 0.5, 0.5), 0, NONE, true).unwrap())
            .unwrap();
        let c = journal
            .apply(TopoAction::add_cell(NONE, NONE, NONE, 0, NONE))
            .unwrap();

        // Deliberately misordered: owner is the higher cell label.
        let f = journal
            .apply(
                TopoAction::add_face(
                    Face::new([0, 1, p]),
                    c,
                    0,
                    NONE,
                    NONE,
                    NONE,
                    false,
                    NONE,
                    NONE,
                    false,
                )
                .unwrap(),
            )
            .unwrap();

        let (out, map) = journal.commit().unwrap();
        let nf = map.new_face(f);
        assert_eq!(out.owner()[nf as usize], 0);
        assert_eq!(out.neighbour()[nf as usize], 1);
        // The loop was reversed along with the swap, so mapped flux data
        // must change sign; the untouched boundary faces keep theirs.
        assert_eq!(out.faces()[nf as usize].verts(), &[8, 1, 0]);
        assert!(map.flux_flipped(nf));
        for bf in out.n_internal_faces()..out.n_faces() {
            assert!(!map.flux_flipped(bf as i32));
        }
    }

    #[test]
    fn test_remove_cell_leaves_dangling_face() {
        let mesh = PolyMesh::block(2, 1, 1, [2.0, 1.0, 1.0]).unwrap();
        let mut journal = TopoChange::new(&mesh);
        journal
            .apply(TopoAction::RemoveCell {
                cell: 1,
                merge_cell: NONE,
            })
            .unwrap();

        let err = journal.commit().unwrap_err();
        assert!(matches!(err, CommitError::DanglingCell { .. }));
    }

    #[test]
    fn test_remove_cell_with_faces_cleaned_up() {
        let mesh = PolyMesh::block(2, 1, 1, [2.0, 1.0, 1.0]).unwrap();
        let mut journal = TopoChange::new(&mesh);
        journal
            .apply(TopoAction::RemoveCell {
                cell: 1,
                merge_cell: NONE,
            })
            .unwrap();

        // Drop or retarget every face of cell 1: the internal face becomes a
        // boundary face of patch xMax (patch 1), faces owned by cell 1 are
        // removed along with their now-unused points.
        for &f in mesh.cell_faces(1) {
            if mesh.is_internal_face(f) {
                let verts = mesh.faces()[f as usize].clone();
                journal
                    .apply(
                        TopoAction::modify_face(f, verts, 0, NONE, false, Some(1), None).unwrap(),
                    )
                    .unwrap();
            } else {
                journal
                    .apply(TopoAction::RemoveFace {
                        face: f,
                        merge_face: NONE,
                    })
                    .unwrap();
            }
        }
        for p in 0..mesh.n_points() as i32 {
            let still_used = mesh
                .point_faces(p)
                .iter()
                .any(|&f| mesh.owner_of(f) == 0 || mesh.neighbour_of(f) == 0);
            if !still_used {
                journal
                    .apply(TopoAction::RemovePoint {
                        point: p,
                        merge_point: NONE,
                    })
                    .unwrap();
            }
        }

        let (out, map) = journal.commit().unwrap();
        assert_eq!(out.n_cells(), 1);
        assert_eq!(out.n_points(), 8);
        assert_eq!(out.n_internal_faces(), 0);
        assert_eq!(out.n_faces(), 6);
        assert_eq!(map.new_cell(1), NONE);

        // Patch sizes re-tallied: xMax took over the old internal face.
        let x_max = &out.patches()[1];
        assert_eq!(x_max.name, "xMax");
        assert_eq!(x_max.size, 1);
    }

    #[test]
    fn test_apply_rejects_unknown_labels() {
        let mesh = PolyMesh::hex_block([1.0, 1.0, 1.0]).unwrap();
        let mut journal = TopoChange::new(&mesh);
        let err = journal
            .apply(TopoAction::RemoveFace {
                face: 99,
                merge_face: NONE,
            })
            .unwrap_err();
        assert!(matches!(err, ActionError::LabelOutOfRange { .. }));
    }

    #[test]
    fn test_commit_rejects_boundary_face_without_patch() {
        let mesh = PolyMesh::hex_block([1.0, 1.0, 1.0]).unwrap();
        let mut journal = TopoChange::new(&mesh);
        // New boundary face with no patch assigned.
        journal
            .apply(
                TopoAction::add_face(
                    Face::new([0, 1, 2]),
                    0,
                    NONE,
                    NONE,
                    NONE,
                    NONE,
                    false,
                    NONE,
                    NONE,
                    false,
                )
                .unwrap(),
            )
            .unwrap();
        let err = journal.commit().unwrap_err();
        assert!(matches!(err, CommitError::FaceWithoutPatch { .. }));
    }

    #[test]
    fn test_zone_rebuild_through_commit() {
        let mesh = PolyMesh::hex_block([1.0, 1.0, 1.0]).unwrap();
        let mut journal = TopoChange::new(&mesh);
        // Mesh has no zones: zone labels on actions are dropped gracefully.
        journal
            .apply(TopoAction::ModifyCell { cell: 0, zone: 5 })
            .unwrap();
        let (out, _) = journal.commit().unwrap();
        assert!(out.cell_zones().is_empty());
    }

    #[test]
    fn test_commit_reversal_toggles_zone_flip() {
        let base = PolyMesh::hex_block([1.0, 1.0, 1.0]).unwrap();
        let mesh = PolyMesh::with_zones(
            base.points().to_vec(),
            base.faces().to_vec(),
            base.owner().to_vec(),
            base.neighbour().to_vec(),
            base.patches().to_vec(),
            Vec::new(),
            vec![Zone::named("interface")],
            Vec::new(),
        )
        .unwrap();

        let mut journal = TopoChange::new(&mesh);
        let p = journal
            .apply(TopoAction::add_point(Point::new(0.5, 0.5, 0.5), 0, NONE, true).unwrap())
            .unwrap();
        let c = journal
            .apply(TopoAction::add_cell(NONE, NONE, NONE, 0, NONE))
            .unwrap();

        // Misordered zoned face: the commit swap must invert its polarity
        // within the zone.
        let f = journal
            .apply(
                TopoAction::add_face(
                    Face::new([0, 1, p]),
                    c,
                    0,
                    NONE,
                    NONE,
                    NONE,
                    false,
                    NONE,
                    0,
                    false,
                )
                .unwrap(),
            )
            .unwrap();

        let (out, map) = journal.commit().unwrap();
        let nf = map.new_face(f);
        let zone = &out.face_zones()[0];
        let pos = zone.entities.iter().position(|&z| z == nf).unwrap();
        assert!(zone.flips[pos]);
    }

    #[test]
    fn test_masters_resolve_through_chains() {
        let mesh = PolyMesh::hex_block([1.0, 1.0, 1.0]).unwrap();
        let mut journal = TopoChange::new(&mesh);

        // A two-link chain: the second point's master is the first added
        // point, which in turn derives from old point 3.
        let p0 = journal
            .apply(TopoAction::add_point(Point::new(0.5, 0.5, 0.5), 3, NONE, true).unwrap())
            .unwrap();
        let p1 = journal
            .apply(TopoAction::add_point(Point::new(0.5, 0.5, 0.7), p0, NONE, true).unwrap())
            .unwrap();
        let c = journal
            .apply(TopoAction::add_cell(NONE, NONE, NONE, 0, NONE))
            .unwrap();
        journal
            .apply(
                TopoAction::add_face(
                    Face::new([p0, p1, 0]),
                    0,
                    c,
                    NONE,
                    NONE,
                    NONE,
                    false,
                    NONE,
                    NONE,
                    false,
                )
                .unwrap(),
            )
            .unwrap();

        let (_, map) = journal.commit().unwrap();
        assert_eq!(map.point_master(map.new_point(p0)), 3);
        assert_eq!(map.point_master(map.new_point(p1)), 3);
        assert_eq!(map.cell_master(map.new_cell(c)), 0);
        // Surviving entities master themselves.
        assert_eq!(map.point_master(map.new_point(2)), 2);
        assert_eq!(map.cell_master(map.new_cell(0)), 0);
    }
}
