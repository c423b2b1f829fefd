//! Splitting cells into pyramids around a midpoint.
//!
//! [`CellSplitter::set_refinement`] decomposes each requested cell into one
//! pyramid per cell face, all meeting at a new apex point: an N-face cell
//! becomes N cells (the original cell label is reused for the first pyramid,
//! N-1 cells are added) joined by one new triangular internal face per cell
//! edge. Pre-existing faces of the cell are re-keyed onto their pyramid via
//! `ModifyFace` actions.
//!
//! The splitter only generates journal entries; the caller commits the
//! journal and then calls [`CellSplitter::update_mesh`] to re-key the
//! cell→apex bookkeeping onto the new numbering.
//!
//! Degenerate (zero-length) edges produce degenerate triangular faces; this
//! is left to downstream mesh-quality checking, not validated here.

use crate::collections::{fast_hash_map_with_capacity, FastHashMap, FastHashSet};
use crate::geometry::point::{Label, Point, NONE};
use crate::mesh::face::Face;
use crate::mesh::poly_mesh::PolyMesh;
use crate::topo::action::{ActionError, TopoAction};
use crate::topo::change::TopoChange;
use crate::topo::map::MeshMap;
use tracing::debug;

/// Generates the journal entries that split cells into pyramids.
#[derive(Debug)]
pub struct CellSplitter<'m> {
    mesh: &'m PolyMesh,
    /// Split cell -> apex point label (provisional until
    /// [`CellSplitter::update_mesh`] re-keys it).
    added_points: FastHashMap<Label, Label>,
}

impl<'m> CellSplitter<'m> {
    /// A splitter reading connectivity from `mesh`.
    #[must_use]
    pub fn new(mesh: &'m PolyMesh) -> Self {
        Self {
            mesh,
            added_points: FastHashMap::default(),
        }
    }

    /// The cell→apex-point bookkeeping of the last
    /// [`CellSplitter::set_refinement`], re-keyed by
    /// [`CellSplitter::update_mesh`] after each commit.
    #[must_use]
    pub fn added_points(&self) -> &FastHashMap<Label, Label> {
        &self.added_points
    }

    /// Midpoint map placing each requested cell's apex at its geometric
    /// centre.
    #[must_use]
    pub fn cell_centre_mid_points(mesh: &PolyMesh, cells: &[Label]) -> FastHashMap<Label, Point> {
        cells.iter().map(|&c| (c, mesh.cell_centre(c))).collect()
    }

    /// Emit the split of every cell in `cell_to_mid_point` (cell label →
    /// apex position) into `journal`. The journal must be seeded from the
    /// same mesh this splitter reads.
    ///
    /// # Errors
    ///
    /// [`ActionError::CellNotClosed`] when a requested cell's faces do not
    /// close around one of its edges; label-range errors when
    /// `cell_to_mid_point` references unknown cells.
    pub fn set_refinement(
        &mut self,
        cell_to_mid_point: &FastHashMap<Label, Point>,
        journal: &mut TopoChange,
    ) -> Result<(), ActionError> {
        self.added_points.clear();

        // Hash order is not deterministic; split in ascending cell order so
        // provisional labels are reproducible.
        let mut cells: Vec<Label> = cell_to_mid_point.keys().copied().collect();
        cells.sort_unstable();

        for &c in &cells {
            if c < 0 || c as usize >= self.mesh.n_cells() {
                return Err(ActionError::LabelOutOfRange {
                    entity: "cell",
                    label: c,
                    size: self.mesh.n_cells(),
                });
            }
        }

        // One apex point per split cell, anchored to an existing cell point.
        for &c in &cells {
            let anchor = self.mesh.cell_points(c)[0];
            let apex = journal.apply(TopoAction::add_point(
                cell_to_mid_point[&c],
                anchor,
                NONE,
                true,
            )?)?;
            self.added_points.insert(c, apex);
        }

        // One pyramid per cell face; the original cell label serves as the
        // pyramid of the first face.
        let mut pyramids: FastHashMap<Label, Vec<Label>> = fast_hash_map_with_capacity(cells.len());
        for &c in &cells {
            let zone = self.mesh.which_cell_zone(c);
            let faces = self.mesh.cell_faces(c);
            let mut cell_pyramids = Vec::with_capacity(faces.len());
            cell_pyramids.push(c);
            for _ in 1..faces.len() {
                cell_pyramids.push(journal.apply(TopoAction::add_cell(NONE, NONE, NONE, c, zone))?);
            }
            pyramids.insert(c, cell_pyramids);
        }

        // One triangular internal face per cell edge, between the pyramids
        // of the two cell faces sharing the edge.
        let mut n_new_faces = 0usize;
        for &c in &cells {
            let apex = self.added_points[&c];
            let cell_faces = self.mesh.cell_faces(c);
            let cell_pyramids = &pyramids[&c];

            for e in self.mesh.cell_edges(c) {
                let (f0, f1) =
                    self.mesh
                        .cell_edge_faces(c, &e)
                        .ok_or(ActionError::CellNotClosed {
                            cell: c,
                            n_faces: self
                                .mesh
                                .cell_faces(c)
                                .iter()
                                .filter(|&&f| {
                                    self.mesh.faces()[f as usize].edge_direction(&e) != 0
                                })
                                .count(),
                        })?;

                let pyramid_of = |f: Label| {
                    let pos = cell_faces.iter().position(|&cf| cf == f).unwrap_or(0);
                    cell_pyramids[pos]
                };
                let p0 = pyramid_of(f0);
                let p1 = pyramid_of(f1);
                let (owner, neighbour, owner_face) =
                    if p0 < p1 { (p0, p1, f0) } else { (p1, p0, f1) };

                // Wind the triangle so its normal leaves the owner pyramid:
                // take the edge direction within the owner pyramid's base
                // face as seen from the split cell, and traverse the edge
                // the opposite way.
                let stored_dir = self.mesh.faces()[owner_face as usize].edge_direction(&e);
                let seen_from_cell = if self.mesh.owner_of(owner_face) == c {
                    stored_dir
                } else {
                    -stored_dir
                };
                let verts = if seen_from_cell > 0 {
                    Face::new([e.b(), e.a(), apex])
                } else {
                    Face::new([e.a(), e.b(), apex])
                };

                journal.apply(TopoAction::add_face(
                    verts,
                    owner,
                    neighbour,
                    e.a(),
                    NONE,
                    NONE,
                    false,
                    NONE,
                    NONE,
                    false,
                )?)?;
                n_new_faces += 1;
            }
        }

        // Re-key every pre-existing face of the split cells onto its
        // pyramid, restoring owner<neighbour where the renumbering breaks
        // it.
        let mut affected: FastHashSet<Label> = FastHashSet::default();
        for &c in &cells {
            affected.extend(self.mesh.cell_faces(c).iter().copied());
        }
        let mut affected: Vec<Label> = affected.into_iter().collect();
        affected.sort_unstable();

        for &f in &affected {
            let pyramid_side = |cell: Label| -> Label {
                match pyramids.get(&cell) {
                    Some(cell_pyramids) => {
                        let pos = self
                            .mesh
                            .cell_faces(cell)
                            .iter()
                            .position(|&cf| cf == f)
                            .unwrap_or(0);
                        cell_pyramids[pos]
                    }
                    None => cell,
                }
            };

            let mut owner = pyramid_side(self.mesh.owner_of(f));
            let old_neighbour = self.mesh.neighbour_of(f);
            let mut verts = self.mesh.faces()[f as usize].clone();
            let mut flip = false;

            let neighbour = if old_neighbour == NONE {
                NONE
            } else {
                let mut neighbour = pyramid_side(old_neighbour);
                if owner > neighbour {
                    std::mem::swap(&mut owner, &mut neighbour);
                    verts = verts.reversed();
                    flip = true;
                }
                neighbour
            };

            // Boundary faces keep their patch/zone metadata (`None`
            // overrides); internal faces stay internal.
            journal.apply(TopoAction::modify_face(
                f, verts, owner, neighbour, flip, None, None,
            )?)?;
        }

        debug!(
            cells = cells.len(),
            new_faces = n_new_faces,
            modified_faces = affected.len(),
            "cell split refinement queued"
        );

        Ok(())
    }

    /// Re-key the cell→apex bookkeeping through a commit's map, dropping
    /// entries whose cell or point did not survive.
    pub fn update_mesh(&mut self, map: &MeshMap) {
        let mut rekeyed = FastHashMap::default();
        for (&cell, &point) in &self.added_points {
            let new_cell = map.new_cell(cell);
            let new_point = map.new_point(point);
            if new_cell != NONE && new_point != NONE {
                rekeyed.insert(new_cell, new_point);
            }
        }
        self.added_points = rekeyed;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::CellSplitter;
    use crate::collections::FastHashMap;
    use crate::geometry::point::Point;
    use crate::mesh::poly_mesh::PolyMesh;
    use crate::topo::change::TopoChange;

    #[test]
    fn test_hex_split_action_counts() {
        let mesh = PolyMesh::hex_block([1.0, 1.0, 1.0]).unwrap();
        let mut journal = TopoChange::new(&mesh);
        let mut splitter = CellSplitter::new(&mesh);

        let mids = CellSplitter::cell_centre_mid_points(&mesh, &[0]);
        splitter.set_refinement(&mids, &mut journal).unwrap();

        // Hex: 1 apex point, 5 added cells, 12 added faces, 6 modified.
        assert_eq!(splitter.added_points().len(), 1);
        assert_eq!(journal.n_points(), mesh.n_points() + 1);
        assert_eq!(journal.n_cells(), mesh.n_cells() + 5);
        assert_eq!(journal.n_faces(), mesh.n_faces() + 12);
    }

    #[test]
    fn test_unknown_cell_rejected() {
        let mesh = PolyMesh::hex_block([1.0, 1.0, 1.0]).unwrap();
        let mut journal = TopoChange::new(&mesh);
        let mut splitter = CellSplitter::new(&mesh);

        let mut mids = FastHashMap::default();
        mids.insert(7, Point::zero());
        assert!(splitter.set_refinement(&mids, &mut journal).is_err());
    }

    #[test]
    fn test_update_mesh_rekeys_apex() {
        let mesh = PolyMesh::hex_block([1.0, 1.0, 1.0]).unwrap();
        let mut journal = TopoChange::new(&mesh);
        let mut splitter = CellSplitter::new(&mesh);

        let mids = CellSplitter::cell_centre_mid_points(&mesh, &[0]);
        splitter.set_refinement(&mids, &mut journal).unwrap();
        let (_, map) = journal.commit().unwrap();
        splitter.update_mesh(&map);

        // Nothing was removed: cell 0 still keys the apex, now at its final
        // point index.
        assert_eq!(splitter.added_points().len(), 1);
        assert_eq!(splitter.added_points()[&0], 8);
    }
}
