//! The old↔new index map produced by a commit.
//!
//! For each of points, faces, and cells a [`MeshMap`] holds both directions
//! of the renumbering: `*_map[new]` is the pre-change mesh index that entity
//! came from ([`NONE`] for entities the journal created) and
//! `reverse_*_map[label]` is where a pre-change label went ([`NONE`] for
//! removed entities).
//!
//! The reverse tables are indexed by the journal's label space: the
//! pre-change mesh entities occupy `0..n_old_*` and the provisional labels
//! handed out by [`crate::topo::change::TopoChange::apply`] follow. An
//! algorithm that stored a provisional label during refinement can therefore
//! re-key it through the same reverse table as an old label; the explicit
//! `n_old_*` counts separate the two ranges when it matters.
//!
//! Beyond the renumbering, the map carries what field-mapping code needs to
//! transfer data onto the new topology: per new entity the pre-change
//! *master* it derives from (surviving entities master themselves; created
//! entities have their provenance chains resolved down to a pre-change
//! label, or [`NONE`] for underived ones), and per new face whether flux
//! data mapped onto it must change sign (the action-level flip combined with
//! any owner/neighbour reversal the commit performed).

use crate::geometry::point::{Label, NONE};
use serde::{Deserialize, Serialize};

/// Read-only renumbering between a mesh and its committed successor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshMap {
    n_old_points: usize,
    n_old_faces: usize,
    n_old_cells: usize,
    point_map: Vec<Label>,
    reverse_point_map: Vec<Label>,
    face_map: Vec<Label>,
    reverse_face_map: Vec<Label>,
    cell_map: Vec<Label>,
    reverse_cell_map: Vec<Label>,
    point_masters: Vec<Label>,
    face_masters: Vec<Label>,
    cell_masters: Vec<Label>,
    flux_flip: Vec<bool>,
}

impl MeshMap {
    /// Assemble a map from the old entity counts, the six renumbering
    /// tables, the per-new-entity master tables, and the per-new-face flux
    /// flips. Consistency between the directions is the producer's
    /// responsibility.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        n_old_points: usize,
        n_old_faces: usize,
        n_old_cells: usize,
        point_map: Vec<Label>,
        reverse_point_map: Vec<Label>,
        face_map: Vec<Label>,
        reverse_face_map: Vec<Label>,
        cell_map: Vec<Label>,
        reverse_cell_map: Vec<Label>,
        point_masters: Vec<Label>,
        face_masters: Vec<Label>,
        cell_masters: Vec<Label>,
        flux_flip: Vec<bool>,
    ) -> Self {
        Self {
            n_old_points,
            n_old_faces,
            n_old_cells,
            point_map,
            reverse_point_map,
            face_map,
            reverse_face_map,
            cell_map,
            reverse_cell_map,
            point_masters,
            face_masters,
            cell_masters,
            flux_flip,
        }
    }

    /// Number of points before the change.
    #[must_use]
    pub const fn n_old_points(&self) -> usize {
        self.n_old_points
    }

    /// Number of faces before the change.
    #[must_use]
    pub const fn n_old_faces(&self) -> usize {
        self.n_old_faces
    }

    /// Number of cells before the change.
    #[must_use]
    pub const fn n_old_cells(&self) -> usize {
        self.n_old_cells
    }

    /// Number of points after the change.
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.point_map.len()
    }

    /// Number of faces after the change.
    #[must_use]
    pub fn n_faces(&self) -> usize {
        self.face_map.len()
    }

    /// Number of cells after the change.
    #[must_use]
    pub fn n_cells(&self) -> usize {
        self.cell_map.len()
    }

    /// Old point behind new point `new`, or [`NONE`] for a created point.
    #[must_use]
    pub fn point_origin(&self, new: Label) -> Label {
        self.point_map[new as usize]
    }

    /// New index of point label `label` (old or provisional), or [`NONE`]
    /// when removed.
    #[must_use]
    pub fn new_point(&self, label: Label) -> Label {
        self.reverse_point_map[label as usize]
    }

    /// Old face behind new face `new`, or [`NONE`] for a created face.
    #[must_use]
    pub fn face_origin(&self, new: Label) -> Label {
        self.face_map[new as usize]
    }

    /// New index of face label `label` (old or provisional), or [`NONE`]
    /// when removed.
    #[must_use]
    pub fn new_face(&self, label: Label) -> Label {
        self.reverse_face_map[label as usize]
    }

    /// Old cell behind new cell `new`, or [`NONE`] for a created cell.
    #[must_use]
    pub fn cell_origin(&self, new: Label) -> Label {
        self.cell_map[new as usize]
    }

    /// New index of cell label `label` (old or provisional), or [`NONE`]
    /// when removed.
    #[must_use]
    pub fn new_cell(&self, label: Label) -> Label {
        self.reverse_cell_map[label as usize]
    }

    /// Pre-change point that data for new point `new` should be taken from:
    /// the point itself when it survived, its resolved master when created,
    /// [`NONE`] when underived.
    #[must_use]
    pub fn point_master(&self, new: Label) -> Label {
        self.point_masters[new as usize]
    }

    /// Pre-change face that data for new face `new` should be taken from.
    /// See [`MeshMap::point_master`].
    #[must_use]
    pub fn face_master(&self, new: Label) -> Label {
        self.face_masters[new as usize]
    }

    /// Pre-change cell that data for new cell `new` should be taken from.
    /// See [`MeshMap::point_master`].
    #[must_use]
    pub fn cell_master(&self, new: Label) -> Label {
        self.cell_masters[new as usize]
    }

    /// `true` when flux data mapped onto new face `new` must change sign.
    #[must_use]
    pub fn flux_flipped(&self, new: Label) -> bool {
        self.flux_flip[new as usize]
    }

    /// Forward point table (`new -> old`, [`NONE`] for created).
    #[must_use]
    pub fn point_map(&self) -> &[Label] {
        &self.point_map
    }

    /// Reverse point table (`old or provisional -> new`, [`NONE`] for
    /// removed).
    #[must_use]
    pub fn reverse_point_map(&self) -> &[Label] {
        &self.reverse_point_map
    }

    /// Forward face table (`new -> old`, [`NONE`] for created).
    #[must_use]
    pub fn face_map(&self) -> &[Label] {
        &self.face_map
    }

    /// Reverse face table (`old or provisional -> new`, [`NONE`] for
    /// removed).
    #[must_use]
    pub fn reverse_face_map(&self) -> &[Label] {
        &self.reverse_face_map
    }

    /// Forward cell table (`new -> old`, [`NONE`] for created).
    #[must_use]
    pub fn cell_map(&self) -> &[Label] {
        &self.cell_map
    }

    /// Reverse cell table (`old or provisional -> new`, [`NONE`] for
    /// removed).
    #[must_use]
    pub fn reverse_cell_map(&self) -> &[Label] {
        &self.reverse_cell_map
    }

    /// Per-new-point master table. See [`MeshMap::point_master`].
    #[must_use]
    pub fn point_masters(&self) -> &[Label] {
        &self.point_masters
    }

    /// Per-new-face master table. See [`MeshMap::face_master`].
    #[must_use]
    pub fn face_masters(&self) -> &[Label] {
        &self.face_masters
    }

    /// Per-new-cell master table. See [`MeshMap::cell_master`].
    #[must_use]
    pub fn cell_masters(&self) -> &[Label] {
        &self.cell_masters
    }

    /// Per-new-face flux flips. See [`MeshMap::flux_flipped`].
    #[must_use]
    pub fn flux_flips(&self) -> &[bool] {
        &self.flux_flip
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::MeshMap;
    use crate::geometry::point::NONE;

    #[test]
    fn test_round_trip_lookups() {
        // Three old points: point 1 removed, one new point appended with
        // provisional label 3, mastered by old point 0.
        let map = MeshMap::new(
            3,
            1,
            1,
            vec![0, 2, NONE],
            vec![0, NONE, 1, 2],
            vec![0],
            vec![0],
            vec![0],
            vec![0],
            vec![0, 2, 0],
            vec![0],
            vec![0],
            vec![false],
        );

        assert_eq!(map.n_old_points(), 3);
        assert_eq!(map.n_points(), 3);
        assert_eq!(map.point_origin(1), 2);
        assert_eq!(map.new_point(2), 1);
        assert_eq!(map.new_point(1), NONE);
        assert_eq!(map.point_origin(2), NONE);

        // The provisional label resolves to the created point's final index.
        assert_eq!(map.new_point(3), 2);

        // Surviving points master themselves; the created point masters its
        // pre-change source.
        assert_eq!(map.point_master(0), 0);
        assert_eq!(map.point_master(2), 0);
        assert!(!map.flux_flipped(0));

        // Surviving old points round-trip both ways.
        for old in 0..map.n_old_points() as i32 {
            let new = map.new_point(old);
            if new != NONE {
                assert_eq!(map.point_origin(new), old);
            }
        }
    }
}
