//! Primitive mesh-edit actions.
//!
//! A [`TopoAction`] is one atomic instruction — add, modify, or remove a
//! point, face, or cell — queued in a [`crate::topo::change::TopoChange`]
//! journal before commit. Each action carries the defining data of its
//! entity plus provenance: the master point/edge/face/cell it derives from
//! ([`NONE`](crate::geometry::point::NONE) when underived), which downstream
//! data-mapping uses to seed values on created entities.
//!
//! Actions are validated on construction (and again when applied): an
//! instruction that could never commit — an orphan point supported by
//! neither zone nor cell, a two-vertex face, a face without an owner — is
//! rejected immediately rather than poisoning the journal.

use crate::geometry::point::{Label, Point, NONE};
use crate::mesh::face::Face;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejection of a malformed action or of violated algorithm preconditions.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    /// A point supported by neither a zone nor a cell would be referenced by
    /// nothing.
    #[error("added point has no zone and does not support a cell")]
    OrphanPoint,

    /// A face needs at least three vertices.
    #[error("face has {n_verts} vertices; a face needs at least 3")]
    FaceTooSmall {
        /// Vertex count found.
        n_verts: usize,
    },

    /// Every face must have an owner cell.
    #[error("face has no owner cell")]
    MissingOwner,

    /// A face vertex label is negative.
    #[error("face references negative point label {point}")]
    NegativeVertex {
        /// Offending label.
        point: Label,
    },

    /// An action targets an entity the journal does not know.
    #[error("{entity} label {label} outside 0..{size}")]
    LabelOutOfRange {
        /// Entity kind ("point", "face", or "cell").
        entity: &'static str,
        /// Offending label.
        label: Label,
        /// Valid range end.
        size: usize,
    },

    /// A per-entity argument array of the wrong length.
    #[error("{what} has {found} entries, expected {expected}")]
    ArgumentSize {
        /// Which argument.
        what: &'static str,
        /// Required length.
        expected: usize,
        /// Supplied length.
        found: usize,
    },

    /// A displaced patch point whose faces disagree on edge orientation.
    ///
    /// Layer extrusion requires zero displacement at non-manifold points;
    /// this is the defensive check for that precondition.
    #[error("patch point {point} is non-manifold but has non-zero displacement")]
    NonManifoldPoint {
        /// Offending local patch point.
        point: Label,
    },

    /// Per-point layer counts must equal the maximum over the faces sharing
    /// the point.
    #[error(
        "patch point {point} has {n_point_layers} layers but its faces peak at {n_face_layers}"
    )]
    LayerCountMismatch {
        /// Offending local patch point.
        point: Label,
        /// Supplied per-point count.
        n_point_layers: Label,
        /// Maximum per-face count over the faces using the point.
        n_face_layers: Label,
    },

    /// A cell whose faces do not close around one of its edges.
    #[error("cell {cell} is not closed: edge shared by {n_faces} of its faces")]
    CellNotClosed {
        /// Offending cell.
        cell: Label,
        /// Number of cell faces found on the edge.
        n_faces: usize,
    },
}

/// One atomic mesh-edit instruction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TopoAction {
    /// Append a point.
    AddPoint {
        /// Position.
        point: Point,
        /// Point this one derives from, or [`NONE`].
        master_point: Label,
        /// Point zone, or [`NONE`].
        zone: Label,
        /// `true` when the point will support a cell.
        in_cell: bool,
    },

    /// Move and/or re-zone an existing point.
    ModifyPoint {
        /// Target point.
        point: Label,
        /// New position.
        position: Point,
        /// New point zone, or [`NONE`] to leave all zones.
        zone: Label,
    },

    /// Append a face.
    AddFace {
        /// Vertex loop, wound from owner towards neighbour.
        verts: Face,
        /// Owner cell.
        owner: Label,
        /// Neighbour cell, or [`NONE`] for a boundary face.
        neighbour: Label,
        /// Master point, or [`NONE`].
        master_point: Label,
        /// Master edge encoded as a face-independent provenance label, or
        /// [`NONE`].
        master_edge: Label,
        /// Face this one derives from, or [`NONE`].
        master_face: Label,
        /// `true` when flux data mapped onto the face must change sign.
        flip_flux: bool,
        /// Boundary patch, or [`NONE`] for internal faces.
        patch: Label,
        /// Face zone, or [`NONE`].
        zone: Label,
        /// Orientation relative to the zone's reference orientation.
        zone_flip: bool,
    },

    /// Rewrite an existing face.
    ModifyFace {
        /// Target face.
        face: Label,
        /// New vertex loop.
        verts: Face,
        /// New owner cell.
        owner: Label,
        /// New neighbour cell, or [`NONE`] for a boundary face.
        neighbour: Label,
        /// `true` when flux data mapped onto the face must change sign.
        flip_flux: bool,
        /// Patch override; `None` keeps the face's current patch (ignored
        /// when the face is internal).
        patch: Option<Label>,
        /// Zone override with flip polarity; `None` keeps the current zone.
        zone: Option<(Label, bool)>,
    },

    /// Append a cell.
    AddCell {
        /// Master point, or [`NONE`].
        master_point: Label,
        /// Master edge provenance label, or [`NONE`].
        master_edge: Label,
        /// Master face, or [`NONE`].
        master_face: Label,
        /// Cell this one derives from, or [`NONE`].
        master_cell: Label,
        /// Cell zone, or [`NONE`].
        zone: Label,
    },

    /// Re-zone an existing cell.
    ModifyCell {
        /// Target cell.
        cell: Label,
        /// New cell zone, or [`NONE`] to leave all zones.
        zone: Label,
    },

    /// Remove a point.
    RemovePoint {
        /// Target point.
        point: Label,
        /// Point absorbing the removed point's data, or [`NONE`].
        merge_point: Label,
    },

    /// Remove a face.
    RemoveFace {
        /// Target face.
        face: Label,
        /// Face absorbing the removed face's data, or [`NONE`].
        merge_face: Label,
    },

    /// Remove a cell.
    RemoveCell {
        /// Target cell.
        cell: Label,
        /// Cell absorbing the removed cell's data, or [`NONE`].
        merge_cell: Label,
    },
}

impl TopoAction {
    /// Add a point.
    ///
    /// # Errors
    ///
    /// [`ActionError::OrphanPoint`] when `zone` is [`NONE`] and `in_cell` is
    /// `false`: such a point would be referenced by nothing.
    pub fn add_point(
        point: Point,
        master_point: Label,
        zone: Label,
        in_cell: bool,
    ) -> Result<Self, ActionError> {
        let action = Self::AddPoint {
            point,
            master_point,
            zone,
            in_cell,
        };
        action.validate()?;
        Ok(action)
    }

    /// Add a face.
    ///
    /// # Errors
    ///
    /// [`ActionError::FaceTooSmall`], [`ActionError::MissingOwner`], or
    /// [`ActionError::NegativeVertex`] for structurally hopeless faces.
    #[allow(clippy::too_many_arguments)]
    pub fn add_face(
        verts: Face,
        owner: Label,
        neighbour: Label,
        master_point: Label,
        master_edge: Label,
        master_face: Label,
        flip_flux: bool,
        patch: Label,
        zone: Label,
        zone_flip: bool,
    ) -> Result<Self, ActionError> {
        let action = Self::AddFace {
            verts,
            owner,
            neighbour,
            master_point,
            master_edge,
            master_face,
            flip_flux,
            patch,
            zone,
            zone_flip,
        };
        action.validate()?;
        Ok(action)
    }

    /// Rewrite a face.
    ///
    /// # Errors
    ///
    /// As for [`TopoAction::add_face`].
    pub fn modify_face(
        face: Label,
        verts: Face,
        owner: Label,
        neighbour: Label,
        flip_flux: bool,
        patch: Option<Label>,
        zone: Option<(Label, bool)>,
    ) -> Result<Self, ActionError> {
        let action = Self::ModifyFace {
            face,
            verts,
            owner,
            neighbour,
            flip_flux,
            patch,
            zone,
        };
        action.validate()?;
        Ok(action)
    }

    /// Add a cell.
    #[must_use]
    pub const fn add_cell(
        master_point: Label,
        master_edge: Label,
        master_face: Label,
        master_cell: Label,
        zone: Label,
    ) -> Self {
        Self::AddCell {
            master_point,
            master_edge,
            master_face,
            master_cell,
            zone,
        }
    }

    /// Structural validity of the action in isolation (label ranges are the
    /// journal's concern).
    ///
    /// # Errors
    ///
    /// The first [`ActionError`] the action's data violates.
    pub fn validate(&self) -> Result<(), ActionError> {
        match self {
            Self::AddPoint { zone, in_cell, .. } => {
                if *zone < 0 && !in_cell {
                    return Err(ActionError::OrphanPoint);
                }
            }
            Self::AddFace {
                verts,
                owner,
                neighbour,
                ..
            }
            | Self::ModifyFace {
                verts,
                owner,
                neighbour,
                ..
            } => {
                if verts.len() < 3 {
                    return Err(ActionError::FaceTooSmall {
                        n_verts: verts.len(),
                    });
                }
                if let Some(v) = verts.iter().find(|&v| v < 0) {
                    return Err(ActionError::NegativeVertex { point: v });
                }
                if *owner < 0 {
                    return Err(ActionError::MissingOwner);
                }
                let _ = neighbour;
            }
            _ => {}
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::{ActionError, TopoAction};
    use crate::geometry::point::{Point, NONE};
    use crate::mesh::face::Face;

    #[test]
    fn test_orphan_point_rejected() {
        // No zone and not cell-supporting: rejected for any master/position.
        for master in [NONE, 0, 17] {
            let err = TopoAction::add_point(Point::zero(), master, NONE, false).unwrap_err();
            assert_eq!(err, ActionError::OrphanPoint);
        }

        assert!(TopoAction::add_point(Point::zero(), NONE, NONE, true).is_ok());
        assert!(TopoAction::add_point(Point::zero(), NONE, 2, false).is_ok());
    }

    #[test]
    fn test_small_face_rejected() {
        let err = TopoAction::add_face(
            Face::new([0, 1]),
            0,
            NONE,
            NONE,
            NONE,
            NONE,
            false,
            0,
            NONE,
            false,
        )
        .unwrap_err();
        assert_eq!(err, ActionError::FaceTooSmall { n_verts: 2 });
    }

    #[test]
    fn test_face_without_owner_rejected() {
        let err = TopoAction::add_face(
            Face::new([0, 1, 2]),
            NONE,
            NONE,
            NONE,
            NONE,
            NONE,
            false,
            0,
            NONE,
            false,
        )
        .unwrap_err();
        assert_eq!(err, ActionError::MissingOwner);

        let err = TopoAction::modify_face(0, Face::new([0, 1, 2]), NONE, NONE, false, None, None)
            .unwrap_err();
        assert_eq!(err, ActionError::MissingOwner);
    }

    #[test]
    fn test_negative_vertex_rejected() {
        let err = TopoAction::add_face(
            Face::new([0, -3, 2]),
            0,
            NONE,
            NONE,
            NONE,
            NONE,
            false,
            0,
            NONE,
            false,
        )
        .unwrap_err();
        assert_eq!(err, ActionError::NegativeVertex { point: -3 });
    }
}
