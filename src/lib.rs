//! # polytopo
//!
//! A library for editing the topology of unstructured polyhedral meshes and
//! for spatial search over geometric shape collections.
//!
//! The crate has two cores:
//!
//! - A **topology-change journal** ([`topo::change::TopoChange`]): an ordered
//!   log of primitive mesh-edit actions (add/modify/remove a point, face, or
//!   cell) that is committed exactly once to produce a new, consistent
//!   [`mesh::poly_mesh::PolyMesh`] plus an old↔new index map
//!   ([`topo::map::MeshMap`]). Higher-level algorithms —
//!   [`topo::cell_splitter::CellSplitter`] (split a cell into pyramids around
//!   a midpoint) and [`topo::layer_extruder::PatchLayerExtruder`] (extrude a
//!   boundary patch into new cell layers) — generate journal entries rather
//!   than mutating the mesh directly.
//! - An **indexed octree** ([`spatial::octree::IndexedOctree`], with a
//!   growable [`spatial::dynamic::DynamicIndexedOctree`] variant): a
//!   recursive spatial partition over a shape collection supporting
//!   nearest-point, line-intersection, and box/sphere range queries.
//!
//! # Conventions
//!
//! Mesh entities are referenced by dense integer indices ([`geometry::point::Label`])
//! into parallel arrays, with `-1` as the null index. For every internal mesh
//! face the owner cell index is strictly less than the neighbour cell index,
//! and the face normal points from owner to neighbour. Boundary faces are
//! grouped into contiguous patches after all internal faces.
//!
//! # Example
//!
//! Split the single cell of a hex mesh into six pyramids:
//!
//! ```rust
//! use polytopo::prelude::*;
//!
//! let mesh = PolyMesh::hex_block([2.0, 2.0, 2.0]).unwrap();
//! let mut journal = TopoChange::new(&mesh);
//!
//! let mut splitter = CellSplitter::new(&mesh);
//! let mut mids = FastHashMap::default();
//! mids.insert(0, mesh.cell_centre(0));
//! splitter.set_refinement(&mids, &mut journal).unwrap();
//!
//! let (new_mesh, map) = journal.commit().unwrap();
//! splitter.update_mesh(&map);
//!
//! assert_eq!(new_mesh.n_cells(), 6);
//! assert_eq!(new_mesh.n_points(), 9);
//! ```
//!
//! # Error handling
//!
//! Malformed actions (an orphan point, a two-vertex face, a dangling index)
//! are rejected with [`topo::action::ActionError`] or
//! [`topo::change::CommitError`]; a failed commit never yields a partially
//! edited mesh. Spatial queries that find nothing return `None` or an empty
//! set, never an error. Numerically degenerate geometry (near-zero face
//! areas) is handled locally with documented fallback values.

#![forbid(unsafe_code)]

/// Geometric primitives: points, vectors, bounding boxes, planes, and
/// polygon measures.
pub mod geometry {
    pub mod bound_box;
    pub mod plane;
    pub mod point;
    pub mod polygon;
}

/// Collection aliases tuned for index-heavy mesh work.
pub mod collections;

/// The polyhedral mesh model: faces, patches, zones, connectivity, and
/// indirect patch addressing.
pub mod mesh {
    pub mod face;
    pub mod poly_mesh;
    pub mod primitive_patch;
}

/// Topology editing: the action journal, the commit protocol, and the
/// algorithms that generate journal entries.
pub mod topo {
    pub mod action;
    pub mod cell_splitter;
    pub mod change;
    pub mod layer_extruder;
    pub mod map;
}

/// Spatial search: the shape-collection capability trait and the static and
/// dynamic indexed octrees.
pub mod spatial {
    pub mod dynamic;
    pub mod octree;
    pub mod shapes;
}

/// Re-exports of the commonly used types.
pub mod prelude {
    pub use crate::collections::{FastHashMap, FastHashSet, SmallBuffer};
    pub use crate::geometry::bound_box::BoundBox;
    pub use crate::geometry::plane::Plane;
    pub use crate::geometry::point::{Label, Point, Vector, NONE};
    pub use crate::mesh::face::{Edge, Face};
    pub use crate::mesh::poly_mesh::{Patch, PolyMesh, Zone};
    pub use crate::mesh::primitive_patch::PrimitivePatch;
    pub use crate::point;
    pub use crate::spatial::dynamic::DynamicIndexedOctree;
    pub use crate::spatial::octree::{
        IndexedOctree, LineHit, LineNearest, Nearest, OctreeParams, VolumeType,
    };
    pub use crate::spatial::shapes::{CellShapes, FaceShapes, PointShapes, ShapeSet};
    pub use crate::topo::action::{ActionError, TopoAction};
    pub use crate::topo::cell_splitter::CellSplitter;
    pub use crate::topo::change::{CommitError, TopoChange};
    pub use crate::topo::layer_extruder::PatchLayerExtruder;
    pub use crate::topo::map::MeshMap;
}
