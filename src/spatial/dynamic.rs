//! The growable indexed octree.
//!
//! [`DynamicIndexedOctree`] shares the node/content arena layout of
//! [`IndexedOctree`] and adds safe insertion and removal of individual shape
//! indices without a full rebuild. Shapes must already be present in the
//! backing [`ShapeSet`]; inserting makes an index reachable by queries,
//! removing withdraws it.
//!
//! The tree only grows: an insertion may split a leaf into child octants,
//! but removals never merge siblings back together, so
//! [`DynamicIndexedOctree::n_levels_max`] is a high-water mark and emptied
//! leaves linger (harmless to queries). Callers wanting compaction rebuild
//! from scratch.
//!
//! Every mutation bumps the generation counter, which invalidates the
//! volume-type cache on the next classification query.

use crate::geometry::bound_box::BoundBox;
use crate::geometry::point::{Label, Point};
use crate::spatial::octree::{
    split_is_useful, IndexedOctree, LineHit, LineNearest, Nearest, Node, OctreeParams, Slot,
    VolumeType,
};
use crate::spatial::shapes::ShapeSet;

/// An octree supporting incremental insertion and removal of shape indices.
#[derive(Debug)]
pub struct DynamicIndexedOctree<S: ShapeSet> {
    tree: IndexedOctree<S>,
}

impl<S: ShapeSet> DynamicIndexedOctree<S> {
    /// A tree indexing every shape of the collection, as
    /// [`IndexedOctree::new`] builds it.
    #[must_use]
    pub fn new(shapes: S, bb: BoundBox, params: OctreeParams) -> Self {
        Self {
            tree: IndexedOctree::new(shapes, bb, params),
        }
    }

    /// A tree indexing none of the collection's shapes; indices become
    /// reachable as they are [`DynamicIndexedOctree::insert`]ed.
    #[must_use]
    pub fn empty(shapes: S, bb: BoundBox, params: OctreeParams) -> Self {
        Self {
            tree: IndexedOctree::shell(shapes, bb, params),
        }
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Make shape index `shape` reachable, descending by its bounds and
    /// splitting any leaf pushed over the occupancy threshold.
    ///
    /// Returns `false` — and leaves the tree untouched — when the index is
    /// outside the collection or its bounds miss the tree box entirely.
    /// Re-inserting an index already present is harmless as long as the
    /// shape's geometry is unchanged: the duplicate references are
    /// tolerated and queries deduplicate.
    pub fn insert(&mut self, shape: usize) -> bool {
        if shape >= self.tree.shapes.len() {
            return false;
        }
        let shape_bb = self.tree.shapes.bounds(shape);
        if !shape_bb.overlaps(&self.tree.bb) {
            return false;
        }
        self.insert_into(0, 1, shape, &shape_bb);
        self.tree.generation += 1;
        true
    }

    /// Insert the contiguous index range `start..end`, returning how many
    /// indices were placed.
    pub fn insert_range(&mut self, start: usize, end: usize) -> usize {
        (start..end).filter(|&shape| self.insert(shape)).count()
    }

    /// Withdraw shape index `shape` from every leaf referencing it. Leaves
    /// are not merged. Returns `false` when the index was nowhere in the
    /// tree.
    pub fn remove(&mut self, shape: usize) -> bool {
        let mut found = false;
        for content in &mut self.tree.contents {
            let before = content.len();
            content.retain(|&s| s != shape);
            found |= content.len() != before;
        }
        if found {
            self.tree.generation += 1;
        }
        found
    }

    fn insert_into(&mut self, node: usize, level: usize, shape: usize, shape_bb: &BoundBox) {
        for o in 0..8 {
            let sub_bb = self.tree.nodes[node].bb.sub_box(o);
            if !shape_bb.overlaps(&sub_bb) {
                continue;
            }
            match self.tree.nodes[node].slots[o] {
                Slot::Empty => {
                    let ci = self.tree.add_content(vec![shape]);
                    self.tree.nodes[node].slots[o] = Slot::Leaf(ci);
                }
                Slot::Leaf(ci) => {
                    self.tree.contents[ci].push(shape);
                    self.try_split(node, o, ci, level + 1, sub_bb);
                }
                Slot::Node(child) => self.insert_into(child, level + 1, shape, shape_bb),
            }
        }
    }

    /// Turn the leaf in `node`'s octant `o` into a child node at `level`
    /// when it exceeds the occupancy threshold and the split is worth it.
    /// The split is one level deep; further insertions deepen it on demand.
    fn try_split(&mut self, node: usize, o: usize, ci: usize, level: usize, bb: BoundBox) {
        let occupancy = self.tree.contents[ci].len();
        if occupancy <= self.tree.params.leaf_ratio || level > self.tree.params.max_levels {
            return;
        }

        let indices = std::mem::take(&mut self.tree.contents[ci]);
        let parts = IndexedOctree::partition(&self.tree.shapes, &bb, &indices);
        if !split_is_useful(&self.tree.params, indices.len(), &parts) {
            self.tree.contents[ci] = indices;
            return;
        }

        let new_node = self.tree.nodes.len();
        self.tree.nodes.push(Node::new(bb, node as Label));
        self.tree.n_levels = self.tree.n_levels.max(level);

        // The split leaf's content slot is reused for the first occupied
        // octant; the rest get fresh slots.
        let mut reusable = Some(ci);
        for (oct, part) in parts.into_iter().enumerate() {
            if part.is_empty() {
                continue;
            }
            let content = match reusable.take() {
                Some(slot) => {
                    self.tree.contents[slot] = part;
                    slot
                }
                None => self.tree.add_content(part),
            };
            self.tree.nodes[new_node].slots[oct] = Slot::Leaf(content);
        }
        self.tree.nodes[node].slots[o] = Slot::Node(new_node);
    }

    // =========================================================================
    // ACCESS AND DELEGATED QUERIES
    // =========================================================================

    /// The indexed shape collection.
    #[must_use]
    pub fn shapes(&self) -> &S {
        self.tree.shapes()
    }

    /// The overall bounding box.
    #[must_use]
    pub fn bound_box(&self) -> BoundBox {
        self.tree.bound_box()
    }

    /// The (normalised) build parameters.
    #[must_use]
    pub fn params(&self) -> OctreeParams {
        self.tree.params()
    }

    /// Number of split nodes; grows on insertion, never shrinks.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.tree.n_nodes()
    }

    /// High-water mark of the node-level count. Splits raise it; removals
    /// never lower it.
    #[must_use]
    pub fn n_levels_max(&self) -> usize {
        self.tree.n_levels()
    }

    /// The mutation counter stamping the volume-type cache. Every
    /// successful [`DynamicIndexedOctree::insert`] or
    /// [`DynamicIndexedOctree::remove`] advances it.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.tree.generation
    }

    /// See [`IndexedOctree::find_nearest`].
    #[must_use]
    pub fn find_nearest(&self, p: &Point, max_dist_sqr: f64) -> Option<Nearest> {
        self.tree.find_nearest(p, max_dist_sqr)
    }

    /// See [`IndexedOctree::find_nearest_to_line`].
    #[must_use]
    pub fn find_nearest_to_line(&self, start: &Point, end: &Point) -> Option<LineNearest> {
        self.tree.find_nearest_to_line(start, end)
    }

    /// See [`IndexedOctree::find_line`].
    #[must_use]
    pub fn find_line(&self, start: &Point, end: &Point) -> Option<LineHit> {
        self.tree.find_line(start, end)
    }

    /// See [`IndexedOctree::find_line_any`].
    #[must_use]
    pub fn find_line_any(&self, start: &Point, end: &Point) -> Option<LineHit> {
        self.tree.find_line_any(start, end)
    }

    /// See [`IndexedOctree::find_box`].
    #[must_use]
    pub fn find_box(&self, search: &BoundBox) -> Vec<usize> {
        self.tree.find_box(search)
    }

    /// See [`IndexedOctree::find_sphere`].
    #[must_use]
    pub fn find_sphere(&self, centre: &Point, radius_sqr: f64) -> Vec<usize> {
        self.tree.find_sphere(centre, radius_sqr)
    }

    /// See [`IndexedOctree::overlaps_box`].
    #[must_use]
    pub fn overlaps_box(&self, search: &BoundBox) -> bool {
        self.tree.overlaps_box(search)
    }

    /// See [`IndexedOctree::overlaps_sphere`].
    #[must_use]
    pub fn overlaps_sphere(&self, centre: &Point, radius_sqr: f64) -> bool {
        self.tree.overlaps_sphere(centre, radius_sqr)
    }

    /// See [`IndexedOctree::volume_type`].
    #[must_use]
    pub fn volume_type(&self, p: &Point) -> VolumeType {
        self.tree.volume_type(p)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::DynamicIndexedOctree;
    use crate::geometry::bound_box::BoundBox;
    use crate::geometry::point::Point;
    use crate::mesh::poly_mesh::PolyMesh;
    use crate::spatial::octree::{IndexedOctree, OctreeParams, VolumeType};
    use crate::spatial::shapes::{FaceShapes, PointShapes, ShapeSet};

    fn cluster() -> Vec<Point> {
        let mut points = Vec::new();
        for k in 0..3 {
            for j in 0..3 {
                for i in 0..3 {
                    points.push(Point::new(
                        0.1 * i as f64,
                        0.1 * j as f64,
                        0.1 * k as f64,
                    ));
                }
            }
        }
        points
    }

    fn small_params() -> OctreeParams {
        OctreeParams {
            max_levels: 8,
            leaf_ratio: 2,
            max_duplicity: 4,
        }
    }

    #[test]
    fn test_incremental_build_matches_static() {
        let points = cluster();
        let bb = BoundBox::new(Point::new(-0.1, -0.1, -0.1), Point::new(0.4, 0.4, 0.4));

        let mut dynamic =
            DynamicIndexedOctree::empty(PointShapes::new(&points), bb, small_params());
        assert_eq!(dynamic.insert_range(0, points.len()), points.len());

        let static_tree = IndexedOctree::new(PointShapes::new(&points), bb, small_params());

        // Same answers, whatever the internal layout differences.
        for query in [Point::zero(), Point::new(0.25, 0.05, 0.15)] {
            let a = dynamic.find_nearest(&query, f64::INFINITY).unwrap();
            let b = static_tree.find_nearest(&query, f64::INFINITY).unwrap();
            assert_eq!(a.shape, b.shape);
        }
        assert_eq!(dynamic.find_box(&bb), static_tree.find_box(&bb));
        assert!(dynamic.n_levels_max() > 1, "cluster must force splits");
    }

    #[test]
    fn test_insert_then_remove_restores_queries() {
        let points = cluster();
        let bb = BoundBox::new(Point::new(-0.1, -0.1, -0.1), Point::new(0.4, 0.4, 0.4));
        let mut tree = DynamicIndexedOctree::empty(PointShapes::new(&points), bb, small_params());

        for shape in 0..13 {
            tree.insert(shape);
        }
        let before = tree.find_box(&bb);
        let nodes_before = tree.n_nodes();

        assert!(tree.insert(13));
        assert!(tree.remove(13));

        // Residual structure from the insert may linger, but no query can
        // see index 13 any more.
        assert_eq!(tree.find_box(&bb), before);
        assert!(tree.n_nodes() >= nodes_before);
        assert!(tree
            .find_nearest(&points[13], 1e-12)
            .map_or(true, |hit| hit.shape != 13));
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let points = cluster();
        let bb = BoundBox::new(Point::new(-0.1, -0.1, -0.1), Point::new(0.4, 0.4, 0.4));
        let mut tree = DynamicIndexedOctree::empty(PointShapes::new(&points), bb, small_params());
        tree.insert(0);

        let generation = tree.generation();
        assert!(!tree.remove(5));
        assert_eq!(tree.generation(), generation, "no-op must not invalidate");
    }

    #[test]
    fn test_double_insert_is_harmless() {
        let points = cluster();
        let bb = BoundBox::new(Point::new(-0.1, -0.1, -0.1), Point::new(0.4, 0.4, 0.4));
        let mut tree = DynamicIndexedOctree::empty(PointShapes::new(&points), bb, small_params());

        assert!(tree.insert(4));
        assert!(tree.insert(4));
        assert_eq!(tree.find_box(&bb), vec![4]);

        // One removal withdraws every reference.
        assert!(tree.remove(4));
        assert!(tree.find_box(&bb).is_empty());
    }

    #[test]
    fn test_out_of_collection_insert_rejected() {
        let points = cluster();
        let bb = BoundBox::new(Point::new(-0.1, -0.1, -0.1), Point::new(0.4, 0.4, 0.4));
        let mut tree = DynamicIndexedOctree::empty(PointShapes::new(&points), bb, small_params());

        assert!(!tree.insert(points.len()));
        assert_eq!(tree.generation(), 0);
    }

    #[test]
    fn test_levels_high_water_survives_removal() {
        let points = cluster();
        let bb = BoundBox::new(Point::new(-0.1, -0.1, -0.1), Point::new(0.4, 0.4, 0.4));
        let mut tree = DynamicIndexedOctree::empty(PointShapes::new(&points), bb, small_params());

        tree.insert_range(0, points.len());
        let high_water = tree.n_levels_max();
        assert!(high_water > 1);

        for shape in 0..points.len() {
            tree.remove(shape);
        }
        assert!(tree.find_box(&bb).is_empty());
        assert_eq!(tree.n_levels_max(), high_water);
    }

    #[test]
    fn test_mutation_invalidates_volume_cache() {
        let mesh = PolyMesh::hex_block([1.0, 1.0, 1.0]).unwrap();
        let bb = mesh.bound_box().inflated(1.0);
        let params = OctreeParams {
            max_levels: 6,
            leaf_ratio: 1,
            max_duplicity: 8,
        };
        let mut tree = DynamicIndexedOctree::new(FaceShapes::boundary(&mesh), bb, params);

        // Classified and cached against the closed surface.
        let inside = Point::new(0.5, 0.5, 0.5);
        assert_eq!(tree.volume_type(&inside), VolumeType::Inside);

        // Withdrawing the whole surface leaves the structure (and the
        // cached octant keys) in place; only generation-stamped
        // invalidation can produce the fresh answer.
        for shape in 0..tree.shapes().len() {
            assert!(tree.remove(shape));
        }
        assert_eq!(tree.volume_type(&inside), VolumeType::Unknown);
    }
}
