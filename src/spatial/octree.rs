//! The static indexed octree.
//!
//! [`IndexedOctree`] recursively partitions a bounding box into octants and
//! stores, per leaf, the indices of the shapes overlapping that octant. The
//! tree is built once over a fixed [`ShapeSet`] and never reshaped; the
//! growable variant lives in [`crate::spatial::dynamic`].
//!
//! Nodes live in an index-addressed arena: each node records its bound box,
//! its parent, and 8 octant slots that are either empty, another node, or a
//! leaf pointing into a parallel array of content lists. Shapes straddling
//! an octant boundary are referenced from every octant they overlap, bounded
//! by the duplicity cap in [`OctreeParams`].
//!
//! Queries never fail: searches over an empty tree, or searches that find
//! nothing, report `None` or an empty set.
//!
//! # Determinism
//!
//! When several shapes are exactly equally near, the lowest shape index
//! wins. This holds for [`IndexedOctree::find_nearest`],
//! [`IndexedOctree::find_nearest_to_line`], and
//! [`IndexedOctree::find_line`], regardless of traversal order.

use crate::collections::FastHashMap;
use crate::geometry::bound_box::BoundBox;
use crate::geometry::point::{Label, Point, NONE};
use crate::spatial::shapes::ShapeSet;
use std::cell::RefCell;
use tracing::warn;

/// Iteration cap for the leaf-to-leaf line walk. Reaching it logs a warning
/// and returns the best hit found so far.
const MAX_LINE_WALK: usize = 10_000;

/// Parametric nudge pushing the line walk across an octant boundary.
const LINE_WALK_PERTURB: f64 = 1.0e-10;

/// Classification of a point against a closed shape surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VolumeType {
    /// Not determinable (open surface, empty tree, or unsupported shapes).
    Unknown,
    /// The surrounding octant contains surface shapes.
    Mixed,
    /// Enclosed by the surface.
    Inside,
    /// Free of the surface.
    Outside,
}

/// Build parameters of a tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OctreeParams {
    /// Maximum number of node levels; the root is level 1. Bounds both the
    /// build recursion and the depth of the dynamic tree.
    pub max_levels: usize,
    /// Leaf occupancy threshold: a leaf holding at most this many shape
    /// indices is not split further.
    pub leaf_ratio: usize,
    /// Splitting is abandoned when partitioning a leaf would grow the total
    /// reference count beyond `max_duplicity` times the leaf's occupancy
    /// (shapes straddling octant boundaries are referenced once per octant
    /// they overlap).
    pub max_duplicity: usize,
}

impl Default for OctreeParams {
    fn default() -> Self {
        Self {
            max_levels: 10,
            leaf_ratio: 10,
            max_duplicity: 4,
        }
    }
}

impl OctreeParams {
    fn normalised(self) -> Self {
        Self {
            max_levels: self.max_levels.max(1),
            leaf_ratio: self.leaf_ratio.max(1),
            max_duplicity: self.max_duplicity.max(1),
        }
    }
}

/// One of a node's 8 octant slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Slot {
    /// No shapes overlap the octant.
    Empty,
    /// A child node, by node index.
    Node(usize),
    /// A leaf, by content-list index.
    Leaf(usize),
}

/// An internal split node.
#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) bb: BoundBox,
    pub(crate) parent: Label,
    pub(crate) slots: [Slot; 8],
}

impl Node {
    pub(crate) const fn new(bb: BoundBox, parent: Label) -> Self {
        Self {
            bb,
            parent,
            slots: [Slot::Empty; 8],
        }
    }
}

/// Result of a nearest-shape query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Nearest {
    /// Index of the nearest shape.
    pub shape: usize,
    /// Nearest point on that shape.
    pub point: Point,
    /// Squared distance from the query to `point`.
    pub dist_sqr: f64,
}

/// Result of a nearest-shape-to-segment query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineNearest {
    /// Index of the nearest shape.
    pub shape: usize,
    /// Nearest point on the shape.
    pub shape_point: Point,
    /// Nearest point on the query segment.
    pub line_point: Point,
    /// Squared distance between the two points.
    pub dist_sqr: f64,
}

/// Result of a segment-intersection query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineHit {
    /// Index of the intersected shape.
    pub shape: usize,
    /// Intersection point.
    pub point: Point,
    /// Segment parameter of the intersection, in `[0, 1]`.
    pub t: f64,
}

/// Lazily filled per-octant volume classifications, stamped with the tree
/// generation they were computed at.
#[derive(Debug, Default)]
struct VolumeCache {
    generation: u64,
    octants: FastHashMap<(usize, u8), VolumeType>,
}

/// A static octree over a fixed shape collection.
///
/// The tree holds the shape set by value; for the mesh-backed collections
/// that is a cheap borrowed view, so the backing geometry must outlive the
/// tree.
#[derive(Debug)]
pub struct IndexedOctree<S: ShapeSet> {
    pub(crate) shapes: S,
    pub(crate) bb: BoundBox,
    pub(crate) params: OctreeParams,
    pub(crate) nodes: Vec<Node>,
    pub(crate) contents: Vec<Vec<usize>>,
    pub(crate) n_levels: usize,
    /// Bumped by the dynamic tree on every mutation; the volume cache is
    /// dropped when its stamp disagrees.
    pub(crate) generation: u64,
    cache: RefCell<VolumeCache>,
}

impl<S: ShapeSet> IndexedOctree<S> {
    /// Build a tree over `shapes` inside the overall box `bb`.
    ///
    /// `bb` must contain the bounds of every shape; shapes outside it are
    /// unreachable by queries. A collection of zero shapes is legal and
    /// produces a degenerate childless tree.
    #[must_use]
    pub fn new(shapes: S, bb: BoundBox, params: OctreeParams) -> Self {
        let mut tree = Self::shell(shapes, bb, params);

        let all: Vec<usize> = (0..tree.shapes.len()).collect();
        if !all.is_empty() {
            let parts = Self::partition(&tree.shapes, &bb, &all);
            for (o, part) in parts.into_iter().enumerate() {
                let slot = tree.build_slot(bb.sub_box(o), 0, part, 2);
                tree.nodes[0].slots[o] = slot;
            }
        }
        tree
    }

    /// A tree indexing nothing yet: just the root node. The dynamic tree
    /// starts from this and fills in by insertion.
    pub(crate) fn shell(shapes: S, bb: BoundBox, params: OctreeParams) -> Self {
        Self {
            shapes,
            bb,
            params: params.normalised(),
            nodes: vec![Node::new(bb, NONE)],
            contents: Vec::new(),
            n_levels: 1,
            generation: 0,
            cache: RefCell::new(VolumeCache::default()),
        }
    }

    /// Overall box for [`IndexedOctree::new`]: the union of all shape
    /// bounds, inflated slightly so boundary-sitting shapes stay strictly
    /// interior. An empty collection gets a degenerate box at the origin.
    #[must_use]
    pub fn auto_bound(shapes: &S) -> BoundBox {
        let mut bb = BoundBox::inverted();
        for shape in 0..shapes.len() {
            bb.extend_box(&shapes.bounds(shape));
        }
        if bb.is_inverted() {
            return BoundBox::new(Point::zero(), Point::zero());
        }
        bb.inflated(1.0e-6 * bb.span().mag() + 1.0e-10)
    }

    // =========================================================================
    // CONSTRUCTION
    // =========================================================================

    /// Shape indices of `indices` sorted into the 8 octants of `bb`, with a
    /// shape entering every octant its bounds overlap.
    pub(crate) fn partition(shapes: &S, bb: &BoundBox, indices: &[usize]) -> [Vec<usize>; 8] {
        let mut parts: [Vec<usize>; 8] = Default::default();
        for &i in indices {
            let shape_bb = shapes.bounds(i);
            for (o, part) in parts.iter_mut().enumerate() {
                if shape_bb.overlaps(&bb.sub_box(o)) {
                    part.push(i);
                }
            }
        }
        parts
    }

    fn build_slot(&mut self, bb: BoundBox, parent: usize, indices: Vec<usize>, level: usize) -> Slot {
        if indices.is_empty() {
            return Slot::Empty;
        }
        if indices.len() <= self.params.leaf_ratio || level > self.params.max_levels {
            return Slot::Leaf(self.add_content(indices));
        }

        let parts = Self::partition(&self.shapes, &bb, &indices);
        if !split_is_useful(&self.params, indices.len(), &parts) {
            return Slot::Leaf(self.add_content(indices));
        }

        let node = self.nodes.len();
        self.nodes.push(Node::new(bb, parent as Label));
        self.n_levels = self.n_levels.max(level);
        for (o, part) in parts.into_iter().enumerate() {
            let slot = self.build_slot(bb.sub_box(o), node, part, level + 1);
            self.nodes[node].slots[o] = slot;
        }
        Slot::Node(node)
    }

    pub(crate) fn add_content(&mut self, indices: Vec<usize>) -> usize {
        self.contents.push(indices);
        self.contents.len() - 1
    }

    // =========================================================================
    // ACCESS
    // =========================================================================

    /// The indexed shape collection.
    #[must_use]
    pub fn shapes(&self) -> &S {
        &self.shapes
    }

    /// The overall bounding box.
    #[must_use]
    pub const fn bound_box(&self) -> BoundBox {
        self.bb
    }

    /// The (normalised) build parameters.
    #[must_use]
    pub const fn params(&self) -> OctreeParams {
        self.params
    }

    /// Number of split nodes (the root included).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of node levels; a lone root counts 1.
    #[must_use]
    pub const fn n_levels(&self) -> usize {
        self.n_levels
    }

    // =========================================================================
    // NEAREST QUERIES
    // =========================================================================

    /// The shape nearest to `p` within squared distance `max_dist_sqr`, or
    /// `None` when nothing lies that close. Octants are visited nearest
    /// first with lower-bound pruning; exact distance ties go to the lowest
    /// shape index.
    #[must_use]
    pub fn find_nearest(&self, p: &Point, max_dist_sqr: f64) -> Option<Nearest> {
        if self.shapes.is_empty() {
            return None;
        }
        let mut best: Option<Nearest> = None;
        self.nearest_in_node(0, p, max_dist_sqr, &mut best);
        best
    }

    fn nearest_in_node(&self, node: usize, p: &Point, max_dist_sqr: f64, best: &mut Option<Nearest>) {
        let n = &self.nodes[node];

        let mut order: Vec<(f64, usize)> = Vec::with_capacity(8);
        for (o, slot) in n.slots.iter().enumerate() {
            if !matches!(slot, Slot::Empty) {
                order.push((n.bb.sub_box(o).dist_sqr(p), o));
            }
        }
        order.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        for (lower_bound, o) in order {
            let limit = best.as_ref().map_or(max_dist_sqr, |b| b.dist_sqr);
            if lower_bound > limit {
                break;
            }
            match n.slots[o] {
                Slot::Empty => {}
                Slot::Node(child) => self.nearest_in_node(child, p, max_dist_sqr, best),
                Slot::Leaf(ci) => {
                    for &shape in &self.contents[ci] {
                        let point = self.shapes.nearest_point(shape, p);
                        let dist_sqr = p.distance_sqr(&point);
                        if dist_sqr <= max_dist_sqr && Self::nearer(best, dist_sqr, shape) {
                            *best = Some(Nearest {
                                shape,
                                point,
                                dist_sqr,
                            });
                        }
                    }
                }
            }
        }
    }

    /// `true` when `(dist_sqr, shape)` beats the incumbent: strictly nearer,
    /// or equally near with a lower shape index.
    fn nearer<T: Incumbent>(best: &Option<T>, dist_sqr: f64, shape: usize) -> bool {
        best.as_ref().map_or(true, |b| {
            dist_sqr < b.dist_sqr() || (dist_sqr == b.dist_sqr() && shape < b.shape())
        })
    }

    /// The shape nearest to the segment `start..end`, or `None` for an
    /// empty tree or a shape collection without line support. Pruning uses
    /// a shrinking box around the segment inflated by the best distance so
    /// far.
    #[must_use]
    pub fn find_nearest_to_line(&self, start: &Point, end: &Point) -> Option<LineNearest> {
        if self.shapes.is_empty() {
            return None;
        }
        let mut best: Option<LineNearest> = None;
        let mut tightest = self.bb;
        self.line_nearest_in_node(0, start, end, &mut tightest, &mut best);
        best
    }

    fn line_nearest_in_node(
        &self,
        node: usize,
        start: &Point,
        end: &Point,
        tightest: &mut BoundBox,
        best: &mut Option<LineNearest>,
    ) {
        let n = &self.nodes[node];
        for (o, slot) in n.slots.iter().enumerate() {
            if matches!(slot, Slot::Empty) || !n.bb.sub_box(o).overlaps(tightest) {
                continue;
            }
            match *slot {
                Slot::Empty => {}
                Slot::Node(child) => self.line_nearest_in_node(child, start, end, tightest, best),
                Slot::Leaf(ci) => {
                    for &shape in &self.contents[ci] {
                        let Some((shape_point, line_point)) =
                            self.shapes.nearest_to_line(shape, start, end)
                        else {
                            continue;
                        };
                        let dist_sqr = shape_point.distance_sqr(&line_point);
                        if Self::nearer(best, dist_sqr, shape) {
                            *best = Some(LineNearest {
                                shape,
                                shape_point,
                                line_point,
                                dist_sqr,
                            });
                            *tightest = BoundBox::around([start, end]).inflated(dist_sqr.sqrt());
                        }
                    }
                }
            }
        }
    }

    // =========================================================================
    // LINE QUERIES
    // =========================================================================

    /// The first intersection of the segment `start..end` with any shape,
    /// nearest to `start`, or `None`. Walks leaf to leaf along the segment
    /// so earlier leaves are exhausted before later ones, which guarantees
    /// the hit ordering.
    #[must_use]
    pub fn find_line(&self, start: &Point, end: &Point) -> Option<LineHit> {
        self.line_walk(start, end, false)
    }

    /// Any intersection of the segment `start..end` with any shape, or
    /// `None`. Identical to [`IndexedOctree::find_line`] except the walk
    /// stops at the first hit found, which need not be the nearest.
    #[must_use]
    pub fn find_line_any(&self, start: &Point, end: &Point) -> Option<LineHit> {
        self.line_walk(start, end, true)
    }

    fn line_walk(&self, start: &Point, end: &Point, any: bool) -> Option<LineHit> {
        if self.shapes.is_empty() {
            return None;
        }
        let (t_enter, _) = self.bb.clip_segment(start, end)?;
        let dir = *end - *start;

        let mut t_cur = t_enter;
        let mut best: Option<LineHit> = None;
        let mut iterations = 0;

        loop {
            // Leaves are visited with increasing entry parameter, so once
            // the best hit precedes the current leaf nothing can beat it.
            if best.as_ref().map_or(false, |b| b.t <= t_cur) {
                break;
            }
            let p = *start + dir * t_cur;
            if !self.bb.contains(&p) {
                break;
            }

            let (octant_bb, content) = self.leaf_at(&p);
            if let Some(ci) = content {
                for &shape in &self.contents[ci] {
                    let Some((t, point)) = self.shapes.intersects_line(shape, start, end) else {
                        continue;
                    };
                    let better = best
                        .as_ref()
                        .map_or(true, |b| t < b.t || (t == b.t && shape < b.shape));
                    if better {
                        best = Some(LineHit { shape, point, t });
                        if any {
                            return best;
                        }
                    }
                }
            }

            let Some((_, t_exit)) = octant_bb.clip_segment(start, end) else {
                break;
            };
            if t_exit >= 1.0 {
                break;
            }
            // Perturbed restart just past the octant boundary.
            t_cur = t_exit.max(t_cur) + LINE_WALK_PERTURB;
            if t_cur > 1.0 {
                break;
            }

            iterations += 1;
            if iterations >= MAX_LINE_WALK {
                warn!(
                    iterations,
                    "line walk iteration cap reached; returning best hit so far"
                );
                break;
            }
        }
        best
    }

    /// The octant box and content list under the deepest node whose region
    /// holds `p`.
    fn leaf_at(&self, p: &Point) -> (BoundBox, Option<usize>) {
        let mut node = 0;
        loop {
            let n = &self.nodes[node];
            let o = n.bb.octant(p);
            match n.slots[o] {
                Slot::Empty => return (n.bb.sub_box(o), None),
                Slot::Leaf(ci) => return (n.bb.sub_box(o), Some(ci)),
                Slot::Node(child) => node = child,
            }
        }
    }

    // =========================================================================
    // RANGE QUERIES
    // =========================================================================

    /// Indices of all shapes overlapping `search`, ascending and distinct.
    #[must_use]
    pub fn find_box(&self, search: &BoundBox) -> Vec<usize> {
        let mut found = Vec::new();
        self.box_in_node(0, search, &mut |shape| {
            found.push(shape);
            true
        });
        found.sort_unstable();
        found.dedup();
        found
    }

    /// `true` when any shape overlaps `search`; stops at the first.
    #[must_use]
    pub fn overlaps_box(&self, search: &BoundBox) -> bool {
        !self.box_in_node(0, search, &mut |_| false)
    }

    /// Visit shapes overlapping `search`; `keep_going(shape)` returning
    /// `false` aborts. Returns `false` when aborted.
    fn box_in_node(
        &self,
        node: usize,
        search: &BoundBox,
        keep_going: &mut impl FnMut(usize) -> bool,
    ) -> bool {
        let n = &self.nodes[node];
        for (o, slot) in n.slots.iter().enumerate() {
            if matches!(slot, Slot::Empty) || !n.bb.sub_box(o).overlaps(search) {
                continue;
            }
            match *slot {
                Slot::Empty => {}
                Slot::Node(child) => {
                    if !self.box_in_node(child, search, keep_going) {
                        return false;
                    }
                }
                Slot::Leaf(ci) => {
                    for &shape in &self.contents[ci] {
                        if self.shapes.overlaps_box(shape, search) && !keep_going(shape) {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    /// Indices of all shapes overlapping the sphere of squared radius
    /// `radius_sqr` around `centre`, ascending and distinct.
    #[must_use]
    pub fn find_sphere(&self, centre: &Point, radius_sqr: f64) -> Vec<usize> {
        let mut found = Vec::new();
        self.sphere_in_node(0, centre, radius_sqr, &mut |shape| {
            found.push(shape);
            true
        });
        found.sort_unstable();
        found.dedup();
        found
    }

    /// `true` when any shape overlaps the sphere; stops at the first.
    #[must_use]
    pub fn overlaps_sphere(&self, centre: &Point, radius_sqr: f64) -> bool {
        !self.sphere_in_node(0, centre, radius_sqr, &mut |_| false)
    }

    fn sphere_in_node(
        &self,
        node: usize,
        centre: &Point,
        radius_sqr: f64,
        keep_going: &mut impl FnMut(usize) -> bool,
    ) -> bool {
        let n = &self.nodes[node];
        for (o, slot) in n.slots.iter().enumerate() {
            if matches!(slot, Slot::Empty) || !n.bb.sub_box(o).overlaps_sphere(centre, radius_sqr) {
                continue;
            }
            match *slot {
                Slot::Empty => {}
                Slot::Node(child) => {
                    if !self.sphere_in_node(child, centre, radius_sqr, keep_going) {
                        return false;
                    }
                }
                Slot::Leaf(ci) => {
                    for &shape in &self.contents[ci] {
                        if self.shapes.overlaps_sphere(shape, centre, radius_sqr)
                            && !keep_going(shape)
                        {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    // =========================================================================
    // VOLUME CLASSIFICATION
    // =========================================================================

    /// Classify `p` against the (closed) shape surface.
    ///
    /// Octants containing surface shapes answer [`VolumeType::Mixed`].
    /// Empty octants are uniformly on one side of the surface, so their
    /// classification — found by casting from the octant centre to the
    /// nearest shape and asking its [`ShapeSet::volume_side`] — is cached
    /// per (node, octant) and reused until the tree's generation changes.
    #[must_use]
    pub fn volume_type(&self, p: &Point) -> VolumeType {
        if self.shapes.is_empty() {
            return VolumeType::Unknown;
        }
        {
            let mut cache = self.cache.borrow_mut();
            if cache.generation != self.generation {
                cache.octants.clear();
                cache.generation = self.generation;
            }
        }
        if !self.bb.contains(p) {
            return self.side_from_nearest(p);
        }

        let mut node = 0;
        loop {
            let n = &self.nodes[node];
            let o = n.bb.octant(p);
            match n.slots[o] {
                Slot::Node(child) => node = child,
                Slot::Leaf(ci) if !self.contents[ci].is_empty() => return VolumeType::Mixed,
                _ => {
                    let key = (node, o as u8);
                    if let Some(&vt) = self.cache.borrow().octants.get(&key) {
                        return vt;
                    }
                    let vt = self.side_from_nearest(&n.bb.sub_box(o).mid());
                    self.cache.borrow_mut().octants.insert(key, vt);
                    return vt;
                }
            }
        }
    }

    fn side_from_nearest(&self, p: &Point) -> VolumeType {
        match self.find_nearest(p, f64::INFINITY) {
            None => VolumeType::Unknown,
            Some(n) => self.shapes.volume_side(n.shape, &n.point, p),
        }
    }
}

/// `true` when a leaf with `occupancy` entries whose octant partition is
/// `parts` is worth turning into a node: the duplicity cap bounds how far
/// straddling shapes may multiply their references.
pub(crate) fn split_is_useful(params: &OctreeParams, occupancy: usize, parts: &[Vec<usize>; 8]) -> bool {
    let total: usize = parts.iter().map(Vec::len).sum();
    total <= params.max_duplicity * occupancy
}

/// Common shape/distance view of the nearest-query results, for the shared
/// tie-break rule.
trait Incumbent {
    fn dist_sqr(&self) -> f64;
    fn shape(&self) -> usize;
}

impl Incumbent for Nearest {
    fn dist_sqr(&self) -> f64 {
        self.dist_sqr
    }
    fn shape(&self) -> usize {
        self.shape
    }
}

impl Incumbent for LineNearest {
    fn dist_sqr(&self) -> f64 {
        self.dist_sqr
    }
    fn shape(&self) -> usize {
        self.shape
    }
}

// =============================================================================
// TESTS
// =============================================================================
