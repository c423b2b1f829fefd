//! Property-based tests for the octree search structures.
//!
//! Verifies the query contracts against brute-force scans over arbitrary
//! point clouds:
//! - nearest-point agreement (including the lowest-index tie rule)
//! - the containment invariant (a box query over a shape's own bounds
//!   always reports that shape)
//! - sphere queries as exact range filters
//! - insert-then-remove leaving the reachable index set unchanged

use polytopo::prelude::*;
use proptest::prelude::*;

fn finite_coordinate() -> impl Strategy<Value = f64> {
    -50.0..50.0
}

fn arb_point() -> impl Strategy<Value = Point> {
    (finite_coordinate(), finite_coordinate(), finite_coordinate())
        .prop_map(|(x, y, z)| point![x, y, z])
}

fn arb_cloud() -> impl Strategy<Value = Vec<Point>> {
    prop::collection::vec(arb_point(), 1..80)
}

fn build_params() -> impl Strategy<Value = OctreeParams> {
    (1_usize..8, 1_usize..8, 1_usize..6).prop_map(|(max_levels, leaf_ratio, max_duplicity)| {
        OctreeParams {
            max_levels,
            leaf_ratio,
            max_duplicity,
        }
    })
}

/// Brute-force nearest with the same tie rule as the tree: strictly nearer
/// wins, so the lowest index survives among equals.
fn brute_nearest(points: &[Point], query: &Point) -> usize {
    let mut best = 0;
    for (i, p) in points.iter().enumerate().skip(1) {
        if query.distance_sqr(p) < query.distance_sqr(&points[best]) {
            best = i;
        }
    }
    best
}

proptest! {
    /// Property: the tree's nearest shape equals the brute-force scan for
    /// any cloud, any build parameters, and any query point.
    #[test]
    fn prop_nearest_matches_brute_force(
        points in arb_cloud(),
        params in build_params(),
        query in arb_point(),
    ) {
        let shapes = PointShapes::new(&points);
        let bb = IndexedOctree::auto_bound(&shapes);
        let tree = IndexedOctree::new(shapes, bb, params);

        let hit = tree.find_nearest(&query, f64::INFINITY);
        prop_assert!(hit.is_some());
        prop_assert_eq!(hit.unwrap().shape, brute_nearest(&points, &query));
    }

    /// Property: a box query over any shape's own bounds reports that
    /// shape, whatever the tree layout.
    #[test]
    fn prop_box_query_contains_own_bounds(
        points in arb_cloud(),
        params in build_params(),
    ) {
        let shapes = PointShapes::new(&points);
        let bb = IndexedOctree::auto_bound(&shapes);
        let tree = IndexedOctree::new(shapes, bb, params);

        for shape in 0..points.len() {
            let found = tree.find_box(&tree.shapes().bounds(shape));
            prop_assert!(found.contains(&shape));
        }
    }

    /// Property: sphere queries are exact range filters.
    #[test]
    fn prop_sphere_query_is_a_range_filter(
        points in arb_cloud(),
        params in build_params(),
        centre in arb_point(),
        radius in 0.1_f64..40.0,
    ) {
        let shapes = PointShapes::new(&points);
        let bb = IndexedOctree::auto_bound(&shapes);
        let tree = IndexedOctree::new(shapes, bb, params);

        let radius_sqr = radius * radius;
        let found = tree.find_sphere(&centre, radius_sqr);
        let expected: Vec<usize> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| centre.distance_sqr(p) <= radius_sqr)
            .map(|(i, _)| i)
            .collect();
        prop_assert_eq!(found, expected);
    }

    /// Property: inserting a batch of indices and removing it again leaves
    /// every reachable index exactly as before, residual empty leaves
    /// notwithstanding.
    #[test]
    fn prop_insert_remove_is_inverse(
        points in prop::collection::vec(arb_point(), 2..60),
        params in build_params(),
        split in 1_usize..59,
    ) {
        let split = split.min(points.len() - 1);
        let bb = IndexedOctree::auto_bound(&PointShapes::new(&points));
        let mut tree = DynamicIndexedOctree::empty(PointShapes::new(&points), bb, params);

        tree.insert_range(0, split);
        let reachable_before = tree.find_box(&bb);
        prop_assert_eq!(reachable_before.len(), split);

        tree.insert_range(split, points.len());
        for shape in split..points.len() {
            prop_assert!(tree.remove(shape));
        }

        prop_assert_eq!(tree.find_box(&bb), reachable_before);
    }

    /// Property: the dynamic tree filled incrementally answers like the
    /// statically built tree over the same cloud.
    #[test]
    fn prop_dynamic_matches_static(
        points in arb_cloud(),
        params in build_params(),
        query in arb_point(),
    ) {
        let bb = IndexedOctree::auto_bound(&PointShapes::new(&points));
        let static_tree = IndexedOctree::new(PointShapes::new(&points), bb, params);
        let mut dynamic = DynamicIndexedOctree::empty(PointShapes::new(&points), bb, params);
        dynamic.insert_range(0, points.len());

        let a = static_tree.find_nearest(&query, f64::INFINITY).map(|h| h.shape);
        let b = dynamic.find_nearest(&query, f64::INFINITY).map(|h| h.shape);
        prop_assert_eq!(a, b);
        prop_assert_eq!(static_tree.find_box(&bb), dynamic.find_box(&bb));
    }
}
