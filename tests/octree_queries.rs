//! Integration tests for the spatial-search trees.
//!
//! Exercises the static and dynamic octrees over realistic shape
//! collections (seeded random point clouds, boundary faces of block meshes)
//! and checks their answers against brute-force scans.

use polytopo::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_points(seed: u64, n: usize) -> Vec<Point> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            point![
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0)
            ]
        })
        .collect()
}

fn brute_nearest(points: &[Point], query: &Point) -> usize {
    let mut best = 0;
    for (i, p) in points.iter().enumerate() {
        if query.distance_sqr(p) < query.distance_sqr(&points[best]) {
            best = i;
        }
    }
    best
}

#[test]
fn nearest_matches_brute_force_on_random_cloud() {
    let points = random_points(42, 500);
    let shapes = PointShapes::new(&points);
    let bb = IndexedOctree::auto_bound(&shapes);
    let tree = IndexedOctree::new(
        shapes,
        bb,
        OctreeParams {
            max_levels: 8,
            leaf_ratio: 4,
            max_duplicity: 4,
        },
    );
    assert!(tree.n_levels() > 2, "500 points must split several levels");

    let queries = random_points(7, 100);
    for q in &queries {
        let hit = tree.find_nearest(q, f64::INFINITY).expect("non-empty tree");
        assert_eq!(hit.shape, brute_nearest(&points, q), "query {q:?}");
    }
}

#[test]
fn find_sphere_matches_brute_force_filter() {
    let points = random_points(3, 300);
    let shapes = PointShapes::new(&points);
    let bb = IndexedOctree::auto_bound(&shapes);
    let tree = IndexedOctree::new(shapes, bb, OctreeParams::default());

    for (centre, radius_sqr) in [
        (point![0.0, 0.0, 0.0], 9.0),
        (point![5.0, -5.0, 2.0], 16.0),
        (point![20.0, 20.0, 20.0], 1.0),
    ] {
        let found = tree.find_sphere(&centre, radius_sqr);
        let expected: Vec<usize> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| centre.distance_sqr(p) <= radius_sqr)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(found, expected);
        assert_eq!(tree.overlaps_sphere(&centre, radius_sqr), !expected.is_empty());
    }
}

#[test]
fn box_query_finds_every_shape_through_its_own_bounds() {
    let mesh = PolyMesh::block(4, 3, 2, [4.0, 3.0, 2.0]).unwrap();
    let shapes = FaceShapes::boundary(&mesh);
    let bb = IndexedOctree::auto_bound(&shapes);
    let tree = IndexedOctree::new(
        shapes,
        bb,
        OctreeParams {
            max_levels: 8,
            leaf_ratio: 4,
            max_duplicity: 6,
        },
    );

    for shape in 0..tree.shapes().len() {
        let own = tree.shapes().bounds(shape);
        let found = tree.find_box(&own);
        assert!(found.contains(&shape), "shape {shape} lost by its own box");
    }
}

#[test]
fn line_walk_agrees_with_brute_force_first_hit() {
    let mesh = PolyMesh::block(3, 3, 3, [3.0, 3.0, 3.0]).unwrap();
    let shapes = FaceShapes::boundary(&mesh);
    let bb = IndexedOctree::auto_bound(&shapes);
    let tree = IndexedOctree::new(
        shapes,
        bb,
        OctreeParams {
            max_levels: 6,
            leaf_ratio: 2,
            max_duplicity: 6,
        },
    );

    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..50 {
        let start = point![
            rng.random_range(-2.0..5.0),
            rng.random_range(-2.0..5.0),
            rng.random_range(-2.0..5.0)
        ];
        let end = point![
            rng.random_range(-2.0..5.0),
            rng.random_range(-2.0..5.0),
            rng.random_range(-2.0..5.0)
        ];

        let brute: Option<f64> = (0..tree.shapes().len())
            .filter_map(|s| tree.shapes().intersects_line(s, &start, &end))
            .map(|(t, _)| t)
            .min_by(f64::total_cmp);

        match (tree.find_line(&start, &end), brute) {
            (Some(hit), Some(t)) => {
                assert!(
                    (hit.t - t).abs() < 1e-9,
                    "tree hit t={} but brute force t={t}",
                    hit.t
                );
            }
            (None, None) => {}
            (tree_hit, brute_t) => {
                panic!("tree {tree_hit:?} disagrees with brute force {brute_t:?}");
            }
        }
    }
}

#[test]
fn volume_classification_matches_geometry_on_block() {
    let mesh = PolyMesh::block(2, 2, 2, [2.0, 2.0, 2.0]).unwrap();
    let shapes = FaceShapes::boundary(&mesh);
    let bb = mesh.bound_box().inflated(2.0);
    let tree = IndexedOctree::new(
        shapes,
        bb,
        OctreeParams {
            max_levels: 8,
            leaf_ratio: 1,
            max_duplicity: 6,
        },
    );

    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..200 {
        let p = point![
            rng.random_range(-1.5..3.5),
            rng.random_range(-1.5..3.5),
            rng.random_range(-1.5..3.5)
        ];
        let geometrically_inside =
            (0.0..=2.0).contains(&p.x) && (0.0..=2.0).contains(&p.y) && (0.0..=2.0).contains(&p.z);
        match tree.volume_type(&p) {
            VolumeType::Inside => assert!(geometrically_inside, "{p:?} marked inside"),
            VolumeType::Outside => assert!(!geometrically_inside, "{p:?} marked outside"),
            // Near the surface the octant holds faces; both sides occur.
            VolumeType::Mixed => {}
            VolumeType::Unknown => panic!("{p:?} unclassified on a closed surface"),
        }
    }
}

#[test]
fn dynamic_insert_remove_inverse_on_random_cloud() {
    let points = random_points(99, 200);
    let shapes = PointShapes::new(&points);
    let bb = IndexedOctree::auto_bound(&shapes);
    let params = OctreeParams {
        max_levels: 8,
        leaf_ratio: 4,
        max_duplicity: 4,
    };

    let mut tree = DynamicIndexedOctree::empty(PointShapes::new(&points), bb, params);
    tree.insert_range(0, 150);

    let reachable_before = tree.find_box(&bb);
    let queries = random_points(13, 20);
    let nearest_before: Vec<_> = queries
        .iter()
        .map(|q| tree.find_nearest(q, f64::INFINITY).map(|h| h.shape))
        .collect();

    // Insert the tail, then remove it again.
    for shape in 150..200 {
        assert!(tree.insert(shape));
    }
    for shape in 150..200 {
        assert!(tree.remove(shape));
    }

    assert_eq!(tree.find_box(&bb), reachable_before);
    let nearest_after: Vec<_> = queries
        .iter()
        .map(|q| tree.find_nearest(q, f64::INFINITY).map(|h| h.shape))
        .collect();
    assert_eq!(nearest_after, nearest_before);
}

#[test]
fn dynamic_tree_tracks_static_answers_as_it_fills() {
    let points = random_points(21, 120);
    let bb = IndexedOctree::auto_bound(&PointShapes::new(&points));
    let params = OctreeParams {
        max_levels: 8,
        leaf_ratio: 4,
        max_duplicity: 4,
    };

    let mut dynamic = DynamicIndexedOctree::empty(PointShapes::new(&points), bb, params);
    dynamic.insert_range(0, points.len());
    let static_tree = IndexedOctree::new(PointShapes::new(&points), bb, params);

    let queries = random_points(34, 40);
    for q in &queries {
        let a = dynamic.find_nearest(q, f64::INFINITY).map(|h| h.shape);
        let b = static_tree.find_nearest(q, f64::INFINITY).map(|h| h.shape);
        assert_eq!(a, b, "query {q:?}");
    }
    assert_eq!(dynamic.find_box(&bb), static_tree.find_box(&bb));
}
