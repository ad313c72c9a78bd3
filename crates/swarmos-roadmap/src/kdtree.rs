//! 2-D k-d tree for nearest-neighbour lookups.
//!
//! Built once per roadmap generation and queried every tick to snap agent
//! positions and goals onto roadmap nodes. Median-split construction keeps
//! the tree balanced regardless of sampling order.

use swarmos_types::Point2;

#[derive(Debug)]
struct KdNode {
    point: Point2,
    /// Index into the slice the tree was built from.
    index: usize,
    axis: u8,
    left: Option<Box<KdNode>>,
    right: Option<Box<KdNode>>,
}

/// Static nearest-neighbour index over a fixed point set.
#[derive(Debug, Default)]
pub struct KdTree {
    root: Option<Box<KdNode>>,
    len: usize,
}

impl KdTree {
    /// Build a balanced tree over `points`. Query results are indices into
    /// this slice.
    pub fn build(points: &[Point2]) -> Self {
        let mut entries: Vec<(usize, Point2)> = points.iter().copied().enumerate().collect();
        let root = Self::split(&mut entries, 0);
        Self {
            root,
            len: points.len(),
        }
    }

    fn split(entries: &mut [(usize, Point2)], depth: usize) -> Option<Box<KdNode>> {
        if entries.is_empty() {
            return None;
        }
        let axis = (depth % 2) as u8;
        entries.sort_unstable_by(|a, b| {
            let (ka, kb) = if axis == 0 {
                (a.1.x, b.1.x)
            } else {
                (a.1.y, b.1.y)
            };
            ka.total_cmp(&kb)
        });
        let mid = entries.len() / 2;
        let (index, point) = entries[mid];
        let (left, rest) = entries.split_at_mut(mid);
        let right = &mut rest[1..];
        Some(Box::new(KdNode {
            point,
            index,
            axis,
            left: Self::split(left, depth + 1),
            right: Self::split(right, depth + 1),
        }))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index of the point closest to `query`, or `None` for an empty tree.
    pub fn nearest(&self, query: &Point2) -> Option<usize> {
        let mut best: Option<(f32, usize)> = None;
        if let Some(root) = &self.root {
            Self::search(root, query, &mut best);
        }
        best.map(|(_, index)| index)
    }

    fn search(node: &KdNode, query: &Point2, best: &mut Option<(f32, usize)>) {
        let d2 = (node.point.x - query.x).powi(2) + (node.point.y - query.y).powi(2);
        if best.map_or(true, |(bd2, _)| d2 < bd2) {
            *best = Some((d2, node.index));
        }

        let diff = if node.axis == 0 {
            query.x - node.point.x
        } else {
            query.y - node.point.y
        };
        let (near, far) = if diff < 0.0 {
            (&node.left, &node.right)
        } else {
            (&node.right, &node.left)
        };
        if let Some(child) = near {
            Self::search(child, query, best);
        }
        // The far side can only win if the splitting plane is closer than the
        // best match so far.
        if let Some(child) = far {
            if best.map_or(true, |(bd2, _)| diff * diff < bd2) {
                Self::search(child, query, best);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn brute_force(points: &[Point2], query: &Point2) -> Option<usize> {
        points
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.distance(query).total_cmp(&b.distance(query)))
            .map(|(i, _)| i)
    }

    #[test]
    fn empty_tree_has_no_nearest() {
        let tree = KdTree::build(&[]);
        assert!(tree.is_empty());
        assert_eq!(tree.nearest(&Point2::new(0.0, 0.0)), None);
    }

    #[test]
    fn single_point_is_always_nearest() {
        let tree = KdTree::build(&[Point2::new(5.0, 5.0)]);
        assert_eq!(tree.nearest(&Point2::new(1000.0, -50.0)), Some(0));
    }

    #[test]
    fn matches_brute_force_on_random_points() {
        let mut rng = StdRng::seed_from_u64(99);
        let points: Vec<Point2> = (0..300)
            .map(|_| {
                Point2::new(
                    rng.gen_range(0.0..800.0f32),
                    rng.gen_range(0.0..600.0f32),
                )
            })
            .collect();
        let tree = KdTree::build(&points);
        assert_eq!(tree.len(), 300);

        for _ in 0..50 {
            let query = Point2::new(
                rng.gen_range(-50.0..850.0f32),
                rng.gen_range(-50.0..650.0f32),
            );
            let expected = brute_force(&points, &query);
            let got = tree.nearest(&query);
            // Ties can legitimately resolve to a different index, so compare
            // distances rather than indices.
            let ed = points[expected.unwrap()].distance(&query);
            let gd = points[got.unwrap()].distance(&query);
            assert!((ed - gd).abs() < 1e-3, "query {query:?}: {ed} vs {gd}");
        }
    }

    #[test]
    fn duplicate_points_are_handled() {
        let p = Point2::new(10.0, 10.0);
        let tree = KdTree::build(&[p, p, p, Point2::new(100.0, 100.0)]);
        let hit = tree.nearest(&Point2::new(11.0, 9.0)).unwrap();
        assert!(hit < 3);
    }
}
