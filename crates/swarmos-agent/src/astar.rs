//! A* search over the roadmap.
//!
//! Edge cost and heuristic are both Euclidean distance, so the heuristic is
//! admissible and the first settled goal is optimal. Equal-priority entries
//! pop in insertion order, which keeps paths reproducible run to run.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use swarmos_roadmap::Roadmap;
use swarmos_types::Point2;

/// Heap entry ordered for a min-heap on `priority`, then insertion sequence.
struct HeapEntry {
    priority: f32,
    seq: u64,
    node: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the smallest priority
        // (and among equals, the earliest insertion) on top.
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Shortest node path from `start` to `goal`, endpoints included. `None`
/// when the nodes are disconnected or out of range.
pub fn astar(roadmap: &Roadmap, start: usize, goal: usize) -> Option<Vec<usize>> {
    if start >= roadmap.len() || goal >= roadmap.len() {
        return None;
    }
    if start == goal {
        return Some(vec![start]);
    }

    let goal_point = roadmap.node(goal);
    let mut open = BinaryHeap::new();
    let mut came_from: HashMap<usize, usize> = HashMap::new();
    let mut best_cost: HashMap<usize, f32> = HashMap::from([(start, 0.0)]);
    let mut seq = 0u64;

    open.push(HeapEntry {
        priority: roadmap.node(start).distance(&goal_point),
        seq,
        node: start,
    });

    while let Some(HeapEntry { node, .. }) = open.pop() {
        if node == goal {
            return Some(rebuild_path(&came_from, start, goal));
        }
        let node_cost = best_cost[&node];
        for &next in roadmap.neighbors(node) {
            let cost = node_cost + roadmap.node(node).distance(&roadmap.node(next));
            if best_cost.get(&next).is_none_or(|&c| cost < c) {
                best_cost.insert(next, cost);
                came_from.insert(next, node);
                seq += 1;
                open.push(HeapEntry {
                    priority: cost + roadmap.node(next).distance(&goal_point),
                    seq,
                    node: next,
                });
            }
        }
    }
    None
}

fn rebuild_path(came_from: &HashMap<usize, usize>, start: usize, goal: usize) -> Vec<usize> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        current = came_from[&current];
        path.push(current);
    }
    path.reverse();
    path
}

/// Total Euclidean length of a node path.
pub fn path_cost(roadmap: &Roadmap, path: &[usize]) -> f32 {
    path.windows(2)
        .map(|w| roadmap.node(w[0]).distance(&roadmap.node(w[1])))
        .sum()
}

/// Convert a node path into frame points.
pub fn path_points(roadmap: &Roadmap, path: &[usize]) -> Vec<Point2> {
    path.iter().map(|&i| roadmap.node(i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Square with a diagonal shortcut:
    ///
    /// ```text
    /// 0 ─ 1
    /// │ ╲ │
    /// 3 ─ 2
    /// ```
    fn square_roadmap() -> Roadmap {
        Roadmap::from_parts(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(100.0, 0.0),
                Point2::new(100.0, 100.0),
                Point2::new(0.0, 100.0),
            ],
            vec![vec![1, 2, 3], vec![0, 2], vec![0, 1, 3], vec![0, 2]],
        )
    }

    #[test]
    fn takes_the_diagonal_shortcut() {
        let roadmap = square_roadmap();
        let path = astar(&roadmap, 2, 0).expect("path");
        assert_eq!(path, vec![2, 0]);
    }

    #[test]
    fn finds_multi_hop_path() {
        // A line of nodes with no shortcuts.
        let roadmap = Roadmap::from_parts(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(100.0, 0.0),
                Point2::new(200.0, 0.0),
                Point2::new(300.0, 0.0),
            ],
            vec![vec![1], vec![0, 2], vec![1, 3], vec![2]],
        );
        let path = astar(&roadmap, 3, 0).expect("path");
        assert_eq!(path, vec![3, 2, 1, 0]);
        assert!((path_cost(&roadmap, &path) - 300.0).abs() < 1e-3);
    }

    #[test]
    fn trivial_path_when_start_is_goal() {
        let roadmap = square_roadmap();
        assert_eq!(astar(&roadmap, 1, 1), Some(vec![1]));
    }

    #[test]
    fn disconnected_nodes_have_no_path() {
        let roadmap = Roadmap::from_parts(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(100.0, 0.0),
                Point2::new(500.0, 500.0),
            ],
            vec![vec![1], vec![0], vec![]],
        );
        assert_eq!(astar(&roadmap, 2, 0), None);
    }

    #[test]
    fn out_of_range_indices_return_none() {
        let roadmap = square_roadmap();
        assert_eq!(astar(&roadmap, 0, 99), None);
        assert_eq!(astar(&roadmap, 99, 0), None);
    }

    #[test]
    fn equal_cost_paths_resolve_deterministically() {
        // Two symmetric routes around a square: 3→1 via 0 or via 2, both
        // cost 200. The tie must resolve the same way every run.
        let roadmap = Roadmap::from_parts(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(100.0, 100.0),
                Point2::new(0.0, 100.0),
                Point2::new(100.0, 0.0),
            ],
            vec![vec![2, 3], vec![2, 3], vec![0, 1], vec![0, 1]],
        );
        let first = astar(&roadmap, 3, 2).expect("path");
        for _ in 0..10 {
            assert_eq!(astar(&roadmap, 3, 2).expect("path"), first);
        }
    }

    #[test]
    fn grid_route_cost_is_monotone_and_admissible() {
        // 4×4 lattice, 100 px spacing, 4-connected.
        let side = 4usize;
        let mut nodes = Vec::new();
        let mut adjacency = vec![Vec::new(); side * side];
        for row in 0..side {
            for col in 0..side {
                nodes.push(Point2::new(100.0 * col as f32, 100.0 * row as f32));
                let idx = row * side + col;
                if col + 1 < side {
                    adjacency[idx].push(idx + 1);
                    adjacency[idx + 1].push(idx);
                }
                if row + 1 < side {
                    adjacency[idx].push(idx + side);
                    adjacency[idx + side].push(idx);
                }
            }
        }
        let roadmap = Roadmap::from_parts(nodes, adjacency);

        let path = astar(&roadmap, 0, side * side - 1).expect("path");
        // Cumulative cost never decreases along the node sequence.
        let mut cumulative = 0.0f32;
        for w in path.windows(2) {
            let next = cumulative + roadmap.node(w[0]).distance(&roadmap.node(w[1]));
            assert!(next >= cumulative);
            cumulative = next;
        }
        // Never beats the straight line between the endpoints.
        let straight = roadmap.node(0).distance(&roadmap.node(side * side - 1));
        assert!(cumulative >= straight - 1e-3);
        // Manhattan route through the lattice: 6 hops of 100 px.
        assert!((cumulative - 600.0).abs() < 1e-3);
    }

    #[test]
    fn prefers_the_shorter_of_two_detours() {
        // No direct edge 0→1; the route through 2 hugs the straight line,
        // the route through 3 swings wide.
        let roadmap = Roadmap::from_parts(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(200.0, 0.0),
                Point2::new(100.0, 10.0),
                Point2::new(100.0, 150.0),
            ],
            vec![vec![2, 3], vec![2, 3], vec![0, 1], vec![0, 1]],
        );
        let path = astar(&roadmap, 0, 1).expect("path");
        assert_eq!(path, vec![0, 2, 1]);
    }
}
