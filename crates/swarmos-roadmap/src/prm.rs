//! Probabilistic roadmap generation.
//!
//! The pipeline per regeneration:
//!
//! 1. Node 0 is the goal centre; remaining nodes are rejection-sampled
//!    uniformly over the frame, keeping a weight-scaled buffer from every
//!    obstacle.
//! 2. Nodes are connected to neighbours within a growing radius until each
//!    has a minimum number of collision-free edges or the radius cap is hit.
//! 3. Every component not containing the goal is pruned, so any surviving
//!    node can reach the goal by construction.
//!
//! # Example
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use swarmos_roadmap::{Arena, Roadmap, RoadmapConfig};
//! use swarmos_types::{FrameBounds, Rect};
//!
//! let arena = Arena::new(
//!     FrameBounds::new(800.0, 600.0),
//!     vec![Rect::new(300.0, 200.0, 80.0, 80.0)],
//!     Some(Rect::new(700.0, 500.0, 40.0, 40.0)),
//! );
//! let mut rng = StdRng::seed_from_u64(1);
//! let roadmap = Roadmap::generate(&arena, &RoadmapConfig::default(), &mut rng).unwrap();
//! assert_eq!(roadmap.goal_node(), 0);
//! ```

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};
use swarmos_types::{Point2, SwarmError};
use tracing::{debug, warn};

use crate::arena::Arena;
use crate::kdtree::KdTree;

/// Sampling and connection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoadmapConfig {
    /// Target node count, goal included.
    pub num_nodes: usize,
    /// Rejection-sampling attempts per node before giving up on it.
    pub sample_attempts: usize,
    /// Base clearance buffer in pixels, scaled by each obstacle's weight.
    pub sample_buffer: f32,
    /// Connection radius for the first pass, in pixels.
    pub initial_radius: f32,
    /// Radius increment when a node is under-connected.
    pub radius_step: f32,
    /// Hard cap on the connection radius.
    pub max_radius: f32,
    /// Connections each node should have before the radius stops growing.
    pub min_connections: usize,
}

impl Default for RoadmapConfig {
    fn default() -> Self {
        Self {
            num_nodes: 200,
            sample_attempts: 1000,
            sample_buffer: 20.0,
            initial_radius: 100.0,
            radius_step: 50.0,
            max_radius: 1000.0,
            min_connections: 3,
        }
    }
}

/// An undirected graph of collision-free waypoints. Node `0` is always the
/// goal.
#[derive(Debug)]
pub struct Roadmap {
    nodes: Vec<Point2>,
    adjacency: Vec<Vec<usize>>,
    tree: KdTree,
}

impl Roadmap {
    /// Sample, connect, and prune a fresh roadmap for `arena`.
    ///
    /// Fails with [`SwarmError::EmptyRoadmap`] when the arena has no goal
    /// region.
    pub fn generate<R: Rng>(
        arena: &Arena,
        config: &RoadmapConfig,
        rng: &mut R,
    ) -> Result<Roadmap, SwarmError> {
        let goal = arena.goal_center().ok_or(SwarmError::EmptyRoadmap)?;

        let mut nodes = vec![goal];
        for _ in 1..config.num_nodes {
            let mut placed = false;
            for _ in 0..config.sample_attempts {
                let candidate = Point2::new(
                    rng.r#gen::<f32>() * arena.bounds.width,
                    rng.r#gen::<f32>() * arena.bounds.height,
                );
                if arena.point_clear(&candidate, config.sample_buffer) {
                    nodes.push(candidate);
                    placed = true;
                    break;
                }
            }
            if !placed {
                warn!("sampling attempts exhausted, roadmap will be under-populated");
                break;
            }
        }

        let adjacency = connect(&nodes, arena, config);
        let (nodes, adjacency) = prune_to_goal_component(nodes, adjacency);
        if nodes.len() < 2 {
            warn!("pruning left the goal isolated, agents will not find paths");
        }
        debug!(
            nodes = nodes.len(),
            edges = adjacency.iter().map(Vec::len).sum::<usize>() / 2,
            "roadmap generated"
        );

        let tree = KdTree::build(&nodes);
        Ok(Roadmap {
            nodes,
            adjacency,
            tree,
        })
    }

    /// Wrap a prebuilt graph, e.g. for replay or scripted scenarios. The
    /// adjacency is used as given; node `0` is treated as the goal.
    pub fn from_parts(nodes: Vec<Point2>, adjacency: Vec<Vec<usize>>) -> Roadmap {
        let tree = KdTree::build(&nodes);
        Roadmap {
            nodes,
            adjacency,
            tree,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Index of the goal node.
    pub fn goal_node(&self) -> usize {
        0
    }

    pub fn node(&self, index: usize) -> Point2 {
        self.nodes[index]
    }

    pub fn nodes(&self) -> &[Point2] {
        &self.nodes
    }

    pub fn neighbors(&self, index: usize) -> &[usize] {
        &self.adjacency[index]
    }

    /// Snap a free-space point to its closest roadmap node.
    pub fn nearest(&self, p: &Point2) -> Option<usize> {
        self.tree.nearest(p)
    }
}

/// Radius-growth connection pass.
fn connect(nodes: &[Point2], arena: &Arena, config: &RoadmapConfig) -> Vec<Vec<usize>> {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for i in 0..nodes.len() {
        let mut radius = config.initial_radius;
        loop {
            for j in 0..nodes.len() {
                if i == j || adjacency[i].contains(&j) {
                    continue;
                }
                if nodes[i].distance(&nodes[j]) <= radius
                    && arena.segment_clear(&nodes[i], &nodes[j])
                {
                    adjacency[i].push(j);
                    adjacency[j].push(i);
                }
            }
            if adjacency[i].len() >= config.min_connections || radius >= config.max_radius {
                break;
            }
            radius += config.radius_step;
        }
    }
    adjacency
}

/// Keep only the connected component containing node 0, remapping indices so
/// the goal stays at 0.
fn prune_to_goal_component(
    nodes: Vec<Point2>,
    adjacency: Vec<Vec<usize>>,
) -> (Vec<Point2>, Vec<Vec<usize>>) {
    let mut order = Vec::with_capacity(nodes.len());
    let mut remap = vec![usize::MAX; nodes.len()];
    let mut queue = VecDeque::from([0usize]);
    remap[0] = 0;
    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &j in &adjacency[i] {
            if remap[j] == usize::MAX {
                remap[j] = order.len() + queue.len();
                queue.push_back(j);
            }
        }
    }

    let kept_nodes: Vec<Point2> = order.iter().map(|&i| nodes[i]).collect();
    let kept_adjacency: Vec<Vec<usize>> = order
        .iter()
        .map(|&i| adjacency[i].iter().map(|&j| remap[j]).collect())
        .collect();
    (kept_nodes, kept_adjacency)
}
