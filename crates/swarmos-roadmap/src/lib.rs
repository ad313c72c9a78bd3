//! `swarmos-roadmap` – The shared map.
//!
//! Builds a probabilistic roadmap (PRM) over the camera frame that every
//! agent plans against. The arena's obstacles come straight from vision, so
//! the roadmap is regenerated whenever the scene changes.
//!
//! # Modules
//!
//! - [`geometry`] – exact segment/segment and segment/rectangle intersection
//!   tests used for edge validation.
//! - [`arena`] – [`Arena`][arena::Arena]: frame bounds, weighted obstacles,
//!   and the goal region.
//! - [`kdtree`] – [`KdTree`][kdtree::KdTree]: 2-D nearest-neighbour index for
//!   snapping agent positions onto roadmap nodes.
//! - [`prm`] – [`Roadmap`][prm::Roadmap]: sampling, radius-growth connection,
//!   and goal-component pruning.

pub mod arena;
pub mod geometry;
pub mod kdtree;
pub mod prm;

pub use arena::{Arena, Obstacle};
pub use kdtree::KdTree;
pub use prm::{Roadmap, RoadmapConfig};
