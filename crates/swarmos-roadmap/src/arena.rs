//! Arena model: frame bounds, weighted obstacles, goal region.
//!
//! Obstacle weight scales the clearance buffer used when sampling roadmap
//! nodes: a tiny marker gets a thin buffer, a table leg a fat one. Weight
//! grows linearly with area and saturates at [`AREA_SATURATION`] px².

use serde::{Deserialize, Serialize};
use swarmos_types::{FrameBounds, Point2, Rect};

use crate::geometry;

pub const MIN_OBSTACLE_WEIGHT: f32 = 0.1;
pub const MAX_OBSTACLE_WEIGHT: f32 = 1.0;
/// Area (px²) at which an obstacle reaches full weight.
pub const AREA_SATURATION: f32 = 1000.0;

/// A vision-detected obstacle with its sampling weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub rect: Rect,
    pub weight: f32,
}

impl Obstacle {
    /// Derive the weight from the rectangle's area.
    pub fn from_rect(rect: Rect) -> Self {
        let saturated = rect.area().min(AREA_SATURATION).max(0.0) / AREA_SATURATION;
        Self {
            rect,
            weight: MIN_OBSTACLE_WEIGHT + (MAX_OBSTACLE_WEIGHT - MIN_OBSTACLE_WEIGHT) * saturated,
        }
    }
}

/// Everything the roadmap generator needs to know about the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    pub bounds: FrameBounds,
    pub obstacles: Vec<Obstacle>,
    pub goal: Option<Rect>,
}

impl Arena {
    pub fn new(bounds: FrameBounds, obstacle_rects: Vec<Rect>, goal: Option<Rect>) -> Self {
        Self {
            bounds,
            obstacles: obstacle_rects.into_iter().map(Obstacle::from_rect).collect(),
            goal,
        }
    }

    pub fn goal_center(&self) -> Option<Point2> {
        self.goal.map(|g| g.center())
    }

    /// Whether `p` keeps a weight-scaled buffer away from every obstacle.
    pub fn point_clear(&self, p: &Point2, base_buffer: f32) -> bool {
        self.obstacles
            .iter()
            .all(|o| !o.rect.expanded(base_buffer * o.weight).contains(p))
    }

    /// Whether the segment `ab` avoids every raw obstacle rectangle.
    pub fn segment_clear(&self, a: &Point2, b: &Point2) -> bool {
        self.obstacles
            .iter()
            .all(|o| !geometry::segment_intersects_rect(a, b, &o.rect))
    }
}
