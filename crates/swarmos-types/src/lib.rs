//! `swarmos-types` – Shared vocabulary of the swarm.
//!
//! Plain data types exchanged between perception, planning, coordination, and
//! the hardware abstraction layer. Everything here is `Serialize`/`Deserialize`
//! so the same structs travel over the wire, land in logs, and drive tests.
//!
//! All coordinates are image-frame pixels: `x` grows rightwards, `y` grows
//! downwards, and headings are compass-style degrees where `0°` points up
//! (towards decreasing `y`) and `90°` points right.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Geometry primitives
// ─────────────────────────────────────────────────────────────────────────────

/// A point in the overhead camera frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point2) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Compass heading from `self` towards `target`, in degrees `[0, 360)`.
    /// `0°` is straight up in the image (decreasing `y`).
    pub fn heading_to(&self, target: &Point2) -> f32 {
        let dx = target.x - self.x;
        let dy = target.y - self.y;
        dx.atan2(-dy).to_degrees().rem_euclid(360.0)
    }
}

/// Axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point2 {
        Point2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn contains(&self, p: &Point2) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    /// The same rectangle grown by `margin` pixels on every side.
    pub fn expanded(&self, margin: f32) -> Rect {
        Rect::new(
            self.x - margin,
            self.y - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }
}

/// Dimensions of the overhead camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameBounds {
    pub width: f32,
    pub height: f32,
}

impl FrameBounds {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point2 {
        Point2::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn contains(&self, p: &Point2) -> bool {
        p.x >= 0.0 && p.x <= self.width && p.y >= 0.0 && p.y <= self.height
    }

    /// Clamp a point into the frame.
    pub fn clamp(&self, p: Point2) -> Point2 {
        Point2::new(p.x.clamp(0.0, self.width), p.y.clamp(0.0, self.height))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Vision
// ─────────────────────────────────────────────────────────────────────────────

/// Colour tag mounted on top of each robot, used by the overhead camera to
/// tell agents apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorTag {
    Blue,
    Red,
    Green,
    Cyan,
    Yellow,
}

impl ColorTag {
    /// Hex string used when rendering debug overlays for this tag.
    pub fn as_hex(&self) -> &'static str {
        match self {
            ColorTag::Blue => "#0000ff",
            ColorTag::Red => "#ff0000",
            ColorTag::Green => "#00ff00",
            ColorTag::Cyan => "#00ffff",
            ColorTag::Yellow => "#ffff00",
        }
    }
}

impl std::fmt::Display for ColorTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ColorTag::Blue => "blue",
            ColorTag::Red => "red",
            ColorTag::Green => "green",
            ColorTag::Cyan => "cyan",
            ColorTag::Yellow => "yellow",
        };
        write!(f, "{name}")
    }
}

/// Pixels in the camera frame that matched one colour tag, plus the frame they
/// came from. Empty `points` means the tag was not seen this frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRegion {
    pub color: ColorTag,
    pub points: Vec<Point2>,
    pub bounds: FrameBounds,
}

/// A position estimate produced by the localizer: the fitted mean, the 2×2
/// sample covariance of the surviving particles, and a confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub mean: Point2,
    pub covariance: [[f32; 2]; 2],
    pub confidence: f32,
}

impl Observation {
    /// Estimate used when the tag is invisible: frame centre, identity
    /// covariance, zero confidence.
    pub fn fallback(bounds: &FrameBounds) -> Self {
        Self {
            mean: bounds.center(),
            covariance: [[1.0, 0.0], [0.0, 1.0]],
            confidence: 0.0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Planning and actuation
// ─────────────────────────────────────────────────────────────────────────────

/// One agent's planned route through the roadmap for the current tick.
/// `node_indices` and `points` are parallel; index `0` is the node the agent
/// was snapped to and the last entry is the goal node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub agent_id: String,
    pub node_indices: Vec<usize>,
    pub points: Vec<Point2>,
    pub start_node: usize,
    pub goal_node: usize,
}

impl Trajectory {
    /// The node the agent should steer towards this tick: the second node on
    /// the path, or the snapped start when the path is a single node.
    pub fn next_waypoint(&self) -> Option<(usize, Point2)> {
        match (self.node_indices.get(1), self.points.get(1)) {
            (Some(&i), Some(&p)) => Some((i, p)),
            _ => self
                .node_indices
                .first()
                .zip(self.points.first())
                .map(|(&i, &p)| (i, p)),
        }
    }
}

/// Heading-and-duration drive command sent to one robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionCommand {
    pub agent_id: String,
    /// Compass heading in degrees, normalised to `[0, 360)`.
    pub heading_degrees: f32,
    /// How long to roll at nominal speed, in seconds. Never negative.
    pub duration_seconds: f32,
}

impl MotionCommand {
    /// Build a command with the heading wrapped into `[0, 360)` and the
    /// duration clamped to be finite and non-negative.
    pub fn new(agent_id: impl Into<String>, heading_degrees: f32, duration_seconds: f32) -> Self {
        let duration = if duration_seconds.is_finite() {
            duration_seconds.max(0.0)
        } else {
            0.0
        };
        Self {
            agent_id: agent_id.into(),
            heading_degrees: heading_degrees.rem_euclid(360.0),
            duration_seconds: duration,
        }
    }
}

/// Inbound notification that a robot finished its last command and is ready
/// for the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadySignal {
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ReadySignal {
    pub fn now(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            timestamp: Utc::now(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Global error type spanning vision faults, planning failures, and transport
/// problems.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum SwarmError {
    #[error("Vision fault on {source_id}: {details}")]
    Vision { source_id: String, details: String },

    #[error("Roadmap is empty or has no goal node")]
    EmptyRoadmap,

    #[error("Planning failed for {agent_id}: {reason}")]
    Planning { agent_id: String, reason: String },

    #[error("Actuation channel error: {0}")]
    Channel(String),

    #[error("Malformed inbound message: {0}")]
    MalformedMessage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}
