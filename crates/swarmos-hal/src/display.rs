//! Debug drawing bus.
//!
//! Localizer clouds, roadmap edges, and planned trajectories are useful to
//! see but must never block planning. [`DrawBus`] is a Tokio broadcast
//! channel: publishers fire and forget, any number of renderers subscribe,
//! and a missing renderer simply means zero receivers.

use swarmos_types::Point2;
use tokio::sync::broadcast;
use tracing::trace;

/// What to render at a position.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawShape {
    /// A dot, e.g. one particle. `weight` maps to dot size or opacity.
    Dot { weight: f32 },
    /// A line from the command's position to `to`, e.g. a roadmap edge.
    Line { to: Point2 },
    /// An outlined rectangle, e.g. an obstacle.
    Outline { width: f32, height: f32 },
}

/// One rendering intent.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    /// Which component emitted this, e.g. `"localizer/blue"`.
    pub source: String,
    pub position: Point2,
    pub shape: DrawShape,
    /// CSS-style hex colour.
    pub color: String,
}

/// Broadcast fan-out for [`DrawCommand`]s.
#[derive(Debug, Clone)]
pub struct DrawBus {
    sender: broadcast::Sender<DrawCommand>,
}

impl DrawBus {
    /// `capacity` bounds how far a slow renderer may lag before it starts
    /// missing frames.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DrawCommand> {
        self.sender.subscribe()
    }

    /// Publish an intent. Returns the number of receivers it reached; zero
    /// subscribers is normal operation, not an error.
    pub fn publish(&self, command: DrawCommand) -> usize {
        trace!(source = %command.source, "draw intent");
        self.sender.send(command).unwrap_or(0)
    }
}
