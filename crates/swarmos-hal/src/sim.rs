//! In-process kinematic simulator.
//!
//! [`SimWorld`] holds ground-truth robot positions and plays back motion
//! commands kinematically. [`SimVision`] scatters pixels around the true
//! positions so the particle filter has realistic noisy input, and
//! [`SimChannel`] is an in-memory [`ActuationChannel`] wired to mpsc queues.
//! Together they close the full perception→plan→act loop without hardware.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use swarmos_types::{
    ColorTag, FrameBounds, MatchRegion, MotionCommand, Point2, Rect, ReadySignal, SwarmError,
};
use tracing::{debug, warn};

use crate::actuation::{self, ActuationChannel};
use crate::vision::{ArenaSnapshot, ArenaSource, VisionSource};

// ────────────────────────────────────────────────────────────────────────────
// SimWorld
// ────────────────────────────────────────────────────────────────────────────

/// Ground truth for a simulated arena.
#[derive(Debug)]
pub struct SimWorld {
    bounds: FrameBounds,
    /// How fast a robot rolls while executing a command, px/s.
    nominal_speed: f32,
    /// Half-width of the uniform pixel scatter around each tag, px.
    scatter: f32,
    points_per_tag: usize,
    agents: HashMap<String, (ColorTag, Point2)>,
    rng: StdRng,
}

impl SimWorld {
    pub fn new(bounds: FrameBounds, nominal_speed: f32, seed: u64) -> Self {
        Self {
            bounds,
            nominal_speed,
            scatter: 4.0,
            points_per_tag: 12,
            agents: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Drop a robot into the world at a known position.
    pub fn place(&mut self, agent_id: impl Into<String>, color: ColorTag, position: Point2) {
        self.agents.insert(agent_id.into(), (color, position));
    }

    pub fn position_of(&self, agent_id: &str) -> Option<Point2> {
        self.agents.get(agent_id).map(|(_, p)| *p)
    }

    /// Roll the addressed robot along the commanded heading for the
    /// commanded duration, clamped to the frame.
    pub fn apply_command(&mut self, command: &MotionCommand) {
        let Some((_, position)) = self.agents.get_mut(&command.agent_id) else {
            warn!(agent = %command.agent_id, "command for unknown agent ignored");
            return;
        };
        let distance = self.nominal_speed * command.duration_seconds;
        let heading = command.heading_degrees.to_radians();
        let moved = Point2::new(
            position.x + heading.sin() * distance,
            position.y - heading.cos() * distance,
        );
        *position = self.bounds.clamp(moved);
        debug!(agent = %command.agent_id, x = position.x, y = position.y, "sim moved");
    }

    /// Noisy pixel cloud around the tag of `color`, or an empty region when
    /// no robot wears it.
    pub fn match_region(&mut self, color: ColorTag) -> MatchRegion {
        let center = self
            .agents
            .values()
            .find(|(c, _)| *c == color)
            .map(|(_, p)| *p);
        let points = match center {
            Some(center) => (0..self.points_per_tag)
                .map(|_| {
                    let dx = self.rng.gen_range(-self.scatter..self.scatter);
                    let dy = self.rng.gen_range(-self.scatter..self.scatter);
                    self.bounds.clamp(Point2::new(center.x + dx, center.y + dy))
                })
                .collect(),
            None => Vec::new(),
        };
        MatchRegion {
            color,
            points,
            bounds: self.bounds,
        }
    }
}

/// [`VisionSource`] view over a shared [`SimWorld`].
#[derive(Debug, Clone)]
pub struct SimVision {
    world: Arc<Mutex<SimWorld>>,
}

impl SimVision {
    pub fn new(world: Arc<Mutex<SimWorld>>) -> Self {
        Self { world }
    }
}

impl VisionSource for SimVision {
    fn match_region(&mut self, color: ColorTag) -> Result<MatchRegion, SwarmError> {
        let mut world = self.world.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(world.match_region(color))
    }
}

/// Fixed obstacle/goal layout, for worlds where the scene never changes.
#[derive(Debug, Clone)]
pub struct StaticArena {
    snapshot: ArenaSnapshot,
}

impl StaticArena {
    pub fn new(bounds: FrameBounds, obstacles: Vec<Rect>, goal: Option<Rect>) -> Self {
        Self {
            snapshot: ArenaSnapshot {
                bounds,
                obstacles,
                goal,
            },
        }
    }
}

impl ArenaSource for StaticArena {
    fn arena_snapshot(&mut self) -> Result<ArenaSnapshot, SwarmError> {
        Ok(self.snapshot.clone())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimChannel
// ────────────────────────────────────────────────────────────────────────────

/// Far ends of a [`SimChannel`]: the simulator drains commands from
/// `commands` and pushes raw ready envelopes into the per-agent senders.
#[derive(Debug)]
pub struct SimChannelEnds {
    pub commands: mpsc::Receiver<MotionCommand>,
    pub ready: HashMap<String, mpsc::Sender<String>>,
}

/// In-memory [`ActuationChannel`] over mpsc queues.
#[derive(Debug)]
pub struct SimChannel {
    commands: Mutex<mpsc::Sender<MotionCommand>>,
    ready: HashMap<String, Mutex<mpsc::Receiver<String>>>,
}

impl SimChannel {
    /// Build the channel plus its simulator-side ends for `agent_ids`.
    pub fn new(agent_ids: &[String]) -> (Self, SimChannelEnds) {
        let (command_tx, command_rx) = mpsc::channel();
        let mut ready_rx = HashMap::new();
        let mut ready_tx = HashMap::new();
        for id in agent_ids {
            let (tx, rx) = mpsc::channel();
            ready_tx.insert(id.clone(), tx);
            ready_rx.insert(id.clone(), Mutex::new(rx));
        }
        (
            Self {
                commands: Mutex::new(command_tx),
                ready: ready_rx,
            },
            SimChannelEnds {
                commands: command_rx,
                ready: ready_tx,
            },
        )
    }
}

impl ActuationChannel for SimChannel {
    fn send(&self, command: &MotionCommand) -> Result<(), SwarmError> {
        let sender = self.commands.lock().unwrap_or_else(PoisonError::into_inner);
        sender
            .send(command.clone())
            .map_err(|_| SwarmError::Channel("command queue disconnected".to_string()))
    }

    fn recv_ready(&self, agent_id: &str) -> Result<ReadySignal, SwarmError> {
        let receiver = self.ready.get(agent_id).ok_or_else(|| {
            SwarmError::Channel(format!("no ready queue for agent {agent_id}"))
        })?;
        let receiver = receiver.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let raw = receiver
                .recv()
                .map_err(|_| SwarmError::Channel("ready queue disconnected".to_string()))?;
            match actuation::decode_ready(&raw) {
                Ok(signal) => return Ok(signal),
                Err(reason) => {
                    warn!(agent = agent_id, %reason, "dropping malformed inbound message");
                }
            }
        }
    }
}
