//! `swarmos-agent` – One robot's planner.
//!
//! Everything a single agent computes per tick: where it is in its approach
//! to the goal, the shortest roadmap route, and the drive command that
//! follows it.
//!
//! # Modules
//!
//! - [`state`] – [`AgentPhase`][state::AgentPhase]: the
//!   move/reaching/interact progression driven by goal distance.
//! - [`astar`] – A* over the shared roadmap with deterministic tie-breaking.
//! - [`pilot`] – [`AgentPilot`][pilot::AgentPilot]: folds an observation into
//!   the motion filter and produces the tick's trajectory and command.

pub mod astar;
pub mod pilot;
pub mod state;

pub use astar::astar;
pub use pilot::{AgentPilot, PilotConfig, TickPlan, compute_command};
pub use state::AgentPhase;
