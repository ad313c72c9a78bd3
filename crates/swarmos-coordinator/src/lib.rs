//! `swarmos-coordinator` – Round-synchronous fleet control.
//!
//! Agents plan concurrently but nothing moves until everyone has spoken:
//! a barrier collects one trajectory per active agent per tick, collision
//! risk is evaluated over the full set, conflicting agents are rerouted,
//! and only then are commands dispatched.
//!
//! # Modules
//!
//! - [`board`] – [`TrajectoryBoard`][board::TrajectoryBoard]: the
//!   lock-and-condvar barrier agents submit into and wait on.
//! - [`risk`] – pairwise minimum-distance collision flagging.
//! - [`coordinator`] – [`Coordinator`][coordinator::Coordinator]: one tick of
//!   collect → flag → reroute → dispatch.

pub mod board;
pub mod coordinator;
pub mod risk;

pub use board::{Collection, TickSubmission, TrajectoryBoard};
pub use coordinator::{Coordinator, TickOutcome, TickReport};
