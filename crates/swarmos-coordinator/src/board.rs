//! The trajectory barrier.
//!
//! One slot per active agent. Agent threads are the only writers; the single
//! coordinator thread drains the board once every slot is filled. Two
//! condition variables carry the handshake: `submitted` wakes the coordinator
//! as slots fill, `dispatched` wakes the agents once their commands for the
//! tick are posted. Ticks never overlap — the next tick's submissions land
//! in slots the previous dispatch has already cleared.
//!
//! An agent whose planning failed submits a skip so the barrier still
//! releases; an agent that reaches its goal retires, shrinking the quorum.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use swarmos_types::{MotionCommand, Point2, Trajectory};
use tracing::debug;

/// Everything one agent files at the barrier for one tick: its planned
/// trajectory, the command it would send unmodified, and the kinematic state
/// the coordinator needs to re-time a rerouted waypoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TickSubmission {
    pub trajectory: Trajectory,
    pub command: MotionCommand,
    pub position: Point2,
    pub speed: f32,
}

/// Result of waiting on the barrier.
#[derive(Debug)]
pub enum Collection {
    /// Quorum reached: the tick number and every slot, sorted by agent id.
    /// `None` entries are skipped ticks.
    Ready(u64, Vec<(String, Option<TickSubmission>)>),
    /// Every agent has retired; there is nothing left to coordinate.
    AllRetired,
    /// The quorum did not fill within the timeout. By design a hung agent
    /// stalls the fleet; this variant exists so the caller can log it.
    TimedOut,
}

#[derive(Debug, Default)]
struct BoardState {
    expected: usize,
    tick: u64,
    closed: bool,
    slots: HashMap<String, Option<TickSubmission>>,
    commands: HashMap<String, MotionCommand>,
}

/// Lock-and-condvar barrier between agent threads and the coordinator.
#[derive(Debug)]
pub struct TrajectoryBoard {
    state: Mutex<BoardState>,
    submitted: Condvar,
    dispatched: Condvar,
}

impl TrajectoryBoard {
    pub fn new(expected_agents: usize) -> Self {
        Self {
            state: Mutex::new(BoardState {
                expected: expected_agents,
                ..BoardState::default()
            }),
            submitted: Condvar::new(),
            dispatched: Condvar::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn expected(&self) -> usize {
        self.lock().expected
    }

    /// File a trajectory for the current tick. Returns the tick it was filed
    /// under, which the agent passes to [`TrajectoryBoard::await_dispatch`];
    /// `None` once the board has been closed.
    pub fn submit(&self, agent_id: &str, submission: TickSubmission) -> Option<u64> {
        self.file(agent_id, Some(submission))
    }

    /// File an empty slot so a failed planning tick does not stall the
    /// barrier. No command will be dispatched to this agent this tick.
    pub fn submit_skip(&self, agent_id: &str) -> Option<u64> {
        self.file(agent_id, None)
    }

    fn file(&self, agent_id: &str, entry: Option<TickSubmission>) -> Option<u64> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }
        state.slots.insert(agent_id.to_string(), entry);
        let tick = state.tick;
        debug!(agent = agent_id, tick, filled = state.slots.len(), "slot filed");
        drop(state);
        self.submitted.notify_all();
        Some(tick)
    }

    /// Shut the barrier down: pending and future waits return immediately and
    /// submissions are refused. Used when the session ends with agents still
    /// running.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        drop(state);
        self.submitted.notify_all();
        self.dispatched.notify_all();
    }

    /// Remove an agent from the quorum permanently (goal reached or gone).
    pub fn retire(&self, agent_id: &str) {
        let mut state = self.lock();
        state.expected = state.expected.saturating_sub(1);
        state.slots.remove(agent_id);
        debug!(agent = agent_id, remaining = state.expected, "agent retired");
        drop(state);
        self.submitted.notify_all();
    }

    /// Block until every active agent has filed, then hand back the slots.
    /// Slots stay on the board until [`TrajectoryBoard::complete_tick`]
    /// clears them.
    pub fn collect(&self, timeout: Duration) -> Collection {
        let state = self.lock();
        let (state, wait) = self
            .submitted
            .wait_timeout_while(state, timeout, |s| {
                s.expected > 0 && s.slots.len() < s.expected
            })
            .unwrap_or_else(PoisonError::into_inner);
        if state.expected == 0 {
            return Collection::AllRetired;
        }
        if wait.timed_out() && state.slots.len() < state.expected {
            return Collection::TimedOut;
        }
        let mut entries: Vec<(String, Option<TickSubmission>)> = state
            .slots
            .iter()
            .map(|(id, sub)| (id.clone(), sub.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Collection::Ready(state.tick, entries)
    }

    /// Post the tick's commands, clear the slots, advance the tick counter,
    /// and release every agent blocked in [`TrajectoryBoard::await_dispatch`].
    pub fn complete_tick(&self, commands: HashMap<String, MotionCommand>) {
        let mut state = self.lock();
        state.commands = commands;
        state.slots.clear();
        state.tick += 1;
        debug!(tick = state.tick, "tick dispatched");
        drop(state);
        self.dispatched.notify_all();
    }

    /// Block until the tick the agent submitted under has been dispatched,
    /// then take this agent's command. `None` means the tick was dispatched
    /// without a command for this agent (its slot was a skip), or the wait
    /// timed out.
    pub fn await_dispatch(
        &self,
        agent_id: &str,
        submitted_tick: u64,
        timeout: Duration,
    ) -> Option<MotionCommand> {
        let state = self.lock();
        let (mut state, _) = self
            .dispatched
            .wait_timeout_while(state, timeout, |s| !s.closed && s.tick <= submitted_tick)
            .unwrap_or_else(PoisonError::into_inner);
        if state.tick <= submitted_tick {
            return None;
        }
        state.commands.remove(agent_id)
    }
}
