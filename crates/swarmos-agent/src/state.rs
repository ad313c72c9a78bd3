//! Agent phase progression.
//!
//! Distance to the goal drives a one-way march: coarse approach, then a
//! precision leg, then interaction. Phases never move backwards, so a noisy
//! position estimate cannot bounce an agent out of its final approach.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentPhase {
    /// Far from the goal, following roadmap waypoints.
    MoveToGoal,
    /// Inside the approach threshold, closing in on the goal itself.
    ReachingGoal,
    /// Inside the precise threshold, arrived and holding.
    Interact,
}

impl AgentPhase {
    /// Advance the phase given the current goal distance. `approach` and
    /// `precise` are the two thresholds in pixels.
    pub fn advance(self, goal_distance: f32, approach: f32, precise: f32) -> AgentPhase {
        match self {
            AgentPhase::MoveToGoal if goal_distance <= approach => AgentPhase::ReachingGoal,
            AgentPhase::ReachingGoal if goal_distance <= precise => AgentPhase::Interact,
            other => other,
        }
    }
}
