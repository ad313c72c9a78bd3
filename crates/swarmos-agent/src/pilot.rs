//! Per-tick planning for one agent.
//!
//! The [`AgentPilot`] owns the agent's motion filter and phase. Each tick it
//! folds the localizer's observation into the filter, snaps the filtered
//! position and the goal onto the roadmap, runs A*, and produces a
//! [`TickPlan`]: the trajectory for the coordinator's collision check plus a
//! candidate command and the kinematic state needed to recompute that command
//! if the coordinator reroutes the agent.

use swarmos_perception::motion::{MotionFilter, MotionFilterConfig};
use swarmos_roadmap::{Arena, Roadmap};
use swarmos_types::{ColorTag, MotionCommand, Observation, Point2, SwarmError, Trajectory};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::astar;
use crate::state::AgentPhase;

// Guards the duration division when the filter reports near-zero speed.
const SPEED_EPSILON: f32 = 1e-6;

/// Planner thresholds and limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PilotConfig {
    /// Goal distance at which `MoveToGoal` becomes `ReachingGoal`, px.
    pub approach_threshold: f32,
    /// Goal distance at which `ReachingGoal` becomes `Interact`, px.
    pub precise_threshold: f32,
    /// Upper bound on command duration, seconds.
    pub max_duration: f32,
    /// Position delta below which the agent counts as not having moved, px.
    pub stuck_position_epsilon: f32,
    /// Heading delta below which the heading counts as unchanged, degrees.
    pub stuck_heading_epsilon: f32,
    /// How close to the frame edge "near the boundary" means, px.
    pub boundary_margin: f32,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            approach_threshold: 100.0,
            precise_threshold: 40.0,
            max_duration: 5.0,
            stuck_position_epsilon: 2.0,
            stuck_heading_epsilon: 5.0,
            boundary_margin: 30.0,
        }
    }
}

/// Everything one agent hands the coordinator for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickPlan {
    pub trajectory: Trajectory,
    /// Command the agent would send if the coordinator leaves it alone.
    pub command: MotionCommand,
    pub position: Point2,
    pub speed: f32,
}

/// Command computation shared with the coordinator so rerouted waypoints are
/// aimed and timed identically to original ones: heading points at the
/// waypoint, duration covers the distance at the filter's speed estimate.
pub fn compute_command(
    agent_id: &str,
    position: Point2,
    waypoint: Point2,
    speed: f32,
    config: &PilotConfig,
) -> MotionCommand {
    let distance = position.distance(&waypoint);
    let duration = (distance / (speed + SPEED_EPSILON)).min(config.max_duration);
    MotionCommand::new(agent_id, position.heading_to(&waypoint), duration)
}

/// One robot's planner: motion filter, phase machine, and route computation.
#[derive(Debug)]
pub struct AgentPilot {
    id: String,
    color: ColorTag,
    goal: Point2,
    phase: AgentPhase,
    filter: MotionFilter,
    config: PilotConfig,
    last_position: Option<Point2>,
    last_heading: Option<f32>,
}

impl AgentPilot {
    pub fn new(
        id: impl Into<String>,
        color: ColorTag,
        goal: Point2,
        initial_position: Point2,
        config: PilotConfig,
        filter_config: MotionFilterConfig,
    ) -> Self {
        Self {
            id: id.into(),
            color,
            goal,
            phase: AgentPhase::MoveToGoal,
            filter: MotionFilter::new(initial_position, filter_config),
            config,
            last_position: None,
            last_heading: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn color(&self) -> ColorTag {
        self.color
    }

    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    /// Whether the agent has arrived and holds position.
    pub fn is_done(&self) -> bool {
        self.phase == AgentPhase::Interact
    }

    pub fn position(&self) -> Point2 {
        self.filter.position()
    }

    /// Run one planning tick. Fails when the roadmap cannot serve a route;
    /// the caller skips the tick and the agent stays put.
    pub fn plan_tick(
        &mut self,
        observation: &Observation,
        roadmap: &Roadmap,
        arena: &Arena,
    ) -> Result<TickPlan, SwarmError> {
        self.filter.predict();
        self.filter.update(observation.mean, observation.confidence);
        let position = self.filter.position();
        let speed = self.filter.speed();

        let goal_distance = position.distance(&self.goal);
        let previous_phase = self.phase;
        self.phase = self.phase.advance(
            goal_distance,
            self.config.approach_threshold,
            self.config.precise_threshold,
        );
        if self.phase != previous_phase {
            info!(agent = %self.id, phase = ?self.phase, goal_distance, "phase transition");
        }

        if roadmap.is_empty() {
            return Err(SwarmError::Planning {
                agent_id: self.id.clone(),
                reason: "roadmap is empty".to_string(),
            });
        }
        let start_node = roadmap.nearest(&position).ok_or_else(|| SwarmError::Planning {
            agent_id: self.id.clone(),
            reason: "no node near current position".to_string(),
        })?;
        let goal_node = roadmap.nearest(&self.goal).ok_or_else(|| SwarmError::Planning {
            agent_id: self.id.clone(),
            reason: "no node near goal".to_string(),
        })?;
        let path = astar::astar(roadmap, start_node, goal_node).ok_or_else(|| {
            SwarmError::Planning {
                agent_id: self.id.clone(),
                reason: format!("no path from node {start_node} to node {goal_node}"),
            }
        })?;

        let trajectory = Trajectory {
            agent_id: self.id.clone(),
            points: astar::path_points(roadmap, &path),
            node_indices: path,
            start_node,
            goal_node,
        };

        // During the final approach the roadmap is too coarse: steer at the
        // goal itself. Once interacting, hold position.
        let target = match self.phase {
            AgentPhase::MoveToGoal => trajectory
                .next_waypoint()
                .map(|(_, p)| p)
                .unwrap_or(self.goal),
            AgentPhase::ReachingGoal => self.goal,
            AgentPhase::Interact => position,
        };

        let mut command = compute_command(&self.id, position, target, speed, &self.config);
        let filter_heading = self.filter.heading_degrees();
        if self.is_stuck_on_boundary_obstacle(position, filter_heading, arena) {
            warn!(agent = %self.id, "pinned against a boundary obstacle, inverting heading");
            command = MotionCommand::new(
                &self.id,
                command.heading_degrees + 180.0,
                command.duration_seconds,
            );
        }
        self.last_position = Some(position);
        self.last_heading = Some(filter_heading);

        debug!(
            agent = %self.id,
            x = position.x,
            y = position.y,
            speed,
            heading = command.heading_degrees,
            duration = command.duration_seconds,
            "tick planned"
        );
        Ok(TickPlan {
            trajectory,
            command,
            position,
            speed,
        })
    }

    /// Stuck test: no movement and no turn since the previous tick, while
    /// sitting on an obstacle region hugging the frame edge.
    fn is_stuck_on_boundary_obstacle(
        &self,
        position: Point2,
        heading: f32,
        arena: &Arena,
    ) -> bool {
        let (Some(last_pos), Some(last_heading)) = (self.last_position, self.last_heading) else {
            return false;
        };
        if position.distance(&last_pos) > self.config.stuck_position_epsilon {
            return false;
        }
        let turn = (heading - last_heading).rem_euclid(360.0);
        let turn = turn.min(360.0 - turn);
        if turn > self.config.stuck_heading_epsilon {
            return false;
        }
        let near_edge = position.x <= self.config.boundary_margin
            || position.y <= self.config.boundary_margin
            || position.x >= arena.bounds.width - self.config.boundary_margin
            || position.y >= arena.bounds.height - self.config.boundary_margin;
        near_edge
            && arena
                .obstacles
                .iter()
                .any(|o| o.rect.contains(&position))
    }
}
