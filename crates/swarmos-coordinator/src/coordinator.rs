//! One tick of fleet coordination.
//!
//! Collect → flag → reroute → dispatch. The coordinator never plans from
//! scratch: it re-runs A* only for flagged pairs, swaps shared nodes for
//! free neighbours where the graph allows it, and re-times the affected
//! agents' commands using the kinematics they submitted. Roadmap
//! regeneration is the caller's job once the tick report comes back.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use swarmos_agent::pilot::{self, PilotConfig};
use swarmos_agent::astar;
use swarmos_hal::ActuationChannel;
use swarmos_roadmap::Roadmap;
use swarmos_types::{MotionCommand, Trajectory};
use tracing::{debug, info, warn};

use crate::board::{Collection, TickSubmission, TrajectoryBoard};
use crate::risk;

/// What happened during one call to [`Coordinator::run_tick`].
#[derive(Debug)]
pub enum TickOutcome {
    Dispatched(TickReport),
    /// Every agent has retired; the session is over.
    AllRetired,
    /// The barrier did not fill in time. Nothing was dispatched.
    Stalled,
}

/// Per-tick accounting, for logs and tests.
#[derive(Debug, Default)]
pub struct TickReport {
    pub tick: u64,
    pub dispatched: usize,
    pub skipped: usize,
    /// Agent id pairs whose trajectories fell inside the risk threshold.
    pub flagged: Vec<(String, String)>,
    /// Agents whose path was actually modified.
    pub rerouted: Vec<String>,
}

/// The single coordinator task of a session.
pub struct Coordinator<C: ActuationChannel> {
    board: Arc<TrajectoryBoard>,
    channel: Arc<C>,
    pilot_config: PilotConfig,
    risk_threshold: f32,
    barrier_timeout: Duration,
}

impl<C: ActuationChannel> Coordinator<C> {
    pub fn new(
        board: Arc<TrajectoryBoard>,
        channel: Arc<C>,
        pilot_config: PilotConfig,
        risk_threshold: f32,
        barrier_timeout: Duration,
    ) -> Self {
        Self {
            board,
            channel,
            pilot_config,
            risk_threshold,
            barrier_timeout,
        }
    }

    /// Wait out the barrier, reconcile the tick's trajectories, and dispatch
    /// commands.
    pub fn run_tick(&self, roadmap: &Roadmap) -> TickOutcome {
        let (tick, entries) = match self.board.collect(self.barrier_timeout) {
            Collection::Ready(tick, entries) => (tick, entries),
            Collection::AllRetired => return TickOutcome::AllRetired,
            Collection::TimedOut => {
                warn!("barrier did not fill, fleet tick stalled");
                return TickOutcome::Stalled;
            }
        };

        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };
        let mut submissions: Vec<(String, TickSubmission)> = Vec::new();
        for (id, entry) in entries {
            match entry {
                Some(sub) => submissions.push((id, sub)),
                None => report.skipped += 1,
            }
        }

        let trajectories: Vec<&Trajectory> =
            submissions.iter().map(|(_, s)| &s.trajectory).collect();
        let flagged = risk::flagged_pairs(&trajectories, self.risk_threshold);
        for &(i, j) in &flagged {
            report
                .flagged
                .push((submissions[i].0.clone(), submissions[j].0.clone()));
        }

        for (i, j) in flagged {
            let (ri, rj) = self.reroute_pair(roadmap, &mut submissions, i, j);
            if ri {
                report.rerouted.push(submissions[i].0.clone());
            }
            if rj {
                report.rerouted.push(submissions[j].0.clone());
            }
        }

        let mut commands: HashMap<String, MotionCommand> = HashMap::new();
        for (id, sub) in &submissions {
            commands.insert(id.clone(), sub.command.clone());
        }
        for command in commands.values() {
            match self.channel.send(command) {
                Ok(()) => report.dispatched += 1,
                // Transient transport failure: the robot misses one command,
                // planning state is untouched.
                Err(e) => warn!(agent = %command.agent_id, error = %e, "dispatch failed"),
            }
        }
        self.board.complete_tick(commands);

        info!(
            tick = report.tick,
            dispatched = report.dispatched,
            skipped = report.skipped,
            flagged = report.flagged.len(),
            rerouted = report.rerouted.len(),
            "tick complete"
        );
        TickOutcome::Dispatched(report)
    }

    /// Re-plan a flagged pair and steer them off shared nodes. Returns which
    /// of the two submissions actually changed.
    fn reroute_pair(
        &self,
        roadmap: &Roadmap,
        submissions: &mut [(String, TickSubmission)],
        i: usize,
        j: usize,
    ) -> (bool, bool) {
        let path_i = self.replan(roadmap, &submissions[i].1);
        let mut path_j = self.replan(roadmap, &submissions[j].1);

        // Both agents may legitimately share the goal node itself; everything
        // else shared gets substituted away, preferring to move the
        // second agent of the pair.
        let goal_j = submissions[j].1.trajectory.goal_node;
        let shared: Vec<usize> = path_i
            .iter()
            .copied()
            .filter(|n| *n != goal_j && path_j.contains(n))
            .collect();
        let mut moved_j = false;
        for node in shared {
            if let Some(substitute) = free_neighbor(roadmap, node, &path_i, &path_j) {
                if let Some(slot) = path_j.iter().position(|&n| n == node) {
                    debug!(
                        agent = %submissions[j].0,
                        from = node,
                        to = substitute,
                        "substituting shared node"
                    );
                    path_j[slot] = substitute;
                    moved_j = true;
                }
            }
        }
        if !moved_j {
            // No alternative anywhere on the graph: best-effort avoidance
            // falls back to the unmodified plans.
            return (false, false);
        }

        let changed_i = self.apply_path(roadmap, &mut submissions[i].1, path_i);
        let changed_j = self.apply_path(roadmap, &mut submissions[j].1, path_j);
        (changed_i, changed_j)
    }

    /// Fresh A* between the submission's snapped endpoints, falling back to
    /// the submitted path when the graph has shifted underneath it.
    fn replan(&self, roadmap: &Roadmap, sub: &TickSubmission) -> Vec<usize> {
        astar::astar(roadmap, sub.trajectory.start_node, sub.trajectory.goal_node)
            .unwrap_or_else(|| sub.trajectory.node_indices.clone())
    }

    /// Install `path` into the submission and re-time its command for the
    /// (possibly new) next waypoint. Returns whether anything changed.
    fn apply_path(
        &self,
        roadmap: &Roadmap,
        sub: &mut TickSubmission,
        path: Vec<usize>,
    ) -> bool {
        if path == sub.trajectory.node_indices {
            return false;
        }
        sub.trajectory.points = astar::path_points(roadmap, &path);
        sub.trajectory.node_indices = path;
        if let Some((_, waypoint)) = sub.trajectory.next_waypoint() {
            sub.command = pilot::compute_command(
                &sub.trajectory.agent_id,
                sub.position,
                waypoint,
                sub.speed,
                &self.pilot_config,
            );
        }
        true
    }
}

/// A neighbour of `node` that sits on neither path and still links the
/// path's surrounding nodes, so the substituted route stays on real edges.
fn free_neighbor(
    roadmap: &Roadmap,
    node: usize,
    path_a: &[usize],
    path_b: &[usize],
) -> Option<usize> {
    let slot = path_b.iter().position(|&n| n == node)?;
    let prev = slot.checked_sub(1).map(|s| path_b[s]);
    let next = path_b.get(slot + 1).copied();
    roadmap
        .neighbors(node)
        .iter()
        .copied()
        .find(|&candidate| {
            !path_a.contains(&candidate)
                && !path_b.contains(&candidate)
                && prev.is_none_or(|p| roadmap.neighbors(p).contains(&candidate))
                && next.is_none_or(|n| roadmap.neighbors(n).contains(&candidate))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use swarmos_types::{Point2, ReadySignal, SwarmError};

    /// Records dispatched commands; can be told to fail.
    struct MockChannel {
        sent: Mutex<Vec<MotionCommand>>,
        fail: bool,
    }

    impl MockChannel {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn sent(&self) -> Vec<MotionCommand> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl ActuationChannel for MockChannel {
        fn send(&self, command: &MotionCommand) -> Result<(), SwarmError> {
            if self.fail {
                return Err(SwarmError::Channel("mock failure".to_string()));
            }
            self.sent.lock().unwrap().push(command.clone());
            Ok(())
        }

        fn recv_ready(&self, agent_id: &str) -> Result<ReadySignal, SwarmError> {
            Ok(ReadySignal::now(agent_id))
        }
    }

    /// Diamond graph: both sides want to route through the pinch node 3.
    ///
    /// ```text
    ///        3 (200,100)
    ///      /   \
    /// 1 (0,200) 0 (200,200)  ← goal
    ///      \   /
    ///        4 (200,300)     ← 2 (400,200) connects to 3, 4
    /// ```
    fn pinch_roadmap() -> Roadmap {
        Roadmap::from_parts(
            vec![
                Point2::new(200.0, 200.0), // 0: goal
                Point2::new(0.0, 200.0),   // 1: left start
                Point2::new(400.0, 200.0), // 2: right start
                Point2::new(200.0, 100.0), // 3: pinch, slightly shorter
                Point2::new(200.0, 300.0), // 4: free alternative
            ],
            vec![
                vec![3, 4],       // 0
                vec![3, 4],       // 1
                vec![3, 4],       // 2
                vec![0, 1, 2, 4], // 3
                vec![0, 1, 2, 3], // 4
            ],
        )
    }

    fn submission_via(agent_id: &str, roadmap: &Roadmap, path: Vec<usize>) -> TickSubmission {
        let points = astar::path_points(roadmap, &path);
        let position = points[0];
        let start_node = path[0];
        TickSubmission {
            trajectory: Trajectory {
                agent_id: agent_id.to_string(),
                points,
                node_indices: path,
                start_node,
                goal_node: 0,
            },
            command: MotionCommand::new(agent_id, 90.0, 2.0),
            position,
            speed: 20.0,
        }
    }

    fn coordinator(channel: Arc<MockChannel>, board: Arc<TrajectoryBoard>) -> Coordinator<MockChannel> {
        Coordinator::new(
            board,
            channel,
            PilotConfig::default(),
            50.0,
            Duration::from_secs(2),
        )
    }

    #[test]
    fn conflicting_pair_is_rerouted_off_the_shared_node() {
        let roadmap = pinch_roadmap();
        let board = Arc::new(TrajectoryBoard::new(2));
        let channel = Arc::new(MockChannel::new());
        let coord = coordinator(Arc::clone(&channel), Arc::clone(&board));

        // Both shortest paths pinch through node 3.
        board.submit("amber", submission_via("amber", &roadmap, vec![1, 3, 0]));
        board.submit("teal", submission_via("teal", &roadmap, vec![2, 3, 0]));

        let TickOutcome::Dispatched(report) = coord.run_tick(&roadmap) else {
            panic!("expected a dispatched tick");
        };
        assert_eq!(
            report.flagged,
            vec![("amber".to_string(), "teal".to_string())]
        );
        assert!(
            report.rerouted.contains(&"teal".to_string()),
            "no agent was moved off the pinch node: {report:?}"
        );
        assert_eq!(report.dispatched, 2);
        assert_eq!(channel.sent().len(), 2);
    }

    #[test]
    fn distant_agents_dispatch_unmodified() {
        // Two disjoint graphs folded into one node set, far apart.
        let roadmap = Roadmap::from_parts(
            vec![
                Point2::new(0.0, 0.0),     // goal a
                Point2::new(100.0, 0.0),   // start a
                Point2::new(900.0, 900.0), // goal b (used as plain node)
                Point2::new(800.0, 900.0), // start b
            ],
            vec![vec![1], vec![0], vec![3], vec![2]],
        );
        let board = Arc::new(TrajectoryBoard::new(2));
        let channel = Arc::new(MockChannel::new());
        let coord = coordinator(Arc::clone(&channel), Arc::clone(&board));

        let a = submission_via("amber", &roadmap, vec![1, 0]);
        let mut b = submission_via("teal", &roadmap, vec![3, 2]);
        b.trajectory.goal_node = 2;
        let original_b = b.command.clone();
        board.submit("amber", a);
        board.submit("teal", b);

        let TickOutcome::Dispatched(report) = coord.run_tick(&roadmap) else {
            panic!("expected a dispatched tick");
        };
        assert!(report.flagged.is_empty());
        assert!(report.rerouted.is_empty());
        let sent = channel.sent();
        let teal = sent.iter().find(|c| c.agent_id == "teal").unwrap();
        assert_eq!(*teal, original_b);
    }

    #[test]
    fn skipped_agents_count_but_do_not_dispatch() {
        let roadmap = pinch_roadmap();
        let board = Arc::new(TrajectoryBoard::new(2));
        let channel = Arc::new(MockChannel::new());
        let coord = coordinator(Arc::clone(&channel), Arc::clone(&board));

        board.submit("amber", submission_via("amber", &roadmap, vec![1, 3, 0]));
        board.submit_skip("teal");

        let TickOutcome::Dispatched(report) = coord.run_tick(&roadmap) else {
            panic!("expected a dispatched tick");
        };
        assert_eq!(report.skipped, 1);
        assert_eq!(report.dispatched, 1);
        assert!(channel.sent().iter().all(|c| c.agent_id == "amber"));
    }

    #[test]
    fn transient_send_failure_still_completes_the_tick() {
        let roadmap = pinch_roadmap();
        let board = Arc::new(TrajectoryBoard::new(1));
        let channel = Arc::new(MockChannel {
            sent: Mutex::new(Vec::new()),
            fail: true,
        });
        let coord = coordinator(Arc::clone(&channel), Arc::clone(&board));

        let tick = board
            .submit("amber", submission_via("amber", &roadmap, vec![1, 3, 0]))
            .unwrap();
        let TickOutcome::Dispatched(report) = coord.run_tick(&roadmap) else {
            panic!("expected a dispatched tick");
        };
        assert_eq!(report.dispatched, 0);
        // The tick still advanced; the agent is released with its command.
        assert!(
            board
                .await_dispatch("amber", tick, Duration::from_millis(100))
                .is_some()
        );
    }

    #[test]
    fn no_free_neighbor_falls_back_to_original_paths() {
        // A single corridor: 1 - 3 - 0 and 2 - 3 - 0 with no alternative.
        let roadmap = Roadmap::from_parts(
            vec![
                Point2::new(200.0, 200.0), // 0: goal
                Point2::new(0.0, 200.0),   // 1
                Point2::new(400.0, 200.0), // 2
                Point2::new(200.0, 100.0), // 3: the only way through
            ],
            vec![vec![3], vec![3], vec![3], vec![0, 1, 2]],
        );
        let board = Arc::new(TrajectoryBoard::new(2));
        let channel = Arc::new(MockChannel::new());
        let coord = coordinator(Arc::clone(&channel), Arc::clone(&board));

        board.submit("amber", submission_via("amber", &roadmap, vec![1, 3, 0]));
        board.submit("teal", submission_via("teal", &roadmap, vec![2, 3, 0]));

        let TickOutcome::Dispatched(report) = coord.run_tick(&roadmap) else {
            panic!("expected a dispatched tick");
        };
        assert!(!report.flagged.is_empty());
        assert!(report.rerouted.is_empty());
        assert_eq!(report.dispatched, 2);
    }
}
