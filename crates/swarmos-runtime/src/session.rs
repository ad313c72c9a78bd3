//! Fleet session orchestration.
//!
//! A session runs the full closed loop against a [`SimWorld`]: each agent
//! thread samples vision, localizes, plans, and files its trajectory at the
//! barrier; the coordinator thread reconciles and dispatches each tick, then
//! regenerates the roadmap; the harness thread plays dispatched commands
//! into the world and answers with ready signals.
//!
//! Thread roles and shared state:
//!
//! | Thread | Owns | Shares |
//! |---|---|---|
//! | agent ×N | localizer, motion filter, pilot | board (write), scene (read) |
//! | coordinator | arena source, roadmap RNG | board (drain), scene (swap) |
//! | harness | command receiver | world (write) |
//!
//! The scene (arena + roadmap) is swapped wholesale behind an `RwLock`;
//! agents keep planning against the snapshot they grabbed until they next
//! ask for a fresh one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use swarmos_agent::pilot::{AgentPilot, PilotConfig};
use swarmos_coordinator::{Coordinator, TickOutcome, TickSubmission, TrajectoryBoard};
use swarmos_hal::actuation::{self, ActuationChannel};
use swarmos_hal::sim::{SimChannel, SimChannelEnds, SimVision, SimWorld};
use swarmos_hal::vision::{ArenaSource, VisionSource};
use swarmos_hal::{DrawBus, DrawCommand, DrawShape};
use swarmos_perception::localizer::{Localizer, LocalizerConfig};
use swarmos_perception::motion::MotionFilterConfig;
use swarmos_roadmap::{Arena, Roadmap, RoadmapConfig};
use swarmos_types::{ColorTag, Point2, SwarmError};
use tracing::{info, warn};

// Consecutive barrier stalls tolerated before the session gives up.
const MAX_STALLS: u32 = 3;

/// One robot to spawn into the session.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub id: String,
    pub color: ColorTag,
    pub start: Point2,
}

/// Full session parameterisation.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub agents: Vec<AgentSpec>,
    pub localizer: LocalizerConfig,
    pub filter: MotionFilterConfig,
    pub pilot: PilotConfig,
    pub roadmap: RoadmapConfig,
    /// Pairwise trajectory distance below which agents are rerouted, px.
    pub risk_threshold: f32,
    /// Hard cap on coordinated ticks.
    pub max_ticks: u64,
    /// Perception-only frames each agent runs before its first submission,
    /// letting the particle cloud settle on the tag.
    pub warmup_frames: usize,
    pub barrier_timeout: Duration,
    pub seed: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            agents: Vec::new(),
            localizer: LocalizerConfig::default(),
            filter: MotionFilterConfig::default(),
            pilot: PilotConfig::default(),
            roadmap: RoadmapConfig::default(),
            risk_threshold: 50.0,
            max_ticks: 100,
            warmup_frames: 10,
            barrier_timeout: Duration::from_secs(5),
            seed: 0,
        }
    }
}

/// What a finished session looked like.
#[derive(Debug)]
pub struct SessionReport {
    /// Ticks actually dispatched.
    pub ticks: u64,
    /// Agents that reached `Interact`.
    pub arrived: Vec<String>,
    /// Ground-truth positions when the session ended.
    pub final_positions: HashMap<String, Point2>,
    /// Ground-truth positions after each dispatched tick.
    pub trace: Vec<HashMap<String, Point2>>,
}

/// Arena plus the roadmap built over it; swapped atomically each tick.
struct Scene {
    arena: Arena,
    roadmap: Roadmap,
}

fn build_scene<A: ArenaSource>(
    source: &mut A,
    config: &RoadmapConfig,
    rng: &mut StdRng,
) -> Result<Scene, SwarmError> {
    let snapshot = source.arena_snapshot()?;
    let arena = Arena::new(snapshot.bounds, snapshot.obstacles, snapshot.goal);
    let roadmap = Roadmap::generate(&arena, config, rng)?;
    Ok(Scene { arena, roadmap })
}

/// Run a fleet to completion against a simulated world.
///
/// Returns once every agent has arrived or retired, the tick budget is
/// exhausted, or the barrier stalls repeatedly.
pub fn run_session<A: ArenaSource>(
    config: SessionConfig,
    world: Arc<Mutex<SimWorld>>,
    mut arena_source: A,
    draw_bus: Option<DrawBus>,
) -> Result<SessionReport, SwarmError> {
    let agent_count = config.agents.len();
    if agent_count == 0 {
        return Err(SwarmError::Configuration("no agents configured".to_string()));
    }

    let mut roadmap_rng = StdRng::seed_from_u64(config.seed);
    let scene = Arc::new(RwLock::new(Arc::new(build_scene(
        &mut arena_source,
        &config.roadmap,
        &mut roadmap_rng,
    )?)));

    {
        let mut w = world.lock().unwrap_or_else(PoisonError::into_inner);
        for spec in &config.agents {
            w.place(spec.id.clone(), spec.color, spec.start);
        }
    }

    let board = Arc::new(TrajectoryBoard::new(agent_count));
    let ids: Vec<String> = config.agents.iter().map(|a| a.id.clone()).collect();
    let (channel, ends) = SimChannel::new(&ids);
    let channel = Arc::new(channel);

    let harness = spawn_harness(Arc::clone(&world), ends);
    let agent_handles: Vec<_> = config
        .agents
        .iter()
        .cloned()
        .enumerate()
        .map(|(index, spec)| {
            spawn_agent(
                spec,
                index,
                &config,
                Arc::clone(&world),
                Arc::clone(&scene),
                Arc::clone(&board),
                Arc::clone(&channel),
                draw_bus.clone(),
            )
        })
        .collect();

    // The coordinator runs on the session thread: collect, dispatch, then
    // regenerate the roadmap for the next tick.
    let coordinator = Coordinator::new(
        Arc::clone(&board),
        Arc::clone(&channel),
        config.pilot,
        config.risk_threshold,
        config.barrier_timeout,
    );
    let mut ticks = 0u64;
    let mut stalls = 0u32;
    let mut trace = Vec::new();
    loop {
        let snapshot = scene
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match coordinator.run_tick(&snapshot.roadmap) {
            TickOutcome::Dispatched(report) => {
                ticks = report.tick + 1;
                stalls = 0;
                trace.push(truth_positions(&world, &ids));
                if ticks >= config.max_ticks {
                    warn!(ticks, "tick budget exhausted, ending session");
                    break;
                }
                match build_scene(&mut arena_source, &config.roadmap, &mut roadmap_rng) {
                    Ok(fresh) => {
                        *scene.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(fresh);
                    }
                    Err(e) => warn!(error = %e, "roadmap regeneration failed, keeping snapshot"),
                }
            }
            TickOutcome::AllRetired => break,
            TickOutcome::Stalled => {
                stalls += 1;
                if stalls >= MAX_STALLS {
                    warn!("barrier stalled {stalls} times, abandoning session");
                    break;
                }
            }
        }
    }

    // Unblock any agent still at the barrier so the joins below return.
    board.close();

    let mut arrived = Vec::new();
    for handle in agent_handles {
        match handle.join() {
            Ok((id, done)) if done => arrived.push(id),
            Ok(_) => {}
            Err(_) => warn!("agent thread panicked"),
        }
    }
    arrived.sort();

    let final_positions = truth_positions(&world, &ids);
    // Dropping our channel ends closes the harness's command queue.
    drop(coordinator);
    drop(channel);
    if harness.join().is_err() {
        warn!("harness thread panicked");
    }

    info!(ticks, arrived = arrived.len(), "session finished");
    Ok(SessionReport {
        ticks,
        arrived,
        final_positions,
        trace,
    })
}

fn truth_positions(
    world: &Arc<Mutex<SimWorld>>,
    ids: &[String],
) -> HashMap<String, Point2> {
    let w = world.lock().unwrap_or_else(PoisonError::into_inner);
    ids.iter()
        .filter_map(|id| w.position_of(id).map(|p| (id.clone(), p)))
        .collect()
}

/// Plays dispatched commands into the world and answers with ready signals.
fn spawn_harness(
    world: Arc<Mutex<SimWorld>>,
    ends: SimChannelEnds,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while let Ok(command) = ends.commands.recv() {
            {
                let mut w = world.lock().unwrap_or_else(PoisonError::into_inner);
                w.apply_command(&command);
            }
            let Some(ready_tx) = ends.ready.get(&command.agent_id) else {
                warn!(agent = %command.agent_id, "no ready queue for dispatched agent");
                continue;
            };
            let envelope = format!(
                r#"{{"clientType":"robot","id":"{}","messageType":"{}","message":{{}}}}"#,
                command.agent_id,
                actuation::MSG_READY
            );
            if ready_tx.send(envelope).is_err() {
                // That agent already exited; keep serving the rest.
                continue;
            }
        }
    })
}

#[allow(clippy::too_many_arguments)]
fn spawn_agent(
    spec: AgentSpec,
    index: usize,
    config: &SessionConfig,
    world: Arc<Mutex<SimWorld>>,
    scene: Arc<RwLock<Arc<Scene>>>,
    board: Arc<TrajectoryBoard>,
    channel: Arc<SimChannel>,
    draw_bus: Option<DrawBus>,
) -> thread::JoinHandle<(String, bool)> {
    let localizer_config = config.localizer;
    let filter_config = config.filter;
    let pilot_config = config.pilot;
    let warmup = config.warmup_frames;
    let max_ticks = config.max_ticks;
    let dispatch_timeout = config.barrier_timeout;
    let seed = config.seed;

    thread::spawn(move || {
        let mut vision = SimVision::new(world);
        let bounds = scene
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .arena
            .bounds;
        let mut localizer = Localizer::new(
            spec.color,
            bounds,
            localizer_config,
            seed.wrapping_add(index as u64 + 1),
        );
        let goal = scene
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .arena
            .goal_center()
            .unwrap_or(spec.start);
        let mut pilot = AgentPilot::new(
            spec.id.clone(),
            spec.color,
            goal,
            spec.start,
            pilot_config,
            filter_config,
        );

        // Let the particle cloud find the tag before the fleet moves.
        for _ in 0..warmup {
            if let Ok(region) = vision.match_region(spec.color) {
                let _ = localizer.update(&region);
            }
        }

        for _ in 0..max_ticks {
            let observation = match vision.match_region(spec.color) {
                Ok(region) => localizer.update(&region),
                Err(e) => {
                    warn!(agent = %spec.id, error = %e, "vision fault, skipping tick");
                    let Some(tick) = board.submit_skip(&spec.id) else {
                        break;
                    };
                    board.await_dispatch(&spec.id, tick, dispatch_timeout);
                    continue;
                }
            };

            let snapshot = scene
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            let plan = pilot.plan_tick(&observation, &snapshot.roadmap, &snapshot.arena);

            if pilot.is_done() {
                info!(agent = %spec.id, "arrived, retiring from the fleet");
                board.retire(&spec.id);
                return (spec.id, true);
            }

            let tick = match plan {
                Ok(plan) => {
                    if let Some(bus) = &draw_bus {
                        publish_plan(bus, &spec.id, &plan.trajectory.points, &localizer);
                    }
                    board.submit(
                        &spec.id,
                        TickSubmission {
                            trajectory: plan.trajectory,
                            command: plan.command,
                            position: plan.position,
                            speed: plan.speed,
                        },
                    )
                }
                Err(e) => {
                    warn!(agent = %spec.id, error = %e, "planning failed, skipping tick");
                    board.submit_skip(&spec.id)
                }
            };
            let Some(tick) = tick else {
                // Board closed under us: the session is over.
                break;
            };

            // A command was dispatched only if the coordinator posted one;
            // the robot answers it with a ready signal before the next tick.
            if board.await_dispatch(&spec.id, tick, dispatch_timeout).is_some()
                && channel.recv_ready(&spec.id).is_err()
            {
                warn!(agent = %spec.id, "ready channel closed, retiring");
                break;
            }
        }
        board.retire(&spec.id);
        (spec.id, false)
    })
}

fn publish_plan(bus: &DrawBus, agent_id: &str, points: &[Point2], localizer: &Localizer) {
    for pair in points.windows(2) {
        bus.publish(DrawCommand {
            source: format!("pilot/{agent_id}"),
            position: pair[0],
            shape: DrawShape::Line { to: pair[1] },
            color: localizer.color().as_hex().to_string(),
        });
    }
    for particle in localizer.particles().iter().take(25) {
        bus.publish(DrawCommand {
            source: format!("localizer/{agent_id}"),
            position: particle.position,
            shape: DrawShape::Dot {
                weight: particle.weight,
            },
            color: localizer.color().as_hex().to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmos_hal::StaticArena;
    use swarmos_types::{FrameBounds, Rect};

    fn open_world(bounds: FrameBounds, speed: f32) -> Arc<Mutex<SimWorld>> {
        Arc::new(Mutex::new(SimWorld::new(bounds, speed, 99)))
    }

    fn scenario_config(agents: Vec<AgentSpec>) -> SessionConfig {
        SessionConfig {
            agents,
            max_ticks: 80,
            seed: 7,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn lone_agent_closes_on_the_goal_monotonically() {
        let bounds = FrameBounds::new(300.0, 300.0);
        let goal = Rect::new(80.0, 80.0, 40.0, 40.0); // centred on (100, 100)
        let world = open_world(bounds, 10.0);
        let arena = StaticArena::new(bounds, vec![], Some(goal));

        let mut config = scenario_config(vec![AgentSpec {
            id: "solo".to_string(),
            color: ColorTag::Blue,
            start: Point2::new(0.0, 0.0),
        }]);
        config.pilot.max_duration = 2.0;

        let report = run_session(config, Arc::clone(&world), arena, None).expect("session");

        assert!(
            report.arrived.contains(&"solo".to_string()),
            "agent never arrived: {report:?}"
        );
        assert!(report.ticks <= 80);

        // Ground-truth distance to the goal shrinks tick over tick, within
        // a small tolerance for waypoint overshoot and node snapping.
        let goal_center = Point2::new(100.0, 100.0);
        let distances: Vec<f32> = report
            .trace
            .iter()
            .filter_map(|positions| positions.get("solo"))
            .map(|p| p.distance(&goal_center))
            .collect();
        for pair in distances.windows(2) {
            assert!(
                pair[1] <= pair[0] + 10.0,
                "distance regressed: {distances:?}"
            );
        }
        let final_distance = report.final_positions["solo"].distance(&goal_center);
        assert!(final_distance < 60.0, "ended {final_distance} px out");
    }

    #[test]
    fn two_agents_both_arrive() {
        let bounds = FrameBounds::new(400.0, 400.0);
        let goal = Rect::new(180.0, 180.0, 40.0, 40.0);
        let world = open_world(bounds, 12.0);
        let arena = StaticArena::new(bounds, vec![], Some(goal));

        let mut config = scenario_config(vec![
            AgentSpec {
                id: "amber".to_string(),
                color: ColorTag::Red,
                start: Point2::new(20.0, 20.0),
            },
            AgentSpec {
                id: "teal".to_string(),
                color: ColorTag::Cyan,
                start: Point2::new(380.0, 380.0),
            },
        ]);
        config.max_ticks = 120;
        config.pilot.max_duration = 2.0;

        let report = run_session(config, world, arena, None).expect("session");
        assert_eq!(report.arrived, vec!["amber".to_string(), "teal".to_string()]);
    }

    #[test]
    fn session_without_agents_is_a_configuration_error() {
        let bounds = FrameBounds::new(100.0, 100.0);
        let world = open_world(bounds, 10.0);
        let arena = StaticArena::new(bounds, vec![], Some(Rect::new(40.0, 40.0, 20.0, 20.0)));
        let err = run_session(scenario_config(vec![]), world, arena, None);
        assert!(matches!(err, Err(SwarmError::Configuration(_))));
    }

    #[test]
    fn goalless_arena_fails_fast() {
        let bounds = FrameBounds::new(100.0, 100.0);
        let world = open_world(bounds, 10.0);
        let arena = StaticArena::new(bounds, vec![], None);
        let config = scenario_config(vec![AgentSpec {
            id: "solo".to_string(),
            color: ColorTag::Blue,
            start: Point2::new(0.0, 0.0),
        }]);
        let err = run_session(config, world, arena, None);
        assert!(matches!(err, Err(SwarmError::EmptyRoadmap)));
    }
}
