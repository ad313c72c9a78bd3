//! Scenario configuration – reads/writes `~/.swarmos/config.toml`.
//!
//! The file describes the whole run: the arena and its obstacles, the fleet,
//! and the tuning knobs for roadmap generation and piloting. Every field has
//! a default, so a partial file (or none at all) still yields a runnable
//! scenario.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use swarmos_agent::pilot::PilotConfig;
use swarmos_roadmap::RoadmapConfig;
use swarmos_types::{ColorTag, FrameBounds, Point2, Rect};

/// One robot in the fleet: its id, the colour tag on its roof, and where the
/// simulator drops it at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEntry {
    pub id: String,
    pub color: ColorTag,
    pub start: Point2,
}

/// Persisted scenario, stored in `~/.swarmos/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Overhead camera frame, px.
    #[serde(default = "default_arena")]
    pub arena: FrameBounds,

    /// Goal region every agent drives towards.
    #[serde(default = "default_goal")]
    pub goal: Rect,

    /// Static obstacles in the arena.
    #[serde(default)]
    pub obstacles: Vec<Rect>,

    /// The fleet.
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentEntry>,

    /// Simulated robot speed, px per second of commanded duration.
    #[serde(default = "default_speed")]
    pub nominal_speed: f32,

    /// Pairwise trajectory distance below which agents are rerouted, px.
    #[serde(default = "default_risk_threshold")]
    pub risk_threshold: f32,

    /// Hard cap on coordinated ticks.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Perception-only frames before the fleet starts moving.
    #[serde(default = "default_warmup_frames")]
    pub warmup_frames: usize,

    /// Master RNG seed for the simulator, localizers, and roadmap sampling.
    #[serde(default)]
    pub seed: u64,

    #[serde(default)]
    pub roadmap: RoadmapConfig,

    #[serde(default)]
    pub pilot: PilotConfig,
}

fn default_arena() -> FrameBounds {
    FrameBounds::new(800.0, 600.0)
}
fn default_goal() -> Rect {
    Rect::new(360.0, 260.0, 80.0, 80.0)
}
fn default_agents() -> Vec<AgentEntry> {
    vec![
        AgentEntry {
            id: "scout".to_string(),
            color: ColorTag::Blue,
            start: Point2::new(40.0, 40.0),
        },
        AgentEntry {
            id: "courier".to_string(),
            color: ColorTag::Red,
            start: Point2::new(760.0, 560.0),
        },
    ]
}
fn default_speed() -> f32 {
    12.0
}
fn default_risk_threshold() -> f32 {
    50.0
}
fn default_max_ticks() -> u64 {
    200
}
fn default_warmup_frames() -> usize {
    10
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            arena: default_arena(),
            goal: default_goal(),
            obstacles: vec![
                Rect::new(200.0, 150.0, 120.0, 60.0),
                Rect::new(500.0, 380.0, 80.0, 140.0),
            ],
            agents: default_agents(),
            nominal_speed: default_speed(),
            risk_threshold: default_risk_threshold(),
            max_ticks: default_max_ticks(),
            warmup_frames: default_warmup_frames(),
            seed: 42,
            roadmap: RoadmapConfig::default(),
            pilot: PilotConfig::default(),
        }
    }
}

/// Return the path to `~/.swarmos/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".swarmos").join("config.toml")
}

/// Load a scenario from a specific path. Returns `None` if the file does not
/// exist.
pub fn load_from(path: &PathBuf) -> Result<Option<ScenarioConfig>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: ScenarioConfig =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `SWARMOS_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `SWARMOS_SEED` | `seed` |
/// | `SWARMOS_MAX_TICKS` | `max_ticks` |
/// | `SWARMOS_RISK_THRESHOLD` | `risk_threshold` |
/// | `SWARMOS_NOMINAL_SPEED` | `nominal_speed` |
pub fn apply_env_overrides(cfg: &mut ScenarioConfig) {
    if let Ok(v) = std::env::var("SWARMOS_SEED")
        && let Ok(seed) = v.parse::<u64>()
    {
        cfg.seed = seed;
    }
    if let Ok(v) = std::env::var("SWARMOS_MAX_TICKS")
        && let Ok(ticks) = v.parse::<u64>()
    {
        cfg.max_ticks = ticks;
    }
    if let Ok(v) = std::env::var("SWARMOS_RISK_THRESHOLD")
        && let Ok(threshold) = v.parse::<f32>()
    {
        cfg.risk_threshold = threshold;
    }
    if let Ok(v) = std::env::var("SWARMOS_NOMINAL_SPEED")
        && let Ok(speed) = v.parse::<f32>()
    {
        cfg.nominal_speed = speed;
    }
}

/// Save the scenario to a specific path, creating parent directories if
/// necessary.
pub fn save_to(cfg: &ScenarioConfig, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
