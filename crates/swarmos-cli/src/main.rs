//! `swarmos-cli` – SwarmOS Command Line Interface
//!
//! This binary is the entry point for a simulated swarm run. It:
//!
//! 1. Loads the scenario from `~/.swarmos/config.toml` (or a path given as
//!    the first argument); writes a default scenario there on first run.
//! 2. Initialises structured logging and optional OTLP trace export via
//!    `swarmos-runtime`.
//! 3. Builds the simulated world and arena from the scenario and drives the
//!    fleet to the goal with [`swarmos_runtime::run_session`].
//! 4. Prints the session report: ticks used, who arrived, final positions.

mod config;

use std::sync::{Arc, Mutex};

use colored::Colorize;
use swarmos_hal::StaticArena;
use swarmos_hal::sim::SimWorld;
use swarmos_runtime::{AgentSpec, SessionConfig, init_tracing, run_session};
use tracing::info;

fn main() {
    let _telemetry = init_tracing("swarmos");

    print_banner();

    // ── Scenario ──────────────────────────────────────────────────────────
    let path = std::env::args()
        .nth(1)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(config::config_path);

    let scenario = match config::load_from(&path) {
        Ok(Some(cfg)) => {
            println!("  Scenario loaded from {}", path.display().to_string().bold());
            cfg
        }
        Ok(None) => {
            let mut cfg = config::ScenarioConfig::default();
            config::apply_env_overrides(&mut cfg);
            match config::save_to(&cfg, &path) {
                Ok(()) => println!(
                    "  {} No scenario found; default written to {}",
                    "✓".green().bold(),
                    path.display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Could not save default scenario".yellow(), e),
            }
            cfg
        }
        Err(e) => {
            eprintln!("{}: {}", "Scenario error".red(), e);
            std::process::exit(1);
        }
    };

    println!(
        "  Arena {}×{} px · {} agent(s) · {} obstacle(s) · seed {}\n",
        scenario.arena.width,
        scenario.arena.height,
        scenario.agents.len(),
        scenario.obstacles.len(),
        scenario.seed
    );

    // ── World and fleet ───────────────────────────────────────────────────
    let world = Arc::new(Mutex::new(SimWorld::new(
        scenario.arena,
        scenario.nominal_speed,
        scenario.seed,
    )));
    let arena = StaticArena::new(
        scenario.arena,
        scenario.obstacles.clone(),
        Some(scenario.goal),
    );
    let session = SessionConfig {
        agents: scenario
            .agents
            .iter()
            .map(|a| AgentSpec {
                id: a.id.clone(),
                color: a.color,
                start: a.start,
            })
            .collect(),
        pilot: scenario.pilot,
        roadmap: scenario.roadmap,
        risk_threshold: scenario.risk_threshold,
        max_ticks: scenario.max_ticks,
        warmup_frames: scenario.warmup_frames,
        seed: scenario.seed,
        ..SessionConfig::default()
    };

    info!(
        agents = session.agents.len(),
        max_ticks = session.max_ticks,
        "starting session"
    );

    // ── Run ───────────────────────────────────────────────────────────────
    let report = match run_session(session, world, arena, None) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}: {}", "Session failed".red().bold(), e);
            std::process::exit(1);
        }
    };

    println!("  {} after {} tick(s)", "Session finished".bold(), report.ticks);
    if report.arrived.is_empty() {
        println!("  {}", "No agent reached the goal.".yellow());
    } else {
        println!("  Arrived: {}", report.arrived.join(", ").green().bold());
    }
    let mut positions: Vec<_> = report.final_positions.iter().collect();
    positions.sort_by(|a, b| a.0.cmp(b.0));
    for (id, p) in positions {
        println!("    • {} at ({:.1}, {:.1})", id.bold(), p.x, p.y);
    }
    println!();

    if report.arrived.len() < scenario.agents.len() {
        std::process::exit(2);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ____                          ____  _____"#.bold().cyan());
    println!("{}", r#"  / __/    _____ ________ _  ___/ __ \/ ___/"#.bold().cyan());
    println!("{}", r#" _\ \| |/|/ / _ `/ __/  ' \/ _ \ /_/ /\__ \ "#.bold().cyan());
    println!("{}", r#"/___/|__,__/\_,_/_/ /_/_/_/\___/\____/____/ "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "SwarmOS".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Multi-robot navigation over an overhead camera");
    println!();
}
