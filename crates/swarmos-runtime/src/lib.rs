//! `swarmos-runtime` – The fleet execution engine.
//!
//! Wires perception, planning, and coordination into running threads: one
//! per agent, one coordinator, one simulator harness. Also owns process
//! telemetry.
//!
//! # Modules
//!
//! - [`session`] – [`run_session`][session::run_session]: spawns the fleet
//!   against a simulated world and drives it until every agent arrives or
//!   the tick budget runs out.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: initialises
//!   the global `tracing` subscriber with an optional OTLP span exporter.
//!   Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export to any
//!   OTLP-compatible collector.

pub mod session;
pub mod telemetry;

pub use session::{AgentSpec, SessionConfig, SessionReport, run_session};
pub use telemetry::{TracerProviderGuard, init_tracing};
