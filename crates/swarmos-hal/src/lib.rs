//! `swarmos-hal` – The outside world behind traits.
//!
//! The planning core never talks to a camera, a websocket, or a renderer
//! directly. It talks to the traits in this crate, so the same fleet logic
//! runs against real hardware or the in-process simulator.
//!
//! # Modules
//!
//! - [`vision`] – [`VisionSource`][vision::VisionSource] and
//!   [`ArenaSource`][vision::ArenaSource]: per-tag match regions and the
//!   obstacle/goal snapshot.
//! - [`actuation`] – [`ActuationChannel`][actuation::ActuationChannel] plus
//!   the JSON wire envelope for outbound commands and inbound ready signals.
//! - [`display`] – [`DrawBus`][display::DrawBus]: fire-and-forget debug
//!   drawing intents over a broadcast channel.
//! - [`sim`] – [`SimWorld`][sim::SimWorld]: kinematic simulator implementing
//!   every trait above, used by the runtime's scripted sessions and tests.

pub mod actuation;
pub mod display;
pub mod sim;
pub mod vision;

pub use actuation::ActuationChannel;
pub use display::{DrawBus, DrawCommand, DrawShape};
pub use sim::{SimChannel, SimVision, SimWorld, StaticArena};
pub use vision::{ArenaSnapshot, ArenaSource, VisionSource};
