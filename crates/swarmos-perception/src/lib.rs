//! `swarmos-perception` – From pixels to state.
//!
//! Turns noisy colour-tag detections from the overhead camera into per-agent
//! position and velocity estimates the planner can act on.
//!
//! # Modules
//!
//! - [`particle`] – weighting, resampling, and diffusion primitives for the
//!   particle cloud.
//! - [`localizer`] – [`Localizer`][localizer::Localizer]: per-agent particle
//!   filter that folds each camera frame into an [`Observation`][swarmos_types::Observation].
//! - [`motion`] – [`MotionFilter`][motion::MotionFilter]: constant-velocity
//!   Kalman filter that smooths observations into position, speed, and
//!   heading.

pub mod localizer;
pub mod motion;
pub mod particle;

pub use localizer::Localizer;
pub use motion::MotionFilter;
pub use particle::Particle;
