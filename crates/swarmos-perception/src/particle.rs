//! Particle cloud primitives.
//!
//! A particle is a position hypothesis with an importance weight. The
//! [`localizer`][crate::localizer] runs the classic cycle over these
//! primitives each frame: weigh against the measurement, normalise,
//! resample, then diffuse so the cloud can track a moving robot.

use rand::Rng;
use swarmos_types::{FrameBounds, Point2};

/// One position hypothesis in the cloud.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Point2,
    pub weight: f32,
}

/// Spread `count` uniformly-weighted particles across the whole frame.
pub fn scatter_uniform<R: Rng>(count: usize, bounds: &FrameBounds, rng: &mut R) -> Vec<Particle> {
    let weight = 1.0 / count.max(1) as f32;
    (0..count)
        .map(|_| Particle {
            position: Point2::new(
                rng.r#gen::<f32>() * bounds.width,
                rng.r#gen::<f32>() * bounds.height,
            ),
            weight,
        })
        .collect()
}

/// Normalise weights to sum to one. A degenerate cloud (all weights zero,
/// or any non-finite weight) is reset to uniform instead of dividing by zero.
/// Returns the pre-normalisation total.
pub fn normalize_weights(particles: &mut [Particle]) -> f32 {
    let total: f32 = particles.iter().map(|p| p.weight).sum();
    if total > 0.0 && total.is_finite() {
        for p in particles.iter_mut() {
            p.weight /= total;
        }
        total
    } else {
        let uniform = 1.0 / particles.len().max(1) as f32;
        for p in particles.iter_mut() {
            p.weight = uniform;
        }
        0.0
    }
}

/// Weighted resampling with replacement. Expects normalised weights; the
/// returned cloud has the same size and uniform weights.
pub fn resample<R: Rng>(particles: &[Particle], rng: &mut R) -> Vec<Particle> {
    let n = particles.len();
    let uniform = 1.0 / n.max(1) as f32;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let mut draw = rng.r#gen::<f32>();
        let mut chosen = particles[n - 1];
        for p in particles {
            if draw <= p.weight {
                chosen = *p;
                break;
            }
            draw -= p.weight;
        }
        out.push(Particle {
            position: chosen.position,
            weight: uniform,
        });
    }
    out
}

/// Pull every particle towards `attractor` by `blend` and add Gaussian
/// jitter so the cloud keeps exploring. Positions are clamped to the frame.
pub fn diffuse<R: Rng>(
    particles: &mut [Particle],
    attractor: Point2,
    blend: f32,
    sigma: f32,
    bounds: &FrameBounds,
    rng: &mut R,
) {
    let keep = 1.0 - blend;
    for p in particles.iter_mut() {
        let x = keep * p.position.x + blend * attractor.x + gaussian_noise(rng, sigma);
        let y = keep * p.position.y + blend * attractor.y + gaussian_noise(rng, sigma);
        p.position = bounds.clamp(Point2::new(x, y));
    }
}

/// A single draw from N(0, sigma²) via the Box-Muller transform, which keeps
/// us off an extra distribution crate.
pub(crate) fn gaussian_noise<R: Rng>(rng: &mut R, sigma: f32) -> f32 {
    if sigma <= 0.0 {
        return 0.0;
    }
    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2: f32 = rng.r#gen::<f32>();
    sigma * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
}
