//! Per-agent particle filter.
//!
//! Each agent owns one [`Localizer`] keyed to its colour tag. Every camera
//! frame the filter:
//!
//! 1. fits a 2-D Gaussian to the matched pixels,
//! 2. weighs each particle by its likelihood under that Gaussian,
//! 3. normalises and resamples the cloud,
//! 4. diffuses the survivors towards the measurement mean with jitter.
//!
//! The published [`Observation`] is the mean and covariance of the surviving
//! cloud, not of the raw pixels, so a single noisy frame cannot teleport the
//! estimate.
//!
//! # Example
//!
//! ```rust
//! use swarmos_perception::localizer::{Localizer, LocalizerConfig};
//! use swarmos_types::{ColorTag, FrameBounds, MatchRegion, Point2};
//!
//! let bounds = FrameBounds::new(640.0, 480.0);
//! let mut localizer = Localizer::new(ColorTag::Blue, bounds, LocalizerConfig::default(), 42);
//!
//! let region = MatchRegion {
//!     color: ColorTag::Blue,
//!     points: vec![Point2::new(100.0, 200.0), Point2::new(102.0, 198.0)],
//!     bounds,
//! };
//! let obs = localizer.update(&region);
//! assert!(obs.confidence > 0.0);
//! ```

use rand::SeedableRng;
use rand::rngs::StdRng;
use swarmos_types::{ColorTag, FrameBounds, MatchRegion, Observation, Point2};
use tracing::{debug, warn};

use crate::particle::{self, Particle};

// Keeps a pixel-perfect cluster's covariance invertible.
const COV_EPSILON: f32 = 1e-3;

// ────────────────────────────────────────────────────────────────────────────
// Gaussian fit
// ────────────────────────────────────────────────────────────────────────────

/// Mean and covariance of a 2-D point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianFit {
    pub mean: Point2,
    pub covariance: [[f32; 2]; 2],
}

impl GaussianFit {
    /// Fit a Gaussian to `points`. Returns `None` for an empty set. The
    /// covariance diagonal is padded so the matrix always inverts.
    pub fn fit(points: &[Point2]) -> Option<GaussianFit> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f32;
        let mean = Point2::new(
            points.iter().map(|p| p.x).sum::<f32>() / n,
            points.iter().map(|p| p.y).sum::<f32>() / n,
        );
        let mut xx = 0.0;
        let mut xy = 0.0;
        let mut yy = 0.0;
        for p in points {
            let dx = p.x - mean.x;
            let dy = p.y - mean.y;
            xx += dx * dx;
            xy += dx * dy;
            yy += dy * dy;
        }
        let mut covariance = [
            [xx / n + COV_EPSILON, xy / n],
            [xy / n, yy / n + COV_EPSILON],
        ];
        // Perfectly correlated points leave the matrix singular even after
        // the diagonal pad. Dropping the cross term restores a valid fit.
        if determinant(&covariance) < 1e-6 {
            covariance[0][1] = 0.0;
            covariance[1][0] = 0.0;
        }
        Some(GaussianFit { mean, covariance })
    }

    /// Probability density of `p` under this Gaussian.
    pub fn likelihood(&self, p: &Point2) -> f32 {
        let det = determinant(&self.covariance);
        let inv = [
            [self.covariance[1][1] / det, -self.covariance[0][1] / det],
            [-self.covariance[1][0] / det, self.covariance[0][0] / det],
        ];
        let dx = p.x - self.mean.x;
        let dy = p.y - self.mean.y;
        let mahalanobis =
            dx * (inv[0][0] * dx + inv[0][1] * dy) + dy * (inv[1][0] * dx + inv[1][1] * dy);
        (-0.5 * mahalanobis).exp() / (2.0 * std::f32::consts::PI * det.sqrt())
    }

    /// Root of the covariance trace: a scalar spread in pixels.
    pub fn spread(&self) -> f32 {
        (self.covariance[0][0] + self.covariance[1][1]).sqrt()
    }
}

fn determinant(m: &[[f32; 2]; 2]) -> f32 {
    m[0][0] * m[1][1] - m[0][1] * m[1][0]
}

// ────────────────────────────────────────────────────────────────────────────
// Localizer
// ────────────────────────────────────────────────────────────────────────────

/// Tuning knobs for one particle filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalizerConfig {
    /// Particle count. More particles track faster motion at more CPU.
    pub num_particles: usize,
    /// Fraction each particle is pulled towards the measurement mean per
    /// frame.
    pub blend: f32,
    /// Standard deviation of the per-frame position jitter, in pixels.
    pub jitter_sigma: f32,
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        Self {
            num_particles: 500,
            blend: 0.3,
            jitter_sigma: 5.0,
        }
    }
}

/// Particle filter tracking one colour tag across camera frames.
#[derive(Debug)]
pub struct Localizer {
    color: ColorTag,
    bounds: FrameBounds,
    config: LocalizerConfig,
    particles: Vec<Particle>,
    rng: StdRng,
}

impl Localizer {
    /// Build a filter with its cloud scattered uniformly over the frame.
    pub fn new(color: ColorTag, bounds: FrameBounds, config: LocalizerConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let particles = particle::scatter_uniform(config.num_particles, &bounds, &mut rng);
        Self {
            color,
            bounds,
            config,
            particles,
            rng,
        }
    }

    pub fn color(&self) -> ColorTag {
        self.color
    }

    /// Current cloud, exposed for debug overlays.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Fold one camera frame into the filter and report the updated estimate.
    ///
    /// An empty match region leaves the cloud untouched and returns the
    /// frame-centre fallback with zero confidence.
    pub fn update(&mut self, region: &MatchRegion) -> Observation {
        let Some(measurement) = GaussianFit::fit(&region.points) else {
            warn!(color = %self.color, "tag not visible, returning fallback observation");
            return Observation::fallback(&self.bounds);
        };

        for p in self.particles.iter_mut() {
            p.weight = measurement.likelihood(&p.position);
        }
        let total = particle::normalize_weights(&mut self.particles);
        if total == 0.0 {
            debug!(color = %self.color, "all particle weights vanished, cloud reset to uniform");
        }
        self.particles = particle::resample(&self.particles, &mut self.rng);
        particle::diffuse(
            &mut self.particles,
            measurement.mean,
            self.config.blend,
            self.config.jitter_sigma,
            &self.bounds,
            &mut self.rng,
        );

        let positions: Vec<Point2> = self.particles.iter().map(|p| p.position).collect();
        // Non-empty cloud, fit always succeeds.
        let estimate = GaussianFit::fit(&positions).unwrap_or(GaussianFit {
            mean: self.bounds.center(),
            covariance: [[1.0, 0.0], [0.0, 1.0]],
        });

        let matched = region.points.len() as f32;
        let confidence = matched / (matched + estimate.spread());
        debug!(
            color = %self.color,
            x = estimate.mean.x,
            y = estimate.mean.y,
            confidence,
            "localizer update"
        );
        Observation {
            mean: estimate.mean,
            covariance: estimate.covariance,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> FrameBounds {
        FrameBounds::new(640.0, 480.0)
    }

    fn cluster_around(center: Point2, spread: f32) -> Vec<Point2> {
        // Deterministic diamond of points around the centre.
        vec![
            center,
            Point2::new(center.x + spread, center.y),
            Point2::new(center.x - spread, center.y),
            Point2::new(center.x, center.y + spread),
            Point2::new(center.x, center.y - spread),
            Point2::new(center.x + spread, center.y + spread),
            Point2::new(center.x - spread, center.y - spread),
        ]
    }

    #[test]
    fn fit_rejects_empty_input() {
        assert!(GaussianFit::fit(&[]).is_none());
    }

    #[test]
    fn fit_recovers_mean() {
        let fit = GaussianFit::fit(&cluster_around(Point2::new(100.0, 200.0), 3.0)).unwrap();
        assert!((fit.mean.x - 100.0).abs() < 1e-3);
        assert!((fit.mean.y - 200.0).abs() < 1e-3);
    }

    #[test]
    fn fit_survives_identical_points() {
        let p = Point2::new(50.0, 60.0);
        let fit = GaussianFit::fit(&[p, p, p]).unwrap();
        // Likelihood at the mean must be finite and maximal.
        let at_mean = fit.likelihood(&p);
        assert!(at_mean.is_finite());
        assert!(at_mean > fit.likelihood(&Point2::new(55.0, 60.0)));
    }

    #[test]
    fn fit_survives_collinear_points() {
        let pts: Vec<Point2> = (0..5).map(|i| Point2::new(i as f32, i as f32)).collect();
        let fit = GaussianFit::fit(&pts).unwrap();
        assert!(fit.likelihood(&fit.mean).is_finite());
    }

    #[test]
    fn likelihood_decays_with_distance() {
        let fit = GaussianFit::fit(&cluster_around(Point2::new(100.0, 100.0), 5.0)).unwrap();
        let near = fit.likelihood(&Point2::new(101.0, 100.0));
        let far = fit.likelihood(&Point2::new(160.0, 100.0));
        assert!(near > far);
    }

    #[test]
    fn empty_region_returns_fallback_and_keeps_cloud() {
        let mut localizer =
            Localizer::new(ColorTag::Red, bounds(), LocalizerConfig::default(), 9);
        let before: Vec<Particle> = localizer.particles().to_vec();
        let obs = localizer.update(&MatchRegion {
            color: ColorTag::Red,
            points: vec![],
            bounds: bounds(),
        });
        assert_eq!(obs.mean, bounds().center());
        assert_eq!(obs.confidence, 0.0);
        assert_eq!(localizer.particles(), before.as_slice());
    }

    #[test]
    fn cloud_converges_on_a_stationary_tag() {
        let mut localizer =
            Localizer::new(ColorTag::Blue, bounds(), LocalizerConfig::default(), 17);
        let target = Point2::new(120.0, 330.0);
        let mut obs = Observation::fallback(&bounds());
        for _ in 0..15 {
            obs = localizer.update(&MatchRegion {
                color: ColorTag::Blue,
                points: cluster_around(target, 4.0),
                bounds: bounds(),
            });
        }
        assert!(
            obs.mean.distance(&target) < 15.0,
            "estimate {:?} too far from {:?}",
            obs.mean,
            target
        );
        assert!(obs.confidence > 0.2);
    }

    #[test]
    fn cloud_tracks_a_moving_tag() {
        let mut localizer =
            Localizer::new(ColorTag::Green, bounds(), LocalizerConfig::default(), 23);
        let mut obs = Observation::fallback(&bounds());
        for step in 0..25 {
            let center = Point2::new(100.0 + 8.0 * step as f32, 240.0);
            obs = localizer.update(&MatchRegion {
                color: ColorTag::Green,
                points: cluster_around(center, 4.0),
                bounds: bounds(),
            });
        }
        let final_center = Point2::new(100.0 + 8.0 * 24.0, 240.0);
        assert!(
            obs.mean.distance(&final_center) < 25.0,
            "estimate {:?} lost the tag at {:?}",
            obs.mean,
            final_center
        );
    }

    #[test]
    fn tight_cluster_scores_higher_confidence_than_loose_one() {
        let mut tight = Localizer::new(ColorTag::Cyan, bounds(), LocalizerConfig::default(), 5);
        let mut loose = Localizer::new(ColorTag::Cyan, bounds(), LocalizerConfig::default(), 5);
        let mut tight_obs = Observation::fallback(&bounds());
        let mut loose_obs = Observation::fallback(&bounds());
        for _ in 0..12 {
            tight_obs = tight.update(&MatchRegion {
                color: ColorTag::Cyan,
                points: cluster_around(Point2::new(300.0, 200.0), 2.0),
                bounds: bounds(),
            });
            loose_obs = loose.update(&MatchRegion {
                color: ColorTag::Cyan,
                points: cluster_around(Point2::new(300.0, 200.0), 60.0),
                bounds: bounds(),
            });
        }
        assert!(tight_obs.confidence > loose_obs.confidence);
    }
}
