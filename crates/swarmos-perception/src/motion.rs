//! Constant-velocity Kalman filter.
//!
//! Smooths the localizer's per-frame [`Observation`]s into a continuous
//! position/velocity estimate. The state vector is `[y, x, vy, vx]` and the
//! transition model assumes the robot keeps rolling at its current velocity
//! between frames.
//!
//! Measurement noise is scaled by the observation's confidence: a confident
//! observation (tight particle cloud, many matched pixels) corrects the state
//! aggressively, a doubtful one barely nudges it.
//!
//! The matrices involved are fixed 4×4 and 2×2, so the arithmetic is written
//! out directly instead of pulling in a linear-algebra crate.

use swarmos_types::Point2;

// ────────────────────────────────────────────────────────────────────────────
// Fixed-size matrix helpers
// ────────────────────────────────────────────────────────────────────────────

/// Row-major 4×4 matrix. Only the handful of operations the filter needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4(pub [[f32; 4]; 4]);

impl Mat4 {
    pub const fn identity() -> Self {
        let mut m = [[0.0; 4]; 4];
        m[0][0] = 1.0;
        m[1][1] = 1.0;
        m[2][2] = 1.0;
        m[3][3] = 1.0;
        Mat4(m)
    }

    pub const fn diagonal(d: [f32; 4]) -> Self {
        let mut m = [[0.0; 4]; 4];
        m[0][0] = d[0];
        m[1][1] = d[1];
        m[2][2] = d[2];
        m[3][3] = d[3];
        Mat4(m)
    }

    pub fn mul(&self, other: &Mat4) -> Mat4 {
        let mut out = [[0.0; 4]; 4];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                for k in 0..4 {
                    *cell += self.0[i][k] * other.0[k][j];
                }
            }
        }
        Mat4(out)
    }

    pub fn transpose(&self) -> Mat4 {
        let mut out = [[0.0; 4]; 4];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = self.0[j][i];
            }
        }
        Mat4(out)
    }

    pub fn add(&self, other: &Mat4) -> Mat4 {
        let mut out = self.0;
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell += other.0[i][j];
            }
        }
        Mat4(out)
    }

    pub fn apply(&self, v: &[f32; 4]) -> [f32; 4] {
        let mut out = [0.0; 4];
        for (i, cell) in out.iter_mut().enumerate() {
            for k in 0..4 {
                *cell += self.0[i][k] * v[k];
            }
        }
        out
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MotionFilter
// ────────────────────────────────────────────────────────────────────────────

/// Tuning for the constant-velocity model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionFilterConfig {
    /// Seconds between ticks, used by the transition matrix.
    pub dt: f32,
    /// Process noise added to the covariance diagonal each prediction.
    pub process_noise: f32,
    /// Measurement noise for a fully-confident observation.
    pub base_measurement_noise: f32,
    /// Floor applied to confidence before dividing, so a zero-confidence
    /// observation still yields finite (huge) measurement noise.
    pub min_confidence: f32,
}

impl Default for MotionFilterConfig {
    fn default() -> Self {
        Self {
            dt: 1.0,
            process_noise: 0.01,
            base_measurement_noise: 10.0,
            min_confidence: 0.05,
        }
    }
}

/// Constant-velocity Kalman filter over `[y, x, vy, vx]`.
#[derive(Debug, Clone)]
pub struct MotionFilter {
    state: [f32; 4],
    covariance: Mat4,
    config: MotionFilterConfig,
}

impl MotionFilter {
    /// Start the filter at a known position with zero velocity and a wide
    /// prior.
    pub fn new(initial: Point2, config: MotionFilterConfig) -> Self {
        Self {
            state: [initial.y, initial.x, 0.0, 0.0],
            covariance: Mat4::diagonal([50.0, 50.0, 25.0, 25.0]),
            config,
        }
    }

    /// Advance the state one tick under the constant-velocity model.
    pub fn predict(&mut self) {
        let dt = self.config.dt;
        let mut f = Mat4::identity();
        f.0[0][2] = dt;
        f.0[1][3] = dt;

        self.state = f.apply(&self.state);
        let q = Mat4::diagonal([self.config.process_noise; 4]);
        self.covariance = f.mul(&self.covariance).mul(&f.transpose()).add(&q);
    }

    /// Correct the state with a measured position. `confidence` in `[0, 1]`
    /// scales how much the measurement is trusted.
    pub fn update(&mut self, measured: Point2, confidence: f32) {
        let r = self.config.base_measurement_noise / confidence.max(self.config.min_confidence);
        let p = &self.covariance.0;

        // Innovation covariance S = H P Hᵀ + R, a 2×2 over the position rows.
        let s = [[p[0][0] + r, p[0][1]], [p[1][0], p[1][1] + r]];
        let det = s[0][0] * s[1][1] - s[0][1] * s[1][0];
        if det.abs() < f32::EPSILON {
            return;
        }
        let s_inv = [
            [s[1][1] / det, -s[0][1] / det],
            [-s[1][0] / det, s[0][0] / det],
        ];

        // Kalman gain K = P Hᵀ S⁻¹, a 4×2.
        let mut k = [[0.0f32; 2]; 4];
        for (i, row) in k.iter_mut().enumerate() {
            row[0] = p[i][0] * s_inv[0][0] + p[i][1] * s_inv[1][0];
            row[1] = p[i][0] * s_inv[0][1] + p[i][1] * s_inv[1][1];
        }

        let innovation = [measured.y - self.state[0], measured.x - self.state[1]];
        for (i, row) in k.iter().enumerate() {
            self.state[i] += row[0] * innovation[0] + row[1] * innovation[1];
        }

        // P = (I − K H) P, where K H only touches the first two columns.
        let mut updated = self.covariance.0;
        for (i, row) in updated.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell -= k[i][0] * p[0][j] + k[i][1] * p[1][j];
            }
        }
        self.covariance = Mat4(updated);
    }

    pub fn position(&self) -> Point2 {
        Point2::new(self.state[1], self.state[0])
    }

    /// Estimated speed in pixels per second.
    pub fn speed(&self) -> f32 {
        (self.state[2].powi(2) + self.state[3].powi(2)).sqrt()
    }

    /// Compass heading of the velocity estimate, degrees `[0, 360)`.
    pub fn heading_degrees(&self) -> f32 {
        let vy = self.state[2];
        let vx = self.state[3];
        vx.atan2(-vy).to_degrees().rem_euclid(360.0)
    }

    pub fn state(&self) -> &[f32; 4] {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mat4_identity_is_neutral() {
        let m = Mat4::diagonal([1.0, 2.0, 3.0, 4.0]);
        assert_eq!(m.mul(&Mat4::identity()), m);
        assert_eq!(Mat4::identity().mul(&m), m);
    }

    #[test]
    fn mat4_transpose_swaps_off_diagonal() {
        let mut m = Mat4::identity();
        m.0[0][3] = 7.0;
        let t = m.transpose();
        assert_eq!(t.0[3][0], 7.0);
        assert_eq!(t.0[0][3], 0.0);
    }

    #[test]
    fn stationary_target_settles() {
        let target = Point2::new(200.0, 150.0);
        let mut filter = MotionFilter::new(Point2::new(180.0, 130.0), MotionFilterConfig::default());
        for _ in 0..20 {
            filter.predict();
            filter.update(target, 1.0);
        }
        assert!(filter.position().distance(&target) < 3.0);
        assert!(filter.speed() < 1.0, "speed was {}", filter.speed());
    }

    #[test]
    fn constant_velocity_recovers_speed_and_heading() {
        // Target moves 6 px right and 8 px up per tick: speed 10, heading
        // atan2(6, 8) ≈ 36.87°. Measurements wobble ±1.5 px around the line.
        let mut filter = MotionFilter::new(Point2::new(100.0, 400.0), MotionFilterConfig::default());
        for step in 1..=40 {
            let wobble = if step % 2 == 0 { 1.5 } else { -1.5 };
            let z = Point2::new(
                100.0 + 6.0 * step as f32 + wobble,
                400.0 - 8.0 * step as f32 - wobble,
            );
            filter.predict();
            filter.update(z, 1.0);
        }
        assert!(
            (filter.speed() - 10.0).abs() < 1.5,
            "speed was {}",
            filter.speed()
        );
        let expected = 6.0f32.atan2(8.0).to_degrees();
        assert!(
            (filter.heading_degrees() - expected).abs() < 8.0,
            "heading was {}",
            filter.heading_degrees()
        );
    }

    #[test]
    fn heading_zero_when_moving_up() {
        let mut filter = MotionFilter::new(Point2::new(300.0, 400.0), MotionFilterConfig::default());
        for step in 1..=20 {
            filter.predict();
            filter.update(Point2::new(300.0, 400.0 - 10.0 * step as f32), 1.0);
        }
        let h = filter.heading_degrees();
        assert!(h < 5.0 || h > 355.0, "heading was {h}");
    }

    #[test]
    fn low_confidence_measurement_barely_moves_the_state() {
        let start = Point2::new(100.0, 100.0);
        let jump = Point2::new(300.0, 300.0);

        let mut trusting = MotionFilter::new(start, MotionFilterConfig::default());
        trusting.predict();
        trusting.update(jump, 1.0);

        let mut doubting = MotionFilter::new(start, MotionFilterConfig::default());
        doubting.predict();
        doubting.update(jump, 0.0);

        let trusted_move = trusting.position().distance(&start);
        let doubted_move = doubting.position().distance(&start);
        assert!(
            trusted_move > doubted_move * 3.0,
            "trusted {trusted_move}, doubted {doubted_move}"
        );
    }
}
