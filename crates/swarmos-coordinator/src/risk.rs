//! Pairwise collision risk.
//!
//! The baseline signal is the minimum distance between any two waypoints of
//! two trajectories: below the threshold, the pair is flagged for reroute.
//! Deliberately conservative and cheap; trajectories are short node lists,
//! not dense curves.

use swarmos_types::Trajectory;

/// Minimum distance between any waypoint of `a` and any waypoint of `b`.
/// Infinite when either trajectory has no points, so empty plans never flag.
pub fn min_trajectory_distance(a: &Trajectory, b: &Trajectory) -> f32 {
    let mut min = f32::INFINITY;
    for pa in &a.points {
        for pb in &b.points {
            let d = pa.distance(pb);
            if d < min {
                min = d;
            }
        }
    }
    min
}

/// Indices of trajectory pairs whose minimum distance falls below
/// `threshold`. Input order is preserved; each pair is reported once with
/// `i < j`.
pub fn flagged_pairs(trajectories: &[&Trajectory], threshold: f32) -> Vec<(usize, usize)> {
    let mut flagged = Vec::new();
    for i in 0..trajectories.len() {
        for j in (i + 1)..trajectories.len() {
            if min_trajectory_distance(trajectories[i], trajectories[j]) < threshold {
                flagged.push((i, j));
            }
        }
    }
    flagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmos_types::Point2;

    fn trajectory(agent_id: &str, points: &[(f32, f32)]) -> Trajectory {
        Trajectory {
            agent_id: agent_id.to_string(),
            node_indices: (0..points.len()).collect(),
            points: points.iter().map(|&(x, y)| Point2::new(x, y)).collect(),
            start_node: 0,
            goal_node: points.len().saturating_sub(1),
        }
    }

    #[test]
    fn distance_is_the_closest_waypoint_pair() {
        let a = trajectory("a", &[(0.0, 0.0), (100.0, 0.0)]);
        let b = trajectory("b", &[(100.0, 30.0), (500.0, 500.0)]);
        assert!((min_trajectory_distance(&a, &b) - 30.0).abs() < 1e-3);
    }

    #[test]
    fn empty_trajectory_never_flags() {
        let a = trajectory("a", &[(0.0, 0.0)]);
        let empty = trajectory("b", &[]);
        assert_eq!(min_trajectory_distance(&a, &empty), f32::INFINITY);
        assert!(flagged_pairs(&[&a, &empty], 1000.0).is_empty());
    }

    #[test]
    fn only_close_pairs_are_flagged() {
        let a = trajectory("a", &[(0.0, 0.0), (100.0, 100.0)]);
        let b = trajectory("b", &[(110.0, 100.0), (400.0, 400.0)]); // 10 from a
        let c = trajectory("c", &[(900.0, 900.0), (950.0, 950.0)]); // far from both
        let flagged = flagged_pairs(&[&a, &b, &c], 50.0);
        assert_eq!(flagged, vec![(0, 1)]);
    }

    #[test]
    fn shared_waypoint_is_distance_zero() {
        let a = trajectory("a", &[(0.0, 0.0), (200.0, 200.0)]);
        let b = trajectory("b", &[(400.0, 0.0), (200.0, 200.0)]);
        assert_eq!(min_trajectory_distance(&a, &b), 0.0);
    }
}
