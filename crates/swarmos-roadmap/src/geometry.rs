//! Segment intersection predicates.
//!
//! Exact orientation-based tests, including the collinear touch cases. Edge
//! validation uses these rather than sampling along the segment, so a roadmap
//! edge can never thread through a thin obstacle.

use swarmos_types::{Point2, Rect};

const COLLINEAR_EPSILON: f32 = 1e-6;

/// Sign of the cross product `(q - p) × (r - p)`: positive for a left turn,
/// negative for a right turn, zero (within epsilon) for collinear.
pub fn orientation(p: &Point2, q: &Point2, r: &Point2) -> f32 {
    let cross = (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x);
    if cross.abs() < COLLINEAR_EPSILON {
        0.0
    } else {
        cross
    }
}

/// Whether collinear point `q` lies within the bounding box of segment `pr`.
fn on_segment(p: &Point2, q: &Point2, r: &Point2) -> bool {
    q.x >= p.x.min(r.x) && q.x <= p.x.max(r.x) && q.y >= p.y.min(r.y) && q.y <= p.y.max(r.y)
}

/// Whether segments `a1a2` and `b1b2` intersect, endpoints included.
pub fn segments_intersect(a1: &Point2, a2: &Point2, b1: &Point2, b2: &Point2) -> bool {
    let o1 = orientation(a1, a2, b1);
    let o2 = orientation(a1, a2, b2);
    let o3 = orientation(b1, b2, a1);
    let o4 = orientation(b1, b2, a2);

    if o1 * o2 < 0.0 && o3 * o4 < 0.0 {
        return true;
    }
    (o1 == 0.0 && on_segment(a1, b1, a2))
        || (o2 == 0.0 && on_segment(a1, b2, a2))
        || (o3 == 0.0 && on_segment(b1, a1, b2))
        || (o4 == 0.0 && on_segment(b1, a2, b2))
}

/// Whether the segment `ab` touches `rect`: either endpoint inside, or the
/// segment crossing any of the four edges.
pub fn segment_intersects_rect(a: &Point2, b: &Point2, rect: &Rect) -> bool {
    if rect.contains(a) || rect.contains(b) {
        return true;
    }
    let tl = Point2::new(rect.x, rect.y);
    let tr = Point2::new(rect.x + rect.width, rect.y);
    let bl = Point2::new(rect.x, rect.y + rect.height);
    let br = Point2::new(rect.x + rect.width, rect.y + rect.height);
    segments_intersect(a, b, &tl, &tr)
        || segments_intersect(a, b, &tr, &br)
        || segments_intersect(a, b, &br, &bl)
        || segments_intersect(a, b, &bl, &tl)
}
