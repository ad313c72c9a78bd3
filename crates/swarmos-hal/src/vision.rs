//! Vision input traits.
//!
//! The core consumes two things from whatever segmentation pipeline sits
//! upstream: per-colour match regions each tick, and the obstacle/goal layout
//! whenever the roadmap regenerates. How those are produced is not the
//! core's business.

use swarmos_types::{ColorTag, FrameBounds, MatchRegion, Rect, SwarmError};

/// Obstacle rectangles and goal region for one roadmap regeneration.
#[derive(Debug, Clone, PartialEq)]
pub struct ArenaSnapshot {
    pub bounds: FrameBounds,
    pub obstacles: Vec<Rect>,
    pub goal: Option<Rect>,
}

/// Supplies the pixels that matched one colour tag in the latest frame.
pub trait VisionSource: Send {
    /// # Errors
    ///
    /// Returns [`SwarmError::Vision`] when the frame cannot be produced at
    /// all (camera gone, stream closed). A visible frame with no matches is
    /// *not* an error: it yields an empty region.
    fn match_region(&mut self, color: ColorTag) -> Result<MatchRegion, SwarmError>;
}

/// Supplies the scene layout for roadmap regeneration.
pub trait ArenaSource: Send {
    /// # Errors
    ///
    /// Returns [`SwarmError::Vision`] when the layout cannot be captured.
    fn arena_snapshot(&mut self) -> Result<ArenaSnapshot, SwarmError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmos_types::Point2;

    /// Canned vision source used only for tests.
    struct FixedVision {
        region: MatchRegion,
    }

    impl VisionSource for FixedVision {
        fn match_region(&mut self, _color: ColorTag) -> Result<MatchRegion, SwarmError> {
            Ok(self.region.clone())
        }
    }

    #[test]
    fn trait_object_dispatch_works() {
        let bounds = FrameBounds::new(640.0, 480.0);
        let mut source: Box<dyn VisionSource> = Box::new(FixedVision {
            region: MatchRegion {
                color: ColorTag::Red,
                points: vec![Point2::new(1.0, 2.0)],
                bounds,
            },
        });
        let region = source.match_region(ColorTag::Red).unwrap();
        assert_eq!(region.points.len(), 1);
        assert_eq!(region.bounds, bounds);
    }
}
