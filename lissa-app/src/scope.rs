//! Headless X-Y scope readout
//!
//! Summarizes the recent point window the way a Lissajous display would
//! frame it: point count plus the extent of the figure on both axes.

use std::fmt;

use lissa_audio::SamplePoint;

/// Extent of the current Lissajous figure
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScopeStats {
    pub count: usize,
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl ScopeStats {
    /// Compute stats over `points`; all zero when empty
    pub fn from_points(points: &[SamplePoint]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };

        let mut stats = Self {
            count: points.len(),
            min_x: first.x,
            max_x: first.x,
            min_y: first.y,
            max_y: first.y,
        };
        for p in &points[1..] {
            stats.min_x = stats.min_x.min(p.x);
            stats.max_x = stats.max_x.max(p.x);
            stats.min_y = stats.min_y.min(p.y);
            stats.max_y = stats.max_y.max(p.y);
        }
        stats
    }

    /// Peak-to-peak width on the x (left) axis
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    /// Peak-to-peak height on the y (right) axis
    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }
}

impl fmt::Display for ScopeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pts  x [{:+.3}, {:+.3}]  y [{:+.3}, {:+.3}]",
            self.count, self.min_x, self.max_x, self.min_y, self.max_y
        )
    }
}
