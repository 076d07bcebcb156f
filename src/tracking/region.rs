use serde::{Deserialize, Serialize};

use crate::tracking::point::{Coords, Point};
use crate::tracking::segmenter::Track;

/// An area of a well used to split tracks after tracking.
///
/// Every region divides the well in two. Which half a point is in is decided by
/// [`Region::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Region {
    /// Points at most `radius` away from `center` are inner.
    Circle { center: Coords, radius: f64 },
    /// Points with `y` above (less than) the border are upper.
    Border { y: i32 },
    /// Like [`Region::Border`], but the border height is interpolated between two
    /// endpoints. Beyond either end the height of the nearest endpoint is used.
    Line { start: Coords, end: Coords },
}

impl Region {
    /// A circle through `on_circumference`. The radius is truncated to whole pixels.
    pub fn circle_from_circumference(center: Coords, on_circumference: Coords) -> Self {
        let dx = f64::from(on_circumference.0) - f64::from(center.0);
        let dy = f64::from(on_circumference.1) - f64::from(center.1);

        Self::Circle {
            center,
            radius: dx.hypot(dy).trunc(),
        }
    }

    /// A horizontal border at the mean height of two points, truncated to whole pixels.
    pub fn border_from_endpoints(a: Coords, b: Coords) -> Self {
        let mean = (f64::from(a.1) + f64::from(b.1)) / 2.0;
        Self::Border { y: mean as i32 }
    }

    /// Names of the two halves. The first is the half for which [`Self::classify`]
    /// returns true.
    pub fn labels(&self) -> (&'static str, &'static str) {
        match self {
            Self::Circle { .. } => ("inner", "outer"),
            Self::Border { .. } | Self::Line { .. } => ("upper", "lower"),
        }
    }

    /// true if the point is inside the circle, or above the border.
    pub fn classify(&self, (x, y): Coords) -> bool {
        match *self {
            Self::Circle {
                center: (cx, cy),
                radius,
            } => {
                let dx = f64::from(x) - f64::from(cx);
                let dy = f64::from(y) - f64::from(cy);
                dx.hypot(dy) <= radius
            }
            Self::Border { y: border } => y < border,
            Self::Line { start, end } => f64::from(y) < line_height(start, end, x),
        }
    }

    /// Split a run of points into maximal runs of consecutive points that are on the same
    /// side of the region. Runs are never merged, even when separated by a single point.
    pub fn split_points(&self, points: &[Point]) -> RegionSplit {
        let mut split = RegionSplit::default();

        let mut prev_state: Option<bool> = None;
        for &point in points {
            let state = self.classify(point.coords());
            let runs = if state {
                &mut split.inside
            } else {
                &mut split.outside
            };

            match runs.last_mut() {
                Some(run) if prev_state == Some(state) => run.push(point),
                _ => runs.push(vec![point]),
            }
            prev_state = Some(state);
        }

        split
    }

    /// Split each track separately and concatenate the results, keeping track order.
    pub fn split_tracks<'a>(&self, tracks: impl IntoIterator<Item = &'a Track>) -> RegionSplit {
        let mut ret = RegionSplit::default();
        for track in tracks {
            let split = self.split_points(track.points());
            ret.inside.extend(split.inside);
            ret.outside.extend(split.outside);
        }
        ret
    }
}

//height of the line at x, clamped to the endpoints.
fn line_height(start: Coords, end: Coords, x: i32) -> f64 {
    let ((x0, y0), (x1, y1)) = if start.0 <= end.0 {
        (start, end)
    } else {
        (end, start)
    };
    let (y0, y1) = (f64::from(y0), f64::from(y1));

    if x0 == x1 {
        return (y0 + y1) / 2.0;
    }
    if x <= x0 {
        return y0;
    }
    if x >= x1 {
        return y1;
    }

    let t = f64::from(x - x0) / f64::from(x1 - x0);
    y0 + t * (y1 - y0)
}

/// Runs of points on either side of a [`Region`]. Within each list runs are in the order
/// they were found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionSplit {
    pub inside: Vec<Vec<Point>>,
    pub outside: Vec<Vec<Point>>,
}

impl RegionSplit {
    pub fn inside_stats(&self) -> RegionStats {
        RegionStats::from_runs(&self.inside)
    }

    pub fn outside_stats(&self) -> RegionStats {
        RegionStats::from_runs(&self.outside)
    }
}

/// Totals over all runs on one side of a region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionStats {
    pub runs: usize,
    pub points: usize,
    /// Sum over runs of the number of frames from the first to the last point.
    pub frames_spanned: u64,
    /// Distance travelled within runs, in pixels. Steps between runs are not counted.
    pub path_length: f64,
}

impl RegionStats {
    pub fn from_runs(runs: &[Vec<Point>]) -> Self {
        let mut stats = Self {
            runs: runs.len(),
            ..Self::default()
        };

        for run in runs {
            stats.points += run.len();
            if let (Some(first), Some(last)) = (run.first(), run.last()) {
                stats.frames_spanned += last.frame() - first.frame() + 1;
            }
            stats.path_length += run.windows(2).map(|w| w[0].distance_to(&w[1])).sum::<f64>();
        }

        stats
    }

    /// Time spent on this side, counting one frame per point.
    pub fn seconds(&self, fps: f64) -> f64 {
        self.points as f64 / fps
    }

    /// Path length converted to real units with the size of one pixel.
    pub fn distance(&self, px_size: f64) -> f64 {
        self.path_length * px_size
    }
}
