use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::definitions::{DEFAULT_MAX_FRAME_GAP, DEFAULT_MIN_TRACK_LENGTH};
use crate::tracking::point::Point;
use crate::tracking::tracker::PointMap;

/// A run of points in strictly increasing frame order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    points: Vec<Point>,
}

impl Track {
    //callers guarantee frame order.
    pub(crate) fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn first_frame(&self) -> Option<u64> {
        self.points.first().map(Point::frame)
    }

    pub fn last_frame(&self) -> Option<u64> {
        self.points.last().map(Point::frame)
    }

    /// Sum of the straight line distances between consecutive points, in pixels.
    pub fn path_length(&self) -> f64 {
        self.points
            .iter()
            .tuple_windows()
            .map(|(a, b)| a.distance_to(b))
            .sum()
    }
}

/// Splits a point map into tracks wherever consecutive points are too far apart in time,
/// then drops the tracks that are too short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackSegmenter {
    /// A gap of more than this many frames starts a new track.
    pub max_gap: u64,
    pub min_track_length: usize,
}

impl Default for TrackSegmenter {
    fn default() -> Self {
        Self {
            max_gap: DEFAULT_MAX_FRAME_GAP,
            min_track_length: DEFAULT_MIN_TRACK_LENGTH,
        }
    }
}

impl TrackSegmenter {
    pub fn segment(&self, points: &PointMap) -> Vec<Track> {
        let mut tracks: Vec<Vec<Point>> = vec![];

        //the first point is measured against frame 0, so a map that starts late opens
        //with an empty track that is later discarded.
        let mut current = vec![];
        let mut prev_key = 0;
        for (&key, &point) in points {
            if key - prev_key > self.max_gap {
                tracks.push(std::mem::take(&mut current));
            }
            current.push(point);
            prev_key = key;
        }
        tracks.push(current);

        tracks
            .into_iter()
            .filter(|t| !t.is_empty() && t.len() >= self.min_track_length)
            .map(Track::from_points)
            .collect()
    }
}
