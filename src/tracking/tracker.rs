use std::collections::BTreeMap;

use image::GrayImage;
use log::trace;
use serde::{Deserialize, Serialize};
use zftrack_common::is_blank;

use crate::tracking::frame_detector::{Candidate, FrameDetector};
use crate::tracking::point::{Point, ScoreWeights};
use crate::TrackingCfg;

/// Accepted points keyed by the index of the frame they were found in. Sparse: frames
/// where nothing was accepted have no entry.
pub type PointMap = BTreeMap<u64, Point>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackerState {
    NoTrack,
    Tracking { last: Point },
}

/// What happened to a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// Every pixel was zero. The detector was not run.
    Empty,
    NoCandidates,
    Seeded(Point),
    Linked(Point),
}

impl FrameOutcome {
    pub fn accepted(&self) -> Option<&Point> {
        match self {
            Self::Seeded(p) | Self::Linked(p) => Some(p),
            Self::Empty | Self::NoCandidates => None,
        }
    }
}

/// The result of feeding every frame of a video through a [`Tracker`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingRun {
    pub points: PointMap,
    pub frames_processed: u64,
    pub skipped_frames: u64,
}

/// Follows one blob through a sequence of frames.
///
/// Each frame yields at most one accepted [`Point`]. With no point to follow, the largest
/// candidate seeds a new one. Otherwise every candidate is scored against the last accepted
/// point and the best scoring candidate is accepted.
#[derive(Debug, Clone)]
pub struct Tracker {
    detector: FrameDetector,
    weights: ScoreWeights,
    state: TrackerState,
    points: PointMap,
    frame_counter: u64,
    skipped_frames: u64,
    empty_reference_dims: Option<(u32, u32)>,
}

impl Tracker {
    pub fn new(cfg: &TrackingCfg) -> Self {
        Self {
            detector: FrameDetector::new(cfg.detector, cfg.background),
            weights: cfg.weights,
            state: TrackerState::NoTrack,
            points: PointMap::new(),
            frame_counter: 0,
            skipped_frames: 0,
            empty_reference_dims: None,
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn points(&self) -> &PointMap {
        &self.points
    }

    pub fn detector(&self) -> &FrameDetector {
        &self.detector
    }

    /// Number of frames given to [`Self::process_frame`] so far. This is also the index that
    /// the next frame will get.
    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }

    pub fn skipped_frames(&self) -> u64 {
        self.skipped_frames
    }

    pub fn process_frame(&mut self, frame: &GrayImage) -> FrameOutcome {
        let frame_idx = self.frame_counter;
        self.frame_counter += 1;

        //the empty reference takes its size from the first frame. Frames of any other size
        //are never empty.
        let reference_dims = *self.empty_reference_dims.get_or_insert(frame.dimensions());
        if reference_dims == frame.dimensions() && is_blank(frame) {
            trace!("frame {frame_idx}: empty");
            self.skipped_frames += 1;
            return FrameOutcome::Empty;
        }

        let candidates = self.detector.detect(frame);
        if candidates.is_empty() {
            trace!("frame {frame_idx}: no candidates");
            self.skipped_frames += 1;
            return FrameOutcome::NoCandidates;
        }

        let outcome = match self.state {
            TrackerState::NoTrack => {
                let Some(seed) = select_seed(&candidates, frame_idx) else {
                    self.skipped_frames += 1;
                    return FrameOutcome::NoCandidates;
                };
                FrameOutcome::Seeded(seed)
            }
            TrackerState::Tracking { last } => {
                let Some(linked) = select_linked(&candidates, frame_idx, &last, &self.weights)
                else {
                    self.skipped_frames += 1;
                    return FrameOutcome::NoCandidates;
                };
                FrameOutcome::Linked(linked)
            }
        };

        if let Some(&accepted) = outcome.accepted() {
            self.points.insert(frame_idx, accepted);
            self.state = TrackerState::Tracking { last: accepted };
        }

        outcome
    }

    pub fn finish(self) -> TrackingRun {
        TrackingRun {
            points: self.points,
            frames_processed: self.frame_counter,
            skipped_frames: self.skipped_frames,
        }
    }
}

/// The candidate with the largest area. The first of several equally large candidates wins.
pub fn select_seed(candidates: &[Candidate], frame: u64) -> Option<Point> {
    let mut best: Option<&Candidate> = None;
    for cand in candidates {
        if best.map_or(true, |b| cand.area > b.area) {
            best = Some(cand);
        }
    }

    best.map(|c| Point::seed(c.centroid, c.area, frame))
}

/// The candidate that scores highest against `last`. The last of several equally scoring
/// candidates wins.
pub fn select_linked(
    candidates: &[Candidate],
    frame: u64,
    last: &Point,
    weights: &ScoreWeights,
) -> Option<Point> {
    let mut best: Option<(f64, Point)> = None;
    for cand in candidates {
        let p = Point::linked(cand.centroid, cand.area, frame, last, weights);
        let score = p.score().unwrap_or(f64::NEG_INFINITY);
        if best.map_or(true, |(best_score, _)| score >= best_score) {
            best = Some((score, p));
        }
    }

    best.map(|(_, p)| p)
}

#[cfg(test)]
mod test {
    use super::*;
    use image::Luma;
    use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};

    fn cand(x: i32, y: i32, area: f64) -> Candidate {
        Candidate {
            centroid: (x, y),
            area,
        }
    }

    fn frame_with_blob(x: i32, y: i32) -> GrayImage {
        let mut img = GrayImage::new(64, 48);
        draw_filled_rect_mut(&mut img, Rect::at(x, y).of_size(9, 9), Luma([255]));
        img
    }

    #[test]
    fn test_seed_largest_area_first_wins() {
        let cands = [cand(1, 1, 10.0), cand(2, 2, 30.0), cand(3, 3, 30.0), cand(4, 4, 5.0)];
        let seed = select_seed(&cands, 9).unwrap();

        assert_eq!(seed.coords(), (2, 2));
        assert_eq!(seed.frame(), 9);
        assert!(seed.is_seed());

        assert_eq!(select_seed(&[], 0), None);
    }

    #[test]
    fn test_linked_best_score() {
        let weights = ScoreWeights::adult();
        let last = Point::seed((0, 0), 120.0, 0);
        let cands = [cand(3, 0, 50.0), cand(0, 40, 125.0)];

        let p = select_linked(&cands, 1, &last, &weights).unwrap();
        assert_eq!(p.coords(), (0, 40));
        assert_eq!(p.score(), Some(-87.0));
    }

    #[test]
    fn test_linked_last_max_wins() {
        let weights = ScoreWeights::larva();
        let last = Point::seed((10, 10), 80.0, 0);
        //equal areas at equal distances score identically
        let cands = [cand(13, 14, 80.0), cand(7, 6, 80.0), cand(10, 0, 10.0)];

        let p = select_linked(&cands, 1, &last, &weights).unwrap();
        assert_eq!(p.coords(), (7, 6));
    }

    #[test]
    fn test_empty_frame_skipped_without_detection() {
        let mut tracker = Tracker::new(&TrackingCfg::larva());

        assert_eq!(tracker.process_frame(&GrayImage::new(64, 48)), FrameOutcome::Empty);
        assert_eq!(tracker.frame_count(), 1);
        assert_eq!(tracker.skipped_frames(), 1);
        assert_eq!(tracker.detector().frames_examined(), 0);
        assert_eq!(*tracker.state(), TrackerState::NoTrack);
    }

    #[test]
    fn test_blank_frame_of_other_size_is_not_empty() {
        let mut tracker = Tracker::new(&TrackingCfg::larva());
        tracker.process_frame(&frame_with_blob(5, 5));

        let outcome = tracker.process_frame(&GrayImage::new(32, 32));
        assert_eq!(outcome, FrameOutcome::NoCandidates);
        assert_eq!(tracker.detector().frames_examined(), 2);
        assert_eq!(tracker.skipped_frames(), 1);
    }

    #[test]
    fn test_no_candidates_keeps_state() {
        let mut tracker = Tracker::new(&TrackingCfg::larva());
        let seeded = tracker.process_frame(&frame_with_blob(5, 5));
        assert!(matches!(seeded, FrameOutcome::Seeded(_)));

        //a frame with only a dim blob is not blank but has no candidates
        let mut dim = GrayImage::new(64, 48);
        dim.put_pixel(3, 3, Luma([20]));
        assert_eq!(tracker.process_frame(&dim), FrameOutcome::NoCandidates);

        assert_eq!(tracker.frame_count(), 2);
        assert_eq!(tracker.skipped_frames(), 1);
        assert_eq!(
            *tracker.state(),
            TrackerState::Tracking {
                last: *seeded.accepted().unwrap()
            }
        );
    }

    #[test]
    fn test_state_machine() {
        let mut tracker = Tracker::new(&TrackingCfg::larva());

        let frames = [
            frame_with_blob(5, 5),
            GrayImage::new(64, 48),
            frame_with_blob(8, 9),
            frame_with_blob(12, 9),
        ];
        let outcomes = frames
            .iter()
            .map(|f| tracker.process_frame(f))
            .collect::<Vec<_>>();

        assert!(matches!(outcomes[0], FrameOutcome::Seeded(_)));
        assert_eq!(outcomes[1], FrameOutcome::Empty);
        assert!(matches!(outcomes[2], FrameOutcome::Linked(_)));
        assert!(matches!(outcomes[3], FrameOutcome::Linked(_)));

        let run = tracker.finish();
        assert_eq!(run.frames_processed, 4);
        assert_eq!(run.skipped_frames, 1);
        assert_eq!(run.points.keys().copied().collect::<Vec<_>>(), vec![0, 2, 3]);
        assert_eq!(run.points[&0].coords(), (9, 9));
        assert_eq!(run.points[&2].coords(), (12, 13));
        assert_eq!(run.points[&2].distance(), 5.0);
        assert_eq!(run.points[&3].coords(), (16, 13));
    }

    #[test]
    fn test_follows_blob_near_previous_position() {
        let mut tracker = Tracker::new(&TrackingCfg::larva());
        tracker.process_frame(&frame_with_blob(5, 5));

        //two identical blobs, the one close to the last point is chosen
        let mut frame = frame_with_blob(40, 30);
        draw_filled_rect_mut(&mut frame, Rect::at(7, 5).of_size(9, 9), Luma([255]));

        let outcome = tracker.process_frame(&frame);
        assert_eq!(outcome.accepted().unwrap().coords(), (11, 9));
    }
}
