#![allow(clippy::len_without_is_empty)]
#![allow(clippy::let_and_return)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![warn(clippy::unwrap_used)]

//! # Overview
//! zftrack_lib follows a single moving blob (a zebrafish larva, or an adult fish) through
//! the frames of a video, links the detections into tracks, and splits the tracks by
//! region of the well for later analysis.
//!
//! # High Level API
//! Describe the wells to track, then track them all on a pool of worker threads.
//! ```no_run
//! use zftrack_lib::{track_wells, FrameReadCfg, Region, TrackingCfg, WellTask};
//! use zftrack_common::Crop;
//!
//! let plate = Crop::from_topleft_and_dims((1280, 720), 40, 20, 1200, 680).unwrap();
//! let tasks = plate
//!     .grid(4, 6)
//!     .unwrap()
//!     .into_iter()
//!     .enumerate()
//!     .map(|(i, well)| {
//!         let mut source = FrameReadCfg::from_path("plate.avi");
//!         source.crop(well);
//!         WellTask {
//!             well: format!("well_{i}"),
//!             source,
//!             region: Some(Region::Circle { center: (100, 85), radius: 60.0 }),
//!         }
//!     })
//!     .collect();
//!
//! let results = track_wells(tasks, &TrackingCfg::larva(), 4).unwrap();
//! for result in results {
//!     let result = result.unwrap();
//!     println!("{}: {} tracks", result.well, result.tracks.len());
//! }
//! ```
//!
//! # How it works
//! Each frame is thresholded into a binary mask (after background subtraction for adult
//! fish), cleaned up with morphology, and every outer contour of the mask becomes a
//! candidate blob with an area and a centroid. When nothing is being followed the largest
//! candidate starts a track. Otherwise each candidate is scored by how close its area is to
//! the expected area and how close it is to the last accepted position, and the best
//! scoring candidate is accepted.
//!
//! Once the video is finished, the accepted points are cut into tracks wherever too many
//! frames pass without a detection, and tracks that are too short are dropped.
//!
//! # Prerequisites
//! Videos are decoded by calling Ffmpeg from the command line. Ffmpeg and Ffprobe must be
//! installed, either on the search path or at the locations given with
//! [`FrameReadCfg::ffmpeg_paths`].

mod definitions;
mod pipeline;
mod tracking;
mod video;

pub use definitions::{
    DEFAULT_MAX_FRAME_GAP, DEFAULT_MIN_TRACK_LENGTH, PROGRESS_INTERVAL_FRAMES,
};
pub use pipeline::{track_source, track_well, track_wells, WellResult, WellTask};
pub use tracking::{
    frame_detector::{
        candidates_from_mask, Candidate, DetectorCfg, FrameDetector, MorphologyCfg,
        MorphologyOrder,
    },
    point::{Coords, Linkage, Point, ScoreWeights},
    region::{Region, RegionSplit, RegionStats},
    segmenter::{Track, TrackSegmenter},
    tracker::{select_linked, select_seed, FrameOutcome, PointMap, Tracker, TrackerState, TrackingRun},
    tracking_cfg::{TrackingCfg, TrackingMode, TrackingOverrides},
    Error,
};
pub use video::{FrameReadCfg, FrameSource, Frames, InMemoryFrames};

pub type TrackResult<T> = Result<T, crate::Error>;
