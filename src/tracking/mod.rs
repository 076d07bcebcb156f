pub mod frame_detector;
pub mod point;
pub mod region;
pub mod segmenter;
pub mod tracker;
pub mod tracking_cfg;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error that prevented a video from being tracked.
///
/// Per-frame conditions (a blank frame, a frame with no blobs, a contour with no area)
/// are reported as a [`tracker::FrameOutcome`] instead and never fail tracking.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum Error {
    /// The video could not be opened or decoded.
    #[error("Video unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
