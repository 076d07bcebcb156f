/// The default largest gap, in frames, between two consecutive points of one track.
/// A larger gap ends the current track and starts a new one. A gap of exactly this
/// many frames does not split.
///
/// Unit: Frames
pub const DEFAULT_MAX_FRAME_GAP: u64 = 25;

/// The default minimum number of points in a track. Shorter tracks are discarded after
/// segmentation.
pub const DEFAULT_MIN_TRACK_LENGTH: usize = 10;

/// Expected contour area of a larva after the video has been scaled down for tracking.
///
/// Unit: Square pixels
pub const LARVA_NORMATIVE_AREA: f64 = 80.0;
pub const LARVA_AREA_WEIGHT: f64 = 1.0;

/// Expected contour area of an adult fish.
///
/// Unit: Square pixels
pub const ADULT_NORMATIVE_AREA: f64 = 120.0;
pub const ADULT_AREA_WEIGHT: f64 = 2.0;

pub const DEFAULT_DISTANCE_WEIGHT: f64 = 2.0;

//Foreground band applied to each frame (or to the background subtraction mask).
//The upper bound is exclusive, so 256 keeps every pixel at or above the lower bound.
pub const DEFAULT_THRESHOLD_LOW: u8 = 128;
pub const DEFAULT_THRESHOLD_HIGH: u16 = 256;

/// Number of frames between two progress messages while tracking one video.
pub const PROGRESS_INTERVAL_FRAMES: u64 = 500;
