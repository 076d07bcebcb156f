#![allow(clippy::let_and_return)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![warn(clippy::unwrap_used)]

//! Read decoded grayscale frames from video files by running the Ffmpeg command line tools
//! as child processes.
//!
//! Ffprobe is used first to discover the resolution, duration and frame count of a video,
//! then Ffmpeg decodes the video into raw frames on its stdout pipe. Optional crop and scale
//! filters are applied by Ffmpeg itself, so only the pixels that are needed ever cross the
//! pipe.
//!
//! ```no_run
//! use ffmpeg_cmdline_utils::{FfmpegFrameReaderBuilder, FfmpegPaths};
//!
//! let paths = FfmpegPaths::default();
//! let (frames, info) = FfmpegFrameReaderBuilder::new("plate.avi")
//!     .crop(10, 10, 120, 120)
//!     .scale_width(60)
//!     .spawn_gray(&paths)
//!     .unwrap();
//!
//! println!("{:?} frames", info.estimated_frame_count());
//! for frame in frames {
//!     assert_eq!(frame.dimensions(), (60, 60));
//! }
//! ```

mod ffmpeg_error_kind;
mod ffmpeg_ops;
mod ffmpeg_stats;

pub use ffmpeg_error_kind::FfmpegError;
pub use ffmpeg_ops::*;
pub use ffmpeg_stats::{VideoInfo, VideoInfoError};
