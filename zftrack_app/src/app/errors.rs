use std::path::PathBuf;

use ffmpeg_cmdline_utils::FfmpegError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Tracking error: {0}")]
    Tracking(#[from] zftrack_lib::Error),

    #[error("Video error for {}: {source}", path.display())]
    Video {
        path: PathBuf,
        #[source]
        source: FfmpegError,
    },

    #[error("Ffmpeg and Ffprobe could not be run. Install them or pass --ffmpeg-dir")]
    FfmpegNotCallable,

    #[error("Invalid well layout: {0}")]
    WellLayout(#[from] zftrack_common::Error),

    #[error("Failed to read {}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}", path.display())]
    ParseFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No videos found")]
    NoVideos,

    #[error("None of the {0} wells could be tracked")]
    AllWellsFailed(usize),

    #[error("Failed to write output: {0}")]
    Output(String),
}

pub fn print_error_and_quit(e: eyre::Report) -> ! {
    #[allow(clippy::print_stderr)]
    let () = eprintln!("{:?}", e);
    std::process::exit(1);
}
