use std::path::PathBuf;

use zftrack_lib::{TrackingMode, TrackingOverrides};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReportVerbosity {
    Quiet,
    Default,
    Verbose,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(super) enum ModeArg {
    Larva,
    Adult,
}

impl From<ModeArg> for TrackingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Larva => TrackingMode::Larva,
            ModeArg::Adult => TrackingMode::Adult,
        }
    }
}

/// How each video is divided into wells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WellLayout {
    /// The whole frame is a single well.
    Whole,
    /// `rows x cols` equal wells inside the plate rectangle (x, y, width, height), or inside
    /// the whole frame.
    Grid {
        plate: Option<(u32, u32, u32, u32)>,
        rows: u32,
        cols: u32,
    },
    /// Wells listed in a JSON file.
    File(PathBuf),
}

/// The region applied to every well that does not define its own.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DefaultRegion {
    None,
    /// A circle around the centre of the well.
    CentredCircle { radius: f64 },
    Border { y: i32 },
}

#[derive(Debug, Clone)]
pub struct DirCfg {
    pub video_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct WellCfg {
    pub layout: WellLayout,
    pub region: DefaultRegion,
}

/// Settings from the command line. Anything left unset here may still come from the
/// config file.
#[derive(Debug, Clone)]
pub struct TrackingArgs {
    pub mode: Option<TrackingMode>,
    pub overrides: TrackingOverrides,
    pub config_path: Option<PathBuf>,
    pub ffmpeg_dir: Option<PathBuf>,
    pub workers: Option<usize>,
    pub scale_width: Option<u32>,
    pub max_frames: Option<u64>,
    pub skip_forward: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct OutputCfg {
    pub output_path: Option<PathBuf>,
    pub save_tracks: bool,
    pub px_size: Option<f64>,
    pub verbosity: ReportVerbosity,
}

#[derive(Debug, Clone)]
pub struct AppCfg {
    pub dir_cfg: DirCfg,
    pub well_cfg: WellCfg,
    pub tracking_args: TrackingArgs,
    pub output_cfg: OutputCfg,
}
