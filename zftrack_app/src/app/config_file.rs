use std::path::{Path, PathBuf};

use ffmpeg_cmdline_utils::FfmpegPaths;
use serde::{Deserialize, Serialize};
use zftrack_common::BackgroundModelCfg;
use zftrack_lib::{TrackingCfg, TrackingMode, TrackingOverrides};

use crate::app::*;

//adult videos are scaled down before tracking, and distances are reported in cm at that scale
const ADULT_SCALE_WIDTH: u32 = 480;
const ADULT_PX_SIZE: f64 = 0.06;

/// Optional settings read from a JSON file. Command line arguments take precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub mode: Option<TrackingMode>,
    pub tracking: TrackingOverrides,
    pub background: Option<BackgroundModelCfg>,
    pub ffmpeg: Option<FfmpegPaths>,
    pub workers: Option<usize>,
    pub scale_width: Option<u32>,
    pub px_size: Option<f64>,
}

impl ConfigFile {
    /// Where the config file is looked for when --config is not given.
    pub fn default_path() -> Option<PathBuf> {
        directories_next::ProjectDirs::from("", "zftrack", "zftrack")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path).map_err(|source| AppError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&text).map_err(|source| AppError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// The settings the app runs with, after the mode preset, the config file and the command
/// line have been combined.
#[derive(Debug, Clone)]
pub struct ResolvedCfg {
    pub tracking: TrackingCfg,
    pub ffmpeg: FfmpegPaths,
    pub workers: usize,
    pub scale_width: Option<u32>,
    pub px_size: Option<f64>,
}

pub fn resolve(args: &TrackingArgs, output_cfg: &OutputCfg) -> Result<ResolvedCfg, AppError> {
    let file = match &args.config_path {
        Some(path) => ConfigFile::from_path(path)?,
        None => match ConfigFile::default_path().filter(|p| p.is_file()) {
            Some(path) => {
                debug!("Using config file {}", path.display());
                ConfigFile::from_path(&path)?
            }
            None => ConfigFile::default(),
        },
    };

    Ok(resolve_with_file(args, output_cfg, &file))
}

fn resolve_with_file(args: &TrackingArgs, output_cfg: &OutputCfg, file: &ConfigFile) -> ResolvedCfg {
    let mode = args.mode.or(file.mode).unwrap_or(TrackingMode::Larva);

    let mut tracking = TrackingCfg::for_mode(mode);
    if let Some(background) = file.background {
        tracking.background = Some(background);
    }

    let mut overrides = file.tracking;
    overrides.merge(&args.overrides);
    tracking.apply(&overrides);

    let ffmpeg = match (&args.ffmpeg_dir, &file.ffmpeg) {
        (Some(dir), _) => FfmpegPaths::from_dir(dir),
        (None, Some(paths)) => paths.clone(),
        (None, None) => FfmpegPaths::default(),
    };

    let workers = args
        .workers
        .or(file.workers)
        .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, usize::from));

    let (default_scale_width, default_px_size) = match mode {
        TrackingMode::Larva => (None, None),
        TrackingMode::Adult => (Some(ADULT_SCALE_WIDTH), Some(ADULT_PX_SIZE)),
    };

    ResolvedCfg {
        tracking,
        ffmpeg,
        workers,
        scale_width: args.scale_width.or(file.scale_width).or(default_scale_width),
        px_size: output_cfg.px_size.or(file.px_size).or(default_px_size),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn empty_args() -> TrackingArgs {
        TrackingArgs {
            mode: None,
            overrides: TrackingOverrides::default(),
            config_path: None,
            ffmpeg_dir: None,
            workers: None,
            scale_width: None,
            max_frames: None,
            skip_forward: None,
        }
    }

    fn output_cfg() -> OutputCfg {
        OutputCfg {
            output_path: None,
            save_tracks: false,
            px_size: None,
            verbosity: ReportVerbosity::Default,
        }
    }

    #[test]
    fn test_defaults_are_larva() {
        let resolved = resolve_with_file(&empty_args(), &output_cfg(), &ConfigFile::default());

        assert_eq!(resolved.tracking, TrackingCfg::larva());
        assert_eq!(resolved.ffmpeg, FfmpegPaths::default());
        assert_eq!(resolved.scale_width, None);
        assert_eq!(resolved.px_size, None);
        assert!(resolved.workers >= 1);
    }

    #[test]
    fn test_command_line_beats_file() {
        let file: ConfigFile = serde_json::from_str(
            r#"{
                "mode": "adult",
                "tracking": {"max_frame_gap": 10, "normative_area": 100.0},
                "workers": 3,
                "scale_width": 640
            }"#,
        )
        .unwrap();

        let mut args = empty_args();
        args.overrides.max_frame_gap = Some(50);
        args.workers = Some(8);

        let resolved = resolve_with_file(&args, &output_cfg(), &file);

        assert!(resolved.tracking.background.is_some());
        assert_eq!(resolved.tracking.weights.area_weight, 2.0);
        assert_eq!(resolved.tracking.weights.normative_area, 100.0);
        assert_eq!(resolved.tracking.segmenter.max_gap, 50);
        assert_eq!(resolved.workers, 8);
        assert_eq!(resolved.scale_width, Some(640));
        assert_eq!(resolved.px_size, Some(ADULT_PX_SIZE));

        args.mode = Some(TrackingMode::Larva);
        let resolved = resolve_with_file(&args, &output_cfg(), &file);
        assert!(resolved.tracking.background.is_none());
        assert_eq!(resolved.px_size, None);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let res = serde_json::from_str::<ConfigFile>(r#"{"tolerance": 0.3}"#);
        assert!(res.is_err());
    }
}
