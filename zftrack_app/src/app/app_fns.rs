use std::{
    error::Error,
    path::{Path, PathBuf},
};

use ffmpeg_cmdline_utils::{ffmpeg_and_ffprobe_are_callable, is_video_file, FfmpegPaths, VideoInfo};
use itertools::Itertools;
use zftrack_lib::{track_wells, FrameReadCfg, WellTask};

use crate::app::{
    config_file::{self, ResolvedCfg},
    track_output::{build_reports, write_reports, WellMeta},
    wells::{WellDef, WellPlan},
    *,
};

// * read cfg
// * find videos
// * probe each video and lay out its wells
// * track all wells
// * output results

pub fn run_app() -> i32 {
    let cfg = arg_parse::parse_args();
    configure_logs(cfg.output_cfg.verbosity);

    let ret = match run_app_inner(&cfg) {
        Ok(()) => 0,
        Err(fatal_error) => {
            print_fatal_err(fatal_error, cfg.output_cfg.verbosity);
            1
        }
    };

    ret
}

fn run_app_inner(cfg: &AppCfg) -> eyre::Result<()> {
    let resolved = config_file::resolve(&cfg.tracking_args, &cfg.output_cfg)?;
    resolved.tracking.validate()?;
    debug!("{:?}", resolved);

    if !ffmpeg_and_ffprobe_are_callable(&resolved.ffmpeg) {
        return Err(AppError::FfmpegNotCallable.into());
    }

    // Check that all video paths exist
    let non_exist_paths = cfg.dir_cfg.video_paths.iter().filter(|p| !p.exists());
    match non_exist_paths.collect::<Vec<_>>().as_slice() {
        [] => (),
        missing => {
            return Err(eyre::Report::msg(format!(
                "videos not found: {}",
                missing.iter().map(|p| p.to_string_lossy()).join(", ")
            )));
        }
    }

    let videos = find_videos(&cfg.dir_cfg.video_paths, &resolved.ffmpeg);
    if videos.is_empty() {
        return Err(AppError::NoVideos.into());
    }
    info!("Found {} videos", videos.len());

    let plan = WellPlan::from_layout(&cfg.well_cfg.layout)?;

    let mut metas = vec![];
    let mut tasks = vec![];
    for video in &videos {
        let info = match VideoInfo::new(video, &resolved.ffmpeg) {
            Ok(info) => info,
            Err(source) => {
                warn!(
                    "{}",
                    AppError::Video {
                        path: video.clone(),
                        source
                    }
                );
                continue;
            }
        };

        let wells = match plan.wells(info.resolution()) {
            Ok(wells) => wells,
            Err(e) => {
                warn!("{}: {e}", video.display());
                continue;
            }
        };

        for (meta, task) in well_tasks(video, &info, wells, cfg, &resolved)? {
            metas.push(meta);
            tasks.push(task);
        }
    }

    if tasks.is_empty() {
        return Err(AppError::NoVideos.into());
    }

    let num_wells = tasks.len();
    info!("Tracking {} wells on {} workers", num_wells, resolved.workers);

    let results = track_wells(tasks, &resolved.tracking, resolved.workers)?;
    let num_failed = results.iter().filter(|r| r.is_err()).count();

    let reports = build_reports(&metas, results, cfg.output_cfg.save_tracks, resolved.px_size);
    write_reports(&reports, cfg.output_cfg.output_path.as_deref())?;

    if num_failed == num_wells {
        return Err(AppError::AllWellsFailed(num_wells).into());
    } else if num_failed > 0 {
        warn!("{num_failed} of {num_wells} wells could not be tracked");
    }

    Ok(())
}

fn well_tasks(
    video: &Path,
    info: &VideoInfo,
    wells: Vec<WellDef>,
    cfg: &AppCfg,
    resolved: &ResolvedCfg,
) -> eyre::Result<Vec<(WellMeta, WellTask<FrameReadCfg>)>> {
    let video_name = video
        .file_name()
        .map_or_else(|| video.to_string_lossy(), |name| name.to_string_lossy());

    let mut ret = Vec::with_capacity(wells.len());
    for well in wells {
        let mut read_cfg = FrameReadCfg::from_path(video);
        read_cfg.crop(well.crop).ffmpeg_paths(resolved.ffmpeg.clone());
        if let Some(width) = resolved.scale_width {
            read_cfg.scale_width(width);
        }
        if let Some(max_frames) = cfg.tracking_args.max_frames {
            read_cfg.max_frames(max_frames);
        }
        if let Some(offset) = cfg.tracking_args.skip_forward {
            read_cfg.start_offset(offset);
        }

        let region = match (well.region, cfg.well_cfg.region) {
            (Some(region), _) => Some(region),
            (None, DefaultRegion::None) => None,
            (None, default) => default.for_dims(read_cfg.output_resolution(info)?),
        };

        let meta = WellMeta {
            video: video.to_path_buf(),
            well: well.name.clone(),
            fps: info.fps(),
        };
        let task = WellTask {
            well: format!("{video_name} {}", well.name),
            source: read_cfg,
            region,
        };

        ret.push((meta, task));
    }

    Ok(ret)
}

// Files named on the command line are always tracked. Directories are searched recursively
// and only files that ffprobe recognizes as video are kept.
fn find_videos(paths: &[PathBuf], ffmpeg: &FfmpegPaths) -> Vec<PathBuf> {
    let mut ret = vec![];

    for path in paths {
        if !path.is_dir() {
            ret.push(path.clone());
            continue;
        }

        for entry in walkdir::WalkDir::new(path).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("{e}");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            match is_video_file(entry.path(), ffmpeg) {
                Ok(true) => ret.push(entry.into_path()),
                Ok(false) => trace!("Not a video: {}", entry.path().display()),
                Err(e) => trace!("Not a video: {}: {e}", entry.path().display()),
            }
        }
    }

    ret.into_iter().unique().collect()
}

fn print_fatal_err(fatal_err: eyre::Report, verbosity: ReportVerbosity) {
    error!(target: "app-errorlog", "{}", fatal_err);

    if verbosity == ReportVerbosity::Verbose {
        let mut source: Option<&(dyn Error + 'static)> = fatal_err.source();
        while let Some(e) = source {
            error!(target: "app-errorlog", "    caused by: {}", e);
            source = e.source();
        }
    }
}

pub fn configure_logs(verbosity: ReportVerbosity) {
    use simplelog::*;

    let mut cfg = simplelog::ConfigBuilder::new();

    let min_loglevel = match verbosity {
        ReportVerbosity::Quiet => LevelFilter::Warn,
        ReportVerbosity::Default => LevelFilter::Info,
        ReportVerbosity::Verbose => LevelFilter::Trace,
    };

    TermLogger::init(
        min_loglevel,
        cfg.build(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .unwrap_or_else(|e| print_error_and_quit(eyre::Report::new(e).wrap_err("TermLogger failed to initialize")));
}
