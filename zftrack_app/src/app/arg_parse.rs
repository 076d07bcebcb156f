use std::path::{Path, PathBuf};

use clap::{value_parser, ArgAction::*};
use zftrack_lib::{TrackingMode, TrackingOverrides};

use crate::app::*;

// inputs
const VIDEO_PATHS: &str = "Video files or directories";
const MODE: &str = "Tracking mode";
const CONFIG_FILE: &str = "Config file";

// wells
const WELLS_FILE: &str = "Wells file";
const GRID: &str = "Plate rectangle";
const GRID_ROWS: &str = "Grid rows";
const GRID_COLS: &str = "Grid columns";
const CIRCLE_RADIUS: &str = "Circle radius";
const BORDER: &str = "Border";

// scoring, detection and segmentation
const NORMATIVE_AREA: &str = "Normative area";
const AREA_WEIGHT: &str = "Area weight";
const DISTANCE_WEIGHT: &str = "Distance weight";
const THRESHOLD_LOW: &str = "Threshold low";
const THRESHOLD_HIGH: &str = "Threshold high";
const MORPHOLOGY_ITERATIONS: &str = "Morphology iterations";
const MAX_FRAME_GAP: &str = "Max frame gap";
const MIN_TRACK_LENGTH: &str = "Min track length";

// decoding
const SCALE_WIDTH: &str = "Scale width";
const MAX_FRAMES: &str = "Max frames";
const SKIP_FORWARD: &str = "Skip forward";
const FFMPEG_DIR: &str = "Ffmpeg directory";
const WORKERS: &str = "Workers";

// output
const OUTPUT_PATH: &str = "Output file";
const SAVE_TRACKS: &str = "Save tracks";
const PX_SIZE: &str = "Pixel size";

// Arg specification
const ARGS_FILE: &str = "Args file";

//Verbosity
const VERBOSITY_QUIET: &str = "Quiet";
const VERBOSITY_VERBOSE: &str = "Verbose";

const DISPLAY_ORDERING: [&str; 28] = [
    //
    //inputs
    VIDEO_PATHS,
    MODE,
    CONFIG_FILE,
    //
    //wells
    WELLS_FILE,
    GRID,
    GRID_ROWS,
    GRID_COLS,
    CIRCLE_RADIUS,
    BORDER,
    //
    //tracking
    NORMATIVE_AREA,
    AREA_WEIGHT,
    DISTANCE_WEIGHT,
    THRESHOLD_LOW,
    THRESHOLD_HIGH,
    MORPHOLOGY_ITERATIONS,
    MAX_FRAME_GAP,
    MIN_TRACK_LENGTH,
    //
    //decoding
    SCALE_WIDTH,
    MAX_FRAMES,
    SKIP_FORWARD,
    FFMPEG_DIR,
    WORKERS,
    //
    //outputs
    OUTPUT_PATH,
    SAVE_TRACKS,
    PX_SIZE,
    //
    //verbosity
    VERBOSITY_QUIET,
    VERBOSITY_VERBOSE,
    //argument replacement
    ARGS_FILE,
];

const DEFAULT_GRID_ROWS: u32 = 4;
const DEFAULT_GRID_COLS: u32 = 6;

fn build_app() -> clap::Command {
    let get_ordering = |arg_name: &str| -> usize {
        match DISPLAY_ORDERING.iter().position(|x| *x == arg_name) {
            Some(idx) => idx,
            None => {
                panic!("argument not assigned a display order: {arg_name:?}");
            }
        }
    };

    //args are not added through method chaining because rustfmt struggles with very long expressions.
    let mut clap_app = clap::Command::new("zftrack")
        .version(clap::crate_version!())
        .about("Track zebrafish in the wells of plate videos");

    clap_app = clap_app.arg(
        clap::Arg::new(VIDEO_PATHS)
            .long("videos")
            .required_unless_present(ARGS_FILE)
            .num_args(1..)
            .value_parser(value_parser!(PathBuf))
            .action(Append)
            .help("Video files to track. Directories are searched recursively for videos.")
            .display_order(get_ordering(VIDEO_PATHS)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(MODE)
            .long("mode")
            .value_parser(value_parser!(ModeArg))
            .num_args(1)
            .help("Larva mode expects pre-segmented videos. Adult mode subtracts a running background model. Defaults to larva unless set in the config file.")
            .display_order(get_ordering(MODE)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(CONFIG_FILE)
            .long("config")
            .value_parser(value_parser!(PathBuf))
            .num_args(1)
            .help("JSON file of tracking settings. When absent, config.json in the user config directory is used if it exists. Command line arguments take precedence.")
            .display_order(get_ordering(CONFIG_FILE)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(WELLS_FILE)
            .long("wells")
            .value_parser(value_parser!(PathBuf))
            .num_args(1)
            .conflicts_with_all([GRID, GRID_ROWS, GRID_COLS])
            .help("JSON file listing the wells of each video, each with an optional crop and region")
            .display_order(get_ordering(WELLS_FILE)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(GRID)
            .long("grid")
            .value_parser(parse_rect)
            .num_args(1)
            .help("Rectangle containing the wells, as x,y,width,height. Divided into --grid-rows x --grid-cols equal wells. Without this or --wells each video is tracked as a single well.")
            .display_order(get_ordering(GRID)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(GRID_ROWS)
            .long("grid-rows")
            .value_parser(value_parser!(u32))
            .num_args(1)
            .help("Rows of wells in the grid (default 4)")
            .display_order(get_ordering(GRID_ROWS)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(GRID_COLS)
            .long("grid-cols")
            .value_parser(value_parser!(u32))
            .num_args(1)
            .help("Columns of wells in the grid (default 6)")
            .display_order(get_ordering(GRID_COLS)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(CIRCLE_RADIUS)
            .long("circle-radius")
            .value_parser(value_parser!(f64))
            .num_args(1)
            .conflicts_with(BORDER)
            .help("Split tracks into inner and outer parts of a circle with this radius, centred in each well. Wells with their own region are not affected.")
            .display_order(get_ordering(CIRCLE_RADIUS)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(BORDER)
            .long("border")
            .value_parser(value_parser!(i32))
            .num_args(1)
            .help("Split tracks into parts above and below this height in each well. Wells with their own region are not affected.")
            .display_order(get_ordering(BORDER)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(NORMATIVE_AREA)
            .long("normative-area")
            .value_parser(value_parser!(f64))
            .num_args(1)
            .help("Expected blob area in pixels")
            .display_order(get_ordering(NORMATIVE_AREA)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(AREA_WEIGHT)
            .long("area-weight")
            .value_parser(value_parser!(f64))
            .num_args(1)
            .help("How strongly candidates close to the normative area are preferred")
            .display_order(get_ordering(AREA_WEIGHT)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(DISTANCE_WEIGHT)
            .long("distance-weight")
            .value_parser(value_parser!(f64))
            .num_args(1)
            .help("How strongly candidates close to the previous position are preferred")
            .display_order(get_ordering(DISTANCE_WEIGHT)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(THRESHOLD_LOW)
            .long("threshold-low")
            .value_parser(value_parser!(u8))
            .num_args(1)
            .help("Lowest intensity counted as foreground")
            .display_order(get_ordering(THRESHOLD_LOW)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(THRESHOLD_HIGH)
            .long("threshold-high")
            .value_parser(value_parser!(u16))
            .num_args(1)
            .help("Intensities at or above this are not foreground. At most 256.")
            .display_order(get_ordering(THRESHOLD_HIGH)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(MORPHOLOGY_ITERATIONS)
            .long("morphology-iterations")
            .value_parser(value_parser!(u8))
            .num_args(1)
            .help("Number of times each morphology step is applied to the foreground mask")
            .display_order(get_ordering(MORPHOLOGY_ITERATIONS)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(MAX_FRAME_GAP)
            .long("max-frame-gap")
            .value_parser(value_parser!(u64))
            .num_args(1)
            .help("A track is split where consecutive points are more than this many frames apart")
            .display_order(get_ordering(MAX_FRAME_GAP)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(MIN_TRACK_LENGTH)
            .long("min-track-length")
            .value_parser(value_parser!(usize))
            .num_args(1)
            .help("Tracks with fewer points are discarded")
            .display_order(get_ordering(MIN_TRACK_LENGTH)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(SCALE_WIDTH)
            .long("scale-width")
            .value_parser(value_parser!(u32))
            .num_args(1)
            .help("Scale each well to this width before tracking. Adult mode defaults to 480.")
            .display_order(get_ordering(SCALE_WIDTH)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(MAX_FRAMES)
            .long("max-frames")
            .value_parser(value_parser!(u64))
            .num_args(1)
            .help("Track at most this many frames of each video")
            .display_order(get_ordering(MAX_FRAMES)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(SKIP_FORWARD)
            .long("skip-forward")
            .num_args(1)
            .value_parser(value_parser!(f64))
            .help("Skip forward by a given number of seconds before tracking")
            .display_order(get_ordering(SKIP_FORWARD)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(FFMPEG_DIR)
            .long("ffmpeg-dir")
            .value_parser(value_parser!(PathBuf))
            .num_args(1)
            .help("Directory containing the ffmpeg and ffprobe executables. By default they are looked up on the PATH.")
            .display_order(get_ordering(FFMPEG_DIR)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(WORKERS)
            .long("workers")
            .value_parser(value_parser!(usize))
            .num_args(1)
            .help("Number of wells tracked at once. Defaults to the number of CPUs.")
            .display_order(get_ordering(WORKERS)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(OUTPUT_PATH)
            .long("output")
            .value_parser(value_parser!(PathBuf))
            .num_args(1)
            .help("Write the JSON results to this file instead of stdout")
            .display_order(get_ordering(OUTPUT_PATH)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(SAVE_TRACKS)
            .long("save-tracks")
            .help("Include every tracked point in the output")
            .action(SetTrue)
            .display_order(get_ordering(SAVE_TRACKS)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(PX_SIZE)
            .long("px-size")
            .value_parser(value_parser!(f64))
            .num_args(1)
            .help("Size of one pixel of the tracked frames, used to report distances in real units. Adult mode defaults to 0.06.")
            .display_order(get_ordering(PX_SIZE)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(ARGS_FILE)
            .long("args-file")
            .value_parser(value_parser!(PathBuf))
            .num_args(1)
            .help("Read command line arguments from a file. Lines starting with # are ignored. If this argument is used it must be the only argument")
            .display_order(get_ordering(ARGS_FILE)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(VERBOSITY_QUIET)
            .long("quiet")
            .help("Reduced verbosity")
            .conflicts_with(VERBOSITY_VERBOSE)
            .action(SetTrue)
            .display_order(get_ordering(VERBOSITY_QUIET)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(VERBOSITY_VERBOSE)
            .long("verbose")
            .help("Increased verbosity")
            .conflicts_with(VERBOSITY_QUIET)
            .action(SetTrue)
            .display_order(get_ordering(VERBOSITY_VERBOSE)),
    );

    clap_app
}

fn parse_rect(s: &str) -> Result<(u32, u32, u32, u32), String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<u32>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<Result<Vec<_>, _>>()?;

    match parts.as_slice() {
        [x, y, w, h] => Ok((*x, *y, *w, *h)),
        _ => Err(format!("expected x,y,width,height but got {s:?}")),
    }
}

pub fn parse_args() -> AppCfg {
    //capture the cwd once, to minimize the risk of working with two values if it is changed by the OS at runtime.
    let cwd = std::env::current_dir()
        .unwrap_or_else(|e| print_error_and_quit(eyre::Report::new(e).wrap_err("failed to read the cwd")));

    //Start by parsing the provided arguments from the commandline. If the --args-file
    //argument is provided, then we will ignore the true command line arguments and
    //take the arguments from the file instead.
    let args = get_args_from_cmdline_or_file();

    cfg_from_matches(&args, &cwd)
}

fn cfg_from_matches(args: &clap::ArgMatches, cwd: &Path) -> AppCfg {
    let video_paths = match args.get_many::<PathBuf>(VIDEO_PATHS) {
        Some(paths) => paths.map(|p| absolutify_path(cwd, p)).collect(),
        None => vec![],
    };

    let layout = if let Some(wells_file) = args.get_one::<PathBuf>(WELLS_FILE) {
        WellLayout::File(absolutify_path(cwd, wells_file))
    } else {
        let plate = args.get_one::<(u32, u32, u32, u32)>(GRID).copied();
        let rows = args.get_one::<u32>(GRID_ROWS).copied();
        let cols = args.get_one::<u32>(GRID_COLS).copied();

        if plate.is_none() && rows.is_none() && cols.is_none() {
            WellLayout::Whole
        } else {
            WellLayout::Grid {
                plate,
                rows: rows.unwrap_or(DEFAULT_GRID_ROWS),
                cols: cols.unwrap_or(DEFAULT_GRID_COLS),
            }
        }
    };

    let region = match (args.get_one::<f64>(CIRCLE_RADIUS), args.get_one::<i32>(BORDER)) {
        (Some(radius), _) => DefaultRegion::CentredCircle { radius: *radius },
        (None, Some(y)) => DefaultRegion::Border { y: *y },
        (None, None) => DefaultRegion::None,
    };

    let overrides = TrackingOverrides {
        normative_area: args.get_one::<f64>(NORMATIVE_AREA).copied(),
        area_weight: args.get_one::<f64>(AREA_WEIGHT).copied(),
        distance_weight: args.get_one::<f64>(DISTANCE_WEIGHT).copied(),
        threshold_low: args.get_one::<u8>(THRESHOLD_LOW).copied(),
        threshold_high: args.get_one::<u16>(THRESHOLD_HIGH).copied(),
        morphology_iterations: args.get_one::<u8>(MORPHOLOGY_ITERATIONS).copied(),
        max_frame_gap: args.get_one::<u64>(MAX_FRAME_GAP).copied(),
        min_track_length: args.get_one::<usize>(MIN_TRACK_LENGTH).copied(),
    };

    let tracking_args = TrackingArgs {
        mode: args.get_one::<ModeArg>(MODE).copied().map(TrackingMode::from),
        overrides,
        config_path: args.get_one::<PathBuf>(CONFIG_FILE).map(|p| absolutify_path(cwd, p)),
        ffmpeg_dir: args.get_one::<PathBuf>(FFMPEG_DIR).map(|p| absolutify_path(cwd, p)),
        workers: args.get_one::<usize>(WORKERS).copied(),
        scale_width: args.get_one::<u32>(SCALE_WIDTH).copied(),
        max_frames: args.get_one::<u64>(MAX_FRAMES).copied(),
        skip_forward: args.get_one::<f64>(SKIP_FORWARD).copied(),
    };

    let verbosity = if args.get_flag(VERBOSITY_QUIET) {
        ReportVerbosity::Quiet
    } else if args.get_flag(VERBOSITY_VERBOSE) {
        ReportVerbosity::Verbose
    } else {
        ReportVerbosity::Default
    };

    let output_cfg = OutputCfg {
        output_path: args.get_one::<PathBuf>(OUTPUT_PATH).map(|p| absolutify_path(cwd, p)),
        save_tracks: args.get_flag(SAVE_TRACKS),
        px_size: args.get_one::<f64>(PX_SIZE).copied(),
        verbosity,
    };

    AppCfg {
        dir_cfg: DirCfg { video_paths },
        well_cfg: WellCfg { layout, region },
        tracking_args,
        output_cfg,
    }
}

// Arguments are always first read from the command line, but if --args-file
// is present, then arguments are actually located in a file on disk.
// This fn obtains the args from the correct location.
fn get_args_from_cmdline_or_file() -> clap::ArgMatches {
    let cmdline_args = build_app().get_matches();

    match cmdline_args.get_one::<PathBuf>(ARGS_FILE) {
        None => cmdline_args,
        Some(args_path) => get_argsfile_args(args_path),
    }
}

fn get_argsfile_args(argsfile_path: &Path) -> clap::ArgMatches {
    let argsfile_text = std::fs::read_to_string(argsfile_path).map_err(eyre::Report::msg);

    //the arguments file needs to be split into args in the same way as the shell would do it.
    //call out to an external crate for this.
    let args = argsfile_text.and_then(|text| split_args_file(&text));

    let args = args
        .map_err(|e| {
            e.wrap_err(format!(
                "Failed to parse args file at location {}",
                argsfile_path.to_string_lossy()
            ))
        })
        .unwrap_or_else(|e| print_error_and_quit(e));

    //When parsing args from file, the binary name will not be present,
    // so update the parser that we use to not expect it.
    let matches = build_app().no_binary_name(true).get_matches_from(args);
    matches
}

fn split_args_file(text: &str) -> eyre::Result<Vec<String>> {
    let uncommented = text
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");

    shell_words::split(&uncommented).map_err(eyre::Report::msg)
}

fn absolutify_path(cwd: &Path, path: &Path) -> PathBuf {
    //get the absolute path if it is not absolute, by prepending the cwd.
    let path = if path.is_relative() {
        cwd.join(path)
    } else {
        path.to_path_buf()
    };

    //now try canonicalizing the path. If that fails then carry on with the joined path.
    let p = path.canonicalize().unwrap_or(path);

    p
}
