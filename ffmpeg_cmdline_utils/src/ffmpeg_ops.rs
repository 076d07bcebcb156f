use std::{
    ffi::{OsStr, OsString},
    io::prelude::*,
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    time::Duration,
};

#[cfg(target_family = "windows")]
use std::os::windows::process::CommandExt;

use image::GrayImage;
use serde::{Deserialize, Serialize};
use wait_timeout::ChildExt;
use FfmpegCommandName::*;
use FfmpegError::*;

use crate::*;

const FFPROBE_TIMEOUT_SECS: u64 = 60;
const FFMPEG_EXIT_TIMEOUT_SECS: u64 = 10;

/// Where to find the Ffmpeg and Ffprobe executables. By default they are looked up on the
/// command line search path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for FfmpegPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl FfmpegPaths {
    /// Both executables, located in the same directory.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let suffix = std::env::consts::EXE_SUFFIX;
        Self {
            ffmpeg: dir.as_ref().join(format!("ffmpeg{suffix}")),
            ffprobe: dir.as_ref().join(format!("ffprobe{suffix}")),
        }
    }

    fn get(&self, name: FfmpegCommandName) -> &OsStr {
        match name {
            Ffprobe => self.ffprobe.as_os_str(),
            Ffmpeg => self.ffmpeg.as_os_str(),
        }
    }
}

/// Grayscale frames decoded by an Ffmpeg child process.
#[derive(Debug)]
pub struct FfmpegFrameIter {
    x: u32,
    y: u32,
    child: std::process::Child,
    num_frames: u64,
    frames_read: u64,
    finished: bool,
    error: Option<FfmpegError>,
}

impl FfmpegFrameIter {
    /// The dimensions of every frame this iterator yields.
    pub fn resolution(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Why decoding stopped before the requested number of frames, if it was not simply the
    /// end of the video. Only set once the iterator has returned `None`.
    pub fn take_error(&mut self) -> Option<FfmpegError> {
        self.error.take()
    }

    fn finish(&mut self) {
        self.finished = true;
        let _kill_error = self.child.kill();
        let _wait_error = self.child.wait();
    }

    //stdout closed early. Either the video ended or ffmpeg failed, and only the exit status
    //tells which.
    fn finish_at_end_of_stream(&mut self, read_error: std::io::Error) {
        self.finished = true;

        self.error = match self.child.wait_timeout(Duration::from_secs(FFMPEG_EXIT_TIMEOUT_SECS)) {
            Ok(Some(status)) if status.success() => match read_error.kind() {
                std::io::ErrorKind::UnexpectedEof => None,
                _ => Some(Io(read_error.to_string())),
            },
            Ok(Some(status)) => Some(FfmpegInternal(format!(
                "ffmpeg exited with {status} after {} frames",
                self.frames_read
            ))),
            Ok(None) => {
                self.finish();
                Some(FfmpegInternal(format!(
                    "ffmpeg stopped sending frames after {} frames but did not exit",
                    self.frames_read
                )))
            }
            Err(e) => Some(Io(e.to_string())),
        };
    }
}

impl Iterator for FfmpegFrameIter {
    type Item = GrayImage;

    fn next(&mut self) -> Option<Self::Item> {
        //Check exit conditions
        if self.finished || self.frames_read >= self.num_frames {
            self.finish();
            return None;
        }

        let raw_buf_size = usize::try_from(self.x)
            .ok()?
            .checked_mul(usize::try_from(self.y).ok()?)?;

        // Attempt to prevent OOM on very implausible sizes
        let five_gigabytes = 5368709120usize;
        if raw_buf_size > five_gigabytes {
            self.finish();
            return None;
        }
        let mut raw_buf = vec![0u8; raw_buf_size];

        let Some(stdout) = self.child.stdout.as_mut() else {
            self.finish();
            return None;
        };

        if let Err(e) = stdout.read_exact(&mut raw_buf) {
            self.finish_at_end_of_stream(e);
            return None;
        }

        self.frames_read += 1;

        GrayImage::from_raw(self.x, self.y, raw_buf)
    }
}

// to prevent accumulation of zombie processes, reap the return code of
// ffmpeg subcommands (if nothing else has done so already) here
impl Drop for FfmpegFrameIter {
    fn drop(&mut self) {
        let _kill_error = self.child.kill();
        let _wait_error = self.child.wait();
    }
}

#[derive(Clone, Debug)]
pub struct FfmpegFrameReaderBuilder {
    src_path: PathBuf,
    crop: Option<(u32, u32, u32, u32)>,
    scale_width: Option<u32>,
    num_frames: Option<u64>,
    skip_forward: Option<f64>,
}

impl FfmpegFrameReaderBuilder {
    pub fn new(src_path: impl AsRef<Path>) -> Self {
        Self {
            src_path: src_path.as_ref().to_path_buf(),
            crop: None,
            scale_width: None,
            num_frames: None,
            skip_forward: None,
        }
    }

    pub fn src_path(&self) -> &Path {
        &self.src_path
    }

    /// Only decode the rectangle with top-left corner (x, y) and the given dimensions.
    pub fn crop(&mut self, x: u32, y: u32, width: u32, height: u32) -> &mut Self {
        self.crop = Some((x, y, width, height));
        self
    }

    /// Resize (after cropping) to the given width, preserving the aspect ratio.
    pub fn scale_width(&mut self, width: u32) -> &mut Self {
        self.scale_width = Some(width);
        self
    }

    pub fn num_frames(&mut self, num_frames: u64) -> &mut Self {
        self.num_frames = Some(num_frames);
        self
    }

    /// Seek this many seconds into the video before decoding.
    pub fn skip_forward(&mut self, secs: f64) -> &mut Self {
        self.skip_forward = Some(secs);
        self
    }

    /// The dimensions of the frames that will be produced for a video with the given info,
    /// after cropping and scaling.
    pub fn output_resolution(&self, info: &VideoInfo) -> Result<(u32, u32), FfmpegError> {
        //bail out if we get invalid dimensions.
        let (vid_width, vid_height) = info.resolution();
        if vid_width == 0 || vid_height == 0 {
            return Err(InvalidResolution);
        }

        let (width, height) = match self.crop {
            None => (vid_width, vid_height),
            Some((x, y, width, height)) => {
                let fits_x = x.checked_add(width).is_some_and(|right| right <= vid_width);
                let fits_y = y.checked_add(height).is_some_and(|bottom| bottom <= vid_height);
                if width == 0 || height == 0 || !fits_x || !fits_y {
                    return Err(CropOutOfBounds {
                        x,
                        y,
                        width,
                        height,
                        vid_width,
                        vid_height,
                    });
                }
                (width, height)
            }
        };

        let ret = match self.scale_width {
            None => (width, height),
            Some(0) => return Err(InvalidResolution),
            Some(target) if target == width => (width, height),
            Some(target) => {
                let scaled = (u64::from(height) * u64::from(target) + u64::from(width) / 2)
                    / u64::from(width);
                let scaled = u32::try_from(scaled).map_err(|_| InvalidResolution)?;
                (target, scaled.max(1))
            }
        };

        Ok(ret)
    }

    fn args(&self, info: &VideoInfo) -> Result<Vec<OsString>, FfmpegError> {
        let (out_width, out_height) = self.output_resolution(info)?;

        let mut filters = vec![];
        if let Some((x, y, width, height)) = self.crop {
            filters.push(format!("crop={width}:{height}:{x}:{y}"));
        }
        if let Some(target) = self.scale_width {
            let cropped_width = self.crop.map_or(info.resolution().0, |(_, _, w, _)| w);
            if target != cropped_width {
                //both dimensions are given so the frame size on the pipe is known in advance.
                filters.push(format!("scale={out_width}:{out_height}"));
            }
        }

        #[rustfmt::skip]
        let mut args: Vec<OsString> = vec![
            "-hide_banner".into(),
            "-loglevel".into(), "warning".into(),
            "-nostats".into(),
            "-threads".into(), "1".into(),
        ];

        if let Some(secs) = self.skip_forward {
            args.extend([OsString::from("-ss"), OsString::from(secs.to_string())]);
        }

        args.extend([OsString::from("-i"), self.src_path.clone().into_os_string()]);

        if !filters.is_empty() {
            args.extend([OsString::from("-vf"), OsString::from(filters.join(","))]);
        }

        if let Some(num_frames) = self.num_frames {
            args.extend([OsString::from("-vframes"), OsString::from(num_frames.to_string())]);
        }

        #[rustfmt::skip]
        args.extend([
            "-pix_fmt", "gray",
            "-c:v",     "rawvideo",
            "-f",       "image2pipe",
            "-",
        ].map(OsString::from));

        Ok(args)
    }

    pub fn spawn_gray(&self, paths: &FfmpegPaths) -> Result<(FfmpegFrameIter, VideoInfo), FfmpegError> {
        //we also need to find out the resolution of the video so that stdout can be converted into frames.
        let stats = VideoInfo::new(&self.src_path, paths)?;
        let (x, y) = self.output_resolution(&stats)?;
        let args = self.args(&stats)?;

        let mut child = spawn_ffmpeg_command(paths, Ffmpeg, &args, true)?;

        //Prevent possible lockup if stderr gets full by dropping the
        //handle from our side
        std::mem::drop(child.stderr.take());

        let frame_iterator = FfmpegFrameIter {
            x,
            y,
            child,
            num_frames: self.num_frames.unwrap_or(u64::MAX),
            frames_read: 0,
            finished: false,
            error: None,
        };

        Ok((frame_iterator, stats))
    }
}

pub fn get_video_stats<P: AsRef<Path>>(src_path: P, paths: &FfmpegPaths) -> Result<String, FfmpegError> {
    let args = &[
        OsStr::new("-v"),
        OsStr::new("quiet"),
        OsStr::new("-show_format"),
        OsStr::new("-show_streams"),
        OsStr::new("-print_format"),
        OsStr::new("json"),
        OsStr::new(src_path.as_ref()),
    ];

    let stdout = run_ffmpeg_command(paths, Ffprobe, args, true)?.stdout;

    String::from_utf8(stdout).map_err(|_| Utf8Conversion)
}

pub fn is_video_file<P: AsRef<Path>>(src_path: P, paths: &FfmpegPaths) -> Result<bool, FfmpegError> {
    //"ffprobe -v error -select_streams v -show_entries stream=codec_type,codec_name,duration -of compact=p=0:nk=1 {}"
    #[rustfmt::skip]
    let args = &[
        OsStr::new("-v"),              OsStr::new("error"),
        OsStr::new("-select_streams"), OsStr::new("v"),
        OsStr::new("-show_entries"),   OsStr::new("stream=codec_type,codec_name,duration"),
        OsStr::new("-of"),             OsStr::new("compact=p=0:nk=1"),
        OsStr::new(src_path.as_ref())
    ];

    let streams_string = run_ffmpeg_command(paths, Ffprobe, args, true).and_then(|output| {
        String::from_utf8(output.stdout)
            .map_err(|_| Utf8Conversion)
            .map(|s| s.trim().to_string())
    })?;

    let mut fields_iter = streams_string.split('|');

    let _codec_name = fields_iter.next().unwrap_or("");
    let codec_type = fields_iter.next().unwrap_or("");
    let duration = fields_iter
        .next()
        .unwrap_or("")
        .trim()
        .parse::<f64>()
        .unwrap_or(999.0);

    if codec_type != "video" {
        return Ok(false);
    }

    if duration < 1.0 {
        return Ok(false);
    }

    Ok(true)
}

pub fn ffmpeg_and_ffprobe_are_callable(paths: &FfmpegPaths) -> bool {
    //check ffprobe is callable.
    if run_ffmpeg_command(paths, Ffprobe, &[OsStr::new("-version")], true).is_err() {
        return false;
    }

    //now ffmpeg.
    if run_ffmpeg_command(paths, Ffmpeg, &[OsStr::new("-version")], true).is_err() {
        return false;
    }

    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FfmpegCommandName {
    Ffprobe,
    Ffmpeg,
}

fn spawn_ffmpeg_command<S: AsRef<OsStr>>(
    paths: &FfmpegPaths,
    name: FfmpegCommandName,
    args: &[S],
    stderr_null: bool,
) -> Result<Child, FfmpegError> {
    let stderr_cfg = if stderr_null {
        Stdio::null()
    } else {
        Stdio::piped()
    };

    let mut command = Command::new(paths.get(name));
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(stderr_cfg);

    //do not spawn a command window on windows when when in a gui application
    #[cfg(target_family = "windows")]
    command.creation_flags(winapi::um::winbase::CREATE_NO_WINDOW);

    command.spawn().map_err(|e| match e.kind() {
        //shell failed to execute the command. Separate out FileNotFound from all other errors
        //as by far the most likely cause is ffmpeg is not installed.
        std::io::ErrorKind::NotFound => FfmpegNotFound,
        _ => Io(format!("{:?}", e.kind())),
    })
}

struct FfmpegOutput {
    _stderr: Vec<u8>,
    stdout: Vec<u8>,
}

type FfmpegCmdResult = Result<FfmpegOutput, FfmpegError>;

fn run_ffmpeg_command<S: AsRef<OsStr>>(
    paths: &FfmpegPaths,
    name: FfmpegCommandName,
    args: &[S],
    stderr_null: bool,
) -> FfmpegCmdResult {
    fn truncate_ffmpeg_err_msg(stderr: Vec<u8>) -> FfmpegError {
        match std::str::from_utf8(&stderr) {
            Ok(error_text) => FfmpegInternal(error_text.chars().take(500).collect::<String>()),
            Err(_) => Utf8Conversion,
        }
    }

    fn drain<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<Vec<u8>> {
        std::thread::spawn(move || {
            let mut acc = vec![];
            let _read_error = pipe.read_to_end(&mut acc);
            acc
        })
    }

    let mut child = spawn_ffmpeg_command(paths, name, args, stderr_null)?;

    //Both pipes are drained on their own threads so that a chatty child cannot fill
    //a pipe and stall before it exits.
    let stdout_thread = child.stdout.take().map(drain);
    let stderr_thread = child.stderr.take().map(drain);

    let exit_status = match child.wait_timeout(Duration::from_secs(FFPROBE_TIMEOUT_SECS)) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _kill_error = child.kill();
            let _wait_error = child.wait();
            return Err(Io(format!("{:?}", std::io::ErrorKind::TimedOut)));
        }
        Err(e) => {
            return Err(match e.kind() {
                std::io::ErrorKind::NotFound => FfmpegNotFound,
                _ => Io(format!("{:?}", e.kind())),
            })
        }
    };

    let stdout_acc = stdout_thread
        .and_then(|t| t.join().ok())
        .unwrap_or_default();
    let stderr_acc = stderr_thread
        .and_then(|t| t.join().ok())
        .unwrap_or_default();

    //The shell successfully executed it, but maybe it returned an error code
    if exit_status.success() {
        Ok(FfmpegOutput {
            stdout: stdout_acc,
            _stderr: stderr_acc,
        })
    } else {
        //sometimes ffmpeg creates very long error messages. Limit them to the first 500 characters
        Err(truncate_ffmpeg_err_msg(stderr_acc))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn info(width: u32, height: u32) -> VideoInfo {
        let json = format!(
            r#"{{"streams": [{{"codec_type": "video", "width": {width}, "height": {height}}}], "format": {{}}}}"#
        );
        VideoInfo::from_ffprobe_json(&json).unwrap()
    }

    fn args_string(builder: &FfmpegFrameReaderBuilder, info: &VideoInfo) -> String {
        builder
            .args(info)
            .unwrap()
            .iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_plain_args() {
        let builder = FfmpegFrameReaderBuilder::new("/vids/plate.avi");
        let act = args_string(&builder, &info(640, 480));

        assert_eq!(
            act,
            "-hide_banner -loglevel warning -nostats -threads 1 -i /vids/plate.avi -pix_fmt gray -c:v rawvideo -f image2pipe -"
        );
        assert_eq!(builder.output_resolution(&info(640, 480)).unwrap(), (640, 480));
    }

    #[test]
    fn test_crop_and_scale_args() {
        let mut builder = FfmpegFrameReaderBuilder::new("/vids/plate.avi");
        builder.crop(100, 50, 200, 150).scale_width(100).num_frames(30);

        let act = args_string(&builder, &info(1920, 1080));
        assert!(act.contains("-vf crop=200:150:100:50,scale=100:75 "));
        assert!(act.contains("-vframes 30 "));
        assert_eq!(builder.output_resolution(&info(1920, 1080)).unwrap(), (100, 75));
    }

    #[test]
    fn test_scale_rounds_height() {
        let mut builder = FfmpegFrameReaderBuilder::new("a.avi");
        builder.scale_width(480);

        //1080 * 480 / 1920 = 270 exactly; 1000 * 480 / 1366 = 351.39
        assert_eq!(builder.output_resolution(&info(1920, 1080)).unwrap(), (480, 270));
        assert_eq!(builder.output_resolution(&info(1366, 1000)).unwrap(), (480, 351));
    }

    #[test]
    fn test_scale_to_same_width_is_noop() {
        let mut builder = FfmpegFrameReaderBuilder::new("a.avi");
        builder.scale_width(480);

        let act = args_string(&builder, &info(480, 360));
        assert!(!act.contains("-vf"));
    }

    #[test]
    fn test_skip_forward_precedes_input() {
        let mut builder = FfmpegFrameReaderBuilder::new("a.avi");
        builder.skip_forward(150.0);

        let act = args_string(&builder, &info(480, 360));
        assert!(act.contains("-ss 150 -i a.avi"));
    }

    #[test]
    fn test_crop_out_of_bounds() {
        let mut builder = FfmpegFrameReaderBuilder::new("a.avi");
        builder.crop(600, 0, 100, 100);

        let err = builder.output_resolution(&info(640, 480)).unwrap_err();
        assert!(matches!(err, CropOutOfBounds { .. }));
        assert!(builder.args(&info(640, 480)).is_err());
    }

    #[test]
    fn test_zero_resolution() {
        let builder = FfmpegFrameReaderBuilder::new("a.mp3");
        let err = builder.output_resolution(&VideoInfo::default()).unwrap_err();
        assert!(matches!(err, InvalidResolution));
    }

    #[test]
    fn test_paths_from_dir() {
        let paths = FfmpegPaths::from_dir("/opt/ffmpeg/bin");
        let suffix = std::env::consts::EXE_SUFFIX;
        assert_eq!(paths.ffmpeg, PathBuf::from(format!("/opt/ffmpeg/bin/ffmpeg{suffix}")));
        assert_eq!(paths.ffprobe, PathBuf::from(format!("/opt/ffmpeg/bin/ffprobe{suffix}")));
    }

    #[test]
    fn test_missing_binary() {
        let paths = FfmpegPaths::from_dir("/this/directory/does/not/exist");
        assert!(!ffmpeg_and_ffprobe_are_callable(&paths));
        assert!(matches!(
            get_video_stats("a.avi", &paths),
            Err(FfmpegNotFound)
        ));
    }

    //A shell standing in for ffmpeg: writes 2x2 frames to stdout, then exits with the given code.
    #[cfg(target_family = "unix")]
    fn fake_decoder(script: &str, num_frames: u64) -> FfmpegFrameIter {
        let child = Command::new("sh")
            .args(["-c", script])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();

        FfmpegFrameIter {
            x: 2,
            y: 2,
            child,
            num_frames,
            frames_read: 0,
            finished: false,
            error: None,
        }
    }

    #[test]
    #[cfg(target_family = "unix")]
    fn test_clean_end_of_video() {
        let mut frames = fake_decoder("printf 'abcdefgh'", u64::MAX);

        assert_eq!(frames.by_ref().count(), 2);
        assert!(frames.take_error().is_none());
    }

    #[test]
    #[cfg(target_family = "unix")]
    fn test_decoder_failure_midstream() {
        let mut frames = fake_decoder("printf 'abcdefghijkl'; exit 3", u64::MAX);

        assert_eq!(frames.by_ref().count(), 3);
        assert_eq!(frames.frames_read(), 3);
        assert!(matches!(frames.take_error(), Some(FfmpegInternal(_))));
        assert!(frames.next().is_none());
    }

    #[test]
    #[cfg(target_family = "unix")]
    fn test_frame_limit_is_not_a_failure() {
        let mut frames = fake_decoder("printf 'abcdefghijkl'; exit 3", 2);

        assert_eq!(frames.by_ref().count(), 2);
        assert!(frames.take_error().is_none());
    }
}
