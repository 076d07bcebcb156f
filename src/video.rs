use std::path::{Path, PathBuf};

use ffmpeg_cmdline_utils::{FfmpegFrameIter, FfmpegFrameReaderBuilder, FfmpegPaths, VideoInfo};
use image::GrayImage;
use zftrack_common::Crop;

use crate::{Error, TrackResult};

/// Anything that can produce the frames of one video, once, front to back.
pub trait FrameSource: Send {
    /// Identifies the source in logs and output.
    fn name(&self) -> String;

    fn open(&self) -> TrackResult<Frames>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn open(&self) -> TrackResult<Frames> {
        (**self).open()
    }
}

/// A lazily decoded, forward-only sequence of frames. A decode failure is yielded as an
/// error in place of the frame that could not be read.
pub struct Frames {
    inner: Box<dyn Iterator<Item = TrackResult<GrayImage>> + Send>,
    total: Option<u64>,
}

impl Frames {
    pub fn new(frames: impl Iterator<Item = GrayImage> + Send + 'static, total: Option<u64>) -> Self {
        Self::fallible(frames.map(Ok), total)
    }

    pub fn fallible(
        frames: impl Iterator<Item = TrackResult<GrayImage>> + Send + 'static,
        total: Option<u64>,
    ) -> Self {
        Self {
            inner: Box::new(frames),
            total,
        }
    }

    /// The number of frames the source expects to produce, if known. This is an estimate
    /// for most video containers.
    pub fn total(&self) -> Option<u64> {
        self.total
    }
}

impl Iterator for Frames {
    type Item = TrackResult<GrayImage>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Frames decoded from a video file by Ffmpeg, optionally cropped to one well and scaled.
#[derive(Debug, Clone)]
pub struct FrameReadCfg {
    src_path: PathBuf,
    crop: Option<Crop>,
    scale_width: Option<u32>,
    max_frames: Option<u64>,
    start_offset: Option<f64>,
    ffmpeg_paths: FfmpegPaths,
}

impl FrameReadCfg {
    pub fn from_path(src_path: impl AsRef<Path>) -> Self {
        Self {
            src_path: src_path.as_ref().to_path_buf(),
            crop: None,
            scale_width: None,
            max_frames: None,
            start_offset: None,
            ffmpeg_paths: FfmpegPaths::default(),
        }
    }

    pub fn src_path(&self) -> &Path {
        &self.src_path
    }

    /// Decode only this part of each frame. Cropping happens before scaling.
    pub fn crop(&mut self, crop: Crop) -> &mut Self {
        self.crop = Some(crop);
        self
    }

    pub fn scale_width(&mut self, width: u32) -> &mut Self {
        self.scale_width = Some(width);
        self
    }

    pub fn max_frames(&mut self, max_frames: u64) -> &mut Self {
        self.max_frames = Some(max_frames);
        self
    }

    /// Unit: Seconds
    pub fn start_offset(&mut self, offset: f64) -> &mut Self {
        self.start_offset = Some(offset);
        self
    }

    pub fn ffmpeg_paths(&mut self, paths: FfmpegPaths) -> &mut Self {
        self.ffmpeg_paths = paths;
        self
    }

    /// Dimensions of the frames that will be decoded from a video with the given info, after
    /// cropping and scaling.
    pub fn output_resolution(&self, info: &VideoInfo) -> TrackResult<(u32, u32)> {
        self.builder()
            .output_resolution(info)
            .map_err(|e| Error::ResourceUnavailable(format!("{}: {e}", self.src_path.display())))
    }

    fn builder(&self) -> FfmpegFrameReaderBuilder {
        let mut builder = FfmpegFrameReaderBuilder::new(&self.src_path);

        if let Some(crop) = self.crop.filter(|c| !c.is_uncropped()) {
            let (x, y, width, height) = crop.as_view_args();
            builder.crop(x, y, width, height);
        }
        if let Some(width) = self.scale_width {
            builder.scale_width(width);
        }
        if let Some(max_frames) = self.max_frames {
            builder.num_frames(max_frames);
        }
        if let Some(offset) = self.start_offset {
            builder.skip_forward(offset);
        }

        builder
    }
}

impl FrameSource for FrameReadCfg {
    fn name(&self) -> String {
        self.src_path.to_string_lossy().to_string()
    }

    fn open(&self) -> TrackResult<Frames> {
        let (frames, info) = self
            .builder()
            .spawn_gray(&self.ffmpeg_paths)
            .map_err(|e| Error::ResourceUnavailable(format!("{}: {e}", self.src_path.display())))?;

        let skipped = match (self.start_offset, info.fps()) {
            (Some(offset), Some(fps)) => (offset * fps).round() as u64,
            _ => 0,
        };
        let total = info
            .estimated_frame_count()
            .map(|count| count.saturating_sub(skipped))
            .map(|count| self.max_frames.map_or(count, |max| count.min(max)));

        let decoded = DecodedFrames {
            frames: Some(frames),
            src_path: self.src_path.clone(),
        };

        Ok(Frames::fallible(decoded, total))
    }
}

//Yields the ffmpeg frames, then a single error if ffmpeg failed before the video ended.
struct DecodedFrames {
    frames: Option<FfmpegFrameIter>,
    src_path: PathBuf,
}

impl Iterator for DecodedFrames {
    type Item = TrackResult<GrayImage>;

    fn next(&mut self) -> Option<Self::Item> {
        let frames = self.frames.as_mut()?;
        if let Some(frame) = frames.next() {
            return Some(Ok(frame));
        }

        let error = frames.take_error();
        self.frames = None;

        error.map(|e| Err(Error::ResourceUnavailable(format!("{}: {e}", self.src_path.display()))))
    }
}

/// Frames that have already been decoded.
#[derive(Debug, Clone)]
pub struct InMemoryFrames {
    name: String,
    frames: Vec<GrayImage>,
}

impl InMemoryFrames {
    pub fn new(name: impl Into<String>, frames: Vec<GrayImage>) -> Self {
        Self {
            name: name.into(),
            frames,
        }
    }
}

impl FrameSource for InMemoryFrames {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn open(&self) -> TrackResult<Frames> {
        let total = self.frames.len() as u64;
        Ok(Frames::new(self.frames.clone().into_iter(), Some(total)))
    }
}
