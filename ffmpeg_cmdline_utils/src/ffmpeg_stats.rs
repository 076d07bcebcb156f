use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::*;

#[derive(Debug, Deserialize, Serialize, Clone, Error)]
pub enum VideoInfoError {
    #[error("Error parsing stats: {0}")]
    JsonError(String),
    #[error("Error parsing stats: {0}")]
    ParseIntError(String),
    #[error("Error parsing stats: {0}")]
    ParseFloatError(String),
    #[error("Unexpected video rotation: {0}")]
    UnexpectedRotation(String),
}

impl From<serde_json::Error> for VideoInfoError {
    fn from(e: serde_json::Error) -> Self {
        //limit maximum number of characters
        let error_string = format!("{e}").chars().take(500).collect::<String>();
        VideoInfoError::JsonError(error_string)
    }
}

impl From<std::num::ParseIntError> for VideoInfoError {
    fn from(e: std::num::ParseIntError) -> Self {
        VideoInfoError::ParseIntError(format!("{e}"))
    }
}

impl From<std::num::ParseFloatError> for VideoInfoError {
    fn from(e: std::num::ParseFloatError) -> Self {
        VideoInfoError::ParseFloatError(format!("{e}"))
    }
}

// There is a slighty gotcha in ffmpeg where if the video metadata declares a rotation,
// raw (x, y) resolution in that metadata refers to the "unrotated" resolution. we must
// therefore swap the x and y values if the rotation is 90 or 270
#[derive(PartialEq, Eq, Clone, Debug, Copy, Default)]
enum FfmpegVideoRotation {
    #[default]
    Rot0,
    Rot90,
    Rot180,
    Rot270,
}
use FfmpegVideoRotation::*;

/// Some of the video metadata that can be obtained by using ffprobe.
#[derive(PartialEq, Clone, Debug, Serialize, Deserialize, Default)]
pub struct VideoInfo {
    duration: std::time::Duration,
    file_size: u64,
    resolution: (u32, u32),
    frame_count: Option<u64>,
    fps: Option<f64>,
}

impl VideoInfo {
    /// Use ffprobe to get the duration and resolution of a video. If the video contains multiple streams then only information
    /// about the first stream will be returned.
    ///
    /// # errors
    /// * The file cannot be read or is not recognized as a video by ffprobe
    /// * The output from ffprobe could not be parsed as JSON
    /// * The output from ffprobe did not contain all expected fields.
    pub fn new<P>(src_path: P, paths: &FfmpegPaths) -> Result<Self, FfmpegError>
    where
        P: AsRef<Path>,
    {
        let stats_string = get_video_stats(&src_path, paths)?;
        let ret = Self::from_ffprobe_json(&stats_string)?;
        Ok(ret)
    }

    /// Parse the output of `ffprobe -show_format -show_streams -print_format json`.
    pub fn from_ffprobe_json(stats_string: &str) -> Result<Self, VideoInfoError> {
        let stats_parsed: Value = serde_json::from_str(stats_string)?;

        let duration = if let Value::String(d) = &stats_parsed["format"]["duration"] {
            std::time::Duration::from_secs_f64(d.parse::<f64>()?)
        } else {
            std::time::Duration::from_secs_f64(0.0)
        };

        let file_size = if let Value::String(s) = &stats_parsed["format"]["size"] {
            s.parse::<u64>()?
        } else {
            0
        };

        let first_video = Self::first_video(&stats_parsed);

        // If the video metadata declares that a video is rotated, then FFMPEG will conveniently autorotate
        // each frame for us, however we will have to remember to swap around x and y axis if the rotation is
        // 90 or 270
        let rotation = {
            //extract the rotation from the JSON
            let rotation = first_video.and_then(|video_stream| {
                video_stream
                    .get("side_data_list")
                    .and_then(|y| y.get(0).and_then(|x| x.get("rotation").cloned()))
            });

            //if the rotation is found, it may either be a JSON String or JSON number, so unify
            //them here.
            let rotation = match rotation {
                None => None,
                Some(Value::Number(val)) => Some(
                    val.as_i64()
                        .ok_or_else(|| VideoInfoError::UnexpectedRotation(val.to_string()))?,
                ),
                Some(Value::String(val)) => Some(val.parse::<i64>()?),
                Some(other) => return Err(VideoInfoError::UnexpectedRotation(other.to_string())),
            };

            //now make sure that the value is one of the four cardinal directions and return it
            //(or if no rotation is specified, return 0/360)
            match rotation {
                None | Some(0) => Rot0,
                Some(90) | Some(-270) => Rot90,
                Some(180) | Some(-180) => Rot180,
                Some(-90) | Some(270) => Rot270,
                Some(other) => return Err(VideoInfoError::UnexpectedRotation(other.to_string())),
            }
        };

        let resolution = {
            let first_width = first_video.and_then(|v| Self::stream_u32(v, "width")).unwrap_or(0);
            let first_height = first_video.and_then(|v| Self::stream_u32(v, "height")).unwrap_or(0);

            if matches!(rotation, Rot0 | Rot180) {
                (first_width, first_height)
            } else {
                (first_height, first_width)
            }
        };

        //containers that do not store a frame count report it as "N/A" or leave it out.
        let frame_count = first_video
            .and_then(|v| v.get("nb_frames"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<u64>().ok());

        let fps = first_video
            .and_then(|v| v.get("avg_frame_rate"))
            .and_then(Value::as_str)
            .and_then(parse_frame_rate);

        Ok(VideoInfo {
            duration,
            file_size,
            resolution,
            frame_count,
            fps,
        })
    }

    /// The duration of the video in seconds
    pub fn duration(&self) -> std::time::Duration {
        self.duration
    }

    /// The size of the video in bytes
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// The resolution of the video in pixels.
    /// Note the returned value is correct for the orientation that the video is intended
    /// to be viewed. (Ffprobe returns a surprising value by default if the video is stored rotated)
    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    /// Average frame rate of the first video stream, if the container declares one.
    pub fn fps(&self) -> Option<f64> {
        self.fps
    }

    /// Number of frames in the first video stream. Uses the frame count stored in the container
    /// when present, and otherwise estimates it from the duration and frame rate.
    pub fn estimated_frame_count(&self) -> Option<u64> {
        self.frame_count.or_else(|| {
            let fps = self.fps?;
            let secs = self.duration.as_secs_f64();
            (secs > 0.0).then(|| (secs * fps).round() as u64)
        })
    }

    fn first_video(stats_parsed: &Value) -> Option<&Value> {
        Self::streams_of_type(stats_parsed, "video").and_then(|mut videos| videos.drain(..).next())
    }

    fn streams_of_type<'a>(stats_parsed: &'a Value, stream_type: &str) -> Option<Vec<&'a Value>> {
        if let Value::Array(streams) = &stats_parsed["streams"] {
            let ret = streams
                .iter()
                .filter(|s| match &s["codec_type"] {
                    Value::String(codec_type) => codec_type == stream_type,
                    _ => false,
                })
                .collect();

            Some(ret)
        } else {
            None
        }
    }

    fn stream_u32(stream: &Value, field_name: &str) -> Option<u32> {
        if let Value::Number(v) = &stream[field_name] {
            u32::try_from(v.as_u64()?).ok()
        } else {
            None
        }
    }
}

// ffprobe reports rates as a fraction, e.g "30000/1001". "0/0" means unknown.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/').unwrap_or((rate, "1"));
    let num = num.trim().parse::<f64>().ok()?;
    let den = den.trim().parse::<f64>().ok()?;

    (num > 0.0 && den > 0.0).then(|| num / den)
}
