use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;
use zftrack_lib::{Region, RegionStats, Track, TrackResult, WellResult};

use crate::app::*;

/// What the app knows about a well before it is tracked. Kept so that wells which fail
/// can still be reported by name.
#[derive(Debug, Clone)]
pub struct WellMeta {
    pub video: PathBuf,
    pub well: String,
    pub fps: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideReport {
    pub label: &'static str,
    #[serde(flatten)]
    pub stats: RegionStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionReport {
    pub region: Region,
    pub sides: [SideReport; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WellReport {
    pub video: PathBuf,
    pub well: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub frames_processed: u64,
    pub skipped_frames: u64,
    pub track_count: usize,
    pub tracked_points: usize,
    pub path_length: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<RegionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<Track>>,
}

impl WellReport {
    fn failed(meta: &WellMeta, e: &zftrack_lib::Error) -> Self {
        Self {
            video: meta.video.clone(),
            well: meta.well.clone(),
            error: Some(e.to_string()),
            frames_processed: 0,
            skipped_frames: 0,
            track_count: 0,
            tracked_points: 0,
            path_length: 0.0,
            distance: None,
            region: None,
            tracks: None,
        }
    }

    fn tracked(meta: &WellMeta, result: WellResult, save_tracks: bool, px_size: Option<f64>) -> Self {
        let path_length = result.tracks.iter().map(Track::path_length).sum::<f64>();

        let side = |label, stats: RegionStats| SideReport {
            label,
            stats,
            seconds: meta.fps.filter(|fps| *fps > 0.0).map(|fps| stats.seconds(fps)),
            distance: px_size.map(|px| stats.distance(px)),
        };

        let region = match (result.region, &result.split) {
            (Some(region), Some(split)) => {
                let (inside, outside) = region.labels();
                Some(RegionReport {
                    region,
                    sides: [
                        side(inside, split.inside_stats()),
                        side(outside, split.outside_stats()),
                    ],
                })
            }
            _ => None,
        };

        Self {
            video: meta.video.clone(),
            well: meta.well.clone(),
            error: None,
            frames_processed: result.frames_processed,
            skipped_frames: result.skipped_frames,
            track_count: result.tracks.len(),
            tracked_points: result.tracks.iter().map(Track::len).sum(),
            path_length,
            distance: px_size.map(|px| path_length * px),
            region,
            tracks: save_tracks.then_some(result.tracks),
        }
    }
}

/// Pair every result with the well it came from. `metas` and `results` are in the same
/// order.
pub fn build_reports(
    metas: &[WellMeta],
    results: Vec<TrackResult<WellResult>>,
    save_tracks: bool,
    px_size: Option<f64>,
) -> Vec<WellReport> {
    metas
        .iter()
        .zip(results)
        .map(|(meta, result)| match result {
            Ok(result) => WellReport::tracked(meta, result, save_tracks, px_size),
            Err(e) => WellReport::failed(meta, &e),
        })
        .collect()
}

/// Write the reports as a JSON array to the given file, or to stdout.
pub fn write_reports(reports: &[WellReport], output_path: Option<&Path>) -> Result<(), AppError> {
    let writer: Box<dyn Write> = match output_path {
        Some(path) => {
            let f = File::create(path).map_err(|e| AppError::Output(format!("{}: {e}", path.display())))?;
            Box::new(f)
        }
        None => Box::new(std::io::stdout()),
    };

    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, reports).map_err(|e| AppError::Output(e.to_string()))?;
    writeln!(writer).map_err(|e| AppError::Output(e.to_string()))?;
    writer.flush().map_err(|e| AppError::Output(e.to_string()))?;

    Ok(())
}
