use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::definitions::PROGRESS_INTERVAL_FRAMES;
use crate::tracking::region::{Region, RegionSplit};
use crate::tracking::segmenter::Track;
use crate::tracking::tracker::{Tracker, TrackingRun};
use crate::video::FrameSource;
use crate::{Error, TrackResult, TrackingCfg};

/// One well of one video, to be tracked independently of all others.
#[derive(Debug, Clone)]
pub struct WellTask<S> {
    pub well: String,
    pub source: S,
    pub region: Option<Region>,
}

/// The tracks found in one well, split by region if the well has one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellResult {
    pub well: String,
    pub frames_processed: u64,
    pub skipped_frames: u64,
    pub tracks: Vec<Track>,
    pub region: Option<Region>,
    pub split: Option<RegionSplit>,
}

/// Feed every frame of the source through a fresh [`Tracker`].
///
/// # Errors
/// [`Error::ResourceUnavailable`] if the source cannot be opened, fails partway through, or
/// produces no frames.
pub fn track_source<S: FrameSource + ?Sized>(source: &S, cfg: &TrackingCfg) -> TrackResult<TrackingRun> {
    let name = source.name();
    let frames = source.open()?;
    let total = frames.total();

    let mut tracker = Tracker::new(cfg);
    for frame in frames {
        tracker.process_frame(&frame?);

        let count = tracker.frame_count();
        if count % PROGRESS_INTERVAL_FRAMES == 0 {
            match total {
                Some(total) => debug!("{name}: frame {count}/{total}"),
                None => debug!("{name}: frame {count}"),
            }
        }
    }

    let run = tracker.finish();
    if run.frames_processed == 0 {
        return Err(Error::ResourceUnavailable(format!("{name}: no frames decoded")));
    }

    info!(
        "{name}: {} points from {} frames ({} skipped)",
        run.points.len(),
        run.frames_processed,
        run.skipped_frames
    );

    Ok(run)
}

/// Track one well, segment the result into tracks and split the tracks by region.
pub fn track_well<S: FrameSource>(task: &WellTask<S>, cfg: &TrackingCfg) -> TrackResult<WellResult> {
    let run = track_source(&task.source, cfg)?;
    let tracks = cfg.segmenter.segment(&run.points);
    let split = task.region.map(|region| region.split_tracks(&tracks));

    debug!("{}: {} tracks", task.well, tracks.len());

    Ok(WellResult {
        well: task.well.clone(),
        frames_processed: run.frames_processed,
        skipped_frames: run.skipped_frames,
        tracks,
        region: task.region,
        split,
    })
}

/// Track many wells on a fixed pool of worker threads. Returns once every well is done,
/// with one result per task in task order. A well that fails does not stop the others.
///
/// # Errors
/// [`Error::InvalidConfig`] if the configuration is invalid or `workers` is zero. In that
/// case no well is tracked.
pub fn track_wells<S>(
    tasks: Vec<WellTask<S>>,
    cfg: &TrackingCfg,
    workers: usize,
) -> TrackResult<Vec<TrackResult<WellResult>>>
where
    S: FrameSource,
{
    cfg.validate()?;
    if workers == 0 {
        return Err(Error::InvalidConfig("at least one worker is required".to_string()));
    }

    let num_tasks = tasks.len();
    let num_workers = workers.min(num_tasks.max(1));
    debug!("tracking {num_tasks} wells on {num_workers} workers");

    let (task_tx, task_rx) = crossbeam_channel::bounded::<(usize, WellTask<S>)>(num_workers);
    let (rsp_tx, rsp_rx) = crossbeam_channel::unbounded();

    let mut results = std::thread::scope(|s| {
        for _ in 0..num_workers {
            let task_rx = task_rx.clone();
            let rsp_tx = rsp_tx.clone();
            s.spawn(move || {
                for (idx, task) in task_rx.iter() {
                    let result = track_well(&task, cfg);
                    if let Err(e) = &result {
                        warn!("{}: {e}", task.well);
                    }
                    if rsp_tx.send((idx, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(task_rx);
        drop(rsp_tx);

        for task in tasks.into_iter().enumerate() {
            if task_tx.send(task).is_err() {
                break;
            }
        }
        drop(task_tx);

        rsp_rx.iter().collect::<Vec<_>>()
    });

    results.sort_by_key(|(idx, _)| *idx);
    Ok(results.into_iter().map(|(_, result)| result).collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::video::{FrameSource, Frames, InMemoryFrames};
    use image::{GrayImage, Luma};
    use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};

    struct Unavailable;

    impl FrameSource for Unavailable {
        fn name(&self) -> String {
            "unavailable".to_string()
        }

        fn open(&self) -> TrackResult<Frames> {
            Err(Error::ResourceUnavailable("unavailable".to_string()))
        }
    }

    //Decodes some frames, then fails.
    struct Truncated(Vec<GrayImage>);

    impl FrameSource for Truncated {
        fn name(&self) -> String {
            "truncated".to_string()
        }

        fn open(&self) -> TrackResult<Frames> {
            let frames = self.0.clone().into_iter().map(Ok).chain(std::iter::once(Err(
                Error::ResourceUnavailable("truncated: ffmpeg exited with exit status: 1".to_string()),
            )));
            Ok(Frames::fallible(frames, None))
        }
    }

    fn moving_blob(num_frames: u32) -> Vec<GrayImage> {
        (0..num_frames)
            .map(|i| {
                let mut img = GrayImage::new(80, 40);
                let x = 5 + i as i32 * 2;
                draw_filled_rect_mut(&mut img, Rect::at(x, 15).of_size(9, 9), Luma([255]));
                img
            })
            .collect()
    }

    #[test]
    fn test_track_source() {
        let src = InMemoryFrames::new("blob", moving_blob(20));
        let run = track_source(&src, &TrackingCfg::larva()).unwrap();

        assert_eq!(run.frames_processed, 20);
        assert_eq!(run.skipped_frames, 0);
        assert_eq!(run.points.len(), 20);
        assert_eq!(run.points[&19].coords(), (5 + 38 + 4, 19));
    }

    #[test]
    fn test_no_frames_is_unavailable() {
        let src = InMemoryFrames::new("empty", vec![]);
        let err = track_source(&src, &TrackingCfg::larva()).unwrap_err();
        assert!(matches!(err, Error::ResourceUnavailable(_)));
    }

    #[test]
    fn test_decode_failure_is_unavailable() {
        let err = track_source(&Truncated(moving_blob(3)), &TrackingCfg::larva()).unwrap_err();
        assert!(matches!(err, Error::ResourceUnavailable(_)));

        let tasks = vec![
            WellTask {
                well: "truncated".to_string(),
                source: Box::new(Truncated(moving_blob(3))) as Box<dyn FrameSource>,
                region: None,
            },
            WellTask {
                well: "good".to_string(),
                source: Box::new(InMemoryFrames::new("good", moving_blob(10))),
                region: None,
            },
        ];

        let results = track_wells(tasks, &TrackingCfg::larva(), 2).unwrap();
        assert!(matches!(results[0], Err(Error::ResourceUnavailable(_))));
        assert_eq!(results[1].as_ref().unwrap().frames_processed, 10);
    }

    #[test]
    fn test_track_wells_in_task_order() {
        let region = Region::Border { y: 30 };
        let tasks = (0..7)
            .map(|i| WellTask {
                well: format!("A{i}"),
                source: InMemoryFrames::new(format!("vid{i}"), moving_blob(12 + i)),
                region: Some(region),
            })
            .collect::<Vec<_>>();

        let results = track_wells(tasks, &TrackingCfg::larva(), 3).unwrap();
        assert_eq!(results.len(), 7);

        for (i, result) in results.into_iter().enumerate() {
            let result = result.unwrap();
            assert_eq!(result.well, format!("A{i}"));
            assert_eq!(result.frames_processed, 12 + i as u64);
            assert_eq!(result.tracks.len(), 1);

            //the blob never crosses the border
            let split = result.split.unwrap();
            assert_eq!(split.inside.len(), 1);
            assert!(split.outside.is_empty());
        }
    }

    #[test]
    fn test_failed_well_does_not_stop_others() {
        let tasks = vec![
            WellTask {
                well: "bad".to_string(),
                source: Box::new(Unavailable) as Box<dyn FrameSource>,
                region: None,
            },
            WellTask {
                well: "good".to_string(),
                source: Box::new(InMemoryFrames::new("good", moving_blob(10))),
                region: None,
            },
        ];

        let results = track_wells(tasks, &TrackingCfg::larva(), 2).unwrap();
        assert!(matches!(results[0], Err(Error::ResourceUnavailable(_))));
        assert_eq!(results[1].as_ref().unwrap().tracks.len(), 1);
    }

    #[test]
    fn test_invalid_worker_count() {
        let tasks: Vec<WellTask<InMemoryFrames>> = vec![];
        assert!(matches!(
            track_wells(tasks, &TrackingCfg::larva(), 0),
            Err(Error::InvalidConfig(_))
        ));
    }
}
