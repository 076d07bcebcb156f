use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use log::trace;
use serde::{Deserialize, Serialize};
use zftrack_common::{
    mask::{dilate, erode, threshold_band},
    BackgroundModel, BackgroundModelCfg, ContourMoments, Kernel,
};

use crate::definitions::{DEFAULT_THRESHOLD_HIGH, DEFAULT_THRESHOLD_LOW};
use crate::tracking::point::Coords;
use crate::{Error, TrackResult};

/// Which half of the morphological pair runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MorphologyOrder {
    /// Closing: joins blobs split by a thin gap.
    DilateFirst,
    /// Opening: removes specks smaller than the kernel.
    ErodeFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphologyCfg {
    pub kernel: Kernel,
    pub iterations: u8,
    pub order: MorphologyOrder,
}

impl Default for MorphologyCfg {
    fn default() -> Self {
        Self {
            kernel: Kernel::Square,
            iterations: 2,
            order: MorphologyOrder::DilateFirst,
        }
    }
}

impl MorphologyCfg {
    pub fn apply(&self, mask: &GrayImage) -> GrayImage {
        match self.order {
            MorphologyOrder::DilateFirst => {
                let dilated = dilate(mask, self.kernel, self.iterations);
                erode(&dilated, self.kernel, self.iterations)
            }
            MorphologyOrder::ErodeFirst => {
                let eroded = erode(mask, self.kernel, self.iterations);
                dilate(&eroded, self.kernel, self.iterations)
            }
        }
    }
}

/// Parameters that turn a frame into a binary foreground mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorCfg {
    /// Inclusive lower bound of the foreground band.
    pub threshold_low: u8,
    /// Exclusive upper bound of the foreground band. 256 means no upper bound.
    pub threshold_high: u16,
    pub morphology: MorphologyCfg,
}

impl Default for DetectorCfg {
    fn default() -> Self {
        Self::larva()
    }
}

impl DetectorCfg {
    pub fn larva() -> Self {
        Self {
            threshold_low: DEFAULT_THRESHOLD_LOW,
            threshold_high: DEFAULT_THRESHOLD_HIGH,
            morphology: MorphologyCfg::default(),
        }
    }

    pub fn adult() -> Self {
        Self {
            threshold_low: DEFAULT_THRESHOLD_LOW,
            threshold_high: DEFAULT_THRESHOLD_HIGH,
            morphology: MorphologyCfg {
                kernel: Kernel::Cross,
                iterations: 1,
                order: MorphologyOrder::ErodeFirst,
            },
        }
    }

    pub fn validate(&self) -> TrackResult<()> {
        if u16::from(self.threshold_low) >= self.threshold_high {
            return Err(Error::InvalidConfig(format!(
                "foreground band [{}, {}) is empty",
                self.threshold_low, self.threshold_high
            )));
        }
        if self.threshold_high > 256 {
            return Err(Error::InvalidConfig(format!(
                "foreground band upper bound {} is above 256",
                self.threshold_high
            )));
        }

        Ok(())
    }
}

/// A blob found in a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub centroid: Coords,
    pub area: f64,
}

/// Finds blobs in frames.
///
/// When a background model is configured, each frame is first replaced by its foreground
/// mask, and the model learns from every frame it is given.
#[derive(Debug, Clone)]
pub struct FrameDetector {
    cfg: DetectorCfg,
    background: Option<BackgroundModel>,
    frames_examined: u64,
}

impl FrameDetector {
    pub fn new(cfg: DetectorCfg, background: Option<BackgroundModelCfg>) -> Self {
        Self {
            cfg,
            background: background.map(BackgroundModel::new),
            frames_examined: 0,
        }
    }

    pub fn cfg(&self) -> &DetectorCfg {
        &self.cfg
    }

    /// Number of frames passed to [`Self::detect`] so far.
    pub fn frames_examined(&self) -> u64 {
        self.frames_examined
    }

    /// Binary mask (255 foreground, 0 background) after thresholding and morphology.
    pub fn foreground_mask(&mut self, frame: &GrayImage) -> GrayImage {
        let subtracted;
        let src = match self.background.as_mut() {
            Some(model) => {
                subtracted = model.apply(frame);
                &subtracted
            }
            None => frame,
        };

        let mask = threshold_band(src, self.cfg.threshold_low, self.cfg.threshold_high);
        self.cfg.morphology.apply(&mask)
    }

    /// All blobs in the frame, in the order their outer contours are found.
    pub fn detect(&mut self, frame: &GrayImage) -> Vec<Candidate> {
        self.frames_examined += 1;
        let mask = self.foreground_mask(frame);
        candidates_from_mask(&mask)
    }
}

/// One candidate per outermost contour of the mask. Contours that enclose no area (single
/// pixels, one pixel wide lines) are skipped.
pub fn candidates_from_mask(mask: &GrayImage) -> Vec<Candidate> {
    //find_contours misclassifies blobs touching the left edge, so every blob is kept off the
    //edges by a one pixel background margin.
    let mut padded = GrayImage::new(mask.width() + 2, mask.height() + 2);
    image::imageops::replace(&mut padded, mask, 1, 1);

    find_contours::<i32>(&padded)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .filter_map(|contour| {
            let moments = ContourMoments::from_points(&contour.points);
            match moments.centroid() {
                Some((x, y)) => Some(Candidate {
                    centroid: (x - 1, y - 1),
                    area: moments.area(),
                }),
                None => {
                    trace!("skipping degenerate contour of {} points", contour.points.len());
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use image::Luma;
    use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};

    fn frame_with_rects(rects: &[(i32, i32, u32, u32)]) -> GrayImage {
        let mut img = GrayImage::new(40, 30);
        for &(x, y, w, h) in rects {
            draw_filled_rect_mut(&mut img, Rect::at(x, y).of_size(w, h), Luma([255]));
        }
        img
    }

    #[test]
    fn test_single_blob() {
        let frame = frame_with_rects(&[(10, 10, 5, 5)]);
        let cands = candidates_from_mask(&frame);

        assert_eq!(cands.len(), 1);
        //the contour runs through pixel centres, so a 5x5 square encloses 4x4
        assert_eq!(cands[0].area, 16.0);
        assert_eq!(cands[0].centroid, (12, 12));
    }

    #[test]
    fn test_two_blobs() {
        let frame = frame_with_rects(&[(2, 2, 4, 4), (20, 10, 8, 6)]);
        let mut areas = candidates_from_mask(&frame)
            .into_iter()
            .map(|c| c.area)
            .collect::<Vec<_>>();
        areas.sort_by(f64::total_cmp);

        assert_eq!(areas, vec![9.0, 35.0]);
    }

    #[test]
    fn test_nested_blob_is_not_a_candidate() {
        let mut frame = frame_with_rects(&[(5, 5, 20, 20)]);
        draw_filled_rect_mut(&mut frame, Rect::at(8, 8).of_size(14, 14), Luma([0]));
        draw_filled_rect_mut(&mut frame, Rect::at(12, 12).of_size(5, 5), Luma([255]));

        let cands = candidates_from_mask(&frame);
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].area, 19.0 * 19.0);
    }

    #[test]
    fn test_blobs_touching_each_edge() {
        let cases = [
            ((0, 10), (3, 13)),
            ((15, 0), (18, 3)),
            ((33, 10), (36, 13)),
            ((15, 23), (18, 26)),
            ((0, 0), (3, 3)),
            ((33, 23), (36, 26)),
        ];

        for ((x, y), centroid) in cases {
            let frame = frame_with_rects(&[(x, y, 7, 7)]);
            let cands = candidates_from_mask(&frame);

            assert_eq!(cands.len(), 1, "blob at ({x}, {y})");
            assert_eq!(cands[0].area, 36.0, "blob at ({x}, {y})");
            assert_eq!(cands[0].centroid, centroid, "blob at ({x}, {y})");
        }
    }

    #[test]
    fn test_full_frame_blob() {
        let mut frame = GrayImage::new(21, 21);
        frame.fill(255);

        let cands = candidates_from_mask(&frame);
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].area, 400.0);
        assert_eq!(cands[0].centroid, (10, 10));
    }

    #[test]
    fn test_left_wall_blob_is_tracked() {
        let frame = frame_with_rects(&[(0, 10, 7, 7)]);
        let mut detector = FrameDetector::new(DetectorCfg::larva(), None);

        for _ in 0..5 {
            assert_eq!(detector.detect(&frame).len(), 1);
        }
    }

    #[test]
    fn test_degenerate_contours_skipped() {
        let mut frame = GrayImage::new(10, 10);
        frame.put_pixel(2, 2, Luma([255]));
        for x in 5..9 {
            frame.put_pixel(x, 7, Luma([255]));
        }

        assert!(candidates_from_mask(&frame).is_empty());
    }

    #[test]
    fn test_blank_frame_has_no_candidates() {
        let mut detector = FrameDetector::new(DetectorCfg::larva(), None);
        assert!(detector.detect(&GrayImage::new(16, 16)).is_empty());
        assert_eq!(detector.frames_examined(), 1);
    }

    #[test]
    fn test_threshold_band_excludes_dim_blob() {
        let mut frame = frame_with_rects(&[(6, 6, 7, 7)]);
        draw_filled_rect_mut(&mut frame, Rect::at(20, 10).of_size(6, 6), Luma([100]));

        let mut detector = FrameDetector::new(DetectorCfg::larva(), None);
        let cands = detector.detect(&frame);

        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].centroid, (9, 9));
    }

    #[test]
    fn test_larva_closing_joins_split_blob() {
        //two halves of a larva separated by a one pixel gap
        let frame = frame_with_rects(&[(10, 10, 4, 6), (15, 10, 4, 6)]);
        assert_eq!(candidates_from_mask(&frame).len(), 2);

        let mut detector = FrameDetector::new(DetectorCfg::larva(), None);
        assert_eq!(detector.detect(&frame).len(), 1);
    }

    #[test]
    fn test_adult_opening_removes_noise() {
        let mut frame = frame_with_rects(&[(10, 10, 9, 9)]);
        frame.put_pixel(30, 5, Luma([255]));
        frame.put_pixel(31, 5, Luma([255]));
        frame.put_pixel(30, 6, Luma([255]));
        frame.put_pixel(31, 6, Luma([255]));

        let mut detector = FrameDetector::new(DetectorCfg::adult(), None);
        let cands = detector.detect(&frame);

        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].centroid, (14, 14));
    }

    #[test]
    fn test_background_subtraction() {
        let mut detector =
            FrameDetector::new(DetectorCfg::adult(), Some(BackgroundModelCfg::default()));

        //a static bright object is part of the scene, not a candidate
        let scene = frame_with_rects(&[(0, 0, 10, 10)]);
        for _ in 0..10 {
            assert!(detector.detect(&scene).is_empty());
        }

        let mut frame = scene.clone();
        draw_filled_rect_mut(&mut frame, Rect::at(20, 12).of_size(7, 7), Luma([200]));
        let cands = detector.detect(&frame);

        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].centroid, (23, 15));
    }

    #[test]
    fn test_validate() {
        assert!(DetectorCfg::larva().validate().is_ok());

        let mut cfg = DetectorCfg::larva();
        cfg.threshold_low = 200;
        cfg.threshold_high = 200;
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));

        cfg.threshold_high = 300;
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
    }
}
