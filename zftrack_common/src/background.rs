use image::{GrayImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

type GrayImageF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Tunables for [`BackgroundModel`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundModelCfg {
    /// Number of frames the model averages over once it has warmed up. Until then every
    /// frame seen so far has equal weight.
    pub history: u32,

    /// Squared distance from the background mean, in units of the background variance,
    /// beyond which a pixel is considered foreground.
    pub variance_threshold: f32,

    /// Variance assigned to each pixel when the first frame is seen.
    pub initial_variance: f32,

    pub min_variance: f32,
    pub max_variance: f32,
}

impl Default for BackgroundModelCfg {
    fn default() -> Self {
        Self {
            history: 500,
            variance_threshold: 16.0,
            initial_variance: 15.0,
            min_variance: 4.0,
            max_variance: 75.0,
        }
    }
}

/// A per-pixel running gaussian model of a static scene. Each frame is compared against the
/// model to produce a foreground mask, and then folded into the model.
#[derive(Debug, Clone)]
pub struct BackgroundModel {
    cfg: BackgroundModelCfg,
    mean: Option<GrayImageF32>,
    variance: GrayImageF32,
    frames_seen: u32,
}

impl BackgroundModel {
    pub fn new(cfg: BackgroundModelCfg) -> Self {
        Self {
            cfg,
            mean: None,
            variance: GrayImageF32::new(0, 0),
            frames_seen: 0,
        }
    }

    pub fn frames_seen(&self) -> u32 {
        self.frames_seen
    }

    /// Returns a mask with foreground pixels set to 255, and updates the model with the frame.
    ///
    /// The first frame initializes the model and is all background. If the frame size changes
    /// the model is restarted from the new frame.
    pub fn apply(&mut self, frame: &GrayImage) -> GrayImage {
        let mut fg_mask = GrayImage::new(frame.width(), frame.height());

        let needs_restart = self
            .mean
            .as_ref()
            .map_or(true, |mean| mean.dimensions() != frame.dimensions());
        if needs_restart {
            self.restart(frame);
            return fg_mask;
        }

        self.frames_seen = self.frames_seen.saturating_add(1);
        let alpha = 1.0 / self.frames_seen.min(self.cfg.history.max(1)) as f32;
        let cfg = self.cfg;

        let Some(mean) = self.mean.as_mut() else {
            return fg_mask;
        };

        for (
            (&Luma([pix]), &mut Luma([ref mut fg_pix])),
            (&mut Luma([ref mut mean_pix]), &mut Luma([ref mut var_pix])),
        ) in frame
            .pixels()
            .zip(fg_mask.pixels_mut())
            .zip(mean.pixels_mut().zip(self.variance.pixels_mut()))
        {
            let diff = f32::from(pix) - *mean_pix;
            let dist_sq = diff * diff;

            *fg_pix = if dist_sq > cfg.variance_threshold * *var_pix {
                255
            } else {
                0
            };

            *mean_pix += alpha * diff;
            *var_pix += alpha * (dist_sq - *var_pix);
            *var_pix = var_pix.clamp(cfg.min_variance, cfg.max_variance);
        }

        fg_mask
    }

    fn restart(&mut self, frame: &GrayImage) {
        let (width, height) = frame.dimensions();

        let mean = GrayImageF32::from_fn(width, height, |x, y| {
            let &Luma([pix]) = frame.get_pixel(x, y);
            Luma([f32::from(pix)])
        });

        self.mean = Some(mean);
        self.variance = GrayImageF32::from_pixel(width, height, Luma([self.cfg.initial_variance]));
        self.frames_seen = 1;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mask::is_blank;

    #[test]
    fn test_first_frame_is_background() {
        let mut model = BackgroundModel::new(BackgroundModelCfg::default());
        let frame = GrayImage::from_pixel(4, 4, Luma([200]));

        assert!(is_blank(&model.apply(&frame)));
        assert_eq!(model.frames_seen(), 1);
    }

    #[test]
    fn test_moving_pixel_is_foreground() {
        let mut model = BackgroundModel::new(BackgroundModelCfg::default());
        let background = GrayImage::from_pixel(5, 5, Luma([30]));

        for _ in 0..20 {
            assert!(is_blank(&model.apply(&background)));
        }

        let mut frame = background.clone();
        frame.put_pixel(2, 3, Luma([220]));

        let mask = model.apply(&frame);
        for (x, y, &Luma([pix])) in mask.enumerate_pixels() {
            if (x, y) == (2, 3) {
                assert_eq!(pix, 255);
            } else {
                assert_eq!(pix, 0);
            }
        }
    }

    #[test]
    fn test_small_noise_is_background() {
        let mut model = BackgroundModel::new(BackgroundModelCfg::default());
        let background = GrayImage::from_pixel(3, 3, Luma([100]));
        model.apply(&background);

        //4^2 = 16 is well within variance_threshold * initial_variance
        let noisy = GrayImage::from_pixel(3, 3, Luma([104]));
        assert!(is_blank(&model.apply(&noisy)));
    }

    #[test]
    fn test_resolution_change_restarts() {
        let mut model = BackgroundModel::new(BackgroundModelCfg::default());
        model.apply(&GrayImage::from_pixel(3, 3, Luma([0])));
        model.apply(&GrayImage::from_pixel(3, 3, Luma([0])));
        assert_eq!(model.frames_seen(), 2);

        let mask = model.apply(&GrayImage::from_pixel(6, 2, Luma([255])));
        assert_eq!(mask.dimensions(), (6, 2));
        assert!(is_blank(&mask));
        assert_eq!(model.frames_seen(), 1);
    }
}
