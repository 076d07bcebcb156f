use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use serde::{Deserialize, Serialize};

/// Shape of the 3x3 structuring element used for morphology.
///
/// Repeating a 3x3 square `n` times is the same as a single pass with an LInf ball of radius
/// `n`. The cross is the 3x3 ellipse, which repeats into an L1 ball.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    Square,
    Cross,
}

impl Kernel {
    fn norm(self) -> Norm {
        match self {
            Self::Square => Norm::LInf,
            Self::Cross => Norm::L1,
        }
    }
}

/// Binary mask of all pixels inside `[low, high)`. Foreground is 255, background 0.
/// `high` is wide enough to express "no upper bound" as 256.
pub fn threshold_band(img: &GrayImage, low: u8, high: u16) -> GrayImage {
    let mut ret = GrayImage::new(img.width(), img.height());

    for (&mut Luma([ref mut ret_pix]), &Luma([src_pix])) in ret.pixels_mut().zip(img.pixels()) {
        let in_band = src_pix >= low && u16::from(src_pix) < high;
        *ret_pix = if in_band { 255 } else { 0 };
    }

    ret
}

pub fn dilate(mask: &GrayImage, kernel: Kernel, iterations: u8) -> GrayImage {
    if iterations == 0 {
        return mask.clone();
    }
    imageproc::morphology::dilate(mask, kernel.norm(), iterations)
}

pub fn erode(mask: &GrayImage, kernel: Kernel, iterations: u8) -> GrayImage {
    if iterations == 0 {
        return mask.clone();
    }
    imageproc::morphology::erode(mask, kernel.norm(), iterations)
}

/// true if every pixel of the frame is zero.
pub fn is_blank(img: &GrayImage) -> bool {
    img.as_raw().iter().all(|&pix| pix == 0)
}
