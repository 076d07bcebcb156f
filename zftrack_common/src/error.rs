use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a crop or well grid could not be built.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Error {
    /// The requested rectangle does not fit inside the frame it is cropped from.
    #[error("crop {width}x{height} at ({x}, {y}) does not fit in a {frame_width}x{frame_height} frame")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    },

    /// The rectangle would contain no pixels.
    #[error("crop has zero width or height")]
    ZeroSized,

    /// A grid was requested with zero rows or columns, or with cells too small to hold a pixel.
    #[error("cannot split a {width}x{height} crop into a {rows}x{cols} grid")]
    InvalidGrid {
        width: u32,
        height: u32,
        rows: u32,
        cols: u32,
    },
}
