use serde::{Deserialize, Serialize};

use crate::Error;

/// A rectangular region of a frame, stored as the distance of each edge from the
/// corresponding edge of the uncropped frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Crop {
    pub orig_res: (u32, u32),
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl Crop {
    /// A crop covering the whole frame.
    #[must_use]
    pub fn uncropped(orig_res: (u32, u32)) -> Self {
        Self {
            orig_res,
            left: 0,
            right: 0,
            top: 0,
            bottom: 0,
        }
    }

    pub fn from_topleft_and_dims(
        (orig_width, orig_height): (u32, u32),
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Self, Error> {
        if width == 0 || height == 0 {
            return Err(Error::ZeroSized);
        }

        let out_of_bounds = || Error::OutOfBounds {
            x,
            y,
            width,
            height,
            frame_width: orig_width,
            frame_height: orig_height,
        };

        let right = orig_width
            .checked_sub(x)
            .and_then(|rem| rem.checked_sub(width))
            .ok_or_else(out_of_bounds)?;
        let bottom = orig_height
            .checked_sub(y)
            .and_then(|rem| rem.checked_sub(height))
            .ok_or_else(out_of_bounds)?;

        Ok(Self {
            orig_res: (orig_width, orig_height),
            left: x,
            right,
            top: y,
            bottom,
        })
    }

    /// (x, y, width, height) of the cropped area.
    #[must_use]
    pub fn as_view_args(&self) -> (u32, u32, u32, u32) {
        (self.left, self.top, self.width(), self.height())
    }

    pub fn width(&self) -> u32 {
        self.orig_res.0 - (self.left + self.right)
    }

    pub fn height(&self) -> u32 {
        self.orig_res.1 - (self.top + self.bottom)
    }

    pub fn area(&self) -> u32 {
        self.width() * self.height()
    }

    pub fn is_uncropped(&self) -> bool {
        (self.left == 0) && (self.right == 0) && (self.top == 0) && (self.bottom == 0)
    }

    /// Split the cropped area into `rows x cols` equally sized cells, returned in row-major
    /// order. Cell dimensions are truncated, so any remainder at the right and bottom edges is
    /// not covered by a cell.
    pub fn grid(&self, rows: u32, cols: u32) -> Result<Vec<Self>, Error> {
        let (x0, y0, width, height) = self.as_view_args();

        let invalid = || Error::InvalidGrid {
            width,
            height,
            rows,
            cols,
        };

        if rows == 0 || cols == 0 {
            return Err(invalid());
        }

        let cell_width = width / cols;
        let cell_height = height / rows;
        if cell_width == 0 || cell_height == 0 {
            return Err(invalid());
        }

        let mut ret = Vec::with_capacity((rows * cols) as usize);
        for row in 0..rows {
            for col in 0..cols {
                let x = x0 + col * cell_width;
                let y = y0 + row * cell_height;
                ret.push(Self::from_topleft_and_dims(
                    self.orig_res,
                    x,
                    y,
                    cell_width,
                    cell_height,
                )?);
            }
        }

        Ok(ret)
    }
}

#[cfg(test)]
mod test {
    use itertools::Itertools;

    use super::*;

    #[test]
    fn test_as_view_args_nocrop() {
        let crop = Crop::uncropped((100, 100));
        assert!(crop.is_uncropped());
        assert_eq!(crop.as_view_args(), (0, 0, 100, 100));
    }

    #[test]
    fn test_as_view_args_four_more() {
        let crop = Crop::from_topleft_and_dims((768, 432), 96, 0, 576, 432).unwrap();
        assert_eq!(crop.as_view_args(), (96, 0, 576, 432));
        assert_eq!(crop.right, 96);
        assert_eq!(crop.bottom, 0);
    }

    #[test]
    fn test_from_offset_and_dims() {
        let crop = Crop::from_topleft_and_dims((100, 100), 11, 12, 13, 14).unwrap();
        assert_eq!(crop.as_view_args(), (11, 12, 13, 14));
        assert_eq!(crop.area(), 13 * 14);
    }

    #[test]
    fn test_crop_too_big() {
        let act = Crop::from_topleft_and_dims((100, 100), 90, 0, 11, 10);
        assert!(matches!(act, Err(Error::OutOfBounds { .. })));

        let act = Crop::from_topleft_and_dims((100, 100), 0, 101, 10, 10);
        assert!(matches!(act, Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn test_crop_zero_sized() {
        let act = Crop::from_topleft_and_dims((100, 100), 0, 0, 0, 10);
        assert_eq!(act, Err(Error::ZeroSized));
    }

    #[test]
    fn test_grid_row_major() {
        let plate = Crop::from_topleft_and_dims((1000, 800), 10, 20, 600, 400).unwrap();
        let wells = plate.grid(4, 6).unwrap();

        assert_eq!(wells.len(), 24);
        assert_eq!(wells[0].as_view_args(), (10, 20, 100, 100));
        assert_eq!(wells[1].as_view_args(), (110, 20, 100, 100));
        assert_eq!(wells[6].as_view_args(), (10, 120, 100, 100));
        assert_eq!(wells[23].as_view_args(), (510, 320, 100, 100));

        //no two wells overlap
        for (a, b) in wells.iter().tuple_combinations() {
            let (ax, ay, aw, ah) = a.as_view_args();
            let (bx, by, bw, bh) = b.as_view_args();
            let disjoint = ax + aw <= bx || bx + bw <= ax || ay + ah <= by || by + bh <= ay;
            assert!(disjoint, "{a:?} overlaps {b:?}");
        }
    }

    #[test]
    fn test_grid_truncates() {
        let plate = Crop::uncropped((100, 50));
        let wells = plate.grid(4, 6).unwrap();

        //100 / 6 = 16, 50 / 4 = 12
        assert!(wells.iter().all(|w| w.width() == 16 && w.height() == 12));
        assert_eq!(wells.last().unwrap().as_view_args(), (80, 36, 16, 12));
    }

    #[test]
    fn test_grid_invalid() {
        let plate = Crop::uncropped((5, 5));
        assert!(matches!(plate.grid(0, 1), Err(Error::InvalidGrid { .. })));
        assert!(matches!(plate.grid(6, 1), Err(Error::InvalidGrid { .. })));
    }
}
