use imageproc::{geometry::oriented_contour_area, point::Point};

/// Spatial moments (up to first order) of the polygon traced by a contour.
///
/// Computed with Green's theorem over the closed polygon, so a contour whose points are
/// all collinear (a single pixel, or a one pixel wide line) has zero area.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContourMoments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

impl ContourMoments {
    pub fn from_points(points: &[Point<i32>]) -> Self {
        let Some(last) = points.last() else {
            return Self::default();
        };

        let oriented_area = oriented_contour_area(points);

        let mut a10 = 0.0;
        let mut a01 = 0.0;

        let (mut x_prev, mut y_prev) = (f64::from(last.x), f64::from(last.y));
        for p in points {
            let (x, y) = (f64::from(p.x), f64::from(p.y));
            let dxy = x_prev * y - x * y_prev;

            a10 += dxy * (x_prev + x);
            a01 += dxy * (y_prev + y);

            x_prev = x;
            y_prev = y;
        }

        //orientation of the contour should not matter
        let sign = if oriented_area < 0.0 { -1.0 } else { 1.0 };

        Self {
            m00: sign * oriented_area,
            m10: sign * a10 / 6.0,
            m01: sign * a01 / 6.0,
        }
    }

    pub fn area(&self) -> f64 {
        self.m00
    }

    /// Centroid of the contour, truncated to integer pixel coordinates. `None` when the
    /// contour encloses no area.
    pub fn centroid(&self) -> Option<(i32, i32)> {
        if self.m00 == 0.0 {
            return None;
        }

        let x = (self.m10 / self.m00) as i32;
        let y = (self.m01 / self.m00) as i32;
        Some((x, y))
    }
}
