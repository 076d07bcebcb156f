use serde::{Deserialize, Serialize};

use crate::definitions::{
    ADULT_AREA_WEIGHT, ADULT_NORMATIVE_AREA, DEFAULT_DISTANCE_WEIGHT, LARVA_AREA_WEIGHT,
    LARVA_NORMATIVE_AREA,
};

/// Integer pixel coordinates (x, y) of a blob centroid.
pub type Coords = (i32, i32);

/// Weights of the matching score used to pick one blob when several are detected in a
/// frame.
///
/// `score = area_weight * (1 - |normative_area - area|) + (1 - distance_weight * distance)`
///
/// Higher is better. Blobs close to the expected size and close to the previous position
/// score highest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub normative_area: f64,
    pub area_weight: f64,
    pub distance_weight: f64,
}

impl ScoreWeights {
    pub fn larva() -> Self {
        Self {
            normative_area: LARVA_NORMATIVE_AREA,
            area_weight: LARVA_AREA_WEIGHT,
            distance_weight: DEFAULT_DISTANCE_WEIGHT,
        }
    }

    pub fn adult() -> Self {
        Self {
            normative_area: ADULT_NORMATIVE_AREA,
            area_weight: ADULT_AREA_WEIGHT,
            distance_weight: DEFAULT_DISTANCE_WEIGHT,
        }
    }

    pub fn score(&self, area: f64, distance: f64) -> f64 {
        let area_term = self.area_weight * (1.0 - (self.normative_area - area).abs());
        let distance_term = 1.0 - self.distance_weight * distance;
        area_term + distance_term
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self::larva()
    }
}

/// How a point relates to the point accepted before it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Linkage {
    /// First point after the tracker lost (or never had) the blob.
    Seed,
    Linked {
        predecessor_frame: u64,
        distance: f64,
        score: f64,
    },
}

/// A single accepted detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    coords: Coords,
    area: f64,
    frame: u64,
    linkage: Linkage,
}

impl Point {
    pub fn seed(coords: Coords, area: f64, frame: u64) -> Self {
        Self {
            coords,
            area,
            frame,
            linkage: Linkage::Seed,
        }
    }

    /// A point scored against the previously accepted point.
    pub fn linked(
        coords: Coords,
        area: f64,
        frame: u64,
        predecessor: &Point,
        weights: &ScoreWeights,
    ) -> Self {
        let distance = euclidean(coords, predecessor.coords);
        let score = weights.score(area, distance);

        Self {
            coords,
            area,
            frame,
            linkage: Linkage::Linked {
                predecessor_frame: predecessor.frame,
                distance,
                score,
            },
        }
    }

    pub fn coords(&self) -> Coords {
        self.coords
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    pub fn is_seed(&self) -> bool {
        matches!(self.linkage, Linkage::Seed)
    }

    /// The matching score. Seeds have no predecessor and so no score.
    pub fn score(&self) -> Option<f64> {
        match self.linkage {
            Linkage::Seed => None,
            Linkage::Linked { score, .. } => Some(score),
        }
    }

    /// Distance travelled from the predecessor. Zero for seeds.
    pub fn distance(&self) -> f64 {
        match self.linkage {
            Linkage::Seed => 0.0,
            Linkage::Linked { distance, .. } => distance,
        }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        euclidean(self.coords, other.coords)
    }
}

fn euclidean((x1, y1): Coords, (x2, y2): Coords) -> f64 {
    let dx = f64::from(x1) - f64::from(x2);
    let dy = f64::from(y1) - f64::from(y2);
    dx.hypot(dy)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_adult_scores() {
        let weights = ScoreWeights::adult();

        assert_eq!(weights.score(50.0, 3.0), -143.0);
        assert_eq!(weights.score(125.0, 40.0), -87.0);
    }

    #[test]
    fn test_score_is_pure() {
        let weights = ScoreWeights::larva();
        let a = weights.score(73.5, 4.25);
        let b = weights.score(73.5, 4.25);
        assert_eq!(a, b);

        //exactly the normative area at zero distance is the best possible score
        assert_eq!(weights.score(80.0, 0.0), weights.area_weight + 1.0);
    }

    #[test]
    fn test_seed() {
        let p = Point::seed((10, 20), 81.0, 7);

        assert!(p.is_seed());
        assert_eq!(p.score(), None);
        assert_eq!(p.distance(), 0.0);
        assert_eq!(p.frame(), 7);
        assert_eq!(p.coords(), (10, 20));
    }

    #[test]
    fn test_linked() {
        let weights = ScoreWeights::larva();
        let seed = Point::seed((0, 0), 80.0, 3);
        let p = Point::linked((3, 4), 78.0, 4, &seed, &weights);

        assert_eq!(p.distance(), 5.0);
        assert_eq!(p.score(), Some(weights.score(78.0, 5.0)));
        assert_eq!(
            p.linkage(),
            Linkage::Linked {
                predecessor_frame: 3,
                distance: 5.0,
                score: 1.0 * (1.0 - 2.0) + (1.0 - 2.0 * 5.0),
            }
        );
        assert_eq!(p.distance_to(&seed), 5.0);
    }
}
