use std::path::Path;

use serde::{Deserialize, Serialize};
use zftrack_common::Crop;
use zftrack_lib::{Coords, Region};

use crate::app::*;

/// A region as written in a wells file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionEntry {
    Circle { center: Coords, radius: f64 },
    CircleThrough { center: Coords, on_circumference: Coords },
    Border { y: i32 },
    BorderBetween { start: Coords, end: Coords },
    Line { start: Coords, end: Coords },
}

impl From<RegionEntry> for Region {
    fn from(entry: RegionEntry) -> Self {
        match entry {
            RegionEntry::Circle { center, radius } => Region::Circle { center, radius },
            RegionEntry::CircleThrough {
                center,
                on_circumference,
            } => Region::circle_from_circumference(center, on_circumference),
            RegionEntry::Border { y } => Region::Border { y },
            RegionEntry::BorderBetween { start, end } => Region::border_from_endpoints(start, end),
            RegionEntry::Line { start, end } => Region::Line { start, end },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CropEntry {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WellEntry {
    pub name: Option<String>,
    pub crop: Option<CropEntry>,
    pub region: Option<RegionEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WellsFile {
    pub wells: Vec<WellEntry>,
}

impl WellsFile {
    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path).map_err(|source| AppError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&text).map_err(|source| AppError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// One well of one video, ready to be tracked.
#[derive(Debug, Clone, PartialEq)]
pub struct WellDef {
    pub name: String,
    pub crop: Crop,
    pub region: Option<Region>,
}

/// A [`WellLayout`] with any wells file already read, so that it can be applied to
/// every video without touching the disk again.
#[derive(Debug, Clone, PartialEq)]
pub enum WellPlan {
    Whole,
    Grid {
        plate: Option<(u32, u32, u32, u32)>,
        rows: u32,
        cols: u32,
    },
    Listed(Vec<WellEntry>),
}

impl WellPlan {
    pub fn from_layout(layout: &WellLayout) -> Result<Self, AppError> {
        let ret = match layout {
            WellLayout::Whole => Self::Whole,
            WellLayout::Grid { plate, rows, cols } => Self::Grid {
                plate: *plate,
                rows: *rows,
                cols: *cols,
            },
            WellLayout::File(path) => Self::Listed(WellsFile::from_path(path)?.wells),
        };

        Ok(ret)
    }

    /// The wells of a video with the given resolution.
    pub fn wells(&self, resolution: (u32, u32)) -> Result<Vec<WellDef>, AppError> {
        let whole = Crop::uncropped(resolution);

        let ret = match self {
            Self::Whole => vec![WellDef {
                name: grid_well_name(0, 0),
                crop: whole,
                region: None,
            }],

            Self::Grid { plate, rows, cols } => {
                let plate = match plate {
                    Some((x, y, w, h)) => Crop::from_topleft_and_dims(resolution, *x, *y, *w, *h)?,
                    None => whole,
                };

                let cells = plate.grid(*rows, *cols)?;
                (0..*rows)
                    .flat_map(|row| (0..*cols).map(move |col| (row, col)))
                    .zip(cells)
                    .map(|((row, col), crop)| WellDef {
                        name: grid_well_name(row, col),
                        crop,
                        region: None,
                    })
                    .collect()
            }

            Self::Listed(entries) => entries
                .iter()
                .enumerate()
                .map(|(i, entry)| {
                    let crop = match entry.crop {
                        Some(CropEntry {
                            x,
                            y,
                            width,
                            height,
                        }) => Crop::from_topleft_and_dims(resolution, x, y, width, height)?,
                        None => whole,
                    };

                    Ok(WellDef {
                        name: entry.name.clone().unwrap_or_else(|| format!("well{}", i + 1)),
                        crop,
                        region: entry.region.map(Region::from),
                    })
                })
                .collect::<Result<Vec<_>, AppError>>()?,
        };

        Ok(ret)
    }
}

impl DefaultRegion {
    /// The region for a well whose tracked frames have the given dimensions.
    pub fn for_dims(&self, (width, height): (u32, u32)) -> Option<Region> {
        match *self {
            Self::None => None,
            Self::CentredCircle { radius } => Some(Region::Circle {
                center: ((width / 2) as i32, (height / 2) as i32),
                radius,
            }),
            Self::Border { y } => Some(Region::Border { y }),
        }
    }
}

//A1, A2, .. B1, ..; rows past Z fall back to numbers.
fn grid_well_name(row: u32, col: u32) -> String {
    match u8::try_from(row).ok().filter(|r| *r < 26) {
        Some(r) => format!("{}{}", char::from(b'A' + r), col + 1),
        None => format!("R{}C{}", row + 1, col + 1),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_grid_names_row_major() {
        let plan = WellPlan::Grid {
            plate: Some((10, 20, 600, 400)),
            rows: 4,
            cols: 6,
        };

        let wells = plan.wells((640, 480)).unwrap();
        assert_eq!(wells.len(), 24);
        assert_eq!(wells[0].name, "A1");
        assert_eq!(wells[5].name, "A6");
        assert_eq!(wells[6].name, "B1");
        assert_eq!(wells[23].name, "D6");

        assert_eq!(wells[0].crop.as_view_args(), (10, 20, 100, 100));
        assert_eq!(wells[7].crop.as_view_args(), (110, 120, 100, 100));
        assert!(wells.iter().all(|w| w.region.is_none()));
    }

    #[test]
    fn test_grid_outside_frame() {
        let plan = WellPlan::Grid {
            plate: Some((100, 100, 600, 400)),
            rows: 4,
            cols: 6,
        };
        assert!(matches!(plan.wells((640, 480)), Err(AppError::WellLayout(_))));

        let plan = WellPlan::Grid {
            plate: None,
            rows: 0,
            cols: 6,
        };
        assert!(matches!(plan.wells((640, 480)), Err(AppError::WellLayout(_))));
    }

    #[test]
    fn test_whole() {
        let wells = WellPlan::Whole.wells((320, 240)).unwrap();
        assert_eq!(wells.len(), 1);
        assert!(wells[0].crop.is_uncropped());
    }

    #[test]
    fn test_wells_file() {
        let file: WellsFile = serde_json::from_str(
            r#"{
                "wells": [
                    {
                        "name": "left",
                        "crop": {"x": 0, "y": 0, "width": 100, "height": 100},
                        "region": {"kind": "circle_through", "center": [50, 50], "on_circumference": [53, 54]}
                    },
                    {
                        "crop": {"x": 100, "y": 0, "width": 100, "height": 100},
                        "region": {"kind": "border_between", "start": [0, 10], "end": [100, 15]}
                    },
                    {}
                ]
            }"#,
        )
        .unwrap();

        let wells = WellPlan::Listed(file.wells).wells((200, 100)).unwrap();

        assert_eq!(wells[0].name, "left");
        assert_eq!(
            wells[0].region,
            Some(Region::Circle {
                center: (50, 50),
                radius: 5.0
            })
        );

        assert_eq!(wells[1].name, "well2");
        assert_eq!(wells[1].crop.as_view_args(), (100, 0, 100, 100));
        assert_eq!(wells[1].region, Some(Region::Border { y: 12 }));

        assert!(wells[2].crop.is_uncropped());
        assert_eq!(wells[2].region, None);
    }

    #[test]
    fn test_wells_file_rejects_typos() {
        let res = serde_json::from_str::<WellsFile>(r#"{"wells": [{"crops": null}]}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_default_region() {
        assert_eq!(DefaultRegion::None.for_dims((100, 80)), None);
        assert_eq!(
            DefaultRegion::CentredCircle { radius: 30.0 }.for_dims((101, 80)),
            Some(Region::Circle {
                center: (50, 40),
                radius: 30.0
            })
        );
        assert_eq!(
            DefaultRegion::Border { y: 7 }.for_dims((100, 80)),
            Some(Region::Border { y: 7 })
        );
    }

    #[test]
    fn test_many_rows() {
        assert_eq!(grid_well_name(25, 0), "Z1");
        assert_eq!(grid_well_name(26, 2), "R27C3");
    }
}
