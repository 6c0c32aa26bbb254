use crate::{ParseError, Point};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a [`Location`] points into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LocationTarget {
    #[serde(rename_all = "camelCase")]
    Well { labware_id: String, well_name: String },
    #[serde(rename_all = "camelCase")]
    Labware { labware_id: String },
    #[serde(rename_all = "camelCase")]
    TrashBin { trash_id: String },
    #[default]
    Deck,
}

/// An absolute deck point together with the thing it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub point: Point,
    #[serde(default)]
    pub target: LocationTarget,
}

impl Location {
    #[must_use]
    pub const fn new(point: Point, target: LocationTarget) -> Self {
        Self { point, target }
    }

    #[must_use]
    pub fn in_well(point: Point, labware_id: impl Into<String>, well_name: impl Into<String>) -> Self {
        Self::new(point, LocationTarget::Well { labware_id: labware_id.into(), well_name: well_name.into() })
    }

    /// Same target, shifted point.
    #[must_use]
    pub fn moved_to(&self, point: Point) -> Self {
        Self { point, target: self.target.clone() }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            LocationTarget::Well { labware_id, well_name } => {
                write!(f, "{well_name} of {labware_id} at {}", self.point)
            },
            LocationTarget::Labware { labware_id } => write!(f, "{labware_id} at {}", self.point),
            LocationTarget::TrashBin { trash_id } => write!(f, "trash {trash_id} at {}", self.point),
            LocationTarget::Deck => write!(f, "{}", self.point),
        }
    }
}

/// A parsed well name such as `"B12"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WellName {
    pub row: char,
    pub column: u16,
}

impl WellName {
    /// Zero-based row index (`A` is 0).
    #[must_use]
    pub const fn row_index(self) -> usize {
        (self.row as u8 - b'A') as usize
    }
}

impl FromStr for WellName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let row = chars.next().filter(char::is_ascii_uppercase).ok_or_else(|| ParseError::new("well name", s))?;
        let column = chars.as_str().parse::<u16>().ok().filter(|c| *c > 0).ok_or_else(|| ParseError::new("well name", s))?;
        Ok(Self { row, column })
    }
}

impl fmt::Display for WellName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row, self.column)
    }
}
