//! Wire-level enums shared by liquid class definitions and the transfer engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference point inside a well that a liquid-class position offset is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositionReference {
    WellTop,
    WellBottom,
    WellCenter,
    LiquidMeniscus,
}

impl fmt::Display for PositionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WellTop => "well-top",
            Self::WellBottom => "well-bottom",
            Self::WellCenter => "well-center",
            Self::LiquidMeniscus => "liquid-meniscus",
        })
    }
}

/// Where residual liquid is blown out after a dispense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlowoutLocation {
    Source,
    Destination,
    Trash,
}

impl fmt::Display for BlowoutLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Source => "source",
            Self::Destination => "destination",
            Self::Trash => "trash",
        })
    }
}
