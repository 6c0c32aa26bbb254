//! # Labware
//!
//! Labware definitions, the simulated deck and per-well liquid tracking.
//!
//! * [`definition`] — the JSON labware schema and its validation.
//! * [`geometry`] — inner well geometry and volume/height conversion.
//! * [`library`] — built-in and custom definitions, looked up by load name or URI.
//! * [`deck`] — slot origins, placed labware, trash bins.
//! * [`liquids`] — per-well volumes and liquid height estimates.

pub mod deck;
pub mod definition;
mod error;
pub mod geometry;
pub mod liquids;
pub mod library;

pub use crate::deck::{Deck, Labware, TrashBin};
pub use crate::definition::{LabwareDefinition, WellDefinition, WellShape};
pub use crate::error::{LabwareError, LabwareErrorExt};
pub use crate::geometry::{WellGeometry, WellSection, height_from_volume, volume_from_height};
pub use crate::library::LabwareLibrary;
pub use crate::liquids::WellLiquids;
