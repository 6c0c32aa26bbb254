//! # Domain Models
//!
//! This crate contains pure domain types with minimal dependencies (`serde`, `bitflags`).
//! Keep it lean: no I/O or heavy logic, just data and simple helpers shared by
//! the labware, tip, transfer and protocol slices.

pub mod config;
pub mod constants;
pub mod deck;
pub mod liquid;
pub mod location;
pub mod pipette;
pub mod point;

pub use crate::deck::{DeckSlotName, Mount};
pub use crate::location::{Location, LocationTarget, WellName};
pub use crate::point::Point;

use std::fmt;

/// Error returned when a textual identifier (slot, mount, well name) cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseError {
    pub(crate) fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self { kind, value: value.into() }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.kind, self.value)
    }
}

impl std::error::Error for ParseError {}
