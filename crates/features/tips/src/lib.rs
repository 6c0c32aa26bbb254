//! # Tips
//!
//! Tracks clean and used tips per tip rack and picks the next well a pipette should
//! pick up from, given how many nozzles it engages.

mod error;
pub mod tracker;

pub use crate::error::{TipError, TipErrorExt};
pub use crate::tracker::TipTracker;
