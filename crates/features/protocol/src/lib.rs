//! # Protocol
//!
//! The simulated protocol engine. It loads labware, trash bins, pipettes and
//! liquids, tracks tips and well volumes as commands run, records every command,
//! and drives liquid-class transfers through [`aliq_transfer`].
//!
//! Protocols come either from code calling [`ProtocolEngine`] directly or from a
//! JSON [`ProtocolFile`] run with [`run_protocol`].

pub mod command;
pub mod engine;
mod error;
pub mod instrument;
pub mod pipettes;
pub mod runner;
pub mod state;

pub use crate::command::Command;
pub use crate::engine::{EngineConfig, ProtocolEngine};
pub use crate::error::{ProtocolError, ProtocolErrorExt};
pub use crate::instrument::EngineInstrument;
pub use crate::runner::{ProtocolFile, Step, run_protocol};
pub use crate::state::{AttachedTip, Pipette, WellVolume};
