//! # Transfer
//!
//! Liquid-class transfers expressed against an abstract pipette.
//!
//! [`InstrumentCore`] is the seam to whatever moves the pipette (the protocol engine
//! in this workspace, a recording fake in tests). [`TransferComponentsExecutor`]
//! runs the individual components of a well visit, and the planners in [`planner`]
//! string visits together for one-to-one, one-to-many and many-to-one transfers,
//! handling volume splitting and tip changes.

mod error;
pub mod executor;
mod instrument;
pub mod planner;
pub mod state;

pub use crate::error::{TransferError, TransferErrorExt};
pub use crate::executor::{DispenseProfile, PipettingAction, TransferComponentsExecutor, absolute_point};
pub use crate::instrument::{InstrumentCore, TouchTipMotion};
pub use crate::planner::{
    TransferRequest, consolidate_with_liquid_class, distribute_with_liquid_class, split_volume,
    transfer_with_liquid_class,
};
pub use crate::state::{LiquidAndAirGapPair, TipPolicy, TipState, TransferTarget, TransferType, WellRef};
