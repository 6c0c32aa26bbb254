//! # Liquid Classes
//!
//! A liquid class bundles the physical transfer parameters tuned for one category of
//! liquid: submerge and retract motion, flow rates, delays, air gaps, push-out,
//! touch tip, mixing and blowout. Parameters are stored per pipette model and tip
//! rack, and volume-dependent values use [`VolumeMap`].
//!
//! Three classes ship with the crate:
//!
//! | name          | display name | notes                                       |
//! |---------------|--------------|---------------------------------------------|
//! | `water`       | Aqueous      | fast flow, blowout, no touch tip            |
//! | `ethanol_80`  | Volatile     | pre-wet, larger air gaps, blowout over wells |
//! | `glycerol_50` | Viscous      | slow flow and submerge, long delays         |

pub mod class;
mod error;
pub mod properties;
pub mod registry;
pub mod schema;
pub mod volume_map;

pub use crate::class::{ByTipRack, LiquidClass};
pub use crate::error::{LiquidClassError, LiquidClassErrorExt};
pub use crate::properties::TransferProperties;
pub use crate::registry::LiquidClassRegistry;
pub use crate::volume_map::VolumeMap;
