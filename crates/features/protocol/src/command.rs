//! The command log.
//!
//! Every state change of the engine is recorded as a [`Command`]. The serialized
//! form matches the robot's command schema: `{"commandType": ..., "params": {...}}`.

use aliq_domain::{DeckSlotName, Location, Mount};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::AsRefStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, AsRefStr)]
#[serde(tag = "commandType", content = "params", rename_all = "camelCase", rename_all_fields = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Command {
    LoadLabware { labware_id: String, load_name: String, slot: DeckSlotName },
    LoadTrashBin { trash_id: String, slot: DeckSlotName },
    LoadPipette { pipette_id: String, pipette_name: String, mount: Mount },
    LoadLiquid { labware_id: String, well_name: String, volume: f64 },
    PickUpTip { pipette_id: String, labware_id: String, well_name: String },
    DropTip { pipette_id: String, location: Location },
    ReturnTip { pipette_id: String, labware_id: String, well_name: String },
    MoveTo {
        pipette_id: String,
        location: Location,
        force_direct: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<f64>,
    },
    Aspirate { pipette_id: String, location: Location, volume: f64, flow_rate: f64, correction_volume: f64 },
    Dispense {
        pipette_id: String,
        location: Location,
        volume: f64,
        flow_rate: f64,
        push_out: f64,
        correction_volume: f64,
    },
    /// Aspirate with the tip following the meniscus down to `end_location`.
    AspirateWhileTracking {
        pipette_id: String,
        location: Location,
        end_location: Location,
        volume: f64,
        flow_rate: f64,
        correction_volume: f64,
    },
    DispenseWhileTracking {
        pipette_id: String,
        location: Location,
        end_location: Location,
        volume: f64,
        flow_rate: f64,
        push_out: f64,
        correction_volume: f64,
    },
    /// Pushes the tip contents out under pressure from the well top; leaves the plunger at the bottom.
    PressureDispense { pipette_id: String, location: Location, volume: f64, flow_rate: f64 },
    /// Expels an air gap without touching liquid.
    DispenseInPlace { pipette_id: String, volume: f64, flow_rate: f64, correction_volume: f64 },
    AirGapInPlace { pipette_id: String, volume: f64, flow_rate: f64, correction_volume: f64 },
    PrepareToAspirate { pipette_id: String },
    BlowOut { pipette_id: String, location: Location, flow_rate: f64 },
    TouchTip { pipette_id: String, labware_id: String, well_name: String, radius: f64, z_offset: f64, speed: f64 },
    WaitForDuration {
        seconds: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Comment { message: String },
}

impl Command {
    /// The pipette the command acts on, if any.
    #[must_use]
    pub fn pipette_id(&self) -> Option<&str> {
        match self {
            Self::LoadPipette { pipette_id, .. }
            | Self::PickUpTip { pipette_id, .. }
            | Self::DropTip { pipette_id, .. }
            | Self::ReturnTip { pipette_id, .. }
            | Self::MoveTo { pipette_id, .. }
            | Self::Aspirate { pipette_id, .. }
            | Self::Dispense { pipette_id, .. }
            | Self::AspirateWhileTracking { pipette_id, .. }
            | Self::DispenseWhileTracking { pipette_id, .. }
            | Self::PressureDispense { pipette_id, .. }
            | Self::DispenseInPlace { pipette_id, .. }
            | Self::AirGapInPlace { pipette_id, .. }
            | Self::PrepareToAspirate { pipette_id }
            | Self::BlowOut { pipette_id, .. }
            | Self::TouchTip { pipette_id, .. } => Some(pipette_id),
            Self::LoadLabware { .. }
            | Self::LoadTrashBin { .. }
            | Self::LoadLiquid { .. }
            | Self::WaitForDuration { .. }
            | Self::Comment { .. } => None,
        }
    }
}

/// One line of the human-readable run log.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadLabware { labware_id, load_name, slot } => {
                write!(f, "Loading {load_name} in slot {slot} as {labware_id}")
            },
            Self::LoadTrashBin { slot, .. } => write!(f, "Loading trash bin in slot {slot}"),
            Self::LoadPipette { pipette_name, mount, .. } => write!(f, "Loading {pipette_name} on the {mount} mount"),
            Self::LoadLiquid { labware_id, well_name, volume } => {
                write!(f, "Loading {volume} uL into {well_name} of {labware_id}")
            },
            Self::PickUpTip { labware_id, well_name, .. } => {
                write!(f, "Picking up tip from {well_name} of {labware_id}")
            },
            Self::DropTip { location, .. } => write!(f, "Dropping tip into {location}"),
            Self::ReturnTip { labware_id, well_name, .. } => {
                write!(f, "Returning tip to {well_name} of {labware_id}")
            },
            Self::MoveTo { location, .. } => write!(f, "Moving to {location}"),
            Self::Aspirate { location, volume, flow_rate, .. } => {
                write!(f, "Aspirating {volume} uL from {location} at {flow_rate} uL/sec")
            },
            Self::Dispense { location, volume, flow_rate, push_out, .. } => {
                write!(f, "Dispensing {volume} uL into {location} at {flow_rate} uL/sec")?;
                if *push_out > 0.0 {
                    write!(f, " with {push_out} uL push-out")?;
                }
                Ok(())
            },
            Self::AspirateWhileTracking { location, end_location, volume, flow_rate, .. } => write!(
                f,
                "Aspirating {volume} uL from {location} at {flow_rate} uL/sec, following the meniscus to z {}",
                end_location.point.z
            ),
            Self::DispenseWhileTracking { location, end_location, volume, flow_rate, .. } => write!(
                f,
                "Dispensing {volume} uL into {location} at {flow_rate} uL/sec, following the meniscus to z {}",
                end_location.point.z
            ),
            Self::PressureDispense { location, volume, .. } => {
                write!(f, "Pressure-dispensing {volume} uL into {location}")
            },
            Self::DispenseInPlace { volume, .. } => write!(f, "Removing {volume} uL air gap"),
            Self::AirGapInPlace { volume, .. } => write!(f, "Air gap of {volume} uL"),
            Self::PrepareToAspirate { .. } => f.write_str("Preparing to aspirate"),
            Self::BlowOut { location, .. } => write!(f, "Blowing out at {location}"),
            Self::TouchTip { labware_id, well_name, .. } => write!(f, "Touching tip in {well_name} of {labware_id}"),
            Self::WaitForDuration { seconds, message } => match message {
                Some(message) => write!(f, "Delaying for {seconds} seconds: {message}"),
                None => write!(f, "Delaying for {seconds} seconds"),
            },
            Self::Comment { message } => f.write_str(message),
        }
    }
}
