use aliq_domain::DeckSlotName;
use std::borrow::Cow;

/// Error types specific to the labware slice.
#[aliq_derive::aliq_error]
pub enum LabwareError {
    #[error("Labware definition not found: {load_name}{}", format_context(.context))]
    DefinitionNotFound { load_name: String, context: Option<Cow<'static, str>> },

    #[error("Invalid labware definition {load_name}{}: {message}", format_context(.context))]
    InvalidDefinition { load_name: String, message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Labware {uri} is already defined{}", format_context(.context))]
    AlreadyDefined { uri: String, context: Option<Cow<'static, str>> },

    #[error("Slot {slot} is already occupied by {occupant}{}", format_context(.context))]
    SlotOccupied { slot: DeckSlotName, occupant: String, context: Option<Cow<'static, str>> },

    #[error("Labware not found: {labware_id}{}", format_context(.context))]
    LabwareNotFound { labware_id: String, context: Option<Cow<'static, str>> },

    #[error("Well {well_name} not found in {labware}{}", format_context(.context))]
    WellNotFound { well_name: String, labware: String, context: Option<Cow<'static, str>> },

    /// No unique physically meaningful height matches a volume.
    #[error("Invalid liquid height found{}: {message}", format_context(.context))]
    InvalidLiquidHeight { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A height or volume falls outside the well.
    #[error("{quantity} {value} is out of range [0, {max}]{}", format_context(.context))]
    OutOfRange { quantity: &'static str, value: f64, max: f64, context: Option<Cow<'static, str>> },

    #[error("Cannot hold {volume}uL in well {well_name} of {labware} (max {max_volume}uL){}", format_context(.context))]
    VolumeExceedsCapacity {
        volume: f64,
        max_volume: f64,
        well_name: String,
        labware: String,
        context: Option<Cow<'static, str>>,
    },

    #[error("Cannot remove {volume}uL from well {well_name} holding {available}uL{}", format_context(.context))]
    NotEnoughLiquid { volume: f64, available: f64, well_name: String, context: Option<Cow<'static, str>> },

    #[error("Labware definition parse error{}: {source}", format_context(.context))]
    Parse { source: serde_json::Error, context: Option<Cow<'static, str>> },

    #[error("Labware I/O error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Internal labware error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl LabwareError {
    pub(crate) fn invalid_height(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidLiquidHeight { message: message.into(), context: None }
    }

    pub(crate) const fn out_of_range(quantity: &'static str, value: f64, max: f64) -> Self {
        Self::OutOfRange { quantity, value, max, context: None }
    }
}
