use aliq_domain::Mount;
use aliq_labware::LabwareError;
use aliq_liquid_classes::LiquidClassError;
use aliq_tips::TipError;
use aliq_transfer::TransferError;
use std::borrow::Cow;

/// Error types raised while running a protocol.
#[aliq_derive::aliq_error]
pub enum ProtocolError {
    #[error("No pipette loaded on the {mount} mount{}", format_context(.context))]
    PipetteNotAttached { mount: Mount, context: Option<Cow<'static, str>> },

    #[error("The {mount} mount already holds {pipette}{}", format_context(.context))]
    MountOccupied { mount: Mount, pipette: String, context: Option<Cow<'static, str>> },

    #[error("Unknown pipette model: {name}{}", format_context(.context))]
    UnknownPipette { name: String, context: Option<Cow<'static, str>> },

    #[error("Pipette {pipette} has no tip attached{}", format_context(.context))]
    TipNotAttached { pipette: String, context: Option<Cow<'static, str>> },

    #[error("Pipette {pipette} already has a tip attached{}", format_context(.context))]
    TipAlreadyAttached { pipette: String, context: Option<Cow<'static, str>> },

    #[error("No clean tips left for {pipette}{}", format_context(.context))]
    OutOfTips { pipette: String, context: Option<Cow<'static, str>> },

    #[error("Pipette {pipette} has no tip racks assigned{}", format_context(.context))]
    NoTipRacks { pipette: String, context: Option<Cow<'static, str>> },

    #[error("{labware_id} is not a tip rack{}", format_context(.context))]
    NotATipRack { labware_id: String, context: Option<Cow<'static, str>> },

    #[error("Tip rack {tip_rack} is not compatible with {pipette}{}", format_context(.context))]
    IncompatibleTip { pipette: String, tip_rack: String, context: Option<Cow<'static, str>> },

    #[error("Cannot hold {volume}uL in {pipette} (max {max_volume}uL with the current tip){}", format_context(.context))]
    VolumeExceedsCapacity { volume: f64, max_volume: f64, pipette: String, context: Option<Cow<'static, str>> },

    #[error("Pipette {pipette} is not ready to aspirate; prepare it above the liquid first{}", format_context(.context))]
    NotReadyToAspirate { pipette: String, context: Option<Cow<'static, str>> },

    #[error("Invalid volume {volume}uL{}: {message}", format_context(.context))]
    InvalidVolume { volume: f64, message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid delay of {seconds} seconds{}: must be zero or more", format_context(.context))]
    InvalidDelay { seconds: f64, context: Option<Cow<'static, str>> },

    #[error("Pressure sensor not available for {pipette}; liquid presence detection is unsupported{}", format_context(.context))]
    LiquidPresenceDetectionUnsupported { pipette: String, context: Option<Cow<'static, str>> },

    #[error("No trash bin loaded{}", format_context(.context))]
    NoTrashBin { context: Option<Cow<'static, str>> },

    #[error("Unknown {kind} '{name}' in protocol file{}", format_context(.context))]
    UnknownReference { kind: &'static str, name: String, context: Option<Cow<'static, str>> },

    #[error("Labware error{}: {source}", format_context(.context))]
    Labware { source: LabwareError, context: Option<Cow<'static, str>> },

    #[error("Tip tracking error{}: {source}", format_context(.context))]
    Tip { source: TipError, context: Option<Cow<'static, str>> },

    #[error("Liquid class error{}: {source}", format_context(.context))]
    LiquidClass { source: LiquidClassError, context: Option<Cow<'static, str>> },

    #[error("Transfer failed{}: {source}", format_context(.context))]
    Transfer { source: TransferError, context: Option<Cow<'static, str>> },

    #[error("Protocol file parse error{}: {source}", format_context(.context))]
    Parse { source: serde_json::Error, context: Option<Cow<'static, str>> },

    #[error("Protocol I/O error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Internal engine error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl ProtocolError {
    pub(crate) fn invalid_volume(volume: f64, message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidVolume { volume, message: message.into(), context: None }
    }

    pub(crate) fn unknown(kind: &'static str, name: impl Into<String>) -> Self {
        Self::UnknownReference { kind, name: name.into(), context: None }
    }
}
