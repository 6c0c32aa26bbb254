use std::borrow::Cow;

/// Error types specific to tip tracking.
#[aliq_derive::aliq_error]
pub enum TipError {
    #[error("{labware_id} is not a tracked tip rack{}", format_context(.context))]
    NotATipRack { labware_id: String, context: Option<Cow<'static, str>> },

    #[error("Tip {well_name} does not exist in {labware_id}{}", format_context(.context))]
    UnknownTip { well_name: String, labware_id: String, context: Option<Cow<'static, str>> },

    #[error("Cannot pick up {tips} tips at {well_name}: {reason}{}", format_context(.context))]
    InvalidPickUp { tips: usize, well_name: String, reason: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal tip tracking error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
