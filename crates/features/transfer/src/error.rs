use aliq_liquid_classes::LiquidClassError;
use std::borrow::Cow;

/// Error types raised by the transfer executor and planners.
#[aliq_derive::aliq_error]
pub enum TransferError {
    #[error("Cannot dispense {volume}uL when the tip has only {available}uL.{}", format_context(.context))]
    DispenseExceedsTip { volume: f64, available: f64, context: Option<Cow<'static, str>> },

    #[error(
        "{location_type} location {location} is inside the liquid in well {well_name} when it should be above the liquid ({action}){}",
        format_context(.context)
    )]
    LocationInsideLiquid {
        location_type: &'static str,
        action: &'static str,
        location: String,
        well_name: String,
        context: Option<Cow<'static, str>>,
    },

    #[error("Sources and destinations should be of the same length: got {sources} and {destinations}{}", format_context(.context))]
    LengthMismatch { sources: usize, destinations: usize, context: Option<Cow<'static, str>> },

    #[error("Invalid transfer request: {message}{}", format_context(.context))]
    InvalidRequest { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Tip policy '{policy}' is not supported for {operation}{}", format_context(.context))]
    IncompatibleTipPolicy { policy: String, operation: &'static str, context: Option<Cow<'static, str>> },

    #[error("{volume}uL plus an air gap of {air_gap}uL does not fit in a {working_volume}uL tip{}", format_context(.context))]
    TipOverflow { volume: f64, air_gap: f64, working_volume: f64, context: Option<Cow<'static, str>> },

    #[error("Incompatible hardware/tip combination for this liquid class{}: {source}", format_context(.context))]
    IncompatibleLiquidClass { source: LiquidClassError, context: Option<Cow<'static, str>> },

    #[error("Internal transfer error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl TransferError {
    pub(crate) fn invalid_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidRequest { message: message.into(), context: None }
    }
}
