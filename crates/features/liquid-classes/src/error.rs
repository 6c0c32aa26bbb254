use std::borrow::Cow;

/// Error types specific to the liquid class slice.
#[aliq_derive::aliq_error]
pub enum LiquidClassError {
    #[error("No properties found for {pipette} in {class} liquid class{}", format_context(.context))]
    NoPropertiesForPipette { pipette: String, class: String, context: Option<Cow<'static, str>> },

    #[error(
        "No properties found for {tip_rack} with {pipette} in {class} liquid class{}",
        format_context(.context)
    )]
    NoPropertiesForTipRack {
        tip_rack: String,
        pipette: String,
        class: String,
        context: Option<Cow<'static, str>>,
    },

    #[error("Liquid class definition not found: {name}{}", format_context(.context))]
    NotFound { name: String, context: Option<Cow<'static, str>> },

    #[error("Liquid class '{name}' is already defined{}", format_context(.context))]
    AlreadyDefined { name: String, context: Option<Cow<'static, str>> },

    /// A by-volume map was empty, malformed, or asked for a missing entry.
    #[error("Invalid volume map{}: {message}", format_context(.context))]
    VolumeMap { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A property value is out of its allowed range.
    #[error("Invalid liquid class property{}: {message}", format_context(.context))]
    InvalidProperty { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Liquid class definition parse error{}: {source}", format_context(.context))]
    Parse { source: serde_json::Error, context: Option<Cow<'static, str>> },

    #[error("Liquid class I/O error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Internal liquid class error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl LiquidClassError {
    pub(crate) fn volume_map(message: impl Into<Cow<'static, str>>) -> Self {
        Self::VolumeMap { message: message.into(), context: None }
    }

    pub(crate) fn invalid_property(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidProperty { message: message.into(), context: None }
    }
}
