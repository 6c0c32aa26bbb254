use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    /// Sensors fitted to a pipette model.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Sensors: u8 {
        const PRESSURE = 1 << 0;
        const CAPACITIVE = 1 << 1;
        const ENVIRONMENT = 1 << 2;

        const ALL = Self::PRESSURE.bits() | Self::CAPACITIVE.bits() | Self::ENVIRONMENT.bits();
    }
}

impl From<&str> for Sensors {
    fn from(s: &str) -> Self {
        match s {
            "pressure" => Self::PRESSURE,
            "capacitive" => Self::CAPACITIVE,
            "environment" => Self::ENVIRONMENT,
            "all" | "*" => Self::ALL,
            _ => Self::empty(),
        }
    }
}

impl Serialize for Sensors {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for Sensors {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u8::deserialize(deserializer)?;
        Ok(Self::from_bits_truncate(bits))
    }
}

/// Default plunger flow rates in µL/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRates {
    pub aspirate: f64,
    pub dispense: f64,
    pub blow_out: f64,
}

/// Static description of a pipette model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipetteDefinition {
    /// Load name, e.g. `flex_1channel_1000`.
    pub name: String,
    pub display_name: String,
    pub channels: u8,
    pub min_volume: f64,
    pub max_volume: f64,
    #[serde(default = "Sensors::empty")]
    pub sensors: Sensors,
    pub default_flow_rates: FlowRates,
    /// Tip rack load names this pipette may pick up from.
    pub compatible_tip_racks: Vec<String>,
}

/// Which nozzles take part in a pick-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "camelCase")]
pub enum NozzleLayout {
    #[default]
    Single,
    /// One column of nozzles; `tips` below 8 is a partial column.
    Column { tips: u8 },
    Full,
}

impl NozzleLayout {
    /// Number of tips consumed by one pick-up.
    #[must_use]
    pub const fn tip_count(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Column { tips } => tips as usize,
            Self::Full => crate::constants::TIPS_PER_RACK,
        }
    }

    /// Natural layout for a pipette with `channels` nozzles.
    #[must_use]
    pub const fn for_channels(channels: u8) -> Self {
        match channels {
            1 => Self::Single,
            96 => Self::Full,
            n => Self::Column { tips: n },
        }
    }
}
