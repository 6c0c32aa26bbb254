use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Liquid and trailing air gap held in a tip, in µL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidAndAirGapPair {
    pub liquid: f64,
    pub air_gap: f64,
}

impl LiquidAndAirGapPair {
    #[must_use]
    pub const fn new(liquid: f64, air_gap: f64) -> Self {
        Self { liquid, air_gap }
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.liquid + self.air_gap
    }
}

/// What the executor knows about the attached tip between transfer steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TipState {
    /// The plunger sits at its aspirate-ready position.
    pub ready_to_aspirate: bool,
    pub last_liquid_and_air_gap_in_tip: LiquidAndAirGapPair,
}

impl Default for TipState {
    fn default() -> Self {
        Self { ready_to_aspirate: true, last_liquid_and_air_gap_in_tip: LiquidAndAirGapPair::default() }
    }
}

impl TipState {
    #[must_use]
    pub const fn new(ready_to_aspirate: bool, contents: LiquidAndAirGapPair) -> Self {
        Self { ready_to_aspirate, last_liquid_and_air_gap_in_tip: contents }
    }

    pub fn append_liquid(&mut self, volume: f64) {
        self.last_liquid_and_air_gap_in_tip.liquid += volume;
    }

    pub fn delete_liquid(&mut self, volume: f64) {
        let liquid = &mut self.last_liquid_and_air_gap_in_tip.liquid;
        *liquid = (*liquid - volume).max(0.0);
    }

    pub fn append_air_gap(&mut self, volume: f64) {
        self.last_liquid_and_air_gap_in_tip.air_gap += volume;
    }

    pub fn delete_air_gap(&mut self) {
        self.last_liquid_and_air_gap_in_tip.air_gap = 0.0;
    }

    /// A blowout empties the tip and leaves the plunger at its bottom.
    pub fn blown_out(&mut self) {
        self.ready_to_aspirate = false;
        self.last_liquid_and_air_gap_in_tip = LiquidAndAirGapPair::default();
    }
}

/// Shape of the liquid movement a transfer component belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum TransferType {
    OneToOne,
    OneToMany,
    ManyToOne,
}

/// When a transfer picks up a fresh tip.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TipPolicy {
    /// One tip for the whole transfer.
    #[default]
    Once,
    /// A new tip for every aspirate.
    Always,
    /// A new tip whenever the source well changes.
    PerSource,
    /// A new tip whenever the destination well changes.
    PerDestination,
    /// Use the tip already attached and keep it.
    Never,
}

impl TipPolicy {
    /// Whether the last tip stays attached when the caller does not say.
    #[must_use]
    pub const fn keeps_last_tip_by_default(self) -> bool {
        matches!(self, Self::Never)
    }
}

/// A well on a loaded labware.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellRef {
    pub labware_id: String,
    pub well_name: String,
}

impl WellRef {
    #[must_use]
    pub fn new(labware_id: impl Into<String>, well_name: impl Into<String>) -> Self {
        Self { labware_id: labware_id.into(), well_name: well_name.into() }
    }
}

impl fmt::Display for WellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.well_name, self.labware_id)
    }
}

/// Where a dispense goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferTarget {
    Well(WellRef),
    /// The default trash bin.
    Trash,
}

impl TransferTarget {
    #[must_use]
    pub const fn well(&self) -> Option<&WellRef> {
        match self {
            Self::Well(well) => Some(well),
            Self::Trash => None,
        }
    }
}

impl From<WellRef> for TransferTarget {
    fn from(well: WellRef) -> Self {
        Self::Well(well)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn tip_policies_parse_from_kebab_case() {
        assert_eq!(TipPolicy::from_str("per-source").unwrap(), TipPolicy::PerSource);
        assert_eq!(TipPolicy::PerDestination.to_string(), "per-destination");
        assert!(TipPolicy::from_str("sometimes").is_err());
        let keeping: Vec<_> = TipPolicy::iter().filter(|p| p.keeps_last_tip_by_default()).collect();
        assert_eq!(keeping, vec![TipPolicy::Never]);
    }

    #[test]
    fn tip_state_bookkeeping() {
        let mut state = TipState::default();
        assert!(state.ready_to_aspirate);
        state.append_liquid(20.0);
        state.append_air_gap(1.5);
        assert_eq!(state.last_liquid_and_air_gap_in_tip.total(), 21.5);
        state.delete_air_gap();
        state.delete_liquid(25.0);
        assert_eq!(state.last_liquid_and_air_gap_in_tip, LiquidAndAirGapPair::default());
        state.append_liquid(3.0);
        state.blown_out();
        assert!(!state.ready_to_aspirate);
        assert_eq!(state.last_liquid_and_air_gap_in_tip.liquid, 0.0);
    }

    #[test]
    fn targets_serialize() {
        let target = TransferTarget::from(WellRef::new("labware-1", "A1"));
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["well"]["wellName"], "A1");
        assert_eq!(serde_json::to_value(TransferTarget::Trash).unwrap(), "trash");
    }
}
