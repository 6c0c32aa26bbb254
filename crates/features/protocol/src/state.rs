use aliq_domain::pipette::{FlowRates, NozzleLayout, PipetteDefinition};
use aliq_domain::{Location, Mount};
use serde::Serialize;
use std::sync::Arc;

/// A tip on the end of a pipette and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedTip {
    pub rack_id: String,
    pub well_name: String,
    pub rack_uri: String,
    /// Capacity of the tip, µL.
    pub max_volume: f64,
}

/// A loaded pipette and everything the engine tracks about it.
#[derive(Debug, Clone)]
pub struct Pipette {
    pub id: String,
    pub mount: Mount,
    pub definition: Arc<PipetteDefinition>,
    pub nozzle_layout: NozzleLayout,
    /// Tip rack labware ids, in pick-up order.
    pub tip_racks: Vec<String>,
    pub tip: Option<AttachedTip>,
    /// Liquid plus air in the tip, µL.
    pub current_volume: f64,
    pub flow_rates: FlowRates,
    /// The plunger sits at its aspirate-ready position.
    pub ready_to_aspirate: bool,
    /// Aspirating from a tracked well with too little liquid is an error rather than a warning.
    pub liquid_presence_detection: bool,
    pub position: Option<Location>,
}

impl Pipette {
    pub(crate) fn new(id: String, mount: Mount, definition: Arc<PipetteDefinition>, tip_racks: Vec<String>) -> Self {
        Self {
            id,
            mount,
            nozzle_layout: NozzleLayout::for_channels(definition.channels),
            flow_rates: definition.default_flow_rates,
            definition,
            tip_racks,
            tip: None,
            current_volume: 0.0,
            ready_to_aspirate: false,
            liquid_presence_detection: false,
            position: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    #[must_use]
    pub const fn has_tip(&self) -> bool {
        self.tip.is_some()
    }

    /// Capacity with the attached tip; `None` without a tip.
    #[must_use]
    pub fn working_volume(&self) -> Option<f64> {
        self.tip.as_ref().map(|tip| self.working_volume_with(tip.max_volume))
    }

    /// Capacity with a tip of `tip_max_volume`.
    #[must_use]
    pub fn working_volume_with(&self, tip_max_volume: f64) -> f64 {
        tip_max_volume.min(self.definition.max_volume)
    }

    /// Room left in the attached tip.
    #[must_use]
    pub fn available_volume(&self) -> f64 {
        self.working_volume().map_or(0.0, |max| (max - self.current_volume).max(0.0))
    }
}

/// Liquid left in a well at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WellVolume {
    pub labware_id: String,
    pub well_name: String,
    pub volume: f64,
}
