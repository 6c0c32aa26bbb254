//! JSON protocol files.
//!
//! A protocol file declares the deck (labware, trash, pipettes, starting liquids)
//! and a list of steps. Labware and pipettes are referred to by the aliases the
//! file gives them; each step maps onto one [`ProtocolEngine`] operation.
//!
//! ```json
//! {
//!   "metadata": { "protocolName": "Plate fill" },
//!   "labware": [
//!     { "id": "tips", "loadName": "opentrons_flex_96_tiprack_50ul", "slot": "C1" },
//!     { "id": "reservoir", "loadName": "nest_12_reservoir_15ml", "slot": "D1" },
//!     { "id": "plate", "loadName": "nest_96_wellplate_200ul_flat", "slot": "D2" }
//!   ],
//!   "pipettes": [{ "id": "p50", "name": "flex_1channel_50", "mount": "left", "tipRacks": ["tips"] }],
//!   "liquids": [{ "labware": "reservoir", "wells": ["A1"], "volume": 10000 }],
//!   "steps": [
//!     { "step": "transfer", "pipette": "p50", "liquidClass": "water", "volume": 20,
//!       "sources": [{ "labware": "reservoir", "well": "A1" }],
//!       "destinations": [{ "labware": "plate", "well": "A1" }] }
//!   ]
//! }
//! ```

use crate::engine::ProtocolEngine;
use crate::error::{ProtocolError, ProtocolErrorExt, Result};
use aliq_domain::{DeckSlotName, Mount};
use aliq_transfer::{TipPolicy, TransferRequest, TransferTarget, WellRef};
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use strum_macros::AsRefStr;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolFile {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub labware: Vec<LabwareSpec>,
    /// Slot of an explicit trash bin; one is loaded on demand otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trash: Option<DeckSlotName>,
    #[serde(default)]
    pub pipettes: Vec<PipetteSpec>,
    #[serde(default)]
    pub liquids: Vec<LiquidSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default)]
    pub protocol_name: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabwareSpec {
    pub id: String,
    pub load_name: String,
    pub slot: DeckSlotName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipetteSpec {
    pub id: String,
    pub name: String,
    pub mount: Mount,
    #[serde(default)]
    pub tip_racks: Vec<String>,
    /// Overrides the robot's liquid presence detection setting for this pipette.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquid_presence_detection: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidSpec {
    pub labware: String,
    pub wells: Vec<String>,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellSpec {
    pub labware: String,
    pub well: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrashKeyword {
    Trash,
}

/// A dispense target: a well, or the literal `"trash"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetSpec {
    Trash(TrashKeyword),
    Well(WellSpec),
}

/// Shared parameters of the liquid-class transfer steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStep {
    pub pipette: String,
    pub liquid_class: String,
    pub volume: f64,
    pub sources: Vec<WellSpec>,
    pub destinations: Vec<TargetSpec>,
    #[serde(default)]
    pub new_tip: TipPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_last_tip: Option<bool>,
    #[serde(default)]
    pub return_tip: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, AsRefStr)]
#[serde(tag = "step", rename_all = "camelCase", rename_all_fields = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Step {
    PickUpTip {
        pipette: String,
        #[serde(default)]
        location: Option<WellSpec>,
    },
    DropTip { pipette: String },
    ReturnTip { pipette: String },
    ResetTips { labware: String },
    Aspirate {
        pipette: String,
        well: WellSpec,
        volume: f64,
        #[serde(default)]
        flow_rate: Option<f64>,
    },
    Dispense {
        pipette: String,
        target: TargetSpec,
        #[serde(default)]
        volume: Option<f64>,
        #[serde(default)]
        flow_rate: Option<f64>,
        #[serde(default)]
        push_out: Option<f64>,
    },
    PressureDispense {
        pipette: String,
        well: WellSpec,
        #[serde(default)]
        volume: Option<f64>,
        #[serde(default)]
        flow_rate: Option<f64>,
    },
    BlowOut { pipette: String, target: TargetSpec },
    TouchTip {
        pipette: String,
        well: WellSpec,
        #[serde(default)]
        v_offset: Option<f64>,
        #[serde(default)]
        speed: Option<f64>,
    },
    AirGap { pipette: String, volume: f64 },
    Mix { pipette: String, well: WellSpec, repetitions: u32, volume: f64 },
    Delay {
        seconds: f64,
        #[serde(default)]
        message: Option<String>,
    },
    Comment { message: String },
    Transfer(TransferStep),
    Distribute(TransferStep),
    Consolidate(TransferStep),
}

impl ProtocolFile {
    /// # Errors
    /// Returns [`ProtocolError::Parse`] for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// # Errors
    /// I/O and parse failures, with the path attached.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).context(format!("reading {}", path.display()))?;
        serde_json::from_str(&json).context(format!("parsing {}", path.display()))
    }
}

/// Sets up the deck described by `protocol` and runs its steps in order.
///
/// # Errors
/// The first failing setup entry or step, with its position attached as context.
pub fn run_protocol(engine: &mut ProtocolEngine, protocol: &ProtocolFile) -> Result<()> {
    let name = protocol.metadata.protocol_name.as_deref().unwrap_or("unnamed protocol");
    info!(protocol = name, steps = protocol.steps.len(), "Running protocol");

    let mut runner = Runner { engine, labware: FxHashMap::default(), pipettes: FxHashMap::default() };
    runner.set_up(protocol)?;
    for (index, step) in protocol.steps.iter().enumerate() {
        runner.run_step(step).context(format!("step {} ({})", index + 1, step.as_ref()))?;
    }
    info!(protocol = name, commands = runner.engine.commands().len(), "Protocol complete");
    Ok(())
}

struct Runner<'e> {
    engine: &'e mut ProtocolEngine,
    /// File alias to engine labware id.
    labware: FxHashMap<String, String>,
    pipettes: FxHashMap<String, Mount>,
}

impl Runner<'_> {
    fn set_up(&mut self, protocol: &ProtocolFile) -> Result<()> {
        for spec in &protocol.labware {
            let id = self.engine.load_labware(&spec.load_name, spec.slot).context(format!("labware '{}'", spec.id))?;
            self.labware.insert(spec.id.clone(), id);
        }
        if let Some(slot) = protocol.trash {
            self.engine.load_trash_bin(slot)?;
        }
        for spec in &protocol.pipettes {
            let tip_racks = spec.tip_racks.iter().map(|alias| self.labware_id(alias)).collect::<Result<Vec<_>>>()?;
            self.engine
                .load_instrument(&spec.name, spec.mount, &tip_racks)
                .context(format!("pipette '{}'", spec.id))?;
            if let Some(enabled) = spec.liquid_presence_detection {
                self.engine
                    .set_liquid_presence_detection(spec.mount, enabled)
                    .context(format!("pipette '{}'", spec.id))?;
            }
            self.pipettes.insert(spec.id.clone(), spec.mount);
        }
        for spec in &protocol.liquids {
            let labware_id = self.labware_id(&spec.labware)?;
            for well in &spec.wells {
                self.engine
                    .load_liquid(&labware_id, well, spec.volume)
                    .context(format!("liquid in {well} of '{}'", spec.labware))?;
            }
        }
        Ok(())
    }

    fn run_step(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::PickUpTip { pipette, location } => {
                let mount = self.mount(pipette)?;
                let location = location.as_ref().map(|spec| self.well(spec)).transpose()?;
                self.engine.pick_up_tip(mount, location.as_ref())
            },
            Step::DropTip { pipette } => self.engine.drop_tip(self.mount(pipette)?),
            Step::ReturnTip { pipette } => self.engine.return_tip(self.mount(pipette)?),
            Step::ResetTips { labware } => {
                let rack_id = self.labware_id(labware)?;
                self.engine.reset_tips(&rack_id)
            },
            Step::Aspirate { pipette, well, volume, flow_rate } => {
                let well = self.well(well)?;
                self.engine.aspirate(self.mount(pipette)?, &well, *volume, *flow_rate)
            },
            Step::Dispense { pipette, target, volume, flow_rate, push_out } => {
                let target = self.target(target)?;
                self.engine.dispense(self.mount(pipette)?, &target, *volume, *flow_rate, *push_out)
            },
            Step::PressureDispense { pipette, well, volume, flow_rate } => {
                let well = self.well(well)?;
                self.engine.pressure_dispense(self.mount(pipette)?, &well, *volume, *flow_rate)
            },
            Step::BlowOut { pipette, target } => {
                let target = self.target(target)?;
                self.engine.blow_out(self.mount(pipette)?, &target)
            },
            Step::TouchTip { pipette, well, v_offset, speed } => {
                let well = self.well(well)?;
                self.engine.touch_tip(self.mount(pipette)?, &well, *v_offset, *speed)
            },
            Step::AirGap { pipette, volume } => self.engine.air_gap(self.mount(pipette)?, *volume),
            Step::Mix { pipette, well, repetitions, volume } => {
                let well = self.well(well)?;
                self.engine.mix(self.mount(pipette)?, *repetitions, *volume, &well)
            },
            Step::Delay { seconds, message } => self.engine.delay(*seconds, message.clone()),
            Step::Comment { message } => {
                self.engine.comment(message.clone());
                Ok(())
            },
            Step::Transfer(params) => {
                let (mount, request) = self.transfer_request(params)?;
                let class = self.engine.get_liquid_class(&params.liquid_class)?;
                self.engine.transfer_with_liquid_class(mount, &class, &request)
            },
            Step::Distribute(params) => {
                let (mount, request) = self.transfer_request(params)?;
                let class = self.engine.get_liquid_class(&params.liquid_class)?;
                self.engine.distribute_with_liquid_class(mount, &class, &request)
            },
            Step::Consolidate(params) => {
                let (mount, request) = self.transfer_request(params)?;
                let class = self.engine.get_liquid_class(&params.liquid_class)?;
                self.engine.consolidate_with_liquid_class(mount, &class, &request)
            },
        }
    }

    fn transfer_request(&self, params: &TransferStep) -> Result<(Mount, TransferRequest)> {
        let sources = params.sources.iter().map(|spec| self.well(spec)).collect::<Result<Vec<_>>>()?;
        let destinations = params.destinations.iter().map(|spec| self.target(spec)).collect::<Result<Vec<_>>>()?;
        let request = TransferRequest {
            volume: params.volume,
            sources,
            destinations,
            new_tip: params.new_tip,
            keep_last_tip: params.keep_last_tip,
            return_tip: params.return_tip,
        };
        Ok((self.mount(&params.pipette)?, request))
    }

    fn mount(&self, alias: &str) -> Result<Mount> {
        self.pipettes.get(alias).copied().ok_or_else(|| ProtocolError::unknown("pipette", alias))
    }

    fn labware_id(&self, alias: &str) -> Result<String> {
        self.labware.get(alias).cloned().ok_or_else(|| ProtocolError::unknown("labware", alias))
    }

    fn well(&self, spec: &WellSpec) -> Result<WellRef> {
        Ok(WellRef::new(self.labware_id(&spec.labware)?, spec.well.clone()))
    }

    fn target(&self, spec: &TargetSpec) -> Result<TransferTarget> {
        match spec {
            TargetSpec::Trash(_) => Ok(TransferTarget::Trash),
            TargetSpec::Well(well) => self.well(well).map(TransferTarget::Well),
        }
    }
}
