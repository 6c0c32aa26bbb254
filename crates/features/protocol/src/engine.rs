//! The simulated protocol engine.
//!
//! [`ProtocolEngine`] owns the deck, definitions, liquid and tip tracking, the loaded
//! pipettes and the command log. Public methods are the protocol-level operations;
//! the plunger and motion primitives below them are shared with
//! [`EngineInstrument`](crate::instrument::EngineInstrument), which drives
//! liquid-class transfers.

use crate::command::Command;
use crate::error::{ProtocolError, ProtocolErrorExt, Result};
use crate::instrument::EngineInstrument;
use crate::pipettes;
use crate::state::{AttachedTip, Pipette, WellVolume};
use aliq_domain::config::{DefinitionsConfig, RobotConfig, SimConfig};
use aliq_domain::pipette::{NozzleLayout, PipetteDefinition, Sensors};
use aliq_domain::{DeckSlotName, Location, LocationTarget, Mount};
use aliq_labware::{Deck, Labware, LabwareError, LabwareLibrary, WellLiquids};
use aliq_liquid_classes::{ByTipRack, LiquidClass, LiquidClassRegistry};
use aliq_tips::TipTracker;
use aliq_transfer::{TransferRequest, TransferTarget, WellRef};
use fxhash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

/// Height above the well bottom for manual aspirate and dispense, mm.
const WELL_BOTTOM_CLEARANCE: f64 = 1.0;
/// Manual touch tip defaults.
const TOUCH_TIP_V_OFFSET: f64 = -1.0;
const TOUCH_TIP_SPEED: f64 = 60.0;
const VOLUME_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct EngineConfig {
    #[builder(default)]
    pub robot: RobotConfig,
    #[builder(default)]
    pub definitions: DefinitionsConfig,
}

impl From<&SimConfig> for EngineConfig {
    fn from(config: &SimConfig) -> Self {
        Self { robot: config.robot.clone(), definitions: config.definitions.clone() }
    }
}

#[derive(Debug)]
pub struct ProtocolEngine {
    pub(crate) robot: RobotConfig,
    library: LabwareLibrary,
    liquid_classes: LiquidClassRegistry,
    pub(crate) deck: Deck,
    pub(crate) liquids: WellLiquids,
    tips: TipTracker,
    pub(crate) pipettes: FxHashMap<Mount, Pipette>,
    commands: Vec<Command>,
}

impl ProtocolEngine {
    /// Creates an engine with the built-in definitions plus any configured
    /// definition directories.
    ///
    /// # Errors
    /// Fails when a custom labware or liquid class definition cannot be loaded.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let mut library = LabwareLibrary::with_builtins()?;
        let mut liquid_classes = LiquidClassRegistry::with_builtins()?;
        if let Some(dir) = &config.definitions.labware_dir {
            library.load_dir(dir)?;
        }
        if let Some(dir) = &config.definitions.liquid_class_dir {
            liquid_classes.load_dir(dir)?;
        }

        Ok(Self {
            robot: config.robot,
            library,
            liquid_classes,
            deck: Deck::new(),
            liquids: WellLiquids::new(),
            tips: TipTracker::new(),
            pipettes: FxHashMap::default(),
            commands: Vec::new(),
        })
    }

    // --- setup ---

    /// Places a built-in or custom labware and returns its id. Tip racks start
    /// with every tip clean.
    ///
    /// # Errors
    /// Unknown definitions and occupied slots.
    pub fn load_labware(&mut self, load_name: &str, slot: DeckSlotName) -> Result<String> {
        let definition = self.library.get(load_name, None, None)?;
        let labware_id = self.deck.load(Arc::clone(&definition), slot)?;
        if definition.is_tiprack() {
            self.tips.register(labware_id.clone(), definition.ordering.clone());
        }
        self.record(Command::LoadLabware { labware_id: labware_id.clone(), load_name: load_name.to_owned(), slot });
        Ok(labware_id)
    }

    /// # Errors
    /// Returns [`ProtocolError::Labware`] for an occupied slot.
    pub fn load_trash_bin(&mut self, slot: DeckSlotName) -> Result<String> {
        let trash_id = self.deck.load_trash_bin(slot)?;
        self.record(Command::LoadTrashBin { trash_id: trash_id.clone(), slot });
        Ok(trash_id)
    }

    /// Loads a built-in pipette model on `mount` with the tip racks it will pick up from.
    ///
    /// # Errors
    /// [`ProtocolError::MountOccupied`], [`ProtocolError::UnknownPipette`],
    /// [`ProtocolError::NotATipRack`] and [`ProtocolError::IncompatibleTip`].
    pub fn load_instrument(&mut self, name: &str, mount: Mount, tip_racks: &[String]) -> Result<String> {
        let definition = pipettes::definition(name)?;
        self.load_instrument_definition(definition, mount, tip_racks)
    }

    /// Loads a pipette from its definition.
    ///
    /// Liquid presence detection follows the robot setting on pipettes with a pressure
    /// sensor and stays off on pipettes without one.
    ///
    /// # Errors
    /// Same as [`ProtocolEngine::load_instrument`].
    pub fn load_instrument_definition(
        &mut self,
        definition: Arc<PipetteDefinition>,
        mount: Mount,
        tip_racks: &[String],
    ) -> Result<String> {
        if let Some(loaded) = self.pipettes.get(&mount) {
            return Err(ProtocolError::MountOccupied { mount, pipette: loaded.name().to_owned(), context: None });
        }
        for rack_id in tip_racks {
            self.check_tip_rack(&definition, rack_id)?;
        }

        let name = definition.name.clone();
        let pressure_sensor = definition.sensors.contains(Sensors::PRESSURE);
        if self.robot.liquid_presence_detection && !pressure_sensor {
            warn!(pipette = %name, "No pressure sensor, liquid presence detection stays off");
        }

        let pipette_id = aliq_kernel::prefixed_id!("pipette");
        info!(%pipette_id, pipette = %name, %mount, tip_racks = tip_racks.len(), "Pipette loaded");
        let mut pipette = Pipette::new(pipette_id.clone(), mount, definition, tip_racks.to_vec());
        pipette.liquid_presence_detection = self.robot.liquid_presence_detection && pressure_sensor;
        self.pipettes.insert(mount, pipette);
        self.record(Command::LoadPipette { pipette_id: pipette_id.clone(), pipette_name: name, mount });
        Ok(pipette_id)
    }

    /// Turns liquid presence detection on or off for one pipette.
    ///
    /// # Errors
    /// [`ProtocolError::LiquidPresenceDetectionUnsupported`] when enabling it on a pipette
    /// without a pressure sensor.
    pub fn set_liquid_presence_detection(&mut self, mount: Mount, enabled: bool) -> Result<()> {
        let pipette = self.pipette_mut(mount)?;
        if enabled && !pipette.definition.sensors.contains(Sensors::PRESSURE) {
            return Err(ProtocolError::LiquidPresenceDetectionUnsupported {
                pipette: pipette.name().to_owned(),
                context: None,
            });
        }
        pipette.liquid_presence_detection = enabled;
        Ok(())
    }

    /// Sets the starting volume of a well.
    ///
    /// # Errors
    /// Unknown labware or well, or a volume above the well's capacity.
    pub fn load_liquid(&mut self, labware_id: &str, well_name: &str, volume: f64) -> Result<()> {
        if !volume.is_finite() || volume < 0.0 {
            return Err(ProtocolError::invalid_volume(volume, "liquid volume must be zero or positive"));
        }
        let labware = self.deck.labware(labware_id)?;
        self.liquids.load_liquid(labware, well_name, volume)?;
        self.record(Command::LoadLiquid {
            labware_id: labware_id.to_owned(),
            well_name: well_name.to_owned(),
            volume,
        });
        Ok(())
    }

    /// # Errors
    /// Returns [`ProtocolError::LiquidClass`] for an unknown name.
    pub fn get_liquid_class(&self, name: &str) -> Result<Arc<LiquidClass>> {
        Ok(self.liquid_classes.get(name)?)
    }

    /// Registers a custom liquid class for this run.
    ///
    /// # Errors
    /// Returns [`ProtocolError::LiquidClass`] if the name is taken.
    pub fn define_liquid_class(
        &mut self,
        name: &str,
        display_name: &str,
        properties: FxHashMap<String, ByTipRack>,
    ) -> Result<Arc<LiquidClass>> {
        let class = self.liquid_classes.define(name, display_name, properties)?;
        info!(name, "Liquid class defined");
        Ok(class)
    }

    // --- tips ---

    /// Picks up a tip at `location`, or the next clean tip from the pipette's racks.
    ///
    /// # Errors
    /// [`ProtocolError::TipAlreadyAttached`], [`ProtocolError::NoTipRacks`],
    /// [`ProtocolError::OutOfTips`], or an invalid pick-up location.
    pub fn pick_up_tip(&mut self, mount: Mount, location: Option<&WellRef>) -> Result<()> {
        let pipette = self.pipette_ref(mount)?;
        if pipette.has_tip() {
            return Err(ProtocolError::TipAlreadyAttached { pipette: pipette.name().to_owned(), context: None });
        }
        let layout = pipette.nozzle_layout;
        let definition = Arc::clone(&pipette.definition);
        let pipette_id = pipette.id.clone();

        let (rack_id, well_name) = match location {
            Some(well) => {
                self.check_tip_rack(&definition, &well.labware_id)?;
                if !self.tips.has_clean_tip(&well.labware_id, &well.well_name) {
                    warn!(rack = %well.labware_id, well = %well.well_name, "Picking up a used tip");
                }
                (well.labware_id.clone(), well.well_name.clone())
            },
            None => self.next_tip(mount)?,
        };

        let used = self.tips.tips_to_mark_used(&rack_id, &well_name, layout)?;
        self.tips.mark_used(&rack_id, used)?;

        let rack = self.deck.labware(&rack_id)?;
        let tip = AttachedTip {
            rack_id: rack_id.clone(),
            well_name: well_name.clone(),
            rack_uri: rack.uri(),
            max_volume: rack.well(&well_name)?.total_liquid_volume,
        };
        let position = rack.well_location(&well_name, rack.well_top(&well_name, 0.0)?)?;

        let pipette = self.pipette_mut(mount)?;
        pipette.tip = Some(tip);
        pipette.current_volume = 0.0;
        pipette.ready_to_aspirate = false;
        pipette.position = Some(position);
        self.record(Command::PickUpTip { pipette_id, labware_id: rack_id, well_name });
        Ok(())
    }

    /// Drops the tip into the default trash bin, loading one if the deck has none.
    ///
    /// # Errors
    /// [`ProtocolError::TipNotAttached`], or a trash slot that is already taken.
    pub fn drop_tip(&mut self, mount: Mount) -> Result<()> {
        self.require_tip(mount)?;
        let location = self.ensure_trash()?;
        let pipette = self.pipette_mut(mount)?;
        let pipette_id = pipette.id.clone();
        detach_tip(pipette, location.clone());
        self.record(Command::DropTip { pipette_id, location });
        Ok(())
    }

    /// Puts the tip back where it was picked up. The tip stays marked as used.
    ///
    /// # Errors
    /// Returns [`ProtocolError::TipNotAttached`].
    pub fn return_tip(&mut self, mount: Mount) -> Result<()> {
        let tip = self.require_tip(mount)?.clone();
        let rack = self.deck.labware(&tip.rack_id)?;
        let location = rack.well_location(&tip.well_name, rack.well_top(&tip.well_name, 0.0)?)?;
        let pipette = self.pipette_mut(mount)?;
        let pipette_id = pipette.id.clone();
        detach_tip(pipette, location);
        self.record(Command::ReturnTip { pipette_id, labware_id: tip.rack_id, well_name: tip.well_name });
        Ok(())
    }

    /// Marks every tip of a rack clean again.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Tip`] for labware that is not a tip rack.
    pub fn reset_tips(&mut self, rack_id: &str) -> Result<()> {
        self.tips.reset(rack_id)?;
        info!(rack_id, "Tip rack reset");
        Ok(())
    }

    // --- manual pipetting ---

    /// Aspirates 1 mm above the bottom of `well`, arming the plunger above the
    /// well first when needed.
    ///
    /// # Errors
    /// Missing tip, a volume the tip cannot hold, or too little liquid in the well.
    pub fn aspirate(&mut self, mount: Mount, well: &WellRef, volume: f64, flow_rate: Option<f64>) -> Result<()> {
        check_positive(volume)?;
        let pipette = self.require_tip_pipette(mount)?;
        let flow_rate = flow_rate.unwrap_or(pipette.flow_rates.aspirate);
        if !pipette.ready_to_aspirate {
            let top = self.well_location(well, WellPosition::Top(0.0))?;
            self.move_pipette(mount, top, false, None)?;
            self.prepare_to_aspirate(mount)?;
        }
        let location = self.well_location(well, WellPosition::Bottom(WELL_BOTTOM_CLEARANCE))?;
        self.move_pipette(mount, location.clone(), false, None)?;
        self.aspirate_in_place(mount, &location, volume, flow_rate, 0.0)
    }

    /// Dispenses `volume` (everything in the tip when `None`) into a well or the trash.
    ///
    /// # Errors
    /// Missing tip, or more than the tip holds.
    pub fn dispense(
        &mut self,
        mount: Mount,
        target: &TransferTarget,
        volume: Option<f64>,
        flow_rate: Option<f64>,
        push_out: Option<f64>,
    ) -> Result<()> {
        let pipette = self.require_tip_pipette(mount)?;
        let volume = volume.unwrap_or(pipette.current_volume);
        let flow_rate = flow_rate.unwrap_or(pipette.flow_rates.dispense);
        let location = match target {
            TransferTarget::Well(well) => self.well_location(well, WellPosition::Bottom(WELL_BOTTOM_CLEARANCE))?,
            TransferTarget::Trash => self.ensure_trash()?,
        };
        self.move_pipette(mount, location.clone(), false, None)?;
        self.dispense_in_place(mount, &location, volume, flow_rate, push_out.unwrap_or(0.0), 0.0)
    }

    /// Blows out at the top of a well or over the trash.
    ///
    /// # Errors
    /// Returns [`ProtocolError::TipNotAttached`].
    pub fn blow_out(&mut self, mount: Mount, target: &TransferTarget) -> Result<()> {
        self.require_tip(mount)?;
        let location = match target {
            TransferTarget::Well(well) => self.well_location(well, WellPosition::Top(0.0))?,
            TransferTarget::Trash => self.ensure_trash()?,
        };
        self.move_pipette(mount, location.clone(), false, None)?;
        self.blow_out_in_place(mount, &location)
    }

    /// Pushes `volume` (everything in the tip when `None`) out from the top of `well`
    /// under pressure. The plunger ends at the bottom, so the next aspirate prepares first.
    ///
    /// # Errors
    /// Missing tip, or more than the tip holds.
    pub fn pressure_dispense(
        &mut self,
        mount: Mount,
        well: &WellRef,
        volume: Option<f64>,
        flow_rate: Option<f64>,
    ) -> Result<()> {
        let pipette = self.require_tip_pipette(mount)?;
        let volume = volume.unwrap_or(pipette.current_volume);
        let flow_rate = flow_rate.unwrap_or(pipette.flow_rates.dispense);
        let location = self.well_location(well, WellPosition::Top(0.0))?;
        self.move_pipette(mount, location.clone(), false, None)?;

        let pipette_id = self.expel_liquid(mount, &location, volume)?;
        self.pipette_mut(mount)?.ready_to_aspirate = false;
        self.record(Command::PressureDispense { pipette_id, location, volume, flow_rate });
        Ok(())
    }

    /// Touches the tip against the walls of `well`, `v_offset` mm from its top.
    ///
    /// # Errors
    /// Returns [`ProtocolError::TipNotAttached`].
    pub fn touch_tip(&mut self, mount: Mount, well: &WellRef, v_offset: Option<f64>, speed: Option<f64>) -> Result<()> {
        self.require_tip(mount)?;
        let z_offset = v_offset.unwrap_or(TOUCH_TIP_V_OFFSET);
        let location = self.well_location(well, WellPosition::Top(z_offset))?;
        self.move_pipette(mount, location.clone(), false, None)?;
        let radius = self.robot.touch_tip_radius;
        self.touch_tip_at(mount, &location, well, radius, z_offset, speed.unwrap_or(TOUCH_TIP_SPEED))
    }

    /// Draws air into the tip where it is.
    ///
    /// # Errors
    /// Missing tip, or a gap the tip cannot hold.
    pub fn air_gap(&mut self, mount: Mount, volume: f64) -> Result<()> {
        check_positive(volume)?;
        let flow_rate = self.require_tip_pipette(mount)?.flow_rates.aspirate;
        self.air_gap_in_place(mount, volume, flow_rate, 0.0)
    }

    /// Aspirates and dispenses `volume` in `well` `repetitions` times.
    ///
    /// # Errors
    /// Same as [`ProtocolEngine::aspirate`].
    pub fn mix(&mut self, mount: Mount, repetitions: u32, volume: f64, well: &WellRef) -> Result<()> {
        let target = TransferTarget::Well(well.clone());
        for _ in 0..repetitions {
            self.aspirate(mount, well, volume, None)?;
            self.dispense(mount, &target, Some(volume), None, Some(0.0))?;
        }
        Ok(())
    }

    /// # Errors
    /// Returns [`ProtocolError::PipetteNotAttached`].
    pub fn move_to(&mut self, mount: Mount, location: Location) -> Result<()> {
        self.move_pipette(mount, location, false, None)
    }

    /// # Errors
    /// [`ProtocolError::InvalidDelay`] for a negative or non-finite duration.
    pub fn delay(&mut self, seconds: f64, message: Option<String>) -> Result<()> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(ProtocolError::InvalidDelay { seconds, context: None });
        }
        self.record(Command::WaitForDuration { seconds, message });
        Ok(())
    }

    pub fn comment(&mut self, message: impl Into<String>) {
        self.record(Command::Comment { message: message.into() });
    }

    // --- liquid-class transfers ---

    /// One-to-one transfers driven by `liquid_class`.
    ///
    /// # Errors
    /// Request, tip and liquid tracking failures, wrapped in [`ProtocolError::Transfer`]
    /// where they come from the transfer logic.
    pub fn transfer_with_liquid_class(
        &mut self,
        mount: Mount,
        liquid_class: &LiquidClass,
        request: &TransferRequest,
    ) -> Result<()> {
        self.with_instrument(mount, |core| aliq_transfer::transfer_with_liquid_class(core, liquid_class, request))
    }

    /// One source to many destinations, multi-dispensing when the class allows it.
    ///
    /// # Errors
    /// Same as [`ProtocolEngine::transfer_with_liquid_class`].
    pub fn distribute_with_liquid_class(
        &mut self,
        mount: Mount,
        liquid_class: &LiquidClass,
        request: &TransferRequest,
    ) -> Result<()> {
        self.with_instrument(mount, |core| aliq_transfer::distribute_with_liquid_class(core, liquid_class, request))
    }

    /// Many sources into one destination.
    ///
    /// # Errors
    /// Same as [`ProtocolEngine::transfer_with_liquid_class`].
    pub fn consolidate_with_liquid_class(
        &mut self,
        mount: Mount,
        liquid_class: &LiquidClass,
        request: &TransferRequest,
    ) -> Result<()> {
        self.with_instrument(mount, |core| aliq_transfer::consolidate_with_liquid_class(core, liquid_class, request))
    }

    fn with_instrument<F>(&mut self, mount: Mount, run: F) -> Result<()>
    where
        F: FnOnce(&mut EngineInstrument<'_>) -> Result<()>,
    {
        let pipette = self.pipette_ref(mount)?;
        let name = pipette.name().to_owned();
        let flow_rates = pipette.flow_rates;
        self.ensure_trash()?;

        let result = run(&mut EngineInstrument::new(self, mount, name));
        // liquid classes override the blowout flow rate only for their own transfer
        if let Some(pipette) = self.pipettes.get_mut(&mount) {
            pipette.flow_rates = flow_rates;
        }
        result
    }

    // --- queries ---

    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[must_use]
    pub fn pipette(&self, mount: Mount) -> Option<&Pipette> {
        self.pipettes.get(&mount)
    }

    #[must_use]
    pub fn well_volume(&self, labware_id: &str, well_name: &str) -> f64 {
        self.liquids.volume(labware_id, well_name)
    }

    /// Tips used across every tip rack on the deck.
    #[must_use]
    pub fn tips_used(&self) -> usize {
        self.deck
            .all_labware()
            .into_iter()
            .filter(|labware| labware.definition.is_tiprack())
            .map(|labware| self.tips.used_count(&labware.id))
            .sum()
    }

    /// Volumes of every well with tracked liquid, ordered by slot and well.
    #[must_use]
    pub fn liquid_remaining(&self) -> Vec<WellVolume> {
        self.deck
            .all_labware()
            .into_iter()
            .flat_map(|labware| {
                labware
                    .definition
                    .wells_in_order()
                    .filter(|well| self.liquids.is_tracked(&labware.id, well))
                    .map(|well| WellVolume {
                        labware_id: labware.id.clone(),
                        well_name: well.to_owned(),
                        volume: self.liquids.volume(&labware.id, well),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[must_use]
    pub const fn deck(&self) -> &Deck {
        &self.deck
    }

    #[must_use]
    pub const fn labware_library(&self) -> &LabwareLibrary {
        &self.library
    }

    #[must_use]
    pub const fn liquid_classes(&self) -> &LiquidClassRegistry {
        &self.liquid_classes
    }

    // --- primitives shared with the transfer instrument ---

    pub(crate) fn move_pipette(
        &mut self,
        mount: Mount,
        location: Location,
        force_direct: bool,
        speed: Option<f64>,
    ) -> Result<()> {
        let pipette = self.pipette_mut(mount)?;
        pipette.position = Some(location.clone());
        let pipette_id = pipette.id.clone();
        self.record(Command::MoveTo { pipette_id, location, force_direct, speed });
        Ok(())
    }

    /// Draws liquid at the current position and takes it out of the wells under the nozzles.
    pub(crate) fn aspirate_in_place(
        &mut self,
        mount: Mount,
        location: &Location,
        volume: f64,
        flow_rate: f64,
        correction_volume: f64,
    ) -> Result<()> {
        let pipette_id = self.draw_liquid(mount, location, volume)?;
        self.record(Command::Aspirate {
            pipette_id,
            location: location.clone(),
            volume,
            flow_rate,
            correction_volume,
        });
        Ok(())
    }

    /// Aspirates while the tip follows the falling meniscus from `start` to `end`.
    pub(crate) fn aspirate_while_tracking(
        &mut self,
        mount: Mount,
        start: &Location,
        end: &Location,
        volume: f64,
        flow_rate: f64,
        correction_volume: f64,
    ) -> Result<()> {
        let pipette_id = self.draw_liquid(mount, start, volume)?;
        self.pipette_mut(mount)?.position = Some(end.clone());
        self.record(Command::AspirateWhileTracking {
            pipette_id,
            location: start.clone(),
            end_location: end.clone(),
            volume,
            flow_rate,
            correction_volume,
        });
        Ok(())
    }

    /// Expels liquid at the current position into the wells (or trash) under the tip.
    pub(crate) fn dispense_in_place(
        &mut self,
        mount: Mount,
        location: &Location,
        volume: f64,
        flow_rate: f64,
        push_out: f64,
        correction_volume: f64,
    ) -> Result<()> {
        let pipette_id = self.expel_liquid(mount, location, volume)?;
        if push_out > 0.0 {
            self.pipette_mut(mount)?.ready_to_aspirate = false;
        }
        self.record(Command::Dispense {
            pipette_id,
            location: location.clone(),
            volume,
            flow_rate,
            push_out,
            correction_volume,
        });
        Ok(())
    }

    /// Dispenses while the tip rises with the meniscus from `start` to `end`.
    pub(crate) fn dispense_while_tracking(
        &mut self,
        mount: Mount,
        start: &Location,
        end: &Location,
        volume: f64,
        flow_rate: f64,
        push_out: f64,
        correction_volume: f64,
    ) -> Result<()> {
        let pipette_id = self.expel_liquid(mount, start, volume)?;
        let pipette = self.pipette_mut(mount)?;
        pipette.position = Some(end.clone());
        if push_out > 0.0 {
            pipette.ready_to_aspirate = false;
        }
        self.record(Command::DispenseWhileTracking {
            pipette_id,
            location: start.clone(),
            end_location: end.clone(),
            volume,
            flow_rate,
            push_out,
            correction_volume,
        });
        Ok(())
    }

    pub(crate) fn remove_air_gap(
        &mut self,
        mount: Mount,
        volume: f64,
        flow_rate: f64,
        correction_volume: f64,
    ) -> Result<()> {
        self.require_tip(mount)?;
        let pipette = self.pipette_mut(mount)?;
        pipette.current_volume = (pipette.current_volume - volume).max(0.0);
        let pipette_id = pipette.id.clone();
        self.record(Command::DispenseInPlace { pipette_id, volume, flow_rate, correction_volume });
        Ok(())
    }

    /// Arms the plunger first when a blowout or push-out left it at the bottom.
    pub(crate) fn air_gap_in_place(
        &mut self,
        mount: Mount,
        volume: f64,
        flow_rate: f64,
        correction_volume: f64,
    ) -> Result<()> {
        let pipette = self.require_tip_pipette(mount)?;
        check_capacity(pipette, volume)?;
        if !pipette.ready_to_aspirate {
            self.prepare_to_aspirate(mount)?;
        }
        let pipette = self.pipette_mut(mount)?;
        pipette.current_volume += volume;
        let pipette_id = pipette.id.clone();
        self.record(Command::AirGapInPlace { pipette_id, volume, flow_rate, correction_volume });
        Ok(())
    }

    /// Empties the tip. Whatever was blown out is not added to any well.
    pub(crate) fn blow_out_in_place(&mut self, mount: Mount, location: &Location) -> Result<()> {
        self.require_tip(mount)?;
        let pipette = self.pipette_mut(mount)?;
        pipette.current_volume = 0.0;
        pipette.ready_to_aspirate = false;
        let pipette_id = pipette.id.clone();
        let flow_rate = pipette.flow_rates.blow_out;
        self.record(Command::BlowOut { pipette_id, location: location.clone(), flow_rate });
        Ok(())
    }

    pub(crate) fn prepare_to_aspirate(&mut self, mount: Mount) -> Result<()> {
        self.require_tip(mount)?;
        let pipette = self.pipette_mut(mount)?;
        pipette.ready_to_aspirate = true;
        let pipette_id = pipette.id.clone();
        self.record(Command::PrepareToAspirate { pipette_id });
        Ok(())
    }

    pub(crate) fn touch_tip_at(
        &mut self,
        mount: Mount,
        location: &Location,
        well: &WellRef,
        radius: f64,
        z_offset: f64,
        speed: f64,
    ) -> Result<()> {
        self.require_tip(mount)?;
        let pipette = self.pipette_mut(mount)?;
        pipette.position = Some(location.clone());
        let pipette_id = pipette.id.clone();
        self.record(Command::TouchTip {
            pipette_id,
            labware_id: well.labware_id.clone(),
            well_name: well.well_name.clone(),
            radius,
            z_offset,
            speed,
        });
        Ok(())
    }

    pub(crate) fn set_blow_out_flow_rate(&mut self, mount: Mount, flow_rate: f64) -> Result<()> {
        self.pipette_mut(mount)?.flow_rates.blow_out = flow_rate;
        Ok(())
    }

    /// The rack and well of the next clean tip for the pipette on `mount`.
    pub(crate) fn next_tip(&self, mount: Mount) -> Result<(String, String)> {
        let pipette = self.pipette_ref(mount)?;
        if pipette.tip_racks.is_empty() {
            return Err(ProtocolError::NoTipRacks { pipette: pipette.name().to_owned(), context: None });
        }
        pipette
            .tip_racks
            .iter()
            .find_map(|rack| self.tips.next_tip(rack, pipette.nozzle_layout, None).map(|well| (rack.clone(), well)))
            .ok_or_else(|| ProtocolError::OutOfTips { pipette: pipette.name().to_owned(), context: None })
    }

    /// Top of the default trash bin.
    pub(crate) fn trash_location(&self) -> Result<Location> {
        self.deck.default_trash().map(aliq_labware::TrashBin::top).ok_or(ProtocolError::NoTrashBin { context: None })
    }

    // --- helpers ---

    /// Fills the tip with `volume` per channel, taken from every well under the nozzles.
    /// Returns the pipette id.
    fn draw_liquid(&mut self, mount: Mount, location: &Location, volume: f64) -> Result<String> {
        let pipette = self.require_tip_pipette(mount)?;
        if !pipette.ready_to_aspirate {
            return Err(ProtocolError::NotReadyToAspirate { pipette: pipette.name().to_owned(), context: None });
        }
        check_capacity(pipette, volume)?;
        let layout = pipette.nozzle_layout;
        let strict = pipette.liquid_presence_detection;

        if let LocationTarget::Well { labware_id, well_name } = &location.target {
            let labware = self.deck.labware(labware_id)?;
            for (well, channels) in nozzle_wells(labware, well_name, layout)? {
                let wanted = volume * channels;
                match self.liquids.remove(labware, well, wanted) {
                    Ok(_) => {},
                    Err(LabwareError::NotEnoughLiquid { available, .. }) if !strict => {
                        warn!(%labware_id, well, volume = wanted, available, "Aspirating more liquid than the well holds");
                        self.liquids.remove(labware, well, available)?;
                    },
                    Err(err) => return Err(err.into()),
                }
            }
        }

        let pipette = self.pipette_mut(mount)?;
        pipette.current_volume += volume;
        Ok(pipette.id.clone())
    }

    /// Empties `volume` per channel from the tip into every well under the nozzles.
    /// Returns the pipette id.
    fn expel_liquid(&mut self, mount: Mount, location: &Location, volume: f64) -> Result<String> {
        let pipette = self.require_tip_pipette(mount)?;
        if !volume.is_finite() || volume < 0.0 || volume - pipette.current_volume > VOLUME_TOLERANCE {
            return Err(ProtocolError::invalid_volume(
                volume,
                format!("{} holds {}uL", pipette.name(), pipette.current_volume),
            ));
        }
        let layout = pipette.nozzle_layout;

        if let LocationTarget::Well { labware_id, well_name } = &location.target {
            let labware = self.deck.labware(labware_id)?;
            for (well, channels) in nozzle_wells(labware, well_name, layout)? {
                self.liquids.add(labware, well, volume * channels)?;
            }
        }

        let pipette = self.pipette_mut(mount)?;
        pipette.current_volume = (pipette.current_volume - volume).max(0.0);
        Ok(pipette.id.clone())
    }

    /// Loads a trash bin in the configured slot when the deck has none.
    fn ensure_trash(&mut self) -> Result<Location> {
        if self.deck.default_trash().is_none() {
            let slot = self.robot.trash_slot;
            debug!(%slot, "No trash bin on the deck, loading the default one");
            self.load_trash_bin(slot).context("loading the default trash bin")?;
        }
        self.trash_location()
    }

    fn check_tip_rack(&self, definition: &PipetteDefinition, rack_id: &str) -> Result<()> {
        let load_name = self.deck.labware(rack_id)?.load_name();
        if !self.tips.is_tip_rack(rack_id) {
            return Err(ProtocolError::NotATipRack { labware_id: rack_id.to_owned(), context: None });
        }
        if !definition.compatible_tip_racks.iter().any(|rack| rack == load_name) {
            return Err(ProtocolError::IncompatibleTip {
                pipette: definition.name.clone(),
                tip_rack: load_name.to_owned(),
                context: None,
            });
        }
        Ok(())
    }

    fn well_location(&self, well: &WellRef, position: WellPosition) -> Result<Location> {
        let labware = self.deck.labware(&well.labware_id)?;
        let point = match position {
            WellPosition::Top(z) => labware.well_top(&well.well_name, z)?,
            WellPosition::Bottom(z) => labware.well_bottom(&well.well_name, z)?,
        };
        Ok(labware.well_location(&well.well_name, point)?)
    }

    pub(crate) fn pipette_ref(&self, mount: Mount) -> Result<&Pipette> {
        self.pipettes.get(&mount).ok_or(ProtocolError::PipetteNotAttached { mount, context: None })
    }

    fn pipette_mut(&mut self, mount: Mount) -> Result<&mut Pipette> {
        self.pipettes.get_mut(&mount).ok_or(ProtocolError::PipetteNotAttached { mount, context: None })
    }

    fn require_tip_pipette(&self, mount: Mount) -> Result<&Pipette> {
        let pipette = self.pipette_ref(mount)?;
        if pipette.has_tip() {
            Ok(pipette)
        } else {
            Err(ProtocolError::TipNotAttached { pipette: pipette.name().to_owned(), context: None })
        }
    }

    fn require_tip(&self, mount: Mount) -> Result<&AttachedTip> {
        let pipette = self.pipette_ref(mount)?;
        pipette
            .tip
            .as_ref()
            .ok_or_else(|| ProtocolError::TipNotAttached { pipette: pipette.name().to_owned(), context: None })
    }

    fn record(&mut self, command: Command) {
        debug!(command = command.as_ref(), "{command}");
        self.commands.push(command);
    }
}

#[derive(Debug, Clone, Copy)]
enum WellPosition {
    Top(f64),
    Bottom(f64),
}

fn detach_tip(pipette: &mut Pipette, location: Location) {
    pipette.tip = None;
    pipette.current_volume = 0.0;
    pipette.ready_to_aspirate = false;
    pipette.position = Some(location);
}

/// Wells entered by the nozzles with the number of channels in each, in nozzle order.
fn nozzle_wells<'a>(labware: &'a Labware, well: &str, layout: NozzleLayout) -> Result<Vec<(&'a str, f64)>> {
    let mut wells: Vec<(&str, f64)> = Vec::new();
    for name in labware.wells_under_nozzles(well, layout)? {
        match wells.iter_mut().find(|(seen, _)| *seen == name) {
            Some((_, channels)) => *channels += 1.0,
            None => wells.push((name, 1.0)),
        }
    }
    Ok(wells)
}

fn check_positive(volume: f64) -> Result<()> {
    if volume.is_finite() && volume > 0.0 {
        Ok(())
    } else {
        Err(ProtocolError::invalid_volume(volume, "volume must be positive"))
    }
}

fn check_capacity(pipette: &Pipette, volume: f64) -> Result<()> {
    if volume > pipette.available_volume() + VOLUME_TOLERANCE {
        return Err(ProtocolError::VolumeExceedsCapacity {
            volume: pipette.current_volume + volume,
            max_volume: pipette.working_volume().unwrap_or(0.0),
            pipette: pipette.name().to_owned(),
            context: None,
        });
    }
    Ok(())
}
