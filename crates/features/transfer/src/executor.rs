//! Building blocks of a liquid-class transfer.
//!
//! A [`TransferComponentsExecutor`] is created per well visit. It knows the target
//! location, the properties of the liquid class for the pipette and tip in use, and
//! the contents of the tip, and it turns each component (submerge, aspirate, retract,
//! ...) into the matching sequence of [`InstrumentCore`] calls.

use crate::instrument::{InstrumentCore, TouchTipMotion};
use crate::error::TransferError;
use crate::state::{TipState, TransferType, WellRef};
use aliq_domain::liquid::{BlowoutLocation, PositionReference};
use aliq_domain::{Location, Point};
use aliq_liquid_classes::VolumeMap;
use aliq_liquid_classes::properties::{
    DelayProperties, MixProperties, MultiDispenseProperties, RetractDispense, SingleDispenseProperties, Submerge,
    TipPosition, TouchTipProperties, TransferProperties,
};
use tracing::{debug, trace};

/// Volumes closer than this are considered equal.
const VOLUME_TOLERANCE: f64 = 1e-6;

/// What a submerge leads into; used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipettingAction {
    Aspirate,
    Dispense,
}

impl PipettingAction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Aspirate => "aspirate",
            Self::Dispense => "dispense",
        }
    }
}

/// Which dispense property set drives a dispense.
#[derive(Debug, Clone, Copy)]
pub enum DispenseProfile<'p> {
    Single(&'p SingleDispenseProperties),
    Multi(&'p MultiDispenseProperties),
}

impl<'p> DispenseProfile<'p> {
    const fn flow_rate_by_volume(self) -> &'p VolumeMap {
        match self {
            Self::Single(props) => &props.flow_rate_by_volume,
            Self::Multi(props) => &props.flow_rate_by_volume,
        }
    }

    const fn correction_by_volume(self) -> &'p VolumeMap {
        match self {
            Self::Single(props) => &props.correction_by_volume,
            Self::Multi(props) => &props.correction_by_volume,
        }
    }

    const fn position(self) -> &'p TipPosition {
        match self {
            Self::Single(props) => &props.dispense_position,
            Self::Multi(props) => &props.dispense_position,
        }
    }

    const fn delay(self) -> &'p DelayProperties {
        match self {
            Self::Single(props) => &props.delay,
            Self::Multi(props) => &props.delay,
        }
    }

    /// Multi-dispensing never pushes out between wells.
    fn default_push_out(self, volume: f64) -> f64 {
        match self {
            Self::Single(props) => props.push_out_by_volume.get_for_volume(volume),
            Self::Multi(_) => 0.0,
        }
    }
}

/// Absolute point for a liquid-class tip position inside `well`.
///
/// `LiquidMeniscus` positions are measured from the liquid height the well will have
/// once `volume_delta` µL have been added (negative for an aspirate).
///
/// # Errors
/// Propagates well query failures from the instrument.
pub fn absolute_point<C: InstrumentCore>(
    core: &C,
    well: &WellRef,
    position_reference: PositionReference,
    offset: Point,
    volume_delta: f64,
) -> Result<Point, C::Error> {
    let reference = match position_reference {
        PositionReference::WellTop => core.well_top(well, 0.0)?,
        PositionReference::WellBottom => core.well_bottom(well, 0.0)?,
        PositionReference::WellCenter => core.well_center(well)?,
        PositionReference::LiquidMeniscus => {
            let height = core.estimate_liquid_height_after(well, volume_delta)?;
            core.well_bottom(well, height)?
        },
    };
    Ok(reference + offset)
}

/// Runs the components of one well visit of a liquid-class transfer.
#[derive(Debug)]
pub struct TransferComponentsExecutor<'a, C: InstrumentCore> {
    core: &'a mut C,
    properties: &'a TransferProperties,
    target_location: Location,
    target_well: Option<WellRef>,
    tip_state: TipState,
    transfer_type: TransferType,
}

impl<'a, C: InstrumentCore> TransferComponentsExecutor<'a, C> {
    /// `target_well` is `None` when the target is a trash bin.
    pub fn new(
        core: &'a mut C,
        properties: &'a TransferProperties,
        target_location: Location,
        target_well: Option<WellRef>,
        tip_state: TipState,
        transfer_type: TransferType,
    ) -> Self {
        Self { core, properties, target_location, target_well, tip_state, transfer_type }
    }

    #[must_use]
    pub const fn tip_state(&self) -> &TipState {
        &self.tip_state
    }

    #[must_use]
    pub fn into_tip_state(self) -> TipState {
        self.tip_state
    }

    /// Moves from above the well down to the target location.
    ///
    /// Order: check that the start position is above the liquid, move there, expel
    /// any trailing air gap, (re)arm the plunger before an aspirate, then move
    /// straight down at the submerge speed and wait.
    ///
    /// # Errors
    /// [`TransferError::LocationInsideLiquid`] for a start position under the
    /// meniscus, or any instrument failure.
    pub fn submerge(&mut self, submerge: &Submerge, action: PipettingAction) -> Result<(), C::Error> {
        let Some(well) = self.target_well.clone() else {
            let trash = self.target_location.clone();
            self.core.move_to(&trash, None, false, None)?;
            self.remove_air_gap(&trash)?;
            return self.delay(&submerge.delay);
        };

        let position = &submerge.start_position;
        let start = absolute_point(self.core, &well, position.position_reference, position.offset, 0.0)?;
        let start = Location::in_well(start, &well.labware_id, &well.well_name);
        self.check_above_liquid(&start, &well, "Submerge start", action)?;

        self.core.move_to(&start, Some(&well), false, None)?;
        self.remove_air_gap(&start)?;
        if action == PipettingAction::Aspirate && !self.tip_state.ready_to_aspirate {
            self.core.prepare_to_aspirate()?;
            self.tip_state.ready_to_aspirate = true;
        }

        let target = self.target_location.clone();
        self.core.move_to(&target, Some(&well), true, Some(submerge.speed))?;
        self.delay(&submerge.delay)
    }

    /// # Errors
    /// Propagates instrument failures.
    pub fn aspirate_and_wait(&mut self, volume: f64) -> Result<(), C::Error> {
        let props = self.properties;
        let aspirate = &props.aspirate;
        let flow_rate = aspirate.flow_rate_by_volume.get_for_volume(volume);
        let correction = aspirate.correction_by_volume.get_for_volume(self.core.current_volume() + volume);

        match self.tracking_end(&aspirate.aspirate_position, -volume)? {
            Some(end) => self.core.aspirate_while_tracking(&self.target_location, &end, volume, flow_rate, correction)?,
            None => self.core.aspirate(&self.target_location, volume, flow_rate, correction)?,
        }
        self.tip_state.append_liquid(volume);
        self.delay(&aspirate.delay)
    }

    /// Dispenses `volume` in place; `push_out` overrides the liquid class push-out.
    ///
    /// # Errors
    /// [`TransferError::DispenseExceedsTip`] when the tip holds less than `volume`.
    pub fn dispense_and_wait(
        &mut self,
        profile: DispenseProfile<'_>,
        volume: f64,
        push_out: Option<f64>,
    ) -> Result<(), C::Error> {
        let available = self.core.current_volume();
        if volume - available > VOLUME_TOLERANCE {
            return Err(TransferError::DispenseExceedsTip { volume, available, context: None }.into());
        }

        let flow_rate = profile.flow_rate_by_volume().get_for_volume(volume);
        let correction = profile.correction_by_volume().get_for_volume((available - volume).max(0.0));
        let push_out = push_out.unwrap_or_else(|| profile.default_push_out(volume));

        match self.tracking_end(profile.position(), volume)? {
            Some(end) => {
                self.core.dispense_while_tracking(&self.target_location, &end, volume, flow_rate, push_out, correction)?;
            },
            None => self.core.dispense(&self.target_location, volume, flow_rate, push_out, correction)?,
        }
        self.tip_state.delete_liquid(volume);
        if push_out > 0.0 {
            self.tip_state.ready_to_aspirate = false;
        }
        self.delay(profile.delay())
    }

    /// Aspirates and dispenses `mix.volume` the configured number of times.
    ///
    /// Only the final dispense pushes out, and only when `last_dispense_push_out` is set.
    ///
    /// # Errors
    /// Propagates instrument failures.
    pub fn mix(&mut self, mix: &MixProperties, last_dispense_push_out: bool) -> Result<(), C::Error> {
        if !mix.enabled {
            return Ok(());
        }
        trace!(repetitions = mix.repetitions, volume = mix.volume, "Mixing");
        let props = self.properties;
        let dispense = DispenseProfile::Single(&props.dispense);
        for repetition in 1..=mix.repetitions {
            self.aspirate_and_wait(mix.volume)?;
            let push_out = (repetition < mix.repetitions || !last_dispense_push_out).then_some(0.0);
            self.dispense_and_wait(dispense, mix.volume, push_out)?;
        }
        Ok(())
    }

    /// One aspirate/dispense cycle of `volume` without push-out, when enabled.
    ///
    /// # Errors
    /// Propagates instrument failures.
    pub fn pre_wet(&mut self, volume: f64) -> Result<(), C::Error> {
        if !self.properties.aspirate.pre_wet {
            return Ok(());
        }
        trace!(volume, "Pre-wetting");
        let mix = MixProperties { enabled: true, repetitions: 1, volume };
        self.mix(&mix, false)
    }

    /// Leaves the source well after aspirating `volume` and takes an air gap.
    ///
    /// # Errors
    /// [`TransferError::LocationInsideLiquid`] for a retract position under the
    /// meniscus, or any instrument failure.
    pub fn retract_after_aspiration(&mut self, volume: f64) -> Result<(), C::Error> {
        let Some(well) = self.target_well.clone() else {
            return Err(TransferError::invalid_request("cannot aspirate from a trash bin").into());
        };
        let props = self.properties;
        let retract = &props.aspirate.retract;

        let position = &retract.end_position;
        let end = absolute_point(self.core, &well, position.position_reference, position.offset, -volume)?;
        let end = Location::in_well(end, &well.labware_id, &well.well_name);
        self.check_above_liquid(&end, &well, "Retract end", PipettingAction::Aspirate)?;

        self.core.move_to(&end, Some(&well), true, Some(retract.speed))?;
        self.delay(&retract.delay)?;
        self.touch_tip(&end, &well, &retract.touch_tip)?;

        let air_gap_basis = match self.transfer_type {
            TransferType::ManyToOne => self.core.current_volume(),
            TransferType::OneToOne | TransferType::OneToMany => volume,
        };
        let air_gap = retract.air_gap_by_volume.get_for_volume(air_gap_basis);
        if air_gap > 0.0 {
            let at = self.air_gap_safe_location(&end, &well)?;
            self.air_gap_in_place(air_gap)?;
            debug!(%at, air_gap, "Air gap after aspirate");
        }
        Ok(())
    }

    /// Leaves the destination after a single dispense.
    ///
    /// Handles the configured blowout (in place at the destination, at the top of
    /// `source`, or into `trash`) and, when `add_final_air_gap` is set, finishes
    /// with an air gap.
    ///
    /// # Errors
    /// [`TransferError::LocationInsideLiquid`] for a retract position under the
    /// meniscus, or any instrument failure.
    pub fn retract_after_dispensing(
        &mut self,
        trash: &Location,
        source: Option<&WellRef>,
        add_final_air_gap: bool,
    ) -> Result<(), C::Error> {
        let props = self.properties;
        let retract = &props.dispense.retract;
        let blowout = &retract.blowout;
        let end = self.retract_from_destination(retract)?;

        if blowout.enabled && blowout.location == BlowoutLocation::Destination {
            self.blow_out_in_place(&end, blowout.flow_rate)?;
            self.touch_tip_at_destination(&end, &retract.touch_tip)?;
            return self.finish_with_air_gap(&end, add_final_air_gap);
        }

        self.touch_tip_at_destination(&end, &retract.touch_tip)?;
        if !blowout.enabled {
            return self.finish_with_air_gap(&end, add_final_air_gap);
        }

        // the tip travels to the blowout location, so it needs an air gap either way
        self.finish_with_air_gap(&end, true)?;
        self.core.set_blow_out_flow_rate(blowout.flow_rate)?;
        match (blowout.location, source) {
            (BlowoutLocation::Source, Some(source)) => {
                let top = self.core.well_top(source, 0.0)?;
                let top = Location::in_well(top, &source.labware_id, &source.well_name);
                self.core.blow_out(&top, Some(source), false)?;
                self.tip_state.blown_out();
                self.touch_tip(&top, source, &retract.touch_tip)?;
                let safe = self.air_gap_safe_location(&top, source)?;
                self.core.prepare_to_aspirate()?;
                self.tip_state.ready_to_aspirate = true;
                self.add_air_gap_if(add_final_air_gap, &safe)
            },
            _ => {
                self.core.blow_out(trash, None, false)?;
                self.tip_state.blown_out();
                self.add_air_gap_if(add_final_air_gap, trash)
            },
        }
    }

    /// Leaves a destination during a multi-dispense.
    ///
    /// Blowout only happens after the last dispense of an aspirate. Any liquid still
    /// in the tip at that point (the disposal volume) is blown out into the trash when
    /// the liquid class has blowout disabled.
    ///
    /// # Errors
    /// [`TransferError::LocationInsideLiquid`] for a retract position under the
    /// meniscus, or any instrument failure.
    pub fn retract_during_multi_dispensing(
        &mut self,
        trash: &Location,
        source: Option<&WellRef>,
        add_final_air_gap: bool,
        is_last_retract: bool,
    ) -> Result<(), C::Error> {
        let props = self.properties;
        let Some(multi) = props.multi_dispense.as_ref() else {
            return Err(TransferError::invalid_request("liquid class has no multi-dispense properties").into());
        };
        let retract = &multi.retract;
        let blowout = &retract.blowout;
        let end = self.retract_from_destination(retract)?;

        if !is_last_retract {
            self.touch_tip_at_destination(&end, &retract.touch_tip)?;
            return self.finish_with_air_gap(&end, add_final_air_gap);
        }

        match (blowout.enabled, blowout.location, source) {
            (true, BlowoutLocation::Destination, _) => {
                self.blow_out_in_place(&end, blowout.flow_rate)?;
                self.touch_tip_at_destination(&end, &retract.touch_tip)?;
            },
            (true, BlowoutLocation::Source, Some(source)) => {
                self.touch_tip_at_destination(&end, &retract.touch_tip)?;
                self.core.set_blow_out_flow_rate(blowout.flow_rate)?;
                let top = self.core.well_top(source, 0.0)?;
                let top = Location::in_well(top, &source.labware_id, &source.well_name);
                self.core.blow_out(&top, Some(source), false)?;
                self.tip_state.blown_out();
                return self.add_air_gap_if(add_final_air_gap, &top);
            },
            (true, _, _) => {
                self.touch_tip_at_destination(&end, &retract.touch_tip)?;
                self.core.set_blow_out_flow_rate(blowout.flow_rate)?;
                self.core.blow_out(trash, None, false)?;
                self.tip_state.blown_out();
                return self.add_air_gap_if(add_final_air_gap, trash);
            },
            (false, ..) => {
                self.touch_tip_at_destination(&end, &retract.touch_tip)?;
                if self.tip_state.last_liquid_and_air_gap_in_tip.liquid > VOLUME_TOLERANCE {
                    debug!(
                        residual = self.tip_state.last_liquid_and_air_gap_in_tip.liquid,
                        "Discarding disposal volume into the trash"
                    );
                    self.core.blow_out(trash, None, false)?;
                    self.tip_state.blown_out();
                    return self.add_air_gap_if(add_final_air_gap, trash);
                }
            },
        }
        self.finish_with_air_gap(&end, add_final_air_gap)
    }

    // --- helpers ---

    /// Retract move and delay shared by both dispense retracts. Returns where the tip ended up.
    fn retract_from_destination(&mut self, retract: &RetractDispense) -> Result<Location, C::Error> {
        let Some(well) = self.target_well.clone() else {
            self.delay(&retract.delay)?;
            return Ok(self.target_location.clone());
        };

        let position = &retract.end_position;
        let end = absolute_point(self.core, &well, position.position_reference, position.offset, 0.0)?;
        let end = Location::in_well(end, &well.labware_id, &well.well_name);
        self.check_above_liquid(&end, &well, "Retract end", PipettingAction::Dispense)?;

        self.core.move_to(&end, Some(&well), true, Some(retract.speed))?;
        self.delay(&retract.delay)?;
        Ok(end)
    }

    fn touch_tip_at_destination(&mut self, at: &Location, touch_tip: &TouchTipProperties) -> Result<(), C::Error> {
        match self.target_well.clone() {
            Some(well) => self.touch_tip(at, &well, touch_tip),
            None => Ok(()),
        }
    }

    /// Touches the well walls and returns to `at`.
    fn touch_tip(&mut self, at: &Location, well: &WellRef, touch_tip: &TouchTipProperties) -> Result<(), C::Error> {
        if !touch_tip.enabled {
            return Ok(());
        }
        let motion = TouchTipMotion {
            radius: self.core.robot_config().touch_tip_radius,
            mm_from_edge: touch_tip.mm_from_edge,
            z_offset: touch_tip.z_offset,
            speed: touch_tip.speed,
        };
        self.core.touch_tip(at, well, motion)?;
        self.core.move_to(at, Some(well), true, None)
    }

    fn blow_out_in_place(&mut self, at: &Location, flow_rate: f64) -> Result<(), C::Error> {
        self.core.set_blow_out_flow_rate(flow_rate)?;
        self.core.blow_out(at, None, true)?;
        self.tip_state.blown_out();
        Ok(())
    }

    /// Moves up to the air-gap height above `well` if `from` is lower.
    fn air_gap_safe_location(&mut self, from: &Location, well: &WellRef) -> Result<Location, C::Error> {
        let safe = self.core.well_top(well, self.core.robot_config().air_gap_safe_offset_mm)?;
        if safe.z > from.point.z {
            let above = from.moved_to(from.point.with_z(safe.z));
            self.core.move_to(&above, Some(well), true, None)?;
            return Ok(above);
        }
        Ok(from.clone())
    }

    fn finish_with_air_gap(&mut self, at: &Location, add: bool) -> Result<(), C::Error> {
        if !add {
            return Ok(());
        }
        match self.target_well.clone() {
            Some(well) => {
                let safe = self.air_gap_safe_location(at, &well)?;
                self.add_air_gap_if(true, &safe)
            },
            None => self.add_air_gap_if(true, at),
        }
    }

    fn add_air_gap_if(&mut self, add: bool, at: &Location) -> Result<(), C::Error> {
        if !add {
            return Ok(());
        }
        let air_gap = self.properties.aspirate.retract.air_gap_by_volume.get_for_volume(self.core.current_volume());
        if air_gap > 0.0 {
            trace!(%at, air_gap, "Air gap");
            self.air_gap_in_place(air_gap)?;
        }
        Ok(())
    }

    /// Air gaps are aspirated no slower than one second per gap.
    fn air_gap_in_place(&mut self, volume: f64) -> Result<(), C::Error> {
        let props = self.properties;
        let aspirate = &props.aspirate;
        let flow_rate = aspirate.flow_rate_by_volume.get_for_volume(volume).max(volume);
        let correction = aspirate.correction_by_volume.get_for_volume(self.core.current_volume() + volume);
        self.core.air_gap_in_place(volume, flow_rate, correction)?;
        self.tip_state.append_air_gap(volume);
        self.delay(&aspirate.delay)
    }

    fn remove_air_gap(&mut self, at: &Location) -> Result<(), C::Error> {
        let air_gap = self.tip_state.last_liquid_and_air_gap_in_tip.air_gap;
        if air_gap <= 0.0 {
            return Ok(());
        }
        let props = self.properties;
        let dispense = &props.dispense;
        let flow_rate = dispense.flow_rate_by_volume.get_for_volume(air_gap).max(air_gap);
        let correction = dispense.correction_by_volume.get_for_volume(self.core.current_volume() - air_gap);
        self.core.remove_air_gap(at, air_gap, flow_rate, correction)?;
        self.tip_state.delete_air_gap();
        self.delay(&dispense.delay)
    }

    /// Where the tip ends up when it follows the meniscus through a `volume_delta` change.
    /// `None` unless `position` is measured from the meniscus of a well.
    fn tracking_end(&self, position: &TipPosition, volume_delta: f64) -> Result<Option<Location>, C::Error> {
        let Some(well) = self.target_well.as_ref() else {
            return Ok(None);
        };
        if position.position_reference != PositionReference::LiquidMeniscus {
            return Ok(None);
        }
        let end = absolute_point(&*self.core, well, position.position_reference, position.offset, volume_delta)?;
        Ok(Some(Location::in_well(end, &well.labware_id, &well.well_name)))
    }

    fn delay(&mut self, delay: &DelayProperties) -> Result<(), C::Error> {
        if delay.enabled { self.core.delay(delay.duration) } else { Ok(()) }
    }

    /// Positions that must be outside the liquid are checked against the tracked liquid height.
    fn check_above_liquid(
        &self,
        location: &Location,
        well: &WellRef,
        location_type: &'static str,
        action: PipettingAction,
    ) -> Result<(), C::Error> {
        if self.core.liquid_presence_detection() {
            return Ok(());
        }
        let Some(height) = self.core.liquid_height(well)? else {
            return Ok(());
        };
        let meniscus = self.core.well_bottom(well, height)?;
        if location.point.z < meniscus.z {
            return Err(TransferError::LocationInsideLiquid {
                location_type,
                action: action.as_str(),
                location: location.point.to_string(),
                well_name: well.to_string(),
                context: None,
            }
            .into());
        }
        Ok(())
    }
}
