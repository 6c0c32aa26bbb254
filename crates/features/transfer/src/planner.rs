//! Liquid-class transfers: one-to-one, one-to-many and many-to-one.
//!
//! The planners split volumes to fit the tip, decide when to change tips and then
//! drive a [`TransferComponentsExecutor`] per well visit.

use crate::instrument::InstrumentCore;
use crate::error::TransferError;
use crate::executor::{DispenseProfile, PipettingAction, TransferComponentsExecutor, absolute_point};
use crate::state::{LiquidAndAirGapPair, TipPolicy, TipState, TransferTarget, TransferType, WellRef};
use aliq_domain::Location;
use aliq_liquid_classes::{LiquidClass, TransferProperties};
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

/// Parameters shared by the three liquid-class transfer flavours.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct TransferRequest {
    /// µL per destination (transfer, distribute) or per source (consolidate).
    pub volume: f64,
    #[builder(setter(into))]
    pub sources: Vec<WellRef>,
    #[builder(setter(into))]
    pub destinations: Vec<TransferTarget>,
    #[builder(default)]
    pub new_tip: TipPolicy,
    /// Defaults to `true` only for [`TipPolicy::Never`].
    #[builder(default, setter(strip_option))]
    pub keep_last_tip: Option<bool>,
    /// Put used tips back into their rack well instead of the trash.
    #[builder(default)]
    pub return_tip: bool,
}

impl TransferRequest {
    fn keep_last_tip(&self) -> bool {
        self.keep_last_tip.unwrap_or_else(|| self.new_tip.keeps_last_tip_by_default())
    }

    /// `false` for a zero-volume request, which is a no-op.
    fn check_volume(&self, operation: &'static str) -> Result<bool, TransferError> {
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(TransferError::invalid_request(format!("{operation} volume must be positive, got {}", self.volume)));
        }
        if self.volume == 0.0 {
            warn!(operation, "Zero volume requested, nothing to do");
            return Ok(false);
        }
        Ok(true)
    }
}

/// Splits `volume` into aspirations no larger than `max_volume`.
///
/// Full-size steps are taken while more than two remain; a remainder between one and
/// two maximums is halved so that no step ends up tiny.
#[must_use]
pub fn split_volume(volume: f64, max_volume: f64) -> Vec<f64> {
    let mut steps = Vec::new();
    let mut remaining = volume;
    while remaining > 2.0 * max_volume {
        steps.push(max_volume);
        remaining -= max_volume;
    }
    if remaining > max_volume {
        steps.extend([remaining / 2.0; 2]);
    } else if remaining > 0.0 {
        steps.push(remaining);
    }
    steps
}

/// Moves `volume` from each source to its destination, pairwise.
///
/// # Errors
/// Request validation errors, [`TransferError::IncompatibleLiquidClass`] when the class
/// has no properties for the pipette and tip, and any instrument failure.
pub fn transfer_with_liquid_class<C: InstrumentCore>(
    core: &mut C,
    liquid_class: &LiquidClass,
    request: &TransferRequest,
) -> Result<(), C::Error> {
    if !request.check_volume("transfer")? {
        return Ok(());
    }
    if request.sources.len() != request.destinations.len() {
        return Err(TransferError::LengthMismatch {
            sources: request.sources.len(),
            destinations: request.destinations.len(),
            context: None,
        }
        .into());
    }
    let props = resolve_properties(core, liquid_class)?;
    let max_volume = max_aspirate_volume(core, props)?;
    let trash = core.trash_location()?;

    let steps: Vec<(f64, &WellRef, &TransferTarget)> = request
        .sources
        .iter()
        .zip(&request.destinations)
        .flat_map(|(source, dest)| split_volume(request.volume, max_volume).into_iter().map(move |v| (v, source, dest)))
        .collect();
    info!(
        class = liquid_class.name(),
        volume = request.volume,
        pairs = request.sources.len(),
        steps = steps.len(),
        policy = %request.new_tip,
        "Transfer with liquid class"
    );

    let fresh: Vec<bool> = steps
        .iter()
        .enumerate()
        .map(|(i, (_, source, dest))| {
            i == 0
                || match request.new_tip {
                    TipPolicy::Always => true,
                    TipPolicy::PerSource => steps[i - 1].1 != *source,
                    TipPolicy::PerDestination => steps[i - 1].2 != *dest,
                    TipPolicy::Once | TipPolicy::Never => false,
                }
        })
        .collect();

    drive(core, request, &steps, &fresh, |core, &(volume, source, dest), tip_state, add_final_air_gap| {
        debug!(volume, %source, ?dest, "Transfer step");
        let tip_state = aspirate_step(core, props, source, volume, 0.0, tip_state, TransferType::OneToOne)?;
        dispense_step(core, props, dest, source, &trash, volume, tip_state, add_final_air_gap)
    })
}

/// Distributes `volume` from one source into every destination, filling the tip
/// for several wells per aspirate.
///
/// Falls back to [`transfer_with_liquid_class`] when the class has no multi-dispense
/// properties or the tip cannot hold two wells' worth.
///
/// # Errors
/// Request validation errors, [`TransferError::IncompatibleLiquidClass`] and any
/// instrument failure.
pub fn distribute_with_liquid_class<C: InstrumentCore>(
    core: &mut C,
    liquid_class: &LiquidClass,
    request: &TransferRequest,
) -> Result<(), C::Error> {
    if !request.check_volume("distribute")? {
        return Ok(());
    }
    let [source] = request.sources.as_slice() else {
        return Err(TransferError::invalid_request("distribute takes exactly one source well").into());
    };
    if request.new_tip == TipPolicy::PerDestination {
        return Err(incompatible_policy(request.new_tip, "distribute").into());
    }
    let destinations: Vec<&WellRef> = request.destinations.iter().filter_map(TransferTarget::well).collect();
    if destinations.len() != request.destinations.len() {
        return Err(TransferError::invalid_request("cannot distribute into a trash bin").into());
    }

    let props = resolve_properties(core, liquid_class)?;
    let working_volume = core.working_volume()?;
    let volume = request.volume;
    let Some(multi) = props.multi_dispense.as_ref() else {
        debug!(class = liquid_class.name(), "No multi-dispense properties, transferring one to one");
        return transfer_with_liquid_class(core, liquid_class, &one_to_one(request, source));
    };

    let fits = |wells: usize| {
        let liquid = volume * wells as f64;
        let total =
            liquid + multi.conditioning_by_volume.get_for_volume(liquid) + multi.disposal_by_volume.get_for_volume(liquid);
        total + props.aspirate.retract.air_gap_by_volume.get_for_volume(total) <= working_volume
    };
    if destinations.len() < 2 || !fits(2) {
        debug!(volume, working_volume, "Multi-dispense does not fit, transferring one to one");
        return transfer_with_liquid_class(core, liquid_class, &one_to_one(request, source));
    }

    let mut groups: Vec<&[&WellRef]> = Vec::new();
    let mut remaining = destinations.as_slice();
    while !remaining.is_empty() {
        let wells = (1..=remaining.len()).rev().find(|&n| fits(n)).unwrap_or(1);
        let (group, rest) = remaining.split_at(wells);
        groups.push(group);
        remaining = rest;
    }
    info!(
        class = liquid_class.name(),
        volume,
        destinations = destinations.len(),
        aspirations = groups.len(),
        policy = %request.new_tip,
        "Distribute with liquid class"
    );

    let trash = core.trash_location()?;
    let fresh: Vec<bool> = (0..groups.len()).map(|i| i == 0 || request.new_tip == TipPolicy::Always).collect();

    drive(core, request, &groups, &fresh, |core, group, tip_state, add_final_air_gap| {
        let liquid = volume * group.len() as f64;
        let conditioning = multi.conditioning_by_volume.get_for_volume(liquid);
        let disposal = multi.disposal_by_volume.get_for_volume(liquid);
        debug!(wells = group.len(), liquid, conditioning, disposal, "Multi-dispense aspirate");

        let mut tip_state =
            aspirate_step(core, props, source, liquid + disposal, conditioning, tip_state, TransferType::OneToMany)?;
        for (j, dest) in group.iter().enumerate() {
            let is_last_retract = j + 1 == group.len();
            let position = &multi.dispense_position;
            let point = absolute_point(core, dest, position.position_reference, position.offset, 0.0)?;
            let location = Location::in_well(point, &dest.labware_id, &dest.well_name);

            let mut executor = TransferComponentsExecutor::new(
                core,
                props,
                location,
                Some((*dest).clone()),
                tip_state,
                TransferType::OneToMany,
            );
            executor.submerge(&multi.submerge, PipettingAction::Dispense)?;
            executor.dispense_and_wait(DispenseProfile::Multi(multi), volume, None)?;
            executor.retract_during_multi_dispensing(
                &trash,
                Some(source),
                !is_last_retract || add_final_air_gap,
                is_last_retract,
            )?;
            tip_state = executor.into_tip_state();
        }
        Ok(tip_state)
    })
}

/// Collects `volume` from every source into a single destination, aspirating from
/// consecutive sources (separated by air gaps) until the tip is full.
///
/// # Errors
/// Request validation errors, [`TransferError::IncompatibleLiquidClass`] and any
/// instrument failure.
pub fn consolidate_with_liquid_class<C: InstrumentCore>(
    core: &mut C,
    liquid_class: &LiquidClass,
    request: &TransferRequest,
) -> Result<(), C::Error> {
    if !request.check_volume("consolidate")? {
        return Ok(());
    }
    let [dest] = request.destinations.as_slice() else {
        return Err(TransferError::invalid_request("consolidate takes exactly one destination").into());
    };
    if request.new_tip == TipPolicy::PerSource {
        return Err(incompatible_policy(request.new_tip, "consolidate").into());
    }
    if request.sources.is_empty() {
        warn!("Consolidate without sources, nothing to do");
        return Ok(());
    }

    let props = resolve_properties(core, liquid_class)?;
    let working_volume = core.working_volume()?;
    let max_volume = max_aspirate_volume(core, props)?;
    let air_gap_for = |volume: f64| props.aspirate.retract.air_gap_by_volume.get_for_volume(volume);

    let mut groups: Vec<Vec<(f64, &WellRef)>> = Vec::new();
    let mut current: Vec<(f64, &WellRef)> = Vec::new();
    let mut in_tip = 0.0;
    for source in &request.sources {
        for piece in split_volume(request.volume, max_volume) {
            if !current.is_empty() && in_tip + piece + air_gap_for(in_tip + piece) > working_volume {
                groups.push(std::mem::take(&mut current));
                in_tip = 0.0;
            }
            if piece + air_gap_for(piece) > working_volume {
                return Err(TransferError::TipOverflow {
                    volume: piece,
                    air_gap: air_gap_for(piece),
                    working_volume,
                    context: None,
                }
                .into());
            }
            current.push((piece, source));
            in_tip += piece;
        }
    }
    groups.push(current);
    info!(
        class = liquid_class.name(),
        volume = request.volume,
        sources = request.sources.len(),
        dispenses = groups.len(),
        policy = %request.new_tip,
        "Consolidate with liquid class"
    );

    let trash = core.trash_location()?;
    let fresh: Vec<bool> = (0..groups.len()).map(|i| i == 0 || request.new_tip == TipPolicy::Always).collect();

    drive(core, request, &groups, &fresh, |core, group, mut tip_state, add_final_air_gap| {
        let mut total = 0.0;
        let mut last_source = None;
        for &(volume, source) in group {
            tip_state = aspirate_step(core, props, source, volume, 0.0, tip_state, TransferType::ManyToOne)?;
            total += volume;
            last_source = Some(source);
        }
        let Some(source) = last_source else {
            return Ok(tip_state);
        };
        debug!(total, ?dest, "Consolidated dispense");
        dispense_step(core, props, dest, source, &trash, total, tip_state, add_final_air_gap)
    })
}

// --- shared steps ---

/// Picks up tips as `fresh` dictates and runs `step` for every unit of work.
///
/// The boolean handed to `step` says whether the tip travels on afterwards, in which
/// case the step ends with an air gap.
fn drive<C, U, F>(core: &mut C, request: &TransferRequest, units: &[U], fresh: &[bool], mut step: F) -> Result<(), C::Error>
where
    C: InstrumentCore,
    F: FnMut(&mut C, &U, TipState, bool) -> Result<TipState, C::Error>,
{
    let policy = request.new_tip;
    let keep_last_tip = request.keep_last_tip();
    if policy == TipPolicy::Never && !core.has_tip() {
        return Err(TransferError::invalid_request("tip policy 'never' requires a tip to be attached").into());
    }

    let mut tip_state = TipState::new(false, LiquidAndAirGapPair::default());
    for (i, unit) in units.iter().enumerate() {
        if policy != TipPolicy::Never && fresh[i] {
            if i > 0 && core.has_tip() {
                core.drop_tip(request.return_tip)?;
            }
            core.pick_up_tip()?;
            tip_state = TipState::new(false, LiquidAndAirGapPair::default());
        }
        let tip_travels_on = match fresh.get(i + 1) {
            Some(&next_fresh) => policy == TipPolicy::Never || !next_fresh,
            None => keep_last_tip,
        };
        tip_state = step(core, unit, tip_state, tip_travels_on)?;
    }

    if !keep_last_tip && core.has_tip() {
        core.drop_tip(request.return_tip)?;
    }
    Ok(())
}

fn aspirate_step<C: InstrumentCore>(
    core: &mut C,
    props: &TransferProperties,
    source: &WellRef,
    volume: f64,
    conditioning: f64,
    tip_state: TipState,
    transfer_type: TransferType,
) -> Result<TipState, C::Error> {
    let aspirate = &props.aspirate;
    let total = volume + conditioning;
    let position = &aspirate.aspirate_position;
    let point = absolute_point(core, source, position.position_reference, position.offset, 0.0)?;
    let location = Location::in_well(point, &source.labware_id, &source.well_name);
    let tip_was_empty = tip_state.last_liquid_and_air_gap_in_tip.liquid <= 0.0;

    let mut executor = TransferComponentsExecutor::new(core, props, location, Some(source.clone()), tip_state, transfer_type);
    executor.submerge(&aspirate.submerge, PipettingAction::Aspirate)?;
    if tip_was_empty {
        executor.mix(&aspirate.mix, false)?;
        executor.pre_wet(volume)?;
    }
    executor.aspirate_and_wait(total)?;
    if conditioning > 0.0
        && let Some(multi) = props.multi_dispense.as_ref()
    {
        executor.dispense_and_wait(DispenseProfile::Multi(multi), conditioning, Some(0.0))?;
    }
    executor.retract_after_aspiration(volume)?;
    Ok(executor.into_tip_state())
}

fn dispense_step<C: InstrumentCore>(
    core: &mut C,
    props: &TransferProperties,
    dest: &TransferTarget,
    source: &WellRef,
    trash: &Location,
    volume: f64,
    tip_state: TipState,
    add_final_air_gap: bool,
) -> Result<TipState, C::Error> {
    let dispense = &props.dispense;
    let (location, well) = match dest {
        TransferTarget::Well(well) => {
            let position = &dispense.dispense_position;
            let point = absolute_point(core, well, position.position_reference, position.offset, 0.0)?;
            (Location::in_well(point, &well.labware_id, &well.well_name), Some(well.clone()))
        },
        TransferTarget::Trash => (trash.clone(), None),
    };
    let mix_after = dispense.mix.enabled && well.is_some();

    let mut executor = TransferComponentsExecutor::new(core, props, location, well, tip_state, TransferType::OneToOne);
    executor.submerge(&dispense.submerge, PipettingAction::Dispense)?;
    executor.dispense_and_wait(DispenseProfile::Single(dispense), volume, mix_after.then_some(0.0))?;
    if mix_after {
        executor.mix(&dispense.mix, true)?;
    }
    executor.retract_after_dispensing(trash, Some(source), add_final_air_gap)?;
    Ok(executor.into_tip_state())
}

fn resolve_properties<'c, C: InstrumentCore>(core: &C, liquid_class: &'c LiquidClass) -> Result<&'c TransferProperties, C::Error> {
    let tip_rack = core.tip_rack_uri()?;
    liquid_class.get_for(core.pipette_name(), &tip_rack).map_err(|source| {
        TransferError::IncompatibleLiquidClass {
            source,
            context: Some(format!("{} with {tip_rack}", core.pipette_name()).into()),
        }
        .into()
    })
}

/// Largest liquid volume per aspirate that still leaves room for the air gap.
fn max_aspirate_volume<C: InstrumentCore>(core: &C, props: &TransferProperties) -> Result<f64, C::Error> {
    let working_volume = core.working_volume()?;
    let air_gap = props.aspirate.retract.air_gap_by_volume.max_value().max(0.0);
    let max_volume = working_volume - air_gap;
    if max_volume <= 0.0 {
        return Err(TransferError::TipOverflow { volume: 0.0, air_gap, working_volume, context: None }.into());
    }
    Ok(max_volume)
}

fn one_to_one(request: &TransferRequest, source: &WellRef) -> TransferRequest {
    TransferRequest {
        sources: vec![source.clone(); request.destinations.len()],
        new_tip: match request.new_tip {
            TipPolicy::PerSource => TipPolicy::Once,
            policy => policy,
        },
        ..request.clone()
    }
}

fn incompatible_policy(policy: TipPolicy, operation: &'static str) -> TransferError {
    TransferError::IncompatibleTipPolicy { policy: policy.to_string(), operation, context: None }
}
