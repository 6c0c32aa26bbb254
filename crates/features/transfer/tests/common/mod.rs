#![allow(dead_code)]

use aliq_domain::config::RobotConfig;
use aliq_domain::liquid::PositionReference;
use aliq_domain::{Location, LocationTarget, Point};
use aliq_liquid_classes::properties::{DelayProperties, TipPosition, TransferProperties};
use aliq_liquid_classes::{LiquidClass, LiquidClassRegistry, VolumeMap};
use aliq_transfer::*;
use std::sync::Arc;

type Result<T> = std::result::Result<T, TransferError>;

pub const PIPETTE: &str = "flex_1channel_50";
pub const TIPRACK_50: &str = "opentrons/opentrons_flex_96_tiprack_50ul/1";

pub const WELL_TOP_Z: f64 = 50.0;
pub const WELL_BOTTOM_Z: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    MoveTo { location: Location, force_direct: bool, speed: Option<f64> },
    Aspirate { volume: f64, flow_rate: f64, correction: f64 },
    Dispense { volume: f64, flow_rate: f64, push_out: f64, correction: f64 },
    AspirateWhileTracking { start: Location, end: Location, volume: f64 },
    DispenseWhileTracking { start: Location, end: Location, volume: f64, push_out: f64 },
    RemoveAirGap { volume: f64, flow_rate: f64, correction: f64 },
    AirGap { volume: f64, flow_rate: f64, correction: f64 },
    BlowOut { location: Location, in_place: bool },
    SetBlowOutFlowRate(f64),
    TouchTip { well: WellRef, motion: TouchTipMotion },
    Delay(f64),
    PrepareToAspirate,
    PickUpTip,
    DropTip { return_to_rack: bool },
}

/// Records every instrument call. Every well shares the same geometry: x 10, y 20,
/// bottom at z 10, top at z 50.
#[derive(Debug)]
pub struct RecordingCore {
    pub calls: Vec<Call>,
    pub volume: f64,
    pub tip_attached: bool,
    pub pipette: String,
    pub tip_rack: String,
    pub working_volume: f64,
    pub robot: RobotConfig,
    /// Tracked liquid height above the bottom; `None` for wells without liquid info.
    pub liquid_height: Option<f64>,
    pub estimated_height: f64,
    /// Meniscus rise per µL added, for estimates after a volume change.
    pub mm_per_ul: f64,
}

impl Default for RecordingCore {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            volume: 0.0,
            tip_attached: true,
            pipette: PIPETTE.into(),
            tip_rack: TIPRACK_50.into(),
            working_volume: 50.0,
            robot: RobotConfig::default(),
            liquid_height: None,
            estimated_height: 20.0,
            mm_per_ul: 0.0,
        }
    }
}

impl RecordingCore {
    pub fn without_tip() -> Self {
        Self { tip_attached: false, ..Self::default() }
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| matches(call)).count()
    }

    pub fn aspirated(&self) -> Vec<f64> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Aspirate { volume, .. } => Some(*volume),
                _ => None,
            })
            .collect()
    }

    pub fn dispensed(&self) -> Vec<f64> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Dispense { volume, .. } => Some(*volume),
                _ => None,
            })
            .collect()
    }
}

pub fn point(z: f64) -> Point {
    Point::new(10.0, 20.0, z)
}

pub fn at(well: &WellRef, z: f64) -> Location {
    Location::in_well(point(z), &well.labware_id, &well.well_name)
}

pub fn trash() -> Location {
    Location::new(Point::new(300.0, 300.0, 80.0), LocationTarget::TrashBin { trash_id: "trash-1".into() })
}

impl InstrumentCore for RecordingCore {
    type Error = TransferError;

    fn move_to(&mut self, location: &Location, _well: Option<&WellRef>, force_direct: bool, speed: Option<f64>) -> Result<()> {
        self.calls.push(Call::MoveTo { location: location.clone(), force_direct, speed });
        Ok(())
    }

    fn aspirate(&mut self, _location: &Location, volume: f64, flow_rate: f64, correction: f64) -> Result<()> {
        self.volume += volume;
        self.calls.push(Call::Aspirate { volume, flow_rate, correction });
        Ok(())
    }

    fn dispense(&mut self, _location: &Location, volume: f64, flow_rate: f64, push_out: f64, correction: f64) -> Result<()> {
        self.volume = (self.volume - volume).max(0.0);
        self.calls.push(Call::Dispense { volume, flow_rate, push_out, correction });
        Ok(())
    }

    fn aspirate_while_tracking(
        &mut self,
        start: &Location,
        end: &Location,
        volume: f64,
        _flow_rate: f64,
        _correction: f64,
    ) -> Result<()> {
        self.volume += volume;
        self.calls.push(Call::AspirateWhileTracking { start: start.clone(), end: end.clone(), volume });
        Ok(())
    }

    fn dispense_while_tracking(
        &mut self,
        start: &Location,
        end: &Location,
        volume: f64,
        _flow_rate: f64,
        push_out: f64,
        _correction: f64,
    ) -> Result<()> {
        self.volume = (self.volume - volume).max(0.0);
        self.calls.push(Call::DispenseWhileTracking { start: start.clone(), end: end.clone(), volume, push_out });
        Ok(())
    }

    fn remove_air_gap(&mut self, _location: &Location, volume: f64, flow_rate: f64, correction: f64) -> Result<()> {
        self.volume = (self.volume - volume).max(0.0);
        self.calls.push(Call::RemoveAirGap { volume, flow_rate, correction });
        Ok(())
    }

    fn air_gap_in_place(&mut self, volume: f64, flow_rate: f64, correction: f64) -> Result<()> {
        self.volume += volume;
        self.calls.push(Call::AirGap { volume, flow_rate, correction });
        Ok(())
    }

    fn blow_out(&mut self, location: &Location, _well: Option<&WellRef>, in_place: bool) -> Result<()> {
        self.volume = 0.0;
        self.calls.push(Call::BlowOut { location: location.clone(), in_place });
        Ok(())
    }

    fn set_blow_out_flow_rate(&mut self, flow_rate: f64) -> Result<()> {
        self.calls.push(Call::SetBlowOutFlowRate(flow_rate));
        Ok(())
    }

    fn touch_tip(&mut self, _location: &Location, well: &WellRef, motion: TouchTipMotion) -> Result<()> {
        self.calls.push(Call::TouchTip { well: well.clone(), motion });
        Ok(())
    }

    fn delay(&mut self, seconds: f64) -> Result<()> {
        self.calls.push(Call::Delay(seconds));
        Ok(())
    }

    fn prepare_to_aspirate(&mut self) -> Result<()> {
        self.calls.push(Call::PrepareToAspirate);
        Ok(())
    }

    fn has_tip(&self) -> bool {
        self.tip_attached
    }

    fn pick_up_tip(&mut self) -> Result<()> {
        if self.tip_attached {
            return Err(TransferError::from("tip already attached"));
        }
        self.tip_attached = true;
        self.volume = 0.0;
        self.calls.push(Call::PickUpTip);
        Ok(())
    }

    fn drop_tip(&mut self, return_to_rack: bool) -> Result<()> {
        self.tip_attached = false;
        self.volume = 0.0;
        self.calls.push(Call::DropTip { return_to_rack });
        Ok(())
    }

    fn pipette_name(&self) -> &str {
        &self.pipette
    }

    fn tip_rack_uri(&self) -> Result<String> {
        Ok(self.tip_rack.clone())
    }

    fn current_volume(&self) -> f64 {
        self.volume
    }

    fn working_volume(&self) -> Result<f64> {
        Ok(self.working_volume)
    }

    fn trash_location(&self) -> Result<Location> {
        Ok(trash())
    }

    fn robot_config(&self) -> &RobotConfig {
        &self.robot
    }

    fn liquid_presence_detection(&self) -> bool {
        self.robot.liquid_presence_detection
    }

    fn well_top(&self, _well: &WellRef, z: f64) -> Result<Point> {
        Ok(point(WELL_TOP_Z + z))
    }

    fn well_bottom(&self, _well: &WellRef, z: f64) -> Result<Point> {
        Ok(point(WELL_BOTTOM_Z + z))
    }

    fn well_center(&self, _well: &WellRef) -> Result<Point> {
        Ok(point(30.0))
    }

    fn estimate_liquid_height_after(&self, _well: &WellRef, volume_delta: f64) -> Result<f64> {
        Ok(self.estimated_height + volume_delta * self.mm_per_ul)
    }

    fn liquid_height(&self, _well: &WellRef) -> Result<Option<f64>> {
        Ok(self.liquid_height)
    }
}

pub fn water() -> Arc<LiquidClass> {
    LiquidClassRegistry::with_builtins().unwrap().get("water").unwrap()
}

pub fn glycerol() -> Arc<LiquidClass> {
    LiquidClassRegistry::with_builtins().unwrap().get("glycerol_50").unwrap()
}

const fn delay(duration: f64) -> DelayProperties {
    DelayProperties { enabled: true, duration }
}

/// Water properties for the 50 µL pipette with round numbers everywhere:
///
/// * submerge from 2 mm above the top (aspirate at 100 mm/s, dispense at 80 mm/s),
///   aspirate submerge waits 1.1 s
/// * aspirate and dispense 1 mm above the bottom at 50 µL/s, no correction
/// * aspirate delay 0.2 s, dispense delay 0.5 s, push-out 2 µL
/// * retract to 2 mm above the top (aspirate at 50 mm/s, dispense at 40 mm/s)
/// * no air gap, no blowout, no touch tip, no mixing
pub fn properties() -> TransferProperties {
    let mut props = water().get_for(PIPETTE, TIPRACK_50).unwrap().clone();
    let above_top = TipPosition::new(PositionReference::WellTop, Point::new(0.0, 0.0, 2.0));
    let above_bottom = TipPosition::new(PositionReference::WellBottom, Point::new(0.0, 0.0, 1.0));

    let aspirate = &mut props.aspirate;
    aspirate.submerge.start_position = above_top.clone();
    aspirate.submerge.speed = 100.0;
    aspirate.submerge.delay = delay(1.1);
    aspirate.retract.end_position = above_top.clone();
    aspirate.retract.speed = 50.0;
    aspirate.retract.air_gap_by_volume = VolumeMap::constant(0.0);
    aspirate.retract.touch_tip.enabled = false;
    aspirate.retract.delay = DelayProperties::default();
    aspirate.aspirate_position = above_bottom.clone();
    aspirate.flow_rate_by_volume = VolumeMap::constant(50.0);
    aspirate.correction_by_volume = VolumeMap::constant(0.0);
    aspirate.pre_wet = false;
    aspirate.mix.enabled = false;
    aspirate.delay = delay(0.2);

    let dispense = &mut props.dispense;
    dispense.submerge.start_position = above_top.clone();
    dispense.submerge.speed = 80.0;
    dispense.submerge.delay = DelayProperties::default();
    dispense.retract.end_position = above_top;
    dispense.retract.speed = 40.0;
    dispense.retract.touch_tip.enabled = false;
    dispense.retract.delay = DelayProperties::default();
    dispense.retract.blowout.enabled = false;
    dispense.dispense_position = above_bottom;
    dispense.flow_rate_by_volume = VolumeMap::constant(50.0);
    dispense.correction_by_volume = VolumeMap::constant(0.0);
    dispense.mix.enabled = false;
    dispense.push_out_by_volume = VolumeMap::constant(2.0);
    dispense.delay = delay(0.5);

    props
}
