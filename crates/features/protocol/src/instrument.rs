use crate::engine::ProtocolEngine;
use crate::error::{ProtocolError, Result};
use aliq_domain::config::RobotConfig;
use aliq_domain::{Location, Mount, Point};
use aliq_labware::Labware;
use aliq_transfer::{InstrumentCore, TouchTipMotion, WellRef};

/// One pipette of a [`ProtocolEngine`], seen through the transfer logic's eyes.
#[derive(Debug)]
pub struct EngineInstrument<'e> {
    engine: &'e mut ProtocolEngine,
    mount: Mount,
    name: String,
}

impl<'e> EngineInstrument<'e> {
    pub(crate) const fn new(engine: &'e mut ProtocolEngine, mount: Mount, name: String) -> Self {
        Self { engine, mount, name }
    }

    fn labware(&self, well: &WellRef) -> Result<&Labware> {
        Ok(self.engine.deck.labware(&well.labware_id)?)
    }

    /// Tip capacity and rack URI of the attached tip, or of the tip the next pick-up takes.
    fn tip_details(&self) -> Result<(f64, String)> {
        let pipette = self.engine.pipette_ref(self.mount)?;
        if let Some(tip) = &pipette.tip {
            return Ok((pipette.working_volume_with(tip.max_volume), tip.rack_uri.clone()));
        }
        let (rack_id, well_name) = self.engine.next_tip(self.mount)?;
        let rack = self.engine.deck.labware(&rack_id)?;
        let max_volume = rack.well(&well_name)?.total_liquid_volume;
        Ok((pipette.working_volume_with(max_volume), rack.uri()))
    }
}

impl InstrumentCore for EngineInstrument<'_> {
    type Error = ProtocolError;

    fn move_to(&mut self, location: &Location, _well: Option<&WellRef>, force_direct: bool, speed: Option<f64>) -> Result<()> {
        self.engine.move_pipette(self.mount, location.clone(), force_direct, speed)
    }

    fn aspirate(&mut self, location: &Location, volume: f64, flow_rate: f64, correction_volume: f64) -> Result<()> {
        self.engine.aspirate_in_place(self.mount, location, volume, flow_rate, correction_volume)
    }

    fn dispense(
        &mut self,
        location: &Location,
        volume: f64,
        flow_rate: f64,
        push_out: f64,
        correction_volume: f64,
    ) -> Result<()> {
        self.engine.dispense_in_place(self.mount, location, volume, flow_rate, push_out, correction_volume)
    }

    fn aspirate_while_tracking(
        &mut self,
        start: &Location,
        end: &Location,
        volume: f64,
        flow_rate: f64,
        correction_volume: f64,
    ) -> Result<()> {
        self.engine.aspirate_while_tracking(self.mount, start, end, volume, flow_rate, correction_volume)
    }

    fn dispense_while_tracking(
        &mut self,
        start: &Location,
        end: &Location,
        volume: f64,
        flow_rate: f64,
        push_out: f64,
        correction_volume: f64,
    ) -> Result<()> {
        self.engine.dispense_while_tracking(self.mount, start, end, volume, flow_rate, push_out, correction_volume)
    }

    fn remove_air_gap(&mut self, _location: &Location, volume: f64, flow_rate: f64, correction_volume: f64) -> Result<()> {
        self.engine.remove_air_gap(self.mount, volume, flow_rate, correction_volume)
    }

    fn air_gap_in_place(&mut self, volume: f64, flow_rate: f64, correction_volume: f64) -> Result<()> {
        self.engine.air_gap_in_place(self.mount, volume, flow_rate, correction_volume)
    }

    fn blow_out(&mut self, location: &Location, _well: Option<&WellRef>, in_place: bool) -> Result<()> {
        if !in_place {
            self.engine.move_pipette(self.mount, location.clone(), false, None)?;
        }
        self.engine.blow_out_in_place(self.mount, location)
    }

    fn set_blow_out_flow_rate(&mut self, flow_rate: f64) -> Result<()> {
        self.engine.set_blow_out_flow_rate(self.mount, flow_rate)
    }

    fn touch_tip(&mut self, location: &Location, well: &WellRef, motion: TouchTipMotion) -> Result<()> {
        self.engine.touch_tip_at(self.mount, location, well, motion.radius, motion.z_offset, motion.speed)
    }

    fn delay(&mut self, seconds: f64) -> Result<()> {
        self.engine.delay(seconds, None)
    }

    fn prepare_to_aspirate(&mut self) -> Result<()> {
        self.engine.prepare_to_aspirate(self.mount)
    }

    fn has_tip(&self) -> bool {
        self.engine.pipette(self.mount).is_some_and(|pipette| pipette.has_tip())
    }

    fn pick_up_tip(&mut self) -> Result<()> {
        self.engine.pick_up_tip(self.mount, None)
    }

    fn drop_tip(&mut self, return_to_rack: bool) -> Result<()> {
        if return_to_rack { self.engine.return_tip(self.mount) } else { self.engine.drop_tip(self.mount) }
    }

    fn pipette_name(&self) -> &str {
        &self.name
    }

    fn tip_rack_uri(&self) -> Result<String> {
        self.tip_details().map(|(_, uri)| uri)
    }

    fn current_volume(&self) -> f64 {
        self.engine.pipette(self.mount).map_or(0.0, |pipette| pipette.current_volume)
    }

    fn working_volume(&self) -> Result<f64> {
        self.tip_details().map(|(volume, _)| volume)
    }

    fn trash_location(&self) -> Result<Location> {
        self.engine.trash_location()
    }

    fn robot_config(&self) -> &RobotConfig {
        &self.engine.robot
    }

    fn liquid_presence_detection(&self) -> bool {
        self.engine.pipette(self.mount).is_some_and(|pipette| pipette.liquid_presence_detection)
    }

    fn well_top(&self, well: &WellRef, z: f64) -> Result<Point> {
        Ok(self.labware(well)?.well_top(&well.well_name, z)?)
    }

    fn well_bottom(&self, well: &WellRef, z: f64) -> Result<Point> {
        Ok(self.labware(well)?.well_bottom(&well.well_name, z)?)
    }

    fn well_center(&self, well: &WellRef) -> Result<Point> {
        Ok(self.labware(well)?.well_center(&well.well_name)?)
    }

    fn estimate_liquid_height_after(&self, well: &WellRef, volume_delta: f64) -> Result<f64> {
        let labware = self.labware(well)?;
        Ok(self.engine.liquids.estimate_liquid_height_after(labware, &well.well_name, volume_delta)?)
    }

    fn liquid_height(&self, well: &WellRef) -> Result<Option<f64>> {
        if !self.engine.liquids.is_tracked(&well.labware_id, &well.well_name) {
            return Ok(None);
        }
        self.estimate_liquid_height_after(well, 0.0).map(Some)
    }
}
