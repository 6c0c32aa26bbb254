use crate::error::TransferError;
use crate::state::WellRef;
use aliq_domain::config::RobotConfig;
use aliq_domain::{Location, Point};

/// Touch-tip parameters handed to the instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchTipMotion {
    /// Fraction of the well radius.
    pub radius: f64,
    pub mm_from_edge: f64,
    pub z_offset: f64,
    /// mm/s
    pub speed: f64,
}

/// The pipette-level actions and well queries the transfer logic runs against.
///
/// Plunger actions happen in place at the current position; the `location`
/// argument names where that is so the implementation can track liquid.
/// Implementations convert [`TransferError`] into their own error type so that
/// failures from both sides travel through one `Result`.
pub trait InstrumentCore {
    type Error: From<TransferError>;

    fn move_to(
        &mut self,
        location: &Location,
        well: Option<&WellRef>,
        force_direct: bool,
        speed: Option<f64>,
    ) -> Result<(), Self::Error>;

    fn aspirate(&mut self, location: &Location, volume: f64, flow_rate: f64, correction_volume: f64)
    -> Result<(), Self::Error>;

    fn dispense(
        &mut self,
        location: &Location,
        volume: f64,
        flow_rate: f64,
        push_out: f64,
        correction_volume: f64,
    ) -> Result<(), Self::Error>;

    /// Aspirates while the tip follows the falling meniscus from `start` down to `end`.
    fn aspirate_while_tracking(
        &mut self,
        start: &Location,
        end: &Location,
        volume: f64,
        flow_rate: f64,
        correction_volume: f64,
    ) -> Result<(), Self::Error>;

    /// Dispenses while the tip rises with the meniscus from `start` to `end`.
    fn dispense_while_tracking(
        &mut self,
        start: &Location,
        end: &Location,
        volume: f64,
        flow_rate: f64,
        push_out: f64,
        correction_volume: f64,
    ) -> Result<(), Self::Error>;

    /// Expels the air gap at the end of the tip without touching any liquid.
    fn remove_air_gap(&mut self, location: &Location, volume: f64, flow_rate: f64, correction_volume: f64)
    -> Result<(), Self::Error>;

    fn air_gap_in_place(&mut self, volume: f64, flow_rate: f64, correction_volume: f64) -> Result<(), Self::Error>;

    /// Blows out at `location`, moving there first unless `in_place`.
    fn blow_out(&mut self, location: &Location, well: Option<&WellRef>, in_place: bool) -> Result<(), Self::Error>;

    fn set_blow_out_flow_rate(&mut self, flow_rate: f64) -> Result<(), Self::Error>;

    fn touch_tip(&mut self, location: &Location, well: &WellRef, motion: TouchTipMotion) -> Result<(), Self::Error>;

    fn delay(&mut self, seconds: f64) -> Result<(), Self::Error>;

    fn prepare_to_aspirate(&mut self) -> Result<(), Self::Error>;

    // --- tips ---

    fn has_tip(&self) -> bool;

    /// Picks up the next clean tip from the pipette's tip racks.
    fn pick_up_tip(&mut self) -> Result<(), Self::Error>;

    /// Drops the tip into the trash, or back into its rack well.
    fn drop_tip(&mut self, return_to_rack: bool) -> Result<(), Self::Error>;

    // --- queries ---

    fn pipette_name(&self) -> &str;

    /// URI of the attached tip's rack, or of the rack the next pick-up uses.
    fn tip_rack_uri(&self) -> Result<String, Self::Error>;

    /// Liquid plus air currently in the tip, µL.
    fn current_volume(&self) -> f64;

    /// Largest volume the pipette can hold with the attached (or next) tip.
    fn working_volume(&self) -> Result<f64, Self::Error>;

    fn trash_location(&self) -> Result<Location, Self::Error>;

    fn robot_config(&self) -> &RobotConfig;

    /// The pipette senses the liquid surface itself, so tracked heights need no checking.
    fn liquid_presence_detection(&self) -> bool;

    fn well_top(&self, well: &WellRef, z: f64) -> Result<Point, Self::Error>;

    fn well_bottom(&self, well: &WellRef, z: f64) -> Result<Point, Self::Error>;

    fn well_center(&self, well: &WellRef) -> Result<Point, Self::Error>;

    /// Liquid height above the well bottom once `volume_delta` has been added (or removed).
    fn estimate_liquid_height_after(&self, well: &WellRef, volume_delta: f64) -> Result<f64, Self::Error>;

    /// Current liquid height above the well bottom; `None` when the well's contents are unknown.
    fn liquid_height(&self, well: &WellRef) -> Result<Option<f64>, Self::Error>;
}
