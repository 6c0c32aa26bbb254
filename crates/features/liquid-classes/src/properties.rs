//! Transfer properties of a liquid class for one pipette and tip type.
//!
//! The structures mirror the liquid class definition schema. Toggleable behaviours
//! (delays, touch tip, mix, blowout) are stored on the wire as
//! `{"enable": bool, "params": {...}}` and flattened here into an `enabled` flag plus
//! typed parameters. Enabling a behaviour goes through a validating setter.

use crate::error::{LiquidClassError, Result};
use crate::volume_map::VolumeMap;
use aliq_domain::Point;
use aliq_domain::liquid::{BlowoutLocation, PositionReference};
use serde::{Deserialize, Serialize};

/// A position relative to a reference point of the well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TipPosition {
    pub position_reference: PositionReference,
    #[serde(default)]
    pub offset: Point,
}

impl TipPosition {
    #[must_use]
    pub const fn new(position_reference: PositionReference, offset: Point) -> Self {
        Self { position_reference, offset }
    }
}

/// On-the-wire shape of a toggleable behaviour. Params are written only when enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toggle<P> {
    pub enable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<P>,
}

fn require_params<P>(toggle: Toggle<P>, what: &str) -> Result<(bool, Option<P>)> {
    if toggle.enable && toggle.params.is_none() {
        return Err(LiquidClassError::invalid_property(format!("{what} is enabled but has no params")));
    }
    Ok((toggle.enable, toggle.params))
}

fn non_negative(value: f64, what: &str) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(LiquidClassError::invalid_property(format!("{what} must be a non-negative number, got {value}")))
    }
}

fn positive(value: f64, what: &str) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(LiquidClassError::invalid_property(format!("{what} must be greater than zero, got {value}")))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DelayParams {
    pub duration: f64,
}

/// Pause in place for `duration` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Toggle<DelayParams>", into = "Toggle<DelayParams>")]
pub struct DelayProperties {
    pub enabled: bool,
    pub duration: f64,
}

impl DelayProperties {
    /// # Errors
    /// Returns [`LiquidClassError::InvalidProperty`] for a negative duration.
    pub fn enable(&mut self, duration: f64) -> Result<()> {
        self.duration = non_negative(duration, "delay duration")?;
        self.enabled = true;
        Ok(())
    }

    pub const fn disable(&mut self) {
        self.enabled = false;
    }
}

impl TryFrom<Toggle<DelayParams>> for DelayProperties {
    type Error = LiquidClassError;

    fn try_from(toggle: Toggle<DelayParams>) -> Result<Self> {
        let (enabled, params) = require_params(toggle, "delay")?;
        let duration = params.map_or(Ok(0.0), |p| non_negative(p.duration, "delay duration"))?;
        Ok(Self { enabled, duration })
    }
}

impl From<DelayProperties> for Toggle<DelayParams> {
    fn from(props: DelayProperties) -> Self {
        Self { enable: props.enabled, params: props.enabled.then_some(DelayParams { duration: props.duration }) }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TouchTipParams {
    pub z_offset: f64,
    pub mm_from_edge: f64,
    pub speed: f64,
}

/// Touch the tip against the well walls to shed hanging droplets.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Toggle<TouchTipParams>", into = "Toggle<TouchTipParams>")]
pub struct TouchTipProperties {
    pub enabled: bool,
    pub z_offset: f64,
    pub mm_from_edge: f64,
    pub speed: f64,
}

impl TouchTipProperties {
    /// # Errors
    /// Returns [`LiquidClassError::InvalidProperty`] for a non-positive speed.
    pub fn enable(&mut self, z_offset: f64, mm_from_edge: f64, speed: f64) -> Result<()> {
        self.speed = positive(speed, "touch tip speed")?;
        self.z_offset = z_offset;
        self.mm_from_edge = mm_from_edge;
        self.enabled = true;
        Ok(())
    }

    pub const fn disable(&mut self) {
        self.enabled = false;
    }
}

impl TryFrom<Toggle<TouchTipParams>> for TouchTipProperties {
    type Error = LiquidClassError;

    fn try_from(toggle: Toggle<TouchTipParams>) -> Result<Self> {
        let (enabled, params) = require_params(toggle, "touch tip")?;
        let Some(p) = params else {
            return Ok(Self { enabled, ..Self::default() });
        };
        Ok(Self { enabled, z_offset: p.z_offset, mm_from_edge: p.mm_from_edge, speed: positive(p.speed, "touch tip speed")? })
    }
}

impl From<TouchTipProperties> for Toggle<TouchTipParams> {
    fn from(props: TouchTipProperties) -> Self {
        Self {
            enable: props.enabled,
            params: props.enabled.then_some(TouchTipParams {
                z_offset: props.z_offset,
                mm_from_edge: props.mm_from_edge,
                speed: props.speed,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MixParams {
    pub repetitions: u32,
    pub volume: f64,
}

/// Aspirate and dispense `volume` in place, `repetitions` times.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Toggle<MixParams>", into = "Toggle<MixParams>")]
pub struct MixProperties {
    pub enabled: bool,
    pub repetitions: u32,
    pub volume: f64,
}

impl MixProperties {
    /// # Errors
    /// Returns [`LiquidClassError::InvalidProperty`] for zero repetitions or a non-positive volume.
    pub fn enable(&mut self, repetitions: u32, volume: f64) -> Result<()> {
        if repetitions == 0 {
            return Err(LiquidClassError::invalid_property("mix repetitions must be at least 1"));
        }
        self.volume = positive(volume, "mix volume")?;
        self.repetitions = repetitions;
        self.enabled = true;
        Ok(())
    }

    pub const fn disable(&mut self) {
        self.enabled = false;
    }
}

impl TryFrom<Toggle<MixParams>> for MixProperties {
    type Error = LiquidClassError;

    fn try_from(toggle: Toggle<MixParams>) -> Result<Self> {
        let (enabled, params) = require_params(toggle, "mix")?;
        let mut props = Self::default();
        if let Some(p) = params {
            props.enable(p.repetitions, p.volume)?;
        }
        props.enabled = enabled;
        Ok(props)
    }
}

impl From<MixProperties> for Toggle<MixParams> {
    fn from(props: MixProperties) -> Self {
        Self {
            enable: props.enabled,
            params: props.enabled.then_some(MixParams { repetitions: props.repetitions, volume: props.volume }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlowoutParams {
    pub location: BlowoutLocation,
    pub flow_rate: f64,
}

/// Push residual liquid out of the tip after a dispense.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Toggle<BlowoutParams>", into = "Toggle<BlowoutParams>")]
pub struct BlowoutProperties {
    pub enabled: bool,
    pub location: BlowoutLocation,
    pub flow_rate: f64,
}

impl Default for BlowoutProperties {
    fn default() -> Self {
        Self { enabled: false, location: BlowoutLocation::Trash, flow_rate: 0.0 }
    }
}

impl BlowoutProperties {
    /// # Errors
    /// Returns [`LiquidClassError::InvalidProperty`] for a non-positive flow rate.
    pub fn enable(&mut self, location: BlowoutLocation, flow_rate: f64) -> Result<()> {
        self.flow_rate = positive(flow_rate, "blowout flow rate")?;
        self.location = location;
        self.enabled = true;
        Ok(())
    }

    pub const fn disable(&mut self) {
        self.enabled = false;
    }
}

impl TryFrom<Toggle<BlowoutParams>> for BlowoutProperties {
    type Error = LiquidClassError;

    fn try_from(toggle: Toggle<BlowoutParams>) -> Result<Self> {
        let (enabled, params) = require_params(toggle, "blowout")?;
        let mut props = Self::default();
        if let Some(p) = params {
            props.enable(p.location, p.flow_rate)?;
        }
        props.enabled = enabled;
        Ok(props)
    }
}

impl From<BlowoutProperties> for Toggle<BlowoutParams> {
    fn from(props: BlowoutProperties) -> Self {
        Self {
            enable: props.enabled,
            params: props.enabled.then_some(BlowoutParams { location: props.location, flow_rate: props.flow_rate }),
        }
    }
}

/// Movement of the tip from above the well into the liquid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submerge {
    pub start_position: TipPosition,
    /// mm/s
    pub speed: f64,
    pub delay: DelayProperties,
}

/// Movement out of the source well after aspirating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetractAspirate {
    pub end_position: TipPosition,
    pub speed: f64,
    pub air_gap_by_volume: VolumeMap,
    pub touch_tip: TouchTipProperties,
    pub delay: DelayProperties,
}

/// Movement out of the destination well after dispensing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetractDispense {
    pub end_position: TipPosition,
    pub speed: f64,
    pub touch_tip: TouchTipProperties,
    pub delay: DelayProperties,
    pub blowout: BlowoutProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AspirateProperties {
    pub submerge: Submerge,
    pub retract: RetractAspirate,
    pub aspirate_position: TipPosition,
    /// µL/s by aspirated volume.
    pub flow_rate_by_volume: VolumeMap,
    /// Plunger correction (µL) by volume in the tip after aspirating.
    pub correction_by_volume: VolumeMap,
    pub pre_wet: bool,
    pub mix: MixProperties,
    pub delay: DelayProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleDispenseProperties {
    pub submerge: Submerge,
    pub retract: RetractDispense,
    pub dispense_position: TipPosition,
    pub flow_rate_by_volume: VolumeMap,
    pub correction_by_volume: VolumeMap,
    pub mix: MixProperties,
    /// Extra plunger travel (µL) past the bottom position, by dispensed volume.
    pub push_out_by_volume: VolumeMap,
    pub delay: DelayProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiDispenseProperties {
    pub submerge: Submerge,
    pub retract: RetractDispense,
    pub dispense_position: TipPosition,
    pub flow_rate_by_volume: VolumeMap,
    pub correction_by_volume: VolumeMap,
    /// Volume dispensed back into the source to condition the tip, by total aspirated volume.
    pub conditioning_by_volume: VolumeMap,
    /// Extra volume aspirated and later discarded, by total dispense volume.
    pub disposal_by_volume: VolumeMap,
    pub delay: DelayProperties,
}

/// Everything needed to move liquid with one pipette and tip type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferProperties {
    pub aspirate: AspirateProperties,
    #[serde(rename = "singleDispense")]
    pub dispense: SingleDispenseProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_dispense: Option<MultiDispenseProperties>,
}
