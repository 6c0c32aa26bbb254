use crate::DeckSlotName;
use serde::Deserialize;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

/// Top-level simulator configuration.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimConfigInner {
    pub logging: LoggingConfig,
    pub robot: RobotConfig,
    pub definitions: DefinitionsConfig,
}

/// Thin Arc-wrapped config for inexpensive cloning into slices.
#[derive(Default, Debug, Clone, Deserialize)]
pub struct SimConfig {
    #[serde(flatten, default)]
    inner: Arc<SimConfigInner>,
}

impl Deref for SimConfig {
    type Target = SimConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for SimConfig {
    fn deref_mut(&mut self) -> &mut SimConfigInner {
        Arc::make_mut(&mut self.inner)
    }
}

/// Log output settings consumed by the logger.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level directive (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Extra `tracing` filter directives, e.g. `aliq_transfer=debug`.
    pub filter: Option<String>,
    pub console: bool,
    /// Directory for rolling log files; file output is off when unset.
    pub directory: Option<PathBuf>,
    pub json: bool,
    pub max_files: usize,
}

/// Physical constants of the simulated robot.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Height above the well top at which air gaps are taken.
    pub air_gap_safe_offset_mm: f64,
    /// Touch-tip radius as a fraction of the well radius.
    pub touch_tip_radius: f64,
    /// Default for pipettes with a pressure sensor: aspirating more than a tracked well
    /// holds fails instead of emptying it.
    pub liquid_presence_detection: bool,
    /// Slot used when a protocol asks for the default trash bin.
    pub trash_slot: DeckSlotName,
}

/// Extra definition directories layered over the built-in ones.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DefinitionsConfig {
    pub labware_dir: Option<PathBuf>,
    pub liquid_class_dir: Option<PathBuf>,
}

// --- Default ---

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            filter: None,
            console: true,
            directory: None,
            json: false,
            max_files: 10,
        }
    }
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            air_gap_safe_offset_mm: 2.0,
            touch_tip_radius: 1.0,
            liquid_presence_detection: false,
            trash_slot: DeckSlotName::A3,
        }
    }
}
