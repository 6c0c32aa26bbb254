use crate::deck::Labware;
use crate::error::{LabwareError, Result};
use crate::geometry::{height_from_volume, volume_from_height};
use fxhash::FxHashMap;
use tracing::{debug, warn};

/// Liquid volume tracked per well.
///
/// Wells never loaded or filled are reported as empty; the caller decides whether
/// an unknown well is an error.
#[derive(Debug, Clone, Default)]
pub struct WellLiquids {
    volumes: FxHashMap<(String, String), f64>,
}

impl WellLiquids {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the starting volume of a well.
    ///
    /// # Errors
    /// [`LabwareError::VolumeExceedsCapacity`] above the well's total liquid volume, and
    /// [`LabwareError::WellNotFound`] for an unknown well.
    pub fn load_liquid(&mut self, labware: &Labware, well: &str, volume: f64) -> Result<()> {
        check_capacity(labware, well, volume)?;
        debug!(labware = %labware.id, well, volume, "Liquid loaded");
        self.volumes.insert(key(labware, well), volume);
        Ok(())
    }

    #[must_use]
    pub fn volume(&self, labware_id: &str, well: &str) -> f64 {
        self.volumes.get(&(labware_id.to_owned(), well.to_owned())).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn is_tracked(&self, labware_id: &str, well: &str) -> bool {
        self.volumes.contains_key(&(labware_id.to_owned(), well.to_owned()))
    }

    /// Adds dispensed liquid.
    ///
    /// # Errors
    /// Same as [`WellLiquids::load_liquid`].
    pub fn add(&mut self, labware: &Labware, well: &str, volume: f64) -> Result<f64> {
        let total = self.volume(&labware.id, well) + volume;
        check_capacity(labware, well, total)?;
        self.volumes.insert(key(labware, well), total);
        Ok(total)
    }

    /// Removes aspirated liquid.
    ///
    /// Wells that were never filled are treated as holding an unknown amount and go
    /// untracked; a tracked well cannot go below zero.
    ///
    /// # Errors
    /// Returns [`LabwareError::NotEnoughLiquid`] when a tracked well holds less than
    /// `volume`.
    pub fn remove(&mut self, labware: &Labware, well: &str, volume: f64) -> Result<f64> {
        let Some(current) = self.volumes.get_mut(&key(labware, well)) else {
            warn!(labware = %labware.id, well, volume, "Aspirating from a well with no tracked liquid");
            return Ok(0.0);
        };
        if volume > *current + 1e-9 {
            return Err(LabwareError::NotEnoughLiquid {
                volume,
                available: *current,
                well_name: well.to_owned(),
                context: None,
            });
        }
        *current = (*current - volume).max(0.0);
        Ok(*current)
    }

    /// Liquid height above the well bottom after adding `delta` µL (negative to remove).
    ///
    /// Uses the well's inner geometry when the definition has one, otherwise treats the
    /// well as straight-walled.
    ///
    /// # Errors
    /// [`LabwareError::OutOfRange`] when the resulting volume does not fit the well.
    pub fn estimate_liquid_height_after(&self, labware: &Labware, well: &str, delta: f64) -> Result<f64> {
        let definition = labware.well(well)?;
        let volume = (self.volume(&labware.id, well) + delta).max(0.0);
        match labware.definition.geometry_for(definition) {
            Some(geometry) => height_from_volume(geometry, volume),
            None => {
                let height = volume / definition.shape.area();
                if height > definition.depth {
                    Err(LabwareError::out_of_range("volume", volume, definition.depth * definition.shape.area()))
                } else {
                    Ok(height)
                }
            },
        }
    }

    /// Volume held below `height` in a well.
    ///
    /// # Errors
    /// [`LabwareError::OutOfRange`] for a height outside the well.
    pub fn volume_at_height(labware: &Labware, well: &str, height: f64) -> Result<f64> {
        let definition = labware.well(well)?;
        match labware.definition.geometry_for(definition) {
            Some(geometry) => volume_from_height(geometry, height),
            None if (0.0..=definition.depth).contains(&height) => Ok(height * definition.shape.area()),
            None => Err(LabwareError::out_of_range("height", height, definition.depth)),
        }
    }
}

fn key(labware: &Labware, well: &str) -> (String, String) {
    (labware.id.clone(), well.to_owned())
}

fn check_capacity(labware: &Labware, well: &str, volume: f64) -> Result<()> {
    let max_volume = labware.well(well)?.total_liquid_volume;
    if volume > max_volume + 1e-9 {
        return Err(LabwareError::VolumeExceedsCapacity {
            volume,
            max_volume,
            well_name: well.to_owned(),
            labware: labware.load_name().to_owned(),
            context: None,
        });
    }
    Ok(())
}
