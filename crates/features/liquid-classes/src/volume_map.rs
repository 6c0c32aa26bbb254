use crate::error::{LiquidClassError, Result};
use serde::{Deserialize, Serialize};

/// A property that varies with the volume being handled.
///
/// Stored as `(volume, value)` pairs sorted by volume. Lookups interpolate linearly
/// between neighbouring entries and clamp to the first or last value outside the
/// defined range. Serialized as `[[volume, value], ...]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(f64, f64)>", into = "Vec<(f64, f64)>")]
pub struct VolumeMap {
    entries: Vec<(f64, f64)>,
}

impl VolumeMap {
    /// Builds a map from unordered pairs.
    ///
    /// # Errors
    /// Returns [`LiquidClassError::VolumeMap`] when `pairs` is empty, holds a negative or
    /// non-finite volume, or repeats a volume.
    pub fn new(pairs: impl IntoIterator<Item = (f64, f64)>) -> Result<Self> {
        let mut entries: Vec<(f64, f64)> = pairs.into_iter().collect();
        if entries.is_empty() {
            return Err(LiquidClassError::volume_map("at least one entry is required"));
        }
        if let Some((volume, _)) = entries.iter().find(|(v, value)| !v.is_finite() || *v < 0.0 || !value.is_finite()) {
            return Err(LiquidClassError::volume_map(format!("invalid entry at volume {volume}")));
        }
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        if entries.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(LiquidClassError::volume_map("duplicate volume entries"));
        }
        Ok(Self { entries })
    }

    /// A map holding the same value for every volume.
    #[must_use]
    pub fn constant(value: f64) -> Self {
        Self { entries: vec![(0.0, value)] }
    }

    /// Returns the value for `volume`, interpolating between defined points.
    #[must_use]
    pub fn get_for_volume(&self, volume: f64) -> f64 {
        let (first, last) = (self.entries[0], self.entries[self.entries.len() - 1]);
        if volume <= first.0 {
            return first.1;
        }
        if volume >= last.0 {
            return last.1;
        }

        let upper = self.entries.partition_point(|(v, _)| *v < volume);
        let (v1, y1) = self.entries[upper];
        if v1 == volume {
            return y1;
        }
        let (v0, y0) = self.entries[upper - 1];
        y0 + (y1 - y0) * (volume - v0) / (v1 - v0)
    }

    /// Inserts or overwrites the entry for `volume`.
    ///
    /// # Errors
    /// Returns [`LiquidClassError::VolumeMap`] for a negative or non-finite volume.
    pub fn set_for_volume(&mut self, volume: f64, value: f64) -> Result<()> {
        if !volume.is_finite() || volume < 0.0 || !value.is_finite() {
            return Err(LiquidClassError::volume_map(format!("cannot set {value} at volume {volume}")));
        }
        match self.entries.binary_search_by(|(v, _)| v.total_cmp(&volume)) {
            Ok(idx) => self.entries[idx].1 = value,
            Err(idx) => self.entries.insert(idx, (volume, value)),
        }
        Ok(())
    }

    /// Removes the entry defined exactly at `volume`.
    ///
    /// # Errors
    /// Returns [`LiquidClassError::VolumeMap`] when no such entry exists or when it is the
    /// last remaining entry.
    pub fn delete_for_volume(&mut self, volume: f64) -> Result<()> {
        let idx = self
            .entries
            .iter()
            .position(|(v, _)| *v == volume)
            .ok_or_else(|| LiquidClassError::volume_map(format!("no entry defined at volume {volume}")))?;
        if self.entries.len() == 1 {
            return Err(LiquidClassError::volume_map("cannot delete the only entry"));
        }
        self.entries.remove(idx);
        Ok(())
    }

    #[must_use]
    pub fn as_pairs(&self) -> &[(f64, f64)] {
        &self.entries
    }

    /// Largest value over all defined points.
    #[must_use]
    pub fn max_value(&self) -> f64 {
        self.entries.iter().map(|(_, value)| *value).fold(f64::NEG_INFINITY, f64::max)
    }
}

impl TryFrom<Vec<(f64, f64)>> for VolumeMap {
    type Error = LiquidClassError;

    fn try_from(pairs: Vec<(f64, f64)>) -> Result<Self> {
        Self::new(pairs)
    }
}

impl From<VolumeMap> for Vec<(f64, f64)> {
    fn from(map: VolumeMap) -> Self {
        map.entries
    }
}
