//! Labware definition files.
//!
//! The layout follows the JSON labware schema (v2): an `ordering` of well names by
//! column, a `wells` table with per-well offsets and shape, `parameters` describing
//! tip racks, and optional `innerLabwareGeometry` used for liquid height math.

use crate::error::{LabwareError, Result};
use crate::geometry::WellGeometry;
use aliq_domain::Point;
use fxhash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabwareDefinition {
    pub namespace: String,
    pub version: u32,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub metadata: LabwareMetadata,
    pub parameters: LabwareParameters,
    /// Well names column by column, front-to-back within a column.
    pub ordering: Vec<Vec<String>>,
    pub wells: FxHashMap<String, WellDefinition>,
    pub dimensions: Dimensions,
    #[serde(default)]
    pub corner_offset_from_slot: Point,
    #[serde(default, skip_serializing_if = "FxHashMap::is_empty")]
    pub inner_labware_geometry: FxHashMap<String, WellGeometry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabwareMetadata {
    pub display_name: String,
    pub display_category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabwareParameters {
    pub load_name: String,
    #[serde(default)]
    pub is_tiprack: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip_overlap: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimensions {
    pub x_dimension: f64,
    pub y_dimension: f64,
    pub z_dimension: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "camelCase")]
pub enum WellShape {
    Circular {
        diameter: f64,
    },
    #[serde(rename_all = "camelCase")]
    Rectangular {
        x_dimension: f64,
        y_dimension: f64,
    },
}

impl WellShape {
    /// Horizontal cross-section area in mm².
    #[must_use]
    pub fn area(&self) -> f64 {
        match *self {
            Self::Circular { diameter } => std::f64::consts::PI * (diameter / 2.0).powi(2),
            Self::Rectangular { x_dimension, y_dimension } => x_dimension * y_dimension,
        }
    }

    /// Half of the narrowest horizontal extent; used as the touch-tip radius.
    #[must_use]
    pub fn half_width(&self) -> f64 {
        match *self {
            Self::Circular { diameter } => diameter / 2.0,
            Self::Rectangular { x_dimension, y_dimension } => x_dimension.min(y_dimension) / 2.0,
        }
    }
}

/// One well, positioned relative to the labware's front-left-bottom corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellDefinition {
    pub x: f64,
    pub y: f64,
    /// Height of the well bottom.
    pub z: f64,
    pub depth: f64,
    pub total_liquid_volume: f64,
    #[serde(flatten)]
    pub shape: WellShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry_definition_id: Option<String>,
}

impl LabwareDefinition {
    /// `namespace/load_name/version`.
    #[must_use]
    pub fn uri(&self) -> String {
        format!("{}/{}/{}", self.namespace, self.parameters.load_name, self.version)
    }

    #[must_use]
    pub fn load_name(&self) -> &str {
        &self.parameters.load_name
    }

    #[must_use]
    pub const fn is_tiprack(&self) -> bool {
        self.parameters.is_tiprack
    }

    /// Well names in column-major order.
    pub fn wells_in_order(&self) -> impl Iterator<Item = &str> {
        self.ordering.iter().flatten().map(String::as_str)
    }

    /// # Errors
    /// Returns [`LabwareError::WellNotFound`] for an unknown well.
    pub fn well(&self, name: &str) -> Result<&WellDefinition> {
        self.wells.get(name).ok_or_else(|| LabwareError::WellNotFound {
            well_name: name.to_owned(),
            labware: self.parameters.load_name.clone(),
            context: None,
        })
    }

    /// Geometry referenced by a well, if the definition carries one.
    #[must_use]
    pub fn geometry_for(&self, well: &WellDefinition) -> Option<&WellGeometry> {
        well.geometry_definition_id.as_ref().and_then(|id| self.inner_labware_geometry.get(id))
    }

    /// Checks internal consistency.
    ///
    /// # Errors
    /// Returns [`LabwareError::InvalidDefinition`] when the ordering and the well table
    /// disagree, a well name repeats, a well references a missing geometry, or a tip
    /// rack lacks a tip length.
    pub fn validate(&self) -> Result<()> {
        let mut seen = FxHashSet::default();
        for name in self.wells_in_order() {
            if !seen.insert(name) {
                return Err(self.invalid(format!("well {name} appears twice in ordering")));
            }
            if !self.wells.contains_key(name) {
                return Err(self.invalid(format!("well {name} is ordered but not defined")));
            }
        }
        if seen.len() != self.wells.len() {
            return Err(self.invalid("some wells are missing from ordering"));
        }

        for (name, well) in &self.wells {
            if well.depth <= 0.0 || well.total_liquid_volume < 0.0 {
                return Err(self.invalid(format!("well {name} has non-positive depth or negative volume")));
            }
            if let Some(id) = &well.geometry_definition_id {
                let geometry = self
                    .inner_labware_geometry
                    .get(id)
                    .ok_or_else(|| self.invalid(format!("well {name} references unknown geometry {id}")))?;
                geometry.validate().map_err(|e| self.invalid(format!("geometry {id}: {e}")))?;
            }
        }

        if self.parameters.is_tiprack && self.parameters.tip_length.is_none() {
            return Err(self.invalid("tip racks must define tipLength"));
        }
        Ok(())
    }

    fn invalid(&self, message: impl Into<std::borrow::Cow<'static, str>>) -> LabwareError {
        LabwareError::InvalidDefinition {
            load_name: self.parameters.load_name.clone(),
            message: message.into(),
            context: None,
        }
    }
}

const fn default_schema_version() -> u32 {
    2
}
