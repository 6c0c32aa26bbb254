//! Serde model of a liquid class definition file.

use crate::properties::TransferProperties;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidClassDefinition {
    pub liquid_class_name: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub by_pipette: Vec<ByPipetteSetting>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByPipetteSetting {
    pub pipette_model: String,
    pub by_tip_type: Vec<ByTipTypeSetting>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ByTipTypeSetting {
    /// Tip rack URI (`namespace/load_name/version`) or bare load name.
    pub tiprack: String,
    #[serde(flatten)]
    pub properties: TransferProperties,
}

const fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

fn default_namespace() -> String {
    aliq_domain::constants::DEFAULT_NAMESPACE.to_owned()
}
