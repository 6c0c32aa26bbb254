use crate::error::{LiquidClassError, Result};
use crate::properties::TransferProperties;
use crate::schema::{ByPipetteSetting, ByTipTypeSetting, LiquidClassDefinition};
use fxhash::FxHashMap;
use std::collections::BTreeMap;
use tracing::debug;

/// Transfer properties keyed by tip rack, for one pipette model.
pub type ByTipRack = FxHashMap<String, TransferProperties>;

/// A named set of transfer properties, one entry per pipette model and tip rack.
///
/// The name and display name are fixed at creation; properties may be replaced
/// through [`LiquidClass::update_for`].
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidClass {
    name: String,
    display_name: String,
    by_pipette: FxHashMap<String, ByTipRack>,
}

impl LiquidClass {
    #[must_use]
    pub fn create_from(
        name: impl Into<String>,
        display_name: impl Into<String>,
        by_pipette: FxHashMap<String, ByTipRack>,
    ) -> Self {
        Self { name: name.into(), display_name: display_name.into(), by_pipette }
    }

    /// # Errors
    /// Returns [`LiquidClassError::InvalidProperty`] when a pipette or tip rack appears
    /// twice in the definition.
    pub fn from_definition(definition: LiquidClassDefinition) -> Result<Self> {
        let mut by_pipette: FxHashMap<String, ByTipRack> = FxHashMap::default();
        for setting in definition.by_pipette {
            let entry = by_pipette.entry(setting.pipette_model.clone()).or_default();
            if !entry.is_empty() {
                return Err(LiquidClassError::invalid_property(format!(
                    "pipette {} is listed twice in {}",
                    setting.pipette_model, definition.liquid_class_name
                )));
            }
            for tip in setting.by_tip_type {
                if entry.insert(tip.tiprack.clone(), tip.properties).is_some() {
                    return Err(LiquidClassError::invalid_property(format!(
                        "tip rack {} is listed twice for {}",
                        tip.tiprack, setting.pipette_model
                    )));
                }
            }
        }

        debug!(name = %definition.liquid_class_name, pipettes = by_pipette.len(), "Liquid class parsed");
        Ok(Self::create_from(definition.liquid_class_name, definition.display_name, by_pipette))
    }

    /// Converts back into the file format, with pipettes and tip racks sorted by name.
    #[must_use]
    pub fn to_definition(&self) -> LiquidClassDefinition {
        let sorted: BTreeMap<_, _> = self.by_pipette.iter().collect();
        let by_pipette = sorted
            .into_iter()
            .map(|(pipette, tips)| {
                let tips: BTreeMap<_, _> = tips.iter().collect();
                ByPipetteSetting {
                    pipette_model: pipette.clone(),
                    by_tip_type: tips
                        .into_iter()
                        .map(|(tiprack, properties)| ByTipTypeSetting {
                            tiprack: tiprack.clone(),
                            properties: properties.clone(),
                        })
                        .collect(),
                }
            })
            .collect();

        LiquidClassDefinition {
            liquid_class_name: self.name.clone(),
            display_name: self.display_name.clone(),
            description: None,
            schema_version: crate::schema::SCHEMA_VERSION,
            namespace: aliq_domain::constants::DEFAULT_NAMESPACE.to_owned(),
            by_pipette,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Pipette models with properties in this class, sorted.
    #[must_use]
    pub fn pipettes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_pipette.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Tip racks defined for `pipette`, sorted. Empty when the pipette is unknown.
    #[must_use]
    pub fn tip_racks_for(&self, pipette: &str) -> Vec<&str> {
        let mut racks: Vec<&str> =
            self.by_pipette.get(pipette).map(|tips| tips.keys().map(String::as_str).collect()).unwrap_or_default();
        racks.sort_unstable();
        racks
    }

    /// Looks up the properties for a pipette and tip rack.
    ///
    /// `tip_rack` may be a full URI or a bare load name; either form matches entries
    /// stored in either form.
    ///
    /// # Errors
    /// [`LiquidClassError::NoPropertiesForPipette`] or [`LiquidClassError::NoPropertiesForTipRack`].
    pub fn get_for(&self, pipette: &str, tip_rack: &str) -> Result<&TransferProperties> {
        let tips = self.tips_for(pipette)?;
        let key = self.resolve_tip_rack(tips, pipette, tip_rack)?;
        tips.get(&key).ok_or_else(|| self.no_tip_rack(pipette, tip_rack))
    }

    /// Replaces the properties for an existing pipette and tip rack entry.
    ///
    /// # Errors
    /// Same as [`LiquidClass::get_for`].
    pub fn update_for(&mut self, pipette: &str, tip_rack: &str, properties: TransferProperties) -> Result<()> {
        let key = self.resolve_tip_rack(self.tips_for(pipette)?, pipette, tip_rack)?;
        if let Some(tips) = self.by_pipette.get_mut(pipette) {
            tips.insert(key, properties);
        }
        debug!(class = %self.name, pipette, tip_rack, "Liquid class properties updated");
        Ok(())
    }

    fn tips_for(&self, pipette: &str) -> Result<&ByTipRack> {
        self.by_pipette.get(pipette).ok_or_else(|| LiquidClassError::NoPropertiesForPipette {
            pipette: pipette.to_owned(),
            class: self.name.clone(),
            context: None,
        })
    }

    fn resolve_tip_rack(&self, tips: &ByTipRack, pipette: &str, tip_rack: &str) -> Result<String> {
        if tips.contains_key(tip_rack) {
            return Ok(tip_rack.to_owned());
        }
        let wanted = load_name(tip_rack);
        tips.keys()
            .find(|key| load_name(key) == wanted)
            .cloned()
            .ok_or_else(|| self.no_tip_rack(pipette, tip_rack))
    }

    fn no_tip_rack(&self, pipette: &str, tip_rack: &str) -> LiquidClassError {
        LiquidClassError::NoPropertiesForTipRack {
            tip_rack: tip_rack.to_owned(),
            pipette: pipette.to_owned(),
            class: self.name.clone(),
            context: None,
        }
    }
}

/// `opentrons/opentrons_flex_96_tiprack_50ul/1` → `opentrons_flex_96_tiprack_50ul`.
fn load_name(tip_rack: &str) -> &str {
    let mut parts = tip_rack.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(name), Some(_), None) => name,
        _ => tip_rack,
    }
}
