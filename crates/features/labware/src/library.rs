use crate::definition::LabwareDefinition;
use crate::error::{LabwareError, LabwareErrorExt, Result};
use aliq_domain::constants::{DEFAULT_LABWARE_VERSION, DEFAULT_NAMESPACE};
use fxhash::FxHashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const BUILTIN_DEFINITIONS: [&str; 7] = [
    include_str!("../definitions/opentrons_flex_96_tiprack_50ul.json"),
    include_str!("../definitions/opentrons_flex_96_tiprack_200ul.json"),
    include_str!("../definitions/opentrons_flex_96_tiprack_1000ul.json"),
    include_str!("../definitions/nest_96_wellplate_200ul_flat.json"),
    include_str!("../definitions/nest_12_reservoir_15ml.json"),
    include_str!("../definitions/corning_96_wellplate_360ul_flat.json"),
    include_str!("../definitions/armadillo_96_wellplate_200ul_pcr_full_skirt.json"),
];

/// Labware definitions keyed by URI.
#[derive(Debug, Clone, Default)]
pub struct LabwareLibrary {
    definitions: FxHashMap<String, Arc<LabwareDefinition>>,
}

impl LabwareLibrary {
    /// # Errors
    /// Returns an error if an embedded definition fails to parse or validate.
    pub fn with_builtins() -> Result<Self> {
        let mut library = Self::default();
        for json in BUILTIN_DEFINITIONS {
            library.add(parse_definition(json)?)?;
        }
        debug!(count = library.definitions.len(), "Built-in labware loaded");
        Ok(library)
    }

    /// Adds every `*.json` definition in `dir`.
    ///
    /// # Errors
    /// I/O, parse and validation failures, or [`LabwareError::AlreadyDefined`].
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let mut count = 0;
        let mut entries = fs::read_dir(dir)
            .context(format!("Reading {}", dir.display()))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        entries.sort();

        for path in entries.iter().filter(|p| p.extension().is_some_and(|ext| ext == "json")) {
            let json = fs::read_to_string(path).context(format!("Reading {}", path.display()))?;
            let definition = parse_definition(&json).context(format!("Parsing {}", path.display()))?;
            self.add(definition)?;
            count += 1;
        }
        info!(dir = %dir.display(), count, "Custom labware loaded");
        Ok(count)
    }

    /// Registers a validated definition.
    ///
    /// # Errors
    /// Validation failures, or [`LabwareError::AlreadyDefined`] for a known URI.
    pub fn add(&mut self, definition: LabwareDefinition) -> Result<Arc<LabwareDefinition>> {
        definition.validate()?;
        let uri = definition.uri();
        if self.definitions.contains_key(&uri) {
            return Err(LabwareError::AlreadyDefined { uri, context: None });
        }
        let definition = Arc::new(definition);
        self.definitions.insert(uri, Arc::clone(&definition));
        Ok(definition)
    }

    /// Looks up a definition by load name, defaulting to the built-in namespace and
    /// version 1.
    ///
    /// # Errors
    /// Returns [`LabwareError::DefinitionNotFound`].
    pub fn get(
        &self,
        load_name: &str,
        namespace: Option<&str>,
        version: Option<u32>,
    ) -> Result<Arc<LabwareDefinition>> {
        let uri = format!(
            "{}/{load_name}/{}",
            namespace.unwrap_or(DEFAULT_NAMESPACE),
            version.unwrap_or(DEFAULT_LABWARE_VERSION)
        );
        self.get_by_uri(&uri)
            .map_err(|_| LabwareError::DefinitionNotFound { load_name: load_name.to_owned(), context: None })
    }

    /// # Errors
    /// Returns [`LabwareError::DefinitionNotFound`].
    pub fn get_by_uri(&self, uri: &str) -> Result<Arc<LabwareDefinition>> {
        self.definitions
            .get(uri)
            .cloned()
            .ok_or_else(|| LabwareError::DefinitionNotFound { load_name: uri.to_owned(), context: None })
    }

    /// All URIs, sorted.
    #[must_use]
    pub fn uris(&self) -> Vec<&str> {
        let mut uris: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        uris.sort_unstable();
        uris
    }

    /// All definitions, sorted by URI.
    #[must_use]
    pub fn definitions(&self) -> Vec<&Arc<LabwareDefinition>> {
        let mut all: Vec<_> = self.definitions.iter().collect();
        all.sort_by(|a, b| a.0.cmp(b.0));
        all.into_iter().map(|(_, definition)| definition).collect()
    }
}

/// # Errors
/// Returns [`LabwareError::Parse`] for malformed JSON.
pub fn parse_definition(json: &str) -> Result<LabwareDefinition> {
    Ok(serde_json::from_str(json)?)
}
