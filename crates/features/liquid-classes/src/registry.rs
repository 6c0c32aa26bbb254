use crate::class::{ByTipRack, LiquidClass};
use crate::error::{LiquidClassError, LiquidClassErrorExt, Result};
use crate::schema::LiquidClassDefinition;
use fxhash::FxHashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const BUILTIN_DEFINITIONS: [(&str, &str); 3] = [
    ("water", include_str!("../definitions/water.json")),
    ("ethanol_80", include_str!("../definitions/ethanol_80.json")),
    ("glycerol_50", include_str!("../definitions/glycerol_50.json")),
];

/// Named liquid classes available to a protocol.
///
/// Classes are shared behind `Arc`; callers that want to tweak properties clone the
/// class and work on their own copy.
#[derive(Debug, Clone, Default)]
pub struct LiquidClassRegistry {
    classes: FxHashMap<String, Arc<LiquidClass>>,
}

impl LiquidClassRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry holding the built-in `water`, `ethanol_80` and `glycerol_50` classes.
    ///
    /// # Errors
    /// Returns [`LiquidClassError::Parse`] if an embedded definition is malformed.
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::default();
        for (name, json) in BUILTIN_DEFINITIONS {
            let class = parse_definition(json).context(format!("Built-in liquid class {name}"))?;
            registry.insert(class)?;
        }
        debug!(count = registry.classes.len(), "Built-in liquid classes loaded");
        Ok(registry)
    }

    /// Adds every `*.json` definition found in `dir`.
    ///
    /// # Errors
    /// I/O and parse failures, or [`LiquidClassError::AlreadyDefined`] when a file
    /// redefines a known class.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).context(format!("Reading {}", dir.display()))? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            let json = fs::read_to_string(path).context(format!("Reading {}", path.display()))?;
            let class = parse_definition(&json).context(format!("Parsing {}", path.display()))?;
            self.insert(class)?;
        }
        info!(dir = %dir.display(), count = paths.len(), "Custom liquid classes loaded");
        Ok(paths.len())
    }

    /// # Errors
    /// Returns [`LiquidClassError::NotFound`] for an unknown name.
    pub fn get(&self, name: &str) -> Result<Arc<LiquidClass>> {
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| LiquidClassError::NotFound { name: name.to_owned(), context: None })
    }

    /// Creates and registers a new class.
    ///
    /// # Errors
    /// Returns [`LiquidClassError::AlreadyDefined`] if `name` is taken.
    pub fn define(
        &mut self,
        name: &str,
        display_name: &str,
        properties: FxHashMap<String, ByTipRack>,
    ) -> Result<Arc<LiquidClass>> {
        let class = LiquidClass::create_from(name, display_name, properties);
        self.insert(class)
    }

    /// Registers an already built class.
    ///
    /// # Errors
    /// Returns [`LiquidClassError::AlreadyDefined`] if its name is taken.
    pub fn insert(&mut self, class: LiquidClass) -> Result<Arc<LiquidClass>> {
        if self.classes.contains_key(class.name()) {
            return Err(LiquidClassError::AlreadyDefined { name: class.name().to_owned(), context: None });
        }
        let class = Arc::new(class);
        self.classes.insert(class.name().to_owned(), Arc::clone(&class));
        Ok(class)
    }

    /// Registered class names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Parses a liquid class from definition JSON.
///
/// # Errors
/// [`LiquidClassError::Parse`] for malformed JSON or invalid property values.
pub fn parse_definition(json: &str) -> Result<LiquidClass> {
    let definition: LiquidClassDefinition = serde_json::from_str(json)?;
    LiquidClass::from_definition(definition)
}
