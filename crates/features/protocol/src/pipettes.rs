//! Built-in pipette models.

use crate::error::{ProtocolError, Result};
use aliq_domain::pipette::PipetteDefinition;
use std::sync::{Arc, LazyLock};

const BUILTIN_PIPETTES: &str = include_str!("../definitions/pipettes.json");

static DEFINITIONS: LazyLock<Vec<Arc<PipetteDefinition>>> = LazyLock::new(|| {
    match serde_json::from_str::<Vec<PipetteDefinition>>(BUILTIN_PIPETTES) {
        Ok(definitions) => definitions.into_iter().map(Arc::new).collect(),
        Err(err) => {
            tracing::error!(%err, "Embedded pipette definitions are malformed");
            Vec::new()
        },
    }
});

/// # Errors
/// Returns [`ProtocolError::UnknownPipette`] for a model that is not built in.
pub fn definition(name: &str) -> Result<Arc<PipetteDefinition>> {
    DEFINITIONS
        .iter()
        .find(|definition| definition.name == name)
        .cloned()
        .ok_or_else(|| ProtocolError::UnknownPipette { name: name.to_owned(), context: None })
}

/// Names of all built-in pipette models.
#[must_use]
pub fn names() -> Vec<&'static str> {
    DEFINITIONS.iter().map(|definition| definition.name.as_str()).collect()
}
