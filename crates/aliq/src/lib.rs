//! Facade crate for the Aliquot simulator.
//! Re-exports domain/kernel primitives and every feature slice, and wraps the protocol
//! engine in a [`Simulator`] that runs protocol files start to finish.
//! Keep this crate thin: it should compose other crates, not implement pipetting logic.
//!
//! ## Usage
//! ```rust,no_run
//! use aliq::Simulator;
//! use aliq::protocol::ProtocolFile;
//!
//! let protocol = ProtocolFile::from_path("plate_fill.json")?;
//! let summary = Simulator::builder().build().run(&protocol)?;
//! println!("{} commands, {} tips", summary.commands.len(), summary.tips_used);
//! # Ok::<(), aliq::protocol::ProtocolError>(())
//! ```

pub use aliq_domain as domain;
pub use aliq_kernel as kernel;
pub use aliq_labware as labware;
pub use aliq_liquid_classes as liquid_classes;
pub use aliq_protocol as protocol;
pub use aliq_tips as tips;
pub use aliq_transfer as transfer;

use aliq_domain::config::SimConfig;
use aliq_protocol::{Command, EngineConfig, ProtocolEngine, ProtocolError, ProtocolFile, WellVolume, run_protocol};
use serde::Serialize;
use tracing::info;
use typed_builder::TypedBuilder;

/// Feature registry for runtime introspection.
pub mod features {
    /// Slices compiled into this build.
    pub const ENABLED: &[&str] = &["labware", "liquid-classes", "tips", "transfer", "protocol"];

    #[must_use]
    pub fn is_enabled(name: &str) -> bool {
        ENABLED.contains(&name)
    }
}

/// Runs protocols against a fresh simulated robot each time.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct Simulator {
    #[builder(default)]
    config: SimConfig,
}

/// Outcome of one simulated run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub protocol_name: Option<String>,
    pub commands: Vec<Command>,
    pub tips_used: usize,
    pub liquid_remaining: Vec<WellVolume>,
}

impl Simulator {
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Creates an empty engine with the built-in definitions plus the configured directories.
    ///
    /// # Errors
    /// Returns an error if a custom definition directory cannot be loaded.
    pub fn engine(&self) -> Result<ProtocolEngine, ProtocolError> {
        ProtocolEngine::new(EngineConfig::from(&self.config))
    }

    /// Simulates `protocol` on a fresh deck.
    ///
    /// # Errors
    /// The first setup entry or step that fails, with its position attached.
    pub fn run(&self, protocol: &ProtocolFile) -> Result<RunSummary, ProtocolError> {
        let mut engine = self.engine()?;
        run_protocol(&mut engine, protocol)?;

        let summary = RunSummary {
            protocol_name: protocol.metadata.protocol_name.clone(),
            commands: engine.commands().to_vec(),
            tips_used: engine.tips_used(),
            liquid_remaining: engine.liquid_remaining(),
        };
        info!(commands = summary.commands.len(), tips_used = summary.tips_used, "Simulation finished");
        Ok(summary)
    }
}
