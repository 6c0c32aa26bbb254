use aliq::Simulator;
use aliq::protocol::ProtocolFile;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Runs a protocol file and prints the command log followed by a short summary.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed, or a step fails.
pub fn simulate(simulator: &Simulator, path: &Path, json: bool) -> Result<()> {
    info!(path = %path.display(), "Loading protocol");
    let protocol = ProtocolFile::from_path(path)?;
    let summary =
        simulator.run(&protocol).with_context(|| format!("Simulation of {} failed", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if let Some(name) = &summary.protocol_name {
        println!("Protocol: {name}");
    }
    for (index, command) in summary.commands.iter().enumerate() {
        println!("{:>4}. {command}", index + 1);
    }
    println!();
    println!("Commands: {}", summary.commands.len());
    println!("Tips used: {}", summary.tips_used);
    if !summary.liquid_remaining.is_empty() {
        println!("Liquid remaining:");
        for well in &summary.liquid_remaining {
            println!("  {} of {}: {:.2} uL", well.well_name, well.labware_id, well.volume);
        }
    }
    Ok(())
}
