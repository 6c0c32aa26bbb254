use aliq::Simulator;
use anyhow::Result;

/// Lists every labware definition by URI.
///
/// # Errors
/// Returns an error if the configured definitions cannot be loaded.
pub fn list(simulator: &Simulator) -> Result<()> {
    let engine = simulator.engine()?;

    for definition in engine.labware_library().definitions() {
        println!("{:<48} {}", definition.uri(), definition.metadata.display_name);
    }
    Ok(())
}

/// Prints a short summary of one definition.
///
/// # Errors
/// Returns an error for an unknown load name.
pub fn show(simulator: &Simulator, load_name: &str) -> Result<()> {
    let engine = simulator.engine()?;
    let definition = engine.labware_library().get(load_name, None, None)?;
    let dimensions = definition.dimensions;
    let first_well = definition.wells_in_order().next().map(|name| definition.well(name)).transpose()?;

    println!("{}", definition.metadata.display_name);
    println!("  URI:        {}", definition.uri());
    println!("  Category:   {}", definition.metadata.display_category);
    println!("  Wells:      {}", definition.wells.len());
    println!(
        "  Dimensions: {:.2} x {:.2} x {:.2} mm",
        dimensions.x_dimension, dimensions.y_dimension, dimensions.z_dimension
    );
    if let Some(well) = first_well {
        println!("  Well depth: {:.2} mm", well.depth);
        println!("  Well volume: {} uL", well.total_liquid_volume);
    }
    if definition.is_tiprack() {
        println!("  Tip rack:   yes");
    }
    Ok(())
}
