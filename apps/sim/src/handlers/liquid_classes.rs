use aliq::Simulator;
use anyhow::Result;

/// Lists every liquid class with its display name and supported pipettes.
///
/// # Errors
/// Returns an error if the configured definitions cannot be loaded.
pub fn list(simulator: &Simulator) -> Result<()> {
    let engine = simulator.engine()?;
    let registry = engine.liquid_classes();

    for name in registry.names() {
        let class = registry.get(name)?;
        println!("{:<16} {:<12} {}", class.name(), class.display_name(), class.pipettes().join(", "));
    }
    Ok(())
}

/// Prints a liquid class as JSON.
///
/// With `pipette` only, lists the tip racks that pipette has properties for. With both
/// `pipette` and `tip_rack`, prints just that entry's transfer properties.
///
/// # Errors
/// Returns an error for an unknown class, pipette or tip rack.
pub fn show(simulator: &Simulator, name: &str, pipette: Option<&str>, tip_rack: Option<&str>) -> Result<()> {
    let engine = simulator.engine()?;
    let class = engine.get_liquid_class(name)?;

    match (pipette, tip_rack) {
        (Some(pipette), Some(tip_rack)) => {
            println!("{}", serde_json::to_string_pretty(class.get_for(pipette, tip_rack)?)?);
        },
        (Some(pipette), None) => {
            let racks = class.tip_racks_for(pipette);
            anyhow::ensure!(!racks.is_empty(), "Liquid class '{name}' has no properties for {pipette}");
            for rack in racks {
                println!("{rack}");
            }
        },
        _ => println!("{}", serde_json::to_string_pretty(&class.to_definition())?),
    }
    Ok(())
}
