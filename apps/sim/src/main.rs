#![allow(clippy::print_stderr, clippy::print_stdout)]

pub mod handlers;
pub mod models;

use crate::handlers::{labware, liquid_classes, simulate};
use crate::models::args::{AppCommands, Cli, LabwareAction, LiquidClassAction};

use aliq::Simulator;
use aliq::domain::config::SimConfig;
use aliq::kernel::config::load_config;
use aliq_logger::Logger;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = "aliquot.toml";

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    if let Some(dir) = &cli.log_dir {
        config.logging.directory = Some(dir.clone());
    }
    let _log = Logger::from_config(env!("CARGO_BIN_NAME"), &config.logging)?;

    let simulator = Simulator::builder().config(config).build();

    match cli.command {
        AppCommands::Simulate { protocol, json } => simulate::simulate(&simulator, &protocol, json)?,
        AppCommands::LiquidClasses { action } => match action {
            LiquidClassAction::List {} => liquid_classes::list(&simulator)?,
            LiquidClassAction::Show { name, pipette, tip_rack } => {
                liquid_classes::show(&simulator, &name, pipette.as_deref(), tip_rack.as_deref())?;
            },
        },
        AppCommands::Labware { action } => match action {
            LabwareAction::List {} => labware::list(&simulator)?,
            LabwareAction::Show { load_name } => labware::show(&simulator, &load_name)?,
        },
    }

    Ok(())
}

/// An explicit `--config` must exist; the default file is optional.
fn load(path: Option<&Path>) -> Result<SimConfig> {
    let path = path.map(Path::to_path_buf).or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG);
        default.is_file().then_some(default)
    });
    load_config(path.as_deref()).context("Critical: Configuration is malformed")
}
