//! # CLI Argument Definitions
//!
//! Subcommands, arguments and global flags of the `aliquot` simulator.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI structure parsing command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "aliquot")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(arg_required_else_help = true)]
#[command(about = "Simulates liquid-handling protocols and inspects liquid classes and labware")]
pub struct Cli {
    /// Config file (TOML or JSON); `aliquot.toml` in the working directory is used if present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Also write rolling log files to this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: AppCommands,
}

#[derive(Debug, Subcommand)]
pub enum AppCommands {
    /// Run a protocol file and print its command log
    Simulate {
        /// Path to the protocol JSON file
        protocol: PathBuf,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect liquid classes
    LiquidClasses {
        #[command(subcommand)]
        action: LiquidClassAction,
    },
    /// Inspect labware definitions
    Labware {
        #[command(subcommand)]
        action: LabwareAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum LiquidClassAction {
    /// List every known liquid class
    List {},
    /// Show a liquid class definition, or its properties for one pipette and tip rack
    Show {
        name: String,

        /// Pipette model, e.g. `flex_1channel_50`
        #[arg(long)]
        pipette: Option<String>,

        /// Tip rack URI, e.g. `opentrons/opentrons_flex_96_tiprack_50ul/1`
        #[arg(long, requires = "pipette")]
        tip_rack: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum LabwareAction {
    /// List every known labware definition
    List {},
    /// Show a labware definition summary
    Show { load_name: String },
}
