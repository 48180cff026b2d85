//! Must-gather workspace CLI.
//!
//! Selects a must-gather directory or archive as the active workspace and
//! manages the saved contexts that later commands resume from.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
