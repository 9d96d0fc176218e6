//! CLI commands module.

use anyhow::Result;
use clap::Subcommand;

mod demo;
mod keygen;

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a key pair
    Keygen(keygen::KeygenArgs),
    /// Run the reference six-user scenario and print the chain
    Demo(demo::DemoArgs),
}

pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Keygen(args) => keygen::run(args),
        Commands::Demo(args) => demo::run(args),
    }
}
