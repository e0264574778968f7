//! Trellis CLI library
//!
//! Generates Kubernetes manifests for a Plone site: backend, optional
//! Volto frontend, Varnish cache, CloudNativePG database and ingress.

pub mod commands;
pub mod config;
pub mod output;

pub use trellis_common::{Error, Result};

use clap::{Parser, Subcommand};

/// Trellis - Plone deployment chart generator
#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the chart as a multi-document YAML stream
    Synth(commands::synth::SynthArgs),

    /// Print the resolved feature set as JSON
    Features(commands::features::FeaturesArgs),
}

impl Cli {
    /// Run the CLI command
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Synth(args) => commands::synth::run(args),
            Commands::Features(args) => commands::features::run(args),
        }
    }
}
