//! Synth command
//!
//! Resolves the topology, assembles the chart and writes the manifest
//! stream to stdout or a file.

use std::path::PathBuf;

use clap::Args;
use tracing::info;
use trellis_chart::ChartCompiler;

use crate::config::{FeatureArgs, TopologyArgs};
use crate::output;
use crate::Result;

#[derive(Args, Debug)]
pub struct SynthArgs {
    #[command(flatten)]
    pub topology: TopologyArgs,

    #[command(flatten)]
    pub features: FeatureArgs,

    /// Write manifests to this file instead of stdout
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: SynthArgs) -> Result<()> {
    let yaml = render(&args.topology, &args.features)?;
    output::write(args.output.as_deref(), &yaml)
}

/// Resolve options and render the manifest stream without writing it
pub fn render(topology: &TopologyArgs, features: &FeatureArgs) -> Result<String> {
    let features = features.features();
    let options = topology.resolve(&features)?;

    let compiler = ChartCompiler::builder().features(features).build();
    let graph = compiler.compile(&options)?;
    let yaml = graph.to_yaml()?;

    info!(
        resources = graph.len(),
        bytes = yaml.len(),
        "rendered manifests"
    );
    Ok(yaml)
}
