//! Features command

use std::path::PathBuf;

use clap::Args;
use trellis_common::Error;

use crate::config::FeatureArgs;
use crate::output;
use crate::Result;

#[derive(Args, Debug)]
pub struct FeaturesArgs {
    #[command(flatten)]
    pub features: FeatureArgs,

    /// Write the feature set to this file instead of stdout
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

/// Print the resolved feature set as JSON
pub fn run(args: FeaturesArgs) -> Result<()> {
    let features = args.features.features();
    let mut json = serde_json::to_string_pretty(&features)
        .map_err(|e| Error::serialization_for("Features", e.to_string()))?;
    json.push('\n');
    output::write(args.output.as_deref(), &json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_feature_set_as_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("features.json");
        let args = FeaturesArgs {
            features: FeatureArgs {
                no_cache: true,
                ..Default::default()
            },
            output: Some(path.clone()),
        };

        run(args).expect("features should run");

        let written = std::fs::read_to_string(&path).expect("read back");
        let json: serde_json::Value = serde_json::from_str(&written).expect("valid json");
        assert_eq!(json["frontend"], true);
        assert_eq!(json["cache"], false);
        assert_eq!(json["managedDatabase"], true);
        assert_eq!(json["ingress"], true);
    }
}
