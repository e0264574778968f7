//! CLI commands

pub mod features;
pub mod synth;
