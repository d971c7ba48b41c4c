//! CLI argument definitions.

use clap::Parser;
use std::path::PathBuf;

/// Skylift - idempotent deployment orchestrator for the RAG stack.
#[derive(Parser, Debug)]
#[command(name = "skylift")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the parameters file (flat JSON key/value document).
    #[arg(short = 'p', long = "params", value_name = "FILE", env = "SKYLIFT_PARAMS")]
    pub params: Option<PathBuf>,

    /// Enforce private connectivity: network peering and private
    /// resolution zones between the gateway and cluster networks.
    #[arg(long)]
    pub private: bool,

    /// Grant the invoking operator direct data-plane access
    /// (developer mode; requires 'operator_object_id' in the parameters).
    #[arg(long = "dev-access")]
    pub dev_access: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_full_surface() {
        let cli = Cli::try_parse_from([
            "skylift",
            "-p",
            "params.json",
            "--private",
            "--dev-access",
            "--verbose",
        ])
        .unwrap();

        assert_eq!(cli.params.unwrap(), PathBuf::from("params.json"));
        assert!(cli.private);
        assert!(cli.dev_access);
        assert!(cli.verbose);
    }

    #[test]
    fn no_arguments_leaves_the_params_file_unset() {
        let cli = Cli::try_parse_from(["skylift"]).unwrap();
        assert!(cli.params.is_none());
        assert!(!cli.private);
    }
}
