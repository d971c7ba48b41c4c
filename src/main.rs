//! Skylift CLI entrypoint.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use skylift::cli::{Cli, OutputFormatter};
use skylift::cloud::{ArmClient, ArmConfig};
use skylift::error::Result;
use skylift::params::ParamLoader;
use skylift::pipeline::{HelmReleaser, Pipeline, PipelineOptions};

use clap::{CommandFactory, Parser};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Invoking with no parameters file prints usage and exits cleanly.
    let Some(params_path) = cli.params.clone() else {
        let mut command = Cli::command();
        let _ = command.print_help();
        return ExitCode::SUCCESS;
    };

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&cli, &params_path)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main async entry point: load parameters, connect, run the pipeline.
async fn run(cli: &Cli, params_path: &Path) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    // Load parameters (and the .env overlay next to them).
    let loader = ParamLoader::new().with_base_path(
        params_path
            .parent()
            .unwrap_or_else(|| Path::new(".")),
    );
    loader.load_dotenv()?;
    let params = loader.load_file(params_path)?;

    // Connect to the control plane.
    let config = ArmConfig::from_params(&params)?;
    let plane = ArmClient::connect(config).await?;

    // Cluster package manager.
    let releaser = HelmReleaser::new();

    // Ctrl-C stops readiness polling at the next attempt boundary.
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; polling stops at the next attempt");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let options = PipelineOptions {
        private_networking: cli.private,
        dev_access: cli.dev_access,
    };

    info!(
        "Deploying into resource group '{}' (private: {}, dev access: {})",
        params.str_value(skylift::params::names::RESOURCE_GROUP)?,
        options.private_networking,
        options.dev_access
    );

    let pipeline = Pipeline::new(&plane, &releaser, &params, options).with_cancel(cancel);
    let report = pipeline.run().await?;

    eprintln!("{}", formatter.format_report(&report));
    Ok(())
}
