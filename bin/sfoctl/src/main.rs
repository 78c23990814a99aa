//! ---
//! sfo_section: "05-networking-external-interfaces"
//! sfo_subsection: "binary"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Control CLI for operators inspecting smart failover."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use sfo_common::AppConfig;
use sfo_logging as logging;

mod failover;
mod health;

/// Exit code for configuration and runtime errors.
const EXIT_INTERNAL_ERROR: u8 = 3;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Smart failover operator utility",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,

    #[arg(long, value_name = "FILE", global = true, help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Probe configured resources and report their health")]
    Health(health::HealthArgs),
    #[command(name = "test-failover", about = "Run a failover drill against a configured route")]
    TestFailover(failover::TestFailoverArgs),
}

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();
    if cli.version {
        println!("sfoctl {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }
    let Some(command) = cli.command else {
        eprintln!("no command given; see --help");
        return ExitCode::from(EXIT_INTERNAL_ERROR);
    };

    let result = match command {
        Commands::Health(args) => health::run(cli.config.as_ref(), args),
        Commands::TestFailover(args) => failover::run(cli.config.as_ref(), args),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(EXIT_INTERNAL_ERROR)
        }
    }
}

/// An explicit `--config` wins over `SFO_CONFIG` and the default candidates.
pub(crate) fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    if let Some(path) = path {
        return AppConfig::from_path(path);
    }
    AppConfig::load(&[
        PathBuf::from("configs/sfo.toml"),
        PathBuf::from("configs/sfo.example.toml"),
    ])
}
