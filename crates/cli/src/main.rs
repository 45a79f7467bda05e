//! RTB exchange CLI for inspecting auction traffic offline.
//!
//! This tool provides commands for:
//! - Validating auction requests against the structural rules and bidder param schemas
//! - Rendering the wire requests each bidder adapter would send
//! - Mapping a partner response back into canonical bids

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod error;

use error::CliError;

#[derive(Parser)]
#[command(name = "rtbx")]
#[command(about = "RTB exchange CLI for auction request inspection")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the TOML configuration file (defaults to the bundled config)
    #[arg(long, global = true, env = "RTB_EXCHANGE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an OpenRTB auction request
    Validate {
        /// Path to the auction request JSON
        #[arg(long, short)]
        file: PathBuf,
    },

    /// Show the wire requests the registered adapters would send
    Build {
        /// Path to the auction request JSON
        #[arg(long, short)]
        file: PathBuf,

        /// Only render requests for this bidder code
        #[arg(long)]
        bidder: Option<String>,
    },

    /// Map a partner response into bids
    Extract {
        /// Path to the wire request JSON sent to the partner
        #[arg(long)]
        request: PathBuf,

        /// Path to the partner response JSON
        #[arg(long)]
        response: PathBuf,

        /// Bidder code of the partner
        #[arg(long)]
        bidder: String,

        /// Path to the auction request the wire request was built from
        #[arg(long)]
        ad_units: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    match run(cli) {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_logger(verbose: bool) -> Result<(), CliError> {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}  {} {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .map_err(|e| CliError::Logger(e.to_string()))
}

fn run(cli: Cli) -> Result<String, CliError> {
    init_logger(cli.verbose)?;
    let settings = commands::load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate { file } => commands::validate(&settings, &file),
        Commands::Build { file, bidder } => commands::build(&settings, &file, bidder.as_deref()),
        Commands::Extract {
            request,
            response,
            bidder,
            ad_units,
        } => commands::extract(&settings, &request, &response, &bidder, &ad_units),
    }
}
