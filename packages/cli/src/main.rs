#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for parcel activity matching and reporting.
//!
//! `match` fuses activity sources into a parcel collection, `aggregate`
//! cleans, clips and summarizes the result, and `sources` lists what is
//! configured.
//!
//! Uses `indicatif-log-bridge` (via [`parcel_fusion_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod matching;
mod reports;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use parcel_fusion_source::{
    ActivitySources,
    config::{parse_state_list, states_from_env},
};

#[derive(Parser)]
#[command(name = "parcel_fusion", about = "Parcel activity matching and reporting")]
struct Cli {
    /// Comma-separated state abbreviations to process (overrides
    /// `PARCEL_FUSION_STATES` env var)
    #[arg(long, global = true)]
    states: Option<String>,
    /// Worker threads for geometry work (defaults to one per core)
    #[arg(long, global = true)]
    threads: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match activity sources onto parcels and write the fused collection
    Match(matching::MatchArgs),
    /// Clean, clip and summarize a fused parcel collection
    Aggregate(reports::AggregateArgs),
    /// List configured activity sources
    Sources {
        /// Activity source descriptor file (TOML)
        #[arg(long)]
        sources: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = parcel_fusion_cli_utils::init_logger();
    let cli = Cli::parse();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
        log::info!("Using {threads} worker threads");
    }

    let states = cli
        .states
        .as_deref()
        .map(parse_state_list)
        .or_else(states_from_env);

    match cli.command {
        Commands::Match(args) => matching::run(args, states, &multi).await?,
        Commands::Aggregate(args) => reports::run(args, states, &multi).await?,
        Commands::Sources { sources } => {
            let config = ActivitySources::load(&sources).await?;
            let selected = config.select(states.as_deref())?;

            println!("{:<6} {:<36} {:<13} LOCATION", "STATE", "SOURCE", "RIGHTS TYPE");
            println!("{}", "-".repeat(90));
            let mut count = 0;
            for state in selected {
                for source in &state.activities {
                    println!(
                        "{:<6} {:<36} {:<13} {}",
                        state.state,
                        source.name,
                        source.rights_type.as_ref(),
                        source.location
                    );
                    count += 1;
                }
            }
            println!();
            println!("{count} sources");
        }
    }

    Ok(())
}
