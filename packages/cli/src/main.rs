#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the junction danger pipeline.
//!
//! Each pipeline stage is a subcommand; without one, an interactive menu
//! picks the stage and the ranking filter. Logging goes through
//! [`junction_danger_cli_utils::init_logger`] so log lines and progress
//! bars share the terminal.

mod interactive;
mod report;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use junction_danger_analytics::cache::{InMemoryRankingCache, RankingCache};
use junction_danger_cli_utils::{IndicatifProgress, MultiProgress};
use junction_danger_collision_models::CasualtyType;
use junction_danger_pipeline::{
    PipelineConfig, RankingOverrides, build_junctions, export_boroughs, load_junctions,
    load_matched, load_normalized, match_to_junctions, normalize_collisions, rank, run,
};

#[derive(Parser)]
#[command(
    name = "junction_danger",
    about = "Rank London road junctions by cyclist and pedestrian collision danger"
)]
struct Cli {
    /// Pipeline configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(flatten)]
    overrides: OverrideArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Ranking options that override the config file for one invocation.
#[derive(Args, Default)]
struct OverrideArgs {
    /// Rank only this casualty type (cyclist or pedestrian)
    #[arg(long, global = true)]
    casualty_type: Option<CasualtyType>,
    /// Restrict rankings to a borough (repeatable)
    #[arg(long = "borough", global = true)]
    boroughs: Vec<String>,
    /// Number of junctions to rank
    #[arg(long, global = true)]
    n_junctions: Option<usize>,
    /// First collision year to include
    #[arg(long, global = true)]
    min_year: Option<i32>,
    /// Last collision year to include
    #[arg(long, global = true)]
    max_year: Option<i32>,
}

impl From<OverrideArgs> for RankingOverrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            casualty_type: args.casualty_type,
            boroughs: args.boroughs,
            n_junctions: args.n_junctions,
            min_year: args.min_year,
            max_year: args.max_year,
        }
    }
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Build the junction table from the raw and consolidated road graphs
    BuildJunctions,
    /// Clean the collision and casualty feeds into the normalized table
    Normalize,
    /// Match normalized collisions to their nearest junction
    Match,
    /// Rank the most dangerous junctions for the configured filter
    Rank,
    /// Rank the most dangerous junctions of every borough
    ExportBoroughs,
    /// Run every stage in order
    Run,
}

/// Runs one pipeline command against `config`.
fn execute(
    command: Commands,
    config: &PipelineConfig,
    cache: &dyn RankingCache,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();

    match command {
        Commands::BuildJunctions => {
            let table = build_junctions(config)?;
            log::info!(
                "Built {} junctions in {} clusters",
                table.len(),
                table.clusters().len()
            );
        }
        Commands::Normalize => {
            let normalized = normalize_collisions(config)?;
            report::print_drop_report(&normalized.report, normalized.collisions.len());
        }
        Commands::Match => {
            let junctions = load_junctions(config)?;
            let collisions = load_normalized(config)?;
            let progress = IndicatifProgress::records_bar(multi, "Matching collisions");
            let outcome = match_to_junctions(config, &junctions, &collisions, &progress)?;
            report::print_match_report(&outcome.report);
        }
        Commands::Rank => {
            let junctions = load_junctions(config)?;
            let matched = load_matched(config)?;
            for ranking in rank(config, cache, &junctions, &matched)? {
                report::print_ranking(&ranking.filter, &ranking.junctions);
                log::info!("Wrote {}", ranking.path.display());
            }
        }
        Commands::ExportBoroughs => {
            let junctions = load_junctions(config)?;
            let matched = load_matched(config)?;
            for path in export_boroughs(config, cache, &junctions, &matched)? {
                log::info!("Wrote {}", path.display());
            }
        }
        Commands::Run => {
            let progress = IndicatifProgress::records_bar(multi, "Matching collisions");
            let summary = run(config, cache, &progress)?;
            report::print_run_summary(&summary);
        }
    }

    log::info!("Finished in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = junction_danger_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = PipelineConfig::load_or_default(&cli.config)?;
    config.apply_overrides(&cli.overrides.into())?;

    let cache = InMemoryRankingCache::new();

    match cli.command {
        Some(command) => execute(command, &config, &cache, &multi),
        None => interactive::run(config, &cache, &multi),
    }
}
