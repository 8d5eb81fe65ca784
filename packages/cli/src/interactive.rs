//! Interactive menu shown when no subcommand is given.
//!
//! Prompts for a stage and, for the ranking stages, the ranking filter.
//! "Explore rankings" re-ranks the matched table under one filter after
//! another; rankings already computed come from the shared cache. Any
//! ranked junction can be opened to list the collisions behind its score.

use dialoguer::{Confirm, Input, MultiSelect, Select};
use junction_danger_analytics::cache::{RankingCache, cached_dangerous_junctions};
use junction_danger_analytics::{collisions_for_cluster, score};
use junction_danger_analytics_models::{
    DangerousJunctions, RankingFilter, ScoredCollision, SeverityWeights,
};
use junction_danger_cli_utils::MultiProgress;
use junction_danger_collision_models::{CasualtyType, MatchedCollision};
use junction_danger_network_models::JunctionTable;
use junction_danger_pipeline::export::boroughs;
use junction_danger_pipeline::fingerprint::dataset_fingerprint;
use junction_danger_pipeline::{PipelineConfig, RankingOverrides, load_junctions, load_matched};

use crate::{Commands, execute, report};

/// Top-level menu entries.
enum Step {
    Run,
    BuildJunctions,
    Normalize,
    Match,
    Rank,
    ExportBoroughs,
    Explore,
}

impl Step {
    const ALL: &[Self] = &[
        Self::Run,
        Self::BuildJunctions,
        Self::Normalize,
        Self::Match,
        Self::Rank,
        Self::ExportBoroughs,
        Self::Explore,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Run => "Run full pipeline",
            Self::BuildJunctions => "Build junction table",
            Self::Normalize => "Normalize collisions",
            Self::Match => "Match collisions to junctions",
            Self::Rank => "Rank dangerous junctions",
            Self::ExportBoroughs => "Export per-borough rankings",
            Self::Explore => "Explore rankings",
        }
    }

    const fn command(&self) -> Option<Commands> {
        match self {
            Self::Run => Some(Commands::Run),
            Self::BuildJunctions => Some(Commands::BuildJunctions),
            Self::Normalize => Some(Commands::Normalize),
            Self::Match => Some(Commands::Match),
            Self::Rank => Some(Commands::Rank),
            Self::ExportBoroughs => Some(Commands::ExportBoroughs),
            Self::Explore => None,
        }
    }

    const fn ranks(&self) -> bool {
        matches!(self, Self::Run | Self::Rank | Self::ExportBoroughs)
    }
}

/// Runs the interactive menu.
///
/// # Errors
///
/// Returns an error if a prompt fails or the chosen stage fails.
pub fn run(
    mut config: PipelineConfig,
    cache: &dyn RankingCache,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Junction Danger Toolchain");
    println!();

    let labels: Vec<&str> = Step::ALL.iter().map(Step::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;
    let step = &Step::ALL[idx];

    if step.ranks() {
        let overrides = prompt_overrides(&config)?;
        config.apply_overrides(&overrides)?;
    }

    match step.command() {
        Some(command) => execute(command, &config, cache, multi),
        None => explore(&config, cache),
    }
}

fn prompt_overrides(
    config: &PipelineConfig,
) -> Result<RankingOverrides, Box<dyn std::error::Error>> {
    let mut labels = vec!["All configured types".to_string()];
    labels.extend(CasualtyType::all().iter().map(ToString::to_string));
    let idx = Select::new()
        .with_prompt("Casualty type")
        .items(&labels)
        .default(0)
        .interact()?;
    let casualty_type = idx.checked_sub(1).map(|i| CasualtyType::all()[i]);

    let boroughs: String = Input::new()
        .with_prompt("Boroughs, comma-separated (empty for all)")
        .allow_empty(true)
        .interact_text()?;

    let n_junctions: usize = Input::new()
        .with_prompt("Number of junctions")
        .default(config.ranking.n_junctions)
        .interact_text()?;

    Ok(RankingOverrides {
        casualty_type,
        boroughs: boroughs
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(ToString::to_string)
            .collect(),
        n_junctions: Some(n_junctions),
        min_year: prompt_optional_i32("First year (empty for no limit)")?,
        max_year: prompt_optional_i32("Last year (empty for no limit)")?,
    })
}

fn explore(
    config: &PipelineConfig,
    cache: &dyn RankingCache,
) -> Result<(), Box<dyn std::error::Error>> {
    let junctions = load_junctions(config)?;
    let matched = load_matched(config)?;
    let fingerprint = dataset_fingerprint(&junctions, &matched)?;
    let weights = config.scoring.weights();
    let all_boroughs = boroughs(&matched);

    loop {
        let type_labels: Vec<String> = CasualtyType::all().iter().map(ToString::to_string).collect();
        let idx = Select::new()
            .with_prompt("Casualty type")
            .items(&type_labels)
            .default(0)
            .interact()?;
        let mut filter = RankingFilter::new(CasualtyType::all()[idx]);

        let selected = MultiSelect::new()
            .with_prompt("Boroughs (space=toggle, enter=confirm, none for all)")
            .items(&all_boroughs)
            .max_length(20)
            .interact()?;
        if !selected.is_empty() {
            filter = filter.with_boroughs(selected.iter().map(|&i| &all_boroughs[i]));
        }

        let n: usize = Input::new()
            .with_prompt("Number of junctions")
            .default(config.ranking.n_junctions)
            .interact_text()?;
        filter = filter.with_years(
            prompt_optional_i32("First year (empty for no limit)")?,
            prompt_optional_i32("Last year (empty for no limit)")?,
        );

        let ranking = cached_dangerous_junctions(
            cache,
            &fingerprint,
            &matched,
            &junctions,
            &filter,
            &weights,
            n,
        )?;
        report::print_ranking(&filter, &ranking);

        if !ranking.is_empty()
            && Confirm::new()
                .with_prompt("Show collisions at a ranked junction?")
                .default(false)
                .interact()?
        {
            let scored = filtered_scores(&matched, &junctions, &filter, &weights)?;
            drill_down(&ranking, &scored)?;
        }

        if !Confirm::new()
            .with_prompt("Try another filter?")
            .default(true)
            .interact()?
        {
            return Ok(());
        }
    }
}

/// Scores `matched` for the filter's casualty type and keeps the collisions
/// inside the filter, mirroring what the ranking aggregated.
fn filtered_scores(
    matched: &[MatchedCollision],
    junctions: &JunctionTable,
    filter: &RankingFilter,
    weights: &SeverityWeights,
) -> Result<Vec<ScoredCollision>, Box<dyn std::error::Error>> {
    Ok(score(matched, junctions, filter.casualty_type, weights)?
        .into_iter()
        .filter(|c| filter.matches(&c.borough, c.year))
        .collect())
}

fn drill_down(
    ranking: &DangerousJunctions,
    scored: &[ScoredCollision],
) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<String> = ranking
        .junctions
        .iter()
        .map(|j| format!("{:>3}. {}", j.junction_rank, j.junction_cluster_name))
        .collect();

    loop {
        let idx = Select::new()
            .with_prompt("Junction")
            .items(&labels)
            .default(0)
            .interact()?;
        let junction = &ranking.junctions[idx];
        let collisions = collisions_for_cluster(scored, junction.junction_cluster_id);
        report::print_cluster_collisions(&junction.junction_cluster_name, &collisions);

        if !Confirm::new()
            .with_prompt("Show another junction?")
            .default(false)
            .interact()?
        {
            return Ok(());
        }
    }
}

/// Prompts the user for an optional year.
///
/// Returns `None` if the input is empty.
fn prompt_optional_i32(prompt: &str) -> Result<Option<i32>, Box<dyn std::error::Error>> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;

    if input.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(input.trim().parse()?))
    }
}
