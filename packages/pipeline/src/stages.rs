//! The pipeline stages.
//!
//! Each stage reads its inputs, computes, and writes its table into the
//! output directory. A failed read aborts the stage before anything is
//! written; [`run`] reads the network and both feeds before its first
//! write.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use junction_danger_analytics::cache::{RankingCache, cached_dangerous_junctions};
use junction_danger_analytics_models::{DangerousJunctions, RankingFilter};
use junction_danger_collision::feed::{read_casualties, read_collisions};
use junction_danger_collision::{CollisionError, DropReport, NormalizedCollisions, normalize};
use junction_danger_collision_models::{MatchedCollision, NormalizedCollision};
use junction_danger_network::build_hierarchy;
use junction_danger_network::graph::{load_consolidated_graph, load_raw_graph};
use junction_danger_network::table::{read_junction_table, write_junction_table};
use junction_danger_network_models::JunctionTable;
use junction_danger_spatial::progress::ProgressCallback;
use junction_danger_spatial::{JunctionIndex, MatchOutcome, MatchReport, match_collisions};

use crate::PipelineError;
use crate::config::PipelineConfig;
use crate::export::{borough_rankings, write_borough_export};
use crate::fingerprint::dataset_fingerprint;
use crate::paths::{
    borough_export_path, ensure_dir, junction_table_path, matched_collisions_path,
    normalized_collisions_path, ranking_path,
};
use crate::tables::{CollisionRow, MatchedRow, RankingRow, read_table, write_table};

/// One ranking produced by [`rank`].
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    /// Filter the ranking was computed for.
    pub filter: RankingFilter,
    /// The ranked junctions.
    pub junctions: Arc<DangerousJunctions>,
    /// Where the ranking table was written.
    pub path: PathBuf,
}

/// Counts from a full [`run`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Junction nodes in the junction table.
    pub junctions: usize,
    /// Junction clusters in the junction table.
    pub clusters: usize,
    /// Normalization drop counts.
    pub normalized: DropReport,
    /// Matching counts.
    pub matched: MatchReport,
    /// Ranked junctions per ranking table.
    pub rankings: Vec<(RankingFilter, usize)>,
    /// Borough export files written.
    pub exports: Vec<PathBuf>,
}

fn output_dir(config: &PipelineConfig) -> Result<PathBuf, PipelineError> {
    let dir = config.output_dir();
    ensure_dir(&dir)?;
    Ok(dir)
}

fn write_parquet_copy(
    config: &PipelineConfig,
    csv_path: &Path,
    rows: usize,
) -> Result<(), PipelineError> {
    if !config.output.parquet {
        return Ok(());
    }
    if rows == 0 {
        log::info!("{} has no rows; no Parquet copy written", csv_path.display());
        return Ok(());
    }

    #[cfg(feature = "parquet")]
    crate::parquet::write_parquet(csv_path)?;

    #[cfg(not(feature = "parquet"))]
    log::warn!(
        "output.parquet is set but Parquet support is not compiled in; skipping {}",
        csv_path.display()
    );

    Ok(())
}

/// Builds the junction table from the network graphs and writes it.
///
/// # Errors
///
/// Returns [`PipelineError::Network`] if either graph is unavailable or
/// malformed. Nothing is written in that case.
pub fn build_junctions(config: &PipelineConfig) -> Result<JunctionTable, PipelineError> {
    let table = read_network(config)?;
    write_junctions(config, &table)?;
    Ok(table)
}

fn read_network(config: &PipelineConfig) -> Result<JunctionTable, PipelineError> {
    let raw = load_raw_graph(&config.resolve(&config.network.raw_graph))?;
    let consolidated = load_consolidated_graph(&config.resolve(&config.network.consolidated_graph))?;
    Ok(build_hierarchy(&raw, &consolidated, config.network.tolerance)?)
}

fn write_junctions(config: &PipelineConfig, table: &JunctionTable) -> Result<(), PipelineError> {
    let path = junction_table_path(&output_dir(config)?, config.network.tolerance);
    write_junction_table(&path, table)?;
    write_parquet_copy(config, &path, table.len())
}

/// Reads the junction table written by [`build_junctions`].
///
/// # Errors
///
/// Returns [`PipelineError::Network`] if the table is missing or malformed.
pub fn load_junctions(config: &PipelineConfig) -> Result<JunctionTable, PipelineError> {
    let path = junction_table_path(&config.output_dir(), config.network.tolerance);
    Ok(read_junction_table(&path)?)
}

/// Reads and normalizes the collision feed and writes the normalized table.
///
/// # Errors
///
/// Returns [`PipelineError::Collision`] if a feed is unavailable or lacks a
/// required column. Nothing is written in that case.
pub fn normalize_collisions(config: &PipelineConfig) -> Result<NormalizedCollisions, PipelineError> {
    let normalized = read_feeds(config)?;
    write_normalized(config, &normalized)?;
    Ok(normalized)
}

fn read_feeds(config: &PipelineConfig) -> Result<NormalizedCollisions, CollisionError> {
    let collisions = read_collisions(&config.resolve(&config.collisions.collisions))?;
    let casualties = read_casualties(&config.resolve(&config.collisions.casualties))?;
    Ok(normalize(&collisions, &casualties, &config.normalize_options()))
}

fn write_normalized(
    config: &PipelineConfig,
    normalized: &NormalizedCollisions,
) -> Result<(), PipelineError> {
    let rows: Vec<CollisionRow> = normalized.collisions.iter().map(CollisionRow::from).collect();
    let path = normalized_collisions_path(&output_dir(config)?);
    write_table(&path, &rows)?;
    write_parquet_copy(config, &path, rows.len())
}

/// Reads the normalized table written by [`normalize_collisions`].
///
/// # Errors
///
/// Returns [`PipelineError::SourceUnavailable`] or
/// [`PipelineError::SchemaViolation`].
pub fn load_normalized(config: &PipelineConfig) -> Result<Vec<NormalizedCollision>, PipelineError> {
    let rows: Vec<CollisionRow> = read_table(&normalized_collisions_path(&config.output_dir()))?;
    Ok(rows.into_iter().map(NormalizedCollision::from).collect())
}

/// Matches collisions to their nearest junction and writes the matched
/// table.
///
/// Collisions beyond `matching.distance_to_junction_threshold` are not at a
/// junction and are excluded from every ranking; the report counts them.
///
/// # Errors
///
/// Returns [`PipelineError::Spatial`] if a junction cannot be indexed.
pub fn match_to_junctions(
    config: &PipelineConfig,
    junctions: &JunctionTable,
    collisions: &[NormalizedCollision],
    progress: &Arc<dyn ProgressCallback>,
) -> Result<MatchOutcome, PipelineError> {
    let index = JunctionIndex::build(junctions)?;
    let threshold = config.matching.distance_to_junction_threshold;
    let outcome = match_collisions(collisions, &index, threshold, progress);

    if outcome.report.beyond_threshold > 0 {
        log::info!(
            "{} collisions are more than {threshold}m from any junction and are excluded",
            outcome.report.beyond_threshold
        );
    }

    let weights = config.scoring.weights();
    let rows: Vec<MatchedRow> = outcome
        .matched
        .iter()
        .filter_map(|m| MatchedRow::new(m, &weights))
        .collect();
    let path = matched_collisions_path(&output_dir(config)?, config.network.tolerance);
    write_table(&path, &rows)?;
    write_parquet_copy(config, &path, rows.len())?;
    Ok(outcome)
}

/// Reads the matched table written by [`match_to_junctions`].
///
/// # Errors
///
/// Returns [`PipelineError::SourceUnavailable`] or
/// [`PipelineError::SchemaViolation`].
pub fn load_matched(config: &PipelineConfig) -> Result<Vec<MatchedCollision>, PipelineError> {
    let path = matched_collisions_path(&config.output_dir(), config.network.tolerance);
    let rows: Vec<MatchedRow> = read_table(&path)?;
    Ok(rows.into_iter().map(MatchedCollision::from).collect())
}

/// Ranks junctions for every configured casualty type under the `[ranking]`
/// filter and writes one ranking table per casualty type.
///
/// # Errors
///
/// Returns [`PipelineError::Analytics`] if a collision refers to a junction
/// missing from `junctions`.
pub fn rank(
    config: &PipelineConfig,
    cache: &dyn RankingCache,
    junctions: &JunctionTable,
    matched: &[MatchedCollision],
) -> Result<Vec<Ranking>, PipelineError> {
    let fingerprint = dataset_fingerprint(junctions, matched)?;
    let weights = config.scoring.weights();
    let dir = output_dir(config)?;

    config
        .ranked_casualty_types()
        .into_iter()
        .map(|casualty_type| -> Result<Ranking, PipelineError> {
            let filter = config.ranking_filter(casualty_type);
            let ranked = cached_dangerous_junctions(
                cache,
                &fingerprint,
                matched,
                junctions,
                &filter,
                &weights,
                config.ranking.n_junctions,
            )?;

            let rows = ranked
                .junctions
                .iter()
                .map(|j| RankingRow::new(casualty_type, j))
                .collect::<Result<Vec<_>, _>>()?;
            let path = ranking_path(&dir, casualty_type);
            write_table(&path, &rows)?;
            write_parquet_copy(config, &path, rows.len())?;

            log::info!(
                "Ranked {} junctions for {casualty_type} over {} years",
                ranked.junctions.len(),
                ranked.years.len()
            );

            Ok(Ranking {
                filter,
                junctions: ranked,
                path,
            })
        })
        .collect()
}

/// Writes the per-borough top-N export for every configured casualty type.
///
/// # Errors
///
/// Returns [`PipelineError::Analytics`] if a ranking fails.
pub fn export_boroughs(
    config: &PipelineConfig,
    cache: &dyn RankingCache,
    junctions: &JunctionTable,
    matched: &[MatchedCollision],
) -> Result<Vec<PathBuf>, PipelineError> {
    let fingerprint = dataset_fingerprint(junctions, matched)?;
    let weights = config.scoring.weights();
    let dir = output_dir(config)?;

    config
        .ranked_casualty_types()
        .into_iter()
        .map(|casualty_type| -> Result<PathBuf, PipelineError> {
            let rows = borough_rankings(
                cache,
                &fingerprint,
                matched,
                junctions,
                &config.ranking_filter(casualty_type),
                &weights,
                config.ranking.n_junctions,
            )?;
            let path = borough_export_path(&dir, casualty_type);
            write_borough_export(&path, casualty_type, &rows)?;
            write_parquet_copy(config, &path, rows.len())?;
            Ok(path)
        })
        .collect()
}

/// Runs every stage in order.
///
/// Both network graphs and both collision feeds are read and validated
/// before the first table is written, so a missing input leaves the output
/// directory untouched.
///
/// # Errors
///
/// Returns the first stage error; later stages do not run.
pub fn run(
    config: &PipelineConfig,
    cache: &dyn RankingCache,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<RunSummary, PipelineError> {
    log::info!("Building junction table (tolerance {}m)", config.network.tolerance);
    let junctions = read_network(config)?;

    log::info!("Normalizing collisions");
    let normalized = read_feeds(config)?;

    write_junctions(config, &junctions)?;
    write_normalized(config, &normalized)?;

    log::info!("Matching collisions to junctions");
    let outcome = match_to_junctions(config, &junctions, &normalized.collisions, progress)?;

    log::info!("Ranking junctions");
    let rankings = rank(config, cache, &junctions, &outcome.matched)?;

    log::info!("Exporting per-borough rankings");
    let exports = export_boroughs(config, cache, &junctions, &outcome.matched)?;

    Ok(RunSummary {
        junctions: junctions.len(),
        clusters: junctions.clusters().len(),
        normalized: normalized.report,
        matched: outcome.report,
        rankings: rankings
            .into_iter()
            .map(|r| (r.filter, r.junctions.junctions.len()))
            .collect(),
        exports,
    })
}
