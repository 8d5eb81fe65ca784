//! Per-borough batch export of the most dangerous junctions.
//!
//! Every borough is ranked independently, so boroughs are processed in
//! parallel. Rows come out ordered by borough, then rank.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use junction_danger_analytics::cache::{RankingCache, cached_dangerous_junctions};
use junction_danger_analytics_models::{DangerousJunction, RankingFilter, SeverityWeights};
use junction_danger_collision_models::{CasualtyType, MatchedCollision};
use junction_danger_network_models::JunctionTable;
use rayon::prelude::*;
use serde::Serialize;

use crate::PipelineError;

/// One exported junction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoroughJunctionRow {
    pub borough: String,
    pub casualty_type: CasualtyType,
    pub junction_rank: usize,
    pub junction_cluster_name: String,
    pub latitude_cluster: f64,
    pub longitude_cluster: f64,
    pub gmaps_link: String,
    pub recency_danger_metric: f64,
    pub fatal_casualties: u32,
    pub serious_casualties: u32,
    pub slight_casualties: u32,
}

impl BoroughJunctionRow {
    fn new(borough: &str, casualty_type: CasualtyType, junction: &DangerousJunction) -> Self {
        Self {
            borough: borough.to_string(),
            casualty_type,
            junction_rank: junction.junction_rank,
            junction_cluster_name: junction.junction_cluster_name.clone(),
            latitude_cluster: junction.latitude_cluster,
            longitude_cluster: junction.longitude_cluster,
            gmaps_link: gmaps_link(junction.latitude_cluster, junction.longitude_cluster),
            recency_danger_metric: junction.recency_danger_metric,
            fatal_casualties: junction.counts.fatal,
            serious_casualties: junction.counts.serious,
            slight_casualties: junction.counts.slight,
        }
    }
}

/// Google Maps link to a coordinate.
#[must_use]
pub fn gmaps_link(latitude: f64, longitude: f64) -> String {
    format!("https://www.google.com/maps/place/{latitude},{longitude}")
}

/// Boroughs present in the matched collisions, sorted.
#[must_use]
pub fn boroughs(matched: &[MatchedCollision]) -> Vec<String> {
    matched
        .iter()
        .map(|m| m.collision.borough.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Ranks the top `n` junctions of every borough for `base.casualty_type`.
///
/// The year range of `base` is kept; its borough selection, if any, limits
/// which boroughs are exported.
///
/// # Errors
///
/// Returns [`PipelineError::Analytics`] if any borough's ranking fails.
pub fn borough_rankings(
    cache: &dyn RankingCache,
    dataset_fingerprint: &str,
    matched: &[MatchedCollision],
    junctions: &JunctionTable,
    base: &RankingFilter,
    weights: &SeverityWeights,
    n: usize,
) -> Result<Vec<BoroughJunctionRow>, PipelineError> {
    let selected: Vec<String> = boroughs(matched)
        .into_iter()
        .filter(|b| base.boroughs.as_ref().is_none_or(|keep| keep.contains(b)))
        .collect();

    log::info!(
        "Ranking {} boroughs for {}",
        selected.len(),
        base.casualty_type
    );

    let per_borough = selected
        .par_iter()
        .map(|borough| -> Result<Vec<BoroughJunctionRow>, PipelineError> {
            let filter = base.clone().with_boroughs([borough]);
            let ranking = cached_dangerous_junctions(
                cache,
                dataset_fingerprint,
                matched,
                junctions,
                &filter,
                weights,
                n,
            )?;
            log::debug!("{borough}: {} junctions", ranking.junctions.len());
            Ok(ranking
                .junctions
                .iter()
                .map(|j| BoroughJunctionRow::new(borough, base.casualty_type, j))
                .collect())
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(per_borough.into_iter().flatten().collect())
}

/// Column names of the export for one casualty type.
#[must_use]
pub fn export_header(casualty_type: CasualtyType) -> Vec<String> {
    let mut header: Vec<String> = [
        "borough",
        "casualty_type",
        "junction_rank",
        "junction_cluster_name",
        "latitude_cluster",
        "longitude_cluster",
        "gmaps_link",
        "recency_danger_metric",
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    header.extend(
        ["fatal", "serious", "slight"]
            .iter()
            .map(|severity| format!("{severity}_{casualty_type}_casualties")),
    );
    header
}

/// Writes export rows with the casualty-type specific header.
///
/// # Errors
///
/// Returns [`PipelineError`] if serialization or the write fails.
pub fn write_borough_rows(
    writer: impl Write,
    casualty_type: CasualtyType,
    rows: &[BoroughJunctionRow],
) -> Result<(), PipelineError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(export_header(casualty_type))?;
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes the export file for one casualty type.
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be created or written.
pub fn write_borough_export(
    path: &Path,
    casualty_type: CasualtyType,
    rows: &[BoroughJunctionRow],
) -> Result<(), PipelineError> {
    let file = std::fs::File::create(path)?;
    write_borough_rows(std::io::BufWriter::new(file), casualty_type, rows)?;
    log::info!("Wrote {} borough junctions to {}", rows.len(), path.display());
    Ok(())
}
