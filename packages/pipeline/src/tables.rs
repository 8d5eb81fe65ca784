//! Flat CSV rows of the normalized, matched, and ranking tables.
//!
//! CSV has no nesting, so per-casualty-type counts are spread over one
//! column group per [`CasualtyType`] and the yearly series of a ranked
//! junction is stored as a JSON array in a single column.
//!
//! A table with no rows still carries its header, so downstream readers
//! (and the Parquet copy) always see the full schema.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use chrono::NaiveDate;
use junction_danger_analytics_models::{DangerousJunction, SeverityWeights};
use junction_danger_collision_models::{
    CasualtyType, MatchedCollision, NormalizedCollision, Severity, SeverityCounts,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// A row type written by [`write_table`].
pub trait TableRow: Serialize {
    /// Column names in field order, written as the header of an empty table.
    const COLUMNS: &'static [&'static str];
}

/// One row of the normalized collision table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionRow {
    pub collision_id: String,
    pub raw_collision_id: String,
    pub date: NaiveDate,
    pub year: i32,
    pub time: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub borough: String,
    pub junction_detail: String,
    pub fatal_cyclist_casualties: u32,
    pub serious_cyclist_casualties: u32,
    pub slight_cyclist_casualties: u32,
    pub max_cyclist_severity: Option<Severity>,
    pub fatal_pedestrian_casualties: u32,
    pub serious_pedestrian_casualties: u32,
    pub slight_pedestrian_casualties: u32,
    pub max_pedestrian_severity: Option<Severity>,
    pub recency_weight: f64,
}

impl TableRow for CollisionRow {
    const COLUMNS: &'static [&'static str] = &[
        "collision_id",
        "raw_collision_id",
        "date",
        "year",
        "time",
        "location",
        "latitude",
        "longitude",
        "borough",
        "junction_detail",
        "fatal_cyclist_casualties",
        "serious_cyclist_casualties",
        "slight_cyclist_casualties",
        "max_cyclist_severity",
        "fatal_pedestrian_casualties",
        "serious_pedestrian_casualties",
        "slight_pedestrian_casualties",
        "max_pedestrian_severity",
        "recency_weight",
    ];
}

impl From<&NormalizedCollision> for CollisionRow {
    fn from(c: &NormalizedCollision) -> Self {
        let cyclist = c.casualty_counts(CasualtyType::Cyclist);
        let pedestrian = c.casualty_counts(CasualtyType::Pedestrian);
        Self {
            collision_id: c.collision_id.clone(),
            raw_collision_id: c.raw_collision_id.clone(),
            date: c.date,
            year: c.year,
            time: c.time.clone(),
            location: c.location.clone(),
            latitude: c.latitude,
            longitude: c.longitude,
            borough: c.borough.clone(),
            junction_detail: c.junction_detail.clone(),
            fatal_cyclist_casualties: cyclist.fatal,
            serious_cyclist_casualties: cyclist.serious,
            slight_cyclist_casualties: cyclist.slight,
            max_cyclist_severity: cyclist.max_severity(),
            fatal_pedestrian_casualties: pedestrian.fatal,
            serious_pedestrian_casualties: pedestrian.serious,
            slight_pedestrian_casualties: pedestrian.slight,
            max_pedestrian_severity: pedestrian.max_severity(),
            recency_weight: c.recency_weight,
        }
    }
}

impl From<CollisionRow> for NormalizedCollision {
    fn from(row: CollisionRow) -> Self {
        Self {
            casualties: casualty_map(
                SeverityCounts {
                    fatal: row.fatal_cyclist_casualties,
                    serious: row.serious_cyclist_casualties,
                    slight: row.slight_cyclist_casualties,
                },
                SeverityCounts {
                    fatal: row.fatal_pedestrian_casualties,
                    serious: row.serious_pedestrian_casualties,
                    slight: row.slight_pedestrian_casualties,
                },
            ),
            collision_id: row.collision_id,
            raw_collision_id: row.raw_collision_id,
            date: row.date,
            year: row.year,
            time: row.time,
            location: row.location,
            latitude: row.latitude,
            longitude: row.longitude,
            borough: row.borough,
            junction_detail: row.junction_detail,
            recency_weight: row.recency_weight,
        }
    }
}

/// One row of the matched collision table.
///
/// Rows are keyed by the canonical collision ID, stored in the
/// `collision_index` column. The danger columns are derived from the
/// configured weights when the row is written and are ignored when it is
/// read back; ranking always rescores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedRow {
    #[serde(rename = "collision_index")]
    pub collision_id: String,
    pub raw_collision_id: String,
    pub junction_id: i64,
    pub junction_index: usize,
    pub distance_to_junction: f64,
    pub date: NaiveDate,
    pub year: i32,
    pub time: Option<String>,
    pub location: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub borough: String,
    pub junction_detail: String,
    pub fatal_cyclist_casualties: u32,
    pub serious_cyclist_casualties: u32,
    pub slight_cyclist_casualties: u32,
    pub max_cyclist_severity: Option<Severity>,
    pub fatal_pedestrian_casualties: u32,
    pub serious_pedestrian_casualties: u32,
    pub slight_pedestrian_casualties: u32,
    pub max_pedestrian_severity: Option<Severity>,
    pub recency_weight: f64,
    pub danger_metric_cyclist: Option<f64>,
    pub recency_danger_metric_cyclist: Option<f64>,
    pub danger_metric_pedestrian: Option<f64>,
    pub recency_danger_metric_pedestrian: Option<f64>,
}

impl TableRow for MatchedRow {
    const COLUMNS: &'static [&'static str] = &[
        "collision_index",
        "raw_collision_id",
        "junction_id",
        "junction_index",
        "distance_to_junction",
        "date",
        "year",
        "time",
        "location",
        "latitude",
        "longitude",
        "borough",
        "junction_detail",
        "fatal_cyclist_casualties",
        "serious_cyclist_casualties",
        "slight_cyclist_casualties",
        "max_cyclist_severity",
        "fatal_pedestrian_casualties",
        "serious_pedestrian_casualties",
        "slight_pedestrian_casualties",
        "max_pedestrian_severity",
        "recency_weight",
        "danger_metric_cyclist",
        "recency_danger_metric_cyclist",
        "danger_metric_pedestrian",
        "recency_danger_metric_pedestrian",
    ];
}

impl MatchedRow {
    /// Flattens a matched collision.
    ///
    /// Returns `None` for a collision without coordinates, which can never
    /// have been matched.
    #[must_use]
    pub fn new(matched: &MatchedCollision, weights: &SeverityWeights) -> Option<Self> {
        let c = &matched.collision;
        let (latitude, longitude) = c.coordinates()?;
        let cyclist = c.casualty_counts(CasualtyType::Cyclist);
        let pedestrian = c.casualty_counts(CasualtyType::Pedestrian);
        let danger = |counts: SeverityCounts| counts.max_severity().map(|s| weights.weight(s));
        let danger_metric_cyclist = danger(cyclist);
        let danger_metric_pedestrian = danger(pedestrian);

        Some(Self {
            collision_id: c.collision_id.clone(),
            raw_collision_id: c.raw_collision_id.clone(),
            junction_id: matched.junction_id,
            junction_index: matched.junction_index,
            distance_to_junction: matched.distance_to_junction,
            date: c.date,
            year: c.year,
            time: c.time.clone(),
            location: c.location.clone(),
            latitude,
            longitude,
            borough: c.borough.clone(),
            junction_detail: c.junction_detail.clone(),
            fatal_cyclist_casualties: cyclist.fatal,
            serious_cyclist_casualties: cyclist.serious,
            slight_cyclist_casualties: cyclist.slight,
            max_cyclist_severity: cyclist.max_severity(),
            fatal_pedestrian_casualties: pedestrian.fatal,
            serious_pedestrian_casualties: pedestrian.serious,
            slight_pedestrian_casualties: pedestrian.slight,
            max_pedestrian_severity: pedestrian.max_severity(),
            recency_weight: c.recency_weight,
            danger_metric_cyclist,
            recency_danger_metric_cyclist: danger_metric_cyclist.map(|d| d * c.recency_weight),
            danger_metric_pedestrian,
            recency_danger_metric_pedestrian: danger_metric_pedestrian
                .map(|d| d * c.recency_weight),
        })
    }
}

impl From<MatchedRow> for MatchedCollision {
    fn from(row: MatchedRow) -> Self {
        Self {
            collision: NormalizedCollision {
                casualties: casualty_map(
                    SeverityCounts {
                        fatal: row.fatal_cyclist_casualties,
                        serious: row.serious_cyclist_casualties,
                        slight: row.slight_cyclist_casualties,
                    },
                    SeverityCounts {
                        fatal: row.fatal_pedestrian_casualties,
                        serious: row.serious_pedestrian_casualties,
                        slight: row.slight_pedestrian_casualties,
                    },
                ),
                collision_id: row.collision_id,
                raw_collision_id: row.raw_collision_id,
                date: row.date,
                year: row.year,
                time: row.time,
                location: row.location,
                latitude: Some(row.latitude),
                longitude: Some(row.longitude),
                borough: row.borough,
                junction_detail: row.junction_detail,
                recency_weight: row.recency_weight,
            },
            junction_index: row.junction_index,
            junction_id: row.junction_id,
            distance_to_junction: row.distance_to_junction,
        }
    }
}

/// One row of the dangerous-junctions ranking table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRow {
    pub casualty_type: CasualtyType,
    pub junction_rank: usize,
    pub junction_cluster_id: i64,
    pub junction_cluster_name: String,
    pub latitude_cluster: f64,
    pub longitude_cluster: f64,
    pub recency_danger_metric: f64,
    pub fatal_casualties: u32,
    pub serious_casualties: u32,
    pub slight_casualties: u32,
    pub collision_count: usize,
    /// `5 * fatal + 3 * serious + slight` over the junction's casualties.
    pub linear_danger_metric: f64,
    pub danger_metric_trajectory: Option<f64>,
    /// JSON array of `{year, danger_metric, rolling_mean}` objects.
    pub yearly_danger_metrics: String,
}

impl TableRow for RankingRow {
    const COLUMNS: &'static [&'static str] = &[
        "casualty_type",
        "junction_rank",
        "junction_cluster_id",
        "junction_cluster_name",
        "latitude_cluster",
        "longitude_cluster",
        "recency_danger_metric",
        "fatal_casualties",
        "serious_casualties",
        "slight_casualties",
        "collision_count",
        "linear_danger_metric",
        "danger_metric_trajectory",
        "yearly_danger_metrics",
    ];
}

impl RankingRow {
    /// Flattens a ranked junction.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Json`] if the yearly series cannot be
    /// serialized.
    pub fn new(
        casualty_type: CasualtyType,
        junction: &DangerousJunction,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            casualty_type,
            junction_rank: junction.junction_rank,
            junction_cluster_id: junction.junction_cluster_id,
            junction_cluster_name: junction.junction_cluster_name.clone(),
            latitude_cluster: junction.latitude_cluster,
            longitude_cluster: junction.longitude_cluster,
            recency_danger_metric: junction.recency_danger_metric,
            fatal_casualties: junction.counts.fatal,
            serious_casualties: junction.counts.serious,
            slight_casualties: junction.counts.slight,
            collision_count: junction.collision_count,
            linear_danger_metric: junction.counts.linear_danger_metric(),
            danger_metric_trajectory: junction.danger_metric_trajectory,
            yearly_danger_metrics: serde_json::to_string(&junction.yearly_danger_metrics)?,
        })
    }
}

fn casualty_map(
    cyclist: SeverityCounts,
    pedestrian: SeverityCounts,
) -> BTreeMap<CasualtyType, SeverityCounts> {
    [
        (CasualtyType::Cyclist, cyclist),
        (CasualtyType::Pedestrian, pedestrian),
    ]
    .into_iter()
    .filter(|(_, counts)| !counts.is_empty())
    .collect()
}

/// Writes `rows` as a CSV table to `path`.
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be created or written.
pub fn write_table<T: TableRow>(path: &Path, rows: &[T]) -> Result<(), PipelineError> {
    let file = std::fs::File::create(path)?;
    write_rows(std::io::BufWriter::new(file), rows)?;
    log::info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Writes `rows` as CSV to any `Write` sink.
///
/// # Errors
///
/// Returns [`PipelineError`] if serialization or the write fails.
pub fn write_rows<T: TableRow>(writer: impl Write, rows: &[T]) -> Result<(), PipelineError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        csv_writer.write_record(T::COLUMNS)?;
    }
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Reads a CSV table written by [`write_table`].
///
/// # Errors
///
/// Returns [`PipelineError::SourceUnavailable`] if the file cannot be opened
/// and [`PipelineError::SchemaViolation`] if a row does not match `T`.
pub fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PipelineError> {
    let file = std::fs::File::open(path).map_err(|e| {
        log::error!("Cannot open {}: {e}", path.display());
        PipelineError::SourceUnavailable {
            path: path.to_path_buf(),
        }
    })?;
    let rows = parse_rows(file)?;
    log::info!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Parses CSV rows from any `Read` source.
///
/// # Errors
///
/// Returns [`PipelineError::SchemaViolation`] naming the first bad row.
pub fn parse_rows<T: DeserializeOwned>(reader: impl Read) -> Result<Vec<T>, PipelineError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    csv_reader
        .deserialize::<T>()
        .enumerate()
        .map(|(i, result)| {
            result.map_err(|e| PipelineError::SchemaViolation {
                message: format!("row {i}: {e}"),
            })
        })
        .collect()
}
