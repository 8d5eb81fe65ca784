#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Junction danger pipeline orchestration.
//!
//! Wires the stages together: network graphs become a junction table,
//! the collision feed is normalized and matched to junctions, and matched
//! collisions are ranked per casualty type and per borough. Every stage
//! fully materializes its table (CSV, optionally Parquet) in the configured
//! output directory before the next one starts, so stages can also be run
//! one at a time.

pub mod config;
pub mod export;
pub mod fingerprint;
#[cfg(feature = "parquet")]
pub mod parquet;
pub mod paths;
pub mod stages;
pub mod tables;

use std::path::PathBuf;

use junction_danger_analytics::AnalyticsError;
use junction_danger_collision::CollisionError;
use junction_danger_network::NetworkError;
use junction_danger_spatial::SpatialError;

pub use config::{PipelineConfig, RankingOverrides};
pub use stages::{
    Ranking, RunSummary, build_junctions, export_boroughs, load_junctions, load_matched,
    load_normalized, match_to_junctions, normalize_collisions, rank, run,
};

/// Errors that can abort a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A configuration value is out of range.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Description of the offending option.
        message: String,
    },

    /// The configuration file is not valid TOML for the schema.
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error (file read or write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read or write failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An intermediate table does not exist (its stage has not run).
    #[error("Table unavailable: {} (run the stage that produces it first)", path.display())]
    SourceUnavailable {
        /// Path that could not be opened.
        path: PathBuf,
    },

    /// An intermediate table has unexpected columns or values.
    #[error("Schema violation: {message}")]
    SchemaViolation {
        /// Description of what went wrong.
        message: String,
    },

    /// Collision feed error.
    #[error(transparent)]
    Collision(#[from] CollisionError),

    /// Road network error.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Junction index error.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// Scoring or ranking error.
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    /// Parquet conversion failed.
    #[cfg(feature = "parquet")]
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),
}
