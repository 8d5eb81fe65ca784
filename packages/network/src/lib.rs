#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Junction hierarchy builder.
//!
//! Combines the raw street network with its consolidated counterpart into a
//! junction table: every raw intersection node with its parent cluster, the
//! cluster's mean coordinate, and a display name built from the street names
//! meeting there.

pub mod graph;
pub mod hierarchy;
pub mod naming;
pub mod table;

use std::path::PathBuf;

pub use hierarchy::build_hierarchy;

/// Errors that can occur while loading the network or building the
/// junction table.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// I/O error (file read or write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The graph or junction table file does not exist or cannot be opened.
    #[error("Network source unavailable: {}", path.display())]
    SourceUnavailable {
        /// Path that could not be opened.
        path: PathBuf,
    },

    /// The input has the wrong shape.
    #[error("Schema violation: {message}")]
    SchemaViolation {
        /// Description of what went wrong.
        message: String,
    },

    /// The raw graph has no nodes.
    #[error("Raw network graph has no nodes")]
    EmptyGraph,
}
