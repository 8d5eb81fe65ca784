#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Collision feed reading and normalization.
//!
//! Reads the tabular collision and casualty feeds, cleans their values,
//! assigns canonical collision IDs, recalculates casualty severities for the
//! travel modes of interest, and attaches a recency weight to every
//! collision.

pub mod clean;
pub mod collision_id;
pub mod feed;
pub mod normalize;
pub mod recency;

use std::path::PathBuf;

pub use normalize::{DropReport, NormalizeOptions, NormalizedCollisions, normalize};

/// Errors that can occur while reading or normalizing the collision feed.
#[derive(Debug, thiserror::Error)]
pub enum CollisionError {
    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The feed file does not exist or cannot be opened.
    #[error("Collision source unavailable: {}", path.display())]
    SourceUnavailable {
        /// Path that could not be opened.
        path: PathBuf,
    },

    /// A required column is missing or has the wrong shape.
    #[error("Schema violation: {message}")]
    SchemaViolation {
        /// Description of what went wrong.
        message: String,
    },
}
