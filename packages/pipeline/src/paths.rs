#![allow(clippy::module_name_repetitions)]
//! Canonical file names of the pipeline's tables.
//!
//! All paths are relative to the configured output directory.

use std::path::{Path, PathBuf};

use junction_danger_collision_models::CasualtyType;
use junction_danger_network::table::junction_table_file_name;

/// File name of the normalized collision table.
pub const NORMALIZED_COLLISIONS_FILE: &str = "normalized-collisions.csv";

/// Returns the junction table path for a consolidation tolerance.
#[must_use]
pub fn junction_table_path(dir: &Path, tolerance: f64) -> PathBuf {
    dir.join(junction_table_file_name(tolerance))
}

/// Returns the normalized collision table path.
#[must_use]
pub fn normalized_collisions_path(dir: &Path) -> PathBuf {
    dir.join(NORMALIZED_COLLISIONS_FILE)
}

/// Returns the matched collision table path for a consolidation tolerance.
#[must_use]
pub fn matched_collisions_path(dir: &Path, tolerance: f64) -> PathBuf {
    dir.join(format!("collisions-tolerance={tolerance}.csv"))
}

/// Returns the ranking table path for a casualty type.
#[must_use]
pub fn ranking_path(dir: &Path, casualty_type: CasualtyType) -> PathBuf {
    dir.join(format!("{casualty_type}_dangerous_junctions.csv"))
}

/// Returns the per-borough export path for a casualty type.
#[must_use]
pub fn borough_export_path(dir: &Path, casualty_type: CasualtyType) -> PathBuf {
    dir.join(format!("{casualty_type}_most_dangerous_junctions.csv"))
}

/// Returns the Parquet sibling of a CSV table.
#[must_use]
pub fn parquet_path(csv_path: &Path) -> PathBuf {
    csv_path.with_extension("parquet")
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
