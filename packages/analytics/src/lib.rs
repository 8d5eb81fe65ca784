#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Danger metric engine and junction ranking.
//!
//! Scores matched collisions by worst-casualty severity and recency, sums
//! the scores per junction cluster, ranks the clusters, and derives the
//! yearly series used for trend charts. Every function is a pure function
//! of its inputs; repeated rankings can be memoized through the
//! [`cache::RankingCache`] collaborator.

pub mod aggregate;
pub mod cache;
pub mod rank;
pub mod score;
pub mod trend;

use junction_danger_analytics_models::{DangerousJunctions, RankingFilter, SeverityWeights};
use junction_danger_collision_models::MatchedCollision;
use junction_danger_network_models::JunctionTable;
use thiserror::Error;

pub use aggregate::aggregate;
pub use rank::rank_and_trend;
pub use score::{collisions_for_cluster, score};

/// Errors that can occur during scoring and ranking.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A matched collision points at a junction missing from the table.
    #[error("Matched collision {collision_id} refers to unknown junction {junction_index}")]
    UnknownJunction {
        /// Canonical ID of the collision.
        collision_id: String,
        /// The junction index it was matched to.
        junction_index: usize,
    },

    /// A cache key could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Scores, filters, aggregates, and ranks in one call.
///
/// Collisions outside `filter` are excluded before aggregation. An empty
/// filter (no boroughs selected) short-circuits to an empty result.
///
/// # Errors
///
/// Returns [`AnalyticsError::UnknownJunction`] if a matched collision refers
/// to a junction index that is not in `junctions`.
pub fn dangerous_junctions(
    matched: &[MatchedCollision],
    junctions: &JunctionTable,
    filter: &RankingFilter,
    weights: &SeverityWeights,
    n: usize,
) -> Result<DangerousJunctions, AnalyticsError> {
    if filter.is_empty() {
        log::debug!("Empty ranking filter, skipping ranking");
        return Ok(DangerousJunctions::default());
    }

    let scored = score(matched, junctions, filter.casualty_type, weights)?;
    let kept: Vec<_> = scored
        .into_iter()
        .filter(|c| filter.matches(&c.borough, c.year))
        .collect();

    let aggregated = aggregate(&kept);
    let ranked = rank_and_trend(&aggregated, n);

    log::debug!(
        "Ranked {} of {} clusters for {} ({} collisions)",
        ranked.junctions.len(),
        aggregated.len(),
        filter.casualty_type,
        kept.len()
    );

    Ok(ranked)
}
