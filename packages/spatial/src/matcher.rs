//! Collision to junction matching.

use std::sync::Arc;

use junction_danger_collision_models::{MatchedCollision, NormalizedCollision};
use serde::{Deserialize, Serialize};

use crate::index::{JunctionIndex, is_valid_coordinate};
use crate::progress::ProgressCallback;

/// Collisions processed between progress updates.
const PROGRESS_BATCH: usize = 1_000;

/// Counts from one matching run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Collisions offered for matching.
    pub collisions_in: usize,
    /// Collisions without a usable coordinate.
    pub missing_coordinates: usize,
    /// Collisions with a non-finite or out-of-range coordinate.
    pub invalid_coordinates: usize,
    /// Collisions whose nearest junction is beyond the threshold.
    pub beyond_threshold: usize,
    /// Collisions matched to a junction.
    pub matched: usize,
}

/// Output of [`match_collisions`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    /// Matched collisions, in input order.
    pub matched: Vec<MatchedCollision>,
    /// Why collisions were not matched.
    pub report: MatchReport,
}

/// Assigns each collision to its nearest junction node.
///
/// Collisions without coordinates, collisions with coordinates outside the
/// valid latitude/longitude range, and collisions more than
/// `distance_threshold` meters from every junction are excluded. Every
/// returned match satisfies `distance_to_junction <= distance_threshold`.
#[must_use]
pub fn match_collisions(
    collisions: &[NormalizedCollision],
    index: &JunctionIndex,
    distance_threshold: f64,
    progress: &Arc<dyn ProgressCallback>,
) -> MatchOutcome {
    let mut report = MatchReport {
        collisions_in: collisions.len(),
        ..MatchReport::default()
    };
    let mut matched = Vec::with_capacity(collisions.len());

    progress.set_total(collisions.len() as u64);

    for (i, collision) in collisions.iter().enumerate() {
        if i > 0 && i % PROGRESS_BATCH == 0 {
            progress.inc(PROGRESS_BATCH as u64);
        }

        let Some((latitude, longitude)) = collision.coordinates() else {
            log::debug!("Collision {} has no coordinates", collision.collision_id);
            report.missing_coordinates += 1;
            continue;
        };
        if !is_valid_coordinate(latitude, longitude) {
            log::warn!(
                "Collision {} has invalid coordinates ({latitude}, {longitude})",
                collision.collision_id
            );
            report.invalid_coordinates += 1;
            continue;
        }

        // Only an empty index has no nearest junction.
        let Some(nearest) = index.nearest(latitude, longitude) else {
            report.beyond_threshold += 1;
            continue;
        };

        if nearest.distance > distance_threshold {
            log::trace!(
                "Collision {} is {:.1}m from the nearest junction",
                collision.collision_id,
                nearest.distance
            );
            report.beyond_threshold += 1;
            continue;
        }

        matched.push(MatchedCollision {
            collision: collision.clone(),
            junction_index: nearest.junction_index,
            junction_id: nearest.junction_id,
            distance_to_junction: nearest.distance,
        });
    }

    report.matched = matched.len();
    progress.finish(format!(
        "Matched {} of {} collisions",
        report.matched, report.collisions_in
    ));

    log::info!(
        "Matched {} of {} collisions to junctions ({} without coordinates, {} invalid, {} beyond {distance_threshold}m)",
        report.matched,
        report.collisions_in,
        report.missing_coordinates,
        report.invalid_coordinates,
        report.beyond_threshold,
    );

    MatchOutcome { matched, report }
}
