//! Per-collision danger scoring.

use junction_danger_analytics_models::{ScoredCollision, SeverityWeights};
use junction_danger_collision_models::{CasualtyType, MatchedCollision, SeverityCounts};
use junction_danger_network_models::JunctionTable;

use crate::AnalyticsError;

/// Danger metric of one collision: the weight of its single worst casualty.
///
/// Casualties below the worst severity do not contribute, so one fatal plus
/// three slight casualties scores the same as one fatal alone. Returns
/// `None` when there are no casualties.
#[must_use]
pub fn danger_metric(counts: &SeverityCounts, weights: &SeverityWeights) -> Option<f64> {
    counts.max_severity().map(|severity| weights.weight(severity))
}

/// Scores matched collisions for `casualty_type`.
///
/// Each collision is joined to its junction's cluster. Collisions with no
/// casualty of `casualty_type` are skipped.
///
/// # Errors
///
/// Returns [`AnalyticsError::UnknownJunction`] if a collision's junction
/// index is not in `junctions`.
pub fn score(
    matched: &[MatchedCollision],
    junctions: &JunctionTable,
    casualty_type: CasualtyType,
    weights: &SeverityWeights,
) -> Result<Vec<ScoredCollision>, AnalyticsError> {
    let mut scored = Vec::with_capacity(matched.len());

    for m in matched {
        let collision = &m.collision;
        let counts = collision.casualty_counts(casualty_type);
        let Some(max_severity) = counts.max_severity() else {
            continue;
        };
        let Some((latitude, longitude)) = collision.coordinates() else {
            continue;
        };

        let junction =
            junctions
                .get(m.junction_index)
                .ok_or_else(|| AnalyticsError::UnknownJunction {
                    collision_id: collision.collision_id.clone(),
                    junction_index: m.junction_index,
                })?;

        let danger_metric = weights.weight(max_severity);

        scored.push(ScoredCollision {
            collision_id: collision.collision_id.clone(),
            date: collision.date,
            year: collision.year,
            borough: collision.borough.clone(),
            latitude,
            longitude,
            junction_index: m.junction_index,
            junction_id: m.junction_id,
            distance_to_junction: m.distance_to_junction,
            junction_cluster_id: junction.junction_cluster_id,
            junction_cluster_name: junction.junction_cluster_name.clone(),
            latitude_cluster: junction.latitude_cluster,
            longitude_cluster: junction.longitude_cluster,
            casualty_type,
            counts,
            max_severity,
            danger_metric,
            recency_weight: collision.recency_weight,
            recency_danger_metric: danger_metric * collision.recency_weight,
        });
    }

    Ok(scored)
}

/// Scored collisions of one cluster, newest first.
#[must_use]
pub fn collisions_for_cluster(
    scored: &[ScoredCollision],
    junction_cluster_id: i64,
) -> Vec<ScoredCollision> {
    let mut collisions: Vec<ScoredCollision> = scored
        .iter()
        .filter(|c| c.junction_cluster_id == junction_cluster_id)
        .cloned()
        .collect();
    collisions.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.collision_id.cmp(&b.collision_id))
    });
    collisions
}
