//! Ranking junction clusters by aggregate danger.

use std::cmp::Ordering;

use junction_danger_analytics_models::{DangerousJunction, DangerousJunctions, JunctionAggregate};

use crate::trend::{trajectory_slope, year_span, yearly_series};

/// Ranking order: summed recency danger metric descending, then fatal
/// casualties descending, then cluster ID ascending.
#[must_use]
pub fn ranking_order(a: &JunctionAggregate, b: &JunctionAggregate) -> Ordering {
    b.recency_danger_metric
        .total_cmp(&a.recency_danger_metric)
        .then_with(|| b.counts.fatal.cmp(&a.counts.fatal))
        .then_with(|| a.junction_cluster_id.cmp(&b.junction_cluster_id))
}

/// Ranks clusters and attaches their yearly series.
///
/// The top `n` clusters are ranked `1..=n`. Every ranked cluster gets one
/// series entry per year from the earliest to the latest year seen among the
/// ranked clusters, with 0 for years without collisions.
#[must_use]
pub fn rank_and_trend(aggregated: &[JunctionAggregate], n: usize) -> DangerousJunctions {
    let mut ordered: Vec<&JunctionAggregate> = aggregated.iter().collect();
    ordered.sort_by(|a, b| ranking_order(a, b));
    ordered.truncate(n);

    let years = year_span(ordered.iter().map(|a| &a.yearly));

    let junctions = ordered
        .into_iter()
        .enumerate()
        .map(|(i, aggregate)| {
            let yearly_danger_metrics = yearly_series(&aggregate.yearly, &years);
            let danger_metric_trajectory = trajectory_slope(&yearly_danger_metrics);
            DangerousJunction {
                junction_rank: i + 1,
                junction_cluster_id: aggregate.junction_cluster_id,
                junction_cluster_name: aggregate.junction_cluster_name.clone(),
                latitude_cluster: aggregate.latitude_cluster,
                longitude_cluster: aggregate.longitude_cluster,
                recency_danger_metric: aggregate.recency_danger_metric,
                counts: aggregate.counts,
                collision_count: aggregate.collision_count,
                yearly_danger_metrics,
                danger_metric_trajectory,
            }
        })
        .collect();

    DangerousJunctions { junctions, years }
}
