//! Per-cluster aggregation of scored collisions.

use std::collections::BTreeMap;

use junction_danger_analytics_models::{JunctionAggregate, ScoredCollision};
use junction_danger_collision_models::SeverityCounts;

/// Sums scores and casualty counts per junction cluster.
///
/// Clusters are returned in ascending cluster ID order. Name and coordinates
/// are carried along with the cluster ID they depend on.
#[must_use]
pub fn aggregate(scored: &[ScoredCollision]) -> Vec<JunctionAggregate> {
    let mut clusters: BTreeMap<i64, JunctionAggregate> = BTreeMap::new();

    for collision in scored {
        let entry = clusters
            .entry(collision.junction_cluster_id)
            .or_insert_with(|| JunctionAggregate {
                junction_cluster_id: collision.junction_cluster_id,
                junction_cluster_name: collision.junction_cluster_name.clone(),
                latitude_cluster: collision.latitude_cluster,
                longitude_cluster: collision.longitude_cluster,
                recency_danger_metric: 0.0,
                danger_metric: 0.0,
                counts: SeverityCounts::default(),
                collision_count: 0,
                yearly: BTreeMap::new(),
            });

        entry.recency_danger_metric += collision.recency_danger_metric;
        entry.danger_metric += collision.danger_metric;
        entry.counts += collision.counts;
        entry.collision_count += 1;
        *entry.yearly.entry(collision.year).or_insert(0.0) += collision.danger_metric;
    }

    clusters.into_values().collect()
}

#[cfg(test)]
mod tests {
    use junction_danger_analytics_models::SeverityWeights;
    use junction_danger_collision_models::CasualtyType;

    use super::*;
    use crate::score::score;
    use crate::score::tests::{counts, junctions, matched};

    #[test]
    fn sums_per_cluster_across_member_nodes() {
        let input = vec![
            matched("a", 2019, 0, CasualtyType::Cyclist, counts(1, 0, 2)),
            matched("b", 2020, 1, CasualtyType::Cyclist, counts(0, 0, 1)),
            matched("c", 2020, 1, CasualtyType::Cyclist, counts(0, 1, 0)),
            matched("d", 2021, 2, CasualtyType::Cyclist, counts(0, 0, 1)),
        ];
        let scored = score(
            &input,
            &junctions(),
            CasualtyType::Cyclist,
            &SeverityWeights::default(),
        )
        .unwrap();

        let aggregated = aggregate(&scored);
        assert_eq!(aggregated.len(), 2);

        let a = &aggregated[0];
        assert_eq!(a.junction_cluster_id, 1);
        assert_eq!(a.collision_count, 3);
        assert_eq!(a.counts, counts(1, 1, 3));
        assert!((a.danger_metric - (6.8 + 0.06 + 1.0)).abs() < 1e-12);
        assert!((a.yearly[&2019] - 6.8).abs() < 1e-12);
        assert!((a.yearly[&2020] - 1.06).abs() < 1e-12);

        let expected_recency: f64 = scored
            .iter()
            .filter(|s| s.junction_cluster_id == 1)
            .map(|s| s.recency_danger_metric)
            .sum();
        assert!((a.recency_danger_metric - expected_recency).abs() < 1e-12);
    }

    #[test]
    fn empty_input_aggregates_to_nothing() {
        assert!(aggregate(&[]).is_empty());
    }
}
