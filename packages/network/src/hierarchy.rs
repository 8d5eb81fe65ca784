//! Raw node to cluster hierarchy.

use std::collections::{BTreeMap, BTreeSet};

use geo::{Distance as _, Haversine, Point};
use junction_danger_network_models::{
    ConsolidatedGraph, JunctionRow, JunctionTable, RawGraph, RawNode,
};

use crate::NetworkError;
use crate::naming::cluster_names;

/// Builds the junction table from the raw and consolidated graphs.
///
/// Every raw node ends up in exactly one cluster:
/// - a node listed by several clusters keeps the one with the lowest ID
/// - a node listed by none becomes a singleton cluster with a fresh ID
///   above every consolidated cluster ID, assigned in raw-node order
///
/// Cluster coordinates are the mean of the member node coordinates.
/// `tolerance` is the consolidation radius in meters the consolidated graph
/// was built with; clusters much wider than it are reported at debug level.
///
/// # Errors
///
/// Returns [`NetworkError::EmptyGraph`] if the raw graph has no nodes, or
/// [`NetworkError::SchemaViolation`] if a cluster's member list cannot be
/// parsed.
pub fn build_hierarchy(
    raw: &RawGraph,
    consolidated: &ConsolidatedGraph,
    tolerance: f64,
) -> Result<JunctionTable, NetworkError> {
    if raw.nodes.is_empty() {
        return Err(NetworkError::EmptyGraph);
    }

    let nodes = distinct_nodes(&raw.nodes);
    let known: BTreeSet<i64> = nodes.iter().map(|node| node.id).collect();

    let mut membership = consolidated_membership(consolidated, &known)?;
    let clustered = membership.len();

    let mut next_cluster_id = consolidated
        .nodes
        .iter()
        .map(|cluster| cluster.id)
        .max()
        .map_or(0, |max| max + 1);
    for node in &nodes {
        if !membership.contains_key(&node.id) {
            membership.insert(node.id, next_cluster_id);
            next_cluster_id += 1;
        }
    }

    let singletons = nodes.len() - clustered;
    if singletons > 0 {
        log::warn!("{singletons} raw nodes missing from the consolidated graph became singleton clusters");
    }

    let centroids = cluster_centroids(&nodes, &membership);
    report_wide_clusters(&nodes, &membership, &centroids, tolerance);

    let names = cluster_names(&raw.edges, &membership);

    let mut rows = Vec::with_capacity(nodes.len());
    for (junction_index, node) in nodes.iter().enumerate() {
        let Some(&cluster_id) = membership.get(&node.id) else {
            continue;
        };
        let (latitude_cluster, longitude_cluster) = centroids
            .get(&cluster_id)
            .copied()
            .unwrap_or((node.latitude, node.longitude));

        rows.push(JunctionRow {
            junction_index,
            junction_id: node.id,
            latitude_junction: node.latitude,
            longitude_junction: node.longitude,
            junction_cluster_id: cluster_id,
            latitude_cluster,
            longitude_cluster,
            junction_cluster_name: names
                .get(&cluster_id)
                .cloned()
                .unwrap_or_else(|| crate::naming::UNKNOWN_NAME.to_string()),
        });
    }

    log::info!(
        "Built junction table: {} nodes in {} clusters",
        rows.len(),
        centroids.len()
    );

    Ok(JunctionTable { rows })
}

/// Raw nodes in input order, first occurrence of each ID only.
fn distinct_nodes(nodes: &[RawNode]) -> Vec<RawNode> {
    let mut seen = BTreeSet::new();
    nodes
        .iter()
        .filter(|node| {
            let fresh = seen.insert(node.id);
            if !fresh {
                log::warn!("Ignoring duplicate raw node {}", node.id);
            }
            fresh
        })
        .copied()
        .collect()
}

/// Maps raw node ID to cluster ID from the consolidated graph.
fn consolidated_membership(
    consolidated: &ConsolidatedGraph,
    known: &BTreeSet<i64>,
) -> Result<BTreeMap<i64, i64>, NetworkError> {
    let mut clusters: Vec<_> = consolidated.nodes.iter().collect();
    clusters.sort_by_key(|cluster| cluster.id);

    let mut membership = BTreeMap::new();
    for cluster in clusters {
        let members = cluster
            .osmid_original
            .ids()
            .map_err(|e| NetworkError::SchemaViolation {
                message: format!("cluster {}: {e}", cluster.id),
            })?;

        for member in members {
            if !known.contains(&member) {
                log::debug!("Cluster {} lists unknown raw node {member}", cluster.id);
                continue;
            }
            if let Some(existing) = membership.get(&member) {
                log::warn!(
                    "Raw node {member} is in clusters {existing} and {}; keeping {existing}",
                    cluster.id
                );
                continue;
            }
            membership.insert(member, cluster.id);
        }
    }

    Ok(membership)
}

#[allow(clippy::cast_precision_loss)]
fn cluster_centroids(
    nodes: &[RawNode],
    membership: &BTreeMap<i64, i64>,
) -> BTreeMap<i64, (f64, f64)> {
    let mut sums: BTreeMap<i64, (f64, f64, usize)> = BTreeMap::new();
    for node in nodes {
        if let Some(cluster_id) = membership.get(&node.id) {
            let entry = sums.entry(*cluster_id).or_insert((0.0, 0.0, 0));
            entry.0 += node.latitude;
            entry.1 += node.longitude;
            entry.2 += 1;
        }
    }

    sums.into_iter()
        .map(|(cluster_id, (lat, lon, n))| (cluster_id, (lat / n as f64, lon / n as f64)))
        .collect()
}

fn report_wide_clusters(
    nodes: &[RawNode],
    membership: &BTreeMap<i64, i64>,
    centroids: &BTreeMap<i64, (f64, f64)>,
    tolerance: f64,
) {
    let mut wide = BTreeSet::new();
    for node in nodes {
        let Some(cluster_id) = membership.get(&node.id) else {
            continue;
        };
        let Some((lat, lon)) = centroids.get(cluster_id) else {
            continue;
        };
        let distance = Haversine.distance(
            Point::new(node.longitude, node.latitude),
            Point::new(*lon, *lat),
        );
        if distance > 2.0 * tolerance {
            wide.insert(*cluster_id);
        }
    }

    if !wide.is_empty() {
        log::debug!(
            "{} clusters have members more than {:.1}m from their centre",
            wide.len(),
            2.0 * tolerance
        );
    }
}
