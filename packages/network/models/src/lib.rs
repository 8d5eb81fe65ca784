#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Road-network graph and junction table types.
//!
//! The network is supplied by an external graph builder as two graphs: the
//! raw street network and a consolidated version in which nearby raw nodes
//! are merged into cluster nodes. The junction table is the two-level
//! hierarchy derived from them (raw node -> parent cluster).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An intersection in the raw street network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    /// Network node ID.
    pub id: i64,
    /// Latitude (WGS84).
    #[serde(alias = "lat")]
    pub latitude: f64,
    /// Longitude (WGS84).
    #[serde(alias = "lon")]
    pub longitude: f64,
}

/// Street name attribute of an edge.
///
/// Simplified graphs merge edges, so a single edge can carry several names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreetName {
    /// A single street name.
    One(String),
    /// Names of every merged segment.
    Many(Vec<String>),
}

impl StreetName {
    /// All names carried by this attribute.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::One(name) => std::slice::from_ref(name),
            Self::Many(names) => names,
        }
    }
}

/// A street segment between two raw nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEdge {
    /// Source node ID.
    pub u: i64,
    /// Target node ID.
    pub v: i64,
    /// Street name, if the segment is named.
    #[serde(default)]
    pub name: Option<StreetName>,
}

/// The raw street network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawGraph {
    /// Intersections.
    pub nodes: Vec<RawNode>,
    /// Street segments.
    #[serde(default)]
    pub edges: Vec<RawEdge>,
}

/// The raw node IDs merged into one cluster node.
///
/// Graph exports are inconsistent about this attribute: a lone member is
/// written as a bare integer, several members as a list, and some exports
/// stringify the list (`"[101, 102]"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemberIds {
    /// A single raw node.
    Single(i64),
    /// Several raw nodes.
    List(Vec<i64>),
    /// A stringified list of raw nodes.
    Text(String),
}

impl MemberIds {
    /// Returns the member IDs as integers.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidMemberIdsError`] if a stringified list contains a
    /// value that is not an integer.
    pub fn ids(&self) -> Result<Vec<i64>, InvalidMemberIdsError> {
        match self {
            Self::Single(id) => Ok(vec![*id]),
            Self::List(ids) => Ok(ids.clone()),
            Self::Text(text) => text
                .trim()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| {
                    part.parse::<i64>().map_err(|_| InvalidMemberIdsError {
                        value: text.clone(),
                    })
                })
                .collect(),
        }
    }
}

/// Error returned when a stringified member list cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidMemberIdsError {
    /// The offending attribute value.
    pub value: String,
}

impl std::fmt::Display for InvalidMemberIdsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid member ID list: {:?}", self.value)
    }
}

impl std::error::Error for InvalidMemberIdsError {}

/// A node of the consolidated graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNode {
    /// Cluster ID.
    pub id: i64,
    /// Raw nodes merged into this cluster.
    pub osmid_original: MemberIds,
}

/// The consolidated graph. Only its nodes are needed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedGraph {
    /// Cluster nodes.
    pub nodes: Vec<ClusterNode>,
}

/// One row of the junction table: a raw junction node and its parent
/// cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JunctionRow {
    /// Row index, `0..n`.
    pub junction_index: usize,
    /// Raw network node ID.
    pub junction_id: i64,
    /// Node latitude.
    pub latitude_junction: f64,
    /// Node longitude.
    pub longitude_junction: f64,
    /// Parent cluster ID.
    pub junction_cluster_id: i64,
    /// Cluster latitude (mean of member nodes).
    pub latitude_cluster: f64,
    /// Cluster longitude (mean of member nodes).
    pub longitude_cluster: f64,
    /// Display name of the cluster.
    pub junction_cluster_name: String,
}

/// A consolidated junction as seen by people on the street.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JunctionCluster {
    /// Cluster ID.
    pub junction_cluster_id: i64,
    /// Display name.
    pub junction_cluster_name: String,
    /// Mean latitude of the members.
    pub latitude_cluster: f64,
    /// Mean longitude of the members.
    pub longitude_cluster: f64,
    /// Raw node IDs in the cluster, ascending.
    pub member_ids: Vec<i64>,
}

/// The two-level junction hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JunctionTable {
    /// One row per raw node, ordered by `junction_index`.
    pub rows: Vec<JunctionRow>,
}

impl JunctionTable {
    /// Number of raw junction nodes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no junctions.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Looks up a row by its `junction_index`.
    #[must_use]
    pub fn get(&self, junction_index: usize) -> Option<&JunctionRow> {
        self.rows
            .get(junction_index)
            .filter(|row| row.junction_index == junction_index)
            .or_else(|| {
                self.rows
                    .iter()
                    .find(|row| row.junction_index == junction_index)
            })
    }

    /// Groups the rows into clusters, ordered by cluster ID.
    #[must_use]
    pub fn clusters(&self) -> Vec<JunctionCluster> {
        let mut clusters: BTreeMap<i64, JunctionCluster> = BTreeMap::new();
        for row in &self.rows {
            clusters
                .entry(row.junction_cluster_id)
                .or_insert_with(|| JunctionCluster {
                    junction_cluster_id: row.junction_cluster_id,
                    junction_cluster_name: row.junction_cluster_name.clone(),
                    latitude_cluster: row.latitude_cluster,
                    longitude_cluster: row.longitude_cluster,
                    member_ids: Vec::new(),
                })
                .member_ids
                .push(row.junction_id);
        }

        clusters
            .into_values()
            .map(|mut cluster| {
                cluster.member_ids.sort_unstable();
                cluster
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_ids_accept_every_export_shape() {
        assert_eq!(MemberIds::Single(7).ids().unwrap(), vec![7]);
        assert_eq!(MemberIds::List(vec![1, 2]).ids().unwrap(), vec![1, 2]);
        assert_eq!(
            MemberIds::Text("[101, 102]".to_string()).ids().unwrap(),
            vec![101, 102]
        );
        assert!(MemberIds::Text("[]".to_string()).ids().unwrap().is_empty());
        assert!(MemberIds::Text("[1, x]".to_string()).ids().is_err());
    }

    #[test]
    fn member_ids_deserialize_untagged() {
        let nodes: Vec<ClusterNode> = serde_json::from_str(
            r#"[
                {"id": 1, "osmid_original": 10},
                {"id": 2, "osmid_original": [11, 12]},
                {"id": 3, "osmid_original": "[13, 14]"}
            ]"#,
        )
        .unwrap();
        assert_eq!(nodes[0].osmid_original, MemberIds::Single(10));
        assert_eq!(nodes[1].osmid_original.ids().unwrap(), vec![11, 12]);
        assert_eq!(nodes[2].osmid_original.ids().unwrap(), vec![13, 14]);
    }

    #[test]
    fn street_name_slices() {
        assert_eq!(
            StreetName::One("Strand".to_string()).as_slice(),
            ["Strand".to_string()]
        );
        let many = StreetName::Many(vec!["A".to_string(), "B".to_string()]);
        assert_eq!(many.as_slice().len(), 2);
    }

    #[test]
    fn clusters_group_rows_by_cluster_id() {
        let row = |index: usize, id: i64, cluster: i64| JunctionRow {
            junction_index: index,
            junction_id: id,
            latitude_junction: 51.5,
            longitude_junction: -0.1,
            junction_cluster_id: cluster,
            latitude_cluster: 51.5,
            longitude_cluster: -0.1,
            junction_cluster_name: format!("C{cluster}"),
        };
        let table = JunctionTable {
            rows: vec![row(0, 30, 2), row(1, 10, 1), row(2, 20, 2)],
        };

        let clusters = table.clusters();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].junction_cluster_id, 1);
        assert_eq!(clusters[1].member_ids, vec![20, 30]);
        assert_eq!(table.get(2).map(|r| r.junction_id), Some(20));
        assert!(table.get(3).is_none());
    }
}
