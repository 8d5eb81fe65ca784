//! Junction cluster display names.
//!
//! A cluster is named after the distinct streets meeting at its member
//! nodes, e.g. `Charing Cross Rd-Strand`. Names are shortened with common
//! road-type abbreviations. Clusters that end up with the same name are told
//! apart by a `-{n}` suffix, `n` being the dense rank of the cluster ID among
//! clusters sharing the name.

use std::collections::{BTreeMap, BTreeSet};

use junction_danger_network_models::RawEdge;

/// Name given to clusters with no named street.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Separator between street names.
pub const NAME_SEPARATOR: &str = "-";

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("Avenue", "Ave"),
    ("Bridge", "Brg"),
    ("Gardens", "Gdns"),
    ("Place", "Pl"),
    ("Road", "Rd"),
    ("Street", "St"),
    ("Square", "Sq"),
];

/// Abbreviates road-type words (`Avenue` -> `Ave`, `Road` -> `Rd`, ...).
///
/// Only whole words are replaced, so `Roadside` stays intact.
#[must_use]
pub fn abbreviate(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            ABBREVIATIONS
                .iter()
                .find(|(long, _)| *long == word)
                .map_or(word, |(_, short)| *short)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Combines street names into one display name: blanks dropped, each name
/// abbreviated, then sorted, deduplicated, and joined with `-`.
///
/// Returns [`UNKNOWN_NAME`] when nothing is left.
#[must_use]
pub fn combine_names<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let distinct: BTreeSet<String> = names
        .into_iter()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(abbreviate)
        .collect();

    if distinct.is_empty() {
        return UNKNOWN_NAME.to_string();
    }

    distinct
        .into_iter()
        .collect::<Vec<_>>()
        .join(NAME_SEPARATOR)
}

/// Names every cluster in `membership` (raw node ID -> cluster ID) from the
/// edges touching its member nodes, then disambiguates repeated names.
#[must_use]
pub fn cluster_names(edges: &[RawEdge], membership: &BTreeMap<i64, i64>) -> BTreeMap<i64, String> {
    let mut street_names: BTreeMap<i64, Vec<&str>> = membership
        .values()
        .map(|cluster_id| (*cluster_id, Vec::new()))
        .collect();

    for edge in edges {
        let Some(name) = &edge.name else {
            continue;
        };

        let mut clusters: Vec<i64> = [edge.u, edge.v]
            .iter()
            .filter_map(|node| membership.get(node).copied())
            .collect();
        clusters.dedup();

        for cluster_id in clusters {
            if let Some(names) = street_names.get_mut(&cluster_id) {
                names.extend(name.as_slice().iter().map(String::as_str));
            }
        }
    }

    let names = street_names
        .into_iter()
        .map(|(cluster_id, names)| (cluster_id, combine_names(names)))
        .collect();

    disambiguate(names)
}

/// Appends `-{dense rank}` to every name shared by more than one cluster.
#[must_use]
pub fn disambiguate(names: BTreeMap<i64, String>) -> BTreeMap<i64, String> {
    let mut by_name: BTreeMap<&str, Vec<i64>> = BTreeMap::new();
    for (cluster_id, name) in &names {
        by_name.entry(name.as_str()).or_default().push(*cluster_id);
    }

    let mut suffixes: BTreeMap<i64, usize> = BTreeMap::new();
    for cluster_ids in by_name.values().filter(|ids| ids.len() > 1) {
        // BTreeMap iteration already yields cluster IDs in ascending order
        for (rank, cluster_id) in cluster_ids.iter().enumerate() {
            suffixes.insert(*cluster_id, rank + 1);
        }
    }

    names
        .into_iter()
        .map(|(cluster_id, name)| match suffixes.get(&cluster_id) {
            Some(rank) => (cluster_id, format!("{name}{NAME_SEPARATOR}{rank}")),
            None => (cluster_id, name),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use junction_danger_network_models::StreetName;

    use super::*;

    fn edge(u: i64, v: i64, name: Option<StreetName>) -> RawEdge {
        RawEdge { u, v, name }
    }

    #[test]
    fn abbreviates_whole_words_only() {
        assert_eq!(abbreviate("Charing Cross Road"), "Charing Cross Rd");
        assert_eq!(abbreviate("Trafalgar Square"), "Trafalgar Sq");
        assert_eq!(abbreviate("Roadside Gardens"), "Roadside Gdns");
    }

    #[test]
    fn combines_sorted_distinct_names() {
        assert_eq!(
            combine_names(["Strand", "Charing Cross Road", "Strand", ""]),
            "Charing Cross Rd-Strand"
        );
        assert_eq!(combine_names(["", "  "]), UNKNOWN_NAME);
        assert_eq!(combine_names(std::iter::empty()), UNKNOWN_NAME);
    }

    #[test]
    fn names_clusters_from_edges_at_either_endpoint() {
        let membership = BTreeMap::from([(1, 100), (2, 100), (3, 200), (4, 300)]);
        let edges = vec![
            edge(1, 3, Some(StreetName::One("Strand".to_string()))),
            edge(
                2,
                9,
                Some(StreetName::Many(vec![
                    "Whitehall".to_string(),
                    "Strand".to_string(),
                ])),
            ),
            edge(4, 9, None),
        ];

        let names = cluster_names(&edges, &membership);
        assert_eq!(names[&100], "Strand-Whitehall");
        assert_eq!(names[&200], "Strand");
        assert_eq!(names[&300], UNKNOWN_NAME);
    }

    #[test]
    fn disambiguates_every_cluster_sharing_a_name() {
        let names = BTreeMap::from([
            (7, "High St".to_string()),
            (3, "High St".to_string()),
            (5, "Strand".to_string()),
            (9, "High St".to_string()),
        ]);

        let out = disambiguate(names);
        assert_eq!(out[&3], "High St-1");
        assert_eq!(out[&7], "High St-2");
        assert_eq!(out[&9], "High St-3");
        assert_eq!(out[&5], "Strand");
    }
}
