//! Loading the raw and consolidated graphs from JSON exports.
//!
//! Expected shapes:
//!
//! ```json
//! { "nodes": [{"id": 1, "lat": 51.5, "lon": -0.12}],
//!   "edges": [{"u": 1, "v": 2, "name": "Strand"}] }
//!
//! { "nodes": [{"id": 0, "osmid_original": "[1, 2]"}] }
//! ```

use std::io::{BufReader, Read};
use std::path::Path;

use junction_danger_network_models::{ConsolidatedGraph, RawGraph};
use serde::de::DeserializeOwned;

use crate::NetworkError;

/// Reads the raw street network.
///
/// # Errors
///
/// Returns [`NetworkError::SourceUnavailable`] if the file cannot be opened,
/// [`NetworkError::SchemaViolation`] if the JSON does not have the expected
/// shape, or [`NetworkError::EmptyGraph`] if it has no nodes.
pub fn load_raw_graph(path: &Path) -> Result<RawGraph, NetworkError> {
    let graph: RawGraph = load_json(path)?;
    if graph.nodes.is_empty() {
        return Err(NetworkError::EmptyGraph);
    }
    log::info!(
        "Loaded raw graph: {} nodes, {} edges",
        graph.nodes.len(),
        graph.edges.len()
    );
    Ok(graph)
}

/// Reads the consolidated graph.
///
/// # Errors
///
/// Returns [`NetworkError::SourceUnavailable`] if the file cannot be opened
/// or [`NetworkError::SchemaViolation`] if the JSON does not have the
/// expected shape.
pub fn load_consolidated_graph(path: &Path) -> Result<ConsolidatedGraph, NetworkError> {
    let graph: ConsolidatedGraph = load_json(path)?;
    log::info!("Loaded consolidated graph: {} clusters", graph.nodes.len());
    Ok(graph)
}

/// Parses a graph from any JSON `Read` source.
///
/// # Errors
///
/// Returns [`NetworkError::SchemaViolation`] for well-formed JSON of the
/// wrong shape and [`NetworkError::Json`] for malformed JSON.
pub fn parse_graph<T: DeserializeOwned>(reader: impl Read) -> Result<T, NetworkError> {
    serde_json::from_reader(BufReader::new(reader)).map_err(|e| {
        if e.is_data() {
            NetworkError::SchemaViolation {
                message: e.to_string(),
            }
        } else {
            NetworkError::Json(e)
        }
    })
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, NetworkError> {
    let file = std::fs::File::open(path).map_err(|e| {
        log::error!("Cannot open {}: {e}", path.display());
        NetworkError::SourceUnavailable {
            path: path.to_path_buf(),
        }
    })?;
    parse_graph(file)
}

#[cfg(test)]
mod tests {
    use junction_danger_network_models::StreetName;

    use super::*;

    #[test]
    fn parses_raw_graph_with_mixed_edge_names() {
        let json = r#"{
            "nodes": [
                {"id": 1, "lat": 51.5, "lon": -0.12},
                {"id": 2, "latitude": 51.6, "longitude": -0.13}
            ],
            "edges": [
                {"u": 1, "v": 2, "name": "Strand"},
                {"u": 2, "v": 1, "name": ["Strand", "Whitehall"]},
                {"u": 2, "v": 2}
            ]
        }"#;

        let graph: RawGraph = parse_graph(json.as_bytes()).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges[0].name, Some(StreetName::One("Strand".to_string())));
        assert_eq!(graph.edges[1].name.as_ref().map(|n| n.as_slice().len()), Some(2));
        assert_eq!(graph.edges[2].name, None);
    }

    #[test]
    fn wrong_shape_is_schema_violation() {
        let err = parse_graph::<RawGraph>(r#"{"nodes": [{"id": "x"}]}"#.as_bytes()).unwrap_err();
        assert!(matches!(err, NetworkError::SchemaViolation { .. }));
    }

    #[test]
    fn truncated_json_is_json_error() {
        let err = parse_graph::<RawGraph>(r#"{"nodes": ["#.as_bytes()).unwrap_err();
        assert!(matches!(err, NetworkError::Json(_)));
    }

    #[test]
    fn missing_file_is_source_unavailable() {
        let err = load_raw_graph(Path::new("/nonexistent/graph.json")).unwrap_err();
        assert!(matches!(err, NetworkError::SourceUnavailable { .. }));
    }

    #[test]
    fn empty_raw_graph_is_rejected() {
        let dir = std::env::temp_dir().join("junction_danger_network_empty_graph");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("raw.json");
        std::fs::write(&path, r#"{"nodes": [], "edges": []}"#).unwrap();

        let err = load_raw_graph(&path).unwrap_err();
        assert!(matches!(err, NetworkError::EmptyGraph));
    }
}
