//! Dataset fingerprints for ranking cache keys.

use junction_danger_collision_models::MatchedCollision;
use junction_danger_network_models::JunctionTable;
use sha2::{Digest, Sha256};

use crate::PipelineError;

/// SHA-256 over the junction table and matched collisions a ranking reads.
///
/// Any change to either input changes the fingerprint.
///
/// # Errors
///
/// Returns [`PipelineError::Json`] if the inputs cannot be serialized.
pub fn dataset_fingerprint(
    junctions: &JunctionTable,
    matched: &[MatchedCollision],
) -> Result<String, PipelineError> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(junctions)?);
    hasher.update(serde_json::to_vec(matched)?);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use junction_danger_network_models::JunctionRow;

    use super::*;

    fn table(name: &str) -> JunctionTable {
        JunctionTable {
            rows: vec![JunctionRow {
                junction_index: 0,
                junction_id: 1,
                latitude_junction: 51.5,
                longitude_junction: -0.12,
                junction_cluster_id: 1,
                latitude_cluster: 51.5,
                longitude_cluster: -0.12,
                junction_cluster_name: name.to_string(),
            }],
        }
    }

    #[test]
    fn fingerprint_tracks_input_changes() {
        let a = dataset_fingerprint(&table("Strand"), &[]).unwrap();
        let b = dataset_fingerprint(&table("Strand"), &[]).unwrap();
        let c = dataset_fingerprint(&table("Aldwych"), &[]).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
