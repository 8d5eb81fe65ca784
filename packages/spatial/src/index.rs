//! R-tree index over junction nodes.
//!
//! Junctions are stored as points on the unit sphere. Straight-line (chord)
//! distance between unit vectors grows monotonically with great-circle
//! distance, so the R-tree's Euclidean nearest neighbour is also the nearest
//! junction on the Earth's surface. The reported distance is then computed
//! with the haversine formula in meters.

use geo::{Distance as _, Haversine, Point};
use junction_danger_network_models::JunctionTable;
use rstar::RTree;
use rstar::primitives::GeomWithData;
use serde::{Deserialize, Serialize};

use crate::SpatialError;

/// A junction position on the unit sphere tagged with its row index.
type JunctionPoint = GeomWithData<[f64; 3], usize>;

/// Result of a nearest-junction query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NearestJunction {
    /// Row index in the junction table.
    pub junction_index: usize,
    /// Network node ID.
    pub junction_id: i64,
    /// Great-circle distance in meters.
    pub distance: f64,
}

#[derive(Debug, Clone, Copy)]
struct Junction {
    junction_index: usize,
    junction_id: i64,
    latitude: f64,
    longitude: f64,
}

/// Spatial index over the nodes of a junction table.
pub struct JunctionIndex {
    tree: RTree<JunctionPoint>,
    junctions: Vec<Junction>,
}

impl JunctionIndex {
    /// Builds the index from the node coordinates of `table`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::InvalidCoordinate`] if a junction's
    /// coordinate is not finite or outside the WGS84 range.
    pub fn build(table: &JunctionTable) -> Result<Self, SpatialError> {
        let mut points = Vec::with_capacity(table.len());
        let mut junctions = Vec::with_capacity(table.len());

        for (position, row) in table.rows.iter().enumerate() {
            let (latitude, longitude) = (row.latitude_junction, row.longitude_junction);
            if !is_valid_coordinate(latitude, longitude) {
                return Err(SpatialError::InvalidCoordinate {
                    junction_index: row.junction_index,
                    latitude,
                    longitude,
                });
            }
            points.push(GeomWithData::new(to_unit_vector(latitude, longitude), position));
            junctions.push(Junction {
                junction_index: row.junction_index,
                junction_id: row.junction_id,
                latitude,
                longitude,
            });
        }

        let tree = RTree::bulk_load(points);
        log::info!("Built junction index with {} nodes", tree.size());

        Ok(Self { tree, junctions })
    }

    /// Number of indexed junctions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Returns `true` if no junctions are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Finds the junction nearest to a coordinate.
    ///
    /// Junctions at exactly the same distance resolve to the one listed
    /// first in the table. Returns `None` for an empty index or an invalid
    /// coordinate.
    #[must_use]
    pub fn nearest(&self, latitude: f64, longitude: f64) -> Option<NearestJunction> {
        if !is_valid_coordinate(latitude, longitude) {
            return None;
        }

        let query = to_unit_vector(latitude, longitude);
        let mut candidates = self.tree.nearest_neighbor_iter_with_distance_2(&query);
        let (first, best_distance_2) = candidates.next()?;

        #[allow(clippy::float_cmp)]
        let position = candidates
            .take_while(|(_, distance_2)| *distance_2 == best_distance_2)
            .map(|(point, _)| point.data)
            .fold(first.data, usize::min);

        let junction = self.junctions.get(position)?;
        let distance = Haversine.distance(
            Point::new(longitude, latitude),
            Point::new(junction.longitude, junction.latitude),
        );

        Some(NearestJunction {
            junction_index: junction.junction_index,
            junction_id: junction.junction_id,
            distance,
        })
    }
}

pub(crate) fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

fn to_unit_vector(latitude: f64, longitude: f64) -> [f64; 3] {
    let (lat, lon) = (latitude.to_radians(), longitude.to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

#[cfg(test)]
mod tests {
    use junction_danger_network_models::JunctionRow;

    use super::*;

    fn row(index: usize, id: i64, latitude: f64, longitude: f64) -> JunctionRow {
        JunctionRow {
            junction_index: index,
            junction_id: id,
            latitude_junction: latitude,
            longitude_junction: longitude,
            junction_cluster_id: id,
            latitude_cluster: latitude,
            longitude_cluster: longitude,
            junction_cluster_name: format!("J{id}"),
        }
    }

    #[test]
    fn finds_nearest_by_great_circle_distance() {
        let table = JunctionTable {
            rows: vec![
                row(0, 100, 51.5000, -0.1200),
                row(1, 200, 51.5100, -0.1200),
                row(2, 300, 51.5000, -0.1000),
            ],
        };
        let index = JunctionIndex::build(&table).unwrap();

        let nearest = index.nearest(51.5001, -0.1200).unwrap();
        assert_eq!(nearest.junction_index, 0);
        assert_eq!(nearest.junction_id, 100);
        // 0.0001 degrees of latitude is about 11.1 m
        assert!((nearest.distance - 11.12).abs() < 0.1);
    }

    #[test]
    fn longitude_degrees_are_shorter_than_latitude_degrees() {
        // At London's latitude a degree of longitude is ~0.62 of a degree of
        // latitude, so planar distance on raw degrees would pick junction 0.
        let table = JunctionTable {
            rows: vec![
                row(0, 1, 51.5008, -0.1200),
                row(1, 2, 51.5000, -0.1189),
            ],
        };
        let index = JunctionIndex::build(&table).unwrap();

        let nearest = index.nearest(51.5000, -0.1200).unwrap();
        assert_eq!(nearest.junction_index, 1);
    }

    #[test]
    fn identical_coordinates_resolve_to_lowest_index() {
        let table = JunctionTable {
            rows: vec![
                row(0, 10, 51.5100, -0.1300),
                row(1, 20, 51.5000, -0.1200),
                row(2, 30, 51.5000, -0.1200),
            ],
        };
        let index = JunctionIndex::build(&table).unwrap();

        let nearest = index.nearest(51.5000, -0.1201).unwrap();
        assert_eq!(nearest.junction_index, 1);
        assert_eq!(nearest.junction_id, 20);
    }

    #[test]
    fn empty_index_matches_nothing() {
        let index = JunctionIndex::build(&JunctionTable::default()).unwrap();
        assert!(index.is_empty());
        assert!(index.nearest(51.5, -0.12).is_none());
    }

    #[test]
    fn invalid_junction_coordinate_is_rejected() {
        let table = JunctionTable {
            rows: vec![row(0, 1, f64::NAN, -0.12)],
        };
        assert!(matches!(
            JunctionIndex::build(&table),
            Err(SpatialError::InvalidCoordinate {
                junction_index: 0,
                ..
            })
        ));
    }

    #[test]
    fn invalid_query_coordinate_matches_nothing() {
        let table = JunctionTable {
            rows: vec![row(0, 1, 51.5, -0.12)],
        };
        let index = JunctionIndex::build(&table).unwrap();
        assert!(index.nearest(95.0, -0.12).is_none());
    }
}
