#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Nearest-junction matching for collisions.
//!
//! Builds an R-tree over the junction table and assigns every geolocated
//! collision to its nearest junction node by great-circle distance.
//! Collisions further than the distance threshold from every junction are
//! treated as "not at a junction" and excluded.

pub mod index;
pub mod matcher;
pub mod progress;

pub use index::{JunctionIndex, NearestJunction};
pub use matcher::{MatchOutcome, MatchReport, match_collisions};

/// Errors that can occur while building the junction index.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// A junction row has a coordinate that is not a valid WGS84 position.
    #[error("Junction {junction_index} has invalid coordinate ({latitude}, {longitude})")]
    InvalidCoordinate {
        /// Row index of the junction.
        junction_index: usize,
        /// Latitude as found.
        latitude: f64,
        /// Longitude as found.
        longitude: f64,
    },
}
