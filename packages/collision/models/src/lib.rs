#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Collision, casualty, and severity types.
//!
//! These are the records that flow from the collision feed through
//! normalization and junction matching. Everything downstream (scoring,
//! ranking) reads them but never mutates them.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Casualty severity, ordered from least to most severe.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Severity {
    /// Minor injury not requiring hospital treatment
    Slight,
    /// Hospitalisation or lasting injury
    Serious,
    /// Died within 30 days of the collision
    Fatal,
}

/// Road-user category that a danger ranking is computed for.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CasualtyType {
    /// Pedal cyclists
    Cyclist,
    /// People on foot
    Pedestrian,
}

impl CasualtyType {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Cyclist, Self::Pedestrian]
    }
}

/// Mode of travel recorded against a casualty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    /// Pedal cycle rider or passenger
    Cyclist,
    /// Pedestrian
    Pedestrian,
    /// Any other road user (car occupant, motorcyclist, bus passenger...)
    Other,
}

impl TravelMode {
    /// Maps a cleaned travel-mode label from the feed to a [`TravelMode`].
    ///
    /// Accepts the labels used by both the `TfL` and `DfT` feeds
    /// (`pedal_cycle`, `cyclist`, `pedestrian`). Anything else is
    /// [`TravelMode::Other`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().replace(' ', "_").as_str() {
            "pedal_cycle" | "pedal_cyclist" | "cyclist" => Self::Cyclist,
            "pedestrian" => Self::Pedestrian,
            _ => Self::Other,
        }
    }

    /// Returns the casualty type this mode counts towards, if any.
    #[must_use]
    pub const fn casualty_type(self) -> Option<CasualtyType> {
        match self {
            Self::Cyclist => Some(CasualtyType::Cyclist),
            Self::Pedestrian => Some(CasualtyType::Pedestrian),
            Self::Other => None,
        }
    }
}

/// Number of casualties at each severity level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    /// Fatal casualties.
    pub fatal: u32,
    /// Serious casualties.
    pub serious: u32,
    /// Slight casualties.
    pub slight: u32,
}

impl SeverityCounts {
    /// Records one casualty of the given severity.
    pub const fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Fatal => self.fatal += 1,
            Severity::Serious => self.serious += 1,
            Severity::Slight => self.slight += 1,
        }
    }

    /// Total casualties across all severities.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.fatal + self.serious + self.slight
    }

    /// Returns `true` if no casualties were recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// The highest severity with at least one casualty (fatal > serious >
    /// slight), or `None` if there are no casualties.
    #[must_use]
    pub const fn max_severity(&self) -> Option<Severity> {
        if self.fatal > 0 {
            Some(Severity::Fatal)
        } else if self.serious > 0 {
            Some(Severity::Serious)
        } else if self.slight > 0 {
            Some(Severity::Slight)
        } else {
            None
        }
    }

    /// Sum-over-casualties score `5 * fatal + 3 * serious + slight`.
    ///
    /// Reported next to the ranking metric for comparison and never used to
    /// rank; a multi-casualty collision scores higher here than under the
    /// worst-severity rule.
    #[must_use]
    pub fn linear_danger_metric(&self) -> f64 {
        5.0f64.mul_add(
            f64::from(self.fatal),
            3.0f64.mul_add(f64::from(self.serious), f64::from(self.slight)),
        )
    }
}

impl std::ops::AddAssign for SeverityCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.fatal += rhs.fatal;
        self.serious += rhs.serious;
        self.slight += rhs.slight;
    }
}

/// A collision row as read from the feed, before any cleaning.
///
/// Every field except the raw ID may be missing; the normalizer decides
/// which gaps are fatal to the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCollision {
    /// Identifier assigned by the feed publisher.
    pub raw_collision_id: String,
    /// Date of the collision.
    pub date: Option<NaiveDate>,
    /// Time of day as published (`07:31` or `'0731`).
    pub time: Option<String>,
    /// Free-text location description.
    pub location: Option<String>,
    /// Latitude (WGS84).
    pub latitude: Option<f64>,
    /// Longitude (WGS84).
    pub longitude: Option<f64>,
    /// Borough (local authority district) name.
    pub borough: Option<String>,
    /// ONS local authority code (e.g. `E09000001`), when published.
    pub authority_code: Option<String>,
    /// Junction-type classification (e.g. `crossroads`, `roundabout`).
    pub junction_detail: Option<String>,
}

/// A casualty row as read from the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCasualty {
    /// Raw ID of the collision this casualty belongs to.
    pub raw_collision_id: String,
    /// Travel-mode label (e.g. `pedal_cycle`).
    pub mode_of_travel: Option<String>,
    /// Severity label (`fatal`, `serious`, `slight`).
    pub casualty_severity: Option<String>,
}

/// A collision after cleaning, ID canonicalisation, and casualty
/// recalculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCollision {
    /// Canonical collision ID.
    pub collision_id: String,
    /// Identifier assigned by the feed publisher.
    pub raw_collision_id: String,
    /// Date of the collision.
    pub date: NaiveDate,
    /// Calendar year of [`Self::date`].
    pub year: i32,
    /// Time of day (`HH:MM`).
    pub time: Option<String>,
    /// Upper-cased location description.
    pub location: Option<String>,
    /// Latitude (WGS84).
    pub latitude: Option<f64>,
    /// Longitude (WGS84).
    pub longitude: Option<f64>,
    /// Upper-cased borough name.
    pub borough: String,
    /// Cleaned junction-type classification.
    pub junction_detail: String,
    /// Casualty counts per casualty type of interest. Types with no
    /// casualties are absent.
    pub casualties: BTreeMap<CasualtyType, SeverityCounts>,
    /// Recency multiplier derived from [`Self::year`].
    pub recency_weight: f64,
}

impl NormalizedCollision {
    /// Casualty counts for one casualty type (all zero if none).
    #[must_use]
    pub fn casualty_counts(&self, casualty_type: CasualtyType) -> SeverityCounts {
        self.casualties
            .get(&casualty_type)
            .copied()
            .unwrap_or_default()
    }

    /// Worst severity among casualties of `casualty_type`.
    #[must_use]
    pub fn max_severity(&self, casualty_type: CasualtyType) -> Option<Severity> {
        self.casualty_counts(casualty_type).max_severity()
    }

    /// Returns both coordinates when the collision is geolocated.
    #[must_use]
    pub const fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// A collision assigned to its nearest junction node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedCollision {
    /// The normalized collision.
    pub collision: NormalizedCollision,
    /// Row index of the nearest junction in the junction table.
    pub junction_index: usize,
    /// Network ID of the nearest junction node.
    pub junction_id: i64,
    /// Great-circle distance to the junction, in meters.
    pub distance_to_junction: f64,
}
