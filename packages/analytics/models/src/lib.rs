#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Danger scoring and ranking types.
//!
//! A matched collision is scored for one casualty type by the weight of its
//! worst casualty, scaled by its recency weight. Scores are summed per
//! junction cluster and the clusters ranked, each with a yearly series of
//! its unweighted danger metric.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use junction_danger_collision_models::{CasualtyType, Severity, SeverityCounts};
use serde::{Deserialize, Serialize};

/// Default weight of a collision whose worst casualty was killed.
pub const DEFAULT_WEIGHT_FATAL: f64 = 6.8;
/// Default weight of a collision whose worst casualty was seriously injured.
pub const DEFAULT_WEIGHT_SERIOUS: f64 = 1.0;
/// Default weight of a collision whose worst casualty was slightly injured.
pub const DEFAULT_WEIGHT_SLIGHT: f64 = 0.06;

/// Danger weight per worst-casualty severity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityWeights {
    /// Weight for a fatal worst casualty.
    pub fatal: f64,
    /// Weight for a serious worst casualty.
    pub serious: f64,
    /// Weight for a slight worst casualty.
    pub slight: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            fatal: DEFAULT_WEIGHT_FATAL,
            serious: DEFAULT_WEIGHT_SERIOUS,
            slight: DEFAULT_WEIGHT_SLIGHT,
        }
    }
}

impl SeverityWeights {
    /// Weight for `severity`.
    #[must_use]
    pub const fn weight(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Fatal => self.fatal,
            Severity::Serious => self.serious,
            Severity::Slight => self.slight,
        }
    }
}

/// Which collisions a ranking is computed over.
///
/// Stateless: every ranking call takes the whole filter explicitly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RankingFilter {
    /// Road-user category to score.
    pub casualty_type: CasualtyType,
    /// Upper-cased boroughs to keep; `None` keeps every borough and an
    /// empty set keeps none.
    pub boroughs: Option<BTreeSet<String>>,
    /// First year kept (inclusive).
    pub min_year: Option<i32>,
    /// Last year kept (inclusive).
    pub max_year: Option<i32>,
}

impl RankingFilter {
    /// A filter keeping every collision with a casualty of `casualty_type`.
    #[must_use]
    pub const fn new(casualty_type: CasualtyType) -> Self {
        Self {
            casualty_type,
            boroughs: None,
            min_year: None,
            max_year: None,
        }
    }

    /// Restricts the filter to `boroughs` (matched case-insensitively).
    #[must_use]
    pub fn with_boroughs<I, S>(mut self, boroughs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.boroughs = Some(
            boroughs
                .into_iter()
                .map(|b| b.as_ref().trim().to_uppercase())
                .collect(),
        );
        self
    }

    /// Restricts the filter to years `min_year..=max_year`.
    #[must_use]
    pub const fn with_years(mut self, min_year: Option<i32>, max_year: Option<i32>) -> Self {
        self.min_year = min_year;
        self.max_year = max_year;
        self
    }

    /// Returns `true` if the filter can match nothing at all (empty borough
    /// selection or an inverted year range).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        if let (Some(min), Some(max)) = (self.min_year, self.max_year)
            && min > max
        {
            return true;
        }
        self.boroughs.as_ref().is_some_and(BTreeSet::is_empty)
    }

    /// Returns `true` if a collision in `borough` during `year` passes the
    /// borough and year restrictions.
    #[must_use]
    pub fn matches(&self, borough: &str, year: i32) -> bool {
        if self.min_year.is_some_and(|min| year < min) || self.max_year.is_some_and(|max| year > max)
        {
            return false;
        }
        self.boroughs
            .as_ref()
            .is_none_or(|boroughs| boroughs.contains(borough))
    }
}

/// A matched collision scored for one casualty type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCollision {
    /// Canonical collision ID.
    pub collision_id: String,
    /// Date of the collision.
    pub date: NaiveDate,
    /// Calendar year of the collision.
    pub year: i32,
    /// Upper-cased borough.
    pub borough: String,
    /// Collision latitude.
    pub latitude: f64,
    /// Collision longitude.
    pub longitude: f64,
    /// Row index of the nearest junction node.
    pub junction_index: usize,
    /// Network ID of the nearest junction node.
    pub junction_id: i64,
    /// Great-circle distance to that node, in meters.
    pub distance_to_junction: f64,
    /// Parent cluster of the junction node.
    pub junction_cluster_id: i64,
    /// Display name of the cluster.
    pub junction_cluster_name: String,
    /// Cluster latitude.
    pub latitude_cluster: f64,
    /// Cluster longitude.
    pub longitude_cluster: f64,
    /// Casualty type the collision was scored for.
    pub casualty_type: CasualtyType,
    /// Casualties of that type by severity.
    pub counts: SeverityCounts,
    /// Worst severity among those casualties.
    pub max_severity: Severity,
    /// Weight of the worst severity.
    pub danger_metric: f64,
    /// Recency multiplier of the collision year.
    pub recency_weight: f64,
    /// `danger_metric * recency_weight`.
    pub recency_danger_metric: f64,
}

/// Scores summed over the collisions of one junction cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JunctionAggregate {
    /// Cluster ID.
    pub junction_cluster_id: i64,
    /// Cluster display name.
    pub junction_cluster_name: String,
    /// Cluster latitude.
    pub latitude_cluster: f64,
    /// Cluster longitude.
    pub longitude_cluster: f64,
    /// Summed recency-weighted danger metric (the ranking signal).
    pub recency_danger_metric: f64,
    /// Summed unweighted danger metric.
    pub danger_metric: f64,
    /// Summed casualty counts.
    pub counts: SeverityCounts,
    /// Number of scored collisions.
    pub collision_count: usize,
    /// Summed unweighted danger metric per year with collisions.
    pub yearly: BTreeMap<i32, f64>,
}

/// One point of a cluster's yearly danger series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearlyDangerMetric {
    /// Calendar year.
    pub year: i32,
    /// Summed unweighted danger metric (0 when no collisions).
    pub danger_metric: f64,
    /// Trailing 3-year mean, once three years are available.
    pub rolling_mean: Option<f64>,
}

/// A ranked junction cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DangerousJunction {
    /// 1-based rank, 1 being the most dangerous.
    pub junction_rank: usize,
    /// Cluster ID.
    pub junction_cluster_id: i64,
    /// Cluster display name.
    pub junction_cluster_name: String,
    /// Cluster latitude.
    pub latitude_cluster: f64,
    /// Cluster longitude.
    pub longitude_cluster: f64,
    /// Summed recency-weighted danger metric.
    pub recency_danger_metric: f64,
    /// Summed casualty counts.
    pub counts: SeverityCounts,
    /// Number of scored collisions.
    pub collision_count: usize,
    /// One entry per year of the ranking's year span.
    pub yearly_danger_metrics: Vec<YearlyDangerMetric>,
    /// Least-squares slope of the yearly series (positive = worsening).
    pub danger_metric_trajectory: Option<f64>,
}

/// Output of a ranking run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DangerousJunctions {
    /// Ranked clusters, rank 1 first.
    pub junctions: Vec<DangerousJunction>,
    /// Years covered by every yearly series, ascending.
    pub years: Vec<i32>,
}

impl DangerousJunctions {
    /// Returns `true` if no cluster was ranked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.junctions.is_empty()
    }
}
