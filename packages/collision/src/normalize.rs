//! Collision normalization.
//!
//! Turns raw collision and casualty rows into [`NormalizedCollision`]s:
//! junction-related collisions only, with at least one casualty of a travel
//! mode of interest, canonical IDs, per-mode severity counts, and a recency
//! weight relative to the oldest kept year.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr as _;

use chrono::Datelike as _;
use junction_danger_collision_models::{
    CasualtyType, NormalizedCollision, RawCasualty, RawCollision, Severity, SeverityCounts,
    TravelMode,
};
use serde::{Deserialize, Serialize};

use crate::clean::{apply_alias, clean_upper, format_category, format_name, format_time};
use crate::collision_id::{canonical_collision_id, force_code};
use crate::recency::{DEFAULT_RECENCY_CONSTANT, recency_weight};

/// Junction classifications kept by default.
pub const DEFAULT_VALID_JUNCTION_TYPES: &[&str] = &[
    "t_or_staggered_junction",
    "crossroads",
    "roundabout",
    "mini_roundabout",
    "multiple_junction",
    "slip_road",
    "other_junction",
];

/// Options controlling which collisions survive normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Allow-list of junction classifications (any spelling; cleaned with
    /// [`format_name`] before comparison).
    pub valid_junction_types: Vec<String>,
    /// Casualty types whose casualties are counted.
    pub valid_casualty_types: Vec<CasualtyType>,
    /// Recency constant `C`.
    pub recency_constant: f64,
    /// Raw value to canonical value corrections, applied to borough and
    /// location text after upper-casing.
    pub value_aliases: BTreeMap<String, String>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            valid_junction_types: DEFAULT_VALID_JUNCTION_TYPES
                .iter()
                .map(ToString::to_string)
                .collect(),
            valid_casualty_types: CasualtyType::all().to_vec(),
            recency_constant: DEFAULT_RECENCY_CONSTANT,
            value_aliases: BTreeMap::new(),
        }
    }
}

/// Counts of rows excluded during normalization, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropReport {
    /// Collision rows read.
    pub rows_in: usize,
    /// Rows missing a date, borough, or junction classification.
    pub missing_required: usize,
    /// Rows whose junction classification is not allow-listed.
    pub junction_type: usize,
    /// Rows with no casualty of a travel mode of interest.
    pub no_relevant_casualty: usize,
    /// Rows whose raw ID or canonical ID was already taken.
    pub duplicate_id: usize,
    /// Casualty rows with a missing or unrecognised severity.
    pub invalid_casualties: usize,
}

impl DropReport {
    /// Total collision rows dropped.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.missing_required + self.junction_type + self.no_relevant_casualty + self.duplicate_id
    }
}

/// Output of [`normalize`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCollisions {
    /// Kept collisions, in feed order.
    pub collisions: Vec<NormalizedCollision>,
    /// Oldest year among kept collisions (`None` when nothing was kept).
    pub min_year: Option<i32>,
    /// Why rows were dropped.
    pub report: DropReport,
}

/// A raw collision that passed the required-field and junction-type checks.
struct Candidate<'a> {
    raw: &'a RawCollision,
    date: chrono::NaiveDate,
    borough: String,
    junction_detail: String,
    casualties: BTreeMap<CasualtyType, SeverityCounts>,
}

/// Normalizes the raw feeds.
///
/// Rows are dropped (and logged) rather than coerced when a required field
/// is missing, the junction classification is not allow-listed, no casualty
/// of a selected travel mode is recorded, or the raw or canonical ID
/// duplicates an earlier row. An empty input yields an empty output.
#[must_use]
pub fn normalize(
    raw_collisions: &[RawCollision],
    raw_casualties: &[RawCasualty],
    options: &NormalizeOptions,
) -> NormalizedCollisions {
    let mut report = DropReport {
        rows_in: raw_collisions.len(),
        ..DropReport::default()
    };

    let allowed_junctions: Vec<String> = options
        .valid_junction_types
        .iter()
        .map(|t| format_name(t))
        .collect();
    let allowed_modes: BTreeSet<CasualtyType> =
        options.valid_casualty_types.iter().copied().collect();

    let counts = count_casualties(raw_casualties, &allowed_modes, &mut report);

    let mut accepted_raw_ids = BTreeSet::new();
    let mut candidates = Vec::with_capacity(raw_collisions.len());
    for raw in raw_collisions {
        let (Some(date), Some(borough), Some(detail)) = (
            raw.date,
            clean_upper(raw.borough.as_deref()),
            raw.junction_detail.as_deref(),
        ) else {
            log::warn!(
                "Dropping collision {}: missing date, borough, or junction detail",
                raw.raw_collision_id
            );
            report.missing_required += 1;
            continue;
        };

        let junction_detail = classify_junction(detail, &allowed_junctions);
        if !allowed_junctions.contains(&junction_detail) {
            log::debug!(
                "Dropping collision {}: junction type '{junction_detail}' not allowed",
                raw.raw_collision_id
            );
            report.junction_type += 1;
            continue;
        }

        let raw_id = raw.raw_collision_id.trim();
        if accepted_raw_ids.contains(raw_id) {
            log::warn!("Dropping collision {raw_id}: raw ID already seen");
            report.duplicate_id += 1;
            continue;
        }

        let casualties = counts.get(raw_id).cloned().unwrap_or_default();
        if casualties.values().all(SeverityCounts::is_empty) {
            log::debug!(
                "Dropping collision {}: no casualty of a selected travel mode",
                raw.raw_collision_id
            );
            report.no_relevant_casualty += 1;
            continue;
        }

        accepted_raw_ids.insert(raw_id);
        candidates.push(Candidate {
            raw,
            date,
            borough: apply_alias(&borough, &options.value_aliases),
            junction_detail,
            casualties,
        });
    }

    let min_year = candidates.iter().map(|c| c.date.year()).min();
    let mut seen_ids = BTreeSet::new();
    let mut collisions = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let year = candidate.date.year();
        let force = force_code(
            candidate.raw.authority_code.as_deref(),
            &candidate.borough,
        );
        let collision_id = canonical_collision_id(year, force, &candidate.raw.raw_collision_id);

        if !seen_ids.insert(collision_id.clone()) {
            log::warn!(
                "Dropping collision {}: canonical ID {collision_id} already assigned",
                candidate.raw.raw_collision_id
            );
            report.duplicate_id += 1;
            continue;
        }

        let location = clean_upper(candidate.raw.location.as_deref())
            .map(|l| apply_alias(&l, &options.value_aliases));

        collisions.push(NormalizedCollision {
            collision_id,
            raw_collision_id: candidate.raw.raw_collision_id.trim().to_string(),
            date: candidate.date,
            year,
            time: candidate.raw.time.as_deref().map(format_time),
            location,
            latitude: candidate.raw.latitude,
            longitude: candidate.raw.longitude,
            borough: candidate.borough,
            junction_detail: candidate.junction_detail,
            casualties: candidate.casualties,
            recency_weight: min_year
                .map_or(0.0, |min| recency_weight(year, min, options.recency_constant)),
        });
    }

    log::info!(
        "Normalized {} of {} collisions ({} dropped, {} invalid casualty rows)",
        collisions.len(),
        report.rows_in,
        report.dropped(),
        report.invalid_casualties
    );

    NormalizedCollisions {
        collisions,
        min_year,
        report,
    }
}

/// Parses a casualty severity label (`fatal`, `Serious`, `killed`, ...).
#[must_use]
pub fn parse_severity(label: &str) -> Option<Severity> {
    let name = format_name(label);
    match name.as_str() {
        "killed" => Some(Severity::Fatal),
        "seriously_injured" => Some(Severity::Serious),
        "slightly_injured" => Some(Severity::Slight),
        _ => Severity::from_str(&name).ok(),
    }
}

/// Exact allow-list hits win over containment so that e.g. `mini_roundabout`
/// is not folded into `roundabout`.
fn classify_junction(detail: &str, allowed: &[String]) -> String {
    let formatted = format_name(detail);
    if allowed.contains(&formatted) {
        return formatted;
    }
    format_category(detail, allowed)
}

fn count_casualties(
    raw_casualties: &[RawCasualty],
    allowed_modes: &BTreeSet<CasualtyType>,
    report: &mut DropReport,
) -> BTreeMap<String, BTreeMap<CasualtyType, SeverityCounts>> {
    let mut counts: BTreeMap<String, BTreeMap<CasualtyType, SeverityCounts>> = BTreeMap::new();

    for casualty in raw_casualties {
        let Some(casualty_type) = casualty
            .mode_of_travel
            .as_deref()
            .map(TravelMode::from_label)
            .and_then(TravelMode::casualty_type)
            .filter(|t| allowed_modes.contains(t))
        else {
            continue;
        };

        let Some(severity) = casualty.casualty_severity.as_deref().and_then(parse_severity) else {
            log::warn!(
                "Skipping {casualty_type} casualty of collision {}: invalid severity {:?}",
                casualty.raw_collision_id,
                casualty.casualty_severity
            );
            report.invalid_casualties += 1;
            continue;
        };

        counts
            .entry(casualty.raw_collision_id.trim().to_string())
            .or_default()
            .entry(casualty_type)
            .or_default()
            .record(severity);
    }

    counts
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn collision(id: &str, year: i32, detail: &str) -> RawCollision {
        RawCollision {
            raw_collision_id: id.to_string(),
            date: NaiveDate::from_ymd_opt(year, 6, 1),
            time: Some("'0731".to_string()),
            location: Some("high st".to_string()),
            latitude: Some(51.5),
            longitude: Some(-0.12),
            borough: Some("camden".to_string()),
            authority_code: None,
            junction_detail: Some(detail.to_string()),
        }
    }

    fn casualty(id: &str, mode: &str, severity: &str) -> RawCasualty {
        RawCasualty {
            raw_collision_id: id.to_string(),
            mode_of_travel: Some(mode.to_string()),
            casualty_severity: Some(severity.to_string()),
        }
    }

    #[test]
    fn keeps_junction_collisions_with_relevant_casualties() {
        let collisions = vec![
            collision("0119TW0000001", 2019, "Crossroads"),
            collision("0119TW0000002", 2020, "Not at junction or within 20 metres"),
            collision("0119TW0000003", 2021, "Roundabout"),
        ];
        let casualties = vec![
            casualty("0119TW0000001", "pedal_cycle", "fatal"),
            casualty("0119TW0000001", "pedal_cycle", "slight"),
            casualty("0119TW0000001", "car_occupant", "serious"),
            casualty("0119TW0000002", "pedal_cycle", "slight"),
            casualty("0119TW0000003", "car_occupant", "slight"),
        ];

        let out = normalize(&collisions, &casualties, &NormalizeOptions::default());

        assert_eq!(out.collisions.len(), 1);
        assert_eq!(out.report.junction_type, 1);
        assert_eq!(out.report.no_relevant_casualty, 1);
        assert_eq!(out.report.dropped(), 2);

        let kept = &out.collisions[0];
        assert_eq!(kept.collision_id, "201901TW0000001");
        assert_eq!(kept.borough, "CAMDEN");
        assert_eq!(kept.location.as_deref(), Some("HIGH ST"));
        assert_eq!(kept.time.as_deref(), Some("07:31"));
        assert_eq!(kept.junction_detail, "crossroads");

        let cyclist = kept.casualty_counts(CasualtyType::Cyclist);
        assert_eq!(cyclist.fatal, 1);
        assert_eq!(cyclist.slight, 1);
        assert_eq!(cyclist.serious, 0);
        assert_eq!(kept.max_severity(CasualtyType::Cyclist), Some(Severity::Fatal));
        assert_eq!(kept.max_severity(CasualtyType::Pedestrian), None);
    }

    #[test]
    fn drops_rows_missing_required_fields() {
        let mut no_date = collision("A1", 2019, "Crossroads");
        no_date.date = None;
        let mut no_borough = collision("A2", 2019, "Crossroads");
        no_borough.borough = Some("  ".to_string());
        let casualties = vec![
            casualty("A1", "pedestrian", "slight"),
            casualty("A2", "pedestrian", "slight"),
        ];

        let out = normalize(&[no_date, no_borough], &casualties, &NormalizeOptions::default());
        assert!(out.collisions.is_empty());
        assert_eq!(out.report.missing_required, 2);
        assert_eq!(out.min_year, None);
    }

    #[test]
    fn restricts_counts_to_selected_modes() {
        let collisions = vec![collision("B1", 2020, "Crossroads")];
        let casualties = vec![
            casualty("B1", "pedal_cycle", "serious"),
            casualty("B1", "pedestrian", "fatal"),
        ];
        let options = NormalizeOptions {
            valid_casualty_types: vec![CasualtyType::Cyclist],
            ..NormalizeOptions::default()
        };

        let out = normalize(&collisions, &casualties, &options);
        let kept = &out.collisions[0];
        assert_eq!(kept.max_severity(CasualtyType::Cyclist), Some(Severity::Serious));
        assert!(!kept.casualties.contains_key(&CasualtyType::Pedestrian));
    }

    #[test]
    fn invalid_severity_is_skipped_not_coerced() {
        let collisions = vec![collision("C1", 2020, "Crossroads")];
        let casualties = vec![
            casualty("C1", "pedestrian", "unknown"),
            casualty("C1", "pedestrian", "Serious"),
        ];

        let out = normalize(&collisions, &casualties, &NormalizeOptions::default());
        assert_eq!(out.report.invalid_casualties, 1);
        let counts = out.collisions[0].casualty_counts(CasualtyType::Pedestrian);
        assert_eq!(counts.total(), 1);
        assert_eq!(counts.serious, 1);
    }

    #[test]
    fn recency_weight_is_relative_to_oldest_kept_year() {
        let collisions = vec![
            collision("D1", 2021, "Crossroads"),
            collision("D2", 2018, "Crossroads"),
            collision("D3", 2015, "Private drive"),
        ];
        let casualties = vec![
            casualty("D1", "pedestrian", "slight"),
            casualty("D2", "pedestrian", "slight"),
            casualty("D3", "pedestrian", "slight"),
        ];

        let out = normalize(&collisions, &casualties, &NormalizeOptions::default());
        assert_eq!(out.min_year, Some(2018));
        let weights: Vec<f64> = out.collisions.iter().map(|c| c.recency_weight).collect();
        assert!((weights[1] - 2.0f64.log10()).abs() < 1e-12);
        assert!((weights[0] - 5.0f64.log10()).abs() < 1e-12);
    }

    #[test]
    fn duplicate_canonical_ids_keep_the_first_row() {
        let collisions = vec![
            collision("XX0000000001", 2020, "Crossroads"),
            collision("YY0000000001", 2020, "Crossroads"),
        ];
        let casualties = vec![
            casualty("XX0000000001", "pedestrian", "slight"),
            casualty("YY0000000001", "pedestrian", "fatal"),
        ];

        let out = normalize(&collisions, &casualties, &NormalizeOptions::default());
        assert_eq!(out.collisions.len(), 1);
        assert_eq!(out.collisions[0].raw_collision_id, "XX0000000001");
        assert_eq!(out.report.duplicate_id, 1);
    }

    #[test]
    fn repeated_raw_id_counts_as_duplicate() {
        let collisions = vec![
            collision("F1", 2020, "Crossroads"),
            collision("F1", 2021, "Crossroads"),
        ];
        let casualties = vec![casualty("F1", "pedestrian", "serious")];

        let out = normalize(&collisions, &casualties, &NormalizeOptions::default());
        assert_eq!(out.collisions.len(), 1);
        assert_eq!(out.collisions[0].year, 2020);
        assert_eq!(out.report.duplicate_id, 1);
        assert_eq!(out.report.no_relevant_casualty, 0);
    }

    #[test]
    fn city_of_london_gets_its_own_force_code() {
        let mut raw = collision("E1", 2022, "Crossroads");
        raw.borough = Some("City of London".to_string());
        let casualties = vec![casualty("E1", "pedestrian", "slight")];

        let out = normalize(&[raw], &casualties, &NormalizeOptions::default());
        assert_eq!(out.collisions[0].collision_id, "2022480000000E1");
    }

    #[test]
    fn aliases_apply_to_upper_cased_borough() {
        let mut raw = collision("F1", 2022, "Crossroads");
        raw.borough = Some("richmond upon thames".to_string());
        let options = NormalizeOptions {
            value_aliases: BTreeMap::from([(
                "RICHMOND UPON THAMES".to_string(),
                "RICHMOND-UPON-THAMES".to_string(),
            )]),
            ..NormalizeOptions::default()
        };
        let casualties = vec![casualty("F1", "pedal_cycle", "slight")];

        let out = normalize(&[raw], &casualties, &options);
        assert_eq!(out.collisions[0].borough, "RICHMOND-UPON-THAMES");
    }

    #[test]
    fn mini_roundabout_is_not_folded_into_roundabout() {
        let raw = collision("G1", 2022, "Mini Roundabout");
        let options = NormalizeOptions {
            valid_junction_types: vec!["roundabout".to_string(), "mini_roundabout".to_string()],
            ..NormalizeOptions::default()
        };
        let casualties = vec![casualty("G1", "pedestrian", "slight")];

        let out = normalize(&[raw], &casualties, &options);
        assert_eq!(out.collisions[0].junction_detail, "mini_roundabout");
    }

    #[test]
    fn empty_input_is_empty_output() {
        let out = normalize(&[], &[], &NormalizeOptions::default());
        assert!(out.collisions.is_empty());
        assert_eq!(out.report, DropReport::default());
    }

    #[test]
    fn parses_alternative_severity_labels() {
        assert_eq!(parse_severity("Killed"), Some(Severity::Fatal));
        assert_eq!(parse_severity(" SLIGHT "), Some(Severity::Slight));
        assert_eq!(parse_severity("n/a"), None);
    }
}
