//! CSV readers for the collision and casualty feeds.
//!
//! The feeds are read into [`RawCollision`] and [`RawCasualty`] records
//! with every value kept optional. Missing required columns are a schema
//! violation and abort the read; malformed individual rows are logged and
//! skipped.

use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use junction_danger_collision_models::{RawCasualty, RawCollision};
use serde::Deserialize;

use crate::CollisionError;

/// Columns that must be present in the collision feed.
pub const REQUIRED_COLLISION_COLUMNS: &[&str] = &[
    "raw_collision_id",
    "date",
    "latitude",
    "longitude",
    "borough",
    "junction_detail",
];

/// Columns that must be present in the casualty feed.
pub const REQUIRED_CASUALTY_COLUMNS: &[&str] =
    &["raw_collision_id", "mode_of_travel", "casualty_severity"];

#[derive(Debug, Deserialize)]
struct CollisionRecord {
    raw_collision_id: Option<String>,
    date: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    location: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
    borough: Option<String>,
    #[serde(default)]
    authority_code: Option<String>,
    junction_detail: Option<String>,
}

impl CollisionRecord {
    fn into_raw(self) -> Option<RawCollision> {
        let raw_collision_id = non_empty(self.raw_collision_id)?;

        let date = non_empty(self.date).and_then(|d| {
            let parsed = parse_feed_date(&d);
            if parsed.is_none() {
                log::warn!("Collision {raw_collision_id}: unparseable date '{d}'");
            }
            parsed
        });

        let coords = parse_lat_lng_str(self.latitude.as_ref(), self.longitude.as_ref());

        Some(RawCollision {
            raw_collision_id,
            date,
            time: non_empty(self.time),
            location: non_empty(self.location),
            latitude: coords.map(|(lat, _)| lat),
            longitude: coords.map(|(_, lng)| lng),
            borough: non_empty(self.borough),
            authority_code: non_empty(self.authority_code),
            junction_detail: non_empty(self.junction_detail),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CasualtyRecord {
    raw_collision_id: Option<String>,
    mode_of_travel: Option<String>,
    casualty_severity: Option<String>,
}

/// Reads the collision feed from a CSV file.
///
/// # Errors
///
/// Returns [`CollisionError::SourceUnavailable`] if the file cannot be
/// opened, or [`CollisionError::SchemaViolation`] if a required column is
/// missing.
pub fn read_collisions(path: &Path) -> Result<Vec<RawCollision>, CollisionError> {
    let file = open_source(path)?;
    let collisions = parse_collisions(file)?;
    log::info!(
        "Read {} collisions from {}",
        collisions.len(),
        path.display()
    );
    Ok(collisions)
}

/// Reads the casualty feed from a CSV file.
///
/// # Errors
///
/// Returns [`CollisionError::SourceUnavailable`] if the file cannot be
/// opened, or [`CollisionError::SchemaViolation`] if a required column is
/// missing.
pub fn read_casualties(path: &Path) -> Result<Vec<RawCasualty>, CollisionError> {
    let file = open_source(path)?;
    let casualties = parse_casualties(file)?;
    log::info!(
        "Read {} casualties from {}",
        casualties.len(),
        path.display()
    );
    Ok(casualties)
}

/// Parses collision records from any CSV `Read` source.
///
/// Rows without a raw collision ID are skipped.
///
/// # Errors
///
/// Returns [`CollisionError`] if the header row is unreadable or a required
/// column is missing.
pub fn parse_collisions(reader: impl Read) -> Result<Vec<RawCollision>, CollisionError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    check_columns(&mut csv_reader, REQUIRED_COLLISION_COLUMNS, "collision")?;

    let mut collisions = Vec::new();
    for (row, result) in csv_reader.deserialize::<CollisionRecord>().enumerate() {
        match result {
            Ok(record) => match record.into_raw() {
                Some(raw) => collisions.push(raw),
                None => log::warn!("Dropping collision row {row}: missing raw_collision_id"),
            },
            Err(e) => log::warn!("Dropping malformed collision row {row}: {e}"),
        }
    }

    Ok(collisions)
}

/// Parses casualty records from any CSV `Read` source.
///
/// # Errors
///
/// Returns [`CollisionError`] if the header row is unreadable or a required
/// column is missing.
pub fn parse_casualties(reader: impl Read) -> Result<Vec<RawCasualty>, CollisionError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    check_columns(&mut csv_reader, REQUIRED_CASUALTY_COLUMNS, "casualty")?;

    let mut casualties = Vec::new();
    for (row, result) in csv_reader.deserialize::<CasualtyRecord>().enumerate() {
        match result {
            Ok(record) => match non_empty(record.raw_collision_id) {
                Some(raw_collision_id) => casualties.push(RawCasualty {
                    raw_collision_id,
                    mode_of_travel: non_empty(record.mode_of_travel),
                    casualty_severity: non_empty(record.casualty_severity),
                }),
                None => log::warn!("Dropping casualty row {row}: missing raw_collision_id"),
            },
            Err(e) => log::warn!("Dropping malformed casualty row {row}: {e}"),
        }
    }

    Ok(casualties)
}

/// Parses a feed date. Accepts ISO dates, ISO datetimes, and day-first
/// `dd/mm/yyyy` dates.
#[must_use]
pub fn parse_feed_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%d/%m/%Y") {
        return Some(date);
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
}

/// Parses lat/lng from optional string fields. Returns `None` if missing,
/// unparseable, non-finite, out of range, or the `(0, 0)` placeholder.
/// Longitude 0 alone is a real London coordinate (Greenwich).
#[must_use]
pub fn parse_lat_lng_str(lat: Option<&String>, lng: Option<&String>) -> Option<(f64, f64)> {
    let latitude = lat?.trim().parse::<f64>().ok()?;
    let longitude = lng?.trim().parse::<f64>().ok()?;
    if !latitude.is_finite() || !longitude.is_finite() {
        return None;
    }
    if latitude == 0.0 && longitude == 0.0 {
        return None;
    }
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }
    Some((latitude, longitude))
}

fn open_source(path: &Path) -> Result<std::fs::File, CollisionError> {
    std::fs::File::open(path).map_err(|e| {
        log::error!("Cannot open {}: {e}", path.display());
        CollisionError::SourceUnavailable {
            path: path.to_path_buf(),
        }
    })
}

fn check_columns<R: Read>(
    reader: &mut csv::Reader<R>,
    required: &[&str],
    feed: &str,
) -> Result<(), CollisionError> {
    let headers = reader.headers()?;
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h.trim() == *col))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(CollisionError::SchemaViolation {
            message: format!("{feed} feed is missing columns: {}", missing.join(", ")),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLISIONS_CSV: &str = "\
raw_collision_id,date,time,location,latitude,longitude,borough,junction_detail
0119TW0000001,2019-03-04,'0731,HIGH ST,51.5,-0.12,camden,Crossroads
0119TW0000002,04/05/2020,08:00,,51.6,-0.13,WESTMINSTER,Roundabout
0119TW0000003,not-a-date,08:00,,,,WESTMINSTER,Roundabout
";

    #[test]
    fn parses_collision_rows() {
        let rows = parse_collisions(COLLISIONS_CSV.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].raw_collision_id, "0119TW0000001");
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2019, 3, 4));
        assert_eq!(rows[0].time.as_deref(), Some("'0731"));
        assert_eq!(rows[0].borough.as_deref(), Some("camden"));
        assert_eq!(rows[0].authority_code, None);

        assert_eq!(rows[1].date, NaiveDate::from_ymd_opt(2020, 5, 4));
        assert_eq!(rows[1].location, None);

        assert_eq!(rows[2].date, None);
        assert_eq!(rows[2].latitude, None);
    }

    #[test]
    fn missing_required_column_is_schema_violation() {
        let csv = "raw_collision_id,date,latitude,longitude,borough\n1,2019-01-01,51.5,-0.1,CAMDEN\n";
        let err = parse_collisions(csv.as_bytes()).unwrap_err();
        match err {
            CollisionError::SchemaViolation { message } => {
                assert!(message.contains("junction_detail"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parses_casualty_rows_and_skips_missing_ids() {
        let csv = "\
raw_collision_id,mode_of_travel,casualty_severity
A1,pedal_cycle,fatal
,pedestrian,slight
A2,pedestrian,
";
        let rows = parse_casualties(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].mode_of_travel.as_deref(), Some("pedal_cycle"));
        assert_eq!(rows[1].casualty_severity, None);
    }

    #[test]
    fn missing_file_is_source_unavailable() {
        let err = read_collisions(Path::new("/nonexistent/collisions.csv")).unwrap_err();
        assert!(matches!(err, CollisionError::SourceUnavailable { .. }));
    }

    #[test]
    fn rejects_placeholder_and_out_of_range_coordinates() {
        let zero = "0.0".to_string();
        let lat = "51.5".to_string();
        let lng = "-0.12".to_string();
        let bad = "191.0".to_string();
        assert!(parse_lat_lng_str(Some(&zero), Some(&zero)).is_none());
        assert!(parse_lat_lng_str(Some(&lat), Some(&bad)).is_none());
        assert!(parse_lat_lng_str(None, Some(&lng)).is_none());
        let (la, lo) = parse_lat_lng_str(Some(&lat), Some(&lng)).unwrap();
        assert!((la - 51.5).abs() < f64::EPSILON);
        assert!((lo - -0.12).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_datetime_strings() {
        assert_eq!(
            parse_feed_date("2021-07-01 00:00:00"),
            NaiveDate::from_ymd_opt(2021, 7, 1)
        );
    }

    #[test]
    fn keeps_collisions_on_the_greenwich_meridian() {
        let csv = "\
raw_collision_id,date,latitude,longitude,borough,junction_detail
G1,2021-05-01,51.4826,0.0,GREENWICH,Crossroads
";
        let rows = parse_collisions(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].latitude, Some(51.4826));
        assert_eq!(rows[0].longitude, Some(0.0));
    }
}
