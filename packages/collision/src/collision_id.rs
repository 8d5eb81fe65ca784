//! Canonical collision IDs.
//!
//! Canonical IDs follow the national STATS19 layout: four-digit year, the
//! two-digit police force code, then the force's own reference. The London
//! feed only publishes its own reference, so the force code is derived from
//! the local authority. The City of London is policed by its own force
//! (code `48`); every other London borough is covered by the Metropolitan
//! Police (code `01`).

/// ONS code of the City of London local authority.
pub const CITY_OF_LONDON_AUTHORITY_CODE: &str = "E09000001";

/// Borough name of the City of London as published in the feed.
pub const CITY_OF_LONDON_BOROUGH: &str = "CITY OF LONDON";

/// Police force code for the City of London Police.
pub const CITY_OF_LONDON_FORCE_CODE: &str = "48";

/// Police force code for the Metropolitan Police.
pub const METROPOLITAN_FORCE_CODE: &str = "01";

/// Number of trailing raw-ID characters kept in the canonical ID.
pub const REFERENCE_LEN: usize = 9;

/// Returns the police force code for a collision's authority.
///
/// The ONS authority code wins when present; the borough name is the
/// fallback for feeds that only publish names.
#[must_use]
pub fn force_code(authority_code: Option<&str>, borough: &str) -> &'static str {
    let is_city = authority_code.map_or_else(
        || borough.trim().eq_ignore_ascii_case(CITY_OF_LONDON_BOROUGH),
        |code| code.trim().eq_ignore_ascii_case(CITY_OF_LONDON_AUTHORITY_CODE),
    );

    if is_city {
        CITY_OF_LONDON_FORCE_CODE
    } else {
        METROPOLITAN_FORCE_CODE
    }
}

/// Builds the canonical collision ID `{year}{force_code}{reference}`.
///
/// `reference` is the last [`REFERENCE_LEN`] characters of the trimmed raw
/// ID, left-padded with `0` when the raw ID is shorter.
#[must_use]
pub fn canonical_collision_id(year: i32, force_code: &str, raw_collision_id: &str) -> String {
    let raw = raw_collision_id.trim();
    let chars: Vec<char> = raw.chars().collect();
    let start = chars.len().saturating_sub(REFERENCE_LEN);
    let reference: String = chars[start..].iter().collect();

    format!("{year:04}{force_code}{reference:0>width$}", width = REFERENCE_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_of_london_uses_its_own_force() {
        assert_eq!(force_code(Some("E09000001"), "CITY OF LONDON"), "48");
        assert_eq!(force_code(None, "City of London"), "48");
    }

    #[test]
    fn other_boroughs_use_metropolitan_force() {
        assert_eq!(force_code(Some("E09000007"), "CAMDEN"), "01");
        assert_eq!(force_code(None, "WESTMINSTER"), "01");
    }

    #[test]
    fn authority_code_takes_precedence_over_name() {
        assert_eq!(force_code(Some("E09000033"), "CITY OF LONDON"), "01");
    }

    #[test]
    fn keeps_trailing_reference_characters() {
        assert_eq!(
            canonical_collision_id(2019, "01", "0119TW0123456"),
            "201901TW0123456"
        );
    }

    #[test]
    fn pads_short_references() {
        assert_eq!(canonical_collision_id(2021, "48", "1234"), "202148000001234");
    }

    #[test]
    fn is_deterministic_and_distinguishes_forces() {
        let a = canonical_collision_id(2020, "01", "ABC123456789");
        let b = canonical_collision_id(2020, "01", "ABC123456789");
        let c = canonical_collision_id(2020, "48", "ABC123456789");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, "202001123456789");
    }
}
