//! Value cleaning for the collision feed.
//!
//! The feeds publish the same category under different spellings across
//! years ("T or staggered junction", "T/Staggered junction", ...). Values
//! are reduced to a lower snake-case form and then matched against known
//! categories. Cleaning is applied identically to feed values and to the
//! configured allow-lists so both sides compare in the same form.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Characters that are not lower-case ASCII alphanumerics, `_`, or space.
static PUNCTUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_ ]+").expect("valid regex"));

/// Formats a label into the canonical lower snake-case form.
///
/// The pipeline:
/// 1. Trim and lowercase
/// 2. Strip leading underscores
/// 3. Replace `/` with `_or_`
/// 4. Remove remaining punctuation
/// 5. Replace spaces with underscores
#[must_use]
pub fn format_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let stripped = lower.trim_start_matches('_').replace('/', "_or_");
    PUNCTUATION_RE
        .replace_all(&stripped, "")
        .replace(' ', "_")
}

/// Maps a raw value onto the first known category it contains.
///
/// When no category matches, the formatted value is logged for manual
/// follow-up and returned unchanged so the run can continue.
#[must_use]
pub fn format_category(value: &str, categories: &[String]) -> String {
    let formatted = format_name(value);
    if let Some(category) = categories.iter().find(|c| formatted.contains(c.as_str())) {
        return category.clone();
    }
    log::warn!("No category match found for: {formatted}");
    formatted
}

/// Formats a feed time such as `'0731` into `07:31`.
///
/// Times already in `HH:MM` form are returned trimmed.
#[must_use]
pub fn format_time(time: &str) -> String {
    let trimmed = time.trim();
    match trimmed.strip_prefix('\'') {
        Some(digits) if digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit()) => {
            format!("{}:{}", &digits[..2], &digits[2..])
        }
        Some(rest) => rest.to_string(),
        None => trimmed.to_string(),
    }
}

/// Replaces `value` with its canonical spelling if it appears in the alias
/// table.
#[must_use]
pub fn apply_alias(value: &str, aliases: &BTreeMap<String, String>) -> String {
    aliases
        .get(value)
        .map_or_else(|| value.to_string(), Clone::clone)
}

/// Cleans an optional free-text field: trims, upper-cases, and treats empty
/// strings as missing.
#[must_use]
pub fn clean_upper(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_mixed_case_with_slash() {
        assert_eq!(
            format_name(" T/Staggered Junction "),
            "t_or_staggered_junction"
        );
    }

    #[test]
    fn strips_leading_underscores_and_punctuation() {
        assert_eq!(format_name("_Mini-roundabout."), "miniroundabout");
        assert_eq!(format_name("Crossroads"), "crossroads");
    }

    #[test]
    fn matches_category_by_containment() {
        let categories = vec!["roundabout".to_string(), "crossroads".to_string()];
        assert_eq!(format_category("Mini Roundabout", &categories), "roundabout");
        assert_eq!(format_category("CROSSROADS", &categories), "crossroads");
    }

    #[test]
    fn unmatched_category_passes_through_formatted() {
        let categories = vec!["roundabout".to_string()];
        assert_eq!(
            format_category("Private Drive", &categories),
            "private_drive"
        );
    }

    #[test]
    fn formats_quoted_times() {
        assert_eq!(format_time("'0731"), "07:31");
        assert_eq!(format_time("07:31"), "07:31");
        assert_eq!(format_time(" 18:05 "), "18:05");
    }

    #[test]
    fn applies_aliases() {
        let aliases = BTreeMap::from([(
            "RICHMOND UPON THAMES".to_string(),
            "RICHMOND-UPON-THAMES".to_string(),
        )]);
        assert_eq!(
            apply_alias("RICHMOND UPON THAMES", &aliases),
            "RICHMOND-UPON-THAMES"
        );
        assert_eq!(apply_alias("CAMDEN", &aliases), "CAMDEN");
    }

    #[test]
    fn clean_upper_drops_blank_values() {
        assert_eq!(clean_upper(Some("  camden ")), Some("CAMDEN".to_string()));
        assert_eq!(clean_upper(Some("   ")), None);
        assert_eq!(clean_upper(None), None);
    }
}
