//! Norwegian date normalisation for the availability page.
//!
//! The page writes dates in Norwegian prose ("1. mars 2025", "ledig fra
//! august"). Month names are mapped to a fixed English vocabulary so stored
//! values are stable across page rewordings; days and years pass through.
//!
//! # Conventions seen on the page
//!
//! - Region headers: `Bydel Frogner (oppdatert 1. mars 2025)`
//! - Listings: `ledig fra august`, `ledig fra 01.08.2025`, `ledig fra nå`,
//!   `ledig fra d.d.` ("dags dato", today)

use std::sync::LazyLock;

use regex::Regex;

/// Norwegian month names (lower case) and their English counterparts.
pub const MONTHS: [(&str, &str); 12] = [
    ("januar", "January"),
    ("februar", "February"),
    ("mars", "March"),
    ("april", "April"),
    ("mai", "May"),
    ("juni", "June"),
    ("juli", "July"),
    ("august", "August"),
    ("september", "September"),
    ("oktober", "October"),
    ("november", "November"),
    ("desember", "December"),
];

/// Value stored for "available now" / "available today".
pub const NOW: &str = "now";

static DAY_MONTH_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.\s*(\w+)\s+(\d+)").expect("static regex"));

static TRAILING_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})\s*$").expect("static regex"));

/// English name for a Norwegian month, case-insensitive.
pub fn english_month(word: &str) -> Option<&'static str> {
    let lower = word.to_lowercase();
    MONTHS
        .iter()
        .find(|(no, _)| *no == lower)
        .map(|(_, en)| *en)
}

/// Whether a token means "now" on the page (`nå`, `d.d`, `d.d.`).
pub fn is_now_token(word: &str) -> bool {
    matches!(word.to_lowercase().as_str(), "nå" | "d.d" | "d.d.")
}

/// Normalise a region header's "oppdatert" date.
///
/// Input: `"1. mars 2025"`, `"14.februar 2025"`
/// Output: `"1 March 2025"`, `"14 February 2025"`
///
/// 1. Replace the dot after the day with a space.
/// 2. If the result splits into exactly three words, map the middle one
///    through [`MONTHS`] (unknown words are kept).
/// 3. Anything else is returned with only step 1 applied.
pub fn normalize_updated(date: &str) -> String {
    let spaced = DAY_MONTH_YEAR.replacen(date, 1, "${1} ${2} ${3}");
    let parts: Vec<&str> = spaced.split(' ').collect();
    match parts.as_slice() {
        [day, month, year] => {
            let month = english_month(month).unwrap_or(*month);
            format!("{day} {month} {year}")
        }
        _ => spaced.to_string(),
    }
}

/// Four-digit year at the end of a date string, if any.
pub fn trailing_year(date: &str) -> Option<i32> {
    TRAILING_YEAR
        .captures(date)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_date_with_dot_and_space() {
        assert_eq!(normalize_updated("1. mars 2025"), "1 March 2025");
    }

    #[test]
    fn header_date_without_space_after_dot() {
        assert_eq!(normalize_updated("14.februar 2025"), "14 February 2025");
    }

    #[test]
    fn month_lookup_is_case_insensitive() {
        assert_eq!(normalize_updated("3. Desember 2024"), "3 December 2024");
        assert_eq!(english_month("MAI"), Some("May"));
    }

    #[test]
    fn unknown_month_word_passes_through() {
        assert_eq!(normalize_updated("3. primo 2025"), "3 primo 2025");
        assert_eq!(english_month("primo"), None);
    }

    #[test]
    fn unexpected_shapes_are_left_alone() {
        assert_eq!(normalize_updated("i dag"), "i dag");
        assert_eq!(normalize_updated("1. mars"), "1. mars");
    }

    #[test]
    fn every_month_maps() {
        for (no, en) in MONTHS {
            assert_eq!(english_month(no), Some(en));
        }
    }

    #[test]
    fn now_tokens() {
        assert!(is_now_token("nå"));
        assert!(is_now_token("NÅ"));
        assert!(is_now_token("d.d"));
        assert!(is_now_token("d.d."));
        assert!(!is_now_token("snart"));
    }

    #[test]
    fn trailing_year_extraction() {
        assert_eq!(trailing_year("1 March 2025"), Some(2025));
        assert_eq!(trailing_year("1 March 2025 "), Some(2025));
        assert_eq!(trailing_year("1. mars"), None);
        assert_eq!(trailing_year("01.08.20255"), None);
    }
}
