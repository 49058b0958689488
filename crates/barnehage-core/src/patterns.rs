//! Pattern tables used to read listing prose.
//!
//! Each concern is an ordered table of `(pattern, rule)` rows so that the
//! phrasing rules can be tested and extended without touching parser control
//! flow:
//!
//! - [`COUNT_PATTERNS`]: how many spots a listing offers. Rows are tried in
//!   order; the first row with any match supplies every candidate.
//! - [`AGE_RULES`]: which age group a listing targets. Explicit ranges
//!   (`0-3 år`) outrank compound nouns (`småbarnsplass`).
//! - [`DATE_PATTERN`]: when the spot becomes available.

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::dates::{self, NOW};
use crate::model::AgeGroup;

// ── Spot counts ──

/// How a count pattern turns a match into a number of spots.
#[derive(Debug, Clone, Copy)]
pub enum CountRule {
    /// Capture group 1 holds the count.
    Captured,
    /// The phrase carries no number; assume this many.
    Fixed(u32),
}

pub struct CountPattern {
    pub name: &'static str,
    pub regex: Regex,
    pub rule: CountRule,
}

/// A spot count found in a listing, with its byte span in the detail text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountMatch {
    pub count: u32,
    pub span: Range<usize>,
}

pub static COUNT_PATTERNS: LazyLock<Vec<CountPattern>> = LazyLock::new(|| {
    vec![
        CountPattern {
            name: "numbered",
            regex: Regex::new(
                r"(?i)(\d+)\s*(plass(?:er)?|småbarnsplass(?:er)?|småbarnplass(?:er)?|storebarnsplass(?:er)?|storbarnsplass(?:er)?|storebarnplass(?:er)?|ledig(?:e)?\s+plasser|ledig(?:e)?\s+plass|plass)",
            )
            .expect("static regex"),
            rule: CountRule::Captured,
        },
        CountPattern {
            name: "bare phrase",
            regex: Regex::new(r"(?i)\bledige?\s+plass(?:er)?\b").expect("static regex"),
            rule: CountRule::Fixed(1),
        },
    ]
});

/// All spot counts in `text`, from the first count pattern that matches.
///
/// Numbers too large for a `u32` are skipped.
pub fn find_counts(text: &str) -> Vec<CountMatch> {
    for pattern in COUNT_PATTERNS.iter() {
        let found: Vec<CountMatch> = pattern
            .regex
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let count = match pattern.rule {
                    CountRule::Captured => caps.get(1)?.as_str().parse().ok()?,
                    CountRule::Fixed(n) => n,
                };
                Some(CountMatch {
                    count,
                    span: whole.range(),
                })
            })
            .collect();
        if !found.is_empty() {
            tracing::trace!(pattern = pattern.name, count = found.len(), "spot counts matched");
            return found;
        }
    }
    Vec::new()
}

// ── Age groups ──

/// Precedence class of an age rule. Lower tiers win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AgeTier {
    Range,
    Compound,
}

pub struct AgeRule {
    pub tier: AgeTier,
    pub regex: Regex,
    pub group: AgeGroup,
}

fn range_rule(range: &str, group: AgeGroup) -> AgeRule {
    let pattern = format!(r"(?i)\b(?:barn\s+)?(?:i\s+)?(?:alder(?:en)?\s+)?(?:{range})\s*år\b");
    AgeRule {
        tier: AgeTier::Range,
        regex: Regex::new(&pattern).expect("static regex"),
        group,
    }
}

fn compound_rule(stem: &str, group: AgeGroup) -> AgeRule {
    AgeRule {
        tier: AgeTier::Compound,
        regex: Regex::new(&format!("(?i){stem}")).expect("static regex"),
        group,
    }
}

pub static AGE_RULES: LazyLock<Vec<AgeRule>> = LazyLock::new(|| {
    vec![
        range_rule(r"0\s*[-–]\s*3|under\s*3", AgeGroup::Under3),
        range_rule(r"3\s*[-–]\s*6|over\s*3", AgeGroup::Over3),
        range_rule(r"2\s*[-–]\s*6", AgeGroup::TwoToSix),
        compound_rule("småbarn", AgeGroup::Under3),
        compound_rule("sto(?:re|r)?barn", AgeGroup::Over3),
    ]
});

/// Classify the age group a listing targets.
///
/// Within the lowest tier that matches at all, the rule matching earliest in
/// the text wins. No match gives [`AgeGroup::Unknown`].
pub fn classify_age(text: &str) -> AgeGroup {
    for tier in [AgeTier::Range, AgeTier::Compound] {
        let earliest = AGE_RULES
            .iter()
            .filter(|rule| rule.tier == tier)
            .filter_map(|rule| rule.regex.find(text).map(|m| (m.start(), rule.group)))
            .min_by_key(|(start, _)| *start);
        if let Some((_, group)) = earliest {
            return group;
        }
    }
    AgeGroup::Unknown
}

// ── Availability dates ──

pub static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?xi)
        ledig\s+fra\s+(?:
            (?P<glued_word>\w+)(?P<glued_year>\d{4})
          | (?P<numeric>\d{1,2}\.\d{1,2}\.\d{4})
          | (?P<month>januar|februar|mars|april|mai|juni|juli|august|september|oktober|november|desember)
            (?:\s+(?P<month_year>\d{4}))?
          | (?P<now>nå|d\.d)
        )
        | fra\s+(?P<from_numeric>\d{1,2}\.\d{1,2}\.\d{4})
        | fra\s+(?P<from_word>\w+)
        ",
    )
    .expect("static regex")
});

/// A date phrase found in a listing, with its byte span in the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMatch {
    pub value: String,
    pub span: Range<usize>,
}

/// The last date phrase in `text`, normalised with `year` for bare months.
pub fn last_date(text: &str, year: i32) -> Option<DateMatch> {
    DATE_PATTERN.captures_iter(text).last().and_then(|caps| {
        let span = caps.get(0)?.range();
        Some(DateMatch {
            value: interpret_date(&caps, year),
            span,
        })
    })
}

fn interpret_date(caps: &Captures<'_>, year: i32) -> String {
    let group = |name: &str| caps.name(name).map(|m| m.as_str());

    if let (Some(word), Some(glued_year)) = (group("glued_word"), group("glued_year")) {
        return match dates::english_month(word) {
            Some(month) => format!("{month} {glued_year}"),
            None => format!("{word}{glued_year}").to_lowercase(),
        };
    }
    if let Some(numeric) = group("numeric").or_else(|| group("from_numeric")) {
        return numeric.to_string();
    }
    if let Some(month) = group("month").and_then(dates::english_month) {
        return match group("month_year") {
            Some(explicit) => format!("{month} {explicit}"),
            None => format!("{month} {year}"),
        };
    }
    if group("now").is_some() {
        return NOW.to_string();
    }
    match group("from_word") {
        Some(word) if dates::is_now_token(word) => NOW.to_string(),
        Some(word) => match dates::english_month(word) {
            Some(month) => format!("{month} {year}"),
            None => word.to_lowercase(),
        },
        None => String::new(),
    }
}
