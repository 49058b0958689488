//! Availability page parser.
//!
//! Reads the municipal "ledige barnehageplasser" page: a `.ods-content`
//! container holding one `h3` per district ("Bydel Frogner (oppdatert
//! 1. mars 2025)") followed by `ul` lists whose `li` items each name a
//! kindergarten in a link and describe its free spots in prose.
//!
//! Parsing never fails. Malformed headers and listings become
//! [`MappingError`] entries next to the observations that could be read.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dates::{self, NOW};
use crate::diagnostics::MappingError;
use crate::model::{AgeGroup, Observation};
use crate::patterns::{self, CountMatch};

/// Name used when a listing has no link to read the kindergarten name from.
pub const UNKNOWN_KINDERGARTEN: &str = "Unknown Kindergarten";

/// One listing is mis-encoded on the source page; its text carries this glyph.
const ANOMALY_SENTINEL: char = '¨';

static CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".ods-content").expect("static selector"));
static REGION_HEADER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h3").expect("static selector"));
static LIST_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li").expect("static selector"));
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("static selector"));

static HEADER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^Bydel\s+(.+?)\s+\(oppdatert\s+(.+?)\)$").expect("static regex")
});

/// How candidates in one listing pick their availability date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateScan {
    /// Each candidate reads the text from its own spot count up to the next
    /// one, falling back to the whole listing when that stretch has no date.
    #[default]
    PerCandidate,
    /// Every candidate gets the last date in the whole listing. This is what
    /// historical data was produced with.
    Shared,
}

#[derive(Debug, Clone)]
pub struct ParserOptions {
    pub date_scan: DateScan,
    /// Year used for bare month names when a region header has no year.
    pub default_year: i32,
}

impl Default for ParserOptions {
    fn default() -> Self {
        use chrono::Datelike;
        Self {
            date_scan: DateScan::default(),
            default_year: chrono::Utc::now().year(),
        }
    }
}

/// A spot count read from a listing before it is turned into an observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub count: u32,
    #[serde(rename = "type")]
    pub age_group: AgeGroup,
    pub date: String,
}

/// Everything read from one page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub data: Vec<Observation>,
    pub errors: Vec<MappingError>,
}

/// A parsed `Bydel <name> (oppdatert <date>)` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionHeader {
    pub name: String,
    pub last_updated: String,
}

impl RegionHeader {
    pub fn parse(text: &str) -> Option<Self> {
        let caps = HEADER_PATTERN.captures(text.trim())?;
        Some(Self {
            name: caps.get(1)?.as_str().trim().to_string(),
            last_updated: dates::normalize_updated(caps.get(2)?.as_str().trim()),
        })
    }
}

/// Parse a page with default options.
pub fn parse_page(html: &str) -> ParseOutcome {
    PageParser::default().parse(html)
}

#[derive(Debug, Clone, Default)]
pub struct PageParser {
    options: ParserOptions,
}

impl PageParser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    pub fn parse(&self, html: &str) -> ParseOutcome {
        let document = Html::parse_document(html);
        let mut outcome = ParseOutcome::default();

        let Some(container) = document.select(&CONTAINER).next() else {
            warn!("availability container not found; page layout may have changed");
            return outcome;
        };

        for header in container.select(&REGION_HEADER) {
            let header_text = element_text(header);
            let Some(region) = RegionHeader::parse(&header_text) else {
                warn!(header = %header_text.trim(), "unparseable region header");
                outcome
                    .errors
                    .push(MappingError::region(header_text.trim().to_string()));
                continue;
            };

            for sibling in header.next_siblings().filter_map(ElementRef::wrap) {
                match sibling.value().name() {
                    "h3" => break,
                    "ul" => {
                        for item in sibling.select(&LIST_ITEM) {
                            self.parse_item(item, &region, &mut outcome);
                        }
                    }
                    _ => {}
                }
            }
        }

        debug!(
            observations = outcome.data.len(),
            errors = outcome.errors.len(),
            "parsed availability page"
        );
        outcome
    }

    fn parse_item(&self, item: ElementRef<'_>, region: &RegionHeader, outcome: &mut ParseOutcome) {
        let name = item
            .select(&LINK)
            .next()
            .map(|link| {
                let text = element_text(link);
                let text = text.trim();
                text.strip_suffix(':').unwrap_or(text).to_string()
            })
            .unwrap_or_else(|| UNKNOWN_KINDERGARTEN.to_string());

        let details = element_text(item)
            .replacen(&format!("{name}:"), "", 1)
            .trim()
            .to_string();

        if details.contains(ANOMALY_SENTINEL) {
            debug!(kindergarten = %name, "skipping mis-encoded listing");
            return;
        }

        let candidates = self.candidates(&details, region);
        if candidates.is_empty() {
            outcome.errors.push(MappingError::no_match(
                &name,
                &region.name,
                &region.last_updated,
                &details,
            ));
            return;
        }

        for candidate in candidates {
            if candidate.age_group == AgeGroup::Unknown || candidate.date.is_empty() {
                outcome.errors.push(MappingError::field(
                    &name,
                    &region.name,
                    &region.last_updated,
                    candidate.clone(),
                ));
            }
            outcome.data.push(Observation {
                region: region.name.clone(),
                last_updated: region.last_updated.clone(),
                kindergarten: name.clone(),
                spots: candidate.count,
                age_group: candidate.age_group,
                availability_date: candidate.date,
            });
        }
    }

    /// Spot candidates in one listing's detail text.
    pub fn candidates(&self, details: &str, region: &RegionHeader) -> Vec<Candidate> {
        let counts = patterns::find_counts(details);
        if counts.is_empty() {
            return Vec::new();
        }

        let year = dates::trailing_year(&region.last_updated).unwrap_or(self.options.default_year);
        let age_group = patterns::classify_age(details);
        let shared_date = patterns::last_date(details, year).map(|m| m.value);

        counts
            .iter()
            .enumerate()
            .map(|(i, found)| {
                let date = match self.options.date_scan {
                    DateScan::Shared => shared_date.clone(),
                    DateScan::PerCandidate => {
                        let segment = candidate_segment(details, &counts, i, found);
                        patterns::last_date(segment, year)
                            .map(|m| m.value)
                            .or_else(|| shared_date.clone())
                    }
                };
                Candidate {
                    count: found.count,
                    age_group,
                    date: date.unwrap_or_else(|| NOW.to_string()),
                }
            })
            .collect()
    }
}

/// Text from a count match up to the start of the next one.
fn candidate_segment<'a>(
    details: &'a str,
    counts: &[CountMatch],
    index: usize,
    found: &CountMatch,
) -> &'a str {
    let end = counts
        .get(index + 1)
        .map_or(details.len(), |next| next.span.start);
    &details[found.span.start..end]
}

/// Concatenated text of all descendants, like the DOM's `textContent`.
fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = include_str!("../testdata/ledige_plasser.html");

    fn page(body: &str) -> String {
        format!(
            r#"<html><body><header><h3>Meny</h3></header>
            <div class="ods-content">{body}</div></body></html>"#
        )
    }

    fn parser(date_scan: DateScan) -> PageParser {
        PageParser::new(ParserOptions {
            date_scan,
            default_year: 2030,
        })
    }

    #[test]
    fn single_listing_scenario() {
        let html = page(
            r#"<h3>Bydel Frogner (oppdatert 1. mars 2025)</h3>
            <ul><li><a href="/eksempel">Eksempel Barnehage</a>: 2 ledige plasser for barn i alderen 0-3 år, ledig fra nå</li></ul>"#,
        );
        let outcome = parse_page(&html);

        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(
            outcome.data,
            vec![Observation {
                region: "Frogner".into(),
                last_updated: "1 March 2025".into(),
                kindergarten: "Eksempel Barnehage".into(),
                spots: 2,
                age_group: AgeGroup::Under3,
                availability_date: "now".into(),
            }]
        );
    }

    #[test]
    fn missing_container_yields_nothing() {
        let outcome = parse_page("<html><body><h3>Bydel Frogner (oppdatert 1. mars 2025)</h3></body></html>");
        assert!(outcome.data.is_empty());
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn malformed_header_skips_only_its_region() {
        let html = page(
            r#"<h3>Bydel Alna</h3>
            <ul><li><a>Alna Barnehage</a>: 1 plass for barn 3-6 år</li></ul>
            <h3>Bydel Bjerke (oppdatert 2. mars 2025)</h3>
            <ul><li><a>Bjerke Barnehage</a>: 1 plass for barn 3-6 år</li></ul>"#,
        );
        let outcome = parse_page(&html);

        assert_eq!(outcome.errors, vec![MappingError::region("Bydel Alna".into())]);
        assert_eq!(outcome.data.len(), 1);
        assert_eq!(outcome.data[0].region, "Bjerke");
        assert_eq!(outcome.data[0].kindergarten, "Bjerke Barnehage");
    }

    #[test]
    fn sentinel_listing_is_silently_dropped() {
        let html = page(
            r#"<h3>Bydel Vestre Aker (oppdatert 1. mars 2025)</h3>
            <ul>
              <li><a>Hoff Barnehage</a>: 2 plasser for barn 0-3 år ¨ ledig fra nå</li>
              <li><a>Holmen Barnehage</a>: 1 plass for barn 3-6 år</li>
            </ul>"#,
        );
        let outcome = parse_page(&html);

        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.data.len(), 1);
        assert_eq!(outcome.data[0].kindergarten, "Holmen Barnehage");
    }

    #[test]
    fn listing_without_spot_phrase_is_a_no_match() {
        let html = page(
            r#"<h3>Bydel Frogner (oppdatert 1. mars 2025)</h3>
            <ul><li><a>Eksempel Barnehage</a>: Ta kontakt med barnehagen</li></ul>"#,
        );
        let outcome = parse_page(&html);

        assert!(outcome.data.is_empty());
        assert_eq!(
            outcome.errors,
            vec![MappingError::no_match(
                "Eksempel Barnehage",
                "Frogner",
                "1 March 2025",
                "Ta kontakt med barnehagen",
            )]
        );
    }

    #[test]
    fn unknown_age_keeps_observation_and_flags_it() {
        let html = page(
            r#"<h3>Bydel Frogner (oppdatert 1. mars 2025)</h3>
            <ul><li><a>Eksempel Barnehage</a>: 2 plasser, ledig fra august</li></ul>"#,
        );
        let outcome = parse_page(&html);

        assert_eq!(outcome.data.len(), 1);
        assert_eq!(outcome.data[0].age_group, AgeGroup::Unknown);
        assert_eq!(outcome.data[0].availability_date, "August 2025");
        assert!(matches!(
            outcome.errors.as_slice(),
            [MappingError::FieldError { field, .. }] if field.count == 2
        ));
    }

    #[test]
    fn listing_without_link_still_extracts_counts() {
        let html = page(
            r#"<h3>Bydel Frogner (oppdatert 1. mars 2025)</h3>
            <ul><li>1 plass for barn 3-6 år</li></ul>"#,
        );
        let outcome = parse_page(&html);

        assert_eq!(outcome.data.len(), 1);
        assert_eq!(outcome.data[0].kindergarten, UNKNOWN_KINDERGARTEN);
        assert_eq!(outcome.data[0].age_group, AgeGroup::Over3);
    }

    #[test]
    fn colon_inside_link_is_stripped() {
        let html = page(
            r#"<h3>Bydel Frogner (oppdatert 1. mars 2025)</h3>
            <ul><li><a>Eksempel Barnehage:</a> 1 plass for barn 3-6 år</li></ul>"#,
        );
        let outcome = parse_page(&html);
        assert_eq!(outcome.data[0].kindergarten, "Eksempel Barnehage");
    }

    #[test]
    fn lists_after_next_header_belong_to_next_region() {
        let html = page(
            r#"<h3>Bydel Frogner (oppdatert 1. mars 2025)</h3>
            <p>Oppdateres ukentlig</p>
            <ul><li><a>A Barnehage</a>: 1 plass for barn 0-3 år</li></ul>
            <ul><li><a>B Barnehage</a>: 1 plass for barn 0-3 år</li></ul>
            <h3>Bydel Sagene (oppdatert 3. mars 2025)</h3>
            <ul><li><a>C Barnehage</a>: 1 plass for barn 0-3 år</li></ul>"#,
        );
        let regions: Vec<(String, String)> = parse_page(&html)
            .data
            .into_iter()
            .map(|o| (o.region, o.kindergarten))
            .collect();
        assert_eq!(
            regions,
            vec![
                ("Frogner".into(), "A Barnehage".into()),
                ("Frogner".into(), "B Barnehage".into()),
                ("Sagene".into(), "C Barnehage".into()),
            ]
        );
    }

    #[test]
    fn bare_month_uses_header_year() {
        let html = page(
            r#"<h3>Bydel Frogner (oppdatert 20. desember 2024)</h3>
            <ul><li><a>Eksempel Barnehage</a>: 1 plass for barn 3-6 år, ledig fra januar</li></ul>"#,
        );
        let outcome = parser(DateScan::PerCandidate).parse(&html);
        assert_eq!(outcome.data[0].availability_date, "January 2024");
    }

    #[test]
    fn bare_month_without_header_year_uses_default_year() {
        let html = page(
            r#"<h3>Bydel Frogner (oppdatert i dag)</h3>
            <ul><li><a>Eksempel Barnehage</a>: 1 plass for barn 3-6 år, ledig fra januar</li></ul>"#,
        );
        let outcome = parser(DateScan::PerCandidate).parse(&html);
        assert_eq!(outcome.data[0].last_updated, "i dag");
        assert_eq!(outcome.data[0].availability_date, "January 2030");
    }

    #[test]
    fn per_candidate_dates_follow_their_own_clause() {
        let region = RegionHeader::parse("Bydel Frogner (oppdatert 1. mars 2025)").unwrap();
        let details = "1 plass ledig fra nå og 2 plasser ledig fra august";

        let per_candidate = parser(DateScan::PerCandidate).candidates(details, &region);
        let dates: Vec<&str> = per_candidate.iter().map(|c| c.date.as_str()).collect();
        assert_eq!(dates, vec!["now", "August 2025"]);

        let shared = parser(DateScan::Shared).candidates(details, &region);
        let dates: Vec<&str> = shared.iter().map(|c| c.date.as_str()).collect();
        assert_eq!(dates, vec!["August 2025", "August 2025"]);
    }

    #[test]
    fn per_candidate_falls_back_to_listing_date() {
        let region = RegionHeader::parse("Bydel Frogner (oppdatert 1. mars 2025)").unwrap();
        let details = "1 småbarnsplass og 1 storebarnsplass, ledig fra august";

        let candidates = parser(DateScan::PerCandidate).candidates(details, &region);
        let dates: Vec<&str> = candidates.iter().map(|c| c.date.as_str()).collect();
        assert_eq!(dates, vec!["August 2025", "August 2025"]);
    }

    #[test]
    fn header_parsing() {
        let header = RegionHeader::parse("  bydel Nordre Aker (Oppdatert 14.februar 2025) ").unwrap();
        assert_eq!(header.name, "Nordre Aker");
        assert_eq!(header.last_updated, "14 February 2025");
        assert!(RegionHeader::parse("Bydel Frogner").is_none());
        assert!(RegionHeader::parse("Ledige plasser i Oslo").is_none());
    }

    #[test]
    fn fixture_page() {
        let outcome = parser(DateScan::PerCandidate).parse(FIXTURE);

        let regions: Vec<&str> = outcome.data.iter().map(|o| o.region.as_str()).collect();
        assert!(regions.iter().all(|r| ["Frogner", "Grünerløkka", "Vestre Aker"].contains(r)));

        let region_errors = outcome
            .errors
            .iter()
            .filter(|e| matches!(e, MappingError::RegionError { .. }))
            .count();
        assert_eq!(region_errors, 1);
        assert!(outcome.data.iter().all(|o| o.kindergarten != "Hoff Barnehage"));

        let solbakken: Vec<&Observation> = outcome
            .data
            .iter()
            .filter(|o| o.kindergarten == "Solbakken Barnehage")
            .collect();
        assert_eq!(solbakken.len(), 2);
        assert_eq!(solbakken[0].spots, 1);
        assert_eq!(solbakken[1].spots, 2);
        assert_eq!(solbakken[0].age_group, AgeGroup::Over3);
        assert_eq!(solbakken[0].availability_date, "now");
        assert_eq!(solbakken[1].availability_date, "01.08.2025");

        let no_match = outcome
            .errors
            .iter()
            .filter(|e| matches!(e, MappingError::NoMatchError { .. }))
            .count();
        assert_eq!(no_match, 1);
    }
}
