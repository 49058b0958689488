//! Fuzzy matching of listing names against registry names.
//!
//! The page and the registry spell kindergarten names slightly differently
//! ("Eksempel barnehage" vs "Eksempel Barnehage AS"). Names are compared with
//! the Sørensen–Dice coefficient over character bigrams, whitespace removed.
//! No case or diacritic folding is applied.

use std::collections::HashMap;

use crate::diagnostics::MappingError;

/// Lowest rating accepted as a match. Tuned against the page's naming.
pub const MATCH_THRESHOLD: f64 = 0.7;

/// Similarity of two strings in `[0, 1]`.
///
/// Identical strings (after whitespace removal) rate 1.0; a string shorter
/// than two characters has no bigrams and rates 0.0 against anything else.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().filter(|c| !c.is_whitespace()).collect();
    let b: Vec<char> = b.chars().filter(|c| !c.is_whitespace()).collect();

    if a == b {
        return 1.0;
    }
    if a.len() < 2 || b.len() < 2 {
        return 0.0;
    }

    let mut bigrams: HashMap<(char, char), usize> = HashMap::new();
    for pair in a.windows(2) {
        *bigrams.entry((pair[0], pair[1])).or_default() += 1;
    }

    let mut shared = 0usize;
    for pair in b.windows(2) {
        if let Some(count) = bigrams.get_mut(&(pair[0], pair[1]))
            && *count > 0
        {
            *count -= 1;
            shared += 1;
        }
    }

    (2 * shared) as f64 / (a.len() + b.len() - 2) as f64
}

/// The highest-rated known name for an input.
#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch {
    pub target: String,
    /// Position of `target` in the known names.
    pub index: usize,
    pub rating: f64,
}

impl BestMatch {
    pub fn is_accepted(&self) -> bool {
        accepts(self.rating)
    }
}

pub fn accepts(rating: f64) -> bool {
    rating >= MATCH_THRESHOLD
}

/// Rate `input` against every known name; ties keep the earliest name.
///
/// Returns `None` only when `known` is empty.
pub fn find_best_match<'a, I>(input: &str, known: I) -> Option<BestMatch>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<BestMatch> = None;
    for (index, name) in known.into_iter().enumerate() {
        let rating = similarity(input, name);
        if best.as_ref().is_none_or(|b| rating > b.rating) {
            best = Some(BestMatch {
                target: name.to_string(),
                index,
                rating,
            });
        }
    }
    best
}

/// Resolves listing names against a fixed snapshot of registry names.
pub struct EntityMatcher<'a> {
    names: Vec<&'a str>,
}

impl<'a> EntityMatcher<'a> {
    pub fn new<I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self {
            names: names.into_iter().collect(),
        }
    }

    /// Best match at or above [`MATCH_THRESHOLD`], or a `FuzzyMatchError`
    /// naming the closest candidate.
    pub fn resolve(&self, input: &str) -> Result<BestMatch, MappingError> {
        match find_best_match(input, self.names.iter().copied()) {
            Some(best) if best.is_accepted() => Ok(best),
            Some(best) => Err(MappingError::fuzzy_match(input, &best.target, best.rating)),
            None => Err(MappingError::fuzzy_match(input, "", 0.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_names_rate_one() {
        assert_eq!(similarity("Eksempel Barnehage", "Eksempel Barnehage"), 1.0);
        assert_eq!(similarity("Eksempel Barnehage", "EksempelBarnehage"), 1.0);
    }

    #[test]
    fn disjoint_names_rate_zero() {
        assert_eq!(similarity("abc", "xyz"), 0.0);
        assert_eq!(similarity("a", "ab"), 0.0);
    }

    #[test]
    fn known_rating() {
        // ni ig gh ht | na ac ch ht: one shared, 2 * 1 / 8
        let rating = similarity("night", "nacht");
        assert!((rating - 0.25).abs() < 1e-12, "{rating}");
    }

    #[test]
    fn repeated_bigrams_are_counted_once_each() {
        // aa aa | aa → 1 shared; 2 * 1 / (3 + 2 - 2)
        let rating = similarity("aaa", "aa");
        assert!((rating - 2.0 / 3.0).abs() < 1e-12, "{rating}");
    }

    #[test]
    fn case_and_diacritics_matter() {
        assert!(similarity("Grünerløkka", "Grunerlokka") < 1.0);
        assert!(similarity("ABCD", "abcd") < 1.0);
    }

    #[test]
    fn rating_exactly_at_threshold_is_accepted() {
        // 10 bigrams each, 7 shared: 2 * 7 / 20 = 0.7
        let rating = similarity("abcdefghijk", "abcdefghxyz");
        assert_eq!(rating, 0.7);
        let matcher = EntityMatcher::new(["abcdefghijk"]);
        let best = matcher.resolve("abcdefghxyz").unwrap();
        assert_eq!(best.target, "abcdefghijk");
    }

    #[test]
    fn rating_below_threshold_is_rejected() {
        // 13 bigrams each, 9 shared: 18 / 26 ≈ 0.69
        let rating = similarity("abcdefghijklmn", "abcdefghijXYZW");
        assert!(rating < MATCH_THRESHOLD && rating > 0.69, "{rating}");
        let matcher = EntityMatcher::new(["abcdefghijklmn"]);
        let err = matcher.resolve("abcdefghijXYZW").unwrap_err();
        assert!(matches!(
            err,
            MappingError::FuzzyMatchError { ref best_match, .. } if best_match == "abcdefghijklmn"
        ));
    }

    #[test]
    fn threshold_boundary() {
        assert!(accepts(0.70));
        assert!(!accepts(0.69));
    }

    #[test]
    fn best_of_several_and_first_on_ties() {
        let known = ["Solbakken Barnehage", "Eksempel Barnehage", "Eksempel Barnehage"];
        let best = find_best_match("Eksempel barnehage", known).unwrap();
        assert_eq!(best.target, "Eksempel Barnehage");
        assert_eq!(best.index, 1);
    }

    #[test]
    fn empty_registry_is_a_fuzzy_error() {
        let matcher = EntityMatcher::new(std::iter::empty());
        let err = matcher.resolve("Eksempel Barnehage").unwrap_err();
        assert_eq!(err, MappingError::fuzzy_match("Eksempel Barnehage", "", 0.0));
    }
}
