//! Per-run diagnostics.
//!
//! None of these abort a run: they are collected next to the data that could
//! be read and reported to the operator at the end.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parser::Candidate;

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum MappingError {
    /// A district header did not read as `Bydel <name> (oppdatert <date>)`.
    /// Its listings were skipped.
    #[error("{message}: {content:?}")]
    RegionError { message: String, content: String },

    /// A listing had no recognisable spot count and produced no observation.
    #[error("{message} for {kindergarten:?} in {region}: {details:?}")]
    NoMatchError {
        message: String,
        kindergarten: String,
        region: String,
        last_updated: String,
        details: String,
    },

    /// An observation was kept but has an unknown age group or no date.
    #[error("{message} for {kindergarten:?} in {region}: {field:?}")]
    FieldError {
        message: String,
        kindergarten: String,
        region: String,
        last_updated: String,
        field: Candidate,
    },

    /// A listing name did not match any registry entry closely enough.
    #[error("{message}: {input:?}, best match {best_match:?} with rating {rating:.3}")]
    FuzzyMatchError {
        message: String,
        input: String,
        best_match: String,
        rating: f64,
    },
}

impl MappingError {
    pub fn region(content: String) -> Self {
        Self::RegionError {
            message: "Failed to parse region name or update date".into(),
            content,
        }
    }

    pub fn no_match(kindergarten: &str, region: &str, last_updated: &str, details: &str) -> Self {
        Self::NoMatchError {
            message: "No matches found".into(),
            kindergarten: kindergarten.into(),
            region: region.into(),
            last_updated: last_updated.into(),
            details: details.into(),
        }
    }

    pub fn field(kindergarten: &str, region: &str, last_updated: &str, field: Candidate) -> Self {
        Self::FieldError {
            message: "Incomplete or unknown field value".into(),
            kindergarten: kindergarten.into(),
            region: region.into(),
            last_updated: last_updated.into(),
            field,
        }
    }

    pub fn fuzzy_match(input: &str, best_match: &str, rating: f64) -> Self {
        Self::FuzzyMatchError {
            message: "Could not confidently match kindergarten".into(),
            input: input.into(),
            best_match: best_match.into(),
            rating,
        }
    }

    /// The `type` tag this diagnostic serialises with.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RegionError { .. } => "RegionError",
            Self::NoMatchError { .. } => "NoMatchError",
            Self::FieldError { .. } => "FieldError",
            Self::FuzzyMatchError { .. } => "FuzzyMatchError",
        }
    }
}
