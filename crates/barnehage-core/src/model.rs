//! Registry entities and availability records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spot_id::SpotId;

/// Age bracket a listed spot is offered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "under 3 years")]
    Under3,
    #[serde(rename = "over 3 years")]
    Over3,
    #[serde(rename = "2-6 years")]
    TwoToSix,
    #[serde(rename = "unknown")]
    Unknown,
}

impl AgeGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Under3 => "under 3 years",
            Self::Over3 => "over 3 years",
            Self::TwoToSix => "2-6 years",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unrecognised {kind}: {value:?}")]
pub struct ParseLabelError {
    kind: &'static str,
    value: String,
}

impl FromStr for AgeGroup {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "under 3 years" => Ok(Self::Under3),
            "over 3 years" => Ok(Self::Over3),
            "2-6 years" => Ok(Self::TwoToSix),
            "unknown" => Ok(Self::Unknown),
            other => Err(ParseLabelError {
                kind: "age group",
                value: other.to_string(),
            }),
        }
    }
}

/// Lifecycle of a spot record. `Available` flips to `Taken` once, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpotStatus {
    Available,
    Taken,
}

impl SpotStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Taken => "taken",
        }
    }
}

impl fmt::Display for SpotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpotStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "taken" => Ok(Self::Taken),
            other => Err(ParseLabelError {
                kind: "spot status",
                value: other.to_string(),
            }),
        }
    }
}

/// One listing parsed from the availability page, before it is matched to
/// a registry entity. Lives for a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub region: String,
    pub last_updated: String,
    pub kindergarten: String,
    pub spots: u32,
    pub age_group: AgeGroup,
    pub availability_date: String,
}

/// One entry in a kindergarten's availability history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotRecord {
    pub region: String,
    pub discovered_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub spots: u32,
    pub age_group: AgeGroup,
    pub availability_date: String,
    pub status: SpotStatus,
    pub spot_id: SpotId,
}

impl SpotRecord {
    pub fn is_available(&self) -> bool {
        self.status == SpotStatus::Available
    }
}

/// A kindergarten tracked by the registry.
///
/// `orgnr` is the stable key used by the store; `navn` is the name listings
/// are matched against and the name spot fingerprints are derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kindergarten {
    pub orgnr: String,
    pub navn: String,
    /// `[lat, lng]` as reported by barnehagefakta.
    pub koordinat_lat_lng: Option<[f64; 2]>,
    pub fylkesnummer: Option<String>,
    pub kommunenummer: Option<String>,
    pub details: Option<KindergartenDetails>,
    #[serde(default)]
    pub spot_history: Vec<SpotRecord>,
}

impl Kindergarten {
    /// A registry entry with only the identifying fields set.
    pub fn new(orgnr: impl Into<String>, navn: impl Into<String>) -> Self {
        Self {
            orgnr: orgnr.into(),
            navn: navn.into(),
            koordinat_lat_lng: None,
            fylkesnummer: None,
            kommunenummer: None,
            details: None,
            spot_history: Vec::new(),
        }
    }

    pub fn available_spots(&self) -> impl Iterator<Item = &SpotRecord> {
        self.spot_history.iter().filter(|r| r.is_available())
    }

    pub fn has_availability(&self) -> bool {
        self.available_spots().next().is_some()
    }

    /// Replace descriptive attributes with a freshly bootstrapped copy.
    ///
    /// The spot history is kept: bootstrap data never carries history.
    pub fn refresh_from(&mut self, fresh: Kindergarten) {
        let history = std::mem::take(&mut self.spot_history);
        *self = Self {
            spot_history: history,
            ..fresh
        };
    }
}

/// Descriptive attributes fetched once per bootstrap from barnehagefakta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KindergartenDetails {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub alder: Option<String>,
    pub eierform: Option<String>,
    pub er_privat_barnehage: Option<bool>,
    pub besoks_adresse: Option<Address>,
    pub malform: Option<Malform>,
    pub apningstid_fra: Option<String>,
    pub apningstid_til: Option<String>,
    pub kostpenger: Option<f64>,
    pub pedagogisk_profil: Vec<String>,
    pub statistics: Statistics,
    pub staff: StaffShares,
    pub foreldreundersokelse: Option<ParentSurvey>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    pub adresselinje: Option<String>,
    pub postnr: Option<String>,
    pub poststed: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Malform {
    pub malform_type: Option<String>,
    pub malform_navn: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Statistics {
    pub antall_barn: Option<f64>,
    pub antall_barn_per_ansatt: Option<f64>,
    pub antall_barn_per_barnehagelaerer: Option<f64>,
    pub leke_og_oppholdsareal_per_barn: Option<f64>,
    pub total_antall_kvadratmeter: Option<f64>,
}

/// Staff composition, as percentages of all employees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaffShares {
    pub barnehagelaerer: Option<f64>,
    pub barne_og_ungdomsarbeiderfag: Option<f64>,
    pub tilsvarende_barnehagelaerer: Option<f64>,
    pub annen_hoyere_utdanning: Option<f64>,
    pub annen_pedagogisk_utdanning: Option<f64>,
    pub annen_fagarbeiderutdanning: Option<f64>,
    pub annen_bakgrunn: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParentSurvey {
    pub ute_og_inne_miljo: Option<f64>,
    pub barnets_utvikling: Option<f64>,
    pub barnets_trivsel: Option<f64>,
    pub informasjon: Option<f64>,
    pub tilfredshet: Option<f64>,
    pub antall_inviterte: Option<f64>,
    pub antall_besvarte: Option<f64>,
    pub svarprosent: Option<f64>,
    pub argang: Option<String>,
}
