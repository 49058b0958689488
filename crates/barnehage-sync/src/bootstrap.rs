//! Registry bootstrap from the barnehagefakta.no API.
//!
//! Lists every kindergarten in a municipality, then fetches details per
//! kindergarten. A failed detail fetch degrades that entry to the list
//! fields rather than failing the bootstrap.

use std::time::Duration;

use barnehage_core::Kindergarten;
use barnehage_core::model::{
    Address, KindergartenDetails, Malform, ParentSurvey, StaffShares, Statistics,
};
use futures::{StreamExt, stream};
use serde::Deserialize;
use tracing::{info, warn};

use crate::http::{SyncError, get_text};

pub const DEFAULT_API_URL: &str = "https://www.barnehagefakta.no";

/// Oslo.
pub const DEFAULT_KOMMUNE: &str = "0301";

// ── Wire types ──

/// One entry of `/api/Location/kommune/{kommunenummer}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationEntry {
    pub orgnr: String,
    pub navn: String,
    pub koordinat_lat_lng: Option<[f64; 2]>,
    pub fylkesnummer: Option<String>,
    pub kommunenummer: Option<String>,
}

/// `/api/Barnehage/orgnr/{orgnr}`, reduced to the fields kept.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BarnehageDetails {
    pub koordinat_lat_lng: Option<[f64; 2]>,
    pub fylke: Option<Fylke>,
    pub kommune: Option<Kommune>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub alder: Option<String>,
    pub eierform: Option<String>,
    pub er_privat_barnehage: Option<bool>,
    pub kontaktinformasjon: Option<Kontaktinformasjon>,
    pub malform: Option<Malform>,
    pub apningstid_fra: Option<String>,
    pub apningstid_til: Option<String>,
    pub kostpenger: Option<f64>,
    pub pedagogisk_profil: Option<PedagogiskProfil>,
    pub indikator_data_barnehage: Option<Indikatorer>,
    pub total_antall_kvadratmeter: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fylke {
    pub fylkesnummer: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Kommune {
    pub kommunenummer: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Kontaktinformasjon {
    pub besoks_adresse: Option<Address>,
}

/// The API sends a single profile as a bare string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PedagogiskProfil {
    One(String),
    Many(Vec<String>),
}

impl PedagogiskProfil {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(profile) => vec![profile],
            Self::Many(profiles) => profiles,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Indikatorer {
    pub antall_barn: Option<f64>,
    pub antall_barn_per_ansatt: Option<f64>,
    pub antall_barn_per_barnehagelaerer: Option<f64>,
    pub leke_og_oppholdsareal_per_barn: Option<f64>,
    pub andel_ansatte_barnehagelarer: Option<f64>,
    pub andel_ansatte_med_barne_og_ungdomsarbeiderfag: Option<f64>,
    pub andel_ansatte_tilsvarende_barnehagelaerer: Option<f64>,
    pub andel_ansatte_med_annen_hoyere_utdanning: Option<f64>,
    pub andel_ansatte_med_annen_pedagogisk_utdanning: Option<f64>,
    pub andel_ansatte_med_annen_fagarbeiderutdanning: Option<f64>,
    pub andel_ansatte_med_annen_bakgrunn: Option<f64>,
    pub foreldreundersokelsen_ute_og_inne_miljo: Option<f64>,
    pub foreldreundersokelsen_barnets_utvikling: Option<f64>,
    pub foreldreundersokelsen_barnets_trivsel: Option<f64>,
    pub foreldreundersokelsen_informasjon: Option<f64>,
    pub foreldreundersokelsen_tilfredshet: Option<f64>,
    pub foreldreundersokelsen_antall_inviterte: Option<f64>,
    pub foreldreundersokelsen_antall_besvarte: Option<f64>,
    pub foreldreundersokelsen_svarprosent: Option<f64>,
    pub foreldreundersokelsen_argang: Option<String>,
}

// ── Mapping ──

/// Build a registry entry from a list entry and its details, if any.
///
/// Name and `orgnr` always come from the list entry. Location fields prefer
/// the details and fall back to the list entry.
pub fn map_kindergarten(base: LocationEntry, details: Option<BarnehageDetails>) -> Kindergarten {
    let mut kindergarten = Kindergarten::new(base.orgnr, base.navn);
    kindergarten.koordinat_lat_lng = base.koordinat_lat_lng;
    kindergarten.fylkesnummer = base.fylkesnummer;
    kindergarten.kommunenummer = base.kommunenummer;

    let Some(d) = details else {
        return kindergarten;
    };

    if d.koordinat_lat_lng.is_some() {
        kindergarten.koordinat_lat_lng = d.koordinat_lat_lng;
    }
    if let Some(nr) = d.fylke.and_then(|f| f.fylkesnummer) {
        kindergarten.fylkesnummer = Some(nr);
    }
    if let Some(nr) = d.kommune.and_then(|k| k.kommunenummer) {
        kindergarten.kommunenummer = Some(nr);
    }

    let ind = d.indikator_data_barnehage.unwrap_or_default();
    let survey = ParentSurvey {
        ute_og_inne_miljo: ind.foreldreundersokelsen_ute_og_inne_miljo,
        barnets_utvikling: ind.foreldreundersokelsen_barnets_utvikling,
        barnets_trivsel: ind.foreldreundersokelsen_barnets_trivsel,
        informasjon: ind.foreldreundersokelsen_informasjon,
        tilfredshet: ind.foreldreundersokelsen_tilfredshet,
        antall_inviterte: ind.foreldreundersokelsen_antall_inviterte,
        antall_besvarte: ind.foreldreundersokelsen_antall_besvarte,
        svarprosent: ind.foreldreundersokelsen_svarprosent,
        argang: ind.foreldreundersokelsen_argang,
    };

    kindergarten.details = Some(KindergartenDetails {
        kind: d.kind,
        alder: d.alder,
        eierform: d.eierform,
        er_privat_barnehage: d.er_privat_barnehage,
        besoks_adresse: d.kontaktinformasjon.and_then(|k| k.besoks_adresse),
        malform: d.malform,
        apningstid_fra: d.apningstid_fra,
        apningstid_til: d.apningstid_til,
        kostpenger: d.kostpenger,
        pedagogisk_profil: d
            .pedagogisk_profil
            .map(PedagogiskProfil::into_vec)
            .unwrap_or_default(),
        statistics: Statistics {
            antall_barn: ind.antall_barn,
            antall_barn_per_ansatt: ind.antall_barn_per_ansatt,
            antall_barn_per_barnehagelaerer: ind.antall_barn_per_barnehagelaerer,
            leke_og_oppholdsareal_per_barn: ind.leke_og_oppholdsareal_per_barn,
            total_antall_kvadratmeter: d.total_antall_kvadratmeter,
        },
        staff: StaffShares {
            barnehagelaerer: ind.andel_ansatte_barnehagelarer,
            barne_og_ungdomsarbeiderfag: ind.andel_ansatte_med_barne_og_ungdomsarbeiderfag,
            tilsvarende_barnehagelaerer: ind.andel_ansatte_tilsvarende_barnehagelaerer,
            annen_hoyere_utdanning: ind.andel_ansatte_med_annen_hoyere_utdanning,
            annen_pedagogisk_utdanning: ind.andel_ansatte_med_annen_pedagogisk_utdanning,
            annen_fagarbeiderutdanning: ind.andel_ansatte_med_annen_fagarbeiderutdanning,
            annen_bakgrunn: ind.andel_ansatte_med_annen_bakgrunn,
        },
        foreldreundersokelse: Some(survey),
    });
    kindergarten
}

// ── Client ──

/// HTTP client for the barnehagefakta.no API.
pub struct BootstrapClient {
    client: reqwest::Client,
    base_url: String,
    kommune: String,
    delay: Duration,
    concurrency: usize,
}

impl BootstrapClient {
    /// Create a client for the given API base URL.
    ///
    /// `base_url` should be like `https://www.barnehagefakta.no` (a trailing
    /// slash is trimmed). Defaults to Oslo, one request at a time and 100 ms
    /// between detail requests.
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            kommune: DEFAULT_KOMMUNE.to_string(),
            delay: Duration::from_millis(100),
            concurrency: 1,
        }
    }

    pub fn with_kommune(mut self, kommune: String) -> Self {
        self.kommune = kommune;
        self
    }

    /// At most `concurrency` detail requests in flight, each preceded by
    /// `delay`.
    pub fn with_rate(mut self, concurrency: usize, delay: Duration) -> Self {
        self.concurrency = concurrency.max(1);
        self.delay = delay;
        self
    }

    /// Every kindergarten listed for the configured municipality.
    pub async fn list(&self) -> Result<Vec<LocationEntry>, SyncError> {
        let url = format!("{}/api/Location/kommune/{}", self.base_url, self.kommune);
        info!(url = %url, "fetching kindergarten list");
        let body = get_text(&self.client, &url).await?;
        let entries: Vec<LocationEntry> = serde_json::from_str(&body)?;
        info!(count = entries.len(), "fetched kindergarten list");
        Ok(entries)
    }

    /// Details for one kindergarten.
    pub async fn details(&self, orgnr: &str) -> Result<BarnehageDetails, SyncError> {
        let url = format!("{}/api/Barnehage/orgnr/{orgnr}", self.base_url);
        let body = get_text(&self.client, &url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// List, fetch details and map every kindergarten, keeping list order.
    ///
    /// Only a failed list request is an error.
    pub async fn bootstrap(&self) -> Result<Vec<Kindergarten>, SyncError> {
        let entries = self.list().await?;
        let kindergartens = stream::iter(entries)
            .map(|entry| async move {
                tokio::time::sleep(self.delay).await;
                info!(orgnr = %entry.orgnr, navn = %entry.navn, "fetching details");
                let details = match self.details(&entry.orgnr).await {
                    Ok(details) => Some(details),
                    Err(err) => {
                        warn!(orgnr = %entry.orgnr, error = %err, "detail fetch failed, keeping list fields");
                        None
                    }
                };
                map_kindergarten(entry, details)
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;
        Ok(kindergartens)
    }
}
