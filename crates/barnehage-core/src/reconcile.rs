//! Spot reconciliation.
//!
//! Diffs one run's observations against the registry histories:
//!
//! 1. Each observation is resolved to a kindergarten by fuzzy name match and
//!    fingerprinted as `(canonical name, age group, date)`.
//! 2. An `available` record with that fingerprint is refreshed; otherwise a
//!    new `available` record is appended. A fingerprint whose earlier records
//!    are all `taken` therefore opens a fresh record.
//! 3. Every `available` record not seen in this run becomes `taken`.
//!
//! Records are never removed. Running the same observations twice only
//! advances `last_seen_at`.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::diagnostics::MappingError;
use crate::matcher::EntityMatcher;
use crate::model::{Kindergarten, Observation, SpotRecord, SpotStatus};
use crate::spot_id::SpotId;

/// One change made to a history. `index` points into `spot_history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum HistoryMutation {
    Appended {
        orgnr: String,
        spot_id: SpotId,
        index: usize,
    },
    Refreshed {
        orgnr: String,
        spot_id: SpotId,
        index: usize,
    },
    Taken {
        orgnr: String,
        spot_id: SpotId,
        index: usize,
    },
}

impl HistoryMutation {
    pub fn orgnr(&self) -> &str {
        match self {
            Self::Appended { orgnr, .. } | Self::Refreshed { orgnr, .. } | Self::Taken { orgnr, .. } => {
                orgnr
            }
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ReconcileReport {
    pub mutations: Vec<HistoryMutation>,
    /// `orgnr` of every kindergarten changed by the run, once each, in
    /// registry order.
    pub touched: Vec<String>,
    pub errors: Vec<MappingError>,
}

impl ReconcileReport {
    pub fn appended(&self) -> usize {
        self.count(|m| matches!(m, HistoryMutation::Appended { .. }))
    }

    pub fn refreshed(&self) -> usize {
        self.count(|m| matches!(m, HistoryMutation::Refreshed { .. }))
    }

    pub fn taken(&self) -> usize {
        self.count(|m| matches!(m, HistoryMutation::Taken { .. }))
    }

    fn count(&self, f: impl Fn(&HistoryMutation) -> bool) -> usize {
        self.mutations.iter().filter(|m| f(m)).count()
    }
}

/// Apply one run's observations to `registry` in place.
///
/// Unmatched observations are reported as `FuzzyMatchError` and skipped.
pub fn reconcile(
    registry: &mut [Kindergarten],
    observations: &[Observation],
    now: DateTime<Utc>,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let mut seen: HashMap<usize, HashSet<SpotId>> = HashMap::new();

    let resolved: Vec<Result<usize, MappingError>> = {
        let matcher = EntityMatcher::new(registry.iter().map(|k| k.navn.as_str()));
        observations
            .iter()
            .map(|obs| matcher.resolve(&obs.kindergarten).map(|best| best.index))
            .collect()
    };

    for (obs, resolution) in observations.iter().zip(resolved) {
        let slot = match resolution {
            Ok(slot) => slot,
            Err(err) => {
                warn!(kindergarten = %obs.kindergarten, "no confident registry match");
                report.errors.push(err);
                continue;
            }
        };

        let entity = &mut registry[slot];
        let spot_id = SpotId::derive(&entity.navn, obs.age_group, &obs.availability_date);
        seen.entry(slot).or_default().insert(spot_id.clone());

        let existing = entity
            .spot_history
            .iter()
            .position(|r| r.spot_id == spot_id && r.is_available());

        let mutation = match existing {
            Some(index) => {
                entity.spot_history[index].last_seen_at = now;
                HistoryMutation::Refreshed {
                    orgnr: entity.orgnr.clone(),
                    spot_id,
                    index,
                }
            }
            None => {
                entity.spot_history.push(SpotRecord {
                    region: obs.region.clone(),
                    discovered_at: now,
                    last_seen_at: now,
                    spots: obs.spots,
                    age_group: obs.age_group,
                    availability_date: obs.availability_date.clone(),
                    status: SpotStatus::Available,
                    spot_id: spot_id.clone(),
                });
                debug!(orgnr = %entity.orgnr, %spot_id, "new spot");
                HistoryMutation::Appended {
                    orgnr: entity.orgnr.clone(),
                    spot_id,
                    index: entity.spot_history.len() - 1,
                }
            }
        };
        report.mutations.push(mutation);
    }

    // ── Sweep ──

    for (slot, entity) in registry.iter_mut().enumerate() {
        let seen_here = seen.get(&slot);
        for (index, record) in entity.spot_history.iter_mut().enumerate() {
            if !record.is_available() || seen_here.is_some_and(|ids| ids.contains(&record.spot_id)) {
                continue;
            }
            record.status = SpotStatus::Taken;
            record.last_seen_at = now;
            debug!(orgnr = %entity.orgnr, spot_id = %record.spot_id, "spot taken");
            report.mutations.push(HistoryMutation::Taken {
                orgnr: entity.orgnr.clone(),
                spot_id: record.spot_id.clone(),
                index,
            });
        }
    }

    let touched: HashSet<&str> = report.mutations.iter().map(HistoryMutation::orgnr).collect();
    report.touched = registry
        .iter()
        .map(|k| k.orgnr.as_str())
        .filter(|orgnr| touched.contains(orgnr))
        .map(str::to_string)
        .collect();

    report
}
