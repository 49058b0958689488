//! Registry store port and the runs that drive it.
//!
//! The store itself lives in `barnehage-store`; this module only states what
//! a run needs from it and wires the pure reconciliation step to it.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::model::{Kindergarten, Observation};
use crate::reconcile::{self, ReconcileReport};

/// Durable keyed storage for kindergartens and their histories.
pub trait RegistryStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Every kindergarten with its current history.
    fn find_all(&self) -> Result<Vec<Kindergarten>, Self::Error>;

    fn find_by_id(&self, orgnr: &str) -> Result<Option<Kindergarten>, Self::Error>;

    /// Insert or replace one kindergarten, history included, keyed by `orgnr`.
    fn save(&mut self, kindergarten: &Kindergarten) -> Result<(), Self::Error>;

    /// Release the underlying handle. Calling it again is a no-op.
    fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Reconcile one scrape against the stored registry.
///
/// The registry is loaded once; every kindergarten changed by the run is
/// saved exactly once afterwards. Store failures abort the run.
pub fn run_reconciliation<S: RegistryStore>(
    store: &mut S,
    observations: &[Observation],
    now: DateTime<Utc>,
) -> Result<ReconcileReport, S::Error> {
    let mut registry = store.find_all()?;
    info!(
        kindergartens = registry.len(),
        observations = observations.len(),
        "reconciling availability"
    );

    let report = reconcile::reconcile(&mut registry, observations, now);

    for kindergarten in registry
        .iter()
        .filter(|k| report.touched.contains(&k.orgnr))
    {
        store.save(kindergarten)?;
    }

    if !report.errors.is_empty() {
        warn!(count = report.errors.len(), "mapping errors during reconciliation");
    }
    info!(
        appended = report.appended(),
        refreshed = report.refreshed(),
        taken = report.taken(),
        saved = report.touched.len(),
        "reconciliation complete"
    );
    Ok(report)
}

/// Upsert bootstrapped kindergartens by `orgnr`.
///
/// Existing entries get their descriptive attributes replaced and keep their
/// spot history. Returns how many entries were new.
pub fn apply_bootstrap<S, I>(store: &mut S, kindergartens: I) -> Result<usize, S::Error>
where
    S: RegistryStore,
    I: IntoIterator<Item = Kindergarten>,
{
    let mut created = 0;
    for fresh in kindergartens {
        let entry = match store.find_by_id(&fresh.orgnr)? {
            Some(mut existing) => {
                existing.refresh_from(fresh);
                existing
            }
            None => {
                created += 1;
                fresh
            }
        };
        store.save(&entry)?;
        info!(orgnr = %entry.orgnr, navn = %entry.navn, "processed kindergarten");
    }
    Ok(created)
}
