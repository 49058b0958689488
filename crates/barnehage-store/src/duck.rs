//! DuckDB registry store.

use std::collections::BTreeMap;
use std::path::Path;

use barnehage_core::model::{AgeGroup, SpotStatus};
use barnehage_core::{Kindergarten, KindergartenDetails, RegistryStore, SpotId, SpotRecord};
use chrono::{DateTime, Utc};
use duckdb::{Connection, OptionalExt, Row, params};
use tracing::{debug, info};

use crate::StoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kindergartens (
    orgnr          VARCHAR PRIMARY KEY,
    navn           VARCHAR NOT NULL,
    lat            DOUBLE,
    lng            DOUBLE,
    fylkesnummer   VARCHAR,
    kommunenummer  VARCHAR,
    details        VARCHAR
);
CREATE TABLE IF NOT EXISTS spot_history (
    orgnr              VARCHAR NOT NULL,
    position           INTEGER NOT NULL,
    region             VARCHAR NOT NULL,
    discovered_at      BIGINT NOT NULL,
    last_seen_at       BIGINT NOT NULL,
    spots              BIGINT NOT NULL,
    age_group          VARCHAR NOT NULL,
    availability_date  VARCHAR NOT NULL,
    status             VARCHAR NOT NULL,
    spot_id            VARCHAR NOT NULL
);
";

const KINDERGARTEN_COLUMNS: &str =
    "orgnr, navn, lat, lng, fylkesnummer, kommunenummer, details";

const HISTORY_COLUMNS: &str = "orgnr, region, discovered_at, last_seen_at, spots, age_group, \
     availability_date, status, spot_id";

/// DuckDB-backed registry.
///
/// One row per kindergarten in `kindergartens` (details as JSON text) and one
/// row per history record in `spot_history`, ordered by `position`.
/// Timestamps are stored as Unix milliseconds.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
/// The connection is released by [`close`](RegistryStore::close); any call
/// after that returns [`StoreError::Closed`].
pub struct DuckStore {
    conn: Option<Connection>,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let store = Self::init(Connection::open(path)?)?;
        info!(path = %path.display(), "opened registry");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&self) -> Result<&Connection, StoreError> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }

    /// Number of kindergartens in the registry.
    pub fn count(&self) -> Result<usize, StoreError> {
        let count: i64 =
            self.conn()?
                .query_row("SELECT count(*)::BIGINT FROM kindergartens", [], |row| {
                    row.get(0)
                })?;
        Ok(count as usize)
    }

    // ── Reads ──

    fn load_history(
        &self,
        orgnr: Option<&str>,
    ) -> Result<BTreeMap<String, Vec<SpotRecord>>, StoreError> {
        let (sql, args): (String, Vec<&str>) = match orgnr {
            Some(orgnr) => (
                format!("SELECT {HISTORY_COLUMNS} FROM spot_history WHERE orgnr = ? ORDER BY position"),
                vec![orgnr],
            ),
            None => (
                format!("SELECT {HISTORY_COLUMNS} FROM spot_history ORDER BY orgnr, position"),
                Vec::new(),
            ),
        };
        let mut stmt = self.conn()?.prepare(&sql)?;
        let rows = stmt
            .query_map(duckdb::params_from_iter(args), HistoryRow::read)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut by_orgnr: BTreeMap<String, Vec<SpotRecord>> = BTreeMap::new();
        for row in rows {
            let orgnr = row.orgnr.clone();
            by_orgnr.entry(orgnr).or_default().push(row.into_record()?);
        }
        Ok(by_orgnr)
    }

    // ── Writes ──

    fn write(&mut self, kindergarten: &Kindergarten) -> Result<(), StoreError> {
        let details = kindergarten
            .details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let (lat, lng) = match kindergarten.koordinat_lat_lng {
            Some([lat, lng]) => (Some(lat), Some(lng)),
            None => (None, None),
        };

        let conn = self.conn.as_mut().ok_or(StoreError::Closed)?;
        let tx = conn.transaction()?;
        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO kindergartens ({KINDERGARTEN_COLUMNS}) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                kindergarten.orgnr,
                kindergarten.navn,
                lat,
                lng,
                kindergarten.fylkesnummer,
                kindergarten.kommunenummer,
                details,
            ],
        )?;
        tx.execute(
            "DELETE FROM spot_history WHERE orgnr = ?",
            [&kindergarten.orgnr],
        )?;
        for (position, record) in kindergarten.spot_history.iter().enumerate() {
            tx.execute(
                &format!(
                    "INSERT INTO spot_history (position, {HISTORY_COLUMNS}) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    position as i64,
                    kindergarten.orgnr,
                    record.region,
                    record.discovered_at.timestamp_millis(),
                    record.last_seen_at.timestamp_millis(),
                    i64::from(record.spots),
                    record.age_group.as_str(),
                    record.availability_date,
                    record.status.as_str(),
                    record.spot_id.as_str(),
                ],
            )?;
        }
        tx.commit()?;
        debug!(
            orgnr = %kindergarten.orgnr,
            records = kindergarten.spot_history.len(),
            "saved kindergarten"
        );
        Ok(())
    }
}

impl RegistryStore for DuckStore {
    type Error = StoreError;

    fn find_all(&self) -> Result<Vec<Kindergarten>, StoreError> {
        let sql = format!("SELECT {KINDERGARTEN_COLUMNS} FROM kindergartens ORDER BY orgnr");
        let mut stmt = self.conn()?.prepare(&sql)?;
        let rows = stmt
            .query_map([], KindergartenRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        let mut histories = self.load_history(None)?;

        rows.into_iter()
            .map(|row| {
                let history = histories.remove(&row.orgnr).unwrap_or_default();
                row.into_kindergarten(history)
            })
            .collect()
    }

    fn find_by_id(&self, orgnr: &str) -> Result<Option<Kindergarten>, StoreError> {
        let sql = format!("SELECT {KINDERGARTEN_COLUMNS} FROM kindergartens WHERE orgnr = ?");
        let row = self
            .conn()?
            .query_row(&sql, [orgnr], KindergartenRow::read)
            .optional()?;
        let Some(row) = row else {
            return Ok(None);
        };
        let history = self.load_history(Some(orgnr))?.remove(orgnr).unwrap_or_default();
        row.into_kindergarten(history).map(Some)
    }

    fn save(&mut self, kindergarten: &Kindergarten) -> Result<(), StoreError> {
        self.write(kindergarten)
    }

    fn close(&mut self) -> Result<(), StoreError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, err)| err)?;
            info!("closed registry");
        }
        Ok(())
    }
}

// ── Row mapping ──

struct KindergartenRow {
    orgnr: String,
    navn: String,
    lat: Option<f64>,
    lng: Option<f64>,
    fylkesnummer: Option<String>,
    kommunenummer: Option<String>,
    details: Option<String>,
}

impl KindergartenRow {
    fn read(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            orgnr: row.get(0)?,
            navn: row.get(1)?,
            lat: row.get(2)?,
            lng: row.get(3)?,
            fylkesnummer: row.get(4)?,
            kommunenummer: row.get(5)?,
            details: row.get(6)?,
        })
    }

    fn into_kindergarten(self, spot_history: Vec<SpotRecord>) -> Result<Kindergarten, StoreError> {
        let details = self
            .details
            .as_deref()
            .map(serde_json::from_str::<KindergartenDetails>)
            .transpose()?;
        Ok(Kindergarten {
            koordinat_lat_lng: self.lat.zip(self.lng).map(|(lat, lng)| [lat, lng]),
            orgnr: self.orgnr,
            navn: self.navn,
            fylkesnummer: self.fylkesnummer,
            kommunenummer: self.kommunenummer,
            details,
            spot_history,
        })
    }
}

struct HistoryRow {
    orgnr: String,
    region: String,
    discovered_at: i64,
    last_seen_at: i64,
    spots: i64,
    age_group: String,
    availability_date: String,
    status: String,
    spot_id: String,
}

impl HistoryRow {
    fn read(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            orgnr: row.get(0)?,
            region: row.get(1)?,
            discovered_at: row.get(2)?,
            last_seen_at: row.get(3)?,
            spots: row.get(4)?,
            age_group: row.get(5)?,
            availability_date: row.get(6)?,
            status: row.get(7)?,
            spot_id: row.get(8)?,
        })
    }

    fn into_record(self) -> Result<SpotRecord, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            orgnr: self.orgnr.clone(),
            reason,
        };
        let timestamp = |millis: i64| {
            DateTime::<Utc>::from_timestamp_millis(millis)
                .ok_or_else(|| corrupt(format!("timestamp out of range: {millis}")))
        };

        Ok(SpotRecord {
            discovered_at: timestamp(self.discovered_at)?,
            last_seen_at: timestamp(self.last_seen_at)?,
            spots: u32::try_from(self.spots)
                .map_err(|_| corrupt(format!("spot count out of range: {}", self.spots)))?,
            age_group: self
                .age_group
                .parse::<AgeGroup>()
                .map_err(|e| corrupt(e.to_string()))?,
            status: self
                .status
                .parse::<SpotStatus>()
                .map_err(|e| corrupt(e.to_string()))?,
            region: self.region,
            availability_date: self.availability_date,
            spot_id: SpotId::from(self.spot_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barnehage_core::model::Address;
    use barnehage_core::run_reconciliation;
    use barnehage_core::{Observation, apply_bootstrap};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap()
    }

    fn sample() -> Kindergarten {
        let mut k = Kindergarten::new("974589095", "Eksempel Barnehage");
        k.koordinat_lat_lng = Some([59.9139, 10.7522]);
        k.fylkesnummer = Some("03".into());
        k.kommunenummer = Some("0301".into());
        k.details = Some(KindergartenDetails {
            kind: Some("Ordinær".into()),
            pedagogisk_profil: vec!["Natur".into(), "Friluft".into()],
            besoks_adresse: Some(Address {
                adresselinje: Some("Eksempelveien 1".into()),
                postnr: Some("0150".into()),
                poststed: Some("Oslo".into()),
            }),
            ..Default::default()
        });
        k.spot_history.push(SpotRecord {
            region: "Frogner".into(),
            discovered_at: t0(),
            last_seen_at: t0() + Duration::hours(2),
            spots: 2,
            age_group: AgeGroup::Under3,
            availability_date: "now".into(),
            status: SpotStatus::Available,
            spot_id: SpotId::derive("Eksempel Barnehage", AgeGroup::Under3, "now"),
        });
        k.spot_history.push(SpotRecord {
            region: "Frogner".into(),
            discovered_at: t0(),
            last_seen_at: t0(),
            spots: 1,
            age_group: AgeGroup::Over3,
            availability_date: "August 2025".into(),
            status: SpotStatus::Taken,
            spot_id: SpotId::derive("Eksempel Barnehage", AgeGroup::Over3, "August 2025"),
        });
        k
    }

    #[test]
    fn open_in_memory() {
        let store = DuckStore::open().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.find_all().unwrap().is_empty());
    }

    #[test]
    fn save_and_find_round_trip() {
        let mut store = DuckStore::open().unwrap();
        let k = sample();
        store.save(&k).unwrap();

        assert_eq!(store.find_by_id("974589095").unwrap(), Some(k.clone()));
        assert_eq!(store.find_all().unwrap(), vec![k]);
        assert_eq!(store.find_by_id("000000000").unwrap(), None);
    }

    #[test]
    fn save_replaces_entity_and_history() {
        let mut store = DuckStore::open().unwrap();
        let mut k = sample();
        store.save(&k).unwrap();

        k.navn = "Eksempel Barnehage AS".into();
        k.spot_history.truncate(1);
        k.details = None;
        k.koordinat_lat_lng = None;
        store.save(&k).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.find_by_id(&k.orgnr).unwrap(), Some(k));
    }

    #[test]
    fn find_all_groups_history_per_entity() {
        let mut store = DuckStore::open().unwrap();
        store.save(&sample()).unwrap();
        store.save(&Kindergarten::new("111111111", "Solbakken Barnehage")).unwrap();

        let all = store.find_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].orgnr, "111111111");
        assert!(all[0].spot_history.is_empty());
        assert_eq!(all[1].spot_history.len(), 2);
    }

    #[test]
    fn persistent_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.duckdb");

        let mut store = DuckStore::open_persistent(&path).unwrap();
        store.save(&sample()).unwrap();
        store.close().unwrap();

        let store = DuckStore::open_persistent(&path).unwrap();
        assert_eq!(store.find_all().unwrap(), vec![sample()]);
    }

    #[test]
    fn close_is_idempotent() {
        let mut store = DuckStore::open().unwrap();
        store.close().unwrap();
        store.close().unwrap();

        assert!(matches!(store.find_all(), Err(StoreError::Closed)));
        assert!(matches!(store.find_by_id("1"), Err(StoreError::Closed)));
        assert!(matches!(store.save(&sample()), Err(StoreError::Closed)));
        assert!(matches!(store.count(), Err(StoreError::Closed)));
    }

    #[test]
    fn reconcile_then_disappear() {
        let mut store = DuckStore::open().unwrap();
        apply_bootstrap(&mut store, [Kindergarten::new("974589095", "Eksempel Barnehage")])
            .unwrap();

        let observation = Observation {
            region: "Frogner".into(),
            last_updated: "1 March 2025".into(),
            kindergarten: "Eksempel Barnehage".into(),
            spots: 2,
            age_group: AgeGroup::Under3,
            availability_date: "now".into(),
        };
        let report = run_reconciliation(&mut store, &[observation], t0()).unwrap();
        assert_eq!(report.appended(), 1);
        let stored = store.find_by_id("974589095").unwrap().unwrap();
        assert_eq!(stored.spot_history[0].status, SpotStatus::Available);

        let t1 = t0() + Duration::days(1);
        let report = run_reconciliation(&mut store, &[], t1).unwrap();
        assert_eq!(report.taken(), 1);
        let stored = store.find_by_id("974589095").unwrap().unwrap();
        assert_eq!(stored.spot_history.len(), 1);
        assert_eq!(stored.spot_history[0].status, SpotStatus::Taken);
        assert_eq!(stored.spot_history[0].last_seen_at, t1);
    }

    #[test]
    fn rebootstrap_keeps_history() {
        let mut store = DuckStore::open().unwrap();
        store.save(&sample()).unwrap();

        let mut fresh = Kindergarten::new("974589095", "Eksempel Barnehage");
        fresh.kommunenummer = Some("0301".into());
        let created = apply_bootstrap(&mut store, [fresh]).unwrap();

        assert_eq!(created, 0);
        let stored = store.find_by_id("974589095").unwrap().unwrap();
        assert_eq!(stored.spot_history, sample().spot_history);
        assert!(stored.details.is_none());
    }
}
