//! In-memory registry store.

use std::collections::BTreeMap;

use barnehage_core::{Kindergarten, RegistryStore};

use crate::StoreError;

/// Registry kept in a map keyed by `orgnr`. Nothing survives the process.
///
/// `find_all` returns entries in `orgnr` order, as the DuckDB store does.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Option<BTreeMap<String, Kindergarten>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Some(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> Result<&BTreeMap<String, Kindergarten>, StoreError> {
        self.entries.as_ref().ok_or(StoreError::Closed)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Kindergarten> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = Kindergarten>>(iter: I) -> Self {
        Self {
            entries: Some(iter.into_iter().map(|k| (k.orgnr.clone(), k)).collect()),
        }
    }
}

impl RegistryStore for MemoryStore {
    type Error = StoreError;

    fn find_all(&self) -> Result<Vec<Kindergarten>, StoreError> {
        Ok(self.entries()?.values().cloned().collect())
    }

    fn find_by_id(&self, orgnr: &str) -> Result<Option<Kindergarten>, StoreError> {
        Ok(self.entries()?.get(orgnr).cloned())
    }

    fn save(&mut self, kindergarten: &Kindergarten) -> Result<(), StoreError> {
        let entries = self.entries.as_mut().ok_or(StoreError::Closed)?;
        entries.insert(kindergarten.orgnr.clone(), kindergarten.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.entries = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_is_an_upsert() {
        let mut store = MemoryStore::new();
        store.save(&Kindergarten::new("111", "Eksempel")).unwrap();
        store.save(&Kindergarten::new("111", "Eksempel Barnehage")).unwrap();

        assert_eq!(store.len(), 1);
        let found = store.find_by_id("111").unwrap().unwrap();
        assert_eq!(found.navn, "Eksempel Barnehage");
        assert!(store.find_by_id("999").unwrap().is_none());
    }

    #[test]
    fn find_all_is_ordered_by_orgnr() {
        let store: MemoryStore = [
            Kindergarten::new("300", "C"),
            Kindergarten::new("100", "A"),
            Kindergarten::new("200", "B"),
        ]
        .into_iter()
        .collect();

        let names: Vec<String> = store.find_all().unwrap().into_iter().map(|k| k.navn).collect();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[test]
    fn close_is_idempotent_and_final() {
        let mut store = MemoryStore::new();
        store.close().unwrap();
        store.close().unwrap();
        assert!(matches!(store.find_all(), Err(StoreError::Closed)));
        assert!(matches!(
            store.save(&Kindergarten::new("1", "A")),
            Err(StoreError::Closed)
        ));
    }
}
