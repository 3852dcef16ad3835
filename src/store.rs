//! Persistence for meal maps and the read-only lot/unit catalog.

use crate::config::StoreConfig;
use crate::error::{MealMapError, Result};
use crate::schema::{Lot, MealRecord, RecordIdentity, Unit};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

/// Every stored meal map plus the revision it was read at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    #[serde(default)]
    pub revision: u64,
    #[serde(rename = "mapas", default)]
    pub records: Vec<MealRecord>,
}

impl RecordSet {
    pub fn position(&self, identity: &RecordIdentity) -> Option<usize> {
        self.records.iter().position(|r| identity.matches(r))
    }

    pub fn find(&self, identity: &RecordIdentity) -> Option<&MealRecord> {
        self.records.iter().find(|r| identity.matches(r))
    }

    pub fn remove(&mut self, identity: &RecordIdentity) -> Option<MealRecord> {
        self.position(identity).map(|idx| self.records.remove(idx))
    }

    pub fn next_id(&self) -> u64 {
        self.records.iter().map(|r| r.id).max().unwrap_or(0) + 1
    }
}

pub trait RecordStore {
    fn load(&self) -> Result<RecordSet>;

    /// Persists `set` if the store is still at `set.revision`.
    ///
    /// Returns the new revision. Fails with `ConcurrentModification` when
    /// another writer saved in between.
    fn save(&self, set: &RecordSet) -> Result<u64>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RefCell<RecordSet>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<MealRecord>) -> Self {
        Self {
            state: RefCell::new(RecordSet {
                revision: 0,
                records,
            }),
        }
    }
}

impl RecordStore for MemoryStore {
    fn load(&self) -> Result<RecordSet> {
        Ok(self.state.borrow().clone())
    }

    fn save(&self, set: &RecordSet) -> Result<u64> {
        let mut state = self.state.borrow_mut();
        if state.revision != set.revision {
            return Err(MealMapError::ConcurrentModification {
                expected: set.revision,
                found: state.revision,
            });
        }
        *state = RecordSet {
            revision: set.revision + 1,
            records: set.records.clone(),
        };
        Ok(state.revision)
    }
}

/// Record set kept in a single pretty-printed JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.records_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn stored_revision(&self) -> Result<u64> {
        Ok(read_json_or_default::<RecordSet>(&self.path)?.revision)
    }
}

impl RecordStore for JsonFileStore {
    fn load(&self) -> Result<RecordSet> {
        let set: RecordSet = read_json_or_default(&self.path)?;
        debug!(
            "Loaded {} meal maps (revision {}) from {}",
            set.records.len(),
            set.revision,
            self.path.display()
        );
        Ok(set)
    }

    fn save(&self, set: &RecordSet) -> Result<u64> {
        let found = self.stored_revision()?;
        if found != set.revision {
            return Err(MealMapError::ConcurrentModification {
                expected: set.revision,
                found,
            });
        }

        let next = RecordSet {
            revision: set.revision + 1,
            records: set.records.clone(),
        };
        write_json_atomically(&self.path, &next).map_err(|e| {
            MealMapError::PersistenceFailed(format!("{}: {}", self.path.display(), e))
        })?;

        info!(
            "Saved {} meal maps to {} (revision {})",
            next.records.len(),
            self.path.display(),
            next.revision
        );
        Ok(next.revision)
    }
}

fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match fs::read_to_string(path) {
        Ok(raw) if raw.trim().is_empty() => Ok(T::default()),
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

fn write_json_atomically<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let written = fs::write(&tmp, serde_json::to_string_pretty(value)?)
        .and_then(|_| fs::rename(&tmp, path));
    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            debug!("Could not remove {}: {}", tmp.display(), cleanup);
        }
        return Err(e.into());
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct LotFile {
    #[serde(rename = "lotes", default)]
    lots: Vec<Lot>,
}

#[derive(Debug, Default, Deserialize)]
struct UnitFile {
    #[serde(rename = "unidades", default)]
    units: Vec<Unit>,
}

/// Lots and units, owned elsewhere and only read here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub lots: Vec<Lot>,
    pub units: Vec<Unit>,
}

impl Catalog {
    pub fn new(lots: Vec<Lot>, units: Vec<Unit>) -> Self {
        Self { lots, units }
    }

    pub fn load(config: &StoreConfig) -> Result<Self> {
        let lots: LotFile = read_json_or_default(&config.lots_path())?;
        let units: UnitFile = read_json_or_default(&config.units_path())?;
        Ok(Self::new(lots.lots, units.units))
    }

    pub fn lot(&self, lot_id: u32) -> Result<&Lot> {
        self.lots
            .iter()
            .find(|l| l.id == lot_id)
            .ok_or(MealMapError::LotNotFound(lot_id))
    }

    /// Names of the units a lot covers, in the lot's order. Unknown unit ids are skipped.
    pub fn units_of_lot(&self, lot_id: u32) -> Result<Vec<String>> {
        let lot = self.lot(lot_id)?;
        Ok(lot
            .unit_ids
            .iter()
            .filter_map(|id| self.units.iter().find(|u| u.id == *id))
            .map(|u| u.name.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DeviationSeries, MealSeries};

    fn record(id: u64, unit: &str) -> MealRecord {
        MealRecord {
            id,
            lot_id: 1,
            unit_name: unit.to_string(),
            month: 3,
            year: 2025,
            dates: vec![],
            created_at: None,
            siisp_updated_at: None,
            meals: MealSeries::default(),
            siisp_reference: vec![],
            deviations: DeviationSeries::default(),
        }
    }

    #[test]
    fn test_next_id() {
        let mut set = RecordSet::default();
        assert_eq!(set.next_id(), 1);
        set.records = vec![record(4, "A"), record(2, "B")];
        assert_eq!(set.next_id(), 5);
    }

    #[test]
    fn test_memory_store_rejects_stale_revision() {
        let store = MemoryStore::new();
        let first = store.load().unwrap();
        let second = store.load().unwrap();

        let mut changed = first.clone();
        changed.records.push(record(1, "A"));
        assert_eq!(store.save(&changed).unwrap(), 1);

        assert!(matches!(
            store.save(&second),
            Err(MealMapError::ConcurrentModification {
                expected: 0,
                found: 1
            })
        ));
    }

    #[test]
    fn test_json_store_round_trip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("mapas.json"));

        let empty = store.load().unwrap();
        assert_eq!(empty, RecordSet::default());

        let mut set = empty;
        set.records.push(record(1, "A"));
        assert_eq!(store.save(&set).unwrap(), 1);

        let loaded = store.load().unwrap();
        assert_eq!(loaded.revision, 1);
        assert_eq!(loaded.records, set.records);
        assert!(!dir.path().join("nested").join("mapas.json.tmp").exists());
    }

    #[test]
    fn test_json_store_reads_legacy_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapas.json");
        fs::write(
            &path,
            r#"{"mapas": [{"id": 3, "lote_id": 1, "nome_unidade": "A", "mes": 3, "ano": 2025}]}"#,
        )
        .unwrap();

        let set = JsonFileStore::new(&path).load().unwrap();
        assert_eq!(set.revision, 0);
        assert_eq!(set.records[0].id, 3);
    }

    #[test]
    fn test_failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("mapas.json");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("occupied"), "x").unwrap();

        let result = write_json_atomically(&target, &RecordSet::default());
        assert!(matches!(result, Err(MealMapError::IoError(_))));
        assert!(!dir.path().join("mapas.json.tmp").exists());
        assert!(target.join("occupied").exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapas.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonFileStore::new(&path).load(),
            Err(MealMapError::SerializationError(_))
        ));
    }

    #[test]
    fn test_catalog_units_of_lot() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::with_data_dir(dir.path());
        fs::write(
            config.lots_path(),
            r#"{"lotes": [{"id": 1, "nome": "Lote 1", "unidades": [2, 9, 1],
                "precos": {"cafe": {"interno": 4.5, "funcionario": 5.0}}}]}"#,
        )
        .unwrap();
        fs::write(
            config.units_path(),
            r#"{"unidades": [{"id": 1, "nome": "CPP Norte"}, {"id": 2, "nome": "CPP Sul"}]}"#,
        )
        .unwrap();

        let catalog = Catalog::load(&config).unwrap();
        assert_eq!(
            catalog.units_of_lot(1).unwrap(),
            vec!["CPP Sul".to_string(), "CPP Norte".to_string()]
        );
        assert_eq!(catalog.lot(1).unwrap().prices.breakfast.internal, 4.5);
        assert!(matches!(
            catalog.units_of_lot(7),
            Err(MealMapError::LotNotFound(7))
        ));
    }
}
