//! Process-wide cache of the three source tables.
//! Loaded once, shared read-only through `Arc<Snapshot>`; an explicit reload installs the next
//! generation.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::data::loader::load_table;
use crate::error::{LoadError, SchemaError};
use crate::location::{normalize_table, LocationIndex, NormalizationPolicy};
use crate::table::Table;

/// Tables as read from their sources, before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawTables {
    pub establishments: Table,
    pub stations: Table,
    pub locations: Table,
}

/// One loaded generation: normalized tables plus the index built from them.
#[derive(Debug)]
pub struct Snapshot {
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
    pub policy: NormalizationPolicy,
    pub establishments: Table,
    pub stations: Table,
    pub locations: Table,
    pub index: LocationIndex,
}

#[derive(Debug)]
enum Origin {
    Files(AppConfig),
    Memory(RawTables),
}

#[derive(Debug)]
pub struct DataCache {
    origin: Origin,
    policy: NormalizationPolicy,
    current: RwLock<Arc<Snapshot>>,
}

impl DataCache {
    /// Read all three sources named by `config`. Any failure is fatal for the cache.
    pub fn load(config: &AppConfig) -> Result<DataCache, LoadError> {
        let origin = Origin::Files(config.clone());
        let snapshot = build_snapshot(&origin, config.normalization, 1)?;
        Ok(DataCache {
            origin,
            policy: config.normalization,
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Cache over tables already in memory; `reload` re-normalizes the same tables.
    pub fn from_tables(raw: RawTables, policy: NormalizationPolicy) -> Result<DataCache, LoadError> {
        let origin = Origin::Memory(raw);
        let snapshot = build_snapshot(&origin, policy, 1)?;
        Ok(DataCache {
            origin,
            policy,
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn generation(&self) -> u64 {
        self.snapshot().generation
    }

    pub fn policy(&self) -> NormalizationPolicy {
        self.policy
    }

    /// `(name, location)` of each source, for status reporting.
    pub fn sources(&self) -> Vec<(&'static str, String)> {
        match &self.origin {
            Origin::Files(config) => vec![
                ("establecimientos", config.establishments.path.display().to_string()),
                ("comisarias", config.stations.path.display().to_string()),
                ("ubigeos", config.locations.path.display().to_string()),
            ],
            Origin::Memory(_) => vec![
                ("establecimientos", "memory".to_string()),
                ("comisarias", "memory".to_string()),
                ("ubigeos", "memory".to_string()),
            ],
        }
    }

    /// Reload every source. On failure the current generation stays in place.
    pub fn reload(&self) -> Result<Arc<Snapshot>, LoadError> {
        let mut snapshot = match build_snapshot(&self.origin, self.policy, 0) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, generation = self.generation(), "reload failed; keeping current data");
                return Err(err);
            }
        };
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        snapshot.generation = current.generation + 1;
        let snapshot = Arc::new(snapshot);
        *current = Arc::clone(&snapshot);
        info!(generation = snapshot.generation, "reloaded source tables");
        Ok(snapshot)
    }
}

fn build_snapshot(
    origin: &Origin,
    policy: NormalizationPolicy,
    generation: u64,
) -> Result<Snapshot, LoadError> {
    let (raw, locations_label) = match origin {
        Origin::Files(config) => (
            RawTables {
                establishments: load_table(&config.establishments)?,
                stations: load_table(&config.stations)?,
                locations: load_table(&config.locations)?,
            },
            config.locations.path.display().to_string(),
        ),
        Origin::Memory(raw) => (raw.clone(), "memory:ubigeos".to_string()),
    };

    let establishments = normalize_table(&raw.establishments, policy);
    let stations = normalize_table(&raw.stations, policy);
    let locations = normalize_table(&raw.locations, policy);
    let index = LocationIndex::from_table(&locations).map_err(
        |SchemaError::MissingColumn { column, .. }| LoadError::MissingColumn {
            path: locations_label,
            column,
        },
    )?;

    Ok(Snapshot {
        generation,
        loaded_at: Utc::now(),
        policy,
        establishments,
        stations,
        locations,
        index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn raw() -> RawTables {
        let row = |d: &str| {
            vec![
                ("departamento", Value::text(d)),
                ("provincia", Value::text(d)),
                ("distrito", Value::text(d)),
            ]
        };
        RawTables {
            establishments: Table::from_records(vec![row("lima ")]),
            stations: Table::from_records(vec![row("cusco")]),
            locations: Table::from_records(vec![row("lima"), row("cusco")]),
        }
    }

    #[test]
    fn tables_are_normalized_once_at_load() {
        let cache = DataCache::from_tables(raw(), NormalizationPolicy::Uppercase).expect("cache");
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.establishments.rows[0][0], Value::text("LIMA"));
        assert_eq!(snapshot.index.departments(), vec!["CUSCO", "LIMA"]);
    }

    #[test]
    fn reload_bumps_generation_and_old_snapshots_stay_valid() {
        let cache = DataCache::from_tables(raw(), NormalizationPolicy::Uppercase).expect("cache");
        let before = cache.snapshot();
        let after = cache.reload().expect("reload");
        assert_eq!(after.generation, 2);
        assert_eq!(cache.generation(), 2);
        assert_eq!(before.generation, 1);
        assert_eq!(before.establishments, after.establishments);
    }

    #[test]
    fn locations_without_location_columns_fail_to_load() {
        let mut tables = raw();
        tables.locations = Table::from_records(vec![vec![("ubigeo", Value::text("150101"))]]);
        let err = DataCache::from_tables(tables, NormalizationPolicy::Uppercase).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { column: "DEPARTAMENTO", .. }));
    }
}
