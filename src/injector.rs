//! Merging of the latest snapshot into archive records.

use crate::collector::snapshot::{LatestSnapshot, SnapshotView};
use crate::selection::active::ActiveFieldSet;
use crate::types::record::ArchiveRecord;
use crate::types::value::FieldValue;
use crate::units::adapter::UnitAdapter;
use chrono::{DateTime, Duration, Utc};
use log::{debug, error, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

pub const DEFAULT_STALE_AFTER: std::time::Duration = std::time::Duration::from_secs(10800);

/// Writes active columns from the snapshot into every archive record.
#[derive(Debug, Clone)]
pub struct RecordInjector {
    active: Arc<ActiveFieldSet>,
    snapshot: Arc<LatestSnapshot>,
    adapter: UnitAdapter,
    stale_after: Duration,
}

impl RecordInjector {
    pub fn new(
        active: Arc<ActiveFieldSet>,
        snapshot: Arc<LatestSnapshot>,
        adapter: UnitAdapter,
        stale_after: std::time::Duration,
    ) -> Self {
        Self {
            active,
            snapshot,
            adapter,
            stale_after: Duration::from_std(stale_after).unwrap_or(Duration::MAX),
        }
    }

    /// Adds the active columns to `record`.
    ///
    /// Never fails: any fault leaves the record untouched and is logged.
    /// Returns the number of columns that received a value.
    pub fn inject(&self, record: &mut ArchiveRecord) -> usize {
        self.inject_at(record, Utc::now())
    }

    pub(crate) fn inject_at(&self, record: &mut ArchiveRecord, now: DateTime<Utc>) -> usize {
        if self.active.is_empty() {
            return 0;
        }
        let view = match self.snapshot.view() {
            Ok(Some(view)) => view,
            Ok(None) => {
                debug!("No readings collected yet, record {} left as is", record.date_time);
                return 0;
            }
            Err(e) => {
                error!("Cannot read the snapshot: {e}");
                return 0;
            }
        };

        let updates = panic::catch_unwind(AssertUnwindSafe(|| self.updates(&view, now)));
        match updates {
            Ok(Some(updates)) => {
                let written = updates.iter().filter(|(_, value)| value.is_some()).count();
                record.fields.extend(updates);
                written
            }
            Ok(None) => {
                warn!(
                    "All readings are older than {} seconds, record {} left as is",
                    self.stale_after.num_seconds(),
                    record.date_time
                );
                0
            }
            Err(_) => {
                error!("Injection into record {} panicked, record left as is", record.date_time);
                0
            }
        }
    }

    /// Computes the column values for one record, or `None` when every
    /// module's reading is stale.
    fn updates(
        &self,
        view: &SnapshotView,
        now: DateTime<Utc>,
    ) -> Option<Vec<(String, Option<FieldValue>)>> {
        let is_fresh = |collected_at: DateTime<Utc>| now - collected_at <= self.stale_after;
        if !view.newest().is_some_and(is_fresh) {
            return None;
        }

        let mut updates = Vec::with_capacity(self.active.len());
        for module in self.active.modules() {
            let fresh = view.collected_at(module).is_some_and(is_fresh);
            for field in self.active.fields(module) {
                let value = fresh
                    .then(|| view.value(module, &field.storage_column))
                    .flatten()
                    .map(|value| self.adapter.convert_field(field, value.clone()));
                updates.push((field.storage_column.clone(), value));
            }
        }
        Some(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::extract::ModuleReading;
    use crate::catalog::field_catalog::FieldCatalog;
    use crate::selection::field_selection::FieldSelection;
    use crate::types::module::Module;
    use crate::types::unit_system::HostUnitSystem;
    use chrono::TimeZone;
    use std::collections::{BTreeMap, BTreeSet};

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn injector(host_units: HostUnitSystem) -> (RecordInjector, Arc<LatestSnapshot>) {
        let catalog = Arc::new(FieldCatalog::embedded().unwrap());
        let selection = FieldSelection::new()
            .with_fields(Module::CurrentWeather, &["temp", "pressure", "humidity"])
            .with_fields(Module::AirQuality, &["pm2_5"]);
        let columns: BTreeSet<String> = ["ow_temperature", "ow_pressure", "ow_humidity", "ow_pm2_5"]
            .into_iter()
            .map(String::from)
            .collect();
        let enabled = BTreeSet::from(Module::ALL);
        let (active, _) = ActiveFieldSet::validate(&selection, &catalog, &columns, &enabled);
        let snapshot = Arc::new(LatestSnapshot::new());
        let injector = RecordInjector::new(
            Arc::new(active),
            Arc::clone(&snapshot),
            UnitAdapter::new(catalog, host_units),
            DEFAULT_STALE_AFTER,
        );
        (injector, snapshot)
    }

    fn merge(
        snapshot: &LatestSnapshot,
        module: Module,
        values: &[(&str, FieldValue)],
        at: DateTime<Utc>,
    ) {
        snapshot
            .merge(ModuleReading {
                module,
                values: values
                    .iter()
                    .map(|(column, value)| (column.to_string(), value.clone()))
                    .collect(),
                collected_at: Some(at),
            })
            .unwrap();
    }

    fn record() -> ArchiveRecord {
        let mut record = ArchiveRecord::new(1_700_000_300, HostUnitSystem::Us, 5);
        record.set("outTemp", Some(FieldValue::Real(68.0)));
        record
    }

    #[test]
    fn test_injects_converted_values_and_nulls() {
        let (injector, snapshot) = injector(HostUnitSystem::Us);
        merge(
            &snapshot,
            Module::CurrentWeather,
            &[
                ("ow_temperature", FieldValue::Real(68.5)),
                ("ow_pressure", FieldValue::Real(1013.25)),
            ],
            at(0),
        );
        merge(&snapshot, Module::AirQuality, &[("ow_pm2_5", FieldValue::Real(7.5))], at(0));
        let mut record = record();

        let written = injector.inject_at(&mut record, at(300));

        assert_eq!(written, 3);
        assert_eq!(record.get("ow_temperature"), Some(&Some(FieldValue::Real(68.5))));
        assert_eq!(record.get("ow_humidity"), Some(&None));
        assert_eq!(record.get("ow_pm2_5"), Some(&Some(FieldValue::Real(7.5))));
        let Some(Some(FieldValue::Real(inhg))) = record.get("ow_pressure") else {
            panic!("pressure missing");
        };
        assert!((inhg - 29.921).abs() < 1e-3);
        assert_eq!(record.get("outTemp"), Some(&Some(FieldValue::Real(68.0))));
    }

    #[test]
    fn test_stale_snapshot_writes_nothing() {
        let (injector, snapshot) = injector(HostUnitSystem::Metric);
        let temperature = [("ow_temperature", FieldValue::Real(20.5))];
        merge(&snapshot, Module::CurrentWeather, &temperature, at(0));
        let mut record = record();
        let before = record.clone();

        let written = injector.inject_at(&mut record, at(10801));

        assert_eq!(written, 0);
        assert_eq!(record, before);
    }

    #[test]
    fn test_stale_module_gets_nulls_while_fresh_module_is_written() {
        let (injector, snapshot) = injector(HostUnitSystem::MetricWx);
        merge(&snapshot, Module::AirQuality, &[("ow_pm2_5", FieldValue::Real(7.5))], at(0));
        let temperature = [("ow_temperature", FieldValue::Real(20.5))];
        merge(&snapshot, Module::CurrentWeather, &temperature, at(9000));
        let mut record = record();

        let written = injector.inject_at(&mut record, at(12000));

        assert_eq!(written, 1);
        assert_eq!(record.get("ow_temperature"), Some(&Some(FieldValue::Real(20.5))));
        assert_eq!(record.get("ow_pm2_5"), Some(&None));
    }

    #[test]
    fn test_missing_module_gets_nulls() {
        let (injector, snapshot) = injector(HostUnitSystem::MetricWx);
        let humidity = [("ow_humidity", FieldValue::Integer(65))];
        merge(&snapshot, Module::CurrentWeather, &humidity, at(0));
        let mut record = record();

        injector.inject_at(&mut record, at(60));

        let injected: BTreeMap<&str, &Option<FieldValue>> = record
            .fields
            .iter()
            .filter(|(column, _)| column.starts_with("ow_"))
            .map(|(column, value)| (column.as_str(), value))
            .collect();
        assert_eq!(
            injected,
            BTreeMap::from([
                ("ow_humidity", &Some(FieldValue::Integer(65))),
                ("ow_pm2_5", &None),
                ("ow_pressure", &None),
                ("ow_temperature", &None),
            ])
        );
    }

    #[test]
    fn test_empty_snapshot_is_a_no_op() {
        let (injector, _) = injector(HostUnitSystem::Us);
        let mut record = record();
        let before = record.clone();
        assert_eq!(injector.inject(&mut record), 0);
        assert_eq!(record, before);
    }
}
