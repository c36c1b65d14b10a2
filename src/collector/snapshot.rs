//! The latest collected values, shared between the poller and the injector.

use crate::api::extract::ModuleReading;
use crate::collector::error::SnapshotError;
use crate::types::module::Module;
use crate::types::value::FieldValue;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Most recent value per storage column, grouped by module.
///
/// A merge updates every column of a collection under a single lock
/// acquisition, so a reader sees either all values of a collection or none of
/// them. Columns missing from a collection keep their previous value.
#[derive(Debug, Default)]
pub struct LatestSnapshot {
    readings: Mutex<BTreeMap<Module, ModuleReading>>,
}

/// A consistent copy of the snapshot taken at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotView {
    readings: BTreeMap<Module, ModuleReading>,
}

impl LatestSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the columns in `reading` and returns the number of values it
    /// holds. The module's collection time moves to the reading's.
    pub fn merge(&self, reading: ModuleReading) -> Result<usize, SnapshotError> {
        let count = reading.values.len();
        let mut readings = self.lock()?;
        let entry = readings
            .entry(reading.module)
            .or_insert_with(|| ModuleReading::empty(reading.module));
        entry.values.extend(reading.values);
        if reading.collected_at.is_some() {
            entry.collected_at = reading.collected_at;
        }
        Ok(count)
    }

    /// Returns `None` until the first reading has been merged.
    pub fn view(&self) -> Result<Option<SnapshotView>, SnapshotError> {
        let readings = self.lock()?;
        if readings.is_empty() {
            return Ok(None);
        }
        Ok(Some(SnapshotView {
            readings: readings.clone(),
        }))
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<Module, ModuleReading>>, SnapshotError> {
        self.readings.lock().map_err(|_| {
            // Values are inserted whole, so the map itself is never half
            // written. Clearing lets the next caller in after a cooldown.
            self.readings.clear_poison();
            SnapshotError::Poisoned
        })
    }
}

impl SnapshotView {
    pub fn reading(&self, module: Module) -> Option<&ModuleReading> {
        self.readings.get(&module)
    }

    pub fn value(&self, module: Module, column: &str) -> Option<&FieldValue> {
        self.reading(module)?.values.get(column)
    }

    pub fn collected_at(&self, module: Module) -> Option<DateTime<Utc>> {
        self.reading(module)?.collected_at
    }

    /// Timestamp of the most recent collection across all modules.
    pub fn newest(&self) -> Option<DateTime<Utc>> {
        self.readings
            .values()
            .filter_map(|reading| reading.collected_at)
            .max()
    }

    pub fn modules(&self) -> impl Iterator<Item = Module> + '_ {
        self.readings.keys().copied()
    }

    /// Total number of values across all modules.
    pub fn len(&self) -> usize {
        self.readings.values().map(|reading| reading.values.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
