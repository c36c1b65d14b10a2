//! Registration of unit groups with the host's unit registry.
//!
//! Extending the host's unit vocabulary is the one process-wide side effect of
//! the collector. It happens once at startup, through the [`UnitRegistry`]
//! seam, and only with groups the field catalog defines.

use crate::catalog::field::UnitDefinition;
use crate::catalog::field_catalog::FieldCatalog;
use crate::selection::active::ActiveFieldSet;
use crate::types::unit_system::HostUnitSystem;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// The host's registry of unit groups, units and labels.
pub trait UnitRegistry {
    /// Declares how `group` is expressed under `system`.
    fn define_group(&mut self, group: &str, system: HostUnitSystem, unit: &UnitDefinition);

    /// Associates an archive column with a unit group.
    fn assign_column(&mut self, column: &str, group: &str);
}

/// Registers the unit groups and column assignments needed by `active`.
///
/// Groups missing from the catalog are assumed to be native to the host and
/// are only assigned, never defined. Returns the number of columns assigned.
pub fn register_unit_groups(
    registry: &mut dyn UnitRegistry,
    catalog: &FieldCatalog,
    active: &ActiveFieldSet,
) -> usize {
    let mut defined = BTreeSet::new();
    let mut assigned = 0;

    for field in active.iter().filter(|field| field.has_unit_group()) {
        if defined.insert(field.unit_group.as_str()) {
            if let Some(systems) = catalog.unit_group(&field.unit_group) {
                for (system, unit) in systems {
                    registry.define_group(&field.unit_group, *system, unit);
                }
                debug!("Defined unit group {}", field.unit_group);
            }
        }
        registry.assign_column(&field.storage_column, &field.unit_group);
        assigned += 1;
    }

    assigned
}

/// An in-process [`UnitRegistry`], used when no host registry is attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryUnitRegistry {
    groups: BTreeMap<String, BTreeMap<HostUnitSystem, UnitDefinition>>,
    columns: BTreeMap<String, String>,
}

impl MemoryUnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group_of(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }

    pub fn unit_for(&self, group: &str, system: HostUnitSystem) -> Option<&UnitDefinition> {
        self.groups.get(group).and_then(|systems| systems.get(&system))
    }

    /// The label of a column's unit, if its group was defined here.
    pub fn label_for(&self, column: &str, system: HostUnitSystem) -> Option<&str> {
        let group = self.group_of(column)?;
        self.unit_for(group, system).map(|unit| unit.label.as_str())
    }

    pub fn defined_groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }
}

impl UnitRegistry for MemoryUnitRegistry {
    fn define_group(&mut self, group: &str, system: HostUnitSystem, unit: &UnitDefinition) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(system, unit.clone());
    }

    fn assign_column(&mut self, column: &str, group: &str) {
        self.columns.insert(column.to_string(), group.to_string());
    }
}
