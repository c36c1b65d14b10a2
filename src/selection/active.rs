use crate::catalog::field::{FieldDefinition, StorageType};
use crate::catalog::field_catalog::FieldCatalog;
use crate::selection::field_selection::{selected_fields, FieldSelection};
use crate::selection::rejection::{Rejection, RejectionReason};
use crate::types::module::Module;
use std::collections::{BTreeMap, BTreeSet};

/// The fields actually collected and injected: selected, defined in the
/// catalog, belonging to an enabled module, and backed by an existing column.
///
/// Computed once at startup and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveFieldSet {
    modules: BTreeMap<Module, Vec<FieldDefinition>>,
}

impl ActiveFieldSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn validate(
        selection: &FieldSelection,
        catalog: &FieldCatalog,
        existing_columns: &BTreeSet<String>,
        enabled_modules: &BTreeSet<Module>,
    ) -> (Self, Vec<Rejection>) {
        let mut modules: BTreeMap<Module, Vec<FieldDefinition>> = BTreeMap::new();
        let mut rejections = Vec::new();

        for field in selected_fields(selection, catalog) {
            if !enabled_modules.contains(&field.module) {
                rejections.push(Rejection::new(
                    Some(field.module),
                    &field.service_field_name,
                    RejectionReason::ModuleDisabled,
                ));
            } else if !existing_columns.contains(&field.storage_column) {
                rejections.push(Rejection::new(
                    Some(field.module),
                    &field.service_field_name,
                    RejectionReason::MissingColumn(field.storage_column.clone()),
                ));
            } else {
                modules.entry(field.module).or_default().push(field.clone());
            }
        }

        (Self { modules }, rejections)
    }

    pub fn is_empty(&self) -> bool {
        self.modules.values().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.modules.values().map(Vec::len).sum()
    }

    pub fn modules(&self) -> impl Iterator<Item = Module> + '_ {
        self.modules.keys().copied()
    }

    pub fn fields(&self, module: Module) -> &[FieldDefinition] {
        self.modules.get(&module).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.modules.values().flatten()
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.iter().any(|field| field.storage_column == column)
    }

    pub fn mapping(&self) -> BTreeMap<String, StorageType> {
        self.iter()
            .map(|field| (field.storage_column.clone(), field.storage_type))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_without_columns_or_enabled_module_are_dropped() {
        let catalog = FieldCatalog::embedded().unwrap();
        let selection = FieldSelection::new()
            .with_fields(Module::CurrentWeather, &["temp", "humidity", "pressure"])
            .with_fields(Module::AirQuality, &["pm2_5"]);
        let columns: BTreeSet<String> = ["ow_temperature", "ow_humidity", "ow_pm2_5"]
            .into_iter()
            .map(String::from)
            .collect();
        let enabled = BTreeSet::from([Module::CurrentWeather]);

        let (active, rejections) =
            ActiveFieldSet::validate(&selection, &catalog, &columns, &enabled);

        assert_eq!(active.len(), 2);
        assert!(active.contains_column("ow_temperature"));
        assert!(active.contains_column("ow_humidity"));
        assert!(active.fields(Module::AirQuality).is_empty());
        assert_eq!(
            rejections,
            vec![
                Rejection::new(
                    Some(Module::CurrentWeather),
                    "pressure",
                    RejectionReason::MissingColumn("ow_pressure".into())
                ),
                Rejection::new(Some(Module::AirQuality), "pm2_5", RejectionReason::ModuleDisabled),
            ]
        );
    }
}
