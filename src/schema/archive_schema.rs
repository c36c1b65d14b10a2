//! The host archive's column layout and idempotent provisioning of
//! collector columns.

use crate::catalog::field::StorageType;
use crate::schema::error::SchemaError;
use log::info;
use std::collections::{BTreeMap, BTreeSet};

/// A host archive whose columns can be listed and extended.
pub trait ArchiveSchema {
    fn columns(&self) -> Result<BTreeSet<String>, SchemaError>;

    /// Fails with [`SchemaError::ColumnExists`] if `name` is already present.
    fn add_column(&mut self, name: &str, storage_type: StorageType) -> Result<(), SchemaError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
}

/// Adds every column of `mapping` that the schema lacks.
///
/// Running it again with the same mapping creates nothing.
pub fn provision_columns(
    schema: &mut dyn ArchiveSchema,
    mapping: &BTreeMap<String, StorageType>,
) -> Result<ProvisionReport, SchemaError> {
    if mapping.is_empty() {
        return Err(SchemaError::NoActiveColumns);
    }

    let present = schema.columns()?;
    let mut report = ProvisionReport::default();
    for (column, storage_type) in mapping {
        if present.contains(column) {
            report.existing.push(column.clone());
        } else {
            schema.add_column(column, *storage_type)?;
            info!("Added column {} {}", column, storage_type.sql_type());
            report.created.push(column.clone());
        }
    }
    Ok(report)
}

/// An archive schema held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySchema {
    columns: BTreeMap<String, StorageType>,
}

impl MemorySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns<'a>(columns: impl IntoIterator<Item = (&'a str, StorageType)>) -> Self {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, storage_type)| (name.to_string(), storage_type))
                .collect(),
        }
    }

    pub fn storage_type(&self, column: &str) -> Option<StorageType> {
        self.columns.get(column).copied()
    }
}

impl ArchiveSchema for MemorySchema {
    fn columns(&self) -> Result<BTreeSet<String>, SchemaError> {
        Ok(self.columns.keys().cloned().collect())
    }

    fn add_column(&mut self, name: &str, storage_type: StorageType) -> Result<(), SchemaError> {
        if self.columns.contains_key(name) {
            return Err(SchemaError::ColumnExists(name.to_string()));
        }
        self.columns.insert(name.to_string(), storage_type);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> BTreeMap<String, StorageType> {
        BTreeMap::from([
            ("ow_temperature".to_string(), StorageType::Real),
            ("ow_humidity".to_string(), StorageType::Integer),
            ("ow_weather_main".to_string(), StorageType::Text),
        ])
    }

    #[test]
    fn test_provisioning_is_idempotent() -> Result<(), SchemaError> {
        let mut schema = MemorySchema::with_columns([
            ("dateTime", StorageType::Integer),
            ("ow_temperature", StorageType::Real),
        ]);

        let first = provision_columns(&mut schema, &mapping())?;
        let second = provision_columns(&mut schema, &mapping())?;

        assert_eq!(first.created, vec!["ow_humidity", "ow_weather_main"]);
        assert_eq!(first.existing, vec!["ow_temperature"]);
        assert!(second.created.is_empty());
        assert_eq!(second.existing.len(), 3);
        assert_eq!(schema.storage_type("ow_humidity"), Some(StorageType::Integer));
        assert_eq!(schema.columns()?.len(), 4);
        Ok(())
    }

    #[test]
    fn test_empty_mapping_is_rejected() {
        let mut schema = MemorySchema::new();
        assert!(matches!(
            provision_columns(&mut schema, &BTreeMap::new()),
            Err(SchemaError::NoActiveColumns)
        ));
    }

    #[test]
    fn test_adding_existing_column_fails() {
        let mut schema = MemorySchema::with_columns([("ow_aqi", StorageType::Integer)]);
        assert!(matches!(
            schema.add_column("ow_aqi", StorageType::Integer),
            Err(SchemaError::ColumnExists(column)) if column == "ow_aqi"
        ));
    }
}
