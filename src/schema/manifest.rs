use crate::catalog::field::StorageType;
use crate::schema::archive_schema::ArchiveSchema;
use crate::schema::error::SchemaError;
use crate::utils::write_atomically;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Manifest {
    #[serde(default)]
    columns: BTreeMap<String, StorageType>,
}

/// An archive schema recorded in a TOML manifest.
///
/// Used by the standalone binary in place of a host database. Added columns
/// are kept in memory until [`ManifestSchema::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSchema {
    path: PathBuf,
    manifest: Manifest,
}

impl ManifestSchema {
    /// Reads the manifest at `path`. A missing file is an empty schema.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, SchemaError> {
        let path = path.into();
        let manifest = match fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text).map_err(|e| SchemaError::Parse(path.clone(), e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Manifest::default(),
            Err(e) => return Err(SchemaError::Read(path, e)),
        };
        Ok(Self { path, manifest })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<(), SchemaError> {
        let text = toml::to_string_pretty(&self.manifest).map_err(SchemaError::Serialize)?;
        write_atomically(&self.path, text.as_bytes())
            .map_err(|e| SchemaError::Write(self.path.clone(), e))
    }
}

impl ArchiveSchema for ManifestSchema {
    fn columns(&self) -> Result<BTreeSet<String>, SchemaError> {
        Ok(self.manifest.columns.keys().cloned().collect())
    }

    fn add_column(&mut self, name: &str, storage_type: StorageType) -> Result<(), SchemaError> {
        if self.manifest.columns.contains_key(name) {
            return Err(SchemaError::ColumnExists(name.to_string()));
        }
        self.manifest.columns.insert(name.to_string(), storage_type);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::archive_schema::provision_columns;

    #[test]
    fn test_missing_manifest_is_empty() -> Result<(), SchemaError> {
        let dir = tempfile::tempdir().unwrap();
        let schema = ManifestSchema::load(dir.path().join("schema.toml"))?;
        assert!(schema.columns()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_provisioned_columns_survive_reload() -> Result<(), SchemaError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.toml");
        let mapping = BTreeMap::from([
            ("ow_aqi".to_string(), StorageType::Integer),
            ("ow_pm2_5".to_string(), StorageType::Real),
        ]);

        let mut schema = ManifestSchema::load(&path)?;
        provision_columns(&mut schema, &mapping)?;
        schema.save()?;

        let mut reloaded = ManifestSchema::load(&path)?;
        let report = provision_columns(&mut reloaded, &mapping)?;
        assert!(report.created.is_empty());
        assert_eq!(reloaded, schema);
        assert!(fs::read_to_string(&path).unwrap().contains("ow_pm2_5 = \"real\""));
        Ok(())
    }

    #[test]
    fn test_malformed_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.toml");
        fs::write(&path, "[columns]\now_aqi = \"decimal\"\n").unwrap();
        assert!(matches!(ManifestSchema::load(&path), Err(SchemaError::Parse(..))));
    }
}
