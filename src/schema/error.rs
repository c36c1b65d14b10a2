use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read schema manifest '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse schema manifest '{0}'")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Failed to serialize schema manifest")]
    Serialize(#[source] toml::ser::Error),

    #[error("Failed to write schema manifest '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Column '{0}' already exists in the archive schema")]
    ColumnExists(String),

    #[error("No columns to provision, the field selection is empty")]
    NoActiveColumns,
}
