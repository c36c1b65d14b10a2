use crate::selection::tier::ComplexityTier;
use crate::types::module::Module;
use crate::units::expression::ExpressionError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read field catalog '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse field catalog from {origin}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid API path '{path}': {reason}")]
    InvalidApiPath { path: String, reason: &'static str },

    #[error("Invalid formula for conversion '{rule}'")]
    InvalidFormula {
        rule: String,
        #[source]
        source: ExpressionError,
    },

    #[error("Unknown module '{0}' in field catalog")]
    UnknownModule(String),

    #[error("Storage column '{0}' is defined more than once")]
    DuplicateColumn(String),

    #[error("Field '{field}' is defined more than once for module {module}")]
    DuplicateField { module: Module, field: String },

    #[error("Storage column '{0}' must start with 'ow_' and contain only lowercase letters, digits and underscores")]
    InvalidColumnName(String),

    #[error("Field '{field}' references undefined conversion '{conversion}'")]
    UnknownConversion { field: String, conversion: String },

    #[error("Unknown host unit system '{system}' in unit group '{group}'")]
    UnknownUnitSystem { group: String, system: String },

    #[error("Unknown complexity tier '{0}'")]
    UnknownTier(String),

    #[error("Complexity tier '{0}' is not defined")]
    MissingTier(ComplexityTier),

    #[error("Complexity tier '{tier}' has an invalid entry '{entry}': {reason}")]
    InvalidTier {
        tier: ComplexityTier,
        entry: String,
        reason: String,
    },
}
