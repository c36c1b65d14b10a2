//! Definitions loaded from the field catalog: collectable fields, conversion
//! rules and the unit groups they belong to.

use crate::catalog::api_path::ApiPath;
use crate::types::module::Module;
use crate::types::unit_system::{ApiUnits, HostUnitSystem};
use crate::units::expression::Expression;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel conversion name meaning "store the value as received".
pub const NO_CONVERSION: &str = "none";

/// Sentinel unit group for fields that have no unit, such as text descriptions.
pub const NO_UNIT_GROUP: &str = "none";

/// The column type a field is stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Real,
    Integer,
    Text,
}

impl StorageType {
    /// SQL type used when provisioning a column of this type.
    pub fn sql_type(&self) -> &'static str {
        match self {
            StorageType::Real => "REAL",
            StorageType::Integer => "INTEGER",
            StorageType::Text => "VARCHAR(64)",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageType::Real => "real",
            StorageType::Integer => "integer",
            StorageType::Text => "text",
        })
    }
}

/// One collectable datum: where it lives in the API response and where it is
/// stored in the archive.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub module: Module,
    /// Logical name used in selections, e.g. `temp`.
    pub service_field_name: String,
    pub api_path: ApiPath,
    /// Archive column, e.g. `ow_temperature`.
    pub storage_column: String,
    pub storage_type: StorageType,
    pub unit_group: String,
    pub unit_conversion: Option<String>,
}

impl FieldDefinition {
    /// The conversion rule name, or `None` when the field is stored as received.
    pub fn conversion_name(&self) -> Option<&str> {
        self.unit_conversion
            .as_deref()
            .filter(|name| *name != NO_CONVERSION)
    }

    pub fn has_unit_group(&self) -> bool {
        self.unit_group != NO_UNIT_GROUP
    }
}

/// The unit combination a conversion rule requires. An unset side matches any value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guard {
    #[serde(default)]
    pub host_units: Option<HostUnitSystem>,
    #[serde(default)]
    pub api_units: Option<ApiUnits>,
}

impl Guard {
    pub fn matches(&self, host_units: HostUnitSystem, api_units: ApiUnits) -> bool {
        self.host_units.is_none_or(|required| required == host_units)
            && self.api_units.is_none_or(|required| required == api_units)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRule {
    pub name: String,
    pub formula: Expression,
    pub applies_when: Guard,
    pub from_unit: String,
    pub to_unit: String,
}

/// How one unit group is expressed under one host unit system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDefinition {
    pub unit: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub format: Option<String>,
}
