use crate::types::unit_system::HostUnitSystem;
use crate::types::value::FieldValue;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// A periodic archive record handed to the collector by the host.
///
/// `fields` maps column names to values. A key mapped to `None` is a column
/// that is defined for this record but carries no value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveRecord {
    #[serde(rename = "dateTime")]
    pub date_time: i64,
    #[serde(rename = "usUnits", serialize_with = "serialize_unit_code")]
    pub us_units: HostUnitSystem,
    pub interval: u32,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Option<FieldValue>>,
}

fn serialize_unit_code<S: Serializer>(units: &HostUnitSystem, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i32(units.code())
}

impl ArchiveRecord {
    pub fn new(date_time: i64, us_units: HostUnitSystem, interval: u32) -> Self {
        Self {
            date_time,
            us_units,
            interval,
            fields: BTreeMap::new(),
        }
    }

    /// Returns `Some(&None)` for a column that is present but empty.
    pub fn get(&self, column: &str) -> Option<&Option<FieldValue>> {
        self.fields.get(column)
    }

    pub fn set(&mut self, column: impl Into<String>, value: Option<FieldValue>) {
        self.fields.insert(column.into(), value);
    }
}
