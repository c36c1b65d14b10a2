use crate::catalog::field::FieldDefinition;
use crate::types::module::Module;
use crate::types::value::FieldValue;
use chrono::{DateTime, Utc};
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;

/// Values collected from one module in one request, keyed by storage column.
///
/// The collection timestamp travels next to the values as `collected_at`
/// rather than as an archive column: it drives staleness in the injector and
/// the host record already carries its own `dateTime`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleReading {
    pub module: Module,
    pub values: BTreeMap<String, FieldValue>,
    /// Time of the request. Set only when at least one field was extracted.
    pub collected_at: Option<DateTime<Utc>>,
}

impl ModuleReading {
    pub fn empty(module: Module) -> Self {
        Self {
            module,
            values: BTreeMap::new(),
            collected_at: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Extracts `fields` of `module` from a parsed response body.
///
/// Only the given fields are looked at; anything else in the body is ignored.
/// A field whose path is missing, null, out of range or of the wrong type is
/// skipped on its own without affecting the others.
pub fn extract(module: Module, body: &Value, fields: &[FieldDefinition]) -> ModuleReading {
    extract_at(module, body, fields, Utc::now())
}

pub(crate) fn extract_at(
    module: Module,
    body: &Value,
    fields: &[FieldDefinition],
    now: DateTime<Utc>,
) -> ModuleReading {
    let mut values = BTreeMap::new();

    for field in fields.iter().filter(|field| field.module == module) {
        let raw = match field.api_path.lookup(body) {
            Ok(raw) => raw,
            Err(miss) => {
                debug!(
                    "Skipping {} ({}): {}",
                    field.storage_column, field.api_path, miss
                );
                continue;
            }
        };
        match FieldValue::from_json(raw, field.storage_type) {
            Some(value) => {
                values.insert(field.storage_column.clone(), value);
            }
            None => debug!(
                "Skipping {} ({}): cannot store {} as {}",
                field.storage_column, field.api_path, raw, field.storage_type
            ),
        }
    }

    let collected_at = (!values.is_empty()).then_some(now);
    ModuleReading {
        module,
        values,
        collected_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::field_catalog::FieldCatalog;
    use crate::selection::field_selection::{selected_fields, FieldSelection};
    use chrono::TimeZone;
    use serde_json::json;

    fn active_fields(selection: &FieldSelection) -> Vec<FieldDefinition> {
        let catalog = FieldCatalog::embedded().unwrap();
        selected_fields(selection, &catalog)
            .into_iter()
            .cloned()
            .collect()
    }

    #[test]
    fn test_extracts_only_selected_fields() {
        let fields = active_fields(
            &FieldSelection::new()
                .with_fields(Module::CurrentWeather, &["temp", "humidity"])
                .with_fields(Module::AirQuality, &["pm2_5"]),
        );
        let body = json!({"main": {"temp": 20.5, "humidity": 65, "pressure": 1013.2}});
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        let reading = extract_at(Module::CurrentWeather, &body, &fields, now);

        assert_eq!(
            reading.values,
            BTreeMap::from([
                ("ow_humidity".to_string(), FieldValue::Integer(65)),
                ("ow_temperature".to_string(), FieldValue::Real(20.5)),
            ])
        );
        assert!(!reading.values.contains_key("ow_pressure"));
        assert_eq!(reading.collected_at, Some(now));
    }

    #[test]
    fn test_skips_bad_fields_individually() {
        let fields = active_fields(&FieldSelection::new().with_fields(
            Module::CurrentWeather,
            &["temp", "weather_main", "weather_id", "rain_1h", "visibility"],
        ));
        let body = json!({
            "main": {"temp": null},
            "weather": [],
            "visibility": "far",
            "rain": {"1h": 1.2}
        });

        let reading = extract(Module::CurrentWeather, &body, &fields);

        assert_eq!(
            reading.values,
            BTreeMap::from([("ow_rain_1h".to_string(), FieldValue::Real(1.2))])
        );
    }

    #[test]
    fn test_air_quality_paths_with_indices() {
        let fields = active_fields(
            &FieldSelection::new().with_fields(Module::AirQuality, &["aqi", "pm2_5", "pm10"]),
        );
        let body = json!({
            "coord": {"lon": 4.89, "lat": 52.37},
            "list": [{
                "main": {"aqi": 2},
                "components": {"co": 230.3, "pm2_5": 8.1, "pm10": 12.4},
                "dt": 1700000000
            }]
        });

        let reading = extract(Module::AirQuality, &body, &fields);

        assert_eq!(reading.values.len(), 3);
        assert_eq!(reading.values.get("ow_aqi"), Some(&FieldValue::Integer(2)));
        assert_eq!(reading.values.get("ow_pm2_5"), Some(&FieldValue::Real(8.1)));
        assert!(!reading.values.contains_key("ow_co"));
    }

    #[test]
    fn test_empty_extraction_has_no_timestamp() {
        let fields =
            active_fields(&FieldSelection::new().with_fields(Module::CurrentWeather, &["temp"]));
        let reading = extract(Module::CurrentWeather, &json!({"cod": 200}), &fields);
        assert!(reading.is_empty());
        assert_eq!(reading.collected_at, None);
    }

    #[test]
    fn test_fields_of_other_modules_are_ignored() {
        let fields =
            active_fields(&FieldSelection::new().with_fields(Module::AirQuality, &["aqi"]));
        let body = json!({"list": [{"main": {"aqi": 1}}]});
        let reading = extract(Module::CurrentWeather, &body, &fields);
        assert!(reading.is_empty());
    }
}
