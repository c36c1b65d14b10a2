use crate::catalog::field::{FieldDefinition, StorageType};
use crate::catalog::field_catalog::FieldCatalog;
use crate::types::module::Module;
use crate::types::unit_system::{ApiUnits, HostUnitSystem};
use crate::types::value::FieldValue;
use log::{error, trace};
use std::sync::Arc;

/// The API unit mode requested for a host unit system.
///
/// US hosts get imperial values (°F, mph); both metric variants get metric
/// values (°C, m/s), and wind is converted on our side where the host wants km/h.
pub fn api_units_for(host_units: HostUnitSystem) -> ApiUnits {
    match host_units {
        HostUnitSystem::Us => ApiUnits::Imperial,
        HostUnitSystem::Metric | HostUnitSystem::MetricWx => ApiUnits::Metric,
    }
}

/// Applies the catalog's conversion rules to collected values.
#[derive(Debug, Clone)]
pub struct UnitAdapter {
    catalog: Arc<FieldCatalog>,
    host_units: HostUnitSystem,
    api_units: ApiUnits,
}

impl UnitAdapter {
    pub fn new(catalog: Arc<FieldCatalog>, host_units: HostUnitSystem) -> Self {
        Self {
            catalog,
            host_units,
            api_units: api_units_for(host_units),
        }
    }

    pub fn host_units(&self) -> HostUnitSystem {
        self.host_units
    }

    pub fn api_units(&self) -> ApiUnits {
        self.api_units
    }

    /// Converts `value` of `service_field` in `module`.
    ///
    /// Fields unknown to the catalog pass through unchanged.
    pub fn convert(&self, service_field: &str, value: FieldValue, module: Module) -> FieldValue {
        match self.catalog.field(module, service_field) {
            Some(field) => self.convert_field(field, value),
            None => value,
        }
    }

    /// Converts `value` using the rule attached to `field`.
    ///
    /// Returns `value` unchanged when the field has no rule, the rule's guard
    /// does not match the configured units, the value is not numeric, or the
    /// formula fails to evaluate.
    pub fn convert_field(&self, field: &FieldDefinition, value: FieldValue) -> FieldValue {
        let Some(rule_name) = field.conversion_name() else {
            return value;
        };
        let Some(rule) = self.catalog.conversion(rule_name) else {
            return value;
        };
        if !rule.applies_when.matches(self.host_units, self.api_units) {
            trace!(
                "Conversion '{}' does not apply to {} with host {} and api {}",
                rule.name,
                field.storage_column,
                self.host_units,
                self.api_units
            );
            return value;
        }
        let Some(input) = value.as_f64() else {
            return value;
        };

        match rule.formula.eval(input) {
            Ok(converted) => match field.storage_type {
                StorageType::Integer => FieldValue::Integer(converted.round() as i64),
                _ => FieldValue::Real(converted),
            },
            Err(e) => {
                error!(
                    "Conversion '{}' ({}) failed for {} = {}: {}",
                    rule.name, rule.formula, field.storage_column, input, e
                );
                value
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(host_units: HostUnitSystem) -> UnitAdapter {
        UnitAdapter::new(Arc::new(FieldCatalog::embedded().unwrap()), host_units)
    }

    #[test]
    fn test_api_units_for_host_systems() {
        assert_eq!(api_units_for(HostUnitSystem::Us), ApiUnits::Imperial);
        assert_eq!(api_units_for(HostUnitSystem::Metric), ApiUnits::Metric);
        assert_eq!(api_units_for(HostUnitSystem::MetricWx), ApiUnits::Metric);
    }

    #[test]
    fn test_matching_guard_converts() {
        let us = adapter(HostUnitSystem::Us);
        let converted = us.convert("pressure", FieldValue::Real(1013.25), Module::CurrentWeather);
        let FieldValue::Real(inhg) = converted else {
            panic!("expected a real value");
        };
        assert!((inhg - 29.921).abs() < 1e-3);

        let metric = adapter(HostUnitSystem::Metric);
        assert_eq!(
            metric.convert("wind_speed", FieldValue::Real(10.0), Module::CurrentWeather),
            FieldValue::Real(36.0)
        );
    }

    #[test]
    fn test_guard_mismatch_passes_value_through() {
        let metric_wx = adapter(HostUnitSystem::MetricWx);
        for (field, value) in [
            ("wind_speed", 4.2),
            ("pressure", 1013.2),
            ("rain_1h", 0.8),
            ("visibility", 10000.0),
        ] {
            assert_eq!(
                metric_wx.convert(field, FieldValue::Real(value), Module::CurrentWeather),
                FieldValue::Real(value),
                "{field}"
            );
        }

        let metric = adapter(HostUnitSystem::Metric);
        assert_eq!(
            metric.convert("pressure", FieldValue::Real(1013.2), Module::CurrentWeather),
            FieldValue::Real(1013.2)
        );
    }

    #[test]
    fn test_fields_without_conversion_and_text_pass_through() {
        let us = adapter(HostUnitSystem::Us);
        assert_eq!(
            us.convert("temp", FieldValue::Real(71.3), Module::CurrentWeather),
            FieldValue::Real(71.3)
        );
        assert_eq!(
            us.convert("pm2_5", FieldValue::Real(12.0), Module::AirQuality),
            FieldValue::Real(12.0)
        );
        assert_eq!(
            us.convert("weather_main", FieldValue::Text("Rain".into()), Module::CurrentWeather),
            FieldValue::Text("Rain".into())
        );
        assert_eq!(
            us.convert("not_a_field", FieldValue::Integer(3), Module::CurrentWeather),
            FieldValue::Integer(3)
        );
    }

    #[test]
    fn test_failed_evaluation_returns_original_value() {
        let text = r#"
            [tiers.minimal]
            current_weather = ["temp"]
            [tiers.standard]
            current_weather = ["temp"]
            [tiers.comprehensive]
            current_weather = ["temp"]
            [tiers.everything]
            current_weather = "all"

            [conversions.broken]
            formula = "1 / (x - x)"

            [[fields]]
            module = "current_weather"
            service_field_name = "temp"
            api_path = "main.temp"
            storage_column = "ow_temperature"
            storage_type = "real"
            unit_conversion = "broken"
        "#;
        let catalog = FieldCatalog::from_toml_str(text, "test").unwrap();
        let adapter = UnitAdapter::new(Arc::new(catalog), HostUnitSystem::Us);

        assert_eq!(
            adapter.convert("temp", FieldValue::Real(20.0), Module::CurrentWeather),
            FieldValue::Real(20.0)
        );
    }
}
