//! The field catalog: every collectable field, the conversion rules that may
//! apply to it, the unit groups it belongs to and the complexity tiers.
//!
//! The catalog is static data loaded once at startup. A default catalog is
//! compiled into the crate; installations may point to their own file.

use crate::catalog::api_path::ApiPath;
use crate::catalog::error::CatalogError;
use crate::catalog::field::{ConversionRule, FieldDefinition, Guard, StorageType, UnitDefinition};
use crate::selection::field_selection::{module_value, validate, FieldSelection, RawSelection};
use crate::selection::tier::ComplexityTier;
use crate::types::module::Module;
use crate::types::unit_system::HostUnitSystem;
use crate::units::expression::Expression;
use log::debug;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

const EMBEDDED_CATALOG: &str = include_str!("../../data/field_catalog.toml");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCatalog {
    #[serde(default)]
    tiers: BTreeMap<String, RawSelection>,
    #[serde(default)]
    conversions: BTreeMap<String, RawConversion>,
    #[serde(default)]
    unit_groups: BTreeMap<String, BTreeMap<String, UnitDefinition>>,
    #[serde(default)]
    fields: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConversion {
    formula: String,
    #[serde(default)]
    applies_when: Guard,
    #[serde(default)]
    from_unit: String,
    #[serde(default)]
    to_unit: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawField {
    module: String,
    service_field_name: String,
    api_path: String,
    storage_column: String,
    storage_type: StorageType,
    #[serde(default = "default_unit_group")]
    unit_group: String,
    #[serde(default)]
    unit_conversion: Option<String>,
}

fn default_unit_group() -> String {
    crate::catalog::field::NO_UNIT_GROUP.to_string()
}

#[derive(Debug, Clone, PartialEq)]
struct Tiers {
    minimal: FieldSelection,
    standard: FieldSelection,
    comprehensive: FieldSelection,
    everything: FieldSelection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldCatalog {
    fields: Vec<FieldDefinition>,
    conversions: BTreeMap<String, ConversionRule>,
    unit_groups: BTreeMap<String, BTreeMap<HostUnitSystem, UnitDefinition>>,
    tiers: Tiers,
}

impl FieldCatalog {
    /// Loads the catalog compiled into the crate.
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_toml_str(EMBEDDED_CATALOG, "embedded catalog")
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Read(path.to_path_buf(), e))?;
        Self::from_toml_str(&text, &path.display().to_string())
    }

    /// Loads `path` when given, otherwise the embedded catalog.
    pub fn load_or_embedded(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::embedded(),
        }
    }

    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = toml::from_str(text).map_err(|source| CatalogError::Parse {
            origin: origin.to_string(),
            source,
        })?;

        let conversions = raw
            .conversions
            .into_iter()
            .map(|(name, rule)| {
                let formula =
                    Expression::parse(&rule.formula).map_err(|source| CatalogError::InvalidFormula {
                        rule: name.clone(),
                        source,
                    })?;
                let rule = ConversionRule {
                    name: name.clone(),
                    formula,
                    applies_when: rule.applies_when,
                    from_unit: rule.from_unit,
                    to_unit: rule.to_unit,
                };
                Ok((name, rule))
            })
            .collect::<Result<BTreeMap<_, _>, CatalogError>>()?;

        let mut unit_groups = BTreeMap::new();
        for (group, systems) in raw.unit_groups {
            let mut parsed = BTreeMap::new();
            for (system, unit) in systems {
                let system = HostUnitSystem::ALL
                    .into_iter()
                    .find(|candidate| candidate.name() == system)
                    .ok_or_else(|| CatalogError::UnknownUnitSystem {
                        group: group.clone(),
                        system: system.clone(),
                    })?;
                parsed.insert(system, unit);
            }
            unit_groups.insert(group, parsed);
        }

        let mut columns = HashSet::new();
        let mut names = HashSet::new();
        let mut fields = Vec::with_capacity(raw.fields.len());
        for field in raw.fields {
            let module = field
                .module
                .parse::<Module>()
                .map_err(|_| CatalogError::UnknownModule(field.module.clone()))?;
            if !is_valid_column_name(&field.storage_column) {
                return Err(CatalogError::InvalidColumnName(field.storage_column));
            }
            if !columns.insert(field.storage_column.clone()) {
                return Err(CatalogError::DuplicateColumn(field.storage_column));
            }
            if !names.insert((module, field.service_field_name.clone())) {
                return Err(CatalogError::DuplicateField {
                    module,
                    field: field.service_field_name,
                });
            }
            if let Some(conversion) = &field.unit_conversion {
                if conversion != crate::catalog::field::NO_CONVERSION
                    && !conversions.contains_key(conversion)
                {
                    return Err(CatalogError::UnknownConversion {
                        field: field.service_field_name,
                        conversion: conversion.clone(),
                    });
                }
            }
            fields.push(FieldDefinition {
                module,
                api_path: ApiPath::parse(&field.api_path)?,
                service_field_name: field.service_field_name,
                storage_column: field.storage_column,
                storage_type: field.storage_type,
                unit_group: field.unit_group,
                unit_conversion: field.unit_conversion,
            });
        }

        let mut catalog = FieldCatalog {
            fields,
            conversions,
            unit_groups,
            tiers: Tiers {
                minimal: FieldSelection::new(),
                standard: FieldSelection::new(),
                comprehensive: FieldSelection::new(),
                everything: FieldSelection::new(),
            },
        };
        catalog.tiers = catalog.build_tiers(raw.tiers)?;

        debug!(
            "Loaded {} fields and {} conversions from {}",
            catalog.fields.len(),
            catalog.conversions.len(),
            origin
        );
        Ok(catalog)
    }

    fn build_tiers(&self, raw: BTreeMap<String, RawSelection>) -> Result<Tiers, CatalogError> {
        let mut parsed = BTreeMap::new();
        for (name, raw_selection) in raw {
            let tier = name
                .parse::<ComplexityTier>()
                .map_err(|_| CatalogError::UnknownTier(name.clone()))?;
            let invalid = |entry: &str, reason: String| CatalogError::InvalidTier {
                tier,
                entry: entry.to_string(),
                reason,
            };

            let mut selection = FieldSelection::new();
            for (key, value) in &raw_selection {
                let module = key
                    .parse::<Module>()
                    .map_err(|e| invalid(key, e.to_string()))?;
                match module_value(module, value) {
                    Ok(Some(module_selection)) => {
                        selection = selection.with(module, module_selection)
                    }
                    Ok(None) => {}
                    Err(rejection) => return Err(invalid(key, rejection.to_string())),
                }
            }

            let (valid, rejections) = validate(&selection, self);
            if let Some(rejection) = rejections.first() {
                return Err(invalid(&rejection.field, rejection.to_string()));
            }
            parsed.insert(tier, valid);
        }

        let mut take = |tier| parsed.remove(&tier).ok_or(CatalogError::MissingTier(tier));
        Ok(Tiers {
            minimal: take(ComplexityTier::Minimal)?,
            standard: take(ComplexityTier::Standard)?,
            comprehensive: take(ComplexityTier::Comprehensive)?,
            everything: take(ComplexityTier::Everything)?,
        })
    }

    /// All fields, in catalog order.
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn fields_for(&self, module: Module) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(move |field| field.module == module)
    }

    pub fn field(&self, module: Module, service_field_name: &str) -> Option<&FieldDefinition> {
        self.fields_for(module)
            .find(|field| field.service_field_name == service_field_name)
    }

    pub fn by_column(&self, storage_column: &str) -> Option<&FieldDefinition> {
        self.fields
            .iter()
            .find(|field| field.storage_column == storage_column)
    }

    /// Modules that define a field called `service_field_name`.
    pub fn modules_defining(&self, service_field_name: &str) -> Vec<Module> {
        Module::ALL
            .into_iter()
            .filter(|module| self.field(*module, service_field_name).is_some())
            .collect()
    }

    pub fn conversion(&self, name: &str) -> Option<&ConversionRule> {
        self.conversions.get(name)
    }

    pub fn unit_group(&self, group: &str) -> Option<&BTreeMap<HostUnitSystem, UnitDefinition>> {
        self.unit_groups.get(group)
    }

    pub fn unit_groups(&self) -> &BTreeMap<String, BTreeMap<HostUnitSystem, UnitDefinition>> {
        &self.unit_groups
    }

    pub fn tier(&self, tier: ComplexityTier) -> &FieldSelection {
        match tier {
            ComplexityTier::Minimal => &self.tiers.minimal,
            ComplexityTier::Standard => &self.tiers.standard,
            ComplexityTier::Comprehensive => &self.tiers.comprehensive,
            ComplexityTier::Everything => &self.tiers.everything,
        }
    }
}

fn is_valid_column_name(column: &str) -> bool {
    column.len() > 3
        && column.starts_with("ow_")
        && column
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::field_selection::ModuleSelection;

    const SMALL_CATALOG: &str = r#"
        [tiers.minimal]
        current_weather = ["temp"]
        [tiers.standard]
        current_weather = ["temp"]
        [tiers.comprehensive]
        current_weather = ["temp"]
        [tiers.everything]
        current_weather = "all"

        [conversions.c_to_f]
        formula = "x * 9 / 5 + 32"
        applies_when = { host_units = "US", api_units = "metric" }

        [[fields]]
        module = "current_weather"
        service_field_name = "temp"
        api_path = "main.temp"
        storage_column = "ow_temperature"
        storage_type = "real"
        unit_group = "group_temperature"
        unit_conversion = "c_to_f"
    "#;

    #[test]
    fn test_embedded_catalog_loads() -> Result<(), CatalogError> {
        let catalog = FieldCatalog::embedded()?;

        assert_eq!(catalog.fields_for(Module::CurrentWeather).count(), 21);
        assert_eq!(catalog.fields_for(Module::AirQuality).count(), 9);
        assert!(catalog.fields().iter().all(|f| f.storage_column.starts_with("ow_")));

        let pm = catalog.field(Module::AirQuality, "pm2_5").unwrap();
        assert_eq!(pm.storage_column, "ow_pm2_5");
        assert_eq!(pm.api_path.as_str(), "list[0].components.pm2_5");

        assert_eq!(catalog.by_column("ow_pressure").unwrap().service_field_name, "pressure");
        assert!(catalog.conversion("hpa_to_inhg").is_some());
        assert!(catalog.unit_group("group_concentration").is_some());
        assert_eq!(
            catalog.tier(ComplexityTier::Everything).get(Module::AirQuality),
            Some(&ModuleSelection::All)
        );
        Ok(())
    }

    #[test]
    fn test_small_catalog() -> Result<(), CatalogError> {
        let catalog = FieldCatalog::from_toml_str(SMALL_CATALOG, "test")?;
        let rule = catalog.conversion("c_to_f").unwrap();
        assert_eq!(rule.formula.eval(100.0).unwrap(), 212.0);
        assert_eq!(catalog.modules_defining("temp"), vec![Module::CurrentWeather]);
        assert!(catalog.modules_defining("pm2_5").is_empty());
        Ok(())
    }

    #[test]
    fn test_rejects_undefined_conversion() {
        let text = SMALL_CATALOG.replace(
            "unit_conversion = \"c_to_f\"",
            "unit_conversion = \"k_to_f\"",
        );
        assert!(matches!(
            FieldCatalog::from_toml_str(&text, "test"),
            Err(CatalogError::UnknownConversion { .. })
        ));
    }

    #[test]
    fn test_rejects_unsafe_formula() {
        let text = SMALL_CATALOG.replace("x * 9 / 5 + 32", "exec(x)");
        assert!(matches!(
            FieldCatalog::from_toml_str(&text, "test"),
            Err(CatalogError::InvalidFormula { .. })
        ));
    }

    #[test]
    fn test_rejects_unprefixed_column() {
        let text = SMALL_CATALOG.replace("ow_temperature", "outTemp");
        assert!(matches!(
            FieldCatalog::from_toml_str(&text, "test"),
            Err(CatalogError::InvalidColumnName(_))
        ));
    }

    #[test]
    fn test_rejects_missing_and_invalid_tiers() {
        let missing =
            SMALL_CATALOG.replace("[tiers.everything]\n        current_weather = \"all\"", "");
        assert!(matches!(
            FieldCatalog::from_toml_str(&missing, "test"),
            Err(CatalogError::MissingTier(ComplexityTier::Everything))
        ));

        let invalid = SMALL_CATALOG.replacen(
            "current_weather = [\"temp\"]",
            "current_weather = [\"dew\"]",
            1,
        );
        assert!(matches!(
            FieldCatalog::from_toml_str(&invalid, "test"),
            Err(CatalogError::InvalidTier { tier: ComplexityTier::Minimal, .. })
        ));
    }
}
