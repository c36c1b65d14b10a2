//! Interactive setup of the collector.
//!
//! Walks the operator through the API key, station location, units, field
//! selection and polling intervals. When a configuration already exists its
//! values are offered as defaults.

use crate::catalog::field_catalog::FieldCatalog;
use crate::config::service_config::ServiceConfig;
use crate::installer::plan::InstallPlan;
use crate::selection::field_selection::{
    estimate_count, FieldSelection, ModuleSelection, RawModuleSelection,
};
use crate::selection::tier::ComplexityTier;
use crate::types::module::Module;
use crate::types::unit_system::HostUnitSystem;
use dialoguer::{Confirm, Input, MultiSelect, Password, Select};
use std::path::PathBuf;

pub struct SetupWizard<'a> {
    catalog: &'a FieldCatalog,
    config_path: PathBuf,
    existing: Option<ServiceConfig>,
}

impl<'a> SetupWizard<'a> {
    pub fn new(
        catalog: &'a FieldCatalog,
        config_path: PathBuf,
        existing: Option<ServiceConfig>,
    ) -> Self {
        Self {
            catalog,
            config_path,
            existing,
        }
    }

    /// Asks every question and returns the plan, or `None` if the operator
    /// declined to write it.
    pub fn run(&self) -> anyhow::Result<Option<InstallPlan>> {
        let mut config = self.existing.clone().unwrap_or_default();
        if self.existing.is_some() {
            println!("Updating {}", self.config_path.display());
        }

        config.service.enable = true;
        config.service.api_key = self.ask_api_key(&config)?;
        self.ask_station(&mut config)?;
        config.service.unit_system = self.ask_unit_system(config.service.unit_system)?;
        self.ask_selection(&mut config)?;
        self.ask_intervals(&mut config)?;

        println!();
        println!("{}", self.summary(&config));
        let confirmed = Confirm::new()
            .with_prompt("Write this configuration?")
            .default(true)
            .interact()?;
        if !confirmed {
            return Ok(None);
        }

        Ok(Some(InstallPlan {
            config,
            config_path: self.config_path.clone(),
            reconfigure: self.existing.is_some(),
        }))
    }

    fn ask_api_key(&self, config: &ServiceConfig) -> anyhow::Result<String> {
        let current = config.api_key().ok().map(str::to_string);
        let prompt = if current.is_some() {
            "OpenWeather API key (leave empty to keep the current key)"
        } else {
            "OpenWeather API key"
        };
        let key = Password::new()
            .with_prompt(prompt)
            .allow_empty_password(current.is_some())
            .interact()?;

        match (key.trim(), current) {
            ("", Some(current)) => Ok(current),
            (key, _) => Ok(key.to_string()),
        }
    }

    fn ask_station(&self, config: &mut ServiceConfig) -> anyhow::Result<()> {
        let latitude = prompt_coordinate("Station latitude", config.station.latitude, 90.0)?;
        let longitude = prompt_coordinate("Station longitude", config.station.longitude, 180.0)?;
        config.station.latitude = Some(latitude);
        config.station.longitude = Some(longitude);
        Ok(())
    }

    fn ask_unit_system(&self, current: HostUnitSystem) -> anyhow::Result<HostUnitSystem> {
        let labels: Vec<String> = HostUnitSystem::ALL
            .iter()
            .map(|system| match system {
                HostUnitSystem::Us => "US (°F, mph, inHg)".to_string(),
                HostUnitSystem::Metric => "METRIC (°C, km/h, hPa)".to_string(),
                HostUnitSystem::MetricWx => "METRICWX (°C, m/s, hPa)".to_string(),
            })
            .collect();
        let default = HostUnitSystem::ALL
            .iter()
            .position(|system| *system == current)
            .unwrap_or(0);

        let idx = Select::new()
            .with_prompt("Unit system of the archive")
            .items(&labels)
            .default(default)
            .interact()?;
        Ok(HostUnitSystem::ALL[idx])
    }

    fn ask_selection(&self, config: &mut ServiceConfig) -> anyhow::Result<()> {
        let mut labels: Vec<String> = ComplexityTier::ALL
            .iter()
            .map(|tier| {
                let count = estimate_count(self.catalog.tier(*tier), self.catalog);
                format!("{tier} ({count} fields): {}", tier.description())
            })
            .collect();
        labels.push("custom: pick fields per module".to_string());

        let current = &config.field_selection;
        let default = match (&current.complexity, current.fields.is_empty()) {
            (Some(tier), true) => ComplexityTier::ALL
                .iter()
                .position(|candidate| candidate == tier)
                .unwrap_or(1),
            (_, false) => ComplexityTier::ALL.len(),
            (None, true) => 1,
        };

        let idx = Select::new()
            .with_prompt("Which fields should be collected?")
            .items(&labels)
            .default(default)
            .interact()?;

        if let Some(tier) = ComplexityTier::ALL.get(idx) {
            config.field_selection.complexity = Some(*tier);
            config.field_selection.fields.clear();
            for module in Module::ALL {
                config.module_mut(module).enable = self.catalog.tier(*tier).get(module).is_some();
            }
            return Ok(());
        }

        let selection = self.ask_custom_fields(config)?;
        if selection.is_empty() {
            anyhow::bail!("No fields selected, nothing to collect");
        }
        config.field_selection.complexity = None;
        config.field_selection.fields = selection.to_raw();
        for module in Module::ALL {
            config.module_mut(module).enable = selection.get(module).is_some();
        }
        Ok(())
    }

    fn ask_custom_fields(&self, config: &ServiceConfig) -> anyhow::Result<FieldSelection> {
        let mut selection = FieldSelection::new();

        for module in Module::ALL {
            let fields: Vec<_> = self.catalog.fields_for(module).collect();
            let labels: Vec<String> = fields
                .iter()
                .map(|field| format!("{} ({})", field.service_field_name, field.storage_column))
                .collect();
            let previous = config.field_selection.fields.get(module.name());
            let defaults: Vec<bool> = fields
                .iter()
                .map(|field| match previous {
                    Some(RawModuleSelection::Fields(names)) => {
                        names.contains(&field.service_field_name)
                    }
                    Some(RawModuleSelection::Keyword(keyword)) => {
                        keyword.eq_ignore_ascii_case("all")
                    }
                    Some(RawModuleSelection::Flag(flag)) => *flag,
                    None => false,
                })
                .collect();

            let chosen = MultiSelect::new()
                .with_prompt(format!("Fields from {module} (space=toggle, enter=confirm)"))
                .items(&labels)
                .defaults(&defaults)
                .interact()?;

            if chosen.len() == fields.len() {
                selection = selection.with(module, ModuleSelection::All);
            } else if !chosen.is_empty() {
                let names = chosen
                    .iter()
                    .map(|&i| fields[i].service_field_name.clone())
                    .collect();
                selection = selection.with(module, ModuleSelection::Fields(names));
            }
        }

        Ok(selection)
    }

    fn ask_intervals(&self, config: &mut ServiceConfig) -> anyhow::Result<()> {
        for module in config.enabled_modules() {
            let minimum = module.min_interval().as_secs();
            let current = config
                .module(module)
                .interval_secs
                .unwrap_or_else(|| module.default_interval().as_secs());
            let interval: u64 = Input::new()
                .with_prompt(format!("Seconds between {module} requests (minimum {minimum})"))
                .default(current.max(minimum))
                .validate_with(|value: &u64| {
                    if *value >= minimum {
                        Ok(())
                    } else {
                        Err(format!("must be at least {minimum}"))
                    }
                })
                .interact_text()?;
            config.module_mut(module).interval_secs = Some(interval);
        }
        Ok(())
    }

    fn summary(&self, config: &ServiceConfig) -> String {
        let mut lines = vec![
            format!("Configuration file: {}", self.config_path.display()),
            format!(
                "Station:            {}, {}",
                config.station.latitude.unwrap_or_default(),
                config.station.longitude.unwrap_or_default()
            ),
            format!("Unit system:        {}", config.service.unit_system),
        ];
        match config.resolve_selection(self.catalog) {
            Ok(resolution) => lines.push(format!(
                "Fields:             {}",
                estimate_count(&resolution.selection, self.catalog)
            )),
            Err(e) => lines.push(format!("Fields:             {e}")),
        }
        for module in config.enabled_modules() {
            lines.push(format!(
                "{:<20}every {}s",
                format!("{module}:"),
                config.interval(module).as_secs()
            ));
        }
        lines.join("\n")
    }
}

fn prompt_coordinate(prompt: &str, current: Option<f64>, limit: f64) -> anyhow::Result<f64> {
    let mut input = Input::<f64>::new()
        .with_prompt(prompt)
        .validate_with(move |value: &f64| {
            if (-limit..=limit).contains(value) {
                Ok(())
            } else {
                Err(format!("must be between -{limit} and {limit}"))
            }
        });
    if let Some(current) = current {
        input = input.default(current);
    }
    Ok(input.interact_text()?)
}
