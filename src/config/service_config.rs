//! The collector's TOML configuration file.

use crate::catalog::error::CatalogError;
use crate::catalog::field_catalog::FieldCatalog;
use crate::config::error::ConfigError;
use crate::selection::field_selection::{resolve, RawSelection, Resolution, SelectionRequest};
use crate::selection::tier::ComplexityTier;
use crate::types::lat_lon::LatLon;
use crate::types::module::Module;
use crate::types::unit_system::HostUnitSystem;
use crate::utils::{get_config_dir, write_atomically};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const SCHEMA_FILE_NAME: &str = "archive_schema.toml";

/// Key values written by templates and older installers that mean "not set".
const PLACEHOLDER_KEYS: [&str; 2] = ["YOUR_API_KEY", "REPLACE_ME"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default)]
    pub station: StationSection,
    #[serde(default)]
    pub modules: ModulesSection,
    #[serde(default)]
    pub field_selection: SelectionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSection {
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_unit_system")]
    pub unit_system: HostUnitSystem,
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    #[serde(default)]
    pub log_success: bool,
    /// Replaces the built-in field catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,
    /// Schema manifest used by the standalone binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<PathBuf>,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            enable: true,
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
            unit_system: default_unit_system(),
            stale_after_secs: default_stale_after_secs(),
            log_success: false,
            catalog_path: None,
            schema_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StationSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulesSection {
    #[serde(default)]
    pub current_weather: ModuleSection,
    #[serde(default)]
    pub air_quality: ModuleSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSection {
    #[serde(default = "default_true")]
    pub enable: bool,
    /// Falls back to the module's default interval when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
}

impl Default for ModuleSection {
    fn default() -> Self {
        Self {
            enable: true,
            interval_secs: None,
        }
    }
}

/// Either a preset tier or explicit per-module fields. Explicit fields win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<ComplexityTier>,
    #[serde(default, skip_serializing_if = "RawSelection::is_empty")]
    pub fields: RawSelection,
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_unit_system() -> HostUnitSystem {
    HostUnitSystem::MetricWx
}

fn default_stale_after_secs() -> u64 {
    10800
}

impl ServiceConfig {
    /// `<system config dir>/openweather-archive/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        get_config_dir()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::DirResolution)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    /// Writes the configuration through a temporary file and a rename.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        write_atomically(path, text.as_bytes())
            .map_err(|e| ConfigError::Write(path.to_path_buf(), e))
    }

    /// Checks everything the service needs before it can start collecting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.service.enable {
            return Err(ConfigError::Disabled);
        }
        self.api_key()?;
        self.coordinates()?;
        if self.enabled_modules().is_empty() {
            return Err(ConfigError::NoModulesEnabled);
        }
        Ok(())
    }

    /// The API key, rejecting blanks and template placeholders.
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        let key = self.service.api_key.trim();
        let is_placeholder = PLACEHOLDER_KEYS
            .iter()
            .any(|placeholder| key.eq_ignore_ascii_case(placeholder));
        if key.is_empty() || is_placeholder {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(key)
    }

    pub fn coordinates(&self) -> Result<LatLon, ConfigError> {
        let (Some(latitude), Some(longitude)) = (self.station.latitude, self.station.longitude)
        else {
            return Err(ConfigError::MissingCoordinates);
        };
        let location = LatLon(latitude, longitude);
        if !location.is_valid() {
            return Err(ConfigError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }
        Ok(location)
    }

    pub fn module(&self, module: Module) -> &ModuleSection {
        match module {
            Module::CurrentWeather => &self.modules.current_weather,
            Module::AirQuality => &self.modules.air_quality,
        }
    }

    pub fn module_mut(&mut self, module: Module) -> &mut ModuleSection {
        match module {
            Module::CurrentWeather => &mut self.modules.current_weather,
            Module::AirQuality => &mut self.modules.air_quality,
        }
    }

    pub fn enabled_modules(&self) -> BTreeSet<Module> {
        Module::ALL
            .into_iter()
            .filter(|module| self.module(*module).enable)
            .collect()
    }

    /// The collection interval of `module`, raised to its minimum if set lower.
    pub fn interval(&self, module: Module) -> Duration {
        let configured = self
            .module(module)
            .interval_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| module.default_interval());
        let minimum = module.min_interval();
        if configured < minimum {
            warn!(
                "Interval of {}s for {} is below the API limit, using {}s",
                configured.as_secs(),
                module,
                minimum.as_secs()
            );
            return minimum;
        }
        configured
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.service.timeout_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.service.stale_after_secs)
    }

    /// The configured schema manifest, or one next to the configuration file.
    pub fn schema_path(&self, config_path: &Path) -> PathBuf {
        self.service
            .schema_path
            .clone()
            .unwrap_or_else(|| config_path.with_file_name(SCHEMA_FILE_NAME))
    }

    pub fn load_catalog(&self) -> Result<FieldCatalog, CatalogError> {
        FieldCatalog::load_or_embedded(self.service.catalog_path.as_deref())
    }

    pub fn selection_request(&self) -> Option<SelectionRequest> {
        let selection = &self.field_selection;
        if !selection.fields.is_empty() {
            Some(SelectionRequest::Raw(selection.fields.clone()))
        } else {
            selection.complexity.map(SelectionRequest::Tier)
        }
    }

    /// Resolves the configured selection against `catalog`.
    ///
    /// Fails when nothing is configured or nothing valid survives.
    pub fn resolve_selection(&self, catalog: &FieldCatalog) -> Result<Resolution, ConfigError> {
        let request = self.selection_request().ok_or(ConfigError::EmptySelection)?;
        let resolution = resolve(&request, catalog);
        if resolution.selection.is_empty() {
            return Err(ConfigError::EmptySelection);
        }
        Ok(resolution)
    }
}
