//! Defines the OpenWeather API modules a field can be collected from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// A named group of collectable fields served by one OpenWeather endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    /// Current conditions from `/data/2.5/weather`.
    CurrentWeather,
    /// Pollutant concentrations and air quality index from `/data/2.5/air_pollution`.
    AirQuality,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown module '{0}', expected 'current_weather' or 'air_quality'")]
pub struct ParseModuleError(pub String);

impl Module {
    pub const ALL: [Module; 2] = [Module::CurrentWeather, Module::AirQuality];

    pub fn name(&self) -> &'static str {
        match self {
            Module::CurrentWeather => "current_weather",
            Module::AirQuality => "air_quality",
        }
    }

    pub(crate) fn endpoint_path(&self) -> &'static str {
        match self {
            Module::CurrentWeather => "/data/2.5/weather",
            Module::AirQuality => "/data/2.5/air_pollution",
        }
    }

    /// Only the weather endpoint understands the `units` query parameter.
    pub(crate) fn sends_units(&self) -> bool {
        matches!(self, Module::CurrentWeather)
    }

    /// Shortest collection interval accepted for this module.
    ///
    /// OpenWeather refreshes current conditions roughly every ten minutes and
    /// air pollution data far less often, so polling faster only burns quota.
    pub fn min_interval(&self) -> Duration {
        match self {
            Module::CurrentWeather => Duration::from_secs(600),
            Module::AirQuality => Duration::from_secs(1800),
        }
    }

    pub fn default_interval(&self) -> Duration {
        match self {
            Module::CurrentWeather => Duration::from_secs(3600),
            Module::AirQuality => Duration::from_secs(7200),
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Module {
    type Err = ParseModuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "current_weather" => Ok(Module::CurrentWeather),
            "air_quality" => Ok(Module::AirQuality),
            other => Err(ParseModuleError(other.to_string())),
        }
    }
}
