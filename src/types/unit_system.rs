//! Unit systems on both sides of the collector: the host's archive unit system
//! and the unit mode requested from the OpenWeather API.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The unit system the host archive stores its records in.
///
/// The numeric codes match the `usUnits` value carried by archive records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HostUnitSystem {
    /// US customary: °F, inHg, mph, inches.
    #[serde(rename = "US")]
    Us,
    /// Metric with wind in km/h and rain in cm.
    #[serde(rename = "METRIC")]
    Metric,
    /// Metric with wind in m/s and rain in mm.
    #[serde(rename = "METRICWX")]
    MetricWx,
}

impl HostUnitSystem {
    pub const ALL: [HostUnitSystem; 3] = [
        HostUnitSystem::Us,
        HostUnitSystem::Metric,
        HostUnitSystem::MetricWx,
    ];

    pub fn code(&self) -> i32 {
        match self {
            HostUnitSystem::Us => 1,
            HostUnitSystem::Metric => 16,
            HostUnitSystem::MetricWx => 17,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(HostUnitSystem::Us),
            16 => Some(HostUnitSystem::Metric),
            17 => Some(HostUnitSystem::MetricWx),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HostUnitSystem::Us => "US",
            HostUnitSystem::Metric => "METRIC",
            HostUnitSystem::MetricWx => "METRICWX",
        }
    }
}

impl fmt::Display for HostUnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The `units` query parameter understood by the OpenWeather weather endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiUnits {
    /// °F and mph.
    Imperial,
    /// °C and m/s.
    Metric,
    /// Kelvin and m/s.
    Standard,
}

impl ApiUnits {
    pub fn as_param(&self) -> &'static str {
        match self {
            ApiUnits::Imperial => "imperial",
            ApiUnits::Metric => "metric",
            ApiUnits::Standard => "standard",
        }
    }
}

impl fmt::Display for ApiUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}
