use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A named preset that expands to a fixed field selection.
///
/// The field lists themselves live in the field catalog, so tiers grow with
/// the catalog instead of being baked into code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    Minimal,
    Standard,
    Comprehensive,
    Everything,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown complexity tier '{0}', expected minimal, standard, comprehensive or everything")]
pub struct ParseTierError(pub String);

impl ComplexityTier {
    pub const ALL: [ComplexityTier; 4] = [
        ComplexityTier::Minimal,
        ComplexityTier::Standard,
        ComplexityTier::Comprehensive,
        ComplexityTier::Everything,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ComplexityTier::Minimal => "minimal",
            ComplexityTier::Standard => "standard",
            ComplexityTier::Comprehensive => "comprehensive",
            ComplexityTier::Everything => "everything",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ComplexityTier::Minimal => "core conditions and the air quality index",
            ComplexityTier::Standard => "adds feels-like, cloud cover and PM2.5",
            ComplexityTier::Comprehensive => "adds extremes, gusts, visibility, rain and PM10",
            ComplexityTier::Everything => "every field the catalog defines",
        }
    }
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ComplexityTier {
    type Err = ParseTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        ComplexityTier::ALL
            .into_iter()
            .find(|tier| tier.name() == lowered)
            .ok_or_else(|| ParseTierError(s.to_string()))
    }
}
