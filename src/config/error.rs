use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse configuration '{0}'")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Failed to serialize configuration")]
    Serialize(#[source] toml::ser::Error),

    #[error("Failed to write configuration '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine the configuration directory")]
    DirResolution,

    #[error("The collector is disabled in the configuration")]
    Disabled,

    #[error("No OpenWeather API key is configured")]
    MissingApiKey,

    #[error("No station coordinates are configured")]
    MissingCoordinates,

    #[error("Station coordinates ({latitude}, {longitude}) are out of range")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("The field selection is empty")]
    EmptySelection,

    #[error("No modules are enabled")]
    NoModulesEnabled,
}
