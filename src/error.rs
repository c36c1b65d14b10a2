use crate::api::error::ApiError;
use crate::catalog::error::CatalogError;
use crate::config::error::ConfigError;
use crate::schema::error::SchemaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("None of the selected fields can be collected")]
    NoActiveFields,

    #[error("Failed to start the poller thread")]
    PollerSpawn(#[source] std::io::Error),
}

impl ServiceError {
    /// What an operator should do about this error.
    pub fn remediation(&self) -> &'static str {
        match self {
            ServiceError::Config(ConfigError::Disabled) => {
                "set `enable = true` in the [service] section to turn collection back on"
            }
            ServiceError::Config(ConfigError::Read(..) | ConfigError::Parse(..)) => {
                "run `openweather-archive --configure` to write a fresh configuration"
            }
            ServiceError::Config(_) => {
                "run `openweather-archive --configure` to complete the setup"
            }
            ServiceError::Schema(_) | ServiceError::NoActiveFields => {
                "run `openweather-archive --configure` to provision the archive columns"
            }
            ServiceError::Catalog(_) => "fix or remove `catalog_path` in the [service] section",
            ServiceError::Api(e) if e.needs_operator() => {
                concat!(
                    "check the API key and station coordinates, ",
                    "then run `openweather-archive --test-api`"
                )
            }
            ServiceError::Api(_) | ServiceError::PollerSpawn(_) => {
                "check the logs and restart the collector"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remediation_points_at_configure() {
        let error = ServiceError::from(ConfigError::MissingApiKey);
        assert_eq!(error.to_string(), "No OpenWeather API key is configured");
        assert!(error.remediation().contains("--configure"));
    }
}
