//! Blocking client for the OpenWeather current-weather and air-pollution endpoints.

use crate::api::error::ApiError;
use crate::api::extract::{extract, ModuleReading};
use crate::catalog::field::FieldDefinition;
use crate::collector::poller::WeatherSource;
use crate::types::lat_lon::LatLon;
use crate::types::module::Module;
use crate::types::unit_system::ApiUnits;
use bon::bon;
use log::debug;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Performs one HTTP GET per module for a fixed station location.
///
/// Requests block the calling thread for at most the configured timeout.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    api_key: String,
    location: LatLon,
    units: ApiUnits,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("location", &self.location)
            .field("units", &self.units)
            .finish_non_exhaustive()
    }
}

#[bon]
impl ApiClient {
    /// Creates a client.
    ///
    /// # Arguments
    ///
    /// * `.api_key(..)`: **Required.** The OpenWeather API key.
    /// * `.location(LatLon)`: **Required.** Station coordinates sent with every request.
    /// * `.units(ApiUnits)`: **Required.** Unit mode requested from the weather endpoint.
    /// * `.timeout(Duration)`: Optional. Per-request timeout, defaults to 30 seconds.
    /// * `.base_url(..)`: Optional. Defaults to [`DEFAULT_BASE_URL`].
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ClientBuild`] if the TLS backend cannot be initialized.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use openweather_archive::{ApiClient, ApiUnits, LatLon, Module};
    ///
    /// let client = ApiClient::builder()
    ///     .api_key("0123456789abcdef")
    ///     .location(LatLon(52.37, 4.89))
    ///     .units(ApiUnits::Metric)
    ///     .build()?;
    /// let body = client.fetch(Module::CurrentWeather)?;
    /// println!("{body:#}");
    /// # Ok::<(), openweather_archive::ApiError>(())
    /// ```
    #[builder]
    pub fn new(
        #[builder(into)] api_key: String,
        location: LatLon,
        units: ApiUnits,
        timeout: Option<Duration>,
        #[builder(into)] base_url: Option<String>,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .user_agent(concat!("openweather-archive/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::ClientBuild)?;
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            http,
            base_url,
            api_key,
            location,
            units,
        })
    }

    /// Requests `module` and returns the parsed JSON body.
    pub fn fetch(&self, module: Module) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, module.endpoint_path());
        let mut query = vec![
            ("lat", self.location.0.to_string()),
            ("lon", self.location.1.to_string()),
            ("appid", self.api_key.clone()),
        ];
        if module.sends_units() {
            query.push(("units", self.units.as_param().to_string()));
        }
        // The query holds the API key, so only the bare URL is logged.
        debug!("Requesting {} from {}", module, url);

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .map_err(|e| transport_error(module, e))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => return Err(ApiError::Authentication { module }),
            StatusCode::NOT_FOUND => return Err(ApiError::NotFound { module }),
            status => {
                return Err(ApiError::Transport {
                    module,
                    detail: format!("unexpected HTTP status {status}"),
                    source: None,
                })
            }
        }

        let body = response.text().map_err(|e| transport_error(module, e))?;
        serde_json::from_str(&body).map_err(|source| ApiError::Format { module, source })
    }

    /// Requests `module` and extracts `fields` from the response.
    pub fn collect(
        &self,
        module: Module,
        fields: &[FieldDefinition],
    ) -> Result<ModuleReading, ApiError> {
        let body = self.fetch(module)?;
        Ok(extract(module, &body, fields))
    }
}

impl WeatherSource for ApiClient {
    fn collect(
        &self,
        module: Module,
        fields: &[FieldDefinition],
    ) -> Result<ModuleReading, ApiError> {
        ApiClient::collect(self, module, fields)
    }
}

fn transport_error(module: Module, error: reqwest::Error) -> ApiError {
    // reqwest includes the full URL in its messages, and with it the API key.
    let error = error.without_url();
    let detail = if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        "could not connect".to_string()
    } else {
        error.to_string()
    };
    ApiError::Transport {
        module,
        detail,
        source: Some(error),
    }
}
