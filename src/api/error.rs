use crate::types::module::Module;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("OpenWeather rejected the API key while requesting {module} (HTTP 401)")]
    Authentication { module: Module },

    #[error("OpenWeather could not find the station location while requesting {module} (HTTP 404)")]
    NotFound { module: Module },

    /// Network faults, timeouts and any other unexpected HTTP status.
    #[error("Request for {module} failed: {detail}")]
    Transport {
        module: Module,
        detail: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Failed to parse the {module} response body")]
    Format {
        module: Module,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to build the HTTP client")]
    ClientBuild(#[source] reqwest::Error),
}

impl ApiError {
    pub fn module(&self) -> Option<Module> {
        match self {
            ApiError::Authentication { module }
            | ApiError::NotFound { module }
            | ApiError::Transport { module, .. }
            | ApiError::Format { module, .. } => Some(*module),
            ApiError::ClientBuild(_) => None,
        }
    }

    /// `true` for errors that retrying cannot fix without operator action.
    pub fn needs_operator(&self) -> bool {
        matches!(self, ApiError::Authentication { .. } | ApiError::NotFound { .. })
    }
}
