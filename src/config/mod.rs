pub mod error;
pub mod service_config;
