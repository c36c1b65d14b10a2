mod api;
mod catalog;
mod collector;
mod config;
mod error;
mod injector;
mod installer;
mod schema;
mod selection;
mod service;
mod types;
mod units;
mod utils;
mod verify;

pub use error::ServiceError;
pub use service::WeatherService;

pub use api::client::*;
pub use api::error::ApiError;
pub use api::extract::{extract, ModuleReading};

pub use catalog::api_path::{ApiPath, PathMiss, PathSegment};
pub use catalog::error::CatalogError;
pub use catalog::field::*;
pub use catalog::field_catalog::FieldCatalog;

pub use collector::error::SnapshotError;
pub use collector::poller::*;
pub use collector::snapshot::*;

pub use config::error::ConfigError;
pub use config::service_config::*;

pub use injector::*;

pub use installer::plan::*;
pub use installer::wizard::SetupWizard;

pub use schema::archive_schema::*;
pub use schema::error::SchemaError;
pub use schema::manifest::ManifestSchema;

pub use selection::active::ActiveFieldSet;
pub use selection::field_selection::*;
pub use selection::rejection::*;
pub use selection::tier::*;

pub use types::lat_lon::LatLon;
pub use types::module::*;
pub use types::record::ArchiveRecord;
pub use types::unit_system::*;
pub use types::value::FieldValue;

pub use units::adapter::*;
pub use units::expression::*;
pub use units::registry::*;

pub use verify::*;
