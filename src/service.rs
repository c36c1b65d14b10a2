//! Startup and lifetime of the collector inside a host process.

use crate::api::client::ApiClient;
use crate::catalog::field_catalog::FieldCatalog;
use crate::collector::poller::{Poller, PollerHandle, PollerSettings, WeatherSource};
use crate::collector::snapshot::{LatestSnapshot, SnapshotView};
use crate::config::service_config::ServiceConfig;
use crate::error::ServiceError;
use crate::injector::RecordInjector;
use crate::schema::archive_schema::ArchiveSchema;
use crate::selection::active::ActiveFieldSet;
use crate::selection::rejection::log_rejections;
use crate::types::record::ArchiveRecord;
use crate::units::adapter::{api_units_for, UnitAdapter};
use crate::units::registry::{register_unit_groups, UnitRegistry};
use bon::bon;
use log::{error, info};
use std::sync::Arc;

enum ServiceState {
    Disabled(ServiceError),
    Running {
        snapshot: Arc<LatestSnapshot>,
        injector: RecordInjector,
        poller: PollerHandle,
    },
}

/// The running collector: a background poller plus the record injector.
///
/// Configuration or schema problems never stop the host. They leave the
/// service disabled, which turns [`WeatherService::inject`] into a no-op.
pub struct WeatherService {
    active: Arc<ActiveFieldSet>,
    state: ServiceState,
}

#[bon]
impl WeatherService {
    /// Starts the collector.
    ///
    /// # Arguments
    ///
    /// * `.config(&ServiceConfig)`: **Required.** Loaded configuration.
    /// * `.catalog(Arc<FieldCatalog>)`: **Required.** Field definitions and conversions.
    /// * `.schema(&dyn ArchiveSchema)`: **Required.** The host archive's current columns.
    /// * `.registry(&mut dyn UnitRegistry)`: **Required.** Receives the unit groups of active fields.
    /// * `.source(Box<dyn WeatherSource>)`: Optional. Defaults to an [`ApiClient`] built from `config`.
    /// * `.poller_settings(PollerSettings)`: Optional. Tick and cooldown of the poller.
    ///
    /// Never fails. Check [`WeatherService::is_enabled`] for the outcome.
    #[builder]
    pub fn start(
        config: &ServiceConfig,
        catalog: Arc<FieldCatalog>,
        schema: &dyn ArchiveSchema,
        registry: &mut dyn UnitRegistry,
        source: Option<Box<dyn WeatherSource>>,
        poller_settings: Option<PollerSettings>,
    ) -> Self {
        match Self::try_start(config, catalog, schema, registry, source, poller_settings) {
            Ok(service) => service,
            Err(reason) => {
                error!(
                    "OpenWeather collection disabled: {reason}. To fix this, {}",
                    reason.remediation()
                );
                Self {
                    active: Arc::new(ActiveFieldSet::empty()),
                    state: ServiceState::Disabled(reason),
                }
            }
        }
    }

    fn try_start(
        config: &ServiceConfig,
        catalog: Arc<FieldCatalog>,
        schema: &dyn ArchiveSchema,
        registry: &mut dyn UnitRegistry,
        source: Option<Box<dyn WeatherSource>>,
        poller_settings: Option<PollerSettings>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;

        let resolution = config.resolve_selection(&catalog)?;
        log_rejections("field selection", &resolution.rejections);

        let columns = schema.columns()?;
        let (active, rejections) = ActiveFieldSet::validate(
            &resolution.selection,
            &catalog,
            &columns,
            &config.enabled_modules(),
        );
        log_rejections("archive schema", &rejections);
        if active.is_empty() {
            return Err(ServiceError::NoActiveFields);
        }

        let host_units = config.service.unit_system;
        let source = match source {
            Some(source) => source,
            None => Box::new(
                ApiClient::builder()
                    .api_key(config.api_key()?)
                    .location(config.coordinates()?)
                    .units(api_units_for(host_units))
                    .timeout(config.timeout())
                    .build()?,
            ),
        };
        let settings = poller_settings.unwrap_or(PollerSettings {
            log_success: config.service.log_success,
            ..PollerSettings::default()
        });

        let snapshot = Arc::new(LatestSnapshot::new());
        let mut poller = Poller::new(source, Arc::clone(&snapshot), settings);
        for module in active.modules() {
            let interval = config.interval(module);
            info!(
                "Collecting {} fields from {} every {}s",
                active.fields(module).len(),
                module,
                interval.as_secs()
            );
            poller.add_module(module, interval, active.fields(module).to_vec());
        }
        let poller = poller.spawn().map_err(ServiceError::PollerSpawn)?;

        // Last step that touches the host, so a failed start leaves it unchanged.
        let assigned = register_unit_groups(registry, &catalog, &active);
        info!("Assigned unit groups to {assigned} columns");

        let active = Arc::new(active);
        let injector = RecordInjector::new(
            Arc::clone(&active),
            Arc::clone(&snapshot),
            UnitAdapter::new(catalog, host_units),
            config.stale_after(),
        );
        info!("OpenWeather collection started with {} fields", active.len());

        Ok(Self {
            active,
            state: ServiceState::Running {
                snapshot,
                injector,
                poller,
            },
        })
    }
}

impl WeatherService {
    pub fn is_enabled(&self) -> bool {
        matches!(self.state, ServiceState::Running { .. })
    }

    pub fn disabled_reason(&self) -> Option<&ServiceError> {
        match &self.state {
            ServiceState::Disabled(reason) => Some(reason),
            ServiceState::Running { .. } => None,
        }
    }

    /// Empty while disabled.
    pub fn active_fields(&self) -> &ActiveFieldSet {
        &self.active
    }

    /// Adds the latest readings to `record`. Returns the number of columns written.
    pub fn inject(&self, record: &mut ArchiveRecord) -> usize {
        match &self.state {
            ServiceState::Running { injector, .. } => injector.inject(record),
            ServiceState::Disabled(_) => 0,
        }
    }

    /// A copy of the latest readings, if any have been collected.
    pub fn snapshot(&self) -> Option<SnapshotView> {
        match &self.state {
            ServiceState::Running { snapshot, .. } => snapshot.view().ok().flatten(),
            ServiceState::Disabled(_) => None,
        }
    }

    /// Stops the poller and waits for it to exit.
    pub fn shutdown(mut self) {
        if let ServiceState::Running { poller, .. } = &mut self.state {
            poller.stop();
            info!("OpenWeather collection stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ApiError;
    use crate::api::extract::{extract, ModuleReading};
    use crate::catalog::field::FieldDefinition;
    use crate::config::error::ConfigError;
    use crate::schema::archive_schema::{provision_columns, MemorySchema};
    use crate::selection::field_selection::expand;
    use crate::types::module::Module;
    use crate::types::unit_system::HostUnitSystem;
    use crate::types::value::FieldValue;
    use crate::units::registry::MemoryUnitRegistry;
    use serde_json::{json, Value};
    use std::time::{Duration, Instant};

    const CONFIG: &str = r#"
        [service]
        api_key = "test-key"
        unit_system = "METRICWX"

        [station]
        latitude = 52.37
        longitude = 4.89

        [field_selection.fields]
        current_weather = ["temp", "humidity"]
        air_quality = ["pm2_5"]
    "#;

    struct StaticSource;

    impl WeatherSource for StaticSource {
        fn collect(
            &self,
            module: Module,
            fields: &[FieldDefinition],
        ) -> Result<ModuleReading, ApiError> {
            let body: Value = match module {
                Module::CurrentWeather => {
                    json!({"main": {"temp": 20.5, "humidity": 65, "pressure": 1013.2}})
                }
                Module::AirQuality => {
                    json!({"list": [{"main": {"aqi": 2}, "components": {"pm2_5": 8.1}}]})
                }
            };
            Ok(extract(module, &body, fields))
        }
    }

    fn setup(config: &ServiceConfig) -> (Arc<FieldCatalog>, MemorySchema) {
        let catalog = Arc::new(FieldCatalog::embedded().unwrap());
        let mut schema = MemorySchema::new();
        if let Ok(resolution) = config.resolve_selection(&catalog) {
            provision_columns(&mut schema, &expand(&resolution.selection, &catalog)).unwrap();
        }
        (catalog, schema)
    }

    fn fast_poller() -> PollerSettings {
        PollerSettings {
            tick: Duration::from_millis(10),
            ..PollerSettings::default()
        }
    }

    #[test]
    fn test_collects_and_injects_selected_fields() {
        let config: ServiceConfig = toml::from_str(CONFIG).unwrap();
        let (catalog, schema) = setup(&config);
        let mut registry = MemoryUnitRegistry::new();

        let service = WeatherService::start()
            .config(&config)
            .catalog(catalog)
            .schema(&schema)
            .registry(&mut registry)
            .source(Box::new(StaticSource))
            .poller_settings(fast_poller())
            .call();
        assert!(service.is_enabled());
        assert_eq!(service.active_fields().len(), 3);

        let deadline = Instant::now() + Duration::from_secs(5);
        while service.snapshot().map_or(0, |view| view.len()) < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        let mut record = ArchiveRecord::new(1_700_000_000, HostUnitSystem::MetricWx, 5);
        let written = service.inject(&mut record);

        assert_eq!(written, 3);
        assert_eq!(record.get("ow_temperature"), Some(&Some(FieldValue::Real(20.5))));
        assert_eq!(record.get("ow_humidity"), Some(&Some(FieldValue::Integer(65))));
        assert_eq!(record.get("ow_pm2_5"), Some(&Some(FieldValue::Real(8.1))));
        assert_eq!(record.get("ow_pressure"), None);
        assert_eq!(registry.group_of("ow_pm2_5"), Some("group_concentration"));
        service.shutdown();
    }

    #[test]
    fn test_placeholder_key_disables_service() {
        let mut config: ServiceConfig = toml::from_str(CONFIG).unwrap();
        config.service.api_key = "YOUR_API_KEY".to_string();
        let (catalog, schema) = setup(&config);
        let mut registry = MemoryUnitRegistry::new();

        let service = WeatherService::start()
            .config(&config)
            .catalog(catalog)
            .schema(&schema)
            .registry(&mut registry)
            .source(Box::new(StaticSource))
            .call();

        assert!(!service.is_enabled());
        assert!(matches!(
            service.disabled_reason(),
            Some(ServiceError::Config(ConfigError::MissingApiKey))
        ));
        assert!(service.active_fields().is_empty());
        assert_eq!(service.snapshot(), None);
        assert_eq!(registry, MemoryUnitRegistry::new());

        let mut record = ArchiveRecord::new(1_700_000_000, HostUnitSystem::Us, 5);
        let before = record.clone();
        assert_eq!(service.inject(&mut record), 0);
        assert_eq!(record, before);
    }

    #[test]
    fn test_unprovisioned_schema_disables_service() {
        let config: ServiceConfig = toml::from_str(CONFIG).unwrap();
        let catalog = Arc::new(FieldCatalog::embedded().unwrap());
        let schema =
            MemorySchema::with_columns([("dateTime", crate::catalog::field::StorageType::Integer)]);
        let mut registry = MemoryUnitRegistry::new();

        let service = WeatherService::start()
            .config(&config)
            .catalog(catalog)
            .schema(&schema)
            .registry(&mut registry)
            .source(Box::new(StaticSource))
            .call();

        assert!(matches!(service.disabled_reason(), Some(ServiceError::NoActiveFields)));
        assert_eq!(registry, MemoryUnitRegistry::new());
        assert!(service
            .disabled_reason()
            .is_some_and(|reason| reason.remediation().contains("--configure")));
    }
}
