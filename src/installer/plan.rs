use crate::catalog::field_catalog::FieldCatalog;
use crate::config::service_config::ServiceConfig;
use crate::error::ServiceError;
use crate::schema::archive_schema::{provision_columns, ProvisionReport};
use crate::schema::manifest::ManifestSchema;
use crate::selection::field_selection::expand;
use crate::selection::rejection::log_rejections;
use log::info;
use std::path::PathBuf;

/// A finished set of installer answers, ready to be written out.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallPlan {
    pub config: ServiceConfig,
    pub config_path: PathBuf,
    /// `true` when an existing configuration is being replaced.
    pub reconfigure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub provision: ProvisionReport,
    pub schema_path: PathBuf,
    pub field_count: usize,
    /// A running collector only picks up the new configuration after a restart.
    pub restart_required: bool,
}

impl InstallPlan {
    /// Provisions the selected columns of enabled modules, then saves the
    /// schema manifest and the configuration.
    ///
    /// Nothing is written if the configuration is incomplete.
    pub fn apply(&self, catalog: &FieldCatalog) -> Result<InstallOutcome, ServiceError> {
        self.config.validate()?;
        let resolution = self.config.resolve_selection(catalog)?;
        log_rejections("field selection", &resolution.rejections);

        let enabled = self.config.enabled_modules();
        let mut mapping = expand(&resolution.selection, catalog);
        mapping.retain(|column, _| {
            catalog
                .by_column(column)
                .is_some_and(|field| enabled.contains(&field.module))
        });
        if mapping.is_empty() {
            return Err(ServiceError::NoActiveFields);
        }

        let schema_path = self.config.schema_path(&self.config_path);
        let mut schema = ManifestSchema::load(&schema_path)?;
        let provision = provision_columns(&mut schema, &mapping)?;
        schema.save()?;
        self.config.save(&self.config_path)?;
        info!(
            "Wrote {} with {} fields ({} new columns)",
            self.config_path.display(),
            mapping.len(),
            provision.created.len()
        );

        Ok(InstallOutcome {
            provision,
            schema_path,
            field_count: mapping.len(),
            restart_required: self.reconfigure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::error::ConfigError;
    use crate::schema::archive_schema::ArchiveSchema;
    use crate::selection::tier::ComplexityTier;
    use crate::types::module::Module;

    fn plan(dir: &std::path::Path) -> InstallPlan {
        let mut config = ServiceConfig::default();
        config.service.api_key = "0123456789abcdef".to_string();
        config.station.latitude = Some(40.71);
        config.station.longitude = Some(-74.01);
        config.field_selection.complexity = Some(ComplexityTier::Standard);
        InstallPlan {
            config,
            config_path: dir.join("config.toml"),
            reconfigure: false,
        }
    }

    #[test]
    fn test_apply_provisions_and_saves() -> Result<(), ServiceError> {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FieldCatalog::embedded()?;
        let plan = plan(dir.path());

        let first = plan.apply(&catalog)?;
        let second = plan.apply(&catalog)?;

        assert_eq!(first.field_count, 9);
        assert_eq!(first.provision.created.len(), 9);
        assert!(second.provision.created.is_empty());
        assert_eq!(ServiceConfig::load(&plan.config_path)?, plan.config);
        assert_eq!(ManifestSchema::load(&first.schema_path)?.columns()?.len(), 9);
        assert!(!first.restart_required);
        Ok(())
    }

    #[test]
    fn test_disabled_module_columns_are_not_provisioned() -> Result<(), ServiceError> {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FieldCatalog::embedded()?;
        let mut plan = plan(dir.path());
        plan.config.module_mut(Module::AirQuality).enable = false;
        plan.reconfigure = true;

        let outcome = plan.apply(&catalog)?;

        assert_eq!(outcome.field_count, 7);
        assert!(!outcome.provision.created.contains(&"ow_pm2_5".to_string()));
        assert!(outcome.restart_required);
        Ok(())
    }

    #[test]
    fn test_incomplete_plan_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FieldCatalog::embedded().unwrap();
        let mut plan = plan(dir.path());
        plan.config.service.api_key.clear();

        assert!(matches!(
            plan.apply(&catalog),
            Err(ServiceError::Config(ConfigError::MissingApiKey))
        ));
        assert!(!plan.config_path.exists());
    }
}
