//! Operator checks behind `--test-install` and `--test-api`.

use crate::api::client::ApiClient;
use crate::catalog::field_catalog::FieldCatalog;
use crate::collector::poller::WeatherSource;
use crate::config::service_config::ServiceConfig;
use crate::schema::archive_schema::ArchiveSchema;
use crate::schema::manifest::ManifestSchema;
use crate::selection::active::ActiveFieldSet;
use crate::selection::field_selection::selected_fields;
use crate::selection::rejection::RejectionReason;
use crate::units::adapter::api_units_for;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub checks: Vec<CheckResult>,
}

impl CheckReport {
    fn push(&mut self, check: CheckResult) {
        self.checks.push(check);
    }

    pub fn passed(&self) -> bool {
        self.checks.iter().all(|check| check.passed)
    }

    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for check in &self.checks {
            let status = if check.passed { "PASS" } else { "FAIL" };
            writeln!(f, "[{status}] {}: {}", check.name, check.detail)?;
        }
        let failed = self.checks.iter().filter(|check| !check.passed).count();
        write!(f, "{} checks, {} failed", self.checks.len(), failed)
    }
}

/// Checks the configuration, catalog, selection and schema without any network access.
///
/// Stops at the first check later checks depend on.
pub fn verify_installation(config_path: &Path) -> CheckReport {
    let mut report = CheckReport::default();

    let config = match ServiceConfig::load(config_path) {
        Ok(config) => {
            report.push(CheckResult::pass("configuration", config_path.display().to_string()));
            config
        }
        Err(e) => {
            report.push(CheckResult::fail("configuration", e.to_string()));
            return report;
        }
    };

    report.push(match config.api_key() {
        Ok(_) => CheckResult::pass("api key", "present"),
        Err(e) => CheckResult::fail("api key", e.to_string()),
    });
    report.push(match config.coordinates() {
        Ok(location) => CheckResult::pass("station", format!("{}, {}", location.0, location.1)),
        Err(e) => CheckResult::fail("station", e.to_string()),
    });

    let catalog = match config.load_catalog() {
        Ok(catalog) => {
            report.push(CheckResult::pass(
                "field catalog",
                format!("{} fields defined", catalog.fields().len()),
            ));
            catalog
        }
        Err(e) => {
            report.push(CheckResult::fail("field catalog", e.to_string()));
            return report;
        }
    };

    let resolution = match config.resolve_selection(&catalog) {
        Ok(resolution) => {
            let mut detail = format!(
                "{} fields selected",
                selected_fields(&resolution.selection, &catalog).len()
            );
            if !resolution.rejections.is_empty() {
                detail.push_str(&format!(", {} entries ignored", resolution.rejections.len()));
            }
            report.push(CheckResult::pass("field selection", detail));
            resolution
        }
        Err(e) => {
            report.push(CheckResult::fail("field selection", e.to_string()));
            return report;
        }
    };

    let schema_path = config.schema_path(config_path);
    let columns = match ManifestSchema::load(&schema_path).and_then(|schema| schema.columns()) {
        Ok(columns) => columns,
        Err(e) => {
            report.push(CheckResult::fail("archive columns", e.to_string()));
            return report;
        }
    };
    let (_, rejections) = ActiveFieldSet::validate(
        &resolution.selection,
        &catalog,
        &columns,
        &config.enabled_modules(),
    );
    let missing: Vec<&str> = rejections
        .iter()
        .filter_map(|rejection| match &rejection.reason {
            RejectionReason::MissingColumn(column) => Some(column.as_str()),
            _ => None,
        })
        .collect();
    report.push(if missing.is_empty() {
        CheckResult::pass(
            "archive columns",
            format!("all present in {}", schema_path.display()),
        )
    } else {
        CheckResult::fail("archive columns", format!("missing {}", missing.join(", ")))
    });
    let disabled = rejections
        .iter()
        .filter(|rejection| rejection.reason == RejectionReason::ModuleDisabled)
        .count();
    if disabled > 0 {
        report.push(CheckResult::pass(
            "modules",
            format!("{disabled} selected fields belong to disabled modules"),
        ));
    }

    report
}

/// Collects every enabled module once from the live API.
pub fn verify_api(config: &ServiceConfig, catalog: &FieldCatalog) -> CheckReport {
    let client = config.api_key().map_err(|e| e.to_string()).and_then(|key| {
        let location = config.coordinates().map_err(|e| e.to_string())?;
        ApiClient::builder()
            .api_key(key)
            .location(location)
            .units(api_units_for(config.service.unit_system))
            .timeout(config.timeout())
            .build()
            .map_err(|e| e.to_string())
    });

    match client {
        Ok(client) => verify_api_with(&client, config, catalog),
        Err(detail) => CheckReport {
            checks: vec![CheckResult::fail("api client", detail)],
        },
    }
}

/// Like [`verify_api`] with an arbitrary source.
pub fn verify_api_with(
    source: &dyn WeatherSource,
    config: &ServiceConfig,
    catalog: &FieldCatalog,
) -> CheckReport {
    let mut report = CheckReport::default();
    let selection = match config.resolve_selection(catalog) {
        Ok(resolution) => resolution.selection,
        Err(e) => {
            report.push(CheckResult::fail("field selection", e.to_string()));
            return report;
        }
    };
    let fields: Vec<_> = selected_fields(&selection, catalog)
        .into_iter()
        .cloned()
        .collect();

    for module in config.enabled_modules() {
        let requested = fields.iter().filter(|field| field.module == module).count();
        if requested == 0 {
            continue;
        }
        report.push(match source.collect(module, &fields) {
            Ok(reading) if reading.is_empty() => CheckResult::fail(
                module.name(),
                format!("none of {requested} fields in the response"),
            ),
            Ok(reading) => CheckResult::pass(
                module.name(),
                format!("{} of {requested} fields collected", reading.values.len()),
            ),
            Err(e) => CheckResult::fail(module.name(), e.to_string()),
        });
    }

    if report.checks.is_empty() {
        report.push(CheckResult::fail("modules", "no enabled module has selected fields"));
    }
    report
}
