use anyhow::Context;
use chrono::Utc;
use clap::{ArgGroup, CommandFactory, Parser};
use log::{info, warn};
use openweather_archive::{
    verify_api, verify_installation, ArchiveRecord, FieldCatalog, ManifestSchema,
    MemoryUnitRegistry, ServiceConfig, SetupWizard, WeatherService,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Collects OpenWeather current conditions and air quality into weather archive records.
#[derive(Parser, Debug)]
#[command(name = "openweather-archive")]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("action").args(["configure", "test_install", "test_api", "run"])
))]
struct Args {
    /// Configuration file (defaults to the system config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Create or update the configuration and provision archive columns
    #[arg(long)]
    configure: bool,

    /// Check configuration, field selection and archive columns
    #[arg(long)]
    test_install: bool,

    /// Request every enabled module once from the live API
    #[arg(long)]
    test_api: bool,

    /// Collect in the background and print one archive record per interval
    #[arg(long)]
    run: bool,

    /// Seconds between records printed by --run
    #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(60..))]
    archive_interval: u64,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config_path = match args.config {
        Some(path) => path,
        None => ServiceConfig::default_path()?,
    };

    if args.configure {
        configure(&config_path)
    } else if args.test_install {
        let report = verify_installation(&config_path);
        println!("{report}");
        Ok(ExitCode::from(report.exit_code() as u8))
    } else if args.test_api {
        let config = load_config(&config_path)?;
        let catalog = config.load_catalog()?;
        let report = verify_api(&config, &catalog);
        println!("{report}");
        Ok(ExitCode::from(report.exit_code() as u8))
    } else if args.run {
        run_standalone(&config_path, Duration::from_secs(args.archive_interval))
    } else {
        Args::command().print_help()?;
        Ok(ExitCode::SUCCESS)
    }
}

fn load_config(path: &Path) -> anyhow::Result<ServiceConfig> {
    ServiceConfig::load(path).with_context(|| {
        format!(
            "No usable configuration at {}, run `openweather-archive --configure` first",
            path.display()
        )
    })
}

fn configure(config_path: &Path) -> anyhow::Result<ExitCode> {
    let existing = if config_path.exists() {
        match ServiceConfig::load(config_path) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Ignoring the existing configuration: {e}");
                None
            }
        }
    } else {
        None
    };
    let catalog = match &existing {
        Some(config) => config.load_catalog()?,
        None => FieldCatalog::embedded()?,
    };

    let wizard = SetupWizard::new(&catalog, config_path.to_path_buf(), existing);
    let Some(plan) = wizard.run()? else {
        println!("Nothing was written.");
        return Ok(ExitCode::SUCCESS);
    };

    let outcome = plan
        .apply(&catalog)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!(
        "Configured {} fields. Added {} columns to {}.",
        outcome.field_count,
        outcome.provision.created.len(),
        outcome.schema_path.display()
    );
    if outcome.restart_required {
        println!("Restart the collector to apply the new configuration.");
    }
    Ok(ExitCode::SUCCESS)
}

/// Stands in for a host: starts the service and prints a record per interval until killed.
fn run_standalone(config_path: &Path, archive_interval: Duration) -> anyhow::Result<ExitCode> {
    let config = load_config(config_path)?;
    let catalog = Arc::new(config.load_catalog()?);
    let schema_path = config.schema_path(config_path);
    let schema = ManifestSchema::load(&schema_path)?;
    let mut registry = MemoryUnitRegistry::new();

    let service = WeatherService::start()
        .config(&config)
        .catalog(catalog)
        .schema(&schema)
        .registry(&mut registry)
        .call();
    if !service.is_enabled() {
        return Ok(ExitCode::FAILURE);
    }

    let interval = archive_interval.as_secs() as i64;
    info!("Printing an archive record every {interval}s");
    loop {
        let now = Utc::now().timestamp();
        let next = (now / interval + 1) * interval;
        thread::sleep(Duration::from_secs((next - now) as u64));

        let mut record =
            ArchiveRecord::new(next, config.service.unit_system, (interval / 60) as u32);
        service.inject(&mut record);
        println!("{}", serde_json::to_string(&record)?);
    }
}
