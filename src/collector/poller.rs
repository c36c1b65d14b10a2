//! Background collection of module readings on per-module intervals.

use crate::api::error::ApiError;
use crate::api::extract::ModuleReading;
use crate::catalog::field::FieldDefinition;
use crate::collector::error::SnapshotError;
use crate::collector::snapshot::LatestSnapshot;
use crate::types::module::Module;
use log::{debug, error, info, warn};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Where readings come from. Implemented by the HTTP client.
pub trait WeatherSource: Send {
    fn collect(&self, module: Module, fields: &[FieldDefinition])
        -> Result<ModuleReading, ApiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    /// How often the loop wakes to look for due modules.
    pub tick: Duration,
    /// Pause after an unexpected fault in the loop body.
    pub cooldown: Duration,
    /// Log every successful collection at info level instead of debug.
    pub log_success: bool,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(10),
            cooldown: Duration::from_secs(300),
            log_success: false,
        }
    }
}

#[derive(Debug)]
struct ScheduleEntry {
    module: Module,
    interval: Duration,
    fields: Vec<FieldDefinition>,
    last_success: Option<Instant>,
}

impl ScheduleEntry {
    fn is_due(&self, now: Instant) -> bool {
        self.last_success
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }
}

/// What one pass over the schedule did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub collected: Vec<Module>,
    pub failed: Vec<Module>,
}

impl CycleOutcome {
    pub fn is_idle(&self) -> bool {
        self.collected.is_empty() && self.failed.is_empty()
    }
}

pub struct Poller {
    source: Box<dyn WeatherSource>,
    snapshot: Arc<LatestSnapshot>,
    schedule: Vec<ScheduleEntry>,
    settings: PollerSettings,
}

impl Poller {
    pub fn new(
        source: Box<dyn WeatherSource>,
        snapshot: Arc<LatestSnapshot>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            source,
            snapshot,
            schedule: Vec::new(),
            settings,
        }
    }

    /// Schedules `module`. It is due immediately.
    pub fn add_module(&mut self, module: Module, interval: Duration, fields: Vec<FieldDefinition>) {
        self.schedule.push(ScheduleEntry {
            module,
            interval,
            fields,
            last_success: None,
        });
    }

    pub fn modules(&self) -> impl Iterator<Item = Module> + '_ {
        self.schedule.iter().map(|entry| entry.module)
    }

    /// Collects every module due at `now`.
    ///
    /// A failed module keeps its previous `last_success` and is retried on the
    /// next pass. Only a snapshot fault aborts the pass.
    pub fn run_once(&mut self, now: Instant) -> Result<CycleOutcome, SnapshotError> {
        let mut outcome = CycleOutcome::default();

        for entry in self.schedule.iter_mut().filter(|entry| entry.is_due(now)) {
            match self.source.collect(entry.module, &entry.fields) {
                Ok(reading) => {
                    if reading.is_empty() {
                        warn!(
                            "{} response contained none of the {} selected fields",
                            entry.module,
                            entry.fields.len()
                        );
                    } else {
                        let count = self.snapshot.merge(reading)?;
                        if self.settings.log_success {
                            info!("Collected {} fields from {}", count, entry.module);
                        } else {
                            debug!("Collected {} fields from {}", count, entry.module);
                        }
                    }
                    entry.last_success = Some(now);
                    outcome.collected.push(entry.module);
                }
                Err(e) if e.needs_operator() => {
                    error!("{e}");
                    outcome.failed.push(entry.module);
                }
                Err(e) => {
                    warn!("{e}, retrying on the next pass");
                    outcome.failed.push(entry.module);
                }
            }
        }

        Ok(outcome)
    }

    /// Moves the poller onto its own thread.
    pub fn spawn(self) -> io::Result<PollerHandle> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let thread = thread::Builder::new()
            .name("openweather-poller".to_string())
            .spawn(move || self.run(&flag))?;

        Ok(PollerHandle {
            shutdown,
            thread: Some(thread),
        })
    }

    fn run(mut self, shutdown: &AtomicBool) {
        let modules: Vec<&str> = self.schedule.iter().map(|entry| entry.module.name()).collect();
        info!("Poller started for {}", modules.join(", "));

        while !shutdown.load(Ordering::Acquire) {
            let result = panic::catch_unwind(AssertUnwindSafe(|| self.run_once(Instant::now())));
            let pause = match result {
                Ok(Ok(_)) => self.settings.tick,
                Ok(Err(e)) => {
                    error!("Poller fault: {e}, pausing for {:?}", self.settings.cooldown);
                    self.settings.cooldown
                }
                Err(_) => {
                    error!(
                        "Poller pass panicked, pausing for {:?}",
                        self.settings.cooldown
                    );
                    self.settings.cooldown
                }
            };
            park_until(shutdown, Instant::now() + pause);
        }

        info!("Poller stopped");
    }
}

/// Parks the current thread until `deadline` or until shutdown is requested.
fn park_until(shutdown: &AtomicBool, deadline: Instant) {
    loop {
        if shutdown.load(Ordering::Acquire) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::park_timeout(deadline - now);
    }
}

/// Owner of the running poller thread. Dropping it stops the thread.
#[derive(Debug)]
pub struct PollerHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Requests shutdown, wakes the thread and waits for it to finish.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            if thread.join().is_err() {
                error!("Poller thread terminated with a panic");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
