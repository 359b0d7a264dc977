//! Plugin Runner
//!
//! Host-side driver for a single plugin instance. Wires configuration, checks
//! contract compatibility, runs outer operations under a cancellation token
//! with an optional deadline and tracks the lifecycle state:
//!
//! `Unconfigured -> Configured -> Executing -> {Completed | Failed | Cancelled}`
//!
//! Configuration is optional; running an unconfigured plugin uses the default
//! properties and reporter.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::plugin::argument::Argument;
use crate::plugin::cancel::CancellationCheck;
use crate::plugin::carrier::Carrier;
use crate::plugin::compatibility::VersionCompatibilityChecker;
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::export::{ExecutionScope, ExportSourceContainer, RecordSink, ScopeHandle};
use crate::plugin::import::{FetchedRecord, ImportResultContainer};
use crate::plugin::settings::{PluginProperties, ProgressReporter};
use crate::plugin::traits::{
    BatchPlugin, ConfigureBoundary, ExportBoundary, ExporterPlugin, FunctionBoundary,
    FunctionPlugin, ImportBoundary, ImporterPlugin,
};

/// Plugin lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginState {
    /// Created, configuration not yet wired
    Unconfigured,
    /// Configuration wired, idle
    Configured,
    /// An outer operation is running
    Executing,
    /// Last operation finished normally
    Completed,
    /// Last operation failed
    Failed,
    /// Last operation observed cancellation
    Cancelled,
}

impl PluginState {
    /// Whether no further operation may run
    pub fn is_terminal(&self) -> bool {
        matches!(self, PluginState::Failed | PluginState::Cancelled)
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginState::Unconfigured => "unconfigured",
            PluginState::Configured => "configured",
            PluginState::Executing => "executing",
            PluginState::Completed => "completed",
            PluginState::Failed => "failed",
            PluginState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Shared view of a runner's state, readable from other threads
#[derive(Debug, Clone)]
pub struct StateHandle(Arc<Mutex<PluginState>>);

impl StateHandle {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(PluginState::Unconfigured)))
    }

    pub fn get(&self) -> PluginState {
        *self.0.lock()
    }

    fn set(&self, state: PluginState) -> PluginState {
        std::mem::replace(&mut *self.0.lock(), state)
    }
}

/// Runner settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Cancel an operation that runs longer than this
    pub timeout: Option<Duration>,
}

/// Record of one finished operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub execution_id: Uuid,
    pub operation: &'static str,
    pub state: PluginState,
    pub elapsed: Duration,
}

/// Result of an export run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    /// Sources handed to the plugin
    pub total: usize,
    /// Sources the plugin recorded an outcome for
    pub recorded: usize,
}

/// Cancels a token when a deadline passes unless stopped first
struct Watchdog {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Watchdog {
    fn start(timeout: Duration, token: CancellationToken, operation: &'static str) -> Self {
        let (stop, stopped) = bounded::<()>(1);
        let thread = thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = stopped.recv_timeout(timeout) {
                log::warn!("Plugin operation '{}' exceeded {:?}; requesting cancellation", operation, timeout);
                token.cancel();
            }
        });
        Self {
            stop: Some(stop),
            thread: Some(thread),
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        // Disconnecting the channel wakes the watchdog thread
        self.stop.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Drives one plugin instance through its lifecycle
pub struct PluginRunner<P: ?Sized> {
    plugin: Box<P>,
    state: StateHandle,
    token: CancellationToken,
    checker: VersionCompatibilityChecker,
    config: RunnerConfig,
    last_run: Option<RunSummary>,
}

impl<P: BatchPlugin + ?Sized> PluginRunner<P> {
    pub fn new(plugin: Box<P>) -> Self {
        Self {
            plugin,
            state: StateHandle::new(),
            token: CancellationToken::new(),
            checker: VersionCompatibilityChecker::default(),
            config: RunnerConfig::default(),
            last_run: None,
        }
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_checker(mut self, checker: VersionCompatibilityChecker) -> Self {
        self.checker = checker;
        self
    }

    /// Wire properties and reporter into the plugin. Only allowed once.
    ///
    /// Either both values are written or neither is.
    pub fn configure<V: Into<serde_json::Value>>(
        &mut self,
        properties: V,
        reporter: ProgressReporter,
    ) -> PluginResult<()> {
        let state = self.state.get();
        if state != PluginState::Unconfigured {
            return Err(PluginError::illegal_state(format!(
                "Plugin '{}' cannot be configured while {}",
                self.name(),
                state
            )));
        }

        // Validate and check both cells before writing either
        let properties = PluginProperties::from_value(properties.into())?;
        let settings = self.plugin.settings();
        if settings.has_properties() || settings.has_reporter() {
            return Err(PluginError::illegal_state(format!(
                "Plugin '{}' is already partially configured",
                self.name()
            )));
        }

        self.plugin.set_plugin_properties(properties)?;
        self.plugin.set_reporter(reporter)?;
        self.state.set(PluginState::Configured);
        log::debug!("Plugin '{}' configured", self.name());
        Ok(())
    }

    pub fn plugin(&self) -> &P {
        &self.plugin
    }

    pub fn into_plugin(self) -> Box<P> {
        self.plugin
    }

    pub fn name(&self) -> &str {
        &self.plugin.plugin_info().name
    }

    pub fn state(&self) -> PluginState {
        self.state.get()
    }

    pub fn state_handle(&self) -> StateHandle {
        self.state.clone()
    }

    /// Token that cancels the running and every later operation
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn last_run(&self) -> Option<&RunSummary> {
        self.last_run.as_ref()
    }

    fn enter_executing(&mut self, operation: &'static str) -> PluginResult<()> {
        self.checker.check_plugin_compatibility(self.plugin.plugin_info())?;

        let state = self.state.get();
        match state {
            PluginState::Failed | PluginState::Cancelled | PluginState::Executing => {
                return Err(PluginError::illegal_state(format!(
                    "Plugin '{}' cannot run '{}' while {}",
                    self.name(),
                    operation,
                    state
                )));
            }
            PluginState::Unconfigured => {
                log::debug!("Plugin '{}' runs '{}' with default configuration", self.name(), operation);
            }
            PluginState::Configured | PluginState::Completed => {}
        }

        self.state.set(PluginState::Executing);
        Ok(())
    }

    fn execute<T, F>(&mut self, operation: &'static str, run: F) -> PluginResult<T>
    where
        F: FnOnce(&mut P, &CancellationCheck) -> PluginResult<T>,
    {
        self.enter_executing(operation)?;

        let execution_id = Uuid::now_v7();
        let started = Instant::now();
        log::debug!("Plugin '{}' starting '{}' ({})", self.name(), operation, execution_id);

        let check = CancellationCheck::new(self.token.clone());
        let result = {
            let _watchdog = self
                .config
                .timeout
                .map(|timeout| Watchdog::start(timeout, self.token.clone(), operation));
            run(&mut *self.plugin, &check)
        };

        let state = match &result {
            Ok(_) => PluginState::Completed,
            Err(PluginError::Cancelled) => PluginState::Cancelled,
            Err(_) => PluginState::Failed,
        };
        self.state.set(state);

        let elapsed = started.elapsed();
        match &result {
            Ok(_) => log::info!("Plugin '{}' {} '{}' in {:?}", self.name(), state, operation, elapsed),
            Err(e) => log::warn!("Plugin '{}' {} '{}' in {:?}: {}", self.name(), state, operation, elapsed, e),
        }

        self.last_run = Some(RunSummary {
            execution_id,
            operation,
            state,
            elapsed,
        });
        result
    }
}

impl<P: ImporterPlugin + ?Sized> PluginRunner<P> {
    /// Run `fetch`, forwarding every record to `sink`. Returns the number of
    /// records received.
    pub fn run_fetch<S>(&mut self, mut sink: S) -> PluginResult<usize>
    where
        S: FnMut(FetchedRecord),
    {
        let mut received = 0usize;
        self.execute("fetch", |plugin, check| {
            plugin.fetch(
                &mut |record| {
                    received += 1;
                    sink(record)
                },
                check,
            )
        })?;
        Ok(received)
    }

    /// Run `do_post` over the completed import results
    pub fn run_post(&mut self, results: &ImportResultContainer) -> PluginResult<()> {
        self.execute("post", |plugin, check| plugin.do_post(results, check))
    }
}

impl<P: ExporterPlugin + ?Sized> PluginRunner<P> {
    /// Run `do_export` inside a fresh execution scope.
    ///
    /// `build_sources` binds the container's sources to the scope; outcomes
    /// recorded after this call returns are ignored.
    pub fn run_export<F>(&mut self, sink: Arc<dyn RecordSink>, build_sources: F) -> PluginResult<ExportSummary>
    where
        F: FnOnce(&ScopeHandle) -> Box<ExportSourceContainer>,
    {
        let scope = ExecutionScope::open(sink);
        let sources = build_sources(&scope.handle());
        let total = sources.len();

        let result = self.execute("export", |plugin, check| plugin.do_export(&*sources, check));

        let recorded = scope.recorded_count();
        scope.close();
        result.map(|_| ExportSummary { total, recorded })
    }
}

impl<P: FunctionPlugin + ?Sized> PluginRunner<P> {
    /// Run `execute` with the given arguments
    pub fn run_function(&mut self, args: &[Argument]) -> PluginResult<Option<String>> {
        self.execute("execute", |plugin, _check| plugin.execute(args))
    }
}

impl<P: BatchPlugin + ?Sized> fmt::Debug for PluginRunner<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRunner")
            .field("plugin", &self.name())
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}
