//! Core Plugin Traits
//!
//! Defines the plugin kind contracts. Each kind has inner operations that
//! concrete plugins implement and a matching `*Boundary` extension trait with
//! the outer operations the host calls. The boundary traits are implemented
//! for every plugin of that kind by a blanket impl, so plugins cannot override
//! them; every outer operation runs its inner operation through
//! [`guard`](crate::plugin::boundary::guard) or, for function plugins,
//! [`guard_formula`](crate::plugin::boundary::guard_formula).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::plugin::argument::{Argument, ArgumentScheme};
use crate::plugin::boundary::{guard, guard_formula};
use crate::plugin::cancel::CancellationCheck;
use crate::plugin::error::PluginResult;
use crate::plugin::export::ExportSourceContainer;
use crate::plugin::import::{FetchedRecord, ImportResultContainer};
use crate::plugin::settings::{PluginProperties, PluginSettings, ProgressReporter};
use crate::version;

/// Plugin kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginKind {
    /// Fetches content from a data source
    Import,
    /// Sends content to a destination
    Export,
    /// Computes a formula value
    Function,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginKind::Import => write!(f, "import"),
            PluginKind::Export => write!(f, "export"),
            PluginKind::Function => write!(f, "function"),
        }
    }
}

/// Plugin metadata and information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin name (unique identifier)
    pub name: String,

    /// Plugin version
    pub version: String,

    /// Contract API version this plugin targets (YYYYMMDD)
    pub api_version: u32,

    /// Human-readable description
    pub description: String,

    /// Plugin author
    pub author: String,

    pub kind: PluginKind,
}

impl PluginInfo {
    /// Create a new PluginInfo targeting the current contract API version
    pub fn new<N: Into<String>, V: Into<String>>(name: N, version: V, kind: PluginKind) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            api_version: version::api_version(),
            description: String::new(),
            author: String::new(),
            kind,
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_author<S: Into<String>>(mut self, author: S) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_api_version(mut self, api_version: u32) -> Self {
        self.api_version = api_version;
        self
    }
}

/// Shared root of every plugin kind: metadata and write-once configuration
pub trait BatchPlugin: Send {
    /// Get plugin metadata information
    fn plugin_info(&self) -> &PluginInfo;

    /// Per-instance configuration cells
    fn settings(&self) -> &PluginSettings;

    /// Plugin properties; empty until the host sets them
    fn properties(&self) -> &PluginProperties {
        self.settings().properties()
    }

    /// Progress reporter; a no-op until the host sets one
    fn reporter(&self) -> &ProgressReporter {
        self.settings().reporter()
    }
}

/// Import contract
pub trait ImporterPlugin: BatchPlugin {
    /// Fetch content from the data source, pushing one record per content
    /// unit into `sink`. The sink may block.
    ///
    /// Return `PluginError::ExecutionFailed` when processing cannot continue.
    fn fetch_contents(
        &mut self,
        sink: &mut dyn FnMut(FetchedRecord),
        cancel: &CancellationCheck,
    ) -> anyhow::Result<()>;

    /// Respond to the data source using the import results.
    /// Does nothing unless overridden.
    fn post_processing(
        &mut self,
        results: &ImportResultContainer,
        cancel: &CancellationCheck,
    ) -> anyhow::Result<()> {
        let _ = (results, cancel);
        Ok(())
    }
}

/// Export contract
pub trait ExporterPlugin: BatchPlugin {
    /// Export the given sources, recording an outcome on each one processed.
    fn export_processing(
        &mut self,
        sources: &ExportSourceContainer,
        cancel: &CancellationCheck,
    ) -> anyhow::Result<()>;
}

/// Formula function contract
pub trait FunctionPlugin: BatchPlugin {
    /// Declared argument scheme, checked before `calculate` runs
    fn argument_scheme(&self) -> &ArgumentScheme;

    /// Compute the function over already validated arguments.
    /// `None` means no value.
    fn calculate(&self, args: &[Argument]) -> anyhow::Result<Option<String>>;
}

/// Host-facing operations shared by every plugin kind
pub trait ConfigureBoundary: BatchPlugin {
    /// Set plugin properties once. See [`PluginSettings::set_properties`].
    fn set_plugin_properties<V: Into<serde_json::Value>>(&self, props: V) -> PluginResult<()> {
        self.settings().set_properties(props)
    }

    /// Set the progress reporter once
    fn set_reporter(&self, reporter: ProgressReporter) -> PluginResult<()> {
        self.settings().set_reporter(reporter)
    }
}

impl<P: BatchPlugin + ?Sized> ConfigureBoundary for P {}

/// Outer operations of import plugins
pub trait ImportBoundary: ImporterPlugin {
    /// Run `fetch_contents` inside the execution boundary
    fn fetch(&mut self, sink: &mut dyn FnMut(FetchedRecord), cancel: &CancellationCheck) -> PluginResult<()> {
        guard("fetch", || self.fetch_contents(sink, cancel))
    }

    /// Run `post_processing` inside the execution boundary
    fn do_post(&mut self, results: &ImportResultContainer, cancel: &CancellationCheck) -> PluginResult<()> {
        guard("post", || self.post_processing(results, cancel))
    }
}

impl<P: ImporterPlugin + ?Sized> ImportBoundary for P {}

/// Outer operation of export plugins
pub trait ExportBoundary: ExporterPlugin {
    /// Run `export_processing` inside the execution boundary
    fn do_export(&mut self, sources: &ExportSourceContainer, cancel: &CancellationCheck) -> PluginResult<()> {
        guard("export", || self.export_processing(sources, cancel))
    }
}

impl<P: ExporterPlugin + ?Sized> ExportBoundary for P {}

/// Outer operation of function plugins
pub trait FunctionBoundary: FunctionPlugin {
    /// Validate `args` against the scheme and run `calculate`, both inside
    /// the execution boundary
    fn execute(&self, args: &[Argument]) -> PluginResult<Option<String>> {
        guard_formula("execute", || {
            let args = self.argument_scheme().require_valid(args)?;
            self.calculate(args)
        })
    }
}

impl<P: FunctionPlugin + ?Sized> FunctionBoundary for P {}
