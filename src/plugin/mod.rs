//! Plugin Contract Module
//!
//! Defines the boundary between a batch-processing host and its plugins:
//! write-once configuration, cooperative cancellation, failure normalization
//! at the execution boundary, and the import, export and function contracts.
//!
//! # Example Usage
//!
//! ```no_run
//! use plugbound::plugin::{CancellationCheck, ImportBoundary, ImporterPlugin};
//!
//! fn drive(plugin: &mut dyn ImporterPlugin) {
//!     let cancel = CancellationCheck::never();
//!     let mut received = Vec::new();
//!     let result = plugin.fetch(&mut |record| received.push(record), &cancel);
//!     match result {
//!         Ok(()) => println!("fetched {} records", received.len()),
//!         Err(e) => eprintln!("fetch failed: {}", e),
//!     }
//! }
//! ```

pub mod argument;
pub mod boundary;
pub mod cancel;
pub mod carrier;
pub mod compatibility;
pub mod error;
pub mod export;
pub mod import;
pub mod runner;
pub mod settings;
pub mod traits;

#[cfg(test)]
pub mod tests;

/// Structured content value: a JSON object
pub type Document = serde_json::Map<String, serde_json::Value>;

// Re-export core types for easier access
pub use traits::{
    BatchPlugin, ConfigureBoundary, ExportBoundary, ExporterPlugin, FunctionBoundary,
    FunctionPlugin, ImportBoundary, ImporterPlugin, PluginInfo, PluginKind,
};
pub use error::{PluginError, PluginResult};
pub use settings::{ConfigCell, PluginProperties, PluginSettings, ProgressReporter};
pub use cancel::CancellationCheck;
pub use boundary::{guard, guard_formula};

// Carriers and content
pub use carrier::{par_for_each, Carrier, EntryLoader, LazyCarrier, MemoryCarrier};
pub use export::{
    ExecutionScope, ExportSource, ExportSourceContainer, MemoryRecordSink, RecordOutcome,
    RecordSink, ScopeHandle,
};
pub use import::{FetchedRecord, ImportKind, ImportResult, ImportResultContainer};
pub use argument::{Argument, ArgumentKind, ArgumentScheme, Parameter};

// Host side
pub use compatibility::VersionCompatibilityChecker;
pub use runner::{ExportSummary, PluginRunner, PluginState, RunSummary, RunnerConfig, StateHandle};
