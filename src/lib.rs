//! Execution boundary contract between a batch-processing host and its
//! import, export and formula-function plugins.

pub mod config;
pub mod logging;
pub mod plugin;
pub mod version;
