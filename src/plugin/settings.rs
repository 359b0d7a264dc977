//! Plugin Settings and Configuration
//!
//! Write-once configuration handed to every plugin instance by the host:
//! a properties document and a progress reporter. Both are optional; reading
//! either before it is set yields a documented default.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::plugin::error::{PluginError, PluginResult};

/// Log target used by [`ProgressReporter::logging`]
pub const REPORT_LOG_TARGET: &str = "plugbound::report";

/// A write-once value with a fallback default.
///
/// `set` is an atomic check-and-set: of two racing calls exactly one wins.
pub struct ConfigCell<T> {
    value: OnceLock<T>,
    default: T,
    label: &'static str,
}

impl<T> ConfigCell<T> {
    /// Create an unset cell. `label` names the value in error messages.
    pub fn new(label: &'static str, default: T) -> Self {
        Self {
            value: OnceLock::new(),
            default,
            label,
        }
    }

    /// The set value, or the default when never set
    pub fn get(&self) -> &T {
        self.value.get().unwrap_or(&self.default)
    }

    /// Set the value. Fails if a value was already set, equal or not.
    pub fn set(&self, value: T) -> PluginResult<()> {
        self.value
            .set(value)
            .map_err(|_| PluginError::illegal_state(format!("{} is already set.", self.label)))
    }

    /// Whether a value has been set
    pub fn is_set(&self) -> bool {
        self.value.get().is_some()
    }
}

impl<T: fmt::Debug> fmt::Debug for ConfigCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigCell")
            .field("label", &self.label)
            .field("value", &self.value.get())
            .finish()
    }
}

/// Plugin properties document.
///
/// Conveys environment-dependent values from the host to the plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginProperties(Map<String, Value>);

impl PluginProperties {
    /// An empty document
    pub fn empty() -> Self {
        Self(Map::new())
    }

    /// Build from a JSON value. Only objects are accepted.
    pub fn from_value(value: Value) -> PluginResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err(PluginError::invalid_argument("plugin properties must not be null")),
            other => Err(PluginError::invalid_argument(format!(
                "plugin properties must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Get a raw value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a value converted to `T`. `None` when absent or not convertible.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.0.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get a string value
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for PluginProperties {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<PluginProperties> for Value {
    fn from(props: PluginProperties) -> Self {
        Value::Object(props.0)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

type ReportFn = dyn Fn(&str) + Send + Sync;

#[derive(Clone)]
enum ReporterKind {
    Noop,
    Callback(Arc<ReportFn>),
}

/// Progress reporter handed to a plugin.
///
/// Passes messages (warnings, result summaries) back to the host. Reporting is
/// fire-and-forget: a panic inside the host callback is contained here and
/// never reaches the plugin.
#[derive(Clone)]
pub struct ProgressReporter {
    kind: ReporterKind,
}

impl ProgressReporter {
    /// A reporter that discards every message
    pub fn noop() -> Self {
        Self { kind: ReporterKind::Noop }
    }

    /// A reporter backed by a host callback
    pub fn from_fn<F>(callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self { kind: ReporterKind::Callback(Arc::new(callback)) }
    }

    /// A reporter forwarding to the `log` facade at info level
    pub fn logging<S: Into<String>>(plugin_name: S) -> Self {
        let plugin_name = plugin_name.into();
        Self::from_fn(move |message| {
            log::info!(target: REPORT_LOG_TARGET, "[{}] {}", plugin_name, message);
        })
    }

    /// Report a message to the host
    pub fn report<S: AsRef<str>>(&self, message: S) {
        if let ReporterKind::Callback(callback) = &self.kind {
            let message = message.as_ref();
            if panic::catch_unwind(AssertUnwindSafe(|| callback(message))).is_err() {
                log::warn!("Progress reporter callback panicked; message dropped");
            }
        }
    }

    /// Whether this reporter discards messages
    pub fn is_noop(&self) -> bool {
        matches!(self.kind, ReporterKind::Noop)
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ReporterKind::Noop => f.write_str("ProgressReporter(noop)"),
            ReporterKind::Callback(_) => f.write_str("ProgressReporter(callback)"),
        }
    }
}

/// Per-instance plugin configuration
#[derive(Debug)]
pub struct PluginSettings {
    properties: ConfigCell<PluginProperties>,
    reporter: ConfigCell<ProgressReporter>,
}

impl PluginSettings {
    pub fn new() -> Self {
        Self {
            properties: ConfigCell::new("Plug-in properties", PluginProperties::empty()),
            reporter: ConfigCell::new("Result reporter", ProgressReporter::noop()),
        }
    }

    /// Plugin properties; empty when never set
    pub fn properties(&self) -> &PluginProperties {
        self.properties.get()
    }

    /// Set the plugin properties. Only allowed once.
    ///
    /// Fails with `InvalidArgument` if `props` is null or not an object and
    /// with `IllegalState` if properties were already set.
    pub fn set_properties<V: Into<Value>>(&self, props: V) -> PluginResult<()> {
        let props = PluginProperties::from_value(props.into())?;
        self.properties.set(props)?;
        log::debug!("Plugin properties set");
        Ok(())
    }

    /// Progress reporter; a no-op reporter when never set
    pub fn reporter(&self) -> &ProgressReporter {
        self.reporter.get()
    }

    /// Set the progress reporter. Only allowed once.
    pub fn set_reporter(&self, reporter: ProgressReporter) -> PluginResult<()> {
        self.reporter.set(reporter)?;
        log::debug!("Progress reporter set");
        Ok(())
    }

    pub fn has_properties(&self) -> bool {
        self.properties.is_set()
    }

    pub fn has_reporter(&self) -> bool {
        self.reporter.is_set()
    }

    /// Whether both values have been wired by the host
    pub fn is_fully_configured(&self) -> bool {
        self.has_properties() && self.has_reporter()
    }
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self::new()
    }
}
