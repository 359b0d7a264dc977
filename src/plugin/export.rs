//! Export Sources and Outcome Recording
//!
//! An [`ExportSource`] is one content unit handed to an exporter plugin. The
//! plugin records the outcome of each unit exactly once. Whether a recording
//! reaches the host is decided when the source is built: sources bound to an
//! [`ExecutionScope`] forward outcomes to the host's [`RecordSink`] while the
//! scope is open, detached sources have no recording backend.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plugin::carrier::Carrier;
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::Document;

/// Container of export sources handed to `export_processing`
pub type ExportSourceContainer = dyn Carrier<ExportSource>;

/// Outcome recorded for one export source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordOutcome {
    Success(Vec<String>),
    Failure(Vec<String>),
}

impl RecordOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RecordOutcome::Success(_))
    }

    pub fn messages(&self) -> &[String] {
        match self {
            RecordOutcome::Success(m) | RecordOutcome::Failure(m) => m,
        }
    }
}

/// Host-side destination of recorded outcomes
pub trait RecordSink: Send + Sync {
    fn record(&self, content_id: &str, outcome: &RecordOutcome) -> anyhow::Result<()>;
}

/// Record sink keeping outcomes in memory
#[derive(Debug, Default)]
pub struct MemoryRecordSink {
    outcomes: DashMap<String, RecordOutcome>,
}

impl MemoryRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, content_id: &str) -> Option<RecordOutcome> {
        self.outcomes.get(content_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Number of successful outcomes
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|e| e.value().is_success()).count()
    }

    /// Number of failed outcomes
    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }
}

impl RecordSink for MemoryRecordSink {
    fn record(&self, content_id: &str, outcome: &RecordOutcome) -> anyhow::Result<()> {
        self.outcomes.insert(content_id.to_string(), outcome.clone());
        Ok(())
    }
}

struct ScopeState {
    id: Uuid,
    active: AtomicBool,
    recorded: DashSet<String>,
    sink: Arc<dyn RecordSink>,
}

/// Cloneable reference to an execution scope, used to bind sources to it
#[derive(Clone)]
pub struct ScopeHandle {
    state: Arc<ScopeState>,
}

impl ScopeHandle {
    /// Build a source whose outcomes are recorded through this scope
    pub fn source<S: Into<String>>(
        &self,
        id: S,
        value: Option<Document>,
        previous: Option<Document>,
    ) -> ExportSource {
        ExportSource {
            id: id.into(),
            value,
            previous,
            recording: Recording::Backed(self.clone()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.state.id
    }

    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::SeqCst)
    }

    fn record(&self, content_id: &str, outcome: RecordOutcome) -> PluginResult<()> {
        if !self.is_active() {
            log::debug!("Ignoring outcome for '{}' recorded outside its execution", content_id);
            return Ok(());
        }

        if !self.state.recorded.insert(content_id.to_string()) {
            return Err(PluginError::illegal_state(format!(
                "Content '{}' is already recorded.",
                content_id
            )));
        }

        if let Err(e) = self.state.sink.record(content_id, &outcome) {
            // Release the claim so the plugin may retry
            self.state.recorded.remove(content_id);
            return Err(PluginError::execution_failed_chain([
                format!("failed to record content '{}'", content_id),
                e.to_string(),
            ]));
        }

        Ok(())
    }
}

/// One export execution.
///
/// Recording through sources bound to this scope takes effect only while the
/// scope is open. Dropping the scope closes it.
pub struct ExecutionScope {
    handle: ScopeHandle,
}

impl ExecutionScope {
    pub fn open(sink: Arc<dyn RecordSink>) -> Self {
        let id = Uuid::now_v7();
        log::debug!("Opening export execution scope {}", id);
        Self {
            handle: ScopeHandle {
                state: Arc::new(ScopeState {
                    id,
                    active: AtomicBool::new(true),
                    recorded: DashSet::new(),
                    sink,
                }),
            },
        }
    }

    pub fn handle(&self) -> ScopeHandle {
        self.handle.clone()
    }

    /// Build a source bound to this scope
    pub fn source<S: Into<String>>(
        &self,
        id: S,
        value: Option<Document>,
        previous: Option<Document>,
    ) -> ExportSource {
        self.handle.source(id, value, previous)
    }

    pub fn id(&self) -> Uuid {
        self.handle.id()
    }

    /// Number of sources recorded so far
    pub fn recorded_count(&self) -> usize {
        self.handle.state.recorded.len()
    }

    /// Close the scope; later recordings are ignored
    pub fn close(self) {}
}

impl Drop for ExecutionScope {
    fn drop(&mut self) {
        self.handle.state.active.store(false, Ordering::SeqCst);
        log::debug!(
            "Closed export execution scope {} ({} recorded)",
            self.handle.id(),
            self.recorded_count()
        );
    }
}

#[derive(Clone)]
enum Recording {
    Backed(ScopeHandle),
    Detached,
}

/// One exportable content unit
#[derive(Clone)]
pub struct ExportSource {
    id: String,
    value: Option<Document>,
    previous: Option<Document>,
    recording: Recording,
}

impl ExportSource {
    /// A source without a recording backend; recording is a no-op
    pub fn detached<S: Into<String>>(id: S, value: Option<Document>, previous: Option<Document>) -> Self {
        Self {
            id: id.into(),
            value,
            previous,
            recording: Recording::Detached,
        }
    }

    /// Content id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current content value; `None` for a deletion
    pub fn value(&self) -> Option<&Document> {
        self.value.as_ref()
    }

    /// Previous content value; `None` for new content
    pub fn previous(&self) -> Option<&Document> {
        self.previous.as_ref()
    }

    pub fn is_deletion(&self) -> bool {
        self.value.is_none()
    }

    pub fn is_new(&self) -> bool {
        self.previous.is_none()
    }

    /// Whether recording will currently reach the host
    pub fn can_record(&self) -> bool {
        match &self.recording {
            Recording::Backed(scope) => scope.is_active(),
            Recording::Detached => false,
        }
    }

    /// Record this content as exported successfully.
    ///
    /// Fails with `IllegalState` if an outcome was already recorded.
    pub fn record_success(&self, messages: Vec<String>) -> PluginResult<()> {
        self.record(RecordOutcome::Success(messages))
    }

    /// Record this content as failed to export.
    ///
    /// Fails with `IllegalState` if an outcome was already recorded.
    pub fn record_failure(&self, messages: Vec<String>) -> PluginResult<()> {
        self.record(RecordOutcome::Failure(messages))
    }

    fn record(&self, outcome: RecordOutcome) -> PluginResult<()> {
        match &self.recording {
            Recording::Backed(scope) => scope.record(&self.id, outcome),
            Recording::Detached => Ok(()),
        }
    }
}

impl fmt::Debug for ExportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportSource")
            .field("id", &self.id)
            .field("value", &self.value)
            .field("previous", &self.previous)
            .field("can_record", &self.can_record())
            .finish()
    }
}
