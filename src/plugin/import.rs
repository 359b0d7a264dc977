//! Import Records and Results

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::plugin::carrier::Carrier;
use crate::plugin::Document;

/// One raw record pushed by `fetch_contents`
pub type FetchedRecord = HashMap<String, String>;

/// Container of import results handed to `post_processing`
pub type ImportResultContainer = dyn Carrier<ImportResult>;

/// Kind of an import result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportKind {
    Register,
    Deletion,
    Failure,
}

impl ImportKind {
    pub fn name(&self) -> &'static str {
        match self {
            ImportKind::Register => "REGISTER",
            ImportKind::Deletion => "DELETION",
            ImportKind::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of importing one content unit. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    success: bool,
    kind: ImportKind,
    format: String,
    value: Document,
    message: String,
}

impl ImportResult {
    pub fn new<F, M>(success: bool, kind: ImportKind, format: F, value: Document, message: M) -> Self
    where
        F: Into<String>,
        M: Into<String>,
    {
        Self {
            success,
            kind,
            format: format.into(),
            value,
            message: message.into(),
        }
    }

    /// Successful registration
    pub fn registered<F: Into<String>, M: Into<String>>(format: F, value: Document, message: M) -> Self {
        Self::new(true, ImportKind::Register, format, value, message)
    }

    /// Successful deletion
    pub fn deleted<F: Into<String>, M: Into<String>>(format: F, value: Document, message: M) -> Self {
        Self::new(true, ImportKind::Deletion, format, value, message)
    }

    /// Failed import
    pub fn failed<F: Into<String>, M: Into<String>>(format: F, value: Document, message: M) -> Self {
        Self::new(false, ImportKind::Failure, format, value, message)
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn kind(&self) -> ImportKind {
        self.kind
    }

    /// Format name of the content value
    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn value(&self) -> &Document {
        &self.value
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
