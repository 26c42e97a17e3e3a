//! Structured error types shared across cell population crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`CellPopError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (type names, shapes, indices, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for cell population simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum CellPopError {
    /// A value or edge list does not have the shape its destination requires.
    #[error("shape error: {0}")]
    Shape(ErrorInfo),
    /// Attribute keys disagree, or a type key is duplicated or unknown.
    #[error("key error: {0}")]
    Key(ErrorInfo),
    /// A node set was supplied under an edge-type key or vice versa.
    #[error("type error: {0}")]
    Type(ErrorInfo),
    /// A rate strategy was requested but never supplied.
    #[error("strategy error: {0}")]
    Strategy(ErrorInfo),
    /// The raw interaction graph violates the type partition.
    #[error("graph error: {0}")]
    Graph(ErrorInfo),
    /// Time grid or solver failures.
    #[error("integration error: {0}")]
    Integration(ErrorInfo),
    /// Invalid run configuration.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Serialization, schema and I/O errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl CellPopError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            CellPopError::Shape(info)
            | CellPopError::Key(info)
            | CellPopError::Type(info)
            | CellPopError::Strategy(info)
            | CellPopError::Graph(info)
            | CellPopError::Integration(info)
            | CellPopError::Config(info)
            | CellPopError::Serde(info) => info,
        }
    }

    /// Attaches a context entry to whichever family this error belongs to.
    pub fn with_context(self, key: impl Into<String>, value: impl ToString) -> Self {
        let value = value.to_string();
        match self {
            CellPopError::Shape(info) => CellPopError::Shape(info.with_context(key, value)),
            CellPopError::Key(info) => CellPopError::Key(info.with_context(key, value)),
            CellPopError::Type(info) => CellPopError::Type(info.with_context(key, value)),
            CellPopError::Strategy(info) => CellPopError::Strategy(info.with_context(key, value)),
            CellPopError::Graph(info) => CellPopError::Graph(info.with_context(key, value)),
            CellPopError::Integration(info) => {
                CellPopError::Integration(info.with_context(key, value))
            }
            CellPopError::Config(info) => CellPopError::Config(info.with_context(key, value)),
            CellPopError::Serde(info) => CellPopError::Serde(info.with_context(key, value)),
        }
    }

    /// Builds the canonical shape-mismatch error between an expected and a supplied shape.
    pub fn shape_mismatch(what: &str, expected: &[usize], actual: &[usize]) -> Self {
        CellPopError::Shape(
            ErrorInfo::new("shape-mismatch", format!("{what} has the wrong shape"))
                .with_context("expected", format!("{expected:?}"))
                .with_context("actual", format!("{actual:?}")),
        )
    }
}
