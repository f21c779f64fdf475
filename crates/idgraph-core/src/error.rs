//! Centralized error types for idgraph.

use thiserror::Error;

use crate::summary::RunSummary;

/// Main error type for idgraph operations.
#[derive(Error, Debug)]
pub enum IdGraphError {
    #[error("Label registered twice: {0}")]
    DuplicateLabel(String),

    #[error("Unknown label: {0}")]
    UnknownLabel(String),

    #[error("Unknown relationship: ({owner})-[:{rel_type}]-({target})")]
    UnknownRelationship {
        owner: String,
        rel_type: String,
        target: String,
    },

    #[error("Schema '{0}' does not declare an 'id' property")]
    MissingIdProperty(String),

    #[error("Invalid identifier '{0}': expected [A-Za-z_][A-Za-z0-9_]*")]
    InvalidIdentifier(String),

    #[error("Invalid sync plan: {0}")]
    InvalidPlan(String),

    #[error("Record for '{label}' is missing required field '{property}'")]
    MissingRequiredField { label: String, property: String },

    #[error("Failed to fetch '{entity}' from source: {message}")]
    SourceFetch { entity: String, message: String },

    #[error("Graph error: {0}")]
    Graph(#[from] anyhow::Error),

    #[error("Run {run_tag} cancelled before cleanup")]
    Cancelled { run_tag: i64 },

    #[error("Run {} finished with {failed} failed type(s)", .summary.run_tag)]
    Incomplete {
        failed: usize,
        summary: Box<RunSummary>,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for idgraph operations.
pub type IdGraphResult<T> = Result<T, IdGraphError>;

impl IdGraphError {
    /// Create a source fetch error.
    pub fn source_fetch(entity: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::SourceFetch {
            entity: entity.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn missing_field(label: &str, property: &str) -> Self {
        Self::MissingRequiredField {
            label: label.to_string(),
            property: property.to_string(),
        }
    }
}
