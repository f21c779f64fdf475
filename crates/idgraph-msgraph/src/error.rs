//! Error types for the Microsoft Graph source.

use idgraph_core::IdGraphError;
use thiserror::Error;

pub type MsGraphResult<T> = Result<T, MsGraphError>;

#[derive(Debug, Error)]
pub enum MsGraphError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token acquisition failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Graph API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Still throttled after every retry.
    #[error("Throttled with status {status} after {attempts} retries")]
    Throttled { status: u16, attempts: u32 },

    /// A `nextLink` that leaves the Graph endpoint or loops back.
    #[error("Pagination error: {0}")]
    Pagination(String),

    #[error("Unsupported {kind}: {name}")]
    Unsupported { kind: &'static str, name: String },
}

impl MsGraphError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, MsGraphError::NotFound(_))
    }

    /// Report this as a retrieval failure of `entity`.
    pub fn into_source_error(self, entity: &str) -> IdGraphError {
        IdGraphError::source_fetch(entity, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_keeps_entity_and_message() {
        let err = MsGraphError::Throttled { status: 429, attempts: 5 }.into_source_error("users");
        match err {
            IdGraphError::SourceFetch { entity, message } => {
                assert_eq!(entity, "users");
                assert!(message.contains("429"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
