use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OverlayError {
    #[error("Invalid element: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("An export is already in progress")]
    ExportInFlight,

    #[error("Export cancelled")]
    Cancelled,
}

impl OverlayError {
    /// Errors that abort a whole export call rather than a single element.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OverlayError::Parse(_) | OverlayError::Serialization(_) | OverlayError::Cancelled
        )
    }
}
