use thiserror::Error;

use crate::models::DocumentKind;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No file uploaded")]
    MissingFile,

    #[error("Unsupported file type: {file_name}")]
    UnsupportedFormat { file_name: String },

    #[error("Failed to extract text from {kind}: {message}")]
    ExtractionFailed { kind: DocumentKind, message: String },

    #[error("model service unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Invalid file reference: {0}")]
    InvalidReference(String),

    #[error("File not found: {0}")]
    OutputNotFound(String),

    #[error("failed to render output document: {0}")]
    Render(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Errors caused by the request itself rather than by this service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingFile
                | PipelineError::UnsupportedFormat { .. }
                | PipelineError::ExtractionFailed { .. }
                | PipelineError::InvalidReference(_)
                | PipelineError::OutputNotFound(_)
        )
    }
}
