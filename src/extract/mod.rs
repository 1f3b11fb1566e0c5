pub mod docx;
pub mod pdf;

use tracing::info;

use crate::error::PipelineError;
use crate::models::{DocumentKind, Page};

/// Extracts ordered page text from an uploaded protocol document.
pub async fn extract_pages(kind: DocumentKind, bytes: Vec<u8>) -> Result<Vec<Page>, PipelineError> {
    let pages = tokio::task::spawn_blocking(move || match kind {
        DocumentKind::Pdf => pdf::extract_pdf_pages(&bytes),
        DocumentKind::Docx => docx::extract_docx_pages(&bytes),
    })
    .await
    .map_err(|err| PipelineError::ExtractionFailed {
        kind,
        message: format!("extraction task panicked: {err}"),
    })?
    .map_err(|err| PipelineError::ExtractionFailed {
        kind,
        message: format!("{err:#}"),
    })?;

    info!(%kind, pages = pages.len(), "extracted protocol text");
    Ok(pages)
}
