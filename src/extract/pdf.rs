use anyhow::{anyhow, Result};
use pdf_extract::{output_doc_page, Document, PlainTextOutput};

use crate::models::Page;

/// Text of every page in document order. Pages without a text layer are kept
/// with empty text so numbering stays aligned with the source document.
pub fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<Page>> {
    let mut doc =
        Document::load_mem(bytes).map_err(|err| anyhow!("failed to read PDF content: {err}"))?;
    if doc.is_encrypted() {
        doc.decrypt("")
            .map_err(|err| anyhow!("encrypted PDF could not be opened: {err}"))?;
    }

    let page_numbers: Vec<u32> = doc.get_pages().into_keys().collect();
    let texts = page_numbers
        .iter()
        .map(|&number| page_text(&doc, number))
        .collect::<Result<Vec<_>>>()?;

    pages_from_texts(texts, page_numbers.len())
}

fn page_text(doc: &Document, number: u32) -> Result<String> {
    let mut text = String::new();
    {
        let mut output = PlainTextOutput::new(&mut text);
        output_doc_page(doc, &mut output, number)
            .map_err(|err| anyhow!("failed to read PDF page {number}: {err}"))?;
    }
    Ok(text)
}

/// Numbers extracted texts from 1, refusing a partial result so cited page
/// numbers never point past what was read.
fn pages_from_texts(texts: Vec<String>, expected: usize) -> Result<Vec<Page>> {
    if texts.len() != expected {
        anyhow::bail!(
            "PDF has {expected} pages but text was extracted for {}",
            texts.len()
        );
    }

    Ok(texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| Page {
            number: index as u32 + 1,
            text,
        })
        .collect())
}
