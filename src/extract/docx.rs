use std::io::{Cursor, Read};

use anyhow::{Context, Result};
use roxmltree::{Document, Node};
use zip::ZipArchive;

use crate::models::Page;

/// DOCX has no stable pagination, so the whole body becomes page 1: every
/// non-blank paragraph, one per line.
pub fn extract_docx_pages(bytes: &[u8]) -> Result<Vec<Page>> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).context("DOCX is not a valid ZIP archive")?;

    let mut document_xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("DOCX missing word/document.xml")?
        .read_to_string(&mut document_xml)
        .context("failed to read word/document.xml")?;

    let doc = Document::parse(&document_xml).context("failed to parse DOCX XML")?;

    let paragraphs: Vec<String> = doc
        .descendants()
        .filter(|node| is_element(node, "p") && !in_compat_fallback(node))
        .map(|paragraph| {
            paragraph
                .descendants()
                .filter(|node| {
                    is_element(node, "t") && owning_paragraph(node) == Some(paragraph)
                })
                .filter_map(|node| node.text())
                .collect::<String>()
        })
        .filter(|text| !text.trim().is_empty())
        .collect();

    Ok(vec![Page {
        number: 1,
        text: paragraphs.join("\n"),
    }])
}

fn is_element(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

/// `mc:Fallback` repeats the `mc:Choice` content (text boxes, shapes) for
/// older readers.
fn in_compat_fallback(node: &Node) -> bool {
    node.ancestors().any(|ancestor| is_element(&ancestor, "Fallback"))
}

/// Text-box paragraphs nest inside body paragraphs; a run belongs to the
/// innermost one.
fn owning_paragraph<'a, 'input>(node: &Node<'a, 'input>) -> Option<Node<'a, 'input>> {
    node.ancestors().find(|ancestor| is_element(ancestor, "p"))
}
