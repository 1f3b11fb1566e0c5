use std::io::Cursor;

use chrono::{DateTime, TimeZone};
use docx_rs::{Docx, Paragraph, Run};

use crate::error::PipelineError;
use crate::models::LogEntry;
use crate::sections::SectionMap;

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Renders the consent form: title block, extracted sections (or the raw model
/// text when nothing parsed) and the traceability log.
pub fn render_document<Tz>(
    sections: &SectionMap,
    raw_text: &str,
    audit_log: &[LogEntry],
    generated_at: &DateTime<Tz>,
) -> Result<Vec<u8>, PipelineError>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut docx = Docx::new()
        .add_paragraph(heading("Informed Consent Form", 1))
        .add_paragraph(heading("Generated from Clinical Trial Protocol", 2))
        .add_paragraph(Paragraph::new())
        .add_paragraph(text(&format!(
            "Generated on: {}",
            generated_at.format("%B %d, %Y at %I:%M %p")
        )))
        .add_paragraph(Paragraph::new());

    if sections.is_empty() {
        docx = docx
            .add_paragraph(heading("Protocol Information", 2))
            .add_paragraph(text(
                "No structured information could be extracted from the protocol document.",
            ))
            .add_paragraph(text("Original response:"));
        docx = add_lines(docx, raw_text);
    } else {
        docx = docx
            .add_paragraph(heading("Protocol Information Summary", 2))
            .add_paragraph(text(
                "The following information has been extracted from the clinical trial protocol:",
            ));
        for name in sections.names() {
            docx = docx.add_paragraph(text(&format!("\u{2022} {name}")));
        }
        docx = docx.add_paragraph(Paragraph::new());

        for section in sections.iter() {
            docx = docx.add_paragraph(heading(&section.name, 2));
            docx = add_lines(docx, &section.content);
            docx = docx.add_paragraph(Paragraph::new());
        }
    }

    docx = add_traceability(docx, audit_log);

    let mut buffer = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|err| PipelineError::Render(err.to_string()))?;
    Ok(buffer.into_inner())
}

fn add_traceability(mut docx: Docx, audit_log: &[LogEntry]) -> Docx {
    docx = docx.add_paragraph(heading("Source Traceability", 2));

    for entry in audit_log {
        match entry {
            LogEntry::SectionGeneration {
                section,
                description,
                contributing_pages,
                ..
            } => {
                docx = docx
                    .add_paragraph(heading(section, 3))
                    .add_paragraph(text(description));
                for page in contributing_pages {
                    docx = docx.add_paragraph(text(&format!(
                        "\u{2022} Page {}: {}",
                        page.page, page.content_sample
                    )));
                }
            }
            LogEntry::DocumentGeneration { description, .. } => {
                docx = docx.add_paragraph(Paragraph::new()).add_paragraph(text(description));
            }
        }
    }

    docx
}

fn add_lines(mut docx: Docx, content: &str) -> Docx {
    for line in content.lines().filter(|line| !line.trim().is_empty()) {
        docx = docx.add_paragraph(text(line));
    }
    docx
}

fn heading(value: &str, level: u8) -> Paragraph {
    // half-points
    let size = match level {
        1 => 36,
        2 => 28,
        _ => 24,
    };
    Paragraph::new().add_run(Run::new().add_text(value).bold().size(size))
}

fn text(value: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(value))
}
