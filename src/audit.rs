//! Traceability records linking generated sections back to source pages.

use crate::attribution::PageAttributor;
use crate::models::{preview, LogEntry, Page, PageSample};
use crate::sections::SectionMap;

const CONTENT_PREVIEW_CHARS: usize = 200;
const PAGE_SAMPLE_CHARS: usize = 100;

/// One entry per section in extraction order, then a single document summary.
pub fn build_audit_log(
    sections: &SectionMap,
    pages: &[Page],
    attributor: &PageAttributor,
) -> Vec<LogEntry> {
    let mut entries = Vec::with_capacity(sections.len() + 1);

    for section in sections.iter() {
        let contributing_pages = attributor.attribute(section, pages);
        let source = if contributing_pages.is_empty() {
            "AI analysis of all pages".to_string()
        } else {
            let numbers = contributing_pages
                .iter()
                .map(|p| p.page.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            format!("page(s) {numbers}")
        };

        entries.push(LogEntry::SectionGeneration {
            section: section.name.clone(),
            content_preview: preview(&section.content, CONTENT_PREVIEW_CHARS),
            content_length: section.content.chars().count(),
            description: format!("Generated '{}' from {}", section.name, source),
            contributing_pages,
        });
    }

    entries.push(LogEntry::DocumentGeneration {
        total_sections: sections.len(),
        total_pages: pages.len(),
        description: format!(
            "Assembled informed consent document from {} section(s) across {} page(s)",
            sections.len(),
            pages.len()
        ),
    });

    entries
}

/// First 100 characters of every page, including empty ones.
pub fn page_samples(pages: &[Page]) -> Vec<PageSample> {
    pages
        .iter()
        .map(|page| PageSample {
            page: page.number,
            text_sample: page.text.chars().take(PAGE_SAMPLE_CHARS).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Relevance, Section};

    fn pages() -> Vec<Page> {
        vec![
            Page {
                number: 1,
                text: "Study objective and purpose.".to_string(),
            },
            Page {
                number: 2,
                text: "Adverse events and risk profile.".to_string(),
            },
        ]
    }

    fn sections() -> SectionMap {
        let mut sections = SectionMap::new();
        sections.insert(Section {
            name: "Risks".to_string(),
            content: "Headache.".to_string(),
            source_pages: vec![2],
        });
        sections.insert(Section {
            name: "Purpose of the Study".to_string(),
            content: "x".repeat(250),
            source_pages: vec![],
        });
        sections.insert(Section {
            name: "Compensation".to_string(),
            content: "Travel costs are covered.".to_string(),
            source_pages: vec![],
        });
        sections
    }

    #[test]
    fn entries_follow_section_order_with_summary_last() {
        let log = build_audit_log(&sections(), &pages(), &PageAttributor::new());
        assert_eq!(log.len(), 4);

        let names: Vec<&str> = log
            .iter()
            .filter_map(|entry| match entry {
                LogEntry::SectionGeneration { section, .. } => Some(section.as_str()),
                LogEntry::DocumentGeneration { .. } => None,
            })
            .collect();
        assert_eq!(names, ["Risks", "Purpose of the Study", "Compensation"]);

        match &log[3] {
            LogEntry::DocumentGeneration {
                total_sections,
                total_pages,
                ..
            } => {
                assert_eq!(*total_sections, 3);
                assert_eq!(*total_pages, 2);
            }
            other => panic!("expected summary entry, got {other:?}"),
        }
    }

    #[test]
    fn descriptions_name_pages_or_whole_document() {
        let log = build_audit_log(&sections(), &pages(), &PageAttributor::new());

        let LogEntry::SectionGeneration {
            description,
            contributing_pages,
            ..
        } = &log[0]
        else {
            panic!("expected section entry");
        };
        assert_eq!(description, "Generated 'Risks' from page(s) 2");
        assert_eq!(contributing_pages[0].relevance_score, Relevance::ModelIdentified);

        let LogEntry::SectionGeneration { description, .. } = &log[2] else {
            panic!("expected section entry");
        };
        assert_eq!(
            description,
            "Generated 'Compensation' from AI analysis of all pages"
        );
    }

    #[test]
    fn previews_are_cut_at_200_chars() {
        let log = build_audit_log(&sections(), &pages(), &PageAttributor::new());
        let LogEntry::SectionGeneration {
            content_preview,
            content_length,
            ..
        } = &log[1]
        else {
            panic!("expected section entry");
        };
        assert_eq!(*content_length, 250);
        assert_eq!(content_preview.len(), 203);
    }

    #[test]
    fn empty_section_set_still_gets_summary() {
        let log = build_audit_log(&SectionMap::new(), &pages(), &PageAttributor::new());
        assert_eq!(log.len(), 1);
        assert!(matches!(log[0], LogEntry::DocumentGeneration { total_sections: 0, .. }));
    }

    #[test]
    fn page_samples_keep_empty_pages() {
        let pages = vec![
            Page {
                number: 1,
                text: String::new(),
            },
            Page {
                number: 2,
                text: "y".repeat(150),
            },
        ];
        let samples = page_samples(&pages);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].text_sample, "");
        assert_eq!(samples[1].text_sample.len(), 100);
    }
}
