use crate::models::{preview, ContributingPage, Page, Relevance, Section};

const SAMPLE_CHARS: usize = 150;
const DEFAULT_MAX_KEYWORD_PAGES: usize = 3;

const CLINICAL_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Purpose of the Study",
        &["purpose", "objective", "aim", "goal", "study", "trial"],
    ),
    (
        "Study Procedures",
        &[
            "procedure",
            "method",
            "protocol",
            "enrollment",
            "randomization",
            "treatment",
        ],
    ),
    (
        "Risks",
        &[
            "risk",
            "adverse",
            "side effect",
            "complication",
            "danger",
            "harm",
        ],
    ),
    (
        "Benefits",
        &[
            "benefit",
            "advantage",
            "improvement",
            "efficacy",
            "outcome",
            "positive",
        ],
    ),
];

/// Resolves which source pages back a section.
///
/// Pages the model cited are trusted as-is. Sections without citations fall
/// back to counting how many of the section's keywords occur in each page.
#[derive(Debug, Clone)]
pub struct PageAttributor {
    keyword_sets: &'static [(&'static str, &'static [&'static str])],
    max_keyword_pages: usize,
}

impl Default for PageAttributor {
    fn default() -> Self {
        Self {
            keyword_sets: CLINICAL_KEYWORDS,
            max_keyword_pages: DEFAULT_MAX_KEYWORD_PAGES,
        }
    }
}

impl PageAttributor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keywords_for(&self, section_name: &str) -> Option<&'static [&'static str]> {
        self.keyword_sets
            .iter()
            .find(|(name, _)| *name == section_name)
            .map(|(_, keywords)| *keywords)
    }

    pub fn attribute(&self, section: &Section, pages: &[Page]) -> Vec<ContributingPage> {
        if !section.source_pages.is_empty() {
            return section
                .source_pages
                .iter()
                .filter_map(|number| pages.iter().find(|page| page.number == *number))
                .map(|page| contributing(page, Relevance::ModelIdentified))
                .collect();
        }

        let Some(keywords) = self.keywords_for(&section.name) else {
            return Vec::new();
        };

        let mut scored: Vec<(&Page, usize)> = pages
            .iter()
            .map(|page| (page, keyword_hits(&page.text, keywords)))
            .filter(|(_, hits)| *hits > 0)
            .collect();

        // sort_by is stable, so equal scores stay in page order
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        scored
            .into_iter()
            .take(self.max_keyword_pages)
            .map(|(page, hits)| contributing(page, Relevance::KeywordHits(hits)))
            .collect()
    }
}

/// Number of distinct keywords present anywhere in the text.
fn keyword_hits(text: &str, keywords: &[&str]) -> usize {
    let lower = text.to_lowercase();
    keywords
        .iter()
        .filter(|keyword| lower.contains(*keyword))
        .count()
}

fn contributing(page: &Page, relevance: Relevance) -> ContributingPage {
    ContributingPage {
        page: page.number,
        content_sample: preview(&page.text, SAMPLE_CHARS),
        relevance_score: relevance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: u32, text: &str) -> Page {
        Page {
            number,
            text: text.to_string(),
        }
    }

    fn section(name: &str, source_pages: Vec<u32>) -> Section {
        Section {
            name: name.to_string(),
            content: "content".to_string(),
            source_pages,
        }
    }

    fn numbers(pages: &[ContributingPage]) -> Vec<u32> {
        pages.iter().map(|p| p.page).collect()
    }

    #[test]
    fn purpose_keywords_pick_matching_page() {
        let pages = vec![
            page(1, "This study explains the aim and purpose."),
            page(2, "No relevant content here."),
            page(3, "Patients undergo randomization and treatment procedures."),
        ];

        let result = PageAttributor::new().attribute(&section("Purpose of the Study", vec![]), &pages);
        assert_eq!(numbers(&result), vec![1]);
        // "study", "aim" and "purpose" all occur on page 1
        assert_eq!(result[0].relevance_score, Relevance::KeywordHits(3));
    }

    #[test]
    fn asserted_pages_are_trusted_in_order() {
        let pages = vec![page(1, "a"), page(2, "b"), page(3, "c")];
        let result = PageAttributor::new().attribute(&section("Risks", vec![3, 1]), &pages);

        assert_eq!(numbers(&result), vec![3, 1]);
        assert!(result
            .iter()
            .all(|p| p.relevance_score == Relevance::ModelIdentified));
    }

    #[test]
    fn unknown_asserted_pages_are_dropped_without_fallback() {
        let pages = vec![page(1, "risk of adverse events"), page(2, "harm")];
        let result = PageAttributor::new().attribute(&section("Risks", vec![9, 2, 40]), &pages);
        assert_eq!(numbers(&result), vec![2]);

        let none = PageAttributor::new().attribute(&section("Risks", vec![7]), &pages);
        assert!(none.is_empty());
    }

    #[test]
    fn keyword_fallback_caps_at_three_and_ranks_by_hits() {
        let pages = vec![
            page(1, "risk"),
            page(2, "risk, adverse, harm"),
            page(3, "Risk and danger"),
            page(4, "risk"),
            page(5, "COMPLICATION: side effect, risk"),
        ];

        let result = PageAttributor::new().attribute(&section("Risks", vec![]), &pages);
        assert_eq!(numbers(&result), vec![2, 5, 3]);
        assert_eq!(result[0].relevance_score, Relevance::KeywordHits(3));
        assert_eq!(result[2].relevance_score, Relevance::KeywordHits(2));
    }

    #[test]
    fn ties_preserve_page_order() {
        let pages = vec![
            page(1, "benefit"),
            page(2, "nothing"),
            page(3, "outcome"),
            page(4, "efficacy"),
            page(5, "positive"),
        ];

        let result = PageAttributor::new().attribute(&section("Benefits", vec![]), &pages);
        assert_eq!(numbers(&result), vec![1, 3, 4]);
    }

    #[test]
    fn substring_matches_count() {
        let pages = vec![page(1, "Protocols and methodology")];
        let result = PageAttributor::new().attribute(&section("Study Procedures", vec![]), &pages);
        assert_eq!(result[0].relevance_score, Relevance::KeywordHits(2));
    }

    #[test]
    fn unconfigured_sections_get_no_keyword_pages() {
        let pages = vec![page(1, "purpose risk benefit procedure")];
        let result = PageAttributor::new().attribute(&section("Compensation", vec![]), &pages);
        assert!(result.is_empty());
    }

    #[test]
    fn samples_are_truncated_to_150_chars() {
        let long = "risk ".repeat(60);
        let pages = vec![page(1, &long)];
        let result = PageAttributor::new().attribute(&section("Risks", vec![1]), &pages);

        assert_eq!(result[0].content_sample.chars().count(), 153);
        assert!(result[0].content_sample.ends_with("..."));
    }
}
