use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{info, warn};

use crate::assembler::render_document;
use crate::attribution::PageAttributor;
use crate::audit::{build_audit_log, page_samples};
use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::extract::extract_pages;
use crate::llm::CompletionModel;
use crate::models::{DocumentKind, GenerateResponse, LogEntry, Page, PageSample};
use crate::sections::{parse_json_sections, parse_markdown_sections, SectionMap};

pub const BUILTIN_FALLBACK_RESPONSE: &str = include_str!("../resources/fallback_response.json");

const SYSTEM_PROMPT: &str =
    "You are a clinical document parser. Return only valid JSON format as requested.";

/// Where the section text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelOutcome {
    Live(String),
    Fallback(String),
}

impl ModelOutcome {
    pub fn text(&self) -> &str {
        match self {
            ModelOutcome::Live(text) | ModelOutcome::Fallback(text) => text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ModelOutcome::Fallback(_))
    }
}

/// Everything produced for one protocol document.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub generated_text: String,
    pub json_sections: Option<SectionMap>,
    pub sections: SectionMap,
    pub page_log: Vec<PageSample>,
    pub audit_log: Vec<LogEntry>,
    pub used_fallback: bool,
    pub document: Vec<u8>,
}

impl GenerationReport {
    pub fn into_response(self, download_url: String) -> GenerateResponse {
        GenerateResponse {
            download_url,
            generated_text: self.generated_text,
            log: self.page_log,
            detailed_log: self.audit_log,
            sections: self.json_sections,
            used_fallback: self.used_fallback,
        }
    }
}

#[derive(Clone)]
pub struct IcfGenerator {
    config: AppConfig,
    model: Arc<dyn CompletionModel>,
    fallback_text: Arc<str>,
    attributor: PageAttributor,
}

impl IcfGenerator {
    pub fn new(
        config: AppConfig,
        model: Arc<dyn CompletionModel>,
        fallback_text: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            config,
            model,
            fallback_text: fallback_text.into(),
            attributor: PageAttributor::new(),
        }
    }

    pub async fn generate(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<GenerationReport, PipelineError> {
        let kind = DocumentKind::from_file_name(file_name).ok_or_else(|| {
            PipelineError::UnsupportedFormat {
                file_name: file_name.to_string(),
            }
        })?;
        let pages = extract_pages(kind, bytes).await?;
        self.generate_from_pages(&pages).await
    }

    pub async fn generate_from_pages(
        &self,
        pages: &[Page],
    ) -> Result<GenerationReport, PipelineError> {
        let prompt = build_extraction_prompt(pages, self.config.models.prompt_char_limit);
        let outcome = self.request_sections(&prompt).await;

        let json_sections = parse_json_sections(outcome.text());
        let generated_text = match (&outcome, &json_sections) {
            (ModelOutcome::Live(raw), Some(sections)) => {
                serde_json::to_string_pretty(sections).unwrap_or_else(|_| raw.clone())
            }
            _ => outcome.text().to_string(),
        };
        let sections = json_sections
            .clone()
            .unwrap_or_else(|| parse_markdown_sections(outcome.text()));

        info!(
            sections = sections.len(),
            structured = json_sections.is_some(),
            fallback = outcome.is_fallback(),
            "parsed model output"
        );

        let audit_log = build_audit_log(&sections, pages, &self.attributor);
        let document = render_document(&sections, &generated_text, &audit_log, &Local::now())?;

        Ok(GenerationReport {
            generated_text,
            json_sections,
            sections,
            page_log: page_samples(pages),
            audit_log,
            used_fallback: outcome.is_fallback(),
            document,
        })
    }

    /// One attempt against the model service; any failure substitutes the
    /// fallback response.
    pub async fn request_sections(&self, prompt: &str) -> ModelOutcome {
        match self.call_model(prompt).await {
            Ok(text) => ModelOutcome::Live(text),
            Err(err) => {
                warn!("{err}; using fallback response");
                ModelOutcome::Fallback(self.fallback_text.to_string())
            }
        }
    }

    async fn call_model(&self, prompt: &str) -> Result<String, PipelineError> {
        let started = Instant::now();
        let result = self
            .model
            .complete(SYSTEM_PROMPT, prompt)
            .await
            .map_err(|err| PipelineError::ModelUnavailable(format!("{err:#}")));

        info!(
            model = self.model.name(),
            ok = result.is_ok(),
            latency_ms = started.elapsed().as_millis() as u64,
            "model call finished"
        );
        result
    }
}

/// Reads the fallback response override, or the built-in one when unset.
pub async fn load_fallback_response(config: &AppConfig) -> Result<String> {
    match &config.fallback_response_path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read fallback response: {}", path.display())),
        None => Ok(BUILTIN_FALLBACK_RESPONSE.to_string()),
    }
}

/// Page-marked protocol text, cut to `char_limit` characters, wrapped in the
/// section extraction instructions.
pub fn build_extraction_prompt(pages: &[Page], char_limit: usize) -> String {
    let combined = pages
        .iter()
        .map(|page| format!("--- Page {} ---\n{}", page.number, page.text))
        .collect::<Vec<_>>()
        .join("\n");
    let excerpt: String = combined.chars().take(char_limit).collect();

    format!(
        r#"Extract the following sections from the clinical trial protocol and return a JSON object with section names as keys.
Each value must be an object with "content" (the extracted text, written for a study participant) and "source_pages" (the page numbers, from the "--- Page N ---" markers, that the content was taken from).

Return format:
{{
    "Purpose of the Study": {{"content": "extracted content here", "source_pages": [1]}},
    "Study Procedures": {{"content": "extracted content here (include number of patients and study duration if available)", "source_pages": [2, 3]}},
    "Risks": {{"content": "extracted content here", "source_pages": [4]}},
    "Benefits": {{"content": "extracted content here", "source_pages": [5]}}
}}

Text to analyze:
{excerpt}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Relevance;
    use async_trait::async_trait;

    struct CannedModel(&'static str);

    #[async_trait]
    impl CompletionModel for CannedModel {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _system: &str, _prompt: &str) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn generator(model: impl CompletionModel + 'static) -> IcfGenerator {
        IcfGenerator::new(AppConfig::default(), Arc::new(model), BUILTIN_FALLBACK_RESPONSE)
    }

    fn page(number: u32, text: &str) -> Page {
        Page {
            number,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn unreachable_model_uses_fallback_for_empty_pages() {
        let pages = vec![page(1, ""), page(2, "")];
        let report = generator(crate::llm::OfflineModel)
            .generate_from_pages(&pages)
            .await
            .unwrap();

        assert!(report.used_fallback);
        assert_eq!(report.generated_text, BUILTIN_FALLBACK_RESPONSE);
        assert_eq!(report.page_log.len(), 2);
        assert!(report.page_log.iter().all(|p| p.text_sample.is_empty()));
        assert_eq!(report.sections.len(), 4);
        assert!(report.json_sections.is_some());
        assert!(!report.document.is_empty());

        match report.audit_log.last() {
            Some(LogEntry::DocumentGeneration {
                total_sections: 4,
                total_pages: 2,
                ..
            }) => {}
            other => panic!("unexpected summary entry: {other:?}"),
        }
    }

    #[tokio::test]
    async fn live_json_is_canonicalised_and_attributed() {
        let raw = "```json\n{\"Risks\": {\"content\": \"Nausea.\", \"source_pages\": [2, 7]}, \"Benefits\": \"None expected.\"}\n```";
        let pages = vec![page(1, "Study outcome and benefit summary."), page(2, "Adverse events.")];

        let report = generator(CannedModel(raw))
            .generate_from_pages(&pages)
            .await
            .unwrap();

        assert!(!report.used_fallback);
        assert!(report.generated_text.starts_with("{\n"));
        assert_eq!(
            parse_json_sections(&report.generated_text),
            report.json_sections
        );

        let LogEntry::SectionGeneration {
            contributing_pages, ..
        } = &report.audit_log[0]
        else {
            panic!("expected section entry");
        };
        assert_eq!(contributing_pages.len(), 1);
        assert_eq!(contributing_pages[0].relevance_score, Relevance::ModelIdentified);

        let LogEntry::SectionGeneration {
            contributing_pages, ..
        } = &report.audit_log[1]
        else {
            panic!("expected section entry");
        };
        assert_eq!(contributing_pages[0].page, 1);
        assert_eq!(contributing_pages[0].relevance_score, Relevance::KeywordHits(2));
    }

    #[tokio::test]
    async fn markdown_output_is_kept_verbatim() {
        let raw = "**Risks**\nMild headache.\n**Benefits**\nNone.";
        let report = generator(CannedModel(raw))
            .generate_from_pages(&[page(1, "text")])
            .await
            .unwrap();

        assert_eq!(report.generated_text, raw);
        assert!(report.json_sections.is_none());
        assert_eq!(report.sections.len(), 2);
        assert_eq!(report.audit_log.len(), 3);

        let response = report.into_response("/api/download_icf/?file=icf_x.docx".to_string());
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("sections").is_none());
    }

    #[tokio::test]
    async fn unparseable_output_degrades_to_no_sections() {
        let report = generator(CannedModel("I cannot help with that."))
            .generate_from_pages(&[page(1, "risk")])
            .await
            .unwrap();

        assert!(report.sections.is_empty());
        assert_eq!(report.audit_log.len(), 1);
        assert_eq!(report.generated_text, "I cannot help with that.");
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected_before_extraction() {
        let err = generator(CannedModel("{}"))
            .generate("protocol.txt", b"text".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
    }

    #[test]
    fn prompt_marks_pages_and_respects_limit() {
        let pages = vec![page(1, "alpha"), page(2, "beta")];
        let prompt = build_extraction_prompt(&pages, 4_000);
        assert!(prompt.contains("--- Page 1 ---\nalpha\n--- Page 2 ---\nbeta"));
        assert!(prompt.contains("\"source_pages\""));

        let short = build_extraction_prompt(&pages, 18);
        assert!(short.contains("--- Page 1 ---\nalp\n"));
        assert!(!short.contains("beta"));
    }

    #[test]
    fn builtin_fallback_is_structured_json() {
        let sections = parse_json_sections(BUILTIN_FALLBACK_RESPONSE).unwrap();
        let names: Vec<&str> = sections.names().collect();
        assert_eq!(
            names,
            ["Purpose of the Study", "Study Procedures", "Risks", "Benefits"]
        );
    }
}
