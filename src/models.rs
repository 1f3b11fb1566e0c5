use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::sections::SectionMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    /// Picks the extractor from the upload's file name, ignoring case.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            Some(DocumentKind::Pdf)
        } else if lower.ends_with(".docx") {
            Some(DocumentKind::Docx)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "PDF",
            DocumentKind::Docx => "DOCX",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One page of extracted protocol text. Numbers are 1-based and contiguous.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub content: String,
    pub source_pages: Vec<u32>,
}

/// Why a page was attributed to a section. Serialises as the string
/// `"model-identified"` or as the bare keyword hit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    ModelIdentified,
    KeywordHits(usize),
}

impl Serialize for Relevance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Relevance::ModelIdentified => serializer.serialize_str("model-identified"),
            Relevance::KeywordHits(hits) => serializer.serialize_u64(*hits as u64),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ContributingPage {
    pub page: u32,
    pub content_sample: String,
    pub relevance_score: Relevance,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEntry {
    SectionGeneration {
        section: String,
        content_preview: String,
        content_length: usize,
        contributing_pages: Vec<ContributingPage>,
        description: String,
    },
    DocumentGeneration {
        total_sections: usize,
        total_pages: usize,
        description: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageSample {
    pub page: u32,
    pub text_sample: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    pub download_url: String,
    pub generated_text: String,
    pub log: Vec<PageSample>,
    pub detailed_log: Vec<LogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections: Option<SectionMap>,
    pub used_fallback: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadQuery {
    pub file: Option<String>,
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.char_indices();
    match chars.nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
