//! Turns raw model output into named sections.
//!
//! Two output shapes are accepted. The structured one is a JSON object keyed by
//! section name whose values are either `{"content": .., "source_pages": [..]}`
//! or, from older prompts, a bare content string. When the text is not valid
//! JSON of that shape the parser falls back to markdown, where a line of the
//! form `**Name**` opens a section.

use std::fmt;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::models::Section;

/// Sections keyed by name, in the order they were first encountered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionMap {
    sections: Vec<Section>,
}

impl SectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a section, replacing the content of an existing one with the same
    /// name while keeping its original position.
    pub fn insert(&mut self, section: Section) {
        match self.sections.iter_mut().find(|s| s.name == section.name) {
            Some(existing) => *existing = section,
            None => self.sections.push(section),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }
}

impl Serialize for SectionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Body<'a> {
            content: &'a str,
            source_pages: &'a [u32],
        }

        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for section in &self.sections {
            map.serialize_entry(
                &section.name,
                &Body {
                    content: &section.content,
                    source_pages: &section.source_pages,
                },
            )?;
        }
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SectionBody {
    Structured {
        content: String,
        #[serde(default)]
        source_pages: Option<Vec<u32>>,
    },
    Legacy(String),
}

impl SectionBody {
    fn into_parts(self) -> (String, Vec<u32>) {
        match self {
            SectionBody::Structured {
                content,
                source_pages,
            } => (content, source_pages.unwrap_or_default()),
            SectionBody::Legacy(content) => (content, Vec::new()),
        }
    }
}

/// JSON object entries in document order.
struct OrderedEntries(Vec<(String, SectionBody)>);

impl<'de> Deserialize<'de> for OrderedEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = OrderedEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping section names to section bodies")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(4));
                while let Some(entry) = access.next_entry::<String, SectionBody>()? {
                    entries.push(entry);
                }
                Ok(OrderedEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Parses model output, trying structured JSON first and markdown second.
pub fn parse_sections(raw: &str) -> SectionMap {
    parse_json_sections(raw).unwrap_or_else(|| parse_markdown_sections(raw))
}

/// Returns `None` unless the whole (fence-stripped) text is a section object.
pub fn parse_json_sections(raw: &str) -> Option<SectionMap> {
    let cleaned = strip_code_fences(raw);
    let OrderedEntries(entries) = serde_json::from_str(cleaned).ok()?;

    let mut sections = SectionMap::new();
    for (name, body) in entries {
        let (content, source_pages) = body.into_parts();
        push_section(&mut sections, &name, &content, source_pages);
    }
    Some(sections)
}

pub fn parse_markdown_sections(raw: &str) -> SectionMap {
    let mut sections = SectionMap::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in raw.lines().map(str::trim) {
        if let Some(name) = bold_header(line) {
            if let Some((previous, lines)) = current.take() {
                push_section(&mut sections, &previous, &lines.join("\n"), Vec::new());
            }
            current = Some((name.to_string(), Vec::new()));
        } else if let Some((_, lines)) = current.as_mut() {
            if !line.is_empty() {
                lines.push(line);
            }
        }
    }

    if let Some((name, lines)) = current {
        push_section(&mut sections, &name, &lines.join("\n"), Vec::new());
    }

    sections
}

/// Strips one leading ```` ```json ```` or ```` ``` ```` fence and one trailing
/// ```` ``` ```` fence.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// `**Name**` with nothing else on the line.
fn bold_header(line: &str) -> Option<&str> {
    let inner = line.strip_prefix("**")?.strip_suffix("**")?.trim();
    if inner.is_empty() || inner.contains("**") {
        return None;
    }
    Some(inner)
}

fn push_section(sections: &mut SectionMap, name: &str, content: &str, source_pages: Vec<u32>) {
    let name = name.trim();
    let content = content.trim();
    if name.is_empty() || content.is_empty() {
        return;
    }
    sections.insert(Section {
        name: name.to_string(),
        content: content.to_string(),
        source_pages,
    });
}
