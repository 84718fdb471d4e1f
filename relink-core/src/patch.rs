//! Rewrites `url` fields of named sections in an rclone style config file.
//!
//! Only the single field line of a matched section is ever replaced. Every
//! other byte of the document, line terminators included, is kept verbatim.

use crate::detect::LinkMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

pub const DEFAULT_FIELD: &str = "url";

/// Label to section name, e.g. `"Hindi Movies" -> "Hindi"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameMapping(BTreeMap<String, String>);

impl NameMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, section: impl Into<String>) {
        self.0.insert(label.into(), section.into());
    }

    pub fn section_for(&self, label: &str) -> Option<&str> {
        self.0.get(label).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(label, section)| (label.as_str(), section.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<L: Into<String>, S: Into<String>> FromIterator<(L, S)> for NameMapping {
    fn from_iter<I: IntoIterator<Item = (L, S)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(label, section)| (label.into(), section.into()))
                .collect(),
        )
    }
}

/// A config file as lines, each keeping its own terminator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    lines: Vec<String>,
}

impl ConfigDocument {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.split_inclusive('\n').map(String::from).collect(),
        }
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn read(path: &Path) -> io::Result<Self> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    pub fn write(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.render())
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.concat()
    }
}

/// Either the rewritten document, or the no-op marker when nothing changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchResult {
    Rewritten(ConfigDocument),
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub result: PatchResult,
    pub touched: BTreeSet<String>,
    /// Labels whose section header never occurs in the document.
    pub missing_sections: Vec<String>,
    /// Labels whose section exists but holds no field line.
    pub missing_fields: Vec<String>,
    /// Mapped labels with no known URL yet.
    pub unobserved: Vec<String>,
}

impl PatchOutcome {
    pub fn is_noop(&self) -> bool {
        matches!(self.result, PatchResult::NoOp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    Field(usize),
    MissingField,
    MissingSection,
}

/// Per-label scan state; a fresh scan starts for every label.
enum SectionScan {
    Searching,
    FoundSection,
    Done(Lookup),
}

pub struct Patcher {
    field: String,
}

impl Default for Patcher {
    fn default() -> Self {
        Self::new(DEFAULT_FIELD)
    }
}

impl Patcher {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
        }
    }

    pub fn patch(
        &self,
        doc: &ConfigDocument,
        sections: &NameMapping,
        new_urls: &LinkMap,
    ) -> PatchOutcome {
        let mut lines = doc.lines.clone();
        let mut touched = BTreeSet::new();
        let mut missing_sections = Vec::new();
        let mut missing_fields = Vec::new();
        let mut unobserved = Vec::new();

        for (label, section) in sections.iter() {
            let Some(new_url) = new_urls.get(label) else {
                debug!("No URL recorded for '{}' yet, skipping [{}]", label, section);
                unobserved.push(label.to_string());
                continue;
            };

            match self.locate(&lines, section) {
                Lookup::Field(idx) => {
                    let (content, terminator) = split_terminator(&lines[idx]);
                    if self.field_value(content) == new_url.as_str() {
                        debug!("[{}] already points at {}", section, new_url);
                        continue;
                    }
                    let rewritten = self.rewrite(content, terminator, new_url);
                    info!("Link for {} updated in [{}]", label, section);
                    lines[idx] = rewritten;
                    touched.insert(label.to_string());
                }
                Lookup::MissingField => {
                    warn!("Section [{}] for '{}' has no {} field", section, label, self.field);
                    missing_fields.push(label.to_string());
                }
                Lookup::MissingSection => {
                    warn!("Section [{}] for '{}' not found", section, label);
                    missing_sections.push(label.to_string());
                }
            }
        }

        let result = if touched.is_empty() {
            PatchResult::NoOp
        } else {
            PatchResult::Rewritten(ConfigDocument { lines })
        };

        PatchOutcome {
            result,
            touched,
            missing_sections,
            missing_fields,
            unobserved,
        }
    }

    /// First field line of the first `[section]`; the next header ends the section.
    fn locate(&self, lines: &[String], section: &str) -> Lookup {
        let mut state = SectionScan::Searching;

        for (idx, line) in lines.iter().enumerate() {
            let (content, _) = split_terminator(line);
            state = match state {
                SectionScan::Searching if header_name(content) == Some(section) => {
                    SectionScan::FoundSection
                }
                SectionScan::Searching => SectionScan::Searching,
                SectionScan::FoundSection if self.is_field(content) => {
                    SectionScan::Done(Lookup::Field(idx))
                }
                SectionScan::FoundSection if header_name(content).is_some() => {
                    SectionScan::Done(Lookup::MissingField)
                }
                SectionScan::FoundSection => SectionScan::FoundSection,
                done @ SectionScan::Done(_) => done,
            };

            if let SectionScan::Done(lookup) = state {
                return lookup;
            }
        }

        match state {
            SectionScan::Searching => Lookup::MissingSection,
            SectionScan::FoundSection => Lookup::MissingField,
            SectionScan::Done(lookup) => lookup,
        }
    }

    /// `url`, `url = x` and `url=x` match; `urls = x` and `url_path = x` do not.
    fn is_field(&self, content: &str) -> bool {
        content
            .trim_start()
            .strip_prefix(self.field.as_str())
            .map(|rest| {
                let rest = rest.trim_start();
                rest.is_empty() || rest.starts_with('=')
            })
            .unwrap_or(false)
    }

    fn field_value<'a>(&self, content: &'a str) -> &'a str {
        content
            .split_once('=')
            .map(|(_, value)| value.trim())
            .unwrap_or("")
    }

    fn rewrite(&self, content: &str, terminator: &str, new_url: &str) -> String {
        match content.find('=') {
            Some(eq) => {
                let after = &content[eq + 1..];
                let spacing = if after.trim().is_empty() {
                    " "
                } else {
                    &after[..after.len() - after.trim_start().len()]
                };
                format!("{}{}{}{}", &content[..=eq], spacing, new_url, terminator)
            }
            None => format!("{} = {}{}", content.trim_end(), new_url, terminator),
        }
    }
}

fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(content) = line.strip_suffix("\r\n") {
        (content, "\r\n")
    } else if let Some(content) = line.strip_suffix('\n') {
        (content, "\n")
    } else {
        (line, "")
    }
}

fn header_name(content: &str) -> Option<&str> {
    content
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
}
