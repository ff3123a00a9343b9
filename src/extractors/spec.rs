// src/extractors/spec.rs
//! Compiled section specifications and the matches the locator produces.

use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::config::ExtractorConfig;
use crate::utils::error::ConfigError;

/// Strategy level that produced a match, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    IssuerSpecific,
    General,
    Relaxed,
    StructuralHeuristic,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Tier::IssuerSpecific => "issuer-specific",
            Tier::General => "general",
            Tier::Relaxed => "relaxed",
            Tier::StructuralHeuristic => "structural-heuristic",
        };
        f.write_str(name)
    }
}

/// One located section. `start..end` indexes the normalized text and never
/// includes the heading itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionMatch {
    pub section: String,
    pub start: usize,
    pub end: usize,
    pub tier: Tier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// The end boundary came from the paragraph-gap heuristic.
    pub heuristic_only: bool,
    pub low_confidence: bool,
    pub paragraph_breaks: usize,
    pub word_count: usize,
    pub heading: String,
}

impl SectionMatch {
    pub fn span<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

#[derive(Debug, Clone)]
pub struct SectionSpec {
    pub name: String,
    pub general: Vec<Regex>,
    pub relaxed: Vec<Regex>,
    /// Whether an open end may be closed by the paragraph-gap heuristic.
    pub structural_fallback: bool,
}

impl SectionSpec {
    /// True when one of this section's own headings starts exactly at `pos`.
    pub fn heading_at(&self, text: &str, pos: usize) -> bool {
        self.general
            .iter()
            .any(|re| re.find_at(text, pos).map(|m| m.start() == pos).unwrap_or(false))
    }
}

#[derive(Debug, Clone)]
pub struct IssuerPatterns {
    pub start: Regex,
    pub end: Option<Regex>,
}

#[derive(Debug, Clone)]
pub struct IssuerProfile {
    pub name: String,
    signatures: Vec<Regex>,
    sections: BTreeMap<String, IssuerPatterns>,
}

impl IssuerProfile {
    pub fn matches(&self, cover: &str) -> bool {
        self.signatures.iter().any(|re| re.is_match(cover))
    }

    pub fn patterns_for(&self, section: &str) -> Option<&IssuerPatterns> {
        self.sections.get(section)
    }
}

/// Everything the locator needs, compiled once and shared read-only.
#[derive(Debug, Clone)]
pub struct SectionCatalog {
    pub sections: Vec<SectionSpec>,
    pub issuers: Vec<IssuerProfile>,
    pub end_markers: Vec<Regex>,
}

impl SectionCatalog {
    pub fn compile(config: &ExtractorConfig) -> Result<Self, ConfigError> {
        let end_markers = config
            .end_markers
            .iter()
            .map(|p| compile_pattern("end_markers", p))
            .collect::<Result<Vec<_>, _>>()?;

        let sections = config
            .sections
            .iter()
            .map(|section| {
                let owner = format!("section '{}'", section.name);
                Ok(SectionSpec {
                    name: section.name.clone(),
                    general: compile_all(&owner, &section.patterns)?,
                    relaxed: compile_all(&owner, &section.relaxed)?,
                    structural_fallback: section.structural_fallback,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let issuers = config
            .issuers
            .iter()
            .map(|issuer| {
                let owner = format!("issuer '{}'", issuer.name);
                let mut patterns = BTreeMap::new();
                for (section, pair) in &issuer.sections {
                    patterns.insert(
                        section.clone(),
                        IssuerPatterns {
                            start: compile_pattern(&owner, &pair.start)?,
                            end: pair.end.as_deref().map(|p| compile_pattern(&owner, p)).transpose()?,
                        },
                    );
                }
                Ok(IssuerProfile {
                    name: issuer.name.clone(),
                    signatures: compile_all(&owner, &issuer.signatures)?,
                    sections: patterns,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        tracing::debug!(
            "Compiled {} sections, {} issuer profiles, {} end markers",
            sections.len(),
            issuers.len(),
            end_markers.len()
        );
        Ok(Self {
            sections,
            issuers,
            end_markers,
        })
    }
}

fn compile_all(owner: &str, patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns.iter().map(|p| compile_pattern(owner, p)).collect()
}

fn compile_pattern(owner: &str, pattern: &str) -> Result<Regex, ConfigError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .map_err(|source| ConfigError::InvalidPattern {
            owner: owner.to_string(),
            pattern: pattern.to_string(),
            source,
        })
}
