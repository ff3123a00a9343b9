// src/pipeline/result.rs
use std::path::PathBuf;

use serde::Serialize;

use crate::extractors::{NormalizedText, SectionMatch, Sentence, SentenceBatch};
use crate::filing::FilingIdentity;

/// Absent, found with nothing worth keeping, or found with sentences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionStatus {
    Absent,
    Empty,
    Populated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionOutcome {
    Absent,
    Found {
        section: SectionMatch,
        sentences: SentenceBatch,
    },
}

impl SectionOutcome {
    pub fn status(&self) -> SectionStatus {
        match self {
            SectionOutcome::Absent => SectionStatus::Absent,
            SectionOutcome::Found { sentences, .. } if sentences.sentences.is_empty() => SectionStatus::Empty,
            SectionOutcome::Found { .. } => SectionStatus::Populated,
        }
    }

    pub fn section_match(&self) -> Option<&SectionMatch> {
        match self {
            SectionOutcome::Absent => None,
            SectionOutcome::Found { section, .. } => Some(section),
        }
    }

    pub fn sentences(&self) -> &[Sentence] {
        match self {
            SectionOutcome::Absent => &[],
            SectionOutcome::Found { sentences, .. } => &sentences.sentences,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionResult {
    pub name: String,
    pub outcome: SectionOutcome,
}

/// Everything extracted from one filing. Built once, written once.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub identity: FilingIdentity,
    pub source_path: Option<PathBuf>,
    pub encoding: Option<&'static str>,
    /// Sections in configuration order.
    pub sections: Vec<SectionResult>,
    /// Validated sentences of the whole normalized document.
    pub document_sentences: Vec<Sentence>,
    pub normalized: NormalizedText,
}

impl ExtractionResult {
    pub fn found_count(&self) -> usize {
        self.sections
            .iter()
            .filter(|s| s.outcome.status() != SectionStatus::Absent)
            .count()
    }

    pub fn report(&self) -> Vec<SectionReport> {
        self.sections.iter().map(SectionReport::from).collect()
    }
}

/// Per-section metadata as persisted next to the sentence files.
#[derive(Debug, Clone, Serialize)]
pub struct SectionReport {
    pub name: String,
    pub status: SectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SectionMatch>,
    pub sentence_count: usize,
    pub rejected_sentences: usize,
    pub duplicate_sentences: usize,
}

impl From<&SectionResult> for SectionReport {
    fn from(result: &SectionResult) -> Self {
        let (location, rejected, duplicates) = match &result.outcome {
            SectionOutcome::Absent => (None, 0, 0),
            SectionOutcome::Found { section, sentences } => {
                (Some(section.clone()), sentences.rejected, sentences.duplicates)
            }
        };
        Self {
            name: result.name.clone(),
            status: result.outcome.status(),
            location,
            sentence_count: result.outcome.sentences().len(),
            rejected_sentences: rejected,
            duplicate_sentences: duplicates,
        }
    }
}
