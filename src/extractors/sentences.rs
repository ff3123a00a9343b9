// src/extractors/sentences.rs

// --- Imports ---
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::{TokenizerConfig, ValidationConfig};
use crate::extractors::boilerplate::BoilerplateClassifier;
use crate::utils::error::TokenizerError;

// Periods that end these words rarely end a sentence in a filing.
const DEFAULT_ABBREVIATIONS: &[&str] = &[
    "inc", "corp", "co", "ltd", "llc", "l.p", "n.a", "no", "nos", "u.s", "u.k", "e.g", "i.e", "vs",
    "mr", "mrs", "ms", "dr", "st", "jr", "sr", "approx", "dept", "fig", "jan", "feb", "mar",
    "apr", "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec",
];

/// A sentence candidate and whether it survived validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sentence {
    pub text: String,
    pub char_len: usize,
    pub word_count: usize,
    pub valid: bool,
}

/// Kept sentences in document order plus how many candidates were dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SentenceBatch {
    pub sentences: Vec<Sentence>,
    pub rejected: usize,
    pub duplicates: usize,
}

pub trait SentenceTokenizer: Send + Sync {
    fn name(&self) -> &'static str;
    fn tokenize(&self, text: &str) -> Result<Vec<String>, TokenizerError>;
}

/// UAX #29 sentence boundaries, with fragments that end on a known
/// abbreviation glued back to the following one.
#[derive(Debug, Clone)]
pub struct UnicodeSentenceTokenizer {
    abbreviations: HashSet<String>,
}

impl Default for UnicodeSentenceTokenizer {
    fn default() -> Self {
        Self {
            abbreviations: DEFAULT_ABBREVIATIONS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl UnicodeSentenceTokenizer {
    /// Adds one abbreviation per line from `path`. Blank lines and `#`
    /// comments are ignored; a trailing period is optional. An entry with
    /// inner whitespace fails the whole file.
    pub fn with_abbreviations_file(mut self, path: &Path) -> Result<Self, TokenizerError> {
        let content = fs::read_to_string(path).map_err(|source| TokenizerError::ResourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        let before = self.abbreviations.len();
        for line in content.lines() {
            let entry = line.trim();
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }
            if entry.contains(char::is_whitespace) {
                return Err(TokenizerError::Failed(format!(
                    "abbreviation '{}' in {} is not a single token",
                    entry,
                    path.display()
                )));
            }
            self.abbreviations.insert(entry.trim_end_matches('.').to_lowercase());
        }
        tracing::debug!(
            "Loaded {} extra abbreviations from {}",
            self.abbreviations.len() - before,
            path.display()
        );
        Ok(self)
    }

    fn ends_with_abbreviation(&self, fragment: &str) -> bool {
        let Some(last) = fragment.split_whitespace().last() else {
            return false;
        };
        let Some(word) = last.strip_suffix('.') else {
            return false;
        };
        let word = word.trim_start_matches(|c: char| c == '(' || c == '"' || c == '\'');
        // single initials: "John A. Smith"
        let initial = word.chars().count() == 1 && word.chars().all(char::is_uppercase);
        initial || self.abbreviations.contains(&word.to_lowercase())
    }
}

impl SentenceTokenizer for UnicodeSentenceTokenizer {
    fn name(&self) -> &'static str {
        "unicode"
    }

    fn tokenize(&self, text: &str) -> Result<Vec<String>, TokenizerError> {
        let mut sentences: Vec<String> = Vec::new();
        let mut pending = String::new();
        for fragment in text.unicode_sentences() {
            pending.push_str(fragment);
            if self.ends_with_abbreviation(pending.trim_end()) {
                continue;
            }
            push_trimmed(&mut sentences, &pending);
            pending.clear();
        }
        push_trimmed(&mut sentences, &pending);
        Ok(sentences)
    }
}

/// Splits after `.`, `!` or `?` followed by whitespace. Used when the
/// primary tokenizer is unavailable or fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct PunctuationTokenizer;

impl SentenceTokenizer for PunctuationTokenizer {
    fn name(&self) -> &'static str {
        "punctuation"
    }

    fn tokenize(&self, text: &str) -> Result<Vec<String>, TokenizerError> {
        let mut sentences = Vec::new();
        let mut last = 0;
        let mut chars = text.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if matches!(c, '.' | '!' | '?') {
                if let Some(&(_, next)) = chars.peek() {
                    if next.is_whitespace() {
                        let end = i + c.len_utf8();
                        push_trimmed(&mut sentences, &text[last..end]);
                        last = end;
                    }
                }
            }
        }
        push_trimmed(&mut sentences, &text[last..]);
        Ok(sentences)
    }
}

fn push_trimmed(out: &mut Vec<String>, candidate: &str) {
    let trimmed = candidate.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// The Unicode tokenizer with any configured abbreviations, or the
/// punctuation split when the abbreviation resource cannot be read.
pub fn build_tokenizer(config: &TokenizerConfig) -> Box<dyn SentenceTokenizer> {
    let tokenizer = UnicodeSentenceTokenizer::default();
    match &config.abbreviations_path {
        None => Box::new(tokenizer),
        Some(path) => match tokenizer.with_abbreviations_file(path) {
            Ok(tokenizer) => Box::new(tokenizer),
            Err(e) => {
                tracing::warn!("{}; falling back to punctuation sentence splitting", e);
                Box::new(PunctuationTokenizer)
            }
        },
    }
}

/// Segments a section's text and keeps the sentences worth scoring.
pub struct SentenceValidator {
    tokenizer: Box<dyn SentenceTokenizer>,
    fallback: PunctuationTokenizer,
    classifier: BoilerplateClassifier,
    min_chars: usize,
    min_words: usize,
    dedupe: bool,
}

impl SentenceValidator {
    pub fn new(
        tokenizer: Box<dyn SentenceTokenizer>,
        classifier: BoilerplateClassifier,
        config: &ValidationConfig,
    ) -> Self {
        Self {
            tokenizer,
            fallback: PunctuationTokenizer,
            classifier,
            min_chars: config.min_chars(),
            min_words: config.min_words(),
            dedupe: config.dedupe,
        }
    }

    pub fn tokenizer_name(&self) -> &'static str {
        self.tokenizer.name()
    }

    /// Scores one candidate against the length minimums and the classifier.
    pub fn assess(&self, candidate: &str) -> Sentence {
        let text = candidate.trim().to_string();
        let char_len = text.chars().count();
        let word_count = text.split_whitespace().count();
        let valid = char_len >= self.min_chars
            && word_count >= self.min_words
            && !self.classifier.is_boilerplate(&text);
        Sentence {
            text,
            char_len,
            word_count,
            valid,
        }
    }

    /// Validated sentences of `text` in order. Empty text gives an empty batch.
    pub fn segment(&self, text: &str) -> SentenceBatch {
        let flattened = text.replace('\n', " ");
        let candidates = match self.tokenizer.tokenize(&flattened) {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!("{} tokenizer failed ({}), using punctuation split", self.tokenizer.name(), e);
                self.fallback.tokenize(&flattened).unwrap_or_default()
            }
        };

        let mut batch = SentenceBatch::default();
        let mut seen: HashSet<String> = HashSet::new();
        for candidate in candidates {
            let sentence = self.assess(&candidate);
            if !sentence.valid {
                batch.rejected += 1;
                continue;
            }
            if self.dedupe && !seen.insert(sentence.text.clone()) {
                batch.duplicates += 1;
                continue;
            }
            batch.sentences.push(sentence);
        }
        tracing::trace!(
            "Kept {} sentences, rejected {}, {} duplicates",
            batch.sentences.len(),
            batch.rejected,
            batch.duplicates
        );
        batch
    }
}
