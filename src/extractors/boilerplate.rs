// src/extractors/boilerplate.rs
//! Non-substantive line/sentence detection.

use once_cell::sync::Lazy;
use regex::RegexSet;

use crate::config::BoilerplateConfig;

static BOILERPLATE_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        // page number only
        r"^\s*\d+\s*$",
        // page marker, with or without trailing text
        r"(?i)^\s*page\s+\d+(?:\s+of\s+\d+)?\b",
        // confidentiality / proprietary notices
        r"(?i)confidential|proprietary",
        // copyright with a year
        r"(?i)copyright.*\d{4}|©\s*\d{4}|all\s+rights\s+reserved",
        r"(?i)\(\s*continued\s*\)",
        // form identifiers
        r"(?i)\bform\s+10-?k\b",
        r"(?i)table\s+of\s+contents",
    ])
    .expect("Failed to compile BOILERPLATE_PATTERNS")
});

#[derive(Debug, Clone)]
pub struct BoilerplateClassifier {
    min_chars: usize,
}

impl Default for BoilerplateClassifier {
    fn default() -> Self {
        Self::new(&BoilerplateConfig::default())
    }
}

impl BoilerplateClassifier {
    pub fn new(config: &BoilerplateConfig) -> Self {
        Self {
            min_chars: config.min_chars,
        }
    }

    pub fn is_boilerplate(&self, text: &str) -> bool {
        let trimmed = text.trim();
        trimmed.chars().count() < self.min_chars || BOILERPLATE_PATTERNS.is_match(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_boilerplate() {
        let classifier = BoilerplateClassifier::default();
        assert!(classifier.is_boilerplate("Net sales rose."));
        assert!(classifier.is_boilerplate("   "));
        // 20 characters exactly passes the length rule
        assert!(!classifier.is_boilerplate("abcdefghij klmnopqrs"));
    }

    #[test]
    fn test_notices_and_markers() {
        let classifier = BoilerplateClassifier::default();
        let noise = [
            "                     42                     ",
            "Page 17 of 112 in the printed annual document",
            "This document contains confidential information of the company.",
            "Proprietary and not for distribution outside the company.",
            "Copyright 2023 Example Holdings. Used with permission here.",
            "© 2022 Example Corp. All rights reserved worldwide.",
            "We face intense competition in all markets... (continued)",
            "Annual Report on Form 10-K for the fiscal year ended 2023",
            "Refer to the Table of Contents for the location of items.",
        ];
        for text in noise {
            assert!(classifier.is_boilerplate(text), "expected boilerplate: {:?}", text);
        }
    }

    #[test]
    fn test_substantive_sentence_passes() {
        let classifier = BoilerplateClassifier::default();
        assert!(!classifier.is_boilerplate(
            "Our revenue increased by 12 percent compared with the prior year."
        ));
        assert!(!classifier.is_boilerplate(
            "Competition for qualified engineers remains intense in 2023."
        ));
    }

    #[test]
    fn test_threshold_is_configurable() {
        let classifier = BoilerplateClassifier::new(&BoilerplateConfig { min_chars: 10 });
        assert!(!classifier.is_boilerplate("Sales rose a lot."));
        assert!(classifier.is_boilerplate("Sales up."));
    }
}
