// src/pipeline/orchestrator.rs

// --- Imports ---
use std::path::Path;

use encoding_rs::Encoding;

use super::result::{ExtractionResult, SectionOutcome, SectionResult};
use crate::config::{BoilerplateConfig, ExtractorConfig};
use crate::extractors::{
    build_tokenizer, BoilerplateClassifier, Normalizer, SectionCatalog, SectionExtractor, SentenceValidator,
};
use crate::filing::{read_filing, resolve_encodings, FilingIdentity};
use crate::utils::error::{ConfigError, FilingError};

/// Filing in, [`ExtractionResult`] out. Built once at startup and shared
/// read-only by every worker.
pub struct Pipeline {
    normalizer: Normalizer,
    catalog: SectionCatalog,
    extractor: SectionExtractor,
    validator: SentenceValidator,
    encodings: Vec<&'static Encoding>,
    extensions: Vec<String>,
}

impl Pipeline {
    pub fn new(config: &ExtractorConfig) -> Result<Self, ConfigError> {
        let catalog = SectionCatalog::compile(config)?;
        let encodings = resolve_encodings(&config.input.encodings)?;
        let extractor = SectionExtractor::new(&catalog, config);

        // The classifier's own length floor must not undercut the active profile.
        let classifier = BoilerplateClassifier::new(&BoilerplateConfig {
            min_chars: config.boilerplate.min_chars.min(config.validation.min_chars()),
        });
        let validator = SentenceValidator::new(build_tokenizer(&config.tokenizer), classifier, &config.validation);
        tracing::info!(
            "Pipeline ready: {} sections, {} issuer profiles, {} sentence tokenizer",
            catalog.sections.len(),
            catalog.issuers.len(),
            validator.tokenizer_name()
        );

        Ok(Self {
            normalizer: Normalizer::new(&config.normalizer).with_cover_chars(config.locator.issuer_scan_chars),
            catalog,
            extractor,
            validator,
            encodings,
            extensions: config.input.extensions.clone(),
        })
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.catalog.sections.iter().map(|s| s.name.as_str())
    }

    /// Reads, decodes and processes the filing at `path`.
    pub fn process_path(&self, path: &Path) -> Result<ExtractionResult, FilingError> {
        let filing = read_filing(path, &self.encodings)?;
        let mut result = self.process_text(filing.identity, &filing.raw_text);
        result.source_path = Some(filing.source_path);
        result.encoding = Some(filing.encoding);
        Ok(result)
    }

    /// Runs every configured section over already-decoded text. A miss is an
    /// `Absent` outcome, never an error.
    pub fn process_text(&self, identity: FilingIdentity, raw_text: &str) -> ExtractionResult {
        let normalized = self.normalizer.normalize(raw_text);
        if normalized.is_empty() {
            tracing::warn!("{}: no text left after normalization", identity.stem());
        }

        let sections: Vec<SectionResult> = self
            .catalog
            .sections
            .iter()
            .map(|spec| {
                let outcome = match self.extractor.locate(&normalized, spec) {
                    None => SectionOutcome::Absent,
                    Some(section) => {
                        let sentences = self.validator.segment(section.span(normalized.as_str()));
                        if sentences.sentences.is_empty() {
                            tracing::warn!("{}: section '{}' found but has no valid sentences", identity.stem(), spec.name);
                        }
                        SectionOutcome::Found { section, sentences }
                    }
                };
                SectionResult {
                    name: spec.name.clone(),
                    outcome,
                }
            })
            .collect();

        let document_sentences = self.validator.segment(normalized.as_str()).sentences;
        let result = ExtractionResult {
            identity,
            source_path: None,
            encoding: None,
            sections,
            document_sentences,
            normalized,
        };

        if result.found_count() == 0 {
            tracing::warn!("{}: no sections found", result.identity.stem());
        } else {
            tracing::info!(
                "{}: {}/{} sections found, {} document sentences",
                result.identity.stem(),
                result.found_count(),
                result.sections.len(),
                result.document_sentences.len()
            );
        }
        result
    }
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationProfile;
    use crate::extractors::Tier;
    use crate::pipeline::result::SectionStatus;

    fn pipeline() -> Pipeline {
        Pipeline::new(&ExtractorConfig::default()).unwrap()
    }

    fn section<'a>(result: &'a ExtractionResult, name: &str) -> Option<&'a SectionOutcome> {
        result.sections.iter().find(|s| s.name == name).map(|s| &s.outcome)
    }

    fn identity() -> FilingIdentity {
        FilingIdentity::new("ACME", "10-K", None)
    }

    const FILING: &str = "PART I\n\
        ITEM 1. BUSINESS\n\
        We design and sell industrial pumps to utilities. Our customers operate water plants worldwide.\n\
        ITEM 1A. RISK FACTORS\n\
        We face intense competition... (continued)\n\
        ITEM 1B. UNRESOLVED STAFF COMMENTS\n\
        None.\n\
        PART II\n\
        ITEM 7. MANAGEMENT'S DISCUSSION AND ANALYSIS OF FINANCIAL CONDITION AND RESULTS OF OPERATIONS\n\
        Net sales increased eight percent in fiscal 2023. Gross margin declined slightly due to costs.\n\
        ITEM 7A. QUANTITATIVE AND QUALITATIVE DISCLOSURES ABOUT MARKET RISK\n\
        Interest rate exposure is limited to our revolving credit facility.";

    #[test]
    fn test_sections_statuses() {
        let result = pipeline().process_text(identity(), FILING);
        assert_eq!(result.sections.len(), 4);

        let business = section(&result, "business").unwrap();
        assert_eq!(business.status(), SectionStatus::Populated);
        assert_eq!(
            business.sentences().iter().map(|s| s.text.as_str()).collect::<Vec<_>>(),
            vec![
                "We design and sell industrial pumps to utilities.",
                "Our customers operate water plants worldwide."
            ]
        );

        // found, but its only sentence is a continuation fragment
        let risk = section(&result, "risk_factors").unwrap();
        assert_eq!(risk.status(), SectionStatus::Empty);
        let span = risk.section_match().unwrap().span(result.normalized.as_str());
        assert!(!span.contains("ITEM 1B"));

        let mdna = section(&result, "md_and_a").unwrap();
        assert_eq!(mdna.status(), SectionStatus::Populated);
        assert_eq!(mdna.section_match().unwrap().tier, Tier::General);
        assert_eq!(mdna.sentences().len(), 2);

        assert_eq!(section(&result, "financial_statements").unwrap().status(), SectionStatus::Absent);
        assert_eq!(result.found_count(), 3);
    }

    #[test]
    fn test_persisted_sentences_meet_minimums() {
        let result = pipeline().process_text(identity(), FILING);
        let classifier = BoilerplateClassifier::default();
        let all = result
            .sections
            .iter()
            .flat_map(|s| s.outcome.sentences())
            .chain(result.document_sentences.iter());
        for sentence in all {
            assert!(sentence.valid);
            assert!(sentence.char_len >= 20 && sentence.word_count >= 5, "{:?}", sentence);
            assert!(!classifier.is_boilerplate(&sentence.text));
        }
    }

    #[test]
    fn test_line_structure_survives_normalization() {
        let raw = "ITEM 1. BUSINESS\nWe design and sell industrial pumps to utilities.\n\n\n12\n\n\
                   Our customers operate water plants worldwide.\nITEM 1A. RISK FACTORS\n\
                   Supply shortages could delay our shipments.";
        let result = pipeline().process_text(identity(), raw);
        assert_eq!(
            result.normalized.as_str(),
            "ITEM 1. BUSINESS\nWe design and sell industrial pumps to utilities.\n\
             Our customers operate water plants worldwide.\nITEM 1A. RISK FACTORS\n\
             Supply shortages could delay our shipments."
        );
        assert_eq!(result.normalized.gaps.len(), 1);
        assert_eq!(section(&result, "business").unwrap().sentences().len(), 2);
        assert_eq!(section(&result, "risk_factors").unwrap().sentences().len(), 1);
    }

    #[test]
    fn test_issuer_profile_applies_to_full_filing() {
        let raw = "FORM 10-K\nApple Inc.\n(Exact name of Registrant as specified in its charter)\n\
                   Item 1A. Risk Factors\nThe Company's business can be affected by global economic conditions.\n\
                   Item 1B. Unresolved Staff Comments\nNone.\n\
                   Item 7. Management's Discussion and Analysis of Financial Condition and Results of Operations\n\
                   Net sales rose in every geographic segment this year.\n\
                   Item 7A. Quantitative and Qualitative Disclosures About Market Risk\nRates are hedged.";
        let result = pipeline().process_text(identity(), raw);
        for name in ["risk_factors", "md_and_a"] {
            let found = section(&result, name).unwrap().section_match().unwrap();
            assert_eq!(found.tier, Tier::IssuerSpecific, "{}", name);
            assert_eq!(found.issuer.as_deref(), Some("apple"));
        }
        assert_eq!(
            section(&result, "md_and_a").unwrap().sentences()[0].text,
            "Net sales rose in every geographic segment this year."
        );
    }

    #[test]
    fn test_no_headings_still_emits_result() {
        let result = pipeline().process_text(identity(), "Dear shareholders, this was a quiet year for us overall.");
        assert_eq!(result.found_count(), 0);
        assert!(result.sections.iter().all(|s| s.outcome == SectionOutcome::Absent));
        assert_eq!(result.document_sentences.len(), 1);
    }

    #[test]
    fn test_processing_is_idempotent() {
        let pipeline = pipeline();
        let first = pipeline.process_text(identity(), FILING);
        let second = pipeline.process_text(identity(), FILING);
        assert_eq!(first.sections, second.sections);
        assert_eq!(first.document_sentences, second.document_sentences);
    }

    #[test]
    fn test_lenient_profile_keeps_shorter_sentences() {
        let text = "ITEM 1. BUSINESS\nWe had a big win. We also sell many valves to utilities.";
        let strict = pipeline().process_text(identity(), text);
        assert_eq!(section(&strict, "business").unwrap().sentences().len(), 1);

        let mut config = ExtractorConfig::default();
        config.validation.profile = ValidationProfile::Lenient;
        let lenient = Pipeline::new(&config).unwrap().process_text(identity(), text);
        assert_eq!(section(&lenient, "business").unwrap().sentences().len(), 2);
    }

    #[test]
    fn test_bad_encoding_label_fails_construction() {
        let mut config = ExtractorConfig::default();
        config.input.encodings.push("not-an-encoding".to_string());
        assert!(matches!(Pipeline::new(&config), Err(ConfigError::UnknownEncoding(_))));
    }

    #[test]
    fn test_process_path_reads_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ACME_10-K_2024-02-01.txt");
        std::fs::write(&path, FILING).unwrap();
        let result = pipeline().process_path(&path).unwrap();
        assert_eq!(result.identity.stem(), "ACME_10-K_2024-02-01");
        assert_eq!(result.encoding, Some("UTF-8"));

        let missing = pipeline().process_path(&dir.path().join("missing.txt"));
        assert!(matches!(missing, Err(FilingError::Input(_))));
    }
}
