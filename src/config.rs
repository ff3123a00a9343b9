// src/config.rs
//! Extraction configuration.
//!
//! Loaded once at startup from the bundled `config/default.toml`, optionally
//! replaced table-by-table by a user file, then adjusted by CLI flags. The
//! value is immutable afterwards and shared read-only by every worker.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::utils::error::ConfigError;

const BUNDLED_CONFIG: &str = include_str!("../config/default.toml");

static BUNDLED: Lazy<ExtractorConfig> = Lazy::new(|| {
    toml::from_str(BUNDLED_CONFIG).expect("Failed to parse bundled config/default.toml")
});

/// Sentence length thresholds shipped with the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ValidationProfile {
    /// At least 20 characters and 5 words.
    Standard,
    /// At least 10 characters and 5 words.
    Lenient,
}

impl ValidationProfile {
    pub fn min_chars(self) -> usize {
        match self {
            ValidationProfile::Standard => 20,
            ValidationProfile::Lenient => 10,
        }
    }

    pub fn min_words(self) -> usize {
        5
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub profile: ValidationProfile,
    /// Overrides the profile's character minimum.
    pub min_chars: Option<usize>,
    /// Overrides the profile's word minimum.
    pub min_words: Option<usize>,
    /// Drop exact repeats of a sentence within one section.
    pub dedupe: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            profile: ValidationProfile::Standard,
            min_chars: None,
            min_words: None,
            dedupe: true,
        }
    }
}

impl ValidationConfig {
    pub fn min_chars(&self) -> usize {
        self.min_chars.unwrap_or_else(|| self.profile.min_chars())
    }

    pub fn min_words(&self) -> usize {
        self.min_words.unwrap_or_else(|| self.profile.min_words())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoilerplateConfig {
    pub min_chars: usize,
}

impl Default for BoilerplateConfig {
    fn default() -> Self {
        Self { min_chars: 20 }
    }
}

/// When a located span is too thin to trust. Both conditions must hold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidencePolicy {
    pub min_paragraph_breaks: usize,
    pub min_words: usize,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            min_paragraph_breaks: 2,
            min_words: 100,
        }
    }
}

impl ConfidencePolicy {
    pub fn is_low(&self, paragraph_breaks: usize, words: usize) -> bool {
        paragraph_breaks < self.min_paragraph_breaks && words < self.min_words
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Leading characters scanned for issuer signatures.
    pub issuer_scan_chars: usize,
    pub gap_min_blank_lines: usize,
    pub gap_lookahead_chars: usize,
    /// Longest line the relaxed tier still accepts as a heading.
    pub max_heading_chars: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            issuer_scan_chars: 10_000,
            gap_min_blank_lines: 2,
            gap_lookahead_chars: 200,
            max_heading_chars: 160,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub repeated_line_threshold: usize,
    pub max_repeated_line_chars: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            repeated_line_threshold: 3,
            max_repeated_line_chars: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Encoding labels tried in order after BOM sniffing.
    pub encodings: Vec<String>,
    pub extensions: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            encodings: vec!["utf-8".to_string(), "windows-1252".to_string()],
            extensions: vec!["txt".to_string(), "htm".to_string(), "html".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Extra abbreviations, one per line. Unreadable means punctuation fallback.
    pub abbreviations_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionConfig {
    pub name: String,
    pub patterns: Vec<String>,
    #[serde(default)]
    pub relaxed: Vec<String>,
    #[serde(default)]
    pub structural_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerSectionConfig {
    pub start: String,
    pub end: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerConfig {
    pub name: String,
    pub signatures: Vec<String>,
    #[serde(default)]
    pub sections: BTreeMap<String, IssuerSectionConfig>,
}

// Field defaults only, never a container default: the bundled file is parsed
// with this same type and must not recurse into `BUNDLED`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default = "bundled_end_markers")]
    pub end_markers: Vec<String>,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub boilerplate: BoilerplateConfig,
    #[serde(default)]
    pub confidence: ConfidencePolicy,
    #[serde(default)]
    pub locator: LocatorConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
    #[serde(default = "bundled_sections")]
    pub sections: Vec<SectionConfig>,
    #[serde(default = "bundled_issuers")]
    pub issuers: Vec<IssuerConfig>,
}

fn bundled_end_markers() -> Vec<String> {
    BUNDLED.end_markers.clone()
}

fn bundled_sections() -> Vec<SectionConfig> {
    BUNDLED.sections.clone()
}

fn bundled_issuers() -> Vec<IssuerConfig> {
    BUNDLED.issuers.clone()
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        BUNDLED.clone()
    }
}

impl ExtractorConfig {
    /// Parses a TOML document. Tables it omits keep their bundled values.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.check()?;
        Ok(config)
    }

    /// Loads `path`, or the bundled defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            tracing::debug!("Using bundled extraction config");
            return Ok(Self::default());
        };

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Loaded extraction config from {}", path.display());
        Self::from_toml(&contents)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.sections.is_empty() {
            return Err(ConfigError::Invalid("no sections configured".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for section in &self.sections {
            if !seen.insert(section.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "section '{}' defined twice",
                    section.name
                )));
            }
            if section.name.contains(['/', '\\']) || section.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "section name '{}' is not usable in a file name",
                    section.name
                )));
            }
        }
        if self.input.encodings.is_empty() {
            return Err(ConfigError::Invalid("no input encodings configured".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_config_parses() {
        let config = ExtractorConfig::default();
        let names: Vec<&str> = config.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["md_and_a", "risk_factors", "business", "financial_statements"]);
        assert_eq!(config.validation.min_chars(), 20);
        assert_eq!(config.validation.min_words(), 5);
        assert_eq!(config.input.encodings, ["utf-8", "windows-1252"]);
        assert!(!config.end_markers.is_empty());
        assert_eq!(config.issuers[0].name, "apple");
    }

    #[test]
    fn test_partial_file_keeps_bundled_tables() {
        let config = ExtractorConfig::from_toml(
            r#"
            [validation]
            profile = "lenient"
            "#,
        )
        .unwrap();
        assert_eq!(config.validation.min_chars(), 10);
        assert_eq!(config.validation.min_words(), 5);
        assert_eq!(config.sections.len(), 4);
        assert_eq!(config.confidence.min_words, 100);
    }

    #[test]
    fn test_explicit_thresholds_override_profile() {
        let config = ExtractorConfig::from_toml(
            r#"
            [validation]
            profile = "lenient"
            min_chars = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.validation.min_chars(), 30);
    }

    #[test]
    fn test_sections_table_replaces_defaults() {
        let config = ExtractorConfig::from_toml(
            r#"
            [[sections]]
            name = "legal_proceedings"
            patterns = ['item\s*3\W+legal\s+proceedings']
            "#,
        )
        .unwrap();
        assert_eq!(config.sections.len(), 1);
        assert!(!config.sections[0].structural_fallback);
    }

    #[test]
    fn test_duplicate_section_rejected() {
        let result = ExtractorConfig::from_toml(
            r#"
            [[sections]]
            name = "business"
            patterns = ['business']
            [[sections]]
            name = "business"
            patterns = ['business']
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_profile_is_parse_error() {
        let result = ExtractorConfig::from_toml("[validation]\nprofile = \"loose\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_confidence_policy_needs_both_conditions() {
        let policy = ConfidencePolicy::default();
        assert!(policy.is_low(1, 90));
        assert!(!policy.is_low(2, 90));
        assert!(!policy.is_low(1, 100));
    }
}
