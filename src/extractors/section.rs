// src/extractors/section.rs

// --- Imports ---
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{ConfidencePolicy, ExtractorConfig, LocatorConfig};
use crate::extractors::normalize::NormalizedText;
use crate::extractors::spec::{IssuerProfile, SectionCatalog, SectionMatch, SectionSpec, Tier};
use crate::utils::floor_char_boundary;

// --- Heading context patterns ---
// A table-of-contents page reference left on the heading line or the next one
static PAGE_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:page\s+)?(?:\d{1,4}|[ivxlc]{1,6}|[a-z]-\d{1,3})(?:\s*-\s*\d{1,4})?$")
        .expect("Failed to compile PAGE_TOKEN_RE")
});

static HEADING_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:item\s*\d{1,2}\s*[a-c]?\b|part\s+(?:iv|iii|ii|i)\b)")
        .expect("Failed to compile HEADING_TOKEN_RE")
});

// Looser: anywhere in the lookahead window after a paragraph gap
static GAP_HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:item|part)\s+(?:\d{1,2}[a-c]?|iv|iii|ii|i)\b")
        .expect("Failed to compile GAP_HEADING_RE")
});

/// A section as one tier sees it. `end == None` means the tier found no
/// closing boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub start: usize,
    pub end: Option<usize>,
    pub heading: String,
    pub issuer: Option<String>,
}

/// One level of the fallback chain. Implementations are pure: the same text
/// and `SectionSpec` always give the same answer.
pub trait ExtractionStrategy: Send + Sync {
    fn tier(&self) -> Tier;
    fn locate(&self, doc: &NormalizedText, spec: &SectionSpec) -> Option<Candidate>;
}

/// Tier 1: hand-tuned start/end pairs for issuers recognised on the cover page.
pub struct IssuerExtractionStrategy {
    issuers: Vec<IssuerProfile>,
    scan_chars: usize,
}

impl IssuerExtractionStrategy {
    pub fn new(issuers: Vec<IssuerProfile>, scan_chars: usize) -> Self {
        Self { issuers, scan_chars }
    }

    pub fn detect<'a>(&'a self, text: &str) -> Option<&'a IssuerProfile> {
        let cover = &text[..floor_char_boundary(text, self.scan_chars)];
        self.issuers.iter().find(|issuer| issuer.matches(cover))
    }
}

impl ExtractionStrategy for IssuerExtractionStrategy {
    fn tier(&self) -> Tier {
        Tier::IssuerSpecific
    }

    fn locate(&self, doc: &NormalizedText, spec: &SectionSpec) -> Option<Candidate> {
        let text = doc.as_str();
        let issuer = self.detect(doc.cover())?;
        let patterns = issuer.patterns_for(&spec.name)?;
        tracing::trace!("Issuer '{}' detected, trying its '{}' patterns", issuer.name, spec.name);

        for m in patterns.start.find_iter(text) {
            let start = skip_leading_whitespace(text, m.end());
            if start >= text.len() {
                continue;
            }
            // The issuer's own end anchor is trusted as-is.
            let end = patterns
                .end
                .as_ref()
                .and_then(|re| re.find_at(text, start))
                .map(|end_match| end_match.start());
            return Some(Candidate {
                start,
                end,
                heading: m.as_str().trim().to_string(),
                issuer: Some(issuer.name.clone()),
            });
        }
        None
    }
}

/// Tier 2: the section's regular heading patterns with context checks.
pub struct PatternExtractionStrategy {
    end_markers: Vec<Regex>,
}

impl PatternExtractionStrategy {
    pub fn new(end_markers: Vec<Regex>) -> Self {
        Self { end_markers }
    }
}

impl ExtractionStrategy for PatternExtractionStrategy {
    fn tier(&self) -> Tier {
        Tier::General
    }

    fn locate(&self, doc: &NormalizedText, spec: &SectionSpec) -> Option<Candidate> {
        let text = doc.as_str();
        let (start, heading_end) = first_heading(text, &spec.general, |_, _| true)?;
        Some(Candidate {
            start: skip_leading_whitespace(text, heading_end),
            end: find_end_marker(text, heading_end, &self.end_markers, spec),
            heading: text[start..heading_end].trim().to_string(),
            issuer: None,
        })
    }
}

/// Tier 3: keyword-only variants. The matched line must still look like a heading.
pub struct RelaxedExtractionStrategy {
    end_markers: Vec<Regex>,
    max_heading_chars: usize,
}

impl RelaxedExtractionStrategy {
    pub fn new(end_markers: Vec<Regex>, max_heading_chars: usize) -> Self {
        Self {
            end_markers,
            max_heading_chars,
        }
    }
}

impl ExtractionStrategy for RelaxedExtractionStrategy {
    fn tier(&self) -> Tier {
        Tier::Relaxed
    }

    fn locate(&self, doc: &NormalizedText, spec: &SectionSpec) -> Option<Candidate> {
        let text = doc.as_str();
        let (start, heading_end) = first_heading(text, &spec.relaxed, |text, start| {
            line_at(text, start).len() <= self.max_heading_chars
        })?;
        Some(Candidate {
            start: skip_leading_whitespace(text, heading_end),
            end: find_end_marker(text, heading_end, &self.end_markers, spec),
            heading: text[start..heading_end].trim().to_string(),
            issuer: None,
        })
    }
}

/// Tier 4: closes an open section at a run of blank lines that is followed
/// shortly by something heading-like.
#[derive(Debug, Clone)]
pub struct StructuralEndFinder {
    min_blank_lines: usize,
    lookahead_chars: usize,
}

impl StructuralEndFinder {
    pub fn new(config: &LocatorConfig) -> Self {
        Self {
            min_blank_lines: config.gap_min_blank_lines,
            lookahead_chars: config.gap_lookahead_chars,
        }
    }

    pub fn find_end(&self, doc: &NormalizedText, start: usize) -> Option<usize> {
        let text = doc.as_str();
        doc.gaps_after(start)
            .filter(|gap| gap.blank_lines >= self.min_blank_lines)
            .find(|gap| {
                let window_end = floor_char_boundary(text, gap.offset + self.lookahead_chars);
                GAP_HEADING_RE.is_match(&text[gap.offset..window_end])
            })
            .map(|gap| gap.offset)
    }
}

// --- Main Extractor Structure ---
/// Runs the strategy chain for one section and turns the winning candidate
/// into a [`SectionMatch`].
pub struct SectionExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    structural: StructuralEndFinder,
    confidence: ConfidencePolicy,
}

impl SectionExtractor {
    pub fn new(catalog: &SectionCatalog, config: &ExtractorConfig) -> Self {
        let strategies: Vec<Box<dyn ExtractionStrategy>> = vec![
            Box::new(IssuerExtractionStrategy::new(
                catalog.issuers.clone(),
                config.locator.issuer_scan_chars,
            )),
            Box::new(PatternExtractionStrategy::new(catalog.end_markers.clone())),
            Box::new(RelaxedExtractionStrategy::new(
                catalog.end_markers.clone(),
                config.locator.max_heading_chars,
            )),
        ];
        Self::with_strategies(
            strategies,
            StructuralEndFinder::new(&config.locator),
            config.confidence,
        )
    }

    pub fn with_strategies(
        strategies: Vec<Box<dyn ExtractionStrategy>>,
        structural: StructuralEndFinder,
        confidence: ConfidencePolicy,
    ) -> Self {
        Self {
            strategies,
            structural,
            confidence,
        }
    }

    /// First tier with an accepted candidate wins; lower tiers are not consulted.
    pub fn locate(&self, doc: &NormalizedText, spec: &SectionSpec) -> Option<SectionMatch> {
        for strategy in &self.strategies {
            let Some(candidate) = strategy.locate(doc, spec) else {
                tracing::trace!("Tier {} found no '{}' heading", strategy.tier(), spec.name);
                continue;
            };
            if let Some(section) = self.finish(doc, spec, strategy.tier(), candidate) {
                return Some(section);
            }
            tracing::debug!("Tier {} candidate for '{}' had an empty span", strategy.tier(), spec.name);
        }
        tracing::warn!("Section '{}' not found by any tier", spec.name);
        None
    }

    fn finish(
        &self,
        doc: &NormalizedText,
        spec: &SectionSpec,
        tier: Tier,
        candidate: Candidate,
    ) -> Option<SectionMatch> {
        let text = doc.as_str();
        let (raw_end, tier, heuristic_only) = match candidate.end {
            Some(end) => (end, tier, false),
            None => match spec
                .structural_fallback
                .then(|| self.structural.find_end(doc, candidate.start))
                .flatten()
            {
                Some(end) => (end, Tier::StructuralHeuristic, true),
                None => (text.len(), tier, false),
            },
        };

        let start = candidate.start;
        let end = start + text.get(start..raw_end)?.trim_end().len();
        if start >= end {
            return None;
        }

        let span = &text[start..end];
        let paragraph_breaks = span.matches('\n').count();
        let word_count = span.split_whitespace().count();
        let low_confidence = self.confidence.is_low(paragraph_breaks, word_count);
        if low_confidence {
            tracing::warn!(
                "Section '{}' is low confidence: {} paragraph breaks, {} words",
                spec.name,
                paragraph_breaks,
                word_count
            );
        }
        tracing::debug!(
            "Located '{}' via {} tier at {}..{} (heading '{}')",
            spec.name,
            tier,
            start,
            end,
            candidate.heading
        );

        Some(SectionMatch {
            section: spec.name.clone(),
            start,
            end,
            tier,
            issuer: candidate.issuer,
            heuristic_only,
            low_confidence,
            paragraph_breaks,
            word_count,
            heading: candidate.heading,
        })
    }
}

/// Earliest match across `patterns` that passes the start-heading check and
/// `accept`. Returns (heading start, heading end). Equal starts prefer the
/// longer heading.
fn first_heading(
    text: &str,
    patterns: &[Regex],
    accept: impl Fn(&str, usize) -> bool,
) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    for re in patterns {
        let found = re
            .find_iter(text)
            .take_while(|m| best.map(|(start, _)| m.start() <= start).unwrap_or(true))
            .find(|m| is_start_heading(text, m.start(), m.end()) && accept(text, m.start()));
        if let Some(m) = found {
            let better = match best {
                None => true,
                Some((start, end)) => m.start() < start || (m.start() == start && m.end() > end),
            };
            if better {
                best = Some((m.start(), m.end()));
            }
        }
    }
    best
}

/// Nearest end marker after `from` that sits at a line start, is not a
/// table-of-contents echo and is not the section's own heading again.
fn find_end_marker(text: &str, from: usize, end_markers: &[Regex], spec: &SectionSpec) -> Option<usize> {
    end_markers
        .iter()
        .filter_map(|re| {
            re.find_iter(&text[from..])
                .map(|m| (from + m.start(), from + m.end()))
                .find(|&(start, end)| is_end_heading(text, start, end) && !spec.heading_at(text, start))
                .map(|(start, _)| start)
        })
        .min()
}

/// A real heading starts a line and is followed by body text, not by a page
/// number or another heading.
fn is_start_heading(text: &str, start: usize, end: usize) -> bool {
    if !preceded_by_break(text, start) {
        return false;
    }
    match following_text(text, end) {
        None => false,
        Some(next) => !PAGE_TOKEN_RE.is_match(next) && !HEADING_TOKEN_RE.is_match(next),
    }
}

/// End markers may close the document, so only position and page references matter.
fn is_end_heading(text: &str, start: usize, end: usize) -> bool {
    preceded_by_break(text, start)
        && following_text(text, end)
            .map(|next| !PAGE_TOKEN_RE.is_match(next))
            .unwrap_or(true)
}

fn preceded_by_break(text: &str, pos: usize) -> bool {
    pos == 0 || text[..pos].ends_with('\n')
}

/// Whatever follows a heading: the rest of its line, else the next line.
fn following_text(text: &str, end: usize) -> Option<&str> {
    let rest = &text[end..];
    let (line_rest, after) = match rest.find('\n') {
        Some(i) => (&rest[..i], Some(&rest[i + 1..])),
        None => (rest, None),
    };
    let line_rest = line_rest.trim_matches(|c: char| c.is_whitespace() || c == '.' || c == ':');
    if !line_rest.is_empty() {
        return Some(line_rest);
    }
    after
        .and_then(|after| after.split('\n').next())
        .map(str::trim)
        .filter(|next| !next.is_empty())
}

fn line_at(text: &str, pos: usize) -> &str {
    let line_start = text[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = text[pos..].find('\n').map(|i| pos + i).unwrap_or(text.len());
    &text[line_start..line_end]
}

fn skip_leading_whitespace(text: &str, from: usize) -> usize {
    text.len() - text[from..].trim_start().len()
}
