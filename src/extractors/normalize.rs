// src/extractors/normalize.rs

// --- Imports ---
use std::borrow::Cow;
use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{node::Node, Html};
use serde::Serialize;

use crate::config::{LocatorConfig, NormalizerConfig};
use crate::utils::floor_char_boundary;

// --- Markup handling ---
static MARKUP_HINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*/?\s*(?:html|body|div|p|br|table|tr|td|font|span|document|h[1-6])\b[^>]*>")
        .expect("Failed to compile MARKUP_HINT_RE")
});

// Dropped with everything inside them
const SKIPPED_ELEMENTS: &[&str] = &["head", "script", "style", "noscript", "title", "template"];

const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "table", "tr", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6",
    "section", "article", "blockquote", "pre", "hr", "center", "document", "page",
];

const CELL_ELEMENTS: &[&str] = &["td", "th"];

// --- Line level noise (applied to whitespace-collapsed lines) ---
static PAGE_NUMBER_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:(?:page\s+)?\d{1,4}(?:\s+of\s+\d{1,4})?|-\s*\d{1,4}\s*-|[ivxlc]{1,7}|[a-z]-\d{1,3})$",
    )
    .expect("Failed to compile PAGE_NUMBER_LINE_RE")
});

// "Acme Holdings Corp." or "ACME CORP | 2023 Form 10-K | 12"
static RUNNING_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[A-Z0-9][\w&.,'-]*\s+){0,6}(?i:inc\.?|incorporated|corporation|corp\.?|company|co\.|ltd\.?|limited|llc|l\.?p\.|plc|n\.v\.|s\.a\.|holdings)(?:\s*[|\-]\s*.*)?$",
    )
    .expect("Failed to compile RUNNING_HEADER_RE")
});

static TOC_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\(?\s*(?:back\s+to\s+)?table\s+of\s+contents\s*\)?$")
        .expect("Failed to compile TOC_LINE_RE")
});

// --- Inline noise, applied in order ---
static INLINE_NOISE_RE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // residual tags
        r"</?[a-zA-Z][a-zA-Z0-9]*(?:\s[^<>]*)?/?>",
        // table rules and dot leaders
        r"[-_=*~]{3,}|\.{4,}",
        // bracketed numeric citations: [1], [2, 3], [4-6]
        r"\[\s*\d{1,3}(?:\s*[,\-]\s*\d{1,3})*\s*\]",
        r"(?i)\b(?:https?://|www\.)[^\s<>]+",
        r"\b[\w.+-]+@[\w-]+(?:\.[\w-]+)+\b",
        r"[®©™℠†‡§¶]",
        r"(?i)\(?\btable\s+of\s+contents\b\)?",
        r"(?i)\bpage\s+\d{1,4}(?:\s+of\s+\d{1,4})?\b",
    ]
    .iter()
    .map(|pat| Regex::new(pat).expect("Failed to compile inline noise pattern"))
    .collect()
});

// --- Structural anchors ---
static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:ITEM|Item)\s+\d{1,2}\s*[A-Ca-c]?\s*[.:\-]|\bPART\s+(?:IV|III|II|I)\b")
        .expect("Failed to compile ANCHOR_RE")
});

static ANCHOR_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:item\s+\d{1,2}\s*[a-c]?\b|part\s+(?:iv|iii|ii|i)\b)")
        .expect("Failed to compile ANCHOR_LINE_RE")
});

/// A run of blank lines in the raw input, located in normalized coordinates.
///
/// `offset` is the byte index of the `\n` that replaced the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParagraphGap {
    pub offset: usize,
    pub blank_lines: usize,
}

/// Normalizer output: text with one line per paragraph, plus where the blank
/// lines used to be.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedText {
    pub text: String,
    pub gaps: Vec<ParagraphGap>,
    /// Leading text before any line was dropped as noise. Cover-page lines
    /// such as the registrant name look like running headers.
    pub cover: String,
}

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The unfiltered cover text, or the normalized text when none was kept.
    pub fn cover(&self) -> &str {
        if self.cover.is_empty() {
            &self.text
        } else {
            &self.cover
        }
    }

    /// Gaps strictly after `offset`, in document order.
    pub fn gaps_after(&self, offset: usize) -> impl Iterator<Item = &ParagraphGap> {
        let first = self.gaps.partition_point(|gap| gap.offset <= offset);
        self.gaps[first..].iter()
    }
}

#[derive(Debug)]
struct Line {
    text: String,
    blank_before: usize,
}

/// Turns raw filing text (plain or markup) into layout-free lines.
#[derive(Debug, Clone)]
pub struct Normalizer {
    repeated_line_threshold: usize,
    max_repeated_line_chars: usize,
    cover_chars: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&NormalizerConfig::default())
    }
}

impl Normalizer {
    pub fn new(config: &NormalizerConfig) -> Self {
        Self {
            repeated_line_threshold: config.repeated_line_threshold,
            max_repeated_line_chars: config.max_repeated_line_chars,
            cover_chars: LocatorConfig::default().issuer_scan_chars,
        }
    }

    /// How much leading text is kept unfiltered for issuer detection.
    pub fn with_cover_chars(mut self, cover_chars: usize) -> Self {
        self.cover_chars = cover_chars;
        self
    }

    /// Never fails. Malformed markup degrades to treating the input as text.
    pub fn normalize(&self, raw: &str) -> NormalizedText {
        let stripped: Cow<str> = if looks_like_markup(raw) {
            match strip_markup(raw) {
                Some(text) => Cow::Owned(text),
                None => {
                    tracing::warn!("Markup stripping produced no text, normalizing input as-is");
                    Cow::Borrowed(raw)
                }
            }
        } else {
            Cow::Borrowed(raw)
        };

        let plain = normalize_punctuation(&stripped);
        let cover = self.cover_text(&plain);
        let lines = self.clean_lines(&plain);
        let lines = self.drop_repeated_lines(lines);
        let lines = merge_hyphenated_lines(lines);
        let lines = split_at_anchors(lines);

        let mut normalized = NormalizedText {
            cover,
            ..NormalizedText::default()
        };
        for line in lines {
            if !normalized.text.is_empty() {
                if line.blank_before > 0 {
                    normalized.gaps.push(ParagraphGap {
                        offset: normalized.text.len(),
                        blank_lines: line.blank_before,
                    });
                }
                normalized.text.push('\n');
            }
            normalized.text.push_str(&line.text);
        }

        tracing::trace!(
            "Normalized {} raw bytes into {} bytes, {} paragraph gaps",
            raw.len(),
            normalized.text.len(),
            normalized.gaps.len()
        );
        normalized
    }

    /// Whitespace-collapsed non-blank lines, up to `cover_chars` bytes.
    fn cover_text(&self, plain: &str) -> String {
        let mut cover = String::new();
        for line in plain.split('\n').map(collapse_whitespace).filter(|l| !l.is_empty()) {
            if !cover.is_empty() {
                cover.push('\n');
            }
            cover.push_str(&line);
            if cover.len() >= self.cover_chars {
                break;
            }
        }
        cover.truncate(floor_char_boundary(&cover, self.cover_chars));
        cover
    }

    /// Collapses whitespace and removes noise line by line. Removed lines are
    /// transparent: blank lines on either side of them add up.
    fn clean_lines(&self, text: &str) -> Vec<Line> {
        let mut lines = Vec::new();
        let mut blank_run = 0usize;

        for raw_line in text.split('\n') {
            let collapsed = collapse_whitespace(raw_line);
            if collapsed.is_empty() {
                blank_run += 1;
                continue;
            }
            if is_noise_line(&collapsed) {
                continue;
            }

            let mut cleaned = collapsed;
            for re in INLINE_NOISE_RE.iter() {
                if re.is_match(&cleaned) {
                    cleaned = re.replace_all(&cleaned, " ").into_owned();
                }
            }
            let cleaned = collapse_whitespace(&cleaned);
            if cleaned.is_empty() || is_noise_line(&cleaned) {
                continue;
            }

            lines.push(Line {
                text: cleaned,
                blank_before: blank_run,
            });
            blank_run = 0;
        }

        lines
    }

    /// Short lines repeated on many pages are running headers or footers.
    fn drop_repeated_lines(&self, lines: Vec<Line>) -> Vec<Line> {
        if self.repeated_line_threshold < 2 {
            return lines;
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for line in &lines {
            if line.text.len() <= self.max_repeated_line_chars && !ANCHOR_LINE_RE.is_match(&line.text) {
                *counts.entry(line.text.as_str()).or_insert(0) += 1;
            }
        }
        let repeated: Vec<String> = counts
            .into_iter()
            .filter(|(_, count)| *count >= self.repeated_line_threshold)
            .map(|(text, _)| text.to_string())
            .collect();
        if repeated.is_empty() {
            return lines;
        }
        tracing::debug!("Dropping {} repeated header/footer lines", repeated.len());

        let mut kept: Vec<Line> = Vec::with_capacity(lines.len());
        let mut carried_blanks = 0usize;
        for mut line in lines {
            if repeated.iter().any(|r| *r == line.text) {
                carried_blanks += line.blank_before;
                continue;
            }
            line.blank_before += carried_blanks;
            carried_blanks = 0;
            kept.push(line);
        }
        kept
    }
}

fn looks_like_markup(raw: &str) -> bool {
    MARKUP_HINT_RE.is_match(raw)
}

/// Text content of a markup document with block boundaries kept as line
/// breaks. `None` when nothing readable is left.
fn strip_markup(raw: &str) -> Option<String> {
    let document = Html::parse_document(raw);
    let mut out = String::with_capacity(raw.len() / 2);

    let mut stack = vec![(document.tree.root(), false)];
    while let Some((node, closing)) = stack.pop() {
        match node.value() {
            Node::Element(element) => {
                let name = element.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                let block = BLOCK_ELEMENTS.contains(&name);
                if closing {
                    if block {
                        out.push('\n');
                    }
                    continue;
                }
                if block {
                    out.push('\n');
                } else if CELL_ELEMENTS.contains(&name) {
                    out.push(' ');
                }
                stack.push((node, true));
                for child in node.children().rev() {
                    stack.push((child, false));
                }
            }
            Node::Text(text_node) => out.push_str(&text_node.text),
            Node::Document | Node::Fragment => {
                for child in node.children().rev() {
                    stack.push((child, false));
                }
            }
            _ => {} // comments, doctype, processing instructions
        }
    }

    if out.trim().is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Line endings to `\n`, look-alike punctuation to ASCII, invisible
/// characters removed.
fn normalize_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            '\n' | '\u{000B}' | '\u{000C}' | '\u{0085}' | '\u{2028}' | '\u{2029}' => out.push('\n'),
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => out.push('"'),
            '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}' | '\u{2212}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{2022}' | '\u{25AA}' | '\u{25CF}' | '\u{25E6}' => out.push(' '),
            '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' | '\u{00AD}' => {}
            c if c.is_whitespace() => out.push(' '),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_noise_line(line: &str) -> bool {
    PAGE_NUMBER_LINE_RE.is_match(line)
        || TOC_LINE_RE.is_match(line)
        || (line.len() <= 80 && RUNNING_HEADER_RE.is_match(line))
}

/// Rejoins words broken across a line wrap: "manage-" + "ment".
fn merge_hyphenated_lines(lines: Vec<Line>) -> Vec<Line> {
    let mut merged: Vec<Line> = Vec::with_capacity(lines.len());
    for line in lines {
        if let Some(previous) = merged.last_mut() {
            if line.blank_before == 0 && should_merge_hyphenated_pair(&previous.text, &line.text) {
                previous.text.pop();
                previous.text.push_str(&line.text);
                continue;
            }
        }
        merged.push(line);
    }
    merged
}

fn should_merge_hyphenated_pair(current: &str, next: &str) -> bool {
    let mut tail = current.chars().rev();
    if tail.next() != Some('-') {
        return false;
    }
    let letter_before = tail.next().map(char::is_alphabetic).unwrap_or(false);
    let starts_lowercase = next.chars().next().map(char::is_lowercase).unwrap_or(false);
    letter_before && starts_lowercase
}

/// Starts a new line at every anchor that opens a heading, so "...year.
/// Item 7. Management's" never glues the heading to the paragraph before it.
fn split_at_anchors(lines: Vec<Line>) -> Vec<Line> {
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        let mut cuts = Vec::new();
        for m in ANCHOR_RE.find_iter(&line.text) {
            if m.start() > 0 && starts_heading(&line.text[..m.start()], m.as_str()) {
                cuts.push(m.start());
            }
        }
        if cuts.is_empty() {
            out.push(line);
            continue;
        }

        let mut blank_before = line.blank_before;
        let mut last = 0;
        for cut in cuts.into_iter().chain(std::iter::once(line.text.len())) {
            let piece = line.text[last..cut].trim();
            if !piece.is_empty() {
                out.push(Line {
                    text: piece.to_string(),
                    blank_before,
                });
                blank_before = 0;
            }
            last = cut;
        }
    }
    out
}

fn starts_heading(before: &str, anchor: &str) -> bool {
    if anchor.starts_with("ITEM") || anchor.starts_with("PART") {
        return true;
    }
    let before = before.trim_end();
    if before.ends_with(['.', '!', '?', ':', ';']) {
        return true;
    }
    // A table-of-contents page number glued to the next entry
    before
        .rsplit(' ')
        .next()
        .map(|token| !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}
