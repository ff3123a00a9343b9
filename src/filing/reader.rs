// src/filing/reader.rs

// --- Imports ---
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use regex::Regex;

use super::models::{Filing, FilingIdentity, DEFAULT_FORM_TYPE};
use crate::utils::error::{ConfigError, InputError};
use crate::utils::floor_char_boundary;

// --- Header and name patterns ---
static FILED_AS_OF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*FILED AS OF DATE:\s*(\d{8})\s*$").expect("Failed to compile FILED_AS_OF_RE")
});

static FORM_COMPONENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\d{1,2}-[a-z]{1,2}(?:[-/][a-z])?$|^(?:10|20)[a-z]{1,2}$")
        .expect("Failed to compile FORM_COMPONENT_RE")
});

// SEC full-text headers sit in the first few kilobytes
const HEADER_SCAN_BYTES: usize = 4096;

/// Resolves configured encoding labels up front so a typo is a startup error.
pub fn resolve_encodings(labels: &[String]) -> Result<Vec<&'static Encoding>, ConfigError> {
    labels
        .iter()
        .map(|label| {
            Encoding::for_label(label.trim().as_bytes())
                .ok_or_else(|| ConfigError::UnknownEncoding(label.clone()))
        })
        .collect()
}

/// Decodes `bytes`: a byte-order mark wins, otherwise each encoding is tried
/// strictly in order. `None` when every candidate rejects the input.
pub fn decode_with_fallbacks<'a>(
    bytes: &'a [u8],
    encodings: &[&'static Encoding],
) -> Option<(Cow<'a, str>, &'static Encoding)> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(&bytes[bom_len..]) {
            return Some((text, encoding));
        }
    }
    encodings.iter().find_map(|encoding| {
        encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| (text, *encoding))
    })
}

/// Reads and decodes one filing, deriving its identity from the path and header.
pub fn read_filing(path: &Path, encodings: &[&'static Encoding]) -> Result<Filing, InputError> {
    let bytes = fs::read(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let (text, encoding) = decode_with_fallbacks(&bytes, encodings).ok_or_else(|| InputError::Undecodable {
        path: path.to_path_buf(),
        tried: encodings.iter().map(|e| e.name()).collect::<Vec<_>>().join(", "),
    })?;
    let raw_text = text.into_owned();
    let identity = identify(path, &raw_text);
    tracing::debug!(
        "Read {} as {} ({} bytes, {})",
        path.display(),
        identity.stem(),
        bytes.len(),
        encoding.name()
    );

    Ok(Filing {
        identity,
        source_path: path.to_path_buf(),
        encoding: encoding.name(),
        raw_text,
    })
}

/// Identity from `TICKER_FORM_DATE.ext`, `TICKER_DATE.ext` or the SEC
/// downloader layout `TICKER/FORM/ACCESSION/full-submission.txt`. A
/// `FILED AS OF DATE:` header fills in a date the path does not give.
pub fn identify(path: &Path, text: &str) -> FilingIdentity {
    let header_date = filed_as_of_date(text);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();

    if let Some((ticker, form)) = sec_layout(path) {
        return FilingIdentity::new(&ticker, &form, header_date);
    }

    let parts: Vec<&str> = stem.split('_').filter(|p| !p.is_empty()).collect();
    match parts.as_slice() {
        [ticker, form, date, ..] if FORM_COMPONENT_RE.is_match(form) => {
            FilingIdentity::new(ticker, form, parse_date(date).or(header_date))
        }
        [ticker, date, ..] if parse_date(date).is_some() => {
            FilingIdentity::new(ticker, DEFAULT_FORM_TYPE, parse_date(date))
        }
        [ticker, form, ..] if FORM_COMPONENT_RE.is_match(form) => FilingIdentity::new(ticker, form, header_date),
        _ => FilingIdentity::new(stem, DEFAULT_FORM_TYPE, header_date),
    }
}

/// `YYYY-MM-DD` or `YYYYMMDD`.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y%m%d"))
        .ok()
}

fn filed_as_of_date(text: &str) -> Option<NaiveDate> {
    let end = floor_char_boundary(text, HEADER_SCAN_BYTES);
    FILED_AS_OF_RE
        .captures(&text[..end])
        .and_then(|caps| parse_date(&caps[1]))
}

fn sec_layout(path: &Path) -> Option<(String, String)> {
    let file_name = path.file_name()?.to_str()?;
    if !file_name.starts_with("full-submission") && !file_name.starts_with("primary-document") {
        return None;
    }
    let accession_dir = path.parent()?;
    let form_dir = accession_dir.parent()?;
    let ticker_dir = form_dir.parent()?;
    let form = form_dir.file_name()?.to_str()?;
    let ticker = ticker_dir.file_name()?.to_str()?;
    FORM_COMPONENT_RE
        .is_match(form)
        .then(|| (ticker.to_string(), form.to_string()))
}

/// Every file under `dir` with one of `extensions`, sorted for a stable
/// batch order. An empty result is an error: there is nothing to process.
pub fn discover_filings(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, InputError> {
    if !dir.is_dir() {
        return Err(InputError::EmptySource(format!("{} is not a readable directory", dir.display())));
    }

    let root = glob::Pattern::escape(&dir.to_string_lossy());
    let mut paths = Vec::new();
    for extension in extensions {
        let pattern = format!("{}/**/*.{}", root, extension.trim_start_matches('.'));
        let entries = glob::glob(&pattern).map_err(|e| InputError::Pattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => paths.push(path),
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping unreadable entry: {}", e),
            }
        }
    }
    paths.sort();
    paths.dedup();

    if paths.is_empty() {
        return Err(InputError::EmptySource(dir.display().to_string()));
    }
    tracing::info!("Discovered {} filings in {}", paths.len(), dir.display());
    Ok(paths)
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{UTF_8, WINDOWS_1252};

    fn default_encodings() -> Vec<&'static Encoding> {
        resolve_encodings(&["utf-8".to_string(), "windows-1252".to_string()]).unwrap()
    }

    #[test]
    fn test_unknown_encoding_label_rejected() {
        let err = resolve_encodings(&["utf-8".to_string(), "klingon".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEncoding(label) if label == "klingon"));
    }

    #[test]
    fn test_decode_fallback_order() {
        let encodings = default_encodings();
        let (text, encoding) = decode_with_fallbacks("Caf\u{e9} sales".as_bytes(), &encodings).unwrap();
        assert_eq!(text, "Caf\u{e9} sales");
        assert_eq!(encoding, UTF_8);

        // 0x92 is a right single quote in windows-1252 and invalid UTF-8
        let (text, encoding) = decode_with_fallbacks(b"Apple\x92s results", &encodings).unwrap();
        assert_eq!(text, "Apple\u{2019}s results");
        assert_eq!(encoding, WINDOWS_1252);
    }

    #[test]
    fn test_bom_takes_precedence() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "Net sales".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let (text, encoding) = decode_with_fallbacks(&bytes, &[UTF_8]).unwrap();
        assert_eq!(text, "Net sales");
        assert_eq!(encoding.name(), "UTF-16LE");
    }

    #[test]
    fn test_exhausted_fallbacks_fail() {
        assert!(decode_with_fallbacks(b"bad \xff\xfe bytes", &[UTF_8]).is_none());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AAPL_10-K_2023-11-03.txt");
        fs::write(&path, b"bad \xc3\x28 bytes").unwrap();
        let err = read_filing(&path, &[UTF_8]).unwrap_err();
        assert!(matches!(err, InputError::Undecodable { .. }));
    }

    #[test]
    fn test_identity_from_file_names() {
        let full = identify(Path::new("/in/AAPL_10-K_2023-11-03.txt"), "");
        assert_eq!(full.stem(), "AAPL_10-K_2023-11-03");

        let short = identify(Path::new("/in/msft_20230728.htm"), "");
        assert_eq!(short.stem(), "MSFT_10-K_2023-07-28");

        let bare = identify(Path::new("/in/tsla.txt"), "");
        assert_eq!(bare.stem(), "TSLA_10-K_undated");
    }

    #[test]
    fn test_identity_from_sec_layout_and_header() {
        let path = Path::new("/data/sec-edgar-filings/NVDA/10-K/0001045810-24-000029/full-submission.txt");
        let header = "<SEC-HEADER>\nCONFORMED SUBMISSION TYPE:\t10-K\nFILED AS OF DATE:\t\t20240221\n</SEC-HEADER>";
        let identity = identify(path, header);
        assert_eq!(identity.ticker, "NVDA");
        assert_eq!(identity.form_type, "10-K");
        assert_eq!(identity.filing_date, NaiveDate::from_ymd_opt(2024, 2, 21));
    }

    #[test]
    fn test_read_filing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IBM_10-K_20240226.txt");
        fs::write(&path, "Item 1. Business\nWe sell consulting.").unwrap();
        let filing = read_filing(&path, &default_encodings()).unwrap();
        assert_eq!(filing.identity.ticker, "IBM");
        assert_eq!(filing.encoding, "UTF-8");
        assert!(filing.raw_text.starts_with("Item 1. Business"));

        let missing = read_filing(&dir.path().join("nope.txt"), &default_encodings()).unwrap_err();
        assert!(matches!(missing, InputError::Io { .. }));
    }

    #[test]
    fn test_discover_filters_extensions_and_recurses() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("AAPL/10-K/0000320193-23-000106");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("full-submission.txt"), "x").unwrap();
        fs::write(dir.path().join("MSFT_10-K_2023-07-28.htm"), "x").unwrap();
        fs::write(dir.path().join("notes.md"), "x").unwrap();

        let extensions = vec!["txt".to_string(), ".htm".to_string()];
        let found = discover_filings(dir.path(), &extensions).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.extension().unwrap() != "md"));
    }

    #[test]
    fn test_empty_or_missing_source_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let extensions = vec!["txt".to_string()];
        assert!(matches!(
            discover_filings(dir.path(), &extensions),
            Err(InputError::EmptySource(_))
        ));
        assert!(matches!(
            discover_filings(&dir.path().join("missing"), &extensions),
            Err(InputError::EmptySource(_))
        ));
    }
}
