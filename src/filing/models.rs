// src/filing/models.rs
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_FORM_TYPE: &str = "10-K";

/// Who filed what, and when. Drives every artifact name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingIdentity {
    pub ticker: String,
    pub form_type: String,
    pub filing_date: Option<NaiveDate>,
}

impl FilingIdentity {
    pub fn new(ticker: &str, form_type: &str, filing_date: Option<NaiveDate>) -> Self {
        Self {
            ticker: sanitize_component(&ticker.to_uppercase()),
            form_type: sanitize_component(&form_type.to_uppercase()),
            filing_date,
        }
    }

    pub fn date_label(&self) -> String {
        self.filing_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "undated".to_string())
    }

    /// `{TICKER}_{FORM}_{DATE}`, the shared prefix of a filing's artifacts.
    pub fn stem(&self) -> String {
        format!("{}_{}_{}", self.ticker, self.form_type, self.date_label())
    }
}

/// A raw document read from disk. Owned by the worker processing it.
#[derive(Debug, Clone)]
pub struct Filing {
    pub identity: FilingIdentity,
    pub source_path: PathBuf,
    /// Name of the encoding that decoded the bytes.
    pub encoding: &'static str,
    pub raw_text: String,
}

/// Keeps identity parts usable as `_`-separated file name components.
fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '-' })
        .collect();
    if cleaned.is_empty() {
        "UNKNOWN".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_format() {
        let identity = FilingIdentity::new("aapl", "10-k", NaiveDate::from_ymd_opt(2023, 11, 3));
        assert_eq!(identity.stem(), "AAPL_10-K_2023-11-03");
        let undated = FilingIdentity::new("msft", DEFAULT_FORM_TYPE, None);
        assert_eq!(undated.stem(), "MSFT_10-K_undated");
    }

    #[test]
    fn test_components_never_contain_separator() {
        let identity = FilingIdentity::new("brk_b", "10 K/A", None);
        assert_eq!(identity.ticker, "BRK-B");
        assert_eq!(identity.form_type, "10-K-A");
        assert_eq!(FilingIdentity::new("  ", "10-K", None).ticker, "UNKNOWN");
    }
}
