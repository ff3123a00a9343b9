// src/storage/mod.rs
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::extractors::{SectionMatch, Sentence};
use crate::pipeline::{BatchSummary, ExtractionResult, SectionStatus};
use crate::utils::debug;
use crate::utils::error::StorageError;

pub const SUMMARY_FILE: &str = "batch_summary.json";

static TMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone)]
pub struct StorageManager {
    base_dir: PathBuf,
    debug: bool,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self {
            base_dir: base_path,
            debug: false,
        })
    }

    /// Also write normalized and boundary-annotated text under `debug/`.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Writes every artifact of one filing. Found sections get a sentence
    /// file even when empty; absent sections get none, and a file left from
    /// an earlier run is removed.
    pub fn save_result(&self, result: &ExtractionResult) -> Result<Vec<PathBuf>, StorageError> {
        let stem = result.identity.stem();
        let mut written = Vec::new();

        for section in &result.sections {
            let path = self.base_dir.join(format!("{}_{}.txt", stem, section.name));
            if section.outcome.status() == SectionStatus::Absent {
                match fs::remove_file(&path) {
                    Ok(()) => tracing::debug!("Removed stale {}", path.display()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                continue;
            }
            write_atomic(&path, sentence_lines(section.outcome.sentences()).as_bytes())?;
            written.push(path);
        }

        let combined = self.base_dir.join(format!("{}.txt", stem));
        write_atomic(&combined, sentence_lines(&result.document_sentences).as_bytes())?;
        written.push(combined);

        written.push(self.save_metadata(result)?);

        if self.debug {
            written.extend(self.save_debug(result)?);
        }

        tracing::info!("Saved {} artifacts for {}", written.len(), stem);
        Ok(written)
    }

    /// Saves metadata about the filing's sections in JSON format
    fn save_metadata(&self, result: &ExtractionResult) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(format!("{}_meta.json", result.identity.stem()));

        let metadata = serde_json::json!({
            "ticker": result.identity.ticker,
            "form_type": result.identity.form_type,
            "filing_date": result.identity.filing_date,
            "source_path": result.source_path,
            "encoding": result.encoding,
            "normalized_length": result.normalized.len(),
            "sections": result.report(),
            "document_sentence_count": result.document_sentences.len(),
            "extraction_timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let metadata_str = serde_json::to_string_pretty(&metadata)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        write_atomic(&file_path, metadata_str.as_bytes())?;

        tracing::debug!("Saved metadata to {}", file_path.display());
        Ok(file_path)
    }

    fn save_debug(&self, result: &ExtractionResult) -> Result<Vec<PathBuf>, StorageError> {
        let debug_dir = self.base_dir.join("debug");
        fs::create_dir_all(&debug_dir)?;
        let stem = result.identity.stem();

        let normalized_path = debug_dir.join(format!("{}_normalized.txt", stem));
        write_atomic(&normalized_path, result.normalized.as_str().as_bytes())?;

        let annotated_path = debug_dir.join(format!("{}_annotated.txt", stem));
        let matches: Vec<&SectionMatch> = result
            .sections
            .iter()
            .filter_map(|s| s.outcome.section_match())
            .collect();
        debug::save_annotated_text(result.normalized.as_str(), &annotated_path, &matches)?;

        Ok(vec![normalized_path, annotated_path])
    }

    pub fn save_batch_summary(&self, summary: &BatchSummary) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(SUMMARY_FILE);
        let summary_str = serde_json::to_string_pretty(summary)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        write_atomic(&file_path, summary_str.as_bytes())?;
        tracing::info!("Saved batch summary to {}", file_path.display());
        Ok(file_path)
    }
}

fn sentence_lines(sentences: &[Sentence]) -> String {
    let mut out = String::new();
    for sentence in sentences {
        out.push_str(&sentence.text);
        out.push('\n');
    }
    out
}

/// Readers never see a half-written artifact. Each call gets its own tmp
/// file, so concurrent writers of one path never share one.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(format!(
        ".{}.{}.tmp",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}
