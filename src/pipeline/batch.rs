// src/pipeline/batch.rs

// --- Imports ---
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Semaphore;

use super::orchestrator::Pipeline;
use super::result::{ExtractionResult, SectionStatus};
use crate::storage::StorageManager;
use crate::utils::error::FilingError;

/// What a worker hands back for a filing whose artifacts were written.
#[derive(Debug, Clone)]
pub struct FilingReport {
    pub stem: String,
    pub statuses: Vec<(String, SectionStatus)>,
}

impl From<&ExtractionResult> for FilingReport {
    fn from(result: &ExtractionResult) -> Self {
        Self {
            stem: result.identity.stem(),
            statuses: result
                .sections
                .iter()
                .map(|s| (s.name.clone(), s.outcome.status()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FilingFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<FilingFailure>,
    /// Filings in which each section was found, empty or not.
    pub section_hits: BTreeMap<String, usize>,
    /// Filings in which each section was found but kept no sentences.
    pub section_empty: BTreeMap<String, usize>,
    pub no_sections: Vec<String>,
    /// Stems produced by more than one input file; later files overwrite earlier artifacts.
    pub duplicate_stems: Vec<String>,
    pub elapsed_ms: u128,
    #[serde(skip)]
    seen_stems: BTreeSet<String>,
}

impl BatchSummary {
    pub fn new<'a>(sections: impl Iterator<Item = &'a str>) -> Self {
        let mut summary = Self::default();
        for name in sections {
            summary.section_hits.insert(name.to_string(), 0);
            summary.section_empty.insert(name.to_string(), 0);
        }
        summary
    }

    pub fn record(&mut self, path: &Path, outcome: Result<FilingReport, FilingError>) {
        self.processed += 1;
        match outcome {
            Ok(report) => {
                self.succeeded += 1;
                if !self.seen_stems.insert(report.stem.clone()) {
                    tracing::warn!(
                        "{} maps to {}, which an earlier filing already wrote",
                        path.display(),
                        report.stem
                    );
                    self.duplicate_stems.push(report.stem.clone());
                }
                let mut any = false;
                for (name, status) in &report.statuses {
                    if *status == SectionStatus::Absent {
                        continue;
                    }
                    any = true;
                    *self.section_hits.entry(name.clone()).or_insert(0) += 1;
                    if *status == SectionStatus::Empty {
                        *self.section_empty.entry(name.clone()).or_insert(0) += 1;
                    }
                }
                if !any {
                    self.no_sections.push(report.stem);
                }
            }
            Err(e) => {
                tracing::error!("Failed to process {}: {}", path.display(), e);
                self.failed += 1;
                self.failures.push(FilingFailure {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                });
            }
        }
    }

    pub fn log(&self) {
        tracing::info!(
            "Batch complete: {} processed, {} succeeded, {} failed in {} ms",
            self.processed,
            self.succeeded,
            self.failed,
            self.elapsed_ms
        );
        for (name, hits) in &self.section_hits {
            let empty = self.section_empty.get(name).copied().unwrap_or(0);
            tracing::info!("- {}: found in {} filings ({} empty)", name, hits, empty);
        }
        if !self.no_sections.is_empty() {
            tracing::warn!("{} filings had no sections: {:?}", self.no_sections.len(), self.no_sections);
        }
    }
}

/// Processes and persists one filing. Runs on the blocking pool.
pub fn process_one(pipeline: &Pipeline, storage: &StorageManager, path: &Path) -> Result<FilingReport, FilingError> {
    tracing::info!("Processing {}", path.display());
    let result = pipeline.process_path(path)?;
    storage.save_result(&result)?;
    Ok(FilingReport::from(&result))
}

/// Runs every filing with at most `workers` in flight. A failing filing is
/// recorded in the summary and never stops the others.
pub async fn run_batch(
    pipeline: Arc<Pipeline>,
    storage: Arc<StorageManager>,
    paths: Vec<PathBuf>,
    workers: usize,
) -> BatchSummary {
    let started = Instant::now();
    let workers = workers.max(1);
    let semaphore = Arc::new(Semaphore::new(workers));
    tracing::info!("Processing {} filings with {} workers", paths.len(), workers);

    let mut handles = Vec::with_capacity(paths.len());
    for path in paths {
        let semaphore = semaphore.clone();
        let pipeline = pipeline.clone();
        let storage = storage.clone();
        let task_path = path.clone();

        let handle = tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| FilingError::Task(e.to_string()))?;
            tokio::task::spawn_blocking(move || process_one(&pipeline, &storage, &task_path))
                .await
                .map_err(|e| FilingError::Task(e.to_string()))?
        });
        handles.push((path, handle));
    }

    let mut summary = BatchSummary::new(pipeline.section_names());
    for (path, handle) in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(FilingError::Task(e.to_string())),
        };
        summary.record(&path, outcome);
    }
    summary.elapsed_ms = started.elapsed().as_millis();
    summary
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorConfig;
    use crate::utils::error::InputError;
    use std::fs;

    const GOOD: &str = "ITEM 1. BUSINESS\nWe manufacture semiconductor test equipment.\n\
        ITEM 1A. RISK FACTORS\nOur largest customer may reduce orders next year.\nITEM 1B. UNRESOLVED STAFF COMMENTS\nNone.";

    fn setup(encodings: &[&str]) -> (tempfile::TempDir, tempfile::TempDir, Arc<Pipeline>, Arc<StorageManager>) {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let mut config = ExtractorConfig::default();
        config.input.encodings = encodings.iter().map(|e| e.to_string()).collect();
        let pipeline = Arc::new(Pipeline::new(&config).unwrap());
        let storage = Arc::new(StorageManager::new(output.path()).unwrap());
        (input, output, pipeline, storage)
    }

    #[test]
    fn test_failures_are_isolated() {
        let (input, output, pipeline, storage) = setup(&["utf-8"]);
        let good_a = input.path().join("AAA_10-K_2024-01-02.txt");
        let good_b = input.path().join("BBB_10-K_2024-01-03.txt");
        let broken = input.path().join("CCC_10-K_2024-01-04.txt");
        let plain = input.path().join("DDD_10-K_2024-01-05.txt");
        fs::write(&good_a, GOOD).unwrap();
        fs::write(&good_b, GOOD).unwrap();
        fs::write(&broken, b"ITEM 1. BUSINESS\n\xff\xfe\xfd").unwrap();
        fs::write(&plain, "A letter from the chairman about the year that passed.").unwrap();
        let missing = input.path().join("EEE_10-K_2024-01-06.txt");

        let paths = vec![good_a, broken.clone(), good_b, plain, missing];
        let summary = tokio_test::block_on(run_batch(pipeline, storage, paths, 2));

        assert_eq!(summary.processed, 5);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.failures[0].path, broken);
        assert_eq!(summary.section_hits["business"], 2);
        assert_eq!(summary.section_hits["risk_factors"], 2);
        assert_eq!(summary.section_hits["md_and_a"], 0);
        assert_eq!(summary.no_sections, vec!["DDD_10-K_2024-01-05".to_string()]);

        assert!(output.path().join("AAA_10-K_2024-01-02_business.txt").exists());
        assert!(output.path().join("BBB_10-K_2024-01-03_risk_factors.txt").exists());
        assert!(!output.path().join("CCC_10-K_2024-01-04.txt").exists());
        assert!(output.path().join("DDD_10-K_2024-01-05_meta.json").exists());
    }

    #[test]
    fn test_same_stem_from_two_files_is_reported() {
        let (input, output, pipeline, storage) = setup(&["utf-8"]);
        let text = input.path().join("X_10-K_2024-01-02.txt");
        let html = input.path().join("X_10-K_2024-01-02.htm");
        fs::write(&text, GOOD).unwrap();
        fs::write(&html, format!("<html><body><p>{}</p></body></html>", GOOD.replace('\n', "</p><p>"))).unwrap();

        let summary = tokio_test::block_on(run_batch(pipeline, storage, vec![text, html], 2));
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.duplicate_stems, vec!["X_10-K_2024-01-02".to_string()]);
        assert!(output.path().join("X_10-K_2024-01-02_business.txt").exists());
    }

    #[test]
    fn test_single_worker_completes() {
        let (input, _output, pipeline, storage) = setup(&["utf-8", "windows-1252"]);
        let mut paths = Vec::new();
        for i in 0..4 {
            let path = input.path().join(format!("T{}_10-K_2024-01-0{}.txt", i, i + 1));
            fs::write(&path, GOOD).unwrap();
            paths.push(path);
        }
        let summary = tokio_test::block_on(run_batch(pipeline, storage, paths, 0));
        assert_eq!(summary.succeeded, 4);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_summary_record_counts_empty_sections() {
        let mut summary = BatchSummary::new(["business", "risk_factors"].into_iter());
        let report = FilingReport {
            stem: "X_10-K_undated".to_string(),
            statuses: vec![
                ("business".to_string(), SectionStatus::Populated),
                ("risk_factors".to_string(), SectionStatus::Empty),
            ],
        };
        summary.record(Path::new("x.txt"), Ok(report));
        summary.record(
            Path::new("y.txt"),
            Err(FilingError::Input(InputError::EmptySource("y".to_string()))),
        );
        assert_eq!(summary.section_hits["risk_factors"], 1);
        assert_eq!(summary.section_empty["risk_factors"], 1);
        assert_eq!(summary.section_empty["business"], 0);
        assert_eq!(summary.failed, 1);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["failures"][0]["path"], "y.txt");
    }
}
