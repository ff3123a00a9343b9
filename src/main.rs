// src/main.rs
mod config;
mod extractors;
mod filing;
mod pipeline;
mod storage;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use config::{ExtractorConfig, ValidationProfile};
use filing::discover_filings;
use pipeline::{run_batch, Pipeline};
use storage::StorageManager;
use utils::AppError;

/// Extracts 10-K sections and writes validated sentences per section
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding raw filings (searched recursively)
    #[arg(short, long)]
    input_dir: PathBuf,

    /// Output directory for sentence files, metadata and the batch summary
    #[arg(short, long, default_value = "./output")]
    output_dir: PathBuf,

    /// TOML file replacing bundled config tables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sentence validation profile
    #[arg(long, value_enum)]
    profile: Option<ValidationProfile>,

    /// Minimum sentence length in characters (overrides the profile)
    #[arg(long)]
    min_chars: Option<usize>,

    /// Minimum sentence length in words (overrides the profile)
    #[arg(long)]
    min_words: Option<usize>,

    /// Filings processed in parallel (default: number of CPUs)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Extra sentence tokenizer abbreviations, one per line
    #[arg(long)]
    abbreviations: Option<PathBuf>,

    /// Debug mode - save normalized and boundary-annotated text
    #[arg(short, long)]
    debug: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Flags win over file values.
    fn apply_overrides(&self, config: &mut ExtractorConfig) {
        if let Some(profile) = self.profile {
            config.validation.profile = profile;
        }
        if let Some(min_chars) = self.min_chars {
            config.validation.min_chars = Some(min_chars);
        }
        if let Some(min_words) = self.min_words {
            config.validation.min_words = Some(min_words);
        }
        if let Some(path) = &self.abbreviations {
            config.tokenizer.abbreviations_path = Some(path.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Parse CLI Arguments, then logging (reads RUST_LOG env var)
    let args = Args::parse();
    utils::logging::setup_logging(args.verbose);
    tracing::info!("Starting processing for args: {:?}", args);

    // 2. Configuration; any problem here stops before a filing is touched
    let mut config = ExtractorConfig::load(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    tracing::debug!(
        "Validation: profile {:?}, min {} chars, min {} words",
        config.validation.profile,
        config.validation.min_chars(),
        config.validation.min_words()
    );
    let pipeline = Arc::new(Pipeline::new(&config)?);

    // 3. Find filings; an empty source stops here
    let paths = discover_filings(&args.input_dir, pipeline.extensions())?;

    // 4. Initialize storage
    let storage = Arc::new(StorageManager::new(&args.output_dir)?.with_debug(args.debug));
    tracing::info!("Writing artifacts to {}", storage.base_dir().display());

    // 5. Process filings in parallel
    let workers = args.workers.unwrap_or_else(num_cpus::get);
    let summary = run_batch(pipeline, storage.clone(), paths, workers).await;

    // 6. Report
    summary.log();
    storage.save_batch_summary(&summary)?;
    if summary.succeeded == 0 {
        return Err(AppError::Processing(format!(
            "none of the {} filings in {} could be processed",
            summary.failed,
            args.input_dir.display()
        )));
    }

    Ok(())
}
