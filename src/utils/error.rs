// src/utils/error.rs
use std::path::PathBuf;
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Could not read filing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not decode filing {path} with any of: {tried}")]
    Undecodable { path: PathBuf, tried: String },

    #[error("Invalid input pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("No filings found in {0}")]
    EmptySource(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid pattern '{pattern}' for {owner}: {source}")]
    InvalidPattern {
        owner: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unknown encoding label: {0}")]
    UnknownEncoding(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Tokenizer resource unavailable at {path}: {source}")]
    ResourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Tokenizer failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Failure of a single filing. Never aborts a batch.
#[derive(Error, Debug)]
pub enum FilingError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Failed to persist artifacts: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker task failed: {0}")]
    Task(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
