// src/filing/mod.rs
pub mod models;
pub mod reader;

pub use models::FilingIdentity;
pub use reader::{discover_filings, read_filing, resolve_encodings};
