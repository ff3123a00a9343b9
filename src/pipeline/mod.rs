// src/pipeline/mod.rs
pub mod batch;
pub mod orchestrator;
pub mod result;

pub use batch::{run_batch, BatchSummary};
pub use orchestrator::Pipeline;
pub use result::{ExtractionResult, SectionStatus};
