// src/extractors/mod.rs
pub mod boilerplate;
pub mod normalize;
pub mod section;
pub mod sentences;
pub mod spec;

// Re-export key extraction types for convenience
#[allow(unused_imports)]
pub use boilerplate::BoilerplateClassifier;
pub use normalize::{NormalizedText, Normalizer, ParagraphGap};
pub use section::{
    ExtractionStrategy,
    IssuerExtractionStrategy,
    PatternExtractionStrategy,
    RelaxedExtractionStrategy,
    SectionExtractor,
    StructuralEndFinder,
};
pub use sentences::{build_tokenizer, Sentence, SentenceBatch, SentenceTokenizer, SentenceValidator};
pub use spec::{SectionCatalog, SectionMatch, SectionSpec, Tier};
