//! Reference-document analysis: retrieval, prompt packing, the concurrent
//! per-chunk pipeline, report rendering and the reference index lifecycle.

pub mod error;
pub mod indexer;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod retrieval;

pub use error::AnalysisError;
pub use indexer::{IndexOutcome, IndexPaths, ReferenceIndexer};
pub use pipeline::{AnalysisResult, DocumentAnalysis, DocumentAnalyzer, Sampling, TextAnalysis};
pub use prompt::PromptBuilder;
pub use report::{default_report_path, render_markdown, save_report};
pub use retrieval::{Retriever, SearchResult, StoreRetriever};
