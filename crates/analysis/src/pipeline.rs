//! Concurrent per-chunk analysis.
//!
//! Each chunk runs retrieval, prompt assembly and one inference call on its own
//! task. At most `max_concurrency` tasks hold a permit at once. Results land in
//! a pre-sized slot vector addressed by chunk position, so the report keeps
//! input order whatever the completion order.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use docaudit_core::config::{AnalysisConfig, LlmConfig};
use docaudit_ingest::{is_supported, read_document, Chunk, ChunkerFactory};
use docaudit_llm::{LlmProvider, Message};

use crate::error::AnalysisError;
use crate::prompt::PromptBuilder;
use crate::retrieval::{Retriever, SearchResult};

/// Outcome for one input chunk. Exactly one is written per chunk.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    /// 1-based position of the chunk in the input document.
    pub chunk_index: usize,
    pub chunk_section: String,
    pub analysis: String,
    pub reference_count: usize,
    pub error: Option<String>,
}

impl AnalysisResult {
    fn pending(chunk_index: usize, chunk_section: &str) -> Self {
        Self {
            chunk_index,
            chunk_section: chunk_section.to_string(),
            analysis: String::new(),
            reference_count: 0,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate for one analyzed document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentAnalysis {
    pub file_name: String,
    pub total_chunks: usize,
    pub results: Vec<AnalysisResult>,
    pub success_count: usize,
    pub error_count: usize,
    pub processed_at: DateTime<Local>,
}

/// Answer to a free-text query.
#[derive(Debug, Clone)]
pub struct TextAnalysis {
    pub references: Vec<SearchResult>,
    pub analysis: String,
}

#[derive(Default)]
struct Counters {
    success: usize,
    error: usize,
}

/// Completion parameters passed through to the provider.
#[derive(Debug, Clone, Copy)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&LlmConfig> for Sampling {
    fn from(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Runs retrieval + prompt + inference over a document's chunks.
#[derive(Clone)]
pub struct DocumentAnalyzer {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn LlmProvider>,
    prompt: PromptBuilder,
    sampling: Sampling,
    max_concurrency: usize,
}

impl DocumentAnalyzer {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        llm: Arc<dyn LlmProvider>,
        prompt: PromptBuilder,
        sampling: Sampling,
        max_concurrency: usize,
    ) -> Self {
        Self {
            retriever,
            llm,
            prompt,
            sampling,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn from_config(
        retriever: Arc<dyn Retriever>,
        llm: Arc<dyn LlmProvider>,
        analysis: &AnalysisConfig,
        llm_config: &LlmConfig,
    ) -> Self {
        Self::new(
            retriever,
            llm,
            PromptBuilder::new(analysis.max_prompt_chars, analysis.prompt_reservation),
            Sampling::from(llm_config),
            analysis.max_concurrency,
        )
    }

    /// Retrieval, prompt and one model call for a single piece of text.
    async fn analyze_one(&self, text: &str) -> Result<(Vec<SearchResult>, String), AnalysisError> {
        let references = self.retriever.search(text).await?;
        let prompt = self.prompt.build(text, &references);
        let analysis = self
            .llm
            .complete(vec![Message::user(prompt)], self.sampling.temperature, self.sampling.max_tokens)
            .await?;
        Ok((references, analysis))
    }

    /// Treat a line of free text as the analyzed input.
    pub async fn analyze_text(&self, text: &str) -> Result<TextAnalysis, AnalysisError> {
        let (references, analysis) = self.analyze_one(text).await?;
        Ok(TextAnalysis { references, analysis })
    }

    /// Read, chunk and analyze the file at `path`.
    pub async fn analyze_file(
        &self,
        path: &Path,
        factory: &ChunkerFactory,
        chunk_method: Option<&str>,
    ) -> Result<DocumentAnalysis, AnalysisError> {
        if !is_supported(path) {
            return Err(AnalysisError::UnsupportedFormat(path.to_path_buf()));
        }
        let doc = read_document(path)?;
        let content = doc.full_text();
        info!(file = %doc.filename, chars = doc.total_chars(), "Input document loaded");

        let chunks = factory.chunk_document(path, &content, chunk_method)?;
        info!(file = %doc.filename, chunks = chunks.len(), "Input document split");

        self.analyze_chunks(&doc.filename, chunks).await
    }

    /// Fan the chunks out over the worker pool and aggregate in input order.
    pub async fn analyze_chunks(&self, file_name: &str, chunks: Vec<Chunk>) -> Result<DocumentAnalysis, AnalysisError> {
        if chunks.is_empty() {
            return Err(AnalysisError::EmptyDocument(file_name.to_string()));
        }

        let total = chunks.len();
        let sections: Vec<String> = chunks.iter().map(|c| c.section.clone()).collect();
        let slots: Arc<Mutex<Vec<Option<AnalysisResult>>>> = Arc::new(Mutex::new(vec![None; total]));
        let counters = Arc::new(Mutex::new(Counters::default()));
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));

        let mut tasks = JoinSet::new();
        for (idx, chunk) in chunks.into_iter().enumerate() {
            let analyzer = self.clone();
            let slots = Arc::clone(&slots);
            let counters = Arc::clone(&counters);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };

                let mut result = AnalysisResult::pending(idx + 1, &chunk.section);
                match analyzer.analyze_one(&chunk.text).await {
                    Ok((references, analysis)) => {
                        result.reference_count = references.len();
                        result.analysis = analysis;
                        info!(
                            chunk = result.chunk_index,
                            total,
                            section = %result.chunk_section,
                            references = result.reference_count,
                            "Chunk analyzed"
                        );
                    }
                    Err(e) => {
                        warn!(chunk = result.chunk_index, section = %result.chunk_section, error = %e, "Chunk analysis failed");
                        result.error = Some(e.to_string());
                    }
                }

                record(&slots, &counters, idx, result);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Analysis task aborted");
            }
        }

        let slots = std::mem::take(&mut *slots.lock().unwrap_or_else(PoisonError::into_inner));
        let (success_count, mut error_count) = {
            let c = counters.lock().unwrap_or_else(PoisonError::into_inner);
            (c.success, c.error)
        };

        // A task that died before writing its slot still counts as an error.
        let results: Vec<AnalysisResult> = slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| {
                    error_count += 1;
                    AnalysisResult {
                        error: Some("analysis task did not complete".to_string()),
                        ..AnalysisResult::pending(idx + 1, &sections[idx])
                    }
                })
            })
            .collect();

        info!(file = file_name, total, success = success_count, errors = error_count, "Document analysis summary");

        Ok(DocumentAnalysis {
            file_name: file_name.to_string(),
            total_chunks: total,
            results,
            success_count,
            error_count,
            processed_at: Local::now(),
        })
    }
}

/// Store a finished result in its slot and count it. A poisoned lock still
/// holds valid data here, so the write goes through.
fn record(
    slots: &Mutex<Vec<Option<AnalysisResult>>>,
    counters: &Mutex<Counters>,
    idx: usize,
    result: AnalysisResult,
) {
    {
        let mut c = counters.lock().unwrap_or_else(PoisonError::into_inner);
        if result.is_success() {
            c.success += 1;
        } else {
            c.error += 1;
        }
    }
    slots.lock().unwrap_or_else(PoisonError::into_inner)[idx] = Some(result);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use docaudit_ingest::document::chunker::create_chunk;
    use docaudit_ingest::document::chunker::Metadata;
    use docaudit_llm::LlmError;

    /// Returns one reference per query; later chunks answer faster.
    struct SlowRetriever {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Retriever for SlowRetriever {
        async fn search(&self, query: &str) -> Result<Vec<SearchResult>, AnalysisError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let n: u64 = query.trim_start_matches("part ").parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(60u64.saturating_sub(n * 10))).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![SearchResult {
                content: "reference".into(),
                section: "Ref".into(),
                source: "ref.md".into(),
                similarity: 0.9,
            }])
        }
    }

    /// Fails any prompt about chunk 3, echoes the rest.
    struct ScriptedLlm;

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn complete(&self, messages: Vec<Message>, _t: f32, _m: u32) -> Result<String, LlmError> {
            let prompt = &messages[0].content;
            if prompt.contains("<<<\npart 3\n>>>") {
                return Err(LlmError::ApiError {
                    status: 500,
                    body: "boom".into(),
                });
            }
            Ok("- Status: ✅ Compliant".into())
        }
    }

    fn chunks(n: usize) -> Vec<Chunk> {
        (1..=n)
            .map(|i| create_chunk(&format!("part {i}"), "input.txt", format!("Chunk {i}"), Metadata::new()))
            .collect()
    }

    fn analyzer(retriever: Arc<SlowRetriever>, max_concurrency: usize) -> DocumentAnalyzer {
        DocumentAnalyzer::new(
            retriever,
            Arc::new(ScriptedLlm),
            PromptBuilder::default(),
            Sampling {
                temperature: 0.3,
                max_tokens: 256,
            },
            max_concurrency,
        )
    }

    fn retriever() -> Arc<SlowRetriever> {
        Arc::new(SlowRetriever {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn results_keep_input_order_and_isolate_failures() {
        let retriever = retriever();
        let report = analyzer(retriever.clone(), 2)
            .analyze_chunks("input.txt", chunks(5))
            .await
            .unwrap();

        assert_eq!(report.total_chunks, 5);
        assert_eq!(report.success_count, 4);
        assert_eq!(report.error_count, 1);
        let indices: Vec<usize> = report.results.iter().map(|r| r.chunk_index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
        assert!(report.results[2].error.as_deref().unwrap_or("").contains("500"));
        assert_eq!(report.results[0].reference_count, 1);
        assert_eq!(report.results[4].chunk_section, "Chunk 5");
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_limit() {
        let retriever = retriever();
        analyzer(retriever.clone(), 2)
            .analyze_chunks("input.txt", chunks(6))
            .await
            .unwrap();
        assert!(retriever.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn empty_chunk_list_is_rejected() {
        let err = analyzer(retriever(), 3).analyze_chunks("x.txt", Vec::new()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyDocument(_)));
    }

    #[tokio::test]
    async fn unsupported_file_is_rejected_before_reading() {
        let factory = ChunkerFactory::default();
        let err = analyzer(retriever(), 1)
            .analyze_file(Path::new("table.csv"), &factory, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn free_text_returns_references_and_answer() {
        let answer = analyzer(retriever(), 1).analyze_text("part 1").await.unwrap();
        assert_eq!(answer.references.len(), 1);
        assert!(answer.analysis.contains("Compliant"));
    }

    #[test]
    fn results_are_recorded_through_poisoned_locks() {
        let slots = Arc::new(Mutex::new(vec![None; 2]));
        let counters = Arc::new(Mutex::new(Counters::default()));
        {
            let slots = Arc::clone(&slots);
            let counters = Arc::clone(&counters);
            let _ = std::thread::spawn(move || {
                let _s = slots.lock().unwrap();
                let _c = counters.lock().unwrap();
                panic!("worker died holding the locks");
            })
            .join();
        }
        assert!(slots.is_poisoned() && counters.is_poisoned());

        let mut failed = AnalysisResult::pending(2, "Second");
        failed.error = Some("boom".into());
        record(&slots, &counters, 0, AnalysisResult::pending(1, "First"));
        record(&slots, &counters, 1, failed);

        let slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
        assert_eq!(slots[0].as_ref().map(|r| r.chunk_section.as_str()), Some("First"));
        assert_eq!(slots[1].as_ref().and_then(|r| r.error.as_deref()), Some("boom"));
        let c = counters.lock().unwrap_or_else(PoisonError::into_inner);
        assert_eq!((c.success, c.error), (1, 1));
    }
}
