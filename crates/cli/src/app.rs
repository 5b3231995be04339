use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info, warn};

use docaudit_analysis::{default_report_path, save_report, DocumentAnalyzer};
use docaudit_ingest::{is_supported, ChunkerFactory};

/// Outcome of one input line, mostly for tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Skipped,
    Report(PathBuf),
    Answer(String),
    Failed,
}

/// Everything a line of input needs once the reference index is ready.
pub struct App {
    analyzer: DocumentAnalyzer,
    factory: ChunkerFactory,
    chunk_method: Option<String>,
    output: Option<PathBuf>,
}

impl App {
    pub fn new(
        analyzer: DocumentAnalyzer,
        factory: ChunkerFactory,
        chunk_method: Option<String>,
        output: Option<PathBuf>,
    ) -> Self {
        Self {
            analyzer,
            factory,
            chunk_method,
            output,
        }
    }

    /// Read lines until end of input or `shutdown` resolves. A line that is
    /// not valid UTF-8 is reported and skipped.
    pub async fn run<R, F>(&self, mut input: R, shutdown: F) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        F: std::future::Future<Output = ()>,
    {
        let mut buf = Vec::new();
        tokio::pin!(shutdown);

        info!("Ready: enter a file path or a question per line");
        loop {
            buf.clear();
            let read = tokio::select! {
                read = input.read_until(b'\n', &mut buf) => read.context("failed to read input")?,
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            };
            if read == 0 {
                info!("End of input");
                break;
            }

            match std::str::from_utf8(&buf) {
                Ok(line) => {
                    self.handle_line(line).await;
                }
                Err(e) => error!(error = %e, "Input line is not valid UTF-8, skipped"),
            }
        }
        Ok(())
    }

    /// An existing file is analyzed into a report; anything else is a free-text query.
    pub async fn handle_line(&self, line: &str) -> LineOutcome {
        let line = line.trim();
        if line.is_empty() {
            return LineOutcome::Skipped;
        }

        let path = Path::new(line);
        if path.is_file() {
            if !is_supported(path) {
                error!(file = %path.display(), "Unsupported file type (expected md, markdown, txt, text or pdf)");
                return LineOutcome::Failed;
            }
            return match self.analyze_file(path).await {
                Ok(report) => LineOutcome::Report(report),
                Err(e) => {
                    error!(file = %path.display(), error = %format!("{e:#}"), "Document analysis failed");
                    LineOutcome::Failed
                }
            };
        }

        match self.analyzer.analyze_text(line).await {
            Ok(result) => {
                if result.references.is_empty() {
                    warn!("No reference sections above the similarity floor");
                }
                for (i, r) in result.references.iter().enumerate() {
                    info!(rank = i + 1, section = %r.section, similarity = %format!("{:.3}", r.similarity), "Matched reference section");
                }
                println!("{}\n", result.analysis);
                LineOutcome::Answer(result.analysis)
            }
            Err(e) => {
                error!(error = %e, "Query failed");
                LineOutcome::Failed
            }
        }
    }

    async fn analyze_file(&self, path: &Path) -> Result<PathBuf> {
        info!(file = %path.display(), "Analyzing document");
        let analysis = self
            .analyzer
            .analyze_file(path, &self.factory, self.chunk_method.as_deref())
            .await?;

        let report = self
            .output
            .clone()
            .unwrap_or_else(|| default_report_path(path, Local::now()));
        save_report(&analysis, &report).with_context(|| format!("failed to write {}", report.display()))?;

        info!(
            file = %analysis.file_name,
            total = analysis.total_chunks,
            success = analysis.success_count,
            errors = analysis.error_count,
            report = %report.display(),
            "Document analysis complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use docaudit_analysis::{AnalysisError, PromptBuilder, Retriever, Sampling, SearchResult};
    use docaudit_llm::{LlmError, LlmProvider, Message};

    use super::*;

    struct FixedRetriever;

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, AnalysisError> {
            Ok(vec![SearchResult {
                content: "Records are retained for seven years.".into(),
                section: "Retention".into(),
                source: "policy.md".into(),
                similarity: 0.9,
            }])
        }
    }

    struct EchoLlm;

    #[async_trait]
    impl LlmProvider for EchoLlm {
        async fn complete(&self, messages: Vec<Message>, _t: f32, _m: u32) -> Result<String, LlmError> {
            let prompt = &messages[0].content;
            Ok(if prompt.contains("Retention") {
                "- Status: ✅ Compliant".into()
            } else {
                "- Status: ❌ Contradiction".into()
            })
        }
    }

    /// Keeps every prompt it is asked to complete.
    #[derive(Default)]
    struct RecordingLlm {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for RecordingLlm {
        async fn complete(&self, messages: Vec<Message>, _t: f32, _m: u32) -> Result<String, LlmError> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(messages[0].content.clone());
            Ok(format!("answer {}", prompts.len()))
        }
    }

    fn app(output: Option<PathBuf>) -> App {
        app_with(Arc::new(EchoLlm), output)
    }

    fn app_with(llm: Arc<dyn LlmProvider>, output: Option<PathBuf>) -> App {
        let analyzer = DocumentAnalyzer::new(
            Arc::new(FixedRetriever),
            llm,
            PromptBuilder::default(),
            Sampling {
                temperature: 0.0,
                max_tokens: 64,
            },
            2,
        );
        App::new(analyzer, ChunkerFactory::default(), None, output)
    }

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        assert_eq!(app(None).handle_line("   ").await, LineOutcome::Skipped);
    }

    #[tokio::test]
    async fn free_text_is_answered() {
        let outcome = app(None).handle_line("How long are records kept?").await;
        assert_eq!(outcome, LineOutcome::Answer("- Status: ✅ Compliant".into()));
    }

    #[tokio::test]
    async fn existing_file_writes_report_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("contract.txt");
        std::fs::write(&input, "Records are kept for three years.").unwrap();
        let output = dir.path().join("report.md");

        let outcome = app(Some(output.clone())).handle_line(&input.display().to_string()).await;
        assert_eq!(outcome, LineOutcome::Report(output.clone()));
        let written = std::fs::read_to_string(&output).unwrap();
        assert!(written.starts_with("# Document analysis: contract.txt"));
        assert!(written.contains("- ✅ Analyzed: 1"));
    }

    #[tokio::test]
    async fn unsupported_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("sheet.csv");
        std::fs::write(&input, "a,b,c").unwrap();
        assert_eq!(app(None).handle_line(&input.display().to_string()).await, LineOutcome::Failed);
    }

    #[tokio::test]
    async fn run_stops_at_end_of_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("contract.md");
        std::fs::write(&input, "Records are kept for three years.").unwrap();
        let output = dir.path().join("out.md");

        let stdin = format!("\n{}\n", input.display());
        app(Some(output.clone()))
            .run(stdin.as_bytes(), std::future::pending())
            .await
            .unwrap();
        assert!(output.exists());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (_tx, rx) = tokio::io::duplex(64);
        let reader = tokio::io::BufReader::new(rx);
        app(None).run(reader, async {}).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_utf8_line_does_not_stop_input() {
        let llm = Arc::new(RecordingLlm::default());
        app_with(llm.clone(), None)
            .run(&b"caf\xe9 question\nsecond question\n"[..], std::future::pending())
            .await
            .unwrap();

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("second question"));
    }
}
