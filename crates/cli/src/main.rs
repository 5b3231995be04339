mod app;
mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use docaudit_analysis::{DocumentAnalyzer, IndexOutcome, ReferenceIndexer, StoreRetriever};
use docaudit_core::config::{load_dotenv, Config};
use docaudit_ingest::{ChunkConfig, ChunkerFactory, OpenAiEmbedder};
use docaudit_llm::{create_provider, LlmProvider};
use docaudit_store::{VectorStore, DEFAULT_COLLECTION};

use crate::app::App;
use crate::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    load_dotenv();
    let args = CliArgs::parse();

    let mut config = match args.profile.as_deref() {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;
    config.log_summary();

    let reference = config
        .reference
        .reference_doc
        .clone()
        .context("reference document is required")?;

    let embedder = Arc::new(OpenAiEmbedder::new(
        config.embedding.url.clone(),
        config.embedding.api_key.clone(),
        config.embedding.model.clone(),
    ));
    let store = Arc::new(VectorStore::new(embedder));
    let factory = ChunkerFactory::new(ChunkConfig::from(&config.chunking));

    let indexer = ReferenceIndexer::new(
        store.clone(),
        factory.clone(),
        config.chunking.chunk_method.clone(),
        &config.reference,
    );
    match indexer
        .ensure_index(&reference)
        .await
        .with_context(|| format!("failed to index reference document {}", reference.display()))?
    {
        IndexOutcome::Loaded { documents } => info!(documents, "Using existing reference index"),
        IndexOutcome::Indexed { stored, total } => info!(stored, total, "Reference index built"),
    }

    let llm: Arc<dyn LlmProvider> = Arc::from(create_provider(&config.llm).context("failed to create LLM provider")?);
    let retriever = Arc::new(StoreRetriever::new(
        store,
        DEFAULT_COLLECTION,
        config.retrieval.top_k,
        config.retrieval.min_similarity,
    ));
    let analyzer = DocumentAnalyzer::from_config(retriever, llm, &config.analysis, &config.llm);

    let app = App::new(analyzer, factory, config.chunking.chunk_method.clone(), args.output.clone());
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    app.run(stdin, shutdown_signal()).await?;

    info!("Exiting");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
