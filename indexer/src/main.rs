mod corpus;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use owtsearch_core::{Analyzer, IndexBuilder, IndexReader, SearchError, StandardAnalyzer};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and inspect the full-text search index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from .xz archives, JSON/JSONL or .txt files.
    /// Any index already at the output location is replaced.
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long, default_value = "./indexdir")]
        output: String,
        /// Disable English stemming
        #[arg(long, default_value_t = false)]
        no_stem: bool,
        /// Index stop words instead of dropping them
        #[arg(long, default_value_t = false)]
        keep_stopwords: bool,
        /// Drop tokens shorter than this many characters
        #[arg(long, default_value_t = 1)]
        min_token_len: usize,
    },
    /// Print the metadata of an existing index
    Inspect {
        #[arg(long, default_value = "./indexdir")]
        index: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, no_stem, keep_stopwords, min_token_len } => {
            let analyzer = StandardAnalyzer::new()
                .with_stemming(!no_stem)
                .with_stopwords(!keep_stopwords)
                .with_min_len(min_token_len);
            build_index(Path::new(&input), &output, analyzer)
        }
        Commands::Inspect { index } => inspect(&index),
    }
}

fn build_index(input: &Path, output: &str, analyzer: StandardAnalyzer) -> Result<()> {
    if !input.exists() {
        bail!("input path {} does not exist", input.display());
    }
    let files = corpus::discover(input);
    if files.is_empty() {
        bail!("no .xz, .json, .jsonl or .txt files found under {}", input.display());
    }
    tracing::info!(files = files.len(), input = %input.display(), "discovered input files");

    let mut builder = IndexBuilder::create(output, Arc::new(analyzer.clone()))?;
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/dim}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_message("processing archives");

    for file in &files {
        let mut sink = |doc| builder.add_document(doc).map(|_| ());
        match corpus::read_source(input, file, &mut sink) {
            Ok(n) => tracing::debug!(file = %file.display(), documents = n, "ingested"),
            Err(e) if e.downcast_ref::<SearchError>().is_some() => {
                pb.abandon_with_message("aborted");
                return Err(e);
            }
            Err(e) => tracing::warn!(file = %file.display(), error = %e, "skipping unreadable file"),
        }
        pb.inc(1);
    }
    pb.finish_with_message(format!("{} documents", builder.document_count()));

    tracing::info!(documents = builder.document_count(), "committing index");
    let stats = builder.commit()?;

    let reader = IndexReader::open(output, &analyzer)?;
    reader.verify_checksums()?;
    if reader.document_count() == 0 {
        bail!("indexing completed but resulted in an empty index; check the input format");
    }
    tracing::info!(
        output,
        documents = stats.documents,
        terms = stats.terms,
        tokens = stats.tokens,
        empty_documents = stats.empty_documents,
        analyzer = %analyzer.name(),
        "index build complete"
    );
    Ok(())
}

fn inspect(index: &str) -> Result<()> {
    let paths = owtsearch_core::persist::IndexPaths::new(index);
    let meta = owtsearch_core::persist::load_meta(&paths)?;
    let analyzer: StandardAnalyzer = meta.analyzer.parse().map_err(anyhow::Error::msg)?;
    let reader = IndexReader::open(index, &analyzer)?;
    println!("{}", serde_json::to_string_pretty(reader.meta())?);
    println!("average document length: {:.1} tokens", reader.average_doc_len());
    Ok(())
}
