use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use notesearch::api::create_router;
use notesearch::document::load_documents;
use notesearch::{rank_documents, NoteSearchWorker, WorkerConfig};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

// CLI Arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Background inverted index for short notes", long_about = None)]
struct Args {
    /// Character that separates lexemes
    #[arg(long, default_value_t = ' ', global = true)]
    delimiter: char,

    /// Fail requests that take longer than this many milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index a JSON file of notes and look up terms
    Search {
        #[arg(short, long)]
        notes: PathBuf,

        #[arg(short, long = "term", required = true)]
        terms: Vec<String>,

        /// Also print BM25 ranking of matched notes
        #[arg(long)]
        ranked: bool,
    },
    /// Serve the index over HTTP
    Serve {
        #[arg(short, long, default_value = "127.0.0.1:3000")]
        addr: String,
    },
}

impl Args {
    fn worker_config(&self) -> WorkerConfig {
        let config = WorkerConfig::default().with_delimiter(self.delimiter);
        match self.timeout_ms {
            Some(ms) => config.with_request_timeout(Duration::from_millis(ms)),
            None => config,
        }
    }
}

async fn run_search(worker: NoteSearchWorker, notes: PathBuf, terms: Vec<String>, ranked: bool) -> Result<()> {
    let docs = load_documents(&notes)?;

    let start = Instant::now();
    let count = docs.len();
    worker.index(docs).await.context("Failed to index notes")?;
    info!(notes = count, elapsed = ?start.elapsed(), "indexed");

    let start = Instant::now();
    let result = worker.search(terms.clone()).await.context("Search failed")?;
    info!(matched = result.len(), elapsed = ?start.elapsed(), "searched");

    let ranking = ranked.then(|| rank_documents(&terms, &result));
    let output = json!({ "result": result, "ranking": ranking });
    println!("{}", serde_json::to_string_pretty(&output)?);

    worker.shutdown();
    Ok(())
}

async fn run_server(worker: NoteSearchWorker, addr: String) -> Result<()> {
    let app = create_router(Arc::new(worker)).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("notesearch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let worker = NoteSearchWorker::spawn(args.worker_config()).context("Failed to start worker")?;

    match args.command {
        Command::Search {
            notes,
            terms,
            ranked,
        } => run_search(worker, notes, terms, ranked).await,
        Command::Serve { addr } => run_server(worker, addr).await,
    }
}
