use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use askthera_rag::embedder::{EmbeddingProvider, OpenAiEmbedder};
use askthera_rag::ingest::ingest_dir;
use askthera_rag::llm::LLM;
use askthera_rag::pgvector::PgVectorStore;
use askthera_rag::retriever::VectorRetriever;
use askthera_rag::settings::StoreBackend;
use askthera_rag::store::VectorStore;
use askthera_rag::vector_db::VectorDB;
use askthera_rag::{RagPipeline, Settings};

#[derive(Parser, Debug)]
#[command(name = "askthera", about = "Answer mental-health questions from a curated corpus")]
struct Args {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a single question
    Ask { question: String },
    /// Read questions from stdin until EOF
    Chat,
    /// Create the pgvector table and index
    InitDb,
    /// Embed and store every corpus file under a directory
    Ingest { dir: PathBuf },
}

/// The configured store, plus the in-memory handle when a snapshot has to
/// be written back.
struct Stores {
    store: Arc<dyn VectorStore>,
    memory: Option<Arc<VectorDB>>,
    postgres: Option<Arc<PgVectorStore>>,
}

async fn open_store(settings: &Settings) -> Result<Stores> {
    match settings.store.backend {
        StoreBackend::Postgres => {
            let pg = Arc::new(PgVectorStore::connect(&settings.store).await?);
            Ok(Stores {
                store: pg.clone(),
                memory: None,
                postgres: Some(pg),
            })
        }
        StoreBackend::Memory => {
            let path = settings
                .store
                .snapshot_path
                .as_ref()
                .context("store.snapshot_path is required for the memory backend")?;
            let db = Arc::new(VectorDB::load(path, settings.store.metric).await?);
            Ok(Stores {
                store: db.clone(),
                memory: Some(db),
                postgres: None,
            })
        }
    }
}

fn build_pipeline(settings: &Settings, store: Arc<dyn VectorStore>) -> Result<RagPipeline> {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OpenAiEmbedder::new(&settings.embedding)?);
    let retriever = VectorRetriever::new(
        embedder,
        store,
        settings.retrieval,
        settings.ranking.clone(),
    );
    let llm = LLM::new(settings.generation.clone())?;
    Ok(RagPipeline::new(
        Arc::new(retriever),
        Arc::new(llm),
        settings.responder.clone(),
    ))
}

async fn chat(rag: &RagPipeline) -> Result<()> {
    println!("AskThera is ready. Enter your questions (Ctrl+D to exit)");
    loop {
        let mut query = String::new();
        print!("> ");
        io::stdout().flush()?;

        if io::stdin().read_line(&mut query)? == 0 {
            break;
        }

        let query = query.trim();
        if query.is_empty() {
            continue;
        }

        match rag.run_rag(query).await {
            Ok(answer) => println!("\n{answer}\n"),
            Err(e) => eprintln!("\nError: {e}\n"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    // only an explicit --config path has to exist
    let config_path = args
        .config
        .clone()
        .or_else(|| Settings::default_path().filter(|path| path.exists()));
    let settings = Settings::load(config_path.as_deref()).context("failed to load settings")?;
    info!(backend = ?settings.store.backend, "settings loaded");

    let stores = open_store(&settings).await?;

    match args.command {
        Command::Ask { question } => {
            let rag = build_pipeline(&settings, stores.store)?;
            println!("{}", rag.run_rag(&question).await?);
        }
        Command::Chat => {
            let rag = build_pipeline(&settings, stores.store)?;
            chat(&rag).await?;
        }
        Command::InitDb => {
            let Some(pg) = stores.postgres else {
                bail!("init-db only applies to the postgres backend");
            };
            pg.ensure_schema(settings.embedding.dimensions).await?;
        }
        Command::Ingest { dir } => {
            let embedder: Arc<dyn EmbeddingProvider> =
                Arc::new(OpenAiEmbedder::new(&settings.embedding)?);
            let stats = ingest_dir(&dir, embedder, stores.store.as_ref(), settings.ingest).await?;
            if stats.failed_files > 0 {
                warn!(failed_files = stats.failed_files, "some corpus files were skipped");
            }
            if let (Some(db), Some(path)) = (stores.memory, settings.store.snapshot_path.as_ref()) {
                db.save(path).await?;
            }
            println!(
                "{} files, {} records, {} inserted",
                stats.files, stats.records, stats.inserted
            );
        }
    }

    Ok(())
}
