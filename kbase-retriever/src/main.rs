use clap::{Args as ClapArgs, Parser, Subcommand};
use kbase_context::{ChunkMode, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use kbase_embed::{DEFAULT_CACHE_DIR, DEFAULT_MODEL_NAME, EmbedConfig, FastEmbedProvider};
use kbase_retriever::{
    retrieval::{
        ChunkingConfig, DEFAULT_EXTENSION, IngestConfig, IngestionPipeline, Retriever,
        ingest::DEFAULT_BATCH_SIZE,
    },
    storage::{ArtifactStore, Manifest},
};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// A CLI tool to build and query the kbase knowledge base.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing the index.bin and meta.json artifacts
    #[arg(long, env = "KBASE_VECTOR_DB_PATH", default_value = "backend/vector_db")]
    vector_db: PathBuf,

    #[command(flatten)]
    embedding: EmbeddingArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ClapArgs, Debug)]
struct EmbeddingArgs {
    /// Embedding model name (must match the model the index was built with)
    #[arg(long, env = "KBASE_EMBED_MODEL", default_value = DEFAULT_MODEL_NAME, global = true)]
    embed_model: String,

    /// Directory where embedding models are downloaded and cached
    #[arg(long, env = "KBASE_MODEL_CACHE", default_value = DEFAULT_CACHE_DIR, global = true)]
    model_cache: PathBuf,

    /// L2-normalize embeddings (changes the model id recorded in the index)
    #[arg(long, global = true)]
    normalize: bool,
}

impl EmbeddingArgs {
    fn config(&self) -> EmbedConfig {
        EmbedConfig::new(&self.embed_model)
            .with_cache_dir(&self.model_cache)
            .with_normalize(self.normalize)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the knowledge base from a directory of documents, replacing any previous build
    Ingest {
        /// Directory containing the source documents
        #[arg(long, env = "KBASE_DOCS_PATH", default_value = "data/docs")]
        docs: PathBuf,
        /// Chunking strategy: words or lines
        #[arg(long, env = "KBASE_CHUNK_STRATEGY", default_value = "words")]
        strategy: ChunkMode,
        /// Words per chunk (words strategy)
        #[arg(long, env = "KBASE_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Words shared by consecutive chunks (words strategy)
        #[arg(long, env = "KBASE_CHUNK_OVERLAP", default_value_t = DEFAULT_OVERLAP)]
        overlap: usize,
        /// Extension of the files to index
        #[arg(long, default_value = DEFAULT_EXTENSION)]
        extension: String,
        /// Chunks per embedding batch
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Retrieve the chunks nearest to a query
    Search {
        /// Free-text query
        #[arg(short, long)]
        query: String,
        /// Maximum number of results
        #[arg(short, long, env = "KBASE_TOP_K", default_value_t = 4)]
        k: usize,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Show the manifest and per-source chunk counts
    Stats {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    manifest: &'a Manifest,
    source_counts: Vec<(String, usize)>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let store = ArtifactStore::new(&args.vector_db);

    match args.command {
        Commands::Ingest {
            docs,
            strategy,
            chunk_size,
            overlap,
            extension,
            batch_size,
            format,
        } => {
            let chunking = ChunkingConfig::new(strategy)
                .with_chunk_size(chunk_size)
                .with_overlap(overlap)
                .with_extension(extension);
            let config = IngestConfig::new(docs, &args.vector_db)
                .with_chunking(chunking)
                .with_batch_size(batch_size);

            // Reject bad parameters before the model is loaded
            let pipeline = IngestionPipeline::new(config)?;
            let embed_config = args.embedding.config();
            embed_config.validate()?;

            let embedder = FastEmbedProvider::create(embed_config).await?;
            let report = pipeline.run(&embedder).await?;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                OutputFormat::Summary | OutputFormat::Full => {
                    println!(
                        "Ingested {} chunks from {} files (dimension {}) in {:.2?}",
                        report.chunk_count, report.files_processed, report.dimension, report.elapsed
                    );
                    println!("  Chunking: {}", report.chunking);
                    println!("  Model: {}", report.model_id);
                    println!("  Index: {}", report.index_path.display());
                    println!("  Metadata: {}", report.metadata_path.display());
                    if format == OutputFormat::Full {
                        println!("  Fingerprint: {}", report.fingerprint);
                        for (source, count) in &report.source_counts {
                            println!("    {source}: {count} chunks");
                        }
                    }
                }
            }
            Ok(())
        }
        Commands::Search { query, k, format } => {
            if k == 0 {
                return Err(anyhow::anyhow!("k must be at least 1"));
            }
            if query.trim().is_empty() {
                return Err(anyhow::anyhow!("Query cannot be empty"));
            }

            let knowledge_base = Arc::new(store.open().await?);
            let embedder = Arc::new(FastEmbedProvider::create(args.embedding.config()).await?);
            let retriever = Retriever::new_checked(embedder, knowledge_base)?;

            let results = retriever.retrieve(&query, k).await?;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&results)?);
                }
                OutputFormat::Summary => {
                    println!("Found {} chunks:", results.len());
                    for result in results {
                        println!(
                            "  Distance: {:.4} | Position: {} | Source: {} | {}",
                            result.distance,
                            result.position,
                            result.source,
                            result.text.chars().take(80).collect::<String>()
                        );
                    }
                }
                OutputFormat::Full => {
                    for result in results {
                        println!("Distance: {:.4}", result.distance);
                        println!("Position: {}", result.position);
                        println!("Source: {}", result.source);
                        println!("Content:\n{}", result.text);
                        println!("---");
                    }
                }
            }
            Ok(())
        }
        Commands::Stats { format } => {
            let knowledge_base = store.open().await?;
            let manifest = knowledge_base.manifest();
            let source_counts = knowledge_base.metadata.source_counts();

            match format {
                OutputFormat::Json => {
                    let output = StatsOutput {
                        manifest,
                        source_counts,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Summary | OutputFormat::Full => {
                    println!("Knowledge Base Statistics:");
                    println!("  Location: {}", store.dir().display());
                    println!("  Total chunks: {}", knowledge_base.len());
                    println!("  Dimension: {}", knowledge_base.index.dimension());
                    println!("  Chunking: {}", manifest.chunking);
                    println!("  Embedding model: {}", manifest.embedding_model.model_id);
                    println!("  Created: {}", manifest.created_at.to_rfc3339());
                    println!("  Fingerprint: {}", manifest.fingerprint);
                    println!("  Sources: {}", source_counts.len());

                    let shown = if format == OutputFormat::Full {
                        source_counts.len()
                    } else {
                        10
                    };
                    for (source, count) in source_counts.iter().take(shown) {
                        println!("    {source}: {count} chunks");
                    }
                    if source_counts.len() > shown {
                        println!("    ... and {} more", source_counts.len() - shown);
                    }
                }
            }
            Ok(())
        }
    }
}
