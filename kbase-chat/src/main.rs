use anyhow::Context;
use clap::Parser;
use kbase_chat::{
    AnswerAssembler, Conversation, CopilotService, DEFAULT_GENERATION_MODEL, GeneratorConfig,
    OpenAiCompatibleGenerator, generator::DEFAULT_BASE_URL, run_repl,
};
use kbase_embed::{DEFAULT_CACHE_DIR, DEFAULT_MODEL_NAME, EmbedConfig, FastEmbedProvider};
use kbase_retriever::{Retriever, storage::ArtifactStore};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, info};

/// Ask questions about the ingested documents and get cited answers.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// API key for the generation service
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the OpenAI-compatible generation API
    #[arg(long, env = "KBASE_GENERATION_URL", default_value = DEFAULT_BASE_URL)]
    generation_url: String,

    /// Generation model
    #[arg(long, env = "KBASE_GENERATION_MODEL", default_value = DEFAULT_GENERATION_MODEL)]
    generation_model: String,

    /// Seconds to wait for an answer before giving up on a turn
    #[arg(long, env = "KBASE_GENERATION_TIMEOUT", default_value_t = 30)]
    generation_timeout: u64,

    /// Directory containing the index.bin and meta.json artifacts
    #[arg(long, env = "KBASE_VECTOR_DB_PATH", default_value = "backend/vector_db")]
    vector_db: PathBuf,

    /// Embedding model name (must match the model the index was built with)
    #[arg(long, env = "KBASE_EMBED_MODEL", default_value = DEFAULT_MODEL_NAME)]
    embed_model: String,

    /// Directory where embedding models are downloaded and cached
    #[arg(long, env = "KBASE_MODEL_CACHE", default_value = DEFAULT_CACHE_DIR)]
    model_cache: PathBuf,

    /// L2-normalize embeddings (must match how the index was built)
    #[arg(long)]
    normalize: bool,

    /// Chunks retrieved per question
    #[arg(short, long, env = "KBASE_TOP_K", default_value_t = 4)]
    k: usize,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    // Reject bad settings before artifacts or the model are loaded
    if args.k == 0 {
        return Err(anyhow::anyhow!("k must be at least 1"));
    }
    let timeout = Duration::from_secs(args.generation_timeout);
    let generator_config = GeneratorConfig::new(args.api_key.unwrap_or_default())
        .with_base_url(args.generation_url)
        .with_timeout(timeout);
    let generator = Arc::new(OpenAiCompatibleGenerator::new(generator_config)?);

    let knowledge_base = Arc::new(ArtifactStore::new(&args.vector_db).open().await?);
    info!(
        "Loaded {} chunks built with {}",
        knowledge_base.len(),
        knowledge_base.manifest().embedding_model.model_id
    );

    let embed_config = EmbedConfig::new(&args.embed_model)
        .with_cache_dir(&args.model_cache)
        .with_normalize(args.normalize);
    let embedder = Arc::new(
        FastEmbedProvider::create(embed_config)
            .await
            .context("failed to load the embedding model")?,
    );
    let retriever = Retriever::new_checked(embedder, knowledge_base)?;

    let service = CopilotService::new(
        retriever,
        generator,
        AnswerAssembler::new(args.generation_model),
        args.k,
        timeout,
    )?;

    println!(
        "Knowledge base ready ({} chunks). Ask a question, or /help for commands.",
        service.retriever().knowledge_base().len()
    );

    let mut conversation = Conversation::new();
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    run_repl(&service, &mut conversation, stdin, tokio::io::stdout()).await?;
    Ok(())
}
