use clap::Parser;
use kbase_context::text::{ChunkMode, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process;

/// A CLI tool to chunk a text document into JSON output using kbase-context.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Source identifier attached to every chunk. Defaults to the input file name.
    #[arg(short, long)]
    source: Option<String>,

    /// Chunking strategy: "words" (overlapping word windows) or "lines".
    #[arg(long, default_value = "words")]
    strategy: ChunkMode,

    /// Number of words per window.
    #[arg(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Number of words shared by consecutive windows.
    #[arg(short, long, default_value_t = DEFAULT_OVERLAP)]
    overlap: usize,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let strategy = args.strategy.into_strategy(args.chunk_size, args.overlap)?;

    let (file_content, default_source) = if let Some(input_path) = &args.input {
        let source = Path::new(input_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| input_path.clone());
        (fs::read_to_string(input_path)?, source)
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        (buffer, "stdin".to_string())
    };

    let source = args.source.unwrap_or(default_source);
    let chunks = strategy.chunks_for(&source, &file_content)?;

    let json_output = serde_json::to_string_pretty(&chunks)?;
    println!("{json_output}");

    Ok(())
}
