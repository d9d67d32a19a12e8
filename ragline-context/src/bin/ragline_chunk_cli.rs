use clap::Parser;
use ragline_context::text::{
    ChunkConfig, ChunkUnit, Chunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
};
use std::fs;
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

/// A CLI tool to split text files into overlapping chunks and print them as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Number of tokens per chunk.
    #[arg(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
    size: usize,

    /// Number of tokens shared by consecutive chunks.
    #[arg(short, long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    overlap: usize,

    /// Tokenization unit: "word" or "char".
    #[arg(short, long, default_value_t = ChunkUnit::Word)]
    unit: ChunkUnit,

    /// Stop after this many chunks.
    #[arg(short, long)]
    max_chunks: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let file_content = if let Some(input_path) = args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let config = ChunkConfig {
        size: args.size,
        overlap: args.overlap,
        unit: args.unit,
        max_chunks: args.max_chunks,
    };
    let chunker = Chunker::new(config)?;
    let chunks = chunker.chunk(&file_content);

    let json_output = serde_json::to_string_pretty(&chunks)?;
    println!("{json_output}");

    Ok(())
}
