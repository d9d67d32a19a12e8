use anyhow::Context;
use clap::{Parser, Subcommand};
use ragline_retriever::config::{IndexBackend, RagConfig};
use ragline_retriever::{IngestReport, RetrievedChunk, Retriever};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

/// Ingest text into a vector index and answer questions from it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chunk, embed and index a text file ("-" reads stdin)
    Ingest {
        #[arg(short, long)]
        input: PathBuf,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Print the stored chunks most similar to a question
    Search {
        #[arg(short, long)]
        question: String,
        #[arg(short = 'k', long, default_value_t = 5)]
        top_k: usize,
        /// Ingest this file first
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Answer a question from the stored chunks
    Ask {
        #[arg(short, long)]
        question: String,
        #[arg(short = 'k', long, default_value_t = 5)]
        top_k: usize,
        /// Ingest this file first
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum OutputFormat {
    Summary,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct SearchOutput<'a> {
    question: &'a str,
    matches: &'a [RetrievedChunk],
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RagConfig::load_from(path)?,
        None => RagConfig::default(),
    };
    config.validate()?;

    match args.command {
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        Commands::Ingest { input, format } => {
            config.resolve_env_keys();
            let retriever = config.build_retriever()?;
            if config.index.backend == IndexBackend::Memory {
                tracing::warn!("The memory index is discarded when this command exits");
            }
            let report = ingest_file(&retriever, &config, &input).await?;
            print_report(&report, format)
        }
        Commands::Search {
            question,
            top_k,
            input,
            format,
        } => {
            config.resolve_env_keys();
            let retriever = config.build_retriever()?;
            if let Some(input) = input {
                let report = ingest_file(&retriever, &config, &input).await?;
                print_warnings(&report);
            }
            let matches = retriever.search(&question, top_k).await?;
            match format {
                OutputFormat::Json => {
                    let output = SearchOutput {
                        question: &question,
                        matches: &matches,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Summary => {
                    println!("Found {} matching chunks:", matches.len());
                    for hit in &matches {
                        println!(
                            "  Score: {:.3} | ID: {} | {}",
                            hit.score,
                            hit.id,
                            preview(&hit.text, 100)
                        );
                    }
                }
            }
            Ok(())
        }
        Commands::Ask {
            question,
            top_k,
            input,
        } => {
            config.resolve_env_keys();
            let retriever = config.build_retriever()?;
            let composer = config.build_composer()?;
            if let Some(input) = input {
                let report = ingest_file(&retriever, &config, &input).await?;
                print_warnings(&report);
            }
            let answer = retriever.ask(composer.as_ref(), &question, top_k).await?;
            println!("{answer}");
            Ok(())
        }
    }
}

async fn ingest_file(
    retriever: &Retriever,
    config: &RagConfig,
    input: &Path,
) -> anyhow::Result<IngestReport> {
    let text = if input == Path::new("-") {
        let mut buffer = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buffer)
            .await
            .context("Failed to read stdin")?;
        buffer
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("Failed to read {}", input.display()))?
    };
    Ok(retriever.ingest(&text, &config.chunking).await?)
}

fn print_report(report: &IngestReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Summary => {
            println!("Ingestion Report:");
            println!("  Chunks: {}", report.chunks_total);
            println!("  Records upserted: {}", report.records_upserted);
            println!("  Skipped chunks: {}", report.warnings.len());
            for warning in &report.warnings {
                println!(
                    "    Chunk {} after {} attempt(s): {}",
                    warning.chunk_id, warning.attempts, warning.message
                );
            }
        }
    }
    Ok(())
}

fn print_warnings(report: &IngestReport) {
    for warning in &report.warnings {
        eprintln!(
            "Skipped chunk {} after {} attempt(s): {}",
            warning.chunk_id, warning.attempts, warning.message
        );
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
