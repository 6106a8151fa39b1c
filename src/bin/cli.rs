//! papershelf CLI - search papers, fetch and read PDFs, or serve the MCP tools
//!
//! Usage: papershelf [OPTIONS] <COMMAND>
//!
//! Logs go to stderr; stdout carries results (or the MCP stream).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use papershelf_lib::papers::PaperResult;
use papershelf_lib::shelf::{ReadOutcome, Shelf};
use papershelf_lib::{utils, Settings};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Main CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "papershelf")]
#[command(version, about = "Fetch and read academic paper PDFs", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Settings file (JSON). Also read from PAPERSHELF_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Detailed logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server
    McpServer {
        /// Use stdio transport (required)
        #[arg(long)]
        stdio: bool,
    },
    #[command(flatten)]
    Shelf(ShelfCommand),
}

/// Commands that run against the local shelf and exit.
#[derive(Subcommand)]
enum ShelfCommand {
    /// Download a PDF into local storage
    Download {
        url: String,
        /// Store under this name instead of one derived from the URL
        #[arg(long)]
        filename: Option<String>,
    },
    /// Print the text of a local PDF
    Read {
        path: PathBuf,
        #[arg(long)]
        start: Option<usize>,
        #[arg(long)]
        end: Option<usize>,
        /// Whole document in context-sized chunks
        #[arg(long)]
        chunked: bool,
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Search for papers
    Search {
        query: String,
        #[arg(long, value_enum, default_value_t = Source::Arxiv)]
        source: Source,
        #[arg(long, short, default_value = "10")]
        limit: u32,
        /// Semantic Scholar year filter ("2019" or "2016-2020")
        #[arg(long)]
        year: Option<String>,
    },
    /// List downloaded PDFs
    List,
    /// Delete every downloaded file
    Cleanup,
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    Arxiv,
    Semantic,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() {
    // println! panics on a closed pipe; exit quietly instead.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if info.to_string().contains("Broken pipe") {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run_cli(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

async fn run_cli(cli: Cli) -> Result<(), String> {
    let settings = Settings::from_env(cli.config.as_deref())?;

    match cli.command {
        Commands::McpServer { stdio } => {
            if !stdio {
                return Err("Only --stdio transport is currently supported".to_string());
            }
            papershelf_lib::mcp::run_mcp_server(settings).await
        }
        Commands::Shelf(command) => {
            let shelf = Shelf::new(&settings)?;
            run_command(command, &shelf, cli.json).await
        }
    }
}

async fn run_command(command: ShelfCommand, shelf: &Shelf, json: bool) -> Result<(), String> {
    match command {
        ShelfCommand::Download { url, filename } => {
            let payload = shelf
                .download_pdf(&url, filename.as_deref())
                .await
                .map_err(|e| e.to_string())?;
            emit(json, &payload, || println!("{}", payload.path.display()))
        }
        ShelfCommand::Read { path, start, end, chunked, chunk_size } => {
            let outcome = shelf
                .read_pdf_text(&path, start, end, chunked, chunk_size)
                .await
                .map_err(|e| e.to_string())?;
            emit(json, &outcome, || print_read(&outcome))
        }
        ShelfCommand::Search { query, source, limit, year } => {
            let papers = match source {
                Source::Arxiv => shelf.search_arxiv(&query, Some(limit)).await,
                Source::Semantic => {
                    shelf
                        .search_semantic_scholar(&query, Some(limit), year.as_deref())
                        .await
                }
            }
            .map_err(|e| e.to_string())?;
            emit(json, &papers, || print_papers(&papers))
        }
        ShelfCommand::List => {
            let payload = shelf.list_downloaded().await.map_err(|e| e.to_string())?;
            emit(json, &payload, || {
                if payload.files.is_empty() {
                    println!("No downloaded PDFs in {}", shelf.storage().dir().display());
                }
                for file in &payload.files {
                    println!("{}", file.display());
                }
            })
        }
        ShelfCommand::Cleanup => {
            let payload = shelf.cleanup().await.map_err(|e| e.to_string())?;
            emit(json, &payload, || println!("Removed {} file(s)", payload.removed))
        }
    }
}

// ============================================================================
// Output
// ============================================================================

fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce()) -> Result<(), String> {
    if json {
        let out = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
        println!("{}", out);
    } else {
        human();
    }
    Ok(())
}

fn print_read(outcome: &ReadOutcome) {
    match outcome {
        ReadOutcome::Range(read) => {
            println!("{}", read.text);
            if read.has_more {
                eprintln!(
                    "[pages {}-{} of {}; more with --start {}]",
                    read.start_page,
                    read.end_page,
                    read.total_pages,
                    read.end_page + 1
                );
            }
        }
        ReadOutcome::Chunked(chunked) => {
            for chunk in &chunked.set.chunks {
                println!("=== Pages {}-{} ===", chunk.start_page, chunk.end_page);
                println!("{}\n", chunk.text);
            }
            if chunked.set.truncated {
                eprintln!(
                    "[too large for the token budget; showing page 1 of {} truncated]",
                    chunked.set.total_pages
                );
            }
        }
    }
}

fn print_papers(papers: &[PaperResult]) {
    if papers.is_empty() {
        println!("No results");
        return;
    }
    for (i, paper) in papers.iter().enumerate() {
        let year = paper.year.map(|y| format!(" ({})", y)).unwrap_or_default();
        println!("{}. {}{}", i + 1, paper.title, year);
        if !paper.authors.is_empty() {
            println!("   {}", utils::truncate_chars(&paper.authors.join(", "), 100));
        }
        println!("   {}", paper.pdf_url.as_deref().unwrap_or(&paper.url));
    }
}
