use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use colored::*;
use docgraph_core::{
    format_file_size, ApiClient, Config, FileSelection, StatusKind, StreamFrame, UploadFailure,
};
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

const TICK_RATE: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "docgraph")]
#[command(about = "Chat with your documents and explore their knowledge graph")]
#[command(version)]
struct Cli {
    /// Base URL of the document graph API (overrides config and DOCGRAPH_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question and stream the answer to stdout
    Ask {
        /// Your question
        question: String,
        /// Also print the supporting context the answer was built from
        #[arg(short, long)]
        context: bool,
    },
    /// Upload a PDF or text document
    Upload {
        /// Path to the document
        path: PathBuf,
    },
    /// Summarize the current knowledge graph
    Graph {
        /// Print the raw snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check that the API is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_warning) = config_or_default(Config::load());
    let api_url = cli.api_url.clone().unwrap_or_else(|| config.api_base_url());

    match cli.command {
        None => {
            init_logging(LogTarget::File);
            if let Some(warning) = &config_warning {
                warn!("{}", warning);
            }
            run_tui(config, &api_url, config_warning).await
        }
        Some(command) => {
            init_logging(LogTarget::Stderr);
            if let Some(warning) = &config_warning {
                warn!("{}", warning);
            }
            let client = ApiClient::new(&api_url);
            match command {
                Commands::Ask { question, context } => ask(&client, &question, context).await,
                Commands::Upload { path } => upload(&client, path).await,
                Commands::Graph { json } => graph_summary(&client, json).await,
                Commands::Health => health(&client).await,
            }
        }
    }
}

/// Fall back to defaults on a broken config file, keeping the reason to report
/// once logging is up.
fn config_or_default(loaded: Result<Config>) -> (Config, Option<String>) {
    match loaded {
        Ok(config) => (config, None),
        Err(e) => (
            Config::new(),
            Some(format!("Ignoring unreadable config file, using defaults: {}", e)),
        ),
    }
}

enum LogTarget {
    /// The terminal UI owns the screen, so logs go to a file
    File,
    Stderr,
}

fn init_logging(target: LogTarget) {
    let default_level = match target {
        LogTarget::File => "info",
        LogTarget::Stderr => "warn",
    };
    let filter = EnvFilter::try_from_env("DOCGRAPH_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    match target {
        LogTarget::Stderr => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .try_init();
        }
        LogTarget::File => match open_log_file() {
            Some(file) => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .try_init();
            }
            None => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(io::sink)
                    .try_init();
            }
        },
    }
}

fn open_log_file() -> Option<std::fs::File> {
    let dir = dirs::data_dir()?.join("docgraph");
    std::fs::create_dir_all(&dir).ok()?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("docgraph.log"))
        .ok()
}

async fn run_tui(config: Config, api_url: &str, config_warning: Option<String>) -> Result<()> {
    let client = ApiClient::new(api_url);
    let (session_tx, session_rx) = mpsc::unbounded_channel();
    let mut app = App::new(config, client, session_tx);
    if let Some(warning) = config_warning {
        app.session.notify(warning, StatusKind::Warning);
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(TICK_RATE, session_rx);

    tracing::info!(api_url, "starting terminal client");
    app.start();

    let result = run_loop(&mut terminal, &mut app, &mut events).await;
    tui::restore()?;
    result
}

async fn run_loop(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;
        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}

async fn ask(client: &ApiClient, question: &str, show_context: bool) -> Result<()> {
    if question.trim().is_empty() {
        bail!("Please enter a message.");
    }

    println!("{} {}\n", "❓".bold(), question.bold().cyan());
    let mut stream = client.query(question.trim()).await.map_err(|e| anyhow!("Error: {}", e))?;

    let mut context = None;
    let mut stdout = io::stdout();
    while let Some(frame) = stream.next_frame().await.map_err(|e| anyhow!("Error: {}", e))? {
        match frame {
            StreamFrame::Chunk(text) => {
                print!("{}", text);
                stdout.flush()?;
            }
            StreamFrame::Context(text) => {
                context.get_or_insert(text);
            }
        }
    }
    println!();

    if show_context {
        if let Some(text) = context {
            println!("\n{}", "Context:".bold().blue());
            println!("{}", text.dimmed());
        }
    }
    Ok(())
}

async fn upload(client: &ApiClient, path: PathBuf) -> Result<()> {
    let selection = FileSelection::from_path(&path)
        .map_err(|e| anyhow!("Could not open {}: {}", path.display(), e))?
        .check()?;

    println!(
        "📄 Uploading {} ({})...",
        selection.name.bold(),
        format_file_size(selection.size).dimmed()
    );

    match client.upload_document(&selection).await {
        Ok(receipt) => {
            println!("{}", "Document uploaded and processed successfully!".green());
            if let Some(doc_id) = receipt.doc_id {
                println!("  id: {}", doc_id.dimmed());
            }
            Ok(())
        }
        Err(e) => bail!(UploadFailure::classify(&e).user_message()),
    }
}

async fn graph_summary(client: &ApiClient, json: bool) -> Result<()> {
    let snapshot = client
        .graph()
        .await
        .map_err(|e| anyhow!("Error fetching graph data: {}", e))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("\n{}", "🕸  Knowledge Graph".bold().blue());
    println!("{}", "=".repeat(30).dimmed());
    println!(
        "{} nodes, {} relationships",
        snapshot.nodes.len().to_string().bold(),
        snapshot.edges.len().to_string().bold()
    );

    for (kind, count) in snapshot.kind_counts() {
        let kind = if kind.is_empty() { "(untyped)".to_string() } else { kind };
        println!("  • {} {}", kind.green(), count.to_string().dimmed());
    }

    let dangling = snapshot.dangling_edges();
    if !dangling.is_empty() {
        println!(
            "{}",
            format!("⚠️  {} relationships point at missing nodes", dangling.len()).yellow()
        );
    }
    Ok(())
}

async fn health(client: &ApiClient) -> Result<()> {
    match client.health().await {
        Ok(status) => {
            println!("{} {}", "API:".bold(), status.status.green());
            if let Some(db) = status.neo4j {
                println!("{} {}", "Database:".bold(), db.green());
            }
            Ok(())
        }
        Err(e) => {
            println!("{}: {}", "API unavailable".red(), e);
            println!("Checked {}", client.base_url().bold());
            bail!("health check failed")
        }
    }
}
