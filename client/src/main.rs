// ./client/src/main.rs
mod api;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use api::NotesClient;

#[derive(Parser, Debug)]
#[command(name = "notes-client")]
#[command(about = "Command-line client for the notes API")]
#[command(version)]
struct Cli {
    /// Base URL of the notes API server
    #[arg(long, global = true, default_value = api::DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Create a new note
    Create {
        title: String,
        /// Note body; several words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        content: Vec<String>,
    },
    /// List notes, newest first
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        /// Page size (server default when omitted)
        #[arg(short, long)]
        limit: Option<usize>,
        /// Number of notes to skip
        #[arg(short, long, default_value_t = 0)]
        offset: usize,
    },
    /// Show a single note
    Get {
        #[arg(value_parser = clap::value_parser!(i64).range(1..))]
        id: i64,
    },
    /// Replace the title and content of a note
    Update {
        #[arg(value_parser = clap::value_parser!(i64).range(1..))]
        id: i64,
        title: String,
        #[arg(required = true, num_args = 1..)]
        content: Vec<String>,
    },
    /// Delete a note
    Delete {
        #[arg(value_parser = clap::value_parser!(i64).range(1..))]
        id: i64,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() {
    // Quiet by default; RUST_LOG=debug shows the HTTP exchange
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = NotesClient::new(&cli.server);

    if let Err(e) = run(&client, cli.command).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(client: &NotesClient, command: Commands) -> Result<()> {
    match command {
        Commands::Create { title, content } => {
            let note = client.create(title, content.join(" ")).await?;
            println!("Note created successfully with ID: {}", note.id());
            println!("{}", output::note_detail(&note));
        }
        Commands::List {
            format,
            limit,
            offset,
        } => {
            let list = client.list(limit, offset).await?;
            match format {
                OutputFormat::Table => println!("{}", output::notes_table(&list)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&list)?),
            }
        }
        Commands::Get { id } => {
            let note = client.get(id).await?;
            println!("{}", output::note_detail(&note));
        }
        Commands::Update { id, title, content } => {
            let note = client.update(id, title, content.join(" ")).await?;
            println!("Note updated successfully:");
            println!("{}", output::note_detail(&note));
        }
        Commands::Delete { id } => {
            client.delete(id).await?;
            println!("Note with ID {} deleted successfully", id);
        }
    }
    Ok(())
}
