//! # School Counselor CLI (`counselor`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `counselor index` | Build the vector index (or confirm the existing one) |
//! | `counselor index --rebuild` | Re-read every source and replace the index |
//! | `counselor sources` | List data sources and any that fail to load |
//! | `counselor classify "<text>"` | Show the scope decision for a message |
//! | `counselor ask "<question>"` | Answer one question |
//! | `counselor ask` | Interactive session on stdin |
//! | `counselor serve` | Start the HTTP chat server |
//!
//! ## Examples
//!
//! ```bash
//! counselor --config ./config/counselor.toml index
//! counselor classify "what is 2+2 in my math class"
//! counselor ask "How many credits do I need to graduate?"
//! RUST_LOG=school_counselor=debug counselor serve
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use std::path::PathBuf;

use school_counselor::chat::ChatService;
use school_counselor::config::{load_config, Config};
use school_counselor::index_cmd::{run_index, run_sources};
use school_counselor::logging::init_logging;
use school_counselor::server::serve;
use school_counselor_core::{ScopeClassifier, ScopeRules};

/// School Counselor: answers student questions about one high school from
/// its own documents.
#[derive(Parser)]
#[command(name = "counselor", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/counselor.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the vector index from the data directory.
    ///
    /// Loads the existing index when the index file already holds chunks.
    Index {
        /// Discard the stored index and rebuild from sources.
        #[arg(long)]
        rebuild: bool,
    },

    /// List data sources and load failures.
    Sources,

    /// Print the scope decision for a message. No providers are called.
    Classify {
        text: String,
    },

    /// Answer a question, or start an interactive session when none is given.
    Ask {
        question: Option<String>,

        /// Print the scope decision and retrieved chunk count to stderr.
        #[arg(long)]
        explain: bool,
    },

    /// Start the HTTP chat server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Index { rebuild } => run_index(&config, rebuild).await,
        Commands::Sources => run_sources(&config),
        Commands::Classify { text } => {
            run_classify(&config, &text);
            Ok(())
        }
        Commands::Ask { question, explain } => run_ask(&config, question, explain).await,
        Commands::Serve => serve(&config).await,
    }
}

fn run_classify(config: &Config, text: &str) {
    let classifier =
        ScopeClassifier::new(ScopeRules::default().with_aliases(&config.school.aliases));
    let (decision, reason) = classifier.classify_with_reason(text);
    println!("decision: {}", decision);
    println!("reason:   {}", reason);
}

async fn run_ask(config: &Config, question: Option<String>, explain: bool) -> Result<()> {
    let service = ChatService::from_config(config).await?;
    let session_id = "cli";

    if let Some(question) = question {
        let answer = service.handle(session_id, &question).await;
        if explain {
            eprintln!(
                "[{} | {} chunks]",
                answer.decision.map_or("empty".to_string(), |d| d.to_string()),
                answer.retrieved
            );
        }
        println!("{}", answer.text);
        return Ok(());
    }

    println!("{}", service.responder().templates().greeting_default);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }
        let answer = service.handle(session_id, line).await;
        if explain {
            eprintln!(
                "[{} | {} chunks]",
                answer.decision.map_or("empty".to_string(), |d| d.to_string()),
                answer.retrieved
            );
        }
        println!("{}\n", answer.text);
    }
    Ok(())
}
