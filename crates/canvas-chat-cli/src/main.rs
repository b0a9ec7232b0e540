use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use canvas_chat_agent::{ContextWindow, GenerationOutcome, NoteGenerator, Notifier};
use canvas_chat_canvas::{Canvas, CanvasSession};
use canvas_chat_core::config::Config;
use canvas_chat_core::models::CHAT_MODELS;
use canvas_chat_core::types::MessageContent;
use canvas_chat_providers::openai::OpenAiProvider;
use canvas_chat_providers::{Credentials, LlmProvider};

mod logging;

#[derive(Parser)]
#[command(
    name = "canvas-chat",
    about = "Continue a canvas conversation with an LLM, one note at a time",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (default: ~/.canvas_chat/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a reply to a note and add it below the note
    Generate(NoteArgs),

    /// Add an empty note below a note
    Next(NoteArgs),

    /// Show the messages that would be sent for a note
    Context {
        #[command(flatten)]
        note: NoteArgs,

        /// Print the messages as JSON
        #[arg(long)]
        json: bool,
    },

    /// List known models and their input token limits
    Models {
        /// Ask the configured API for its models instead
        #[arg(long)]
        remote: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct NoteArgs {
    /// Canvas file to edit
    #[arg(long)]
    canvas: PathBuf,

    /// Id of the note to act on
    #[arg(long)]
    node: String,

    /// Root for file nodes (default: the canvas file's directory)
    #[arg(long)]
    vault: Option<PathBuf>,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a specific config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
}

/// Prints notices to stderr so stdout stays clean for results.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notice(&self, message: &str) {
        eprintln!("{message}");
    }
}

/// Open a canvas file with `node` as the only selected note.
async fn open_canvas(args: &NoteArgs) -> anyhow::Result<CanvasSession> {
    let vault_root = args.vault.clone().unwrap_or_else(|| {
        args.canvas
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });

    let session = CanvasSession::open(&args.canvas, vault_root).await?;
    if session.node(&args.node).await.is_none() {
        anyhow::bail!(
            "No note with id '{}' in {}",
            args.node,
            args.canvas.display()
        );
    }
    session.set_selection(&[args.node.as_str()]).await;
    Ok(session)
}

fn generator(config: &Config) -> anyhow::Result<NoteGenerator> {
    let settings = config.settings();
    let provider = Arc::new(OpenAiProvider::new(Some(&settings.api_url)));
    NoteGenerator::new(settings, provider, Arc::new(ConsoleNotifier))
}

fn print_context(window: &ContextWindow, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(window)?);
        return Ok(());
    }

    for message in &window.messages {
        match &message.content {
            MessageContent::Text { text } => println!("[{}]\n{text}\n", message.role.as_str()),
            MessageContent::ImageUrl { url } => {
                let shown = if url.starts_with("data:") {
                    "<inline image>"
                } else {
                    url.as_str()
                };
                println!("[{}] image: {shown}\n", message.role.as_str());
            }
        }
    }
    println!(
        "{} notes, {} tokens",
        window.note_count(),
        window.token_count
    );
    Ok(())
}

/// Parse a CLI value as JSON, falling back to a plain string.
fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(Config::config_path);
    let config = Config::load(&config_path)?;

    logging::init(&config, cli.verbose)?;

    match cli.command {
        Commands::Generate(args) => {
            let session = open_canvas(&args).await?;
            let outcome = generator(&config)?.generate_note(Some(&session)).await?;
            match outcome {
                GenerationOutcome::Populated { node_id } => {
                    let text = session
                        .node(&node_id)
                        .await
                        .and_then(|n| n.text().map(str::to_string))
                        .unwrap_or_default();
                    tracing::info!(node = %node_id, "Reply written to canvas");
                    println!("{text}");
                }
                GenerationOutcome::NoSelection | GenerationOutcome::NoCanvas => {
                    anyhow::bail!("Nothing selected to reply to");
                }
                GenerationOutcome::EmptyContext => {
                    anyhow::bail!("Note '{}' and its ancestors are empty", args.node);
                }
                other => anyhow::bail!("No reply generated: {other:?}"),
            }
        }
        Commands::Next(args) => {
            let session = open_canvas(&args).await?;
            match generator(&config)?.next_note(Some(&session)).await? {
                Some(id) => println!("{id}"),
                None => anyhow::bail!("Nothing selected to continue from"),
            }
        }
        Commands::Context { note, json } => {
            let session = open_canvas(&note).await?;
            match generator(&config)?.preview_context(Some(&session)).await? {
                Some(window) if !window.is_empty() => print_context(&window, json)?,
                _ => println!("Nothing to send"),
            }
        }
        Commands::Models { remote } => {
            if remote {
                let settings = config.settings();
                let Some(api_key) = settings.api_key else {
                    anyhow::bail!("Please set your API key in the settings");
                };
                let provider = OpenAiProvider::new(Some(&settings.api_url));
                let mut models = provider
                    .list_models(&Credentials::api_key(api_key))
                    .await?;
                models.sort_by(|a, b| a.id.cmp(&b.id));
                for model in models {
                    println!("{}", model.id);
                }
            } else {
                let current = config.model();
                for model in CHAT_MODELS {
                    let marker = if model.name == current { "*" } else { " " };
                    println!(
                        "{marker} {:<20} {:>7} tokens  {}",
                        model.name, model.input_token_limit, model.encoding
                    );
                }
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config.settings())?;
                println!("{json}");
                println!("Config: {}", config_path.display());
                println!(
                    "API key: {}",
                    if config.api_key().is_some() { "set" } else { "not set" }
                );
                let (warnings, errors) = config.validate();
                for warning in warnings {
                    eprintln!("warning: {warning}");
                }
                for error in errors {
                    eprintln!("error: {error}");
                }
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("'{key}' is not set"),
            },
            ConfigAction::Set { key, value } => {
                let mut config = config;
                config.set_path(&key, parse_value(&value))?;
                let (_, errors) = config.validate();
                if !errors.is_empty() {
                    anyhow::bail!("Invalid config: {}", errors.join("; "));
                }
                config.save(&config_path)?;
                println!("Set {key}");
            }
        },
    }

    Ok(())
}
