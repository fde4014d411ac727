//! cubit-connect - transcript to task feed, from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cubit_connect::credentials::CredentialStore;
use cubit_connect::llm::{GeminiClient, LlmError, RateGate};
use cubit_connect::storage::FileBlobStore;
use cubit_connect::{Config, ExtractionClient, Pipeline, TaskId, TaskStore};

#[derive(Parser, Debug)]
#[command(name = "cubit-connect")]
#[command(about = "Extract a task feed from a video transcript")]
#[command(version)]
struct Args {
    /// Directory holding the saved project and API key
    #[arg(long, env = "CUBIT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Gemini model identifier
    #[arg(long, env = "CUBIT_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate and save a Gemini API key
    SetKey { key: String },
    /// Analyze a WebVTT transcript and add its tasks to the feed
    Analyze { file: PathBuf },
    /// Generate sub-steps for a task
    Cubit { task_id: String },
    /// Print the task feed
    List,
    /// Remove a task
    Delete { task_id: String },
    /// Write the project as JSON to a file, or stdout
    Export { file: Option<PathBuf> },
    /// Replace the feed with tasks from an exported JSON file
    Import { file: PathBuf },
    /// Clear all tasks, keep the API key
    Reset,
    /// Clear all tasks and the API key
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cubit_connect=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = Config::from_env().context("Invalid configuration")?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(model) = args.model {
        config.model = model;
    }
    info!("Data directory: {}", config.data_dir.display());

    let storage = Arc::new(FileBlobStore::new(&config.data_dir));
    let credentials = CredentialStore::new(storage.clone());
    let store = Arc::new(TaskStore::new(storage));
    store.load().await;

    let model_client = GeminiClient::with_timeout(&config.api_base, config.http_timeout)
        .context("Failed to build HTTP client")?;
    let extraction = ExtractionClient::with_rate_gate(
        Arc::new(model_client),
        Arc::new(RateGate::new(config.min_call_interval)),
    );

    match args.command {
        Command::SetKey { key } => {
            if let Err(e) = extraction.validate_credential(&key, &config.model).await {
                report_hint(e.llm_error());
                return Err(anyhow::Error::new(e)
                    .context("Invalid API Key or Network Error. Please check your key."));
            }
            credentials.set(&key).await.context("Failed to save API key")?;
            println!("API key saved.");
        }
        Command::Analyze { file } => {
            let credential = require_credential(&credentials).await?;
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let pipeline = Pipeline::new(extraction, store.clone());
            let tasks = match pipeline
                .ingest_transcript(&credential, &raw, &config.model)
                .await
            {
                Ok(tasks) => tasks,
                Err(e) => {
                    report_hint(e.llm_error());
                    return Err(e.into());
                }
            };
            for task in &tasks {
                println!("{}  [{}] {}", task.id, task.display_time(), task.task_name);
            }
            println!("{} tasks added.", tasks.len());
        }
        Command::Cubit { task_id } => {
            let credential = require_credential(&credentials).await?;
            let pipeline = Pipeline::new(extraction, store.clone());
            let steps = pipeline
                .cubit(&credential, &TaskId::from(task_id), &config.model)
                .await?;
            for (i, step) in steps.iter().enumerate() {
                println!("{}. {}", i + 1, step);
            }
        }
        Command::List => {
            for task in store.tasks() {
                println!("{}  [{}] {}", task.id, task.display_time(), task.task_name);
                println!("    {}", task.description);
                if let Some(steps) = &task.sub_steps {
                    for (i, step) in steps.iter().enumerate() {
                        println!("    {}. {}", i + 1, step);
                    }
                }
            }
        }
        Command::Delete { task_id } => {
            store.delete(&TaskId::from(task_id)).await?;
        }
        Command::Export { file } => {
            let json = store.export_json()?;
            match file {
                Some(path) => tokio::fs::write(&path, json)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{}", json),
            }
        }
        Command::Import { file } => {
            let json = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let count = store.import_json(&json).await?;
            println!("{} tasks imported.", count);
        }
        Command::Reset => {
            store.reset().await?;
            println!("Project cleared.");
        }
        Command::Logout => {
            store.full_logout(&credentials).await?;
            println!("Project and API key cleared.");
        }
    }

    Ok(())
}

fn report_hint(err: Option<&LlmError>) {
    if let Some(hint) = err.and_then(LlmError::hint) {
        eprintln!("{}", hint);
    }
}

async fn require_credential(credentials: &CredentialStore) -> Result<String> {
    credentials
        .load()
        .await
        .context("No API key set. Run `cubit-connect set-key <KEY>` or set GEMINI_API_KEY.")
}
