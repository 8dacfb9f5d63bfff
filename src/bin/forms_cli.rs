//! Forms Command Line Interface
//!
//! Inspect templates offline or check task progress against a live backend.
//!
//! # Usage
//!
//! ```bash
//! # Sections, field kinds, and completion for local files
//! forms_cli inspect --template kyb.yaml --fields kyb_fields.json --answers saved.json
//!
//! # Progress of a task on the backend
//! OB_FORMS_BACKEND_URL=http://localhost:5000 forms_cli status --task-type kyb --task-id 42
//!
//! # Clear every answer of a task
//! forms_cli clear --task-type ky3p --task-id 42
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ob_forms::types::{FieldDefinition, FormData, TaskId, Template};
use ob_forms::{
    FormBackend, FormController, FormEngineConfig, FormServiceRegistry, HttpBackend,
    InMemoryBackend, InitRequest, InitializationCoordinator,
};

#[derive(Parser)]
#[command(name = "forms_cli")]
#[command(version = "0.1.0")]
#[command(about = "Inspect questionnaire templates and task progress")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML engine configuration (environment overrides still apply)
    #[arg(long, global = true, env = "OB_FORMS_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a template and field definitions from local files
    Inspect {
        /// Template file (YAML or JSON)
        #[arg(long)]
        template: PathBuf,

        /// Field definitions (JSON array)
        #[arg(long)]
        fields: PathBuf,

        /// Saved answers (JSON object)
        #[arg(long)]
        answers: Option<PathBuf>,
    },

    /// Initialize a task against the backend and report completion
    Status {
        #[arg(long)]
        task_type: String,

        #[arg(long)]
        task_id: i64,
    },

    /// Clear every answer of a task on the backend
    Clear {
        #[arg(long)]
        task_type: String,

        #[arg(long)]
        task_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = FormEngineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect {
            template,
            fields,
            answers,
        } => {
            let template: Template = read_structured(&template)?;
            let definitions: Vec<FieldDefinition> = read_structured(&fields)?;
            let backend = Arc::new(InMemoryBackend::new());

            let task_id = TaskId(0);
            if let Some(path) = answers {
                let saved: FormData = read_structured(&path)?;
                backend.insert_progress(task_id, saved);
            }
            let task_type = template.task_type.clone();
            backend.insert_template(template, definitions);

            let controller = open(backend, &config, &task_type, task_id).await?;
            print_controller(&controller, cli.format)?;
        }
        Commands::Status { task_type, task_id } => {
            let backend = http_backend(&config)?;
            let controller = open(backend, &config, &task_type, TaskId(task_id)).await?;
            print_controller(&controller, cli.format)?;
        }
        Commands::Clear { task_type, task_id } => {
            let backend = http_backend(&config)?;
            let mut controller = open(backend, &config, &task_type, TaskId(task_id)).await?;
            let ack = controller.clear_fields().await?;
            println!("Cleared {} answer(s) for task {}", ack.cleared, ack.task_id);
        }
    }

    Ok(())
}

fn http_backend(config: &FormEngineConfig) -> Result<Arc<dyn FormBackend>> {
    let url = config
        .backend_url
        .as_deref()
        .ok_or_else(|| anyhow!("OB_FORMS_BACKEND_URL must be set"))?;
    Ok(Arc::new(HttpBackend::new(url, config.http_timeout())?))
}

async fn open(
    backend: Arc<dyn FormBackend>,
    config: &FormEngineConfig,
    task_type: &str,
    task_id: TaskId,
) -> Result<FormController> {
    let coordinator = InitializationCoordinator::new(
        backend.clone(),
        Arc::new(FormServiceRegistry::with_defaults()),
        config.clone(),
    );
    let session = coordinator
        .initialize(InitRequest::new(task_type, Some(task_id)))
        .await?
        .into_session()
        .ok_or_else(|| anyhow!("initialization was superseded"))?;

    let mut controller = FormController::new(session, backend, config)?;
    controller.start(false);
    Ok(controller)
}

fn read_structured<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        serde_yaml::from_str(&raw).with_context(|| format!("Invalid YAML in {}", path.display()))
    } else {
        serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
    }
}

fn print_controller(controller: &FormController, format: OutputFormat) -> Result<()> {
    let report = controller.report();

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let session = controller.session();
    println!(
        "{} (template {}) - {}% complete",
        session.template.name, session.template.id, report.overall_progress
    );
    for (section, progress) in controller.sections().iter().zip(&report.sections) {
        println!(
            "\n[{:?}] {} ({}/{} required)",
            progress.status, section.title, progress.required_answered, progress.required_total
        );
        for field in &section.fields {
            let marker = if field.required { "*" } else { " " };
            println!(
                "  {} {:<32} {:<12} {}",
                marker,
                field.key,
                controller.kind(&field.key).as_str(),
                field.label
            );
        }
    }
    println!("\nActive section: {}", controller.active_section());
    Ok(())
}
