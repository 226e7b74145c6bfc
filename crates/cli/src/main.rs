//! `rusty-flow` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    — start the API server.
//! - `migrate`  — run pending database migrations.
//! - `validate` — validate a workflow definition JSON file.
//! - `run`      — execute a definition once against an in-memory engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use api::AppState;
use db::PoolSettings;
use engine::{
    DefinitionStore, ExecutionStatus, GraphValidator, InMemoryStore, PgStore, ServerConfig, StartRequest,
    WorkflowDefinition, WorkflowEngine,
};
use nodes::{ActionRegistry, NodeExecutorRegistry};

#[derive(Parser)]
#[command(name = "rusty-flow", about = "Workflow execution engine", version)]
struct Cli {
    /// TOML configuration file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "rusty-flow.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        /// Overrides `bind` from the config file.
        #[arg(long)]
        bind: Option<String>,
        /// Overrides `database_url`; without one the store is in-memory.
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Execute a workflow definition once and print the final execution.
    Run {
        /// Path to the workflow JSON file.
        path: PathBuf,
        /// JSON payload that seeds the execution variables.
        #[arg(long, default_value = "{}")]
        payload: String,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = ServerConfig::load(&cli.config)
        .with_context(|| format!("cannot load config {}", cli.config.display()))?;

    match cli.command {
        Command::Serve { bind, database_url } => serve(config, bind, database_url).await,
        Command::Migrate { database_url } => migrate(&database_url).await,
        Command::Validate { path } => validate(&path),
        Command::Run { path, payload } => run(config, &path, &payload).await,
    }
}

async fn serve(config: ServerConfig, bind: Option<String>, database_url: Option<String>) -> anyhow::Result<()> {
    let store: Arc<dyn DefinitionStore> = match database_url.or(config.database_url.clone()) {
        Some(url) => {
            let pool = db::pool::connect(&PoolSettings::new(url, config.max_db_connections))
                .await
                .context("failed to connect to database")?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            warn!("No database configured; definitions and executions live in memory");
            Arc::new(InMemoryStore::new())
        }
    };

    let engine = WorkflowEngine::new(config.engine.clone(), store, Arc::new(ActionRegistry::with_builtins()));
    engine.restore_schedules().await?;

    let bind = bind.unwrap_or(config.bind);
    info!("Starting API server on {bind}");
    api::serve(&bind, AppState::new(engine.clone()), async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    })
    .await
    .context("API server failed")?;

    engine.shutdown();
    Ok(())
}

async fn migrate(database_url: &str) -> anyhow::Result<()> {
    info!("Running migrations");
    let pool = db::pool::connect(&PoolSettings::new(database_url, 2))
        .await
        .context("failed to connect to database")?;
    let applied = db::pool::migrate(&pool).await.context("migration failed")?;
    info!("Schema is at migration {applied}");
    Ok(())
}

fn read_definition(path: &Path) -> anyhow::Result<WorkflowDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid workflow JSON in {}", path.display()))
}

fn validate(path: &Path) -> anyhow::Result<()> {
    let definition = read_definition(path)?;
    let actions = Arc::new(ActionRegistry::with_builtins());
    let validator = GraphValidator::new(Arc::new(NodeExecutorRegistry::with_builtins(actions)));

    match validator.validate(Arc::new(definition)) {
        Ok(graph) => {
            println!(
                "✅ Workflow '{}' is valid ({} nodes, {} edges).",
                graph.definition().name,
                graph.nodes().len(),
                graph.edges().len()
            );
            Ok(())
        }
        Err(err) => {
            eprintln!("❌ Validation failed:");
            for violation in &err.violations {
                eprintln!("  - {violation}");
            }
            bail!("{} violation(s) in {}", err.violations.len(), path.display())
        }
    }
}

async fn run(config: ServerConfig, path: &Path, payload: &str) -> anyhow::Result<()> {
    let definition = read_definition(path)?;
    let payload = serde_json::from_str(payload).context("--payload is not valid JSON")?;

    let engine = WorkflowEngine::in_memory(config.engine);
    let definition = engine.publish(definition).await?;
    let started = engine.start(StartRequest::manual(definition.id, payload)).await?;
    let execution = engine.wait(started.id).await?;

    println!("{}", serde_json::to_string_pretty(&execution)?);
    if execution.status != ExecutionStatus::Completed {
        bail!("execution ended {}", execution.status);
    }
    Ok(())
}
