use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use orchestrator::files::PAGECRAFT_DIR;
use orchestrator::FilePersister;
use pagecraft_core::{SessionMetadata, SessionSnapshot};
use server::config::{PagecraftConfig, PersistenceBackend, CONFIG_FILE};
use server::{create_router, state::AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pagecraft")]
#[command(about = "Section-by-section landing page generation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override the port from .pagecraft/config.toml
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    Init {
        #[arg(long, value_enum, default_value_t = BackendArg::File)]
        backend: BackendArg,
    },
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    File,
    Sqlite,
}

impl From<BackendArg> for PersistenceBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::File => PersistenceBackend::File,
            BackendArg::Sqlite => PersistenceBackend::Sqlite,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init { backend }) => init_project(backend.into()).await,
        Some(Commands::Serve { port }) => serve(port.or(cli.port)).await,
        Some(Commands::Status) => status().await,
        None => serve(cli.port).await,
    }
}

async fn init_project(backend: PersistenceBackend) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config_path = PagecraftConfig::path(&cwd);

    if config_path.exists() {
        println!("Project already initialized at {}", config_path.display());
        return Ok(());
    }

    println!("Initializing Pagecraft in {}", cwd.display());

    let mut config = PagecraftConfig::default();
    config.persistence.backend = backend;
    config
        .write(&cwd)
        .await
        .context("Failed to write config")?;

    FilePersister::new(&cwd)
        .ensure_directories()
        .await
        .context("Failed to create sections directory")?;

    if backend == PersistenceBackend::Sqlite {
        let pool = db::create_pool(&config.database_url(&cwd)).await?;
        db::run_migrations(&pool).await?;
    }

    println!();
    println!("Created:");
    println!("  {}/", PAGECRAFT_DIR);
    println!("  ├── {}", CONFIG_FILE);
    if backend == PersistenceBackend::Sqlite {
        println!("  ├── pagecraft.db");
    }
    println!("  └── sections/");
    println!();
    println!("Next steps:");
    println!(
        "  1. Export {} with your OpenRouter key",
        config.generator.api_key_env
    );
    println!("  2. Run 'pagecraft serve' to start the server");

    Ok(())
}

async fn serve(port: Option<u16>) -> Result<()> {
    init_tracing();

    let cwd = std::env::current_dir()?;
    if !PagecraftConfig::path(&cwd).exists() {
        println!("No {} directory found.", PAGECRAFT_DIR);
        println!("Run 'pagecraft init' first, or using default configuration.");
        println!();
    }

    let config = PagecraftConfig::read(&cwd).await;
    let port = port.unwrap_or(config.server.port);

    let state = AppState::from_config(&config, &cwd).await?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;

    println!();
    println!("Pagecraft - {}", project_label(&cwd));
    println!("════════════════════════════════════════");
    println!();
    println!("  API Server:  http://localhost:{}", port);
    println!("  OpenAPI:     http://localhost:{}/api/openapi.json", port);
    println!("  Events:      http://localhost:{}/api/events", port);
    println!("  Model:       {}", config.generator.model);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

async fn status() -> Result<()> {
    let cwd = std::env::current_dir()?;

    if !PagecraftConfig::path(&cwd).exists() {
        println!("Not a Pagecraft project.");
        println!("Run 'pagecraft init' to initialize.");
        return Ok(());
    }

    let config = PagecraftConfig::read(&cwd).await;

    println!();
    println!("Project: {}", project_label(&cwd));
    println!("Path:    {}", cwd.display());
    println!(
        "Backend: {}",
        match config.persistence.backend {
            PersistenceBackend::File => "file",
            PersistenceBackend::Sqlite => "sqlite",
        }
    );
    println!();

    match fetch_session(config.server.port).await {
        Some(snapshot) => print_session(&snapshot),
        None => println!("No active session (server not running or idle)."),
    }
    println!();

    let projects = finalized_projects(&config, &cwd).await?;
    if projects.is_empty() {
        println!("No finalized projects yet.");
    } else {
        println!("Finalized projects ({}):", projects.len());
        for project in &projects {
            let approved = project.approved_sections().count();
            println!(
                "  ● {} [{}/{} sections] {}",
                project.title,
                approved,
                project.sections.len(),
                project.finalized_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    println!();

    Ok(())
}

async fn fetch_session(port: u16) -> Option<SessionSnapshot> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .ok()?;
    let response = client
        .get(format!("http://localhost:{}/api/session", port))
        .send()
        .await
        .ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.json().await.ok()
}

fn print_session(snapshot: &SessionSnapshot) {
    println!(
        "Session {} ({}, {:.0}% approved)",
        snapshot.session_id, snapshot.phase, snapshot.progress
    );
    for (index, section) in snapshot.sections.iter().enumerate() {
        let status = section.status.as_str();
        let status_icon = match status {
            "pending" => "○",
            "generating" => "◐",
            "awaiting_approval" => "◕",
            "approved" => "●",
            "rejected" => "✕",
            _ => "?",
        };
        let marker = if index == snapshot.cursor { "→" } else { " " };
        println!("  {} {} [{}] {}", marker, status_icon, status, section.name);
    }
}

async fn finalized_projects(config: &PagecraftConfig, cwd: &Path) -> Result<Vec<SessionMetadata>> {
    match config.persistence.backend {
        PersistenceBackend::File => Ok(FilePersister::new(cwd)
            .read_project()
            .await?
            .into_iter()
            .collect()),
        PersistenceBackend::Sqlite => {
            let pool = db::create_pool(&config.database_url(cwd)).await?;
            db::run_migrations(&pool).await?;
            Ok(db::ProjectRepository::new(pool).find_all().await?)
        }
    }
}

fn project_label(cwd: &Path) -> String {
    cwd.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("my-project")
        .to_string()
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagecraft=info,server=info,orchestrator=info,tower_http=info".into()),
        )
        .init();
}
