use anyhow::Context;
use clap::{Parser, Subcommand};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use keyhaus::config::Config;
use keyhaus::db::{self, AppState, Tables};
use keyhaus::email::EmailService;
use keyhaus::handlers;

#[derive(Parser)]
#[command(name = "keyhaus", about = "License key administration service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create the database schema and exit
    InitDb,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let tables = Tables {
        license_keys: config.license_keys_table.clone(),
        key_history: config.key_history_table.clone(),
    };

    let pool = db::create_pool(&config.database_path)
        .with_context(|| format!("failed to open database at {}", config.database_path))?;
    {
        let conn = pool.get()?;
        db::init_db(&conn, &tables)?;
    }

    if let Some(Command::InitDb) = cli.command {
        tracing::info!(path = %config.database_path, "database initialized");
        return Ok(());
    }

    if config.admin_token.is_none() && !config.dev_mode {
        tracing::warn!("ADMIN_TOKEN is not set; all admin routes will reject requests");
    }
    if config.email_webhook_url.is_none() {
        tracing::warn!("EMAIL_WEBHOOK_URL is not set; outbound email is disabled");
    }

    let state = AppState {
        db: pool,
        tables,
        email: EmailService::new(config.email_webhook_url.clone(), config.from_email.clone()),
        admin_token: config.admin_token.clone(),
        dev_mode: config.dev_mode,
    };

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.addr();
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
