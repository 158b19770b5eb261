use clap::{Parser, Subcommand};
use poem::{listener::TcpListener, middleware::Cors, EndpointExt, Route, Server};
use poem_openapi::OpenApiService;
use std::sync::Arc;
use tasks_api::app::AppContext;
use tasks_api::config::AppConfig;
use tasks_api::database::Database;
use tasks_api::openapi::create_combined_api;
use tasks_api::sync_service::IndexSyncService;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "api-server")]
#[command(about = "Task search API server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server and the search index listener
    Serve,
    /// Run the periodic search index resync
    Sync,
    /// Recreate the search index collection and index every task
    Reindex,
}

fn startup_error(e: anyhow::Error) -> std::io::Error {
    tracing::error!("Startup failed: {:#}", e);
    std::io::Error::other(format!("{:#}", e))
}

async fn setup_app_context() -> Result<AppContext, std::io::Error> {
    let config = AppConfig::from_env().map_err(startup_error)?;

    let database = match Database::new(&config.database_url).await {
        Ok(db) => {
            tracing::info!("Database initialized at {}", config.database_url);
            Arc::new(db)
        }
        Err(e) => {
            tracing::error!(
                "Failed to initialize database at {}: {:#}",
                config.database_url,
                e
            );
            return Err(std::io::Error::other(format!(
                "Database initialization failed: {}",
                e
            )));
        }
    };

    Ok(AppContext::new(config, database))
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let cli = Cli::parse();

    // Load .env file if it exists
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve => serve_command().await,
        Commands::Sync => sync_command().await,
        Commands::Reindex => reindex_command().await,
    }
}

async fn serve_command() -> Result<(), std::io::Error> {
    let ctx = setup_app_context().await?;
    let config = &ctx.config;
    let addr = format!("0.0.0.0:{}", config.port);

    let search_service = Arc::new(ctx.search_service().map_err(startup_error)?);
    let background = ctx.spawn_background();

    let api_service = OpenApiService::new(create_combined_api(), "Tasks API", env!("CARGO_PKG_VERSION"))
        .server("/api/v1");
    let swagger_ui = api_service.swagger_ui();

    let app = Route::new()
        .nest("/api/v1", api_service)
        .nest("/api/v1/docs", swagger_ui)
        .data(ctx.database.clone())
        .data(ctx.tasks.clone())
        .data(search_service)
        .with(Cors::new());

    tracing::info!(
        "Starting Tasks API server on {} with {:?} search",
        addr,
        config.search_backend
    );
    let server_result = Server::new(TcpListener::bind(&addr)).run(app).await;

    for task in background {
        task.abort();
    }
    server_result
}

async fn sync_command() -> Result<(), std::io::Error> {
    let ctx = setup_app_context().await?;
    let sync_service = IndexSyncService::new(
        ctx.database.clone(),
        ctx.require_index().map_err(startup_error)?,
        &ctx.config.index_collection,
        ctx.config.index_sync_interval_secs,
    );

    tracing::info!(
        "Running index sync with {}s interval",
        ctx.config.index_sync_interval_secs
    );
    sync_service.run().await;

    Ok(())
}

async fn reindex_command() -> Result<(), std::io::Error> {
    let ctx = setup_app_context().await?;
    let sync_service = IndexSyncService::new(
        ctx.database.clone(),
        ctx.require_index().map_err(startup_error)?,
        &ctx.config.index_collection,
        ctx.config.index_sync_interval_secs,
    );

    let indexed = sync_service.reindex().await.map_err(startup_error)?;
    tracing::info!("Reindexed {} tasks", indexed);
    Ok(())
}
