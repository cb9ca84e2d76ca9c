//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, LocalPdfStorage, LogMailer, SmtpMailer},
    config::Config,
    error::ApiError,
    web::{build_router, state::AppState},
};
use review_core::memory::MemoryDb;
use review_core::{DatabaseService, NotificationService, ReviewWorkflow, TokenCodec};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    let db: Arc<dyn DatabaseService> = match &config.database_url {
        Some(url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        None => {
            warn!("DATABASE_URL is not set; requests are kept in memory and lost on restart");
            Arc::new(MemoryDb::new())
        }
    };

    // --- 3. Initialize Service Adapters ---
    let pdfs = Arc::new(LocalPdfStorage::new(config.pdf_storage_path.clone()));
    info!("Storing PDFs under {}", config.pdf_storage_path.display());

    let notifier: Arc<dyn NotificationService> = match &config.smtp {
        Some(smtp) => {
            info!("Sending notifications through {}:{}", smtp.host, smtp.port);
            Arc::new(SmtpMailer::new(smtp, &config.email_sender)?)
        }
        None => {
            warn!("SMTP_HOST is not set; notifications are only logged");
            Arc::new(LogMailer)
        }
    };

    let tokens = match &config.token_secret {
        Some(secret) => TokenCodec::with_secret(secret.as_bytes())?,
        None => TokenCodec::legacy(),
    };
    if !tokens.is_keyed() {
        warn!("TOKEN_SECRET is not set; access tokens are plain SHA-256 digests of the email");
    }

    // --- 4. Build the Shared AppState ---
    let workflow = ReviewWorkflow::new(db, pdfs, notifier, tokens, config.frontend_url.clone());
    let app_state = Arc::new(AppState {
        workflow: workflow.clone(),
        config: config.clone(),
    });

    // --- 5. Create the Web Router ---
    let app = build_router(app_state)?;

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
            }
            shutdown.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Server stopped; delivering pending notifications");
    workflow.flush_notifications().await;
    info!("Shutdown complete");
    Ok(())
}
