use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use game_core::WordList;
use game_persistence::{
    connection::connect_and_migrate,
    repositories::{RecordRepository, UserRepository},
};
use game_server::{
    auth::AuthService, config::Config, create_routes, game_manager::GameManager, llm::GeminiClient,
};

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    info!("Starting Twenty Questions server...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("Loading words from {}", config.word_list_path);
    let word_list = match WordList::load(&config.word_list_path) {
        Ok(word_list) => Arc::new(word_list),
        Err(e) => {
            tracing::error!("Failed to load word list '{}': {:#}", config.word_list_path, e);
            tracing::error!("Set WORD_LIST_PATH to a file with one word per line.");
            std::process::exit(1);
        }
    };

    // Initialize database connection and run migrations
    let db = match connect_and_migrate(&config.database_url).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to connect to database and run migrations: {}", e);
            std::process::exit(1);
        }
    };
    let user_repository = Arc::new(UserRepository::new(db.clone()));
    let record_repository = Arc::new(RecordRepository::new(db));

    if config.google_api_key.is_empty() {
        tracing::warn!("GOOGLE_API_KEY is not set; game moves will fail");
    }
    let provider = Arc::new(
        GeminiClient::new(config.google_api_key.clone(), config.gemini_model.clone())
            .with_base_url(config.gemini_base_url.clone()),
    );

    let game_manager = Arc::new(GameManager::new(
        word_list,
        provider,
        record_repository.clone(),
    ));
    let auth_service = Arc::new(AuthService::from_config(&config));

    let routes = create_routes(
        PathBuf::from(&config.static_dir),
        game_manager.clone(),
        auth_service,
        user_repository,
        record_repository,
    );

    // Start cleanup task
    let cleanup_game_manager = game_manager.clone();
    let session_timeout = config.game_session_timeout();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            let retired = cleanup_game_manager.cleanup_idle_sessions(session_timeout);
            if retired > 0 {
                info!(
                    "Retired {} idle game sessions, {} still active",
                    retired,
                    cleanup_game_manager.active_sessions()
                );
            }
        }
    });

    info!("Server starting on {}:{}", config.host, config.port);

    let (addr, server) = match warp::serve(routes)
        .try_bind_with_graceful_shutdown((config.host, config.port), shutdown_signal())
    {
        Ok(bound) => bound,
        Err(e) => {
            tracing::error!("Failed to bind {}:{}: {}", config.host, config.port, e);
            std::process::exit(1);
        }
    };

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );
    server.await;
    info!("Server shutdown complete.");
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use signal::unix::{SignalKind, signal as unix_signal};

        match unix_signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {
                        info!("Received SIGINT, shutting down gracefully...");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down gracefully...");
                    }
                }
                return;
            }
            Err(e) => tracing::warn!("Cannot listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down gracefully...");
}
