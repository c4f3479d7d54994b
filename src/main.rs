use anyhow::Result;
use std::sync::Arc;

mod auth;
mod config;
mod error;
mod middleware;
mod notify;
mod profile;
mod provider;
mod routes;
#[cfg(any(test, feature = "test-utils"))]
mod testing;

use auth::AuthManager;
use notify::TracingNotifier;
use profile::HttpProfileRepository;
use provider::HttpIdentityProvider;

#[tokio::main]
async fn main() -> Result<()> {
    // Check if interactive setup is needed (no .env and missing required values)
    if config::needs_interactive_setup() {
        let interactive_config = config::run_interactive_setup()?;

        // Set environment variables from interactive config so Config::load() can use them
        std::env::set_var("GATEWAY_API_KEY", &interactive_config.gateway_api_key);
        std::env::set_var("EDUVERSE_PROVIDER_URL", &interactive_config.provider_url);
        std::env::set_var("EDUVERSE_PROVIDER_KEY", &interactive_config.provider_api_key);
        std::env::set_var("SERVER_PORT", &interactive_config.server_port);
    }

    // Load configuration first (for log level)
    let config = config::Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("🎓 EduVerse session gateway starting...");
    tracing::info!(
        "Server configured: {}:{}",
        config.server_host,
        config.server_port
    );

    // Identity provider and profile repository clients
    let provider = Arc::new(HttpIdentityProvider::new(
        &config.provider_url,
        &config.provider_api_key,
        Some(config.session_file.clone()),
        config.http_connect_timeout,
        config.http_request_timeout,
    )?);
    let profiles = Arc::new(HttpProfileRepository::new(
        provider.clone(),
        &config.provider_url,
        &config.provider_api_key,
        config.http_connect_timeout,
        config.http_request_timeout,
    )?);
    tracing::info!("✅ Provider clients initialized: {}", config.provider_url);

    // Auth manager: subscribes to provider events and bootstraps any
    // existing session, then applies events for the process lifetime
    let (manager, mut nav) = AuthManager::new(provider, profiles, Arc::new(TracingNotifier));
    let manager = Arc::new(manager);

    let run_task = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.run().await })
    };

    tokio::spawn(async move {
        while let Some(destination) = nav.recv().await {
            tracing::info!(destination = destination.path(), "Navigation intent");
        }
    });

    // Protected content must not be served before bootstrap settles
    let status = manager.session().settled().await;
    tracing::info!("✅ Bootstrap complete: {}", status.label());

    let app_state = routes::AppState {
        gateway_api_key: config.gateway_api_key.clone(),
        manager: manager.clone(),
        session: manager.session(),
    };

    // Build the application with routes and middleware
    let app = build_app(app_state);

    // Bind to configured host and port
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    print_startup_banner(&config);

    // Start server with graceful shutdown
    tracing::info!("🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Tearing down the event loop releases the provider subscription
    run_task.abort();
    tracing::info!("👋 Server shutdown complete");

    Ok(())
}

/// Build the application with all routes and middleware
fn build_app(state: routes::AppState) -> axum::Router {
    use axum::Router;

    // Health check routes (no auth required)
    let health_routes = routes::health_routes();

    // Session routes (gateway key required)
    let session_routes = routes::session_routes(state);

    Router::new()
        .merge(health_routes)
        .merge(session_routes)
        .layer(middleware::cors_layer())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Print startup banner
fn print_startup_banner(config: &config::Config) {
    println!();
    println!("EduVerse Session Gateway");
    println!("  Version:   {}", env!("CARGO_PKG_VERSION"));
    println!(
        "  Server:    http://{}:{}",
        config.server_host, config.server_port
    );
    println!("  Provider:  {}", config.provider_url);
    println!("  Log Level: {}", config.log_level);
    println!();
}

/// Handle graceful shutdown signal
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
