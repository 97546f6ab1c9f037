mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use bazaar_api::google::{DisabledGoogle, GoogleClient, GoogleVerifier};
use bazaar_api::policy::EmailAllowList;
use bazaar_api::routes::router;
use bazaar_api::state::{AppState, AppStateInner};

use crate::config::{Config, PlaceholderSecret};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar=debug,bazaar_api=debug,bazaar_db=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) if e.downcast_ref::<PlaceholderSecret>().is_some() => {
            eprintln!("FATAL: BAZAAR_JWT_SECRET is unset or still a placeholder.");
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
        Err(e) => return Err(e),
    };

    // Init database
    let db = bazaar_db::Database::open(&config.db_path)?;

    let admin = EmailAllowList::parse(&config.admin_emails);
    if admin.is_empty() {
        warn!("BAZAAR_ADMIN_EMAILS is empty; nobody can approve subscriptions");
    } else {
        info!("{} admin account(s) configured", admin.len());
    }

    let google: Arc<dyn GoogleVerifier> = if config.google_client_id.is_empty() {
        info!("GOOGLE_CLIENT_ID not set; Google sign-in disabled");
        Arc::new(DisabledGoogle)
    } else {
        Arc::new(GoogleClient::new(
            config.google_client_id.clone(),
            config.google_client_secret.clone(),
            config.google_redirect_uri.clone(),
        )?)
    };

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        settings: config.settings(),
        admin: Arc::new(admin),
        google,
    });

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Bazaar server listening on {}", addr);
    info!("GraphQL endpoint at http://{}/graphql", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
