mod config;
mod error;
mod handlers;
mod middleware;
mod models;
mod repos;
mod services;
mod state;
mod stores;
#[cfg(test)]
mod test_utils;

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{Router, http};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::Config,
    models::{AccountStatus, NewAccount, Role},
    repos::{AccountRepo, PgAccountRepo, PgBookRepo, PgPurchaseLedger, PgStatusRepo, Repos},
    services::{EmailSenderImpl, passwords::hash_password},
    state::AppState,
    stores::{RedisCredentialStore, Stores},
};

#[derive(Parser)]
#[command(name = "bookstore-api")]
#[command(about = "Bookstore API server")]
struct Args {
    /// Run database migrations and exit
    #[arg(long)]
    migrate: bool,

    /// Create the platform account from BOOKSTORE_ADMIN_EMAIL / BOOKSTORE_ADMIN_PASSWORD and exit
    #[arg(long)]
    seed_admin: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider before any TLS operations
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let args = Args::parse();
    let config = envy::prefixed("BOOKSTORE_").from_env::<Config>()?;

    // Initialize Sentry for error tracking (must be done early, guard must stay alive)
    let _sentry_guard = config.sentry_dsn.as_ref().map(|dsn| {
        sentry::init((
            dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: Some(config.env.clone().into()),
                ..Default::default()
            },
        ))
    });

    // Set up tracing: JSON in production, human-readable otherwise
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }

    let database = PgPoolOptions::new()
        .max_connections(25)
        .connect(&config.database_url)
        .await?;

    // Run migrations via init container only (--migrate flag)
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&database).await?;
        tracing::info!("Migrations complete");
        return Ok(());
    }

    let accounts = Arc::new(PgAccountRepo::new(database.clone()));

    if args.seed_admin {
        seed_admin(accounts.as_ref(), &config).await?;
        return Ok(());
    }

    let redis = redis::Client::open(config.redis_url.as_str())?;
    let email = EmailSenderImpl::new(config.resend_api_key.clone(), config.smtp_url.clone())?;

    let repos = Repos {
        accounts,
        books: Arc::new(PgBookRepo::new(database.clone())),
        ledger: Arc::new(PgPurchaseLedger::new(database.clone())),
        status: Arc::new(PgStatusRepo::new(database)),
    };

    let stores = Stores {
        credentials: Arc::new(RedisCredentialStore::new(redis)),
    };

    let state = AppState::new(config.clone(), repos, stores, Arc::new(email))?;

    // Request ID header name
    let x_request_id = http::HeaderName::from_static("x-request-id");

    let api = Router::new()
        .nest("/health", handlers::health::router())
        .nest("/auth", handlers::auth::router())
        .nest("/books", handlers::books::router())
        .nest("/admin", handlers::admin::router())
        .nest("/transactions", handlers::transactions::router());

    let app = Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        // Request ID: generate UUID, include in logs, return in response
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &http::Request<axum::body::Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            },
        ))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1MB limit

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");

    Ok(())
}

/// Create the platform account that receives purchase payments. No-op when
/// one already exists.
async fn seed_admin(accounts: &dyn AccountRepo, config: &Config) -> Result<()> {
    if let Some(existing) = accounts.find_platform().await? {
        tracing::info!(user_id = existing.id, "platform account already present");
        return Ok(());
    }

    let email = config
        .admin_email
        .clone()
        .context("BOOKSTORE_ADMIN_EMAIL must be set to seed the platform account")?;
    let password = config
        .admin_password
        .as_deref()
        .context("BOOKSTORE_ADMIN_PASSWORD must be set to seed the platform account")?;

    let account = accounts
        .create(NewAccount {
            first_name: "Platform".to_string(),
            last_name: "Account".to_string(),
            email,
            phone_number: "0000000000".to_string(),
            password_hash: hash_password(password)?,
            role: Role::Admin,
            status: AccountStatus::Active,
            activation_code: None,
        })
        .await?;

    tracing::info!(user_id = account.id, "platform account created");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::MockAccountRepo;
    use crate::test_utils::{mock_platform, test_config};

    #[tokio::test]
    async fn seed_admin_skips_when_platform_exists() {
        let mut accounts = MockAccountRepo::new();
        accounts
            .expect_find_platform()
            .returning(|| Ok(Some(mock_platform(1, 0))));
        accounts.expect_create().never();

        seed_admin(&accounts, &test_config()).await.unwrap();
    }

    #[tokio::test]
    async fn seed_admin_creates_active_admin() {
        let mut accounts = MockAccountRepo::new();
        accounts.expect_find_platform().returning(|| Ok(None));
        accounts
            .expect_create()
            .withf(|new| {
                new.role == Role::Admin
                    && new.status == AccountStatus::Active
                    && new.email == "admin@example.com"
                    && new.password_hash.starts_with("$argon2")
            })
            .times(1)
            .returning(|_| Ok(mock_platform(1, 0)));

        let mut config = test_config();
        config.admin_email = Some("admin@example.com".to_string());
        config.admin_password = Some("platform-password".to_string());

        seed_admin(&accounts, &config).await.unwrap();
    }

    #[tokio::test]
    async fn seed_admin_requires_credentials() {
        let mut accounts = MockAccountRepo::new();
        accounts.expect_find_platform().returning(|| Ok(None));
        accounts.expect_create().never();

        assert!(seed_admin(&accounts, &test_config()).await.is_err());
    }
}
