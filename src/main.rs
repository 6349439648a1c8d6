use anyhow::Context;
use axum::http::HeaderValue;
use clap::Parser;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use payflow_txn::adapters::PostgresTransactionRepository;
use payflow_txn::cli::{self, Cli, Commands, DbCommands, TxCommands};
use payflow_txn::config::{Config, LogFormat};
use payflow_txn::events::{BroadcastEventPublisher, FanoutPublisher, RedisEventPublisher};
use payflow_txn::gateway::UpiGatewayClient;
use payflow_txn::health::{HealthService, PostgresChecker, RedisChecker};
use payflow_txn::ports::EventPublisher;
use payflow_txn::services::{Reconciler, TransactionLifecycle};
use payflow_txn::{create_app, db, AppState};

struct Services {
    pool: PgPool,
    lifecycle: TransactionLifecycle,
    feed: BroadcastEventPublisher,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Tx(command) => {
            let services = build_services(&config).await?;
            match command {
                TxCommands::Reconcile { tx_id } => {
                    cli::handle_tx_reconcile(&services.lifecycle, tx_id).await
                }
                TxCommands::Show { tx_id } => cli::handle_tx_show(&services.lifecycle, tx_id).await,
            }
        }
        Commands::Config => cli::handle_config_validate(&config),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn build_services(config: &Config) -> anyhow::Result<Services> {
    let pool = db::create_pool(config)
        .await
        .context("failed to connect to Postgres")?;

    let feed = BroadcastEventPublisher::default();
    let redis = RedisEventPublisher::new(
        &config.redis_url,
        config.event_stream_prefix.clone(),
        config.publish_timeout,
    )?;
    let publisher = FanoutPublisher::new(vec![
        Arc::new(redis) as Arc<dyn EventPublisher>,
        Arc::new(feed.clone()) as Arc<dyn EventPublisher>,
    ]);

    let gateway = UpiGatewayClient::new(config.upi_gateway_url.clone(), config.gateway_timeout);
    tracing::info!(url = %gateway.base_url(), "UPI gateway client initialized");

    let lifecycle = TransactionLifecycle::new(
        Arc::new(PostgresTransactionRepository::new(pool.clone())),
        Arc::new(publisher),
        Arc::new(gateway),
        config.upi_callback_url.clone(),
        config.default_currency.clone(),
    );

    Ok(Services {
        pool,
        lifecycle,
        feed,
    })
}

async fn serve(config: Config) -> anyhow::Result<()> {
    config.validate()?;
    let services = build_services(&config).await?;
    db::run_migrations(&services.pool).await?;

    if let Some(interval) = config.reconcile_interval {
        Reconciler::new(
            services.lifecycle.clone(),
            interval,
            config.reconcile_stale_after,
        )
        .start();
    }

    let health = HealthService::builder()
        .critical("postgres", Arc::new(PostgresChecker::new(services.pool.clone())))
        .optional("redis", Arc::new(RedisChecker::new(config.redis_url.clone())))
        .build();

    let state = AppState {
        lifecycle: services.lifecycle,
        feed: services.feed,
        health,
        webhook_secret: config.upi_webhook_secret.clone(),
    };
    let app = create_app(state).layer(cors_layer(&config)?);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let Some(origins) = &config.cors_allowed_origins else {
        return Ok(CorsLayer::permissive());
    };

    let origins = origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("invalid CORS origin '{}'", origin))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
