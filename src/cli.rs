use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::config::Config;
use crate::services::{CallbackOutcome, TransactionLifecycle};

#[derive(Parser)]
#[command(name = "payflow-txn")]
#[command(about = "PayFlow transaction service - lifecycle and UPI reconciliation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Transaction management commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Print and validate the configuration
    Config,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Ask the gateway for a PENDING transaction's outcome and apply it
    Reconcile {
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,
    },
    /// Print a transaction as JSON
    Show {
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

pub async fn handle_tx_reconcile(lifecycle: &TransactionLifecycle, tx_id: Uuid) -> anyhow::Result<()> {
    match lifecycle.verify_and_reconcile(tx_id).await? {
        CallbackOutcome::Applied(tx) => {
            tracing::info!(transaction_id = %tx_id, status = %tx.status, "Transaction reconciled");
            println!("✓ Transaction {} is now {}", tx_id, tx.status);
        }
        CallbackOutcome::Unchanged(tx) => {
            println!("Transaction {} unchanged ({})", tx_id, tx.status);
        }
        CallbackOutcome::Ignored { status } => {
            println!("Gateway reports '{}' for {}; still PENDING", status, tx_id);
        }
    }
    Ok(())
}

pub async fn handle_tx_show(lifecycle: &TransactionLifecycle, tx_id: Uuid) -> anyhow::Result<()> {
    let tx = lifecycle.get(tx_id).await?;
    println!("{}", serde_json::to_string_pretty(&tx)?);
    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;
    println!("✓ Database migrations completed");

    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    config.validate()?;

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Redis URL: {}", mask_password(&config.redis_url));
    println!("  UPI Gateway URL: {}", config.upi_gateway_url);
    println!("  UPI Callback URL: {}", config.upi_callback_url);
    println!(
        "  Webhook Signature: {}",
        if config.upi_webhook_secret.is_some() { "required" } else { "off" }
    );
    println!("  Default Currency: {}", config.default_currency);
    match config.reconcile_interval {
        Some(interval) => println!("  Reconcile Interval: {}s", interval.as_secs()),
        None => println!("  Reconcile Interval: disabled"),
    }

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
