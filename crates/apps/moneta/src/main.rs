//! Moneta - personal finance sync driver
//!
//! Thin CLI over the ledger service: link a Gmail account, trigger the
//! four-phase sync, watch its progress, and list what it extracted.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use log::{error, warn};

use ledger::{
    ClassifierConfig, GoogleCredentials, HttpExtractor, MailAccount, SqliteLedgerStore,
    SyncService, SyncSettings,
};

const USAGE: &str = "usage: moneta <command>

commands:
  connect <user> <email> <tokens.json>   link a Gmail account
  sync <user>                            trigger a sync and watch progress
  status <user>                          print the current sync status
  transactions <user> [limit]            list extracted transactions";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    config::init().context("Failed to initialize config directory")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let service = build_service()?;

    match args.first().map(String::as_str) {
        Some("connect") if args.len() == 4 => connect(&service, &args[1], &args[2], &args[3]),
        Some("sync") if args.len() == 2 => sync(&service, &args[1]),
        Some("status") if args.len() == 2 => status(&service, &args[1]),
        Some("transactions") if args.len() >= 2 => {
            let limit = args
                .get(2)
                .map(|s| s.parse().context("limit must be a number"))
                .transpose()?
                .unwrap_or(50);
            transactions(&service, &args[1], limit)
        }
        _ => bail!("{}", USAGE),
    }
}

fn build_service() -> Result<SyncService> {
    let db_path = config::data_path("ledger.db").context("Could not determine data directory")?;
    let store = Arc::new(SqliteLedgerStore::new(&db_path)?);

    let classifier = ClassifierConfig::load()
        .context("Classifier config missing (classifier.json or CLASSIFIER_* env vars)")?;
    let extractor = Arc::new(HttpExtractor::new(&classifier));

    let credentials = match GoogleCredentials::load() {
        Ok(creds) => Some(creds),
        Err(e) => {
            warn!("Google OAuth credentials unavailable ({}); token refresh disabled", e);
            None
        }
    };

    Ok(SyncService::new(
        store,
        extractor,
        credentials,
        SyncSettings::load(),
    ))
}

fn connect(service: &SyncService, user_id: &str, email: &str, tokens_path: &str) -> Result<()> {
    let raw = std::fs::read_to_string(tokens_path)
        .with_context(|| format!("Failed to read {}", tokens_path))?;
    let tokens: serde_json::Value = serde_json::from_str(&raw).context("Invalid tokens file")?;

    let access_token = tokens
        .get("access_token")
        .and_then(|v| v.as_str())
        .context("tokens file missing access_token")?;
    let refresh_token = tokens
        .get("refresh_token")
        .and_then(|v| v.as_str())
        .map(String::from);

    let account =
        MailAccount::gmail(user_id, email).with_tokens(access_token, refresh_token);
    service.connect_account(account)?;
    println!("Linked {} for user {}", email, user_id);
    Ok(())
}

fn sync(service: &SyncService, user_id: &str) -> Result<()> {
    let updates = service.subscribe();

    let response = match service.trigger_sync(user_id) {
        Ok(response) => response,
        Err(e) => bail!("Sync failed [{}]: {}", e.code(), e),
    };
    println!("{}", response.message);

    // Phase 1 already answered; keep following the background phases
    for status in updates {
        println!(
            "[{}] {:>3}% {}",
            status.sync_phase.as_str(),
            status.progress_percentage,
            status.current_status
        );
        if !status.sync_in_progress {
            if let Some(message) = status.error_message {
                bail!("{}", message);
            }
            break;
        }
    }

    Ok(())
}

fn status(service: &SyncService, user_id: &str) -> Result<()> {
    match service.sync_status(user_id)? {
        Some(status) => println!("{}", serde_json::to_string_pretty(&status)?),
        None => println!("No sync has run for user {}", user_id),
    }
    Ok(())
}

fn transactions(service: &SyncService, user_id: &str, limit: usize) -> Result<()> {
    let transactions = service.transactions(user_id, limit, 0)?;
    if transactions.is_empty() {
        println!("No transactions for user {}", user_id);
        return Ok(());
    }
    for txn in transactions {
        println!(
            "{}  {:>10.2}  {:<8}  {:<18}  {}",
            txn.date.format("%Y-%m-%d"),
            txn.amount,
            txn.txn_type.as_str(),
            txn.category.as_str(),
            txn.merchant
        );
    }
    Ok(())
}
