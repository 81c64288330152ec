use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use waveportal_app::{Portal, PortalConfig};
use waveportal_core::Account;
use waveportal_ledger::InMemoryWaveLedger;
use waveportal_wallet::InMemoryWalletProvider;

const DEMO_ACCOUNT_ENV: &str = "WAVEPORTAL_DEMO_ACCOUNT";
const DEFAULT_DEMO_ACCOUNT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    waveportal_observability::init();

    let config = PortalConfig::from_env().context("failed to load portal configuration")?;
    info!(
        contract = %config.contract.address,
        resource_limit = %config.resource_limit,
        "starting wave portal"
    );

    let demo_account = std::env::var(DEMO_ACCOUNT_ENV).unwrap_or_else(|_| DEFAULT_DEMO_ACCOUNT.to_string());
    let provider = Arc::new(InMemoryWalletProvider::approving(Account::new(demo_account)?));
    let ledger = Arc::new(InMemoryWaveLedger::new(config.contract.address.clone()));
    let portal = Portal::new(provider, ledger, &config);
    let events = portal.subscribe();

    if portal.mount().await.is_none() {
        portal.connect().await.context("wallet connection failed")?;
    }

    let message = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let message = if message.trim().is_empty() { "gm".to_string() } else { message };

    match portal.submit(message).await {
        Ok(submission) => info!(submission_id = %submission.id, status = %submission.status, "wave submitted"),
        Err(err) => warn!(error = %err, "wave failed"),
    }

    for event in events.drain() {
        info!(event_type = event.event_type(), "portal event");
    }

    let view = portal.view();
    println!(
        "{}",
        serde_json::to_string_pretty(&view).context("failed to render portal view")?
    );

    Ok(())
}
