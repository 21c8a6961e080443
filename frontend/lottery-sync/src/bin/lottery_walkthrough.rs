// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Plays one lottery round against an in-memory ledger and prints the
//! snapshots along the way. Pass a JSON config file path to override the
//! defaults.

use std::sync::Arc;

use color_eyre::eyre::{eyre, Result, WrapErr};
use linera_sdk::linera_base_types::AccountOwner;
use lottery_sync::format::{shorten_address, to_decimal};
use lottery_sync::testing::InMemoryLedger;
use lottery_sync::{refresh_periodically, LotteryReadModel, Role, Snapshot, SyncConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn print(label: &str, snapshot: &Snapshot) -> Result<()> {
    println!("--- {label}");
    println!("{}", serde_json::to_string_pretty(snapshot)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => SyncConfig::load(&path).wrap_err_with(|| format!("loading {path}"))?,
        None => SyncConfig::default(),
    };

    let owner = AccountOwner::Address20([0x11; 20]);
    let player = AccountOwner::Address20([0x22; 20]);
    let ledger = Arc::new(InMemoryLedger::new(owner));

    let host = LotteryReadModel::new(ledger.clone(), config.clone());
    let guest = LotteryReadModel::new(ledger, config.clone());

    let snapshot = host.connect(owner).await?;
    print("initial", &snapshot)?;

    let lottery_id = match snapshot.active_lottery_id() {
        Some(id) => id,
        None => {
            host.assign_role(owner, Role::Authority).await?;
            host.create_lottery(config.default_ticket_price).await?;
            host.snapshot()
                .active_lottery_id()
                .ok_or_else(|| eyre!("lottery did not show up after creation"))?
        }
    };
    info!(
        lottery_id,
        price = %to_decimal(config.default_ticket_price),
        "lottery open"
    );

    host.assign_role(player, Role::Participant).await?;
    guest.connect(player).await?;
    guest.buy_ticket(lottery_id).await?;
    host.request_participant_role().await?;
    host.refresh().await?;
    host.buy_ticket(lottery_id).await?;
    print("tickets sold", &host.snapshot())?;

    host.pick_winner(lottery_id).await?;
    guest.refresh().await?;

    for (name, model) in [("host", &host), ("guest", &guest)] {
        let session = model.session();
        let address = session
            .connected_address
            .map(|address| shorten_address(&address, 6))
            .unwrap_or_default();
        match session.caller_winning_ticket_id {
            Some(ticket_id) => {
                info!(name, %address, ticket_id, "claiming prize");
                model.claim_prize(lottery_id, ticket_id).await?;
            }
            None => info!(name, %address, "no winning ticket"),
        }
    }

    if let Some(period) = config.refresh_interval() {
        let passes = refresh_periodically(&guest, period, tokio::time::sleep(period * 3)).await;
        info!(passes, "background refresh finished");
    }

    let snapshot = host.refresh().await?;
    print("final", &snapshot)?;
    Ok(())
}
