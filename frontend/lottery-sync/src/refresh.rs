// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::future::Future;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::ledger::Ledger;
use crate::model::LotteryReadModel;
use crate::randomness::RandomnessProvider;

/// Synchronizes `model` every `period` until `shutdown` resolves.
///
/// The first pass runs immediately. Failed passes are already recorded by the
/// model, so the loop just keeps going. Returns the number of passes run.
pub async fn refresh_periodically<L, R>(
    model: &LotteryReadModel<L, R>,
    period: Duration,
    shutdown: impl Future<Output = ()>,
) -> u64
where
    L: Ledger,
    R: RandomnessProvider,
{
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut passes = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                passes += 1;
                if model.refresh().await.is_ok() {
                    debug!(passes, "periodic refresh done");
                }
            }
        }
    }
    info!(passes, "periodic refresh stopped");
    passes
}
