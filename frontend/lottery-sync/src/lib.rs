// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

/*! Lottery read model: keeps a denormalized snapshot of the lottery ledger for
the frontend and wraps the transactions that move it forward. */

pub mod config;
pub mod error;
pub mod format;
pub mod graphql_ledger;
pub mod ledger;
pub mod model;
pub mod randomness;
pub mod refresh;
pub mod service;
pub mod snapshot;
#[cfg(any(test, feature = "test"))]
pub mod testing;

pub use config::{ConfigError, SyncConfig};
pub use error::LotteryError;
pub use graphql_ledger::{GraphQlLedger, GraphQlTransport};
pub use ledger::{Ledger, LedgerError, Rejection, TxReceipt};
pub use lottery_abi::{
    LotteryOperation, LotteryRecord, LotteryStatus, RandomnessProof, Role, TicketRecord,
};
pub use model::LotteryReadModel;
pub use randomness::{FixedRandomness, NoRandomness, RandomnessError, RandomnessProvider};
pub use refresh::refresh_periodically;
pub use service::{LotteryActions, LotteryService};
pub use snapshot::{Session, Snapshot};
