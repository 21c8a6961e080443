// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The ledger contract as seen from the client: authoritative reads and
//! confirmed submissions.

use std::fmt;
use std::future::Future;

use linera_sdk::linera_base_types::AccountOwner;
use lottery_abi::{LotteryOperation, LotteryRecord, Role, TicketRecord};
use serde::{Deserialize, Serialize};

/// Why the ledger refused a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Unauthorized(String),
    NoActiveLottery,
    AlreadyActive,
    AlreadyClaimed,
    NotWinner,
    UnknownLottery(u64),
    UnknownTicket { lottery_id: u64, ticket_id: u64 },
    LotteryConcluded(u64),
    InsufficientPayment,
    Other(String),
}

impl Rejection {
    /// Code carried in the `code` extension of GraphQL errors.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::Unauthorized(_) => "UNAUTHORIZED",
            Rejection::NoActiveLottery => "NO_ACTIVE_LOTTERY",
            Rejection::AlreadyActive => "ALREADY_ACTIVE",
            Rejection::AlreadyClaimed => "ALREADY_CLAIMED",
            Rejection::NotWinner => "NOT_WINNER",
            Rejection::UnknownLottery(_) => "UNKNOWN_LOTTERY",
            Rejection::UnknownTicket { .. } => "UNKNOWN_TICKET",
            Rejection::LotteryConcluded(_) => "LOTTERY_CONCLUDED",
            Rejection::InsufficientPayment => "INSUFFICIENT_PAYMENT",
            Rejection::Other(_) => "REJECTED",
        }
    }

    /// Rebuilds a rejection from a coded error message.
    pub fn from_code(code: &str, message: &str) -> Self {
        match code {
            "UNAUTHORIZED" => {
                Rejection::Unauthorized(message.trim_start_matches("unauthorized: ").to_string())
            }
            "NO_ACTIVE_LOTTERY" => Rejection::NoActiveLottery,
            "ALREADY_ACTIVE" => Rejection::AlreadyActive,
            "ALREADY_CLAIMED" => Rejection::AlreadyClaimed,
            "NOT_WINNER" => Rejection::NotWinner,
            "INSUFFICIENT_PAYMENT" => Rejection::InsufficientPayment,
            _ => Rejection::Other(message.to_string()),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Unauthorized(reason) => write!(f, "unauthorized: {reason}"),
            Rejection::NoActiveLottery => write!(f, "no active lottery"),
            Rejection::AlreadyActive => write!(f, "a lottery is already running"),
            Rejection::AlreadyClaimed => write!(f, "prize already claimed"),
            Rejection::NotWinner => write!(f, "not the winning ticket"),
            Rejection::UnknownLottery(id) => write!(f, "lottery {id} does not exist"),
            Rejection::UnknownTicket {
                lottery_id,
                ticket_id,
            } => write!(f, "ticket {ticket_id} of lottery {lottery_id} does not exist"),
            Rejection::LotteryConcluded(id) => write!(f, "lottery {id} has already concluded"),
            Rejection::InsufficientPayment => write!(f, "payment must equal the ticket price"),
            Rejection::Other(reason) => write!(f, "{reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The request never produced a usable answer.
    Transport(String),
    /// The ledger answered and said no.
    Rejected(Rejection),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Transport(cause) => write!(f, "transport failure: {cause}"),
            LedgerError::Rejected(rejection) => write!(f, "rejected: {rejection}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<Rejection> for LedgerError {
    fn from(rejection: Rejection) -> Self {
        LedgerError::Rejected(rejection)
    }
}

/// Proof that a submitted operation was confirmed by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub operation: LotteryOperation,
}

/// Access to the lottery ledger contract.
///
/// Implementations are shared by every call of a read model, so they take
/// `&self` and must be usable from several requests at once. Signing is the
/// implementation's business: `submit` only names the sender.
pub trait Ledger: Send + Sync {
    /// Id of the most recently created lottery, `0` if none exists.
    fn lottery_id_counter(&self) -> impl Future<Output = Result<u64, LedgerError>> + Send;

    fn lottery_info(
        &self,
        lottery_id: u64,
    ) -> impl Future<Output = Result<LotteryRecord, LedgerError>> + Send;

    fn ticket_info(
        &self,
        lottery_id: u64,
        ticket_id: u64,
    ) -> impl Future<Output = Result<TicketRecord, LedgerError>> + Send;

    /// Owner of the ledger contract, the only account allowed to assign roles.
    fn owner(&self) -> impl Future<Output = Result<AccountOwner, LedgerError>> + Send;

    fn has_role(
        &self,
        account: AccountOwner,
        role: Role,
    ) -> impl Future<Output = Result<bool, LedgerError>> + Send;

    /// Submits an operation signed by `sender` and resolves once confirmed.
    fn submit(
        &self,
        sender: AccountOwner,
        operation: LotteryOperation,
    ) -> impl Future<Output = Result<TxReceipt, LedgerError>> + Send;

    fn is_authority(
        &self,
        account: AccountOwner,
    ) -> impl Future<Output = Result<bool, LedgerError>> + Send {
        self.has_role(account, Role::Authority)
    }

    fn is_participant(
        &self,
        account: AccountOwner,
    ) -> impl Future<Output = Result<bool, LedgerError>> + Send {
        self.has_role(account, Role::Participant)
    }
}
