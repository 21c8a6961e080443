// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use crate::ledger::{LedgerError, Rejection};
use crate::randomness::RandomnessError;

/// Failures surfaced by the read model, both for synchronization passes and
/// for mutating operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LotteryError {
    /// Endpoint unreachable, timed out, or returned a malformed response.
    Transport(String),
    /// The ledger's role check rejected the caller.
    Unauthorized(String),
    NoActiveLottery,
    AlreadyActive,
    AlreadyClaimed,
    NotWinner,
    /// Pass-through failure from the randomness oracle.
    RandomnessProvider(String),
    /// Any other ledger rejection, with the ledger's own reason.
    Rejected(String),
    /// A mutation was attempted without a wallet session.
    NotConnected,
    InvalidAmount(String),
}

impl LotteryError {
    /// Stable code used on GraphQL error extensions.
    pub fn code(&self) -> &'static str {
        match self {
            LotteryError::Transport(_) => "TRANSPORT_FAILURE",
            LotteryError::Unauthorized(_) => "UNAUTHORIZED",
            LotteryError::NoActiveLottery => "NO_ACTIVE_LOTTERY",
            LotteryError::AlreadyActive => "ALREADY_ACTIVE",
            LotteryError::AlreadyClaimed => "ALREADY_CLAIMED",
            LotteryError::NotWinner => "NOT_WINNER",
            LotteryError::RandomnessProvider(_) => "RANDOMNESS_PROVIDER_FAILURE",
            LotteryError::Rejected(_) => "REJECTED",
            LotteryError::NotConnected => "NOT_CONNECTED",
            LotteryError::InvalidAmount(_) => "INVALID_AMOUNT",
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, LotteryError::Transport(_))
    }
}

impl fmt::Display for LotteryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LotteryError::Transport(cause) => write!(f, "ledger transport failure: {cause}"),
            LotteryError::Unauthorized(cause) => write!(f, "unauthorized: {cause}"),
            LotteryError::NoActiveLottery => write!(f, "no active lottery, create one first"),
            LotteryError::AlreadyActive => write!(f, "a lottery is already running"),
            LotteryError::AlreadyClaimed => write!(f, "prize already claimed"),
            LotteryError::NotWinner => write!(f, "ticket is not the caller's winning ticket"),
            LotteryError::RandomnessProvider(cause) => {
                write!(f, "randomness provider failure: {cause}")
            }
            LotteryError::Rejected(cause) => write!(f, "ledger rejected the transaction: {cause}"),
            LotteryError::NotConnected => write!(f, "please connect your wallet first"),
            LotteryError::InvalidAmount(cause) => write!(f, "invalid amount: {cause}"),
        }
    }
}

impl std::error::Error for LotteryError {}

impl From<LedgerError> for LotteryError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::Transport(cause) => LotteryError::Transport(cause),
            LedgerError::Rejected(rejection) => rejection.into(),
        }
    }
}

impl From<Rejection> for LotteryError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Unauthorized(reason) => LotteryError::Unauthorized(reason),
            Rejection::NoActiveLottery => LotteryError::NoActiveLottery,
            Rejection::AlreadyActive => LotteryError::AlreadyActive,
            Rejection::AlreadyClaimed => LotteryError::AlreadyClaimed,
            Rejection::NotWinner => LotteryError::NotWinner,
            other => LotteryError::Rejected(other.to_string()),
        }
    }
}

impl From<RandomnessError> for LotteryError {
    fn from(error: RandomnessError) -> Self {
        LotteryError::RandomnessProvider(error.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_keep_their_meaning() {
        assert_eq!(
            LotteryError::from(LedgerError::Rejected(Rejection::AlreadyActive)),
            LotteryError::AlreadyActive
        );
        assert_eq!(
            LotteryError::from(Rejection::InsufficientPayment),
            LotteryError::Rejected("payment must equal the ticket price".to_string())
        );
    }

    #[test]
    fn test_transport_cause_is_kept_verbatim() {
        let error = LotteryError::from(LedgerError::Transport("connection refused".into()));
        assert!(error.is_transport());
        assert_eq!(error.to_string(), "ledger transport failure: connection refused");
    }
}
