// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

/*! Shared interface definitions for the Lottery ledger */

use std::fmt;

use async_graphql::SimpleObject;
use linera_sdk::linera_base_types::{AccountOwner, Amount};
use serde::{Deserialize, Serialize};

// ========================================
// Ledger records (read side)
// ========================================

/// Lifecycle of a single lottery, as observed from the ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, async_graphql::Enum)]
pub enum LotteryStatus {
    Open,    // Accepting ticket purchases
    Drawn,   // Winner chosen, prize not yet claimed
    Settled, // Prize claimed
}

/// Roles the ledger enforces on its callers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, async_graphql::Enum)]
pub enum Role {
    Authority,   // May create and draw lotteries
    Participant, // May buy tickets
}

impl Role {
    /// Name of the role as the ledger's GraphQL service spells it.
    pub fn graphql_name(self) -> &'static str {
        match self {
            Role::Authority => "AUTHORITY",
            Role::Participant => "PARTICIPANT",
        }
    }
}

/// A lottery as recorded by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct LotteryRecord {
    pub id: u64,
    pub authority: AccountOwner,
    pub ticket_price: Amount,
    pub last_ticket_id: u64,
    /// Only meaningful once `winner_chosen` is set.
    pub winner_id: u64,
    pub winner_chosen: bool,
    pub claimed: bool,
    pub total_prize: Amount,
}

impl LotteryRecord {
    pub fn status(&self) -> LotteryStatus {
        match (self.winner_chosen, self.claimed) {
            (false, _) => LotteryStatus::Open,
            (true, false) => LotteryStatus::Drawn,
            (true, true) => LotteryStatus::Settled,
        }
    }

    /// A claimed lottery must have a winner.
    pub fn is_consistent(&self) -> bool {
        !self.claimed || self.winner_chosen
    }

    /// The winning ticket id, once one has been drawn.
    pub fn winning_ticket(&self) -> Option<u64> {
        self.winner_chosen.then_some(self.winner_id)
    }

    /// `ticket_price * last_ticket_id`, or `None` on overflow.
    /// The ledger's `total_prize` stays authoritative.
    pub fn derived_prize(&self) -> Option<Amount> {
        u128::from(self.ticket_price)
            .checked_mul(u128::from(self.last_ticket_id))
            .map(Amount::from_attos)
    }
}

/// A ticket sold in a lottery. Tickets never change once bought.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct TicketRecord {
    pub id: u64,
    pub lottery_id: u64,
    pub owner: AccountOwner,
}

/// Opaque payload returned by a randomness provider and forwarded as-is to
/// `PickWinner`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomnessProof(pub Vec<u8>);

impl RandomnessProof {
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn from_hex(encoded: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(encoded.trim_start_matches("0x")).map(RandomnessProof)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for RandomnessProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RandomnessProof(0x{})", self.to_hex())
    }
}

// ========================================
// Ledger operations (write side)
// ========================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum LotteryOperation {
    /// Open a new lottery; the sender becomes its authority
    CreateLottery { ticket_price: Amount },
    /// Buy one ticket, paying exactly the ticket price
    BuyTicket { lottery_id: u64, payment: Amount },
    /// Draw the winner, optionally backed by a randomness proof
    PickWinner {
        lottery_id: u64,
        randomness: Option<RandomnessProof>,
    },
    /// Collect the prize with the winning ticket
    ClaimPrize { lottery_id: u64, ticket_id: u64 },
    /// Grant a role (owner only)
    AssignRole { account: AccountOwner, role: Role },
    /// Ask the ledger for a role for the sender
    RequestRole { role: Role },
}

impl LotteryOperation {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            LotteryOperation::CreateLottery { .. } => "createLottery",
            LotteryOperation::BuyTicket { .. } => "buyTicket",
            LotteryOperation::PickWinner { .. } => "pickWinner",
            LotteryOperation::ClaimPrize { .. } => "claimPrize",
            LotteryOperation::AssignRole { .. } => "assignRole",
            LotteryOperation::RequestRole { .. } => "requestRole",
        }
    }
}
