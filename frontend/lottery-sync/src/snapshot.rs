// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use async_graphql::SimpleObject;
use linera_sdk::linera_base_types::{AccountOwner, Amount};
use lottery_abi::{LotteryRecord, TicketRecord};
use serde::{Deserialize, Serialize};

/// Point-in-time projection of the ledger, rebuilt by every synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
pub struct Snapshot {
    /// The ledger's lottery counter when the snapshot was taken.
    pub lottery_id: u64,
    /// The current lottery, `None` while no lottery was ever created.
    pub lottery: Option<LotteryRecord>,
    /// Tickets of the current lottery that could be fetched, by ascending id.
    pub tickets: Vec<TicketRecord>,
    /// Earlier lotteries whose winner has been chosen.
    pub history: Vec<LotteryRecord>,
    /// Winning ticket owned by the caller the snapshot was taken for.
    pub caller_winning_ticket_id: Option<u64>,
}

impl Snapshot {
    /// Snapshot of a ledger on which no lottery was created yet.
    pub fn empty() -> Self {
        Snapshot::default()
    }

    /// Id of the lottery tickets can be bought for, if it is still open.
    pub fn active_lottery_id(&self) -> Option<u64> {
        self.lottery
            .as_ref()
            .filter(|lottery| !lottery.winner_chosen)
            .map(|lottery| lottery.id)
    }

    /// Prize pot of the current lottery.
    pub fn lottery_pot(&self) -> Amount {
        self.lottery
            .as_ref()
            .map(|lottery| lottery.total_prize)
            .unwrap_or(Amount::ZERO)
    }

    pub fn is_finished(&self) -> bool {
        self.lottery
            .as_ref()
            .is_some_and(|lottery| lottery.winner_chosen)
    }

    /// Whether the caller the snapshot was taken for holds an unclaimed prize.
    pub fn can_claim(&self) -> bool {
        claimable(self.lottery.as_ref(), self.caller_winning_ticket_id)
    }

    pub fn tickets_of(&self, owner: &AccountOwner) -> Vec<TicketRecord> {
        self.tickets
            .iter()
            .filter(|ticket| &ticket.owner == owner)
            .cloned()
            .collect()
    }

    pub fn ticket(&self, ticket_id: u64) -> Option<&TicketRecord> {
        self.tickets.iter().find(|ticket| ticket.id == ticket_id)
    }
}

/// The caller's winning ticket among `tickets`, if the draw has happened.
pub fn winning_ticket_of(
    lottery: &LotteryRecord,
    tickets: &[TicketRecord],
    caller: Option<&AccountOwner>,
) -> Option<u64> {
    let caller = caller?;
    let winner_id = lottery.winning_ticket()?;
    tickets
        .iter()
        .find(|ticket| ticket.id == winner_id && &ticket.owner == caller)
        .map(|ticket| ticket.id)
}

fn claimable(lottery: Option<&LotteryRecord>, winning_ticket_id: Option<u64>) -> bool {
    winning_ticket_id.is_some() && lottery.is_some_and(|lottery| !lottery.claimed)
}

/// Per-connection view derived from a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
pub struct Session {
    pub connected_address: Option<AccountOwner>,
    pub is_authority_for_current_lottery: bool,
    pub caller_winning_ticket_id: Option<u64>,
    /// The connected wallet holds the winning ticket and the prize is unclaimed.
    pub can_claim: bool,
}

impl Session {
    pub fn derive(snapshot: &Snapshot, connected: Option<&AccountOwner>) -> Self {
        let is_authority_for_current_lottery = match (&snapshot.lottery, connected) {
            (Some(lottery), Some(address)) => &lottery.authority == address,
            _ => false,
        };
        let caller_winning_ticket_id = snapshot
            .lottery
            .as_ref()
            .and_then(|lottery| winning_ticket_of(lottery, &snapshot.tickets, connected));
        Session {
            connected_address: connected.cloned(),
            is_authority_for_current_lottery,
            caller_winning_ticket_id,
            can_claim: claimable(snapshot.lottery.as_ref(), caller_winning_ticket_id),
        }
    }
}
