// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-memory stand-in for the lottery ledger, with failure injection.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_graphql::{EmptySubscription, Error, ErrorExtensions, Object, Schema};
use linera_sdk::linera_base_types::{AccountOwner, Amount};
use lottery_abi::{LotteryOperation, LotteryRecord, RandomnessProof, Role, TicketRecord};

use crate::ledger::{Ledger, LedgerError, Rejection, TxReceipt};

struct LedgerState {
    owner: AccountOwner,
    roles: HashSet<(AccountOwner, Role)>,
    /// Lottery `id` lives at index `id - 1`.
    lotteries: Vec<LotteryRecord>,
    tickets: HashMap<(u64, u64), TicketRecord>,
    tx_count: u64,
    offline: bool,
    stalled: bool,
    offline_after_submit: bool,
    failing_lotteries: HashSet<u64>,
    failing_tickets: HashSet<(u64, u64)>,
    submissions: Vec<(AccountOwner, LotteryOperation)>,
}

/// Ledger double enforcing the lottery contract's rules: roles, one open
/// lottery at a time, exact payment, authority-only draws and a single claim
/// by the winner.
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(owner: AccountOwner) -> Self {
        InMemoryLedger {
            state: Mutex::new(LedgerState {
                owner,
                roles: HashSet::new(),
                lotteries: Vec::new(),
                tickets: HashMap::new(),
                tx_count: 0,
                offline: false,
                stalled: false,
                offline_after_submit: false,
                failing_lotteries: HashSet::new(),
                failing_tickets: HashSet::new(),
                submissions: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Grants a role directly, bypassing the owner check.
    pub fn grant(&self, account: AccountOwner, role: Role) {
        self.lock().roles.insert((account, role));
    }

    /// Every call fails with a transport error while set.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Every call hangs forever while set.
    pub fn set_stalled(&self, stalled: bool) {
        self.lock().stalled = stalled;
    }

    /// Goes offline right after the next accepted submission.
    pub fn go_offline_after_next_submit(&self) {
        self.lock().offline_after_submit = true;
    }

    /// Makes lookups of one lottery fail with a transport error.
    pub fn fail_lottery(&self, lottery_id: u64) {
        self.lock().failing_lotteries.insert(lottery_id);
    }

    /// Makes lookups of one ticket fail with a transport error.
    pub fn fail_ticket(&self, lottery_id: u64, ticket_id: u64) {
        self.lock().failing_tickets.insert((lottery_id, ticket_id));
    }

    /// Edits a stored lottery behind the contract's back.
    pub fn tamper_lottery(&self, lottery_id: u64, edit: impl FnOnce(&mut LotteryRecord)) {
        let mut state = self.lock();
        let index = lottery_id.checked_sub(1).map(|i| i as usize);
        if let Some(lottery) = index.and_then(|i| state.lotteries.get_mut(i)) {
            edit(lottery);
        }
    }

    /// Operations accepted so far, with their senders.
    pub fn submissions(&self) -> Vec<(AccountOwner, LotteryOperation)> {
        self.lock().submissions.clone()
    }

    async fn reachable(&self) -> Result<(), LedgerError> {
        let (offline, stalled) = {
            let state = self.lock();
            (state.offline, state.stalled)
        };
        if stalled {
            futures::future::pending::<()>().await;
        }
        if offline {
            return Err(LedgerError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

impl LedgerState {
    fn has_role(&self, account: &AccountOwner, role: Role) -> bool {
        self.roles.contains(&(*account, role))
    }

    fn lottery_mut(&mut self, lottery_id: u64) -> Result<&mut LotteryRecord, Rejection> {
        lottery_id
            .checked_sub(1)
            .and_then(|index| self.lotteries.get_mut(index as usize))
            .ok_or(Rejection::UnknownLottery(lottery_id))
    }

    fn apply(&mut self, sender: AccountOwner, operation: &LotteryOperation) -> Result<(), Rejection> {
        match operation {
            LotteryOperation::CreateLottery { ticket_price } => {
                if sender != self.owner && !self.has_role(&sender, Role::Authority) {
                    return Err(Rejection::Unauthorized("caller is not an authority".to_string()));
                }
                if *ticket_price == Amount::ZERO {
                    return Err(Rejection::Other("ticket price must be positive".to_string()));
                }
                if self.lotteries.last().is_some_and(|last| !last.winner_chosen) {
                    return Err(Rejection::AlreadyActive);
                }
                let id = self.lotteries.len() as u64 + 1;
                self.lotteries.push(LotteryRecord {
                    id,
                    authority: sender,
                    ticket_price: *ticket_price,
                    last_ticket_id: 0,
                    winner_id: 0,
                    winner_chosen: false,
                    claimed: false,
                    total_prize: Amount::ZERO,
                });
            }
            LotteryOperation::BuyTicket {
                lottery_id,
                payment,
            } => {
                if *lottery_id == 0 {
                    return Err(Rejection::NoActiveLottery);
                }
                if !self.has_role(&sender, Role::Participant) {
                    return Err(Rejection::Unauthorized("caller is not a participant".to_string()));
                }
                let lottery = self.lottery_mut(*lottery_id)?;
                if lottery.winner_chosen {
                    return Err(Rejection::LotteryConcluded(*lottery_id));
                }
                if *payment != lottery.ticket_price {
                    return Err(Rejection::InsufficientPayment);
                }
                lottery.last_ticket_id += 1;
                lottery.total_prize = lottery
                    .total_prize
                    .try_add(lottery.ticket_price)
                    .map_err(|e| Rejection::Other(e.to_string()))?;
                let ticket = TicketRecord {
                    id: lottery.last_ticket_id,
                    lottery_id: *lottery_id,
                    owner: sender,
                };
                self.tickets.insert((*lottery_id, ticket.id), ticket);
            }
            LotteryOperation::PickWinner {
                lottery_id,
                randomness,
            } => {
                let seed = self.tx_count;
                let lottery = self.lottery_mut(*lottery_id)?;
                if lottery.authority != sender {
                    return Err(Rejection::Unauthorized(
                        "only the lottery authority can pick the winner".to_string(),
                    ));
                }
                if lottery.winner_chosen {
                    return Err(Rejection::LotteryConcluded(*lottery_id));
                }
                if lottery.last_ticket_id == 0 {
                    return Err(Rejection::Other("no tickets sold".to_string()));
                }
                let entropy = randomness.as_ref().map(proof_entropy).unwrap_or(seed);
                lottery.winner_id = 1 + entropy % lottery.last_ticket_id;
                lottery.winner_chosen = true;
            }
            LotteryOperation::ClaimPrize {
                lottery_id,
                ticket_id,
            } => {
                let owner = self
                    .tickets
                    .get(&(*lottery_id, *ticket_id))
                    .map(|ticket| ticket.owner);
                let lottery = self.lottery_mut(*lottery_id)?;
                if lottery.claimed {
                    return Err(Rejection::AlreadyClaimed);
                }
                if lottery.winning_ticket() != Some(*ticket_id) || owner != Some(sender) {
                    return Err(Rejection::NotWinner);
                }
                lottery.claimed = true;
            }
            LotteryOperation::AssignRole { account, role } => {
                if sender != self.owner {
                    return Err(Rejection::Unauthorized(
                        "only the owner can assign roles".to_string(),
                    ));
                }
                self.roles.insert((*account, *role));
            }
            LotteryOperation::RequestRole { role } => match role {
                Role::Participant => {
                    self.roles.insert((sender, Role::Participant));
                }
                Role::Authority => {
                    return Err(Rejection::Unauthorized(
                        "the authority role is assigned by the owner".to_string(),
                    ));
                }
            },
        }
        Ok(())
    }
}

/// First eight bytes of the proof, little-endian, zero-padded.
fn proof_entropy(proof: &RandomnessProof) -> u64 {
    let mut bytes = [0u8; 8];
    for (slot, byte) in bytes.iter_mut().zip(proof.as_bytes()) {
        *slot = *byte;
    }
    u64::from_le_bytes(bytes)
}

impl Ledger for InMemoryLedger {
    async fn lottery_id_counter(&self) -> Result<u64, LedgerError> {
        self.reachable().await?;
        Ok(self.lock().lotteries.len() as u64)
    }

    async fn lottery_info(&self, lottery_id: u64) -> Result<LotteryRecord, LedgerError> {
        self.reachable().await?;
        let state = self.lock();
        if state.failing_lotteries.contains(&lottery_id) {
            return Err(LedgerError::Transport(format!(
                "lookup of lottery {lottery_id} timed out"
            )));
        }
        lottery_id
            .checked_sub(1)
            .and_then(|index| state.lotteries.get(index as usize))
            .cloned()
            .ok_or(LedgerError::Rejected(Rejection::UnknownLottery(lottery_id)))
    }

    async fn ticket_info(&self, lottery_id: u64, ticket_id: u64) -> Result<TicketRecord, LedgerError> {
        self.reachable().await?;
        let state = self.lock();
        if state.failing_tickets.contains(&(lottery_id, ticket_id)) {
            return Err(LedgerError::Transport(format!(
                "lookup of ticket {ticket_id} timed out"
            )));
        }
        state
            .tickets
            .get(&(lottery_id, ticket_id))
            .cloned()
            .ok_or(LedgerError::Rejected(Rejection::UnknownTicket {
                lottery_id,
                ticket_id,
            }))
    }

    async fn owner(&self) -> Result<AccountOwner, LedgerError> {
        self.reachable().await?;
        Ok(self.lock().owner)
    }

    async fn has_role(&self, account: AccountOwner, role: Role) -> Result<bool, LedgerError> {
        self.reachable().await?;
        Ok(self.lock().has_role(&account, role))
    }

    async fn submit(
        &self,
        sender: AccountOwner,
        operation: LotteryOperation,
    ) -> Result<TxReceipt, LedgerError> {
        self.reachable().await?;
        let mut state = self.lock();
        state.apply(sender, &operation)?;
        state.tx_count += 1;
        state.submissions.push((sender, operation.clone()));
        if state.offline_after_submit {
            state.offline_after_submit = false;
            state.offline = true;
        }
        Ok(TxReceipt {
            tx_hash: format!("0x{:064x}", state.tx_count),
            operation,
        })
    }
}

pub type LedgerSchema = Schema<LedgerQueryRoot, LedgerMutationRoot, EmptySubscription>;

/// The ledger exposed as a GraphQL service, the way the lottery application
/// answers queries.
pub fn ledger_schema(ledger: Arc<InMemoryLedger>) -> LedgerSchema {
    Schema::build(
        LedgerQueryRoot {
            ledger: ledger.clone(),
        },
        LedgerMutationRoot { ledger },
        EmptySubscription,
    )
    .finish()
}

fn ledger_error(error: LedgerError) -> Error {
    match error {
        LedgerError::Transport(cause) => Error::new(cause),
        LedgerError::Rejected(rejection) => {
            let code = rejection.code();
            Error::new(rejection.to_string()).extend_with(|_, extensions| extensions.set("code", code))
        }
    }
}

pub struct LedgerQueryRoot {
    ledger: Arc<InMemoryLedger>,
}

#[Object]
impl LedgerQueryRoot {
    async fn lottery_id_counter(&self) -> Result<u64, Error> {
        self.ledger.lottery_id_counter().await.map_err(ledger_error)
    }

    async fn lottery_info(&self, lottery_id: u64) -> Result<LotteryRecord, Error> {
        self.ledger.lottery_info(lottery_id).await.map_err(ledger_error)
    }

    async fn ticket_info(&self, lottery_id: u64, ticket_id: u64) -> Result<TicketRecord, Error> {
        self.ledger
            .ticket_info(lottery_id, ticket_id)
            .await
            .map_err(ledger_error)
    }

    async fn owner(&self) -> Result<AccountOwner, Error> {
        self.ledger.owner().await.map_err(ledger_error)
    }

    async fn has_role(&self, account: AccountOwner, role: Role) -> Result<bool, Error> {
        self.ledger.has_role(account, role).await.map_err(ledger_error)
    }
}

pub struct LedgerMutationRoot {
    ledger: Arc<InMemoryLedger>,
}

impl LedgerMutationRoot {
    async fn submit(&self, sender: AccountOwner, operation: LotteryOperation) -> Result<String, Error> {
        let receipt = self
            .ledger
            .submit(sender, operation)
            .await
            .map_err(ledger_error)?;
        Ok(receipt.tx_hash)
    }
}

#[Object]
impl LedgerMutationRoot {
    async fn create_lottery(&self, sender: AccountOwner, ticket_price: Amount) -> Result<String, Error> {
        self.submit(sender, LotteryOperation::CreateLottery { ticket_price })
            .await
    }

    async fn buy_ticket(
        &self,
        sender: AccountOwner,
        lottery_id: u64,
        payment: Amount,
    ) -> Result<String, Error> {
        self.submit(sender, LotteryOperation::BuyTicket { lottery_id, payment })
            .await
    }

    async fn pick_winner(
        &self,
        sender: AccountOwner,
        lottery_id: u64,
        randomness: Option<String>,
    ) -> Result<String, Error> {
        let randomness = randomness
            .map(|encoded| RandomnessProof::from_hex(&encoded))
            .transpose()
            .map_err(|e| Error::new(format!("malformed randomness proof: {e}")))?;
        self.submit(
            sender,
            LotteryOperation::PickWinner {
                lottery_id,
                randomness,
            },
        )
        .await
    }

    async fn claim_prize(
        &self,
        sender: AccountOwner,
        lottery_id: u64,
        ticket_id: u64,
    ) -> Result<String, Error> {
        self.submit(
            sender,
            LotteryOperation::ClaimPrize {
                lottery_id,
                ticket_id,
            },
        )
        .await
    }

    async fn assign_role(&self, sender: AccountOwner, account: AccountOwner, role: Role) -> Result<String, Error> {
        self.submit(sender, LotteryOperation::AssignRole { account, role })
            .await
    }

    async fn request_role(&self, sender: AccountOwner, role: Role) -> Result<String, Error> {
        self.submit(sender, LotteryOperation::RequestRole { role })
            .await
    }
}
