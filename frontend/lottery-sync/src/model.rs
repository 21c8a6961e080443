// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The read model: pulls lottery state from the ledger into immutable
//! snapshots and wraps the mutating ledger calls.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::{join_all, try_join_all};
use linera_sdk::linera_base_types::{AccountOwner, Amount};
use lottery_abi::{LotteryOperation, LotteryRecord, Role};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::LotteryError;
use crate::ledger::{Ledger, LedgerError, TxReceipt};
use crate::randomness::{draw_params, NoRandomness, RandomnessProvider};
use crate::snapshot::{winning_ticket_of, Session, Snapshot};

pub struct LotteryReadModel<L, R = NoRandomness> {
    ledger: Arc<L>,
    randomness: R,
    config: SyncConfig,
    connected: RwLock<Option<AccountOwner>>,
    /// Numbers synchronization passes in the order they start.
    next_pass: AtomicU64,
    published: RwLock<Published>,
}

/// Outcome of the most recent pass to finish, among those that started
/// after every pass already recorded here.
struct Published {
    pass: u64,
    /// Swapped whole, never edited in place.
    snapshot: Arc<Snapshot>,
    last_failure: Option<LotteryError>,
}

impl<L: Ledger> LotteryReadModel<L, NoRandomness> {
    pub fn new(ledger: Arc<L>, config: SyncConfig) -> Self {
        LotteryReadModel {
            ledger,
            randomness: NoRandomness,
            config,
            connected: RwLock::new(None),
            next_pass: AtomicU64::new(1),
            published: RwLock::new(Published {
                pass: 0,
                snapshot: Arc::new(Snapshot::empty()),
                last_failure: None,
            }),
        }
    }
}

impl<L: Ledger, R: RandomnessProvider> LotteryReadModel<L, R> {
    /// Replaces the randomness provider used by `pick_winner`.
    pub fn with_randomness<P: RandomnessProvider>(self, randomness: P) -> LotteryReadModel<L, P> {
        LotteryReadModel {
            ledger: self.ledger,
            randomness,
            config: self.config,
            connected: self.connected,
            next_pass: self.next_pass,
            published: self.published,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// The last successfully assembled snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot
            .clone()
    }

    /// Failure of the most recent synchronization, if it did not succeed.
    pub fn last_failure(&self) -> Option<LotteryError> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_failure
            .clone()
    }

    pub fn connected_address(&self) -> Option<AccountOwner> {
        *self.connected.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session(&self) -> Session {
        Session::derive(&self.snapshot(), self.connected_address().as_ref())
    }

    /// Starts a wallet session and synchronizes for it.
    pub async fn connect(&self, address: AccountOwner) -> Result<Arc<Snapshot>, LotteryError> {
        info!(%address, "wallet connected");
        *self.connected.write().unwrap_or_else(PoisonError::into_inner) = Some(address);
        self.refresh().await
    }

    pub fn disconnect(&self) {
        if let Some(address) = self
            .connected
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            info!(%address, "wallet disconnected");
        }
    }

    /// Synchronizes for the connected address, if any.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, LotteryError> {
        self.synchronize(self.connected_address()).await
    }

    /// Rebuilds the snapshot from the ledger and publishes it.
    ///
    /// On failure the previous snapshot stays published and the failure is
    /// kept in [`Self::last_failure`] until the next successful pass.
    ///
    /// Passes may overlap. A pass that finishes after a later-started pass
    /// has already finished is dropped: its snapshot is not published and its
    /// failure is not recorded, and a successful one returns the snapshot
    /// that is published instead.
    pub async fn synchronize(
        &self,
        caller: Option<AccountOwner>,
    ) -> Result<Arc<Snapshot>, LotteryError> {
        let pass = self.next_pass.fetch_add(1, Ordering::Relaxed);
        let result = self.fetch_snapshot(caller.as_ref()).await;

        let mut published = self.published.write().unwrap_or_else(PoisonError::into_inner);
        if published.pass > pass {
            debug!(pass, newer = published.pass, "dropping outdated synchronization pass");
            return result.map(|_| published.snapshot.clone());
        }
        published.pass = pass;
        match result {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                published.snapshot = snapshot.clone();
                published.last_failure = None;
                debug!(
                    pass,
                    lottery_id = snapshot.lottery_id,
                    tickets = snapshot.tickets.len(),
                    history = snapshot.history.len(),
                    "snapshot published"
                );
                Ok(snapshot)
            }
            Err(error) => {
                warn!(pass, %error, "synchronization failed, keeping previous snapshot");
                published.last_failure = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Reads a full snapshot without publishing it.
    pub async fn fetch_snapshot(
        &self,
        caller: Option<&AccountOwner>,
    ) -> Result<Snapshot, LotteryError> {
        let lottery_id = self.call(self.ledger.lottery_id_counter()).await?;
        if lottery_id == 0 {
            debug!("no lotteries yet");
            return Ok(Snapshot::empty());
        }

        let lottery = self.call(self.ledger.lottery_info(lottery_id)).await?;
        check_record(&lottery, lottery_id)?;

        let results = join_all(
            (1..=lottery.last_ticket_id)
                .map(|ticket_id| self.call(self.ledger.ticket_info(lottery_id, ticket_id))),
        )
        .await;
        let mut tickets = Vec::with_capacity(results.len());
        for (ticket_id, result) in (1u64..).zip(results) {
            match result {
                Ok(ticket) => tickets.push(ticket),
                // Not indexed yet; the next pass picks it up.
                Err(error) => debug!(lottery_id, ticket_id, %error, "skipping unresolved ticket"),
            }
        }

        let caller_winning_ticket_id = winning_ticket_of(&lottery, &tickets, caller);

        let past = try_join_all((1..lottery_id).map(|id| self.call(self.ledger.lottery_info(id))))
            .await?;
        let mut history = Vec::new();
        for (id, record) in (1u64..).zip(past) {
            check_record(&record, id)?;
            if record.winner_chosen {
                history.push(record);
            }
        }

        Ok(Snapshot {
            lottery_id,
            lottery: Some(lottery),
            tickets,
            history,
            caller_winning_ticket_id,
        })
    }

    /// Opens a new lottery with the connected account as its authority.
    pub async fn create_lottery(&self, ticket_price: Amount) -> Result<TxReceipt, LotteryError> {
        let sender = self.sender()?;
        if ticket_price == Amount::ZERO {
            return Err(LotteryError::InvalidAmount(
                "ticket price must be positive".to_string(),
            ));
        }
        if self.config.precheck || self.config.request_authority_role {
            let allowed = self.call(self.ledger.is_authority(sender)).await?
                || self.call(self.ledger.owner()).await? == sender;
            if !allowed {
                if !self.config.request_authority_role {
                    return Err(LotteryError::Unauthorized(format!(
                        "{sender} does not hold the authority role"
                    )));
                }
                info!(%sender, "requesting authority role");
                let operation = LotteryOperation::AssignRole {
                    account: sender,
                    role: Role::Authority,
                };
                self.call(self.ledger.submit(sender, operation)).await?;
            }
        }
        self.submit_and_refresh(sender, LotteryOperation::CreateLottery { ticket_price })
            .await
    }

    /// Buys one ticket of the current lottery at its ticket price.
    pub async fn buy_ticket(&self, lottery_id: u64) -> Result<TxReceipt, LotteryError> {
        let sender = self.sender()?;
        let snapshot = self.snapshot();
        let payment = match &snapshot.lottery {
            Some(lottery) if lottery_id != 0 && lottery.id == lottery_id => lottery.ticket_price,
            _ => return Err(LotteryError::NoActiveLottery),
        };
        self.submit_and_refresh(sender, LotteryOperation::BuyTicket { lottery_id, payment })
            .await
    }

    /// Asks the ledger to draw the winner, forwarding the randomness
    /// provider's payload untouched.
    pub async fn pick_winner(&self, lottery_id: u64) -> Result<TxReceipt, LotteryError> {
        let sender = self.sender()?;
        if lottery_id == 0 {
            return Err(LotteryError::NoActiveLottery);
        }
        if self.config.precheck {
            let snapshot = self.snapshot();
            if let Some(lottery) = snapshot.lottery.as_ref().filter(|l| l.id == lottery_id) {
                if lottery.authority != sender {
                    return Err(LotteryError::Unauthorized(
                        "only the lottery authority can pick the winner".to_string(),
                    ));
                }
            }
        }
        let params = draw_params(lottery_id);
        let randomness = self
            .randomness
            .authorize(sender, &params)
            .await
            .inspect_err(|error| warn!(lottery_id, %error, "randomness provider failed"))?;
        self.submit_and_refresh(
            sender,
            LotteryOperation::PickWinner {
                lottery_id,
                randomness,
            },
        )
        .await
    }

    /// Claims the prize of `lottery_id` with the caller's winning ticket.
    pub async fn claim_prize(
        &self,
        lottery_id: u64,
        ticket_id: u64,
    ) -> Result<TxReceipt, LotteryError> {
        let sender = self.sender()?;
        if self.config.precheck {
            let snapshot = self.snapshot();
            if let Some(lottery) = snapshot.lottery.as_ref().filter(|l| l.id == lottery_id) {
                if lottery.claimed {
                    return Err(LotteryError::AlreadyClaimed);
                }
                if lottery.winning_ticket() != Some(ticket_id) {
                    return Err(LotteryError::NotWinner);
                }
                if snapshot
                    .ticket(ticket_id)
                    .is_some_and(|ticket| ticket.owner != sender)
                {
                    return Err(LotteryError::NotWinner);
                }
            }
        }
        self.submit_and_refresh(
            sender,
            LotteryOperation::ClaimPrize {
                lottery_id,
                ticket_id,
            },
        )
        .await
    }

    /// Gets the participant role for the connected account: the ledger owner
    /// assigns it to itself, anyone else requests it.
    pub async fn request_participant_role(&self) -> Result<TxReceipt, LotteryError> {
        let sender = self.sender()?;
        let owner = self.call(self.ledger.owner()).await?;
        let operation = if owner == sender {
            LotteryOperation::AssignRole {
                account: sender,
                role: Role::Participant,
            }
        } else {
            LotteryOperation::RequestRole {
                role: Role::Participant,
            }
        };
        self.submit_and_refresh(sender, operation).await
    }

    /// Grants `role` to `account`; only the ledger owner may do this.
    pub async fn assign_role(
        &self,
        account: AccountOwner,
        role: Role,
    ) -> Result<TxReceipt, LotteryError> {
        let sender = self.sender()?;
        self.submit_and_refresh(sender, LotteryOperation::AssignRole { account, role })
            .await
    }

    fn sender(&self) -> Result<AccountOwner, LotteryError> {
        self.connected_address().ok_or(LotteryError::NotConnected)
    }

    /// Submits, waits for confirmation, then resynchronizes. Never retries.
    async fn submit_and_refresh(
        &self,
        sender: AccountOwner,
        operation: LotteryOperation,
    ) -> Result<TxReceipt, LotteryError> {
        let name = operation.name();
        info!(operation = name, %sender, "submitting");
        let receipt = self
            .call(self.ledger.submit(sender, operation))
            .await
            .inspect_err(|error| warn!(operation = name, %error, "transaction failed"))?;
        info!(operation = name, tx_hash = %receipt.tx_hash, "transaction confirmed");
        // The transaction is final either way; a failed refresh only leaves
        // the previous snapshot published.
        let _ = self.refresh().await;
        Ok(receipt)
    }

    /// Runs a ledger call under the configured timeout.
    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, LedgerError>>,
    ) -> Result<T, LotteryError> {
        let Some(limit) = self.config.request_timeout() else {
            return Ok(request.await?);
        };
        match tokio::time::timeout(limit, request).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(LotteryError::Transport(format!(
                "ledger call timed out after {limit:?}"
            ))),
        }
    }
}

fn check_record(record: &LotteryRecord, expected_id: u64) -> Result<(), LotteryError> {
    if record.id != expected_id {
        return Err(LotteryError::Transport(format!(
            "asked for lottery {expected_id}, got lottery {}",
            record.id
        )));
    }
    if !record.is_consistent() {
        return Err(LotteryError::Transport(format!(
            "lottery {} is claimed without a winner",
            record.id
        )));
    }
    Ok(())
}
