// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! GraphQL surface of a read model, consumed by the UI.

use std::sync::Arc;

use async_graphql::{EmptySubscription, Error, ErrorExtensions, Object, Request, Response, Schema};
use futures::future::BoxFuture;
use linera_sdk::linera_base_types::{AccountOwner, Amount};
use lottery_abi::{LotteryRecord, Role, TicketRecord};

use crate::error::LotteryError;
use crate::format::{from_decimal, to_decimal};
use crate::ledger::{Ledger, TxReceipt};
use crate::model::LotteryReadModel;
use crate::randomness::RandomnessProvider;
use crate::snapshot::{Session, Snapshot};

/// Object-safe view of a read model, so the schema does not depend on the
/// ledger and randomness types.
pub trait LotteryActions: Send + Sync {
    fn snapshot(&self) -> Arc<Snapshot>;
    fn session(&self) -> Session;
    fn last_failure(&self) -> Option<LotteryError>;
    fn default_ticket_price(&self) -> Amount;
    fn connect(&self, address: AccountOwner) -> BoxFuture<'_, Result<Arc<Snapshot>, LotteryError>>;
    fn disconnect(&self);
    fn refresh(&self) -> BoxFuture<'_, Result<Arc<Snapshot>, LotteryError>>;
    fn create_lottery(&self, ticket_price: Amount) -> BoxFuture<'_, Result<TxReceipt, LotteryError>>;
    fn buy_ticket(&self, lottery_id: u64) -> BoxFuture<'_, Result<TxReceipt, LotteryError>>;
    fn pick_winner(&self, lottery_id: u64) -> BoxFuture<'_, Result<TxReceipt, LotteryError>>;
    fn claim_prize(
        &self,
        lottery_id: u64,
        ticket_id: u64,
    ) -> BoxFuture<'_, Result<TxReceipt, LotteryError>>;
    fn request_participant_role(&self) -> BoxFuture<'_, Result<TxReceipt, LotteryError>>;
    fn assign_role(
        &self,
        account: AccountOwner,
        role: Role,
    ) -> BoxFuture<'_, Result<TxReceipt, LotteryError>>;
}

impl<L, R> LotteryActions for LotteryReadModel<L, R>
where
    L: Ledger + 'static,
    R: RandomnessProvider + 'static,
{
    fn snapshot(&self) -> Arc<Snapshot> {
        LotteryReadModel::snapshot(self)
    }

    fn session(&self) -> Session {
        LotteryReadModel::session(self)
    }

    fn last_failure(&self) -> Option<LotteryError> {
        LotteryReadModel::last_failure(self)
    }

    fn default_ticket_price(&self) -> Amount {
        self.config().default_ticket_price
    }

    fn connect(&self, address: AccountOwner) -> BoxFuture<'_, Result<Arc<Snapshot>, LotteryError>> {
        Box::pin(LotteryReadModel::connect(self, address))
    }

    fn disconnect(&self) {
        LotteryReadModel::disconnect(self)
    }

    fn refresh(&self) -> BoxFuture<'_, Result<Arc<Snapshot>, LotteryError>> {
        Box::pin(LotteryReadModel::refresh(self))
    }

    fn create_lottery(&self, ticket_price: Amount) -> BoxFuture<'_, Result<TxReceipt, LotteryError>> {
        Box::pin(LotteryReadModel::create_lottery(self, ticket_price))
    }

    fn buy_ticket(&self, lottery_id: u64) -> BoxFuture<'_, Result<TxReceipt, LotteryError>> {
        Box::pin(LotteryReadModel::buy_ticket(self, lottery_id))
    }

    fn pick_winner(&self, lottery_id: u64) -> BoxFuture<'_, Result<TxReceipt, LotteryError>> {
        Box::pin(LotteryReadModel::pick_winner(self, lottery_id))
    }

    fn claim_prize(
        &self,
        lottery_id: u64,
        ticket_id: u64,
    ) -> BoxFuture<'_, Result<TxReceipt, LotteryError>> {
        Box::pin(LotteryReadModel::claim_prize(self, lottery_id, ticket_id))
    }

    fn request_participant_role(&self) -> BoxFuture<'_, Result<TxReceipt, LotteryError>> {
        Box::pin(LotteryReadModel::request_participant_role(self))
    }

    fn assign_role(
        &self,
        account: AccountOwner,
        role: Role,
    ) -> BoxFuture<'_, Result<TxReceipt, LotteryError>> {
        Box::pin(LotteryReadModel::assign_role(self, account, role))
    }
}

pub struct LotteryService {
    model: Arc<dyn LotteryActions>,
}

impl LotteryService {
    pub fn new(model: Arc<dyn LotteryActions>) -> Self {
        LotteryService { model }
    }

    pub async fn handle_query(&self, request: impl Into<Request>) -> Response {
        let schema = Schema::build(
            QueryRoot {
                model: self.model.clone(),
            },
            MutationRoot {
                model: self.model.clone(),
            },
            EmptySubscription,
        )
        .finish();
        schema.execute(request).await
    }
}

fn graphql_error(error: LotteryError) -> Error {
    let code = error.code();
    Error::new(error.to_string()).extend_with(|_, extensions| extensions.set("code", code))
}

struct QueryRoot {
    model: Arc<dyn LotteryActions>,
}

#[Object]
impl QueryRoot {
    /// The whole last published snapshot
    async fn snapshot(&self) -> Snapshot {
        self.model.snapshot().as_ref().clone()
    }

    /// The current lottery, if one was ever created
    async fn lottery(&self) -> Option<LotteryRecord> {
        self.model.snapshot().lottery.clone()
    }

    /// Tickets of the current lottery
    async fn tickets(&self) -> Vec<TicketRecord> {
        self.model.snapshot().tickets.clone()
    }

    /// Finished lotteries
    async fn history(&self) -> Vec<LotteryRecord> {
        self.model.snapshot().history.clone()
    }

    async fn session(&self) -> Session {
        self.model.session()
    }

    /// Prize pot of the current lottery as a decimal string
    async fn lottery_pot(&self) -> String {
        to_decimal(self.model.snapshot().lottery_pot())
    }

    async fn is_finished(&self) -> bool {
        self.model.snapshot().is_finished()
    }

    /// Whether the connected wallet can claim the current prize
    async fn can_claim(&self) -> bool {
        self.model.session().can_claim
    }

    /// Tickets of the connected wallet in the current lottery
    async fn my_tickets(&self) -> Vec<TicketRecord> {
        match self.model.session().connected_address {
            Some(address) => self.model.snapshot().tickets_of(&address),
            None => Vec::new(),
        }
    }

    /// Why the last synchronization failed; the snapshot is stale while set
    async fn last_failure(&self) -> Option<String> {
        self.model.last_failure().map(|error| error.to_string())
    }

    async fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

struct MutationRoot {
    model: Arc<dyn LotteryActions>,
}

#[Object]
impl MutationRoot {
    /// Start a wallet session and synchronize for it
    async fn connect(&self, address: AccountOwner) -> Result<Snapshot, Error> {
        let snapshot = self.model.connect(address).await.map_err(graphql_error)?;
        Ok(snapshot.as_ref().clone())
    }

    async fn disconnect(&self) -> bool {
        self.model.disconnect();
        true
    }

    /// Synchronize now
    async fn refresh(&self) -> Result<Snapshot, Error> {
        let snapshot = self.model.refresh().await.map_err(graphql_error)?;
        Ok(snapshot.as_ref().clone())
    }

    /// Create a lottery; the ticket price is a decimal string
    async fn create_lottery(&self, ticket_price: Option<String>) -> Result<String, Error> {
        let ticket_price = match ticket_price {
            Some(price) => from_decimal(&price).map_err(graphql_error)?,
            None => self.model.default_ticket_price(),
        };
        let receipt = self
            .model
            .create_lottery(ticket_price)
            .await
            .map_err(graphql_error)?;
        Ok(receipt.tx_hash)
    }

    /// Buy a ticket, by default in the current lottery
    async fn buy_ticket(&self, lottery_id: Option<u64>) -> Result<String, Error> {
        let lottery_id = lottery_id.unwrap_or(self.model.snapshot().lottery_id);
        let receipt = self.model.buy_ticket(lottery_id).await.map_err(graphql_error)?;
        Ok(receipt.tx_hash)
    }

    /// Draw the winner, by default of the current lottery
    async fn pick_winner(&self, lottery_id: Option<u64>) -> Result<String, Error> {
        let lottery_id = lottery_id.unwrap_or(self.model.snapshot().lottery_id);
        let receipt = self.model.pick_winner(lottery_id).await.map_err(graphql_error)?;
        Ok(receipt.tx_hash)
    }

    /// Claim the prize, by default with the caller's winning ticket
    async fn claim_prize(
        &self,
        lottery_id: Option<u64>,
        ticket_id: Option<u64>,
    ) -> Result<String, Error> {
        let lottery_id = lottery_id.unwrap_or(self.model.snapshot().lottery_id);
        let ticket_id = ticket_id
            .or(self.model.session().caller_winning_ticket_id)
            .ok_or_else(|| graphql_error(LotteryError::NotWinner))?;
        let receipt = self
            .model
            .claim_prize(lottery_id, ticket_id)
            .await
            .map_err(graphql_error)?;
        Ok(receipt.tx_hash)
    }

    async fn request_participant_role(&self) -> Result<String, Error> {
        let receipt = self
            .model
            .request_participant_role()
            .await
            .map_err(graphql_error)?;
        Ok(receipt.tx_hash)
    }

    async fn assign_role(&self, account: AccountOwner, role: Role) -> Result<String, Error> {
        let receipt = self
            .model
            .assign_role(account, role)
            .await
            .map_err(graphql_error)?;
        Ok(receipt.tx_hash)
    }
}
