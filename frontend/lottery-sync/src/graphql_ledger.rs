// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! [`Ledger`] over the GraphQL service of the lottery application.

use std::future::Future;

use async_graphql::{ObjectType, Request, Response, Schema, SubscriptionType, Variables};
use linera_sdk::linera_base_types::AccountOwner;
use lottery_abi::{LotteryOperation, LotteryRecord, Role, TicketRecord};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use crate::ledger::{Ledger, LedgerError, Rejection, TxReceipt};

const LOTTERY_FIELDS: &str =
    "id authority ticketPrice lastTicketId winnerId winnerChosen claimed totalPrize";

/// Carries GraphQL requests to the ledger's service.
pub trait GraphQlTransport: Send + Sync {
    fn execute(&self, request: Request) -> impl Future<Output = Result<Response, LedgerError>> + Send;
}

/// A schema in the same process is a transport that cannot fail.
impl<Query, Mutation, Subscription> GraphQlTransport for Schema<Query, Mutation, Subscription>
where
    Query: ObjectType + 'static,
    Mutation: ObjectType + 'static,
    Subscription: SubscriptionType + 'static,
{
    async fn execute(&self, request: Request) -> Result<Response, LedgerError> {
        Ok(Schema::execute(self, request).await)
    }
}

pub struct GraphQlLedger<T> {
    transport: T,
}

impl<T: GraphQlTransport> GraphQlLedger<T> {
    pub fn new(transport: T) -> Self {
        GraphQlLedger { transport }
    }

    /// Runs `document` and decodes the `field` entry of the returned data.
    async fn request<V: DeserializeOwned>(
        &self,
        document: &str,
        variables: Value,
        field: &str,
    ) -> Result<V, LedgerError> {
        let request = Request::new(document).variables(Variables::from_json(variables));
        let response = self.transport.execute(request).await?;
        if let Some(error) = response.errors.first() {
            let code = error
                .extensions
                .as_ref()
                .and_then(|extensions| extensions.get("code"))
                .and_then(|code| match code {
                    async_graphql::Value::String(code) => Some(code.clone()),
                    _ => None,
                });
            debug!(field, message = %error.message, ?code, "ledger returned an error");
            return Err(match code {
                Some(code) => LedgerError::Rejected(Rejection::from_code(&code, &error.message)),
                None => LedgerError::Transport(error.message.clone()),
            });
        }
        let mut data = serde_json::to_value(&response.data)
            .map_err(|e| LedgerError::Transport(format!("unreadable response: {e}")))?;
        let value = data
            .get_mut(field)
            .map(Value::take)
            .ok_or_else(|| LedgerError::Transport(format!("response has no `{field}`")))?;
        serde_json::from_value(value)
            .map_err(|e| LedgerError::Transport(format!("malformed `{field}`: {e}")))
    }
}

impl<T: GraphQlTransport> Ledger for GraphQlLedger<T> {
    async fn lottery_id_counter(&self) -> Result<u64, LedgerError> {
        self.request("query { lotteryIdCounter }", json!({}), "lotteryIdCounter")
            .await
    }

    async fn lottery_info(&self, lottery_id: u64) -> Result<LotteryRecord, LedgerError> {
        let document = format!(
            "query($lotteryId: Int!) {{ lotteryInfo(lotteryId: $lotteryId) {{ {LOTTERY_FIELDS} }} }}"
        );
        self.request(&document, json!({ "lotteryId": lottery_id }), "lotteryInfo")
            .await
    }

    async fn ticket_info(&self, lottery_id: u64, ticket_id: u64) -> Result<TicketRecord, LedgerError> {
        self.request(
            "query($lotteryId: Int!, $ticketId: Int!) { \
             ticketInfo(lotteryId: $lotteryId, ticketId: $ticketId) { id lotteryId owner } }",
            json!({ "lotteryId": lottery_id, "ticketId": ticket_id }),
            "ticketInfo",
        )
        .await
    }

    async fn owner(&self) -> Result<AccountOwner, LedgerError> {
        self.request("query { owner }", json!({}), "owner").await
    }

    async fn has_role(&self, account: AccountOwner, role: Role) -> Result<bool, LedgerError> {
        let document = format!(
            "query($account: AccountOwner!) {{ hasRole(account: $account, role: {}) }}",
            role.graphql_name()
        );
        self.request(&document, json!({ "account": account }), "hasRole")
            .await
    }

    async fn submit(
        &self,
        sender: AccountOwner,
        operation: LotteryOperation,
    ) -> Result<TxReceipt, LedgerError> {
        let sender_json = json!(sender);
        let (document, variables, field) = match &operation {
            LotteryOperation::CreateLottery { ticket_price } => (
                "mutation($sender: AccountOwner!, $ticketPrice: Amount!) { \
                 createLottery(sender: $sender, ticketPrice: $ticketPrice) }"
                    .to_string(),
                json!({ "sender": sender_json, "ticketPrice": ticket_price }),
                "createLottery",
            ),
            LotteryOperation::BuyTicket {
                lottery_id,
                payment,
            } => (
                "mutation($sender: AccountOwner!, $lotteryId: Int!, $payment: Amount!) { \
                 buyTicket(sender: $sender, lotteryId: $lotteryId, payment: $payment) }"
                    .to_string(),
                json!({ "sender": sender_json, "lotteryId": lottery_id, "payment": payment }),
                "buyTicket",
            ),
            LotteryOperation::PickWinner {
                lottery_id,
                randomness,
            } => (
                "mutation($sender: AccountOwner!, $lotteryId: Int!, $randomness: String) { \
                 pickWinner(sender: $sender, lotteryId: $lotteryId, randomness: $randomness) }"
                    .to_string(),
                json!({
                    "sender": sender_json,
                    "lotteryId": lottery_id,
                    "randomness": randomness.as_ref().map(|proof| proof.to_hex()),
                }),
                "pickWinner",
            ),
            LotteryOperation::ClaimPrize {
                lottery_id,
                ticket_id,
            } => (
                "mutation($sender: AccountOwner!, $lotteryId: Int!, $ticketId: Int!) { \
                 claimPrize(sender: $sender, lotteryId: $lotteryId, ticketId: $ticketId) }"
                    .to_string(),
                json!({ "sender": sender_json, "lotteryId": lottery_id, "ticketId": ticket_id }),
                "claimPrize",
            ),
            LotteryOperation::AssignRole { account, role } => (
                format!(
                    "mutation($sender: AccountOwner!, $account: AccountOwner!) {{ \
                     assignRole(sender: $sender, account: $account, role: {}) }}",
                    role.graphql_name()
                ),
                json!({ "sender": sender_json, "account": account }),
                "assignRole",
            ),
            LotteryOperation::RequestRole { role } => (
                format!(
                    "mutation($sender: AccountOwner!) {{ requestRole(sender: $sender, role: {}) }}",
                    role.graphql_name()
                ),
                json!({ "sender": sender_json }),
                "requestRole",
            ),
        };
        let tx_hash: String = self.request(&document, variables, field).await?;
        Ok(TxReceipt { tx_hash, operation })
    }
}
