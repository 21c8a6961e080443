// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::future::Future;

use linera_sdk::linera_base_types::AccountOwner;
use lottery_abi::RandomnessProof;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomnessError(pub String);

impl fmt::Display for RandomnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RandomnessError {}

/// External oracle that authorizes a draw.
///
/// The payload it returns is never inspected here; it is handed to the ledger
/// in `PickWinner` exactly as received. `None` means the ledger draws without
/// an external proof.
pub trait RandomnessProvider: Send + Sync {
    fn authorize(
        &self,
        caller: AccountOwner,
        params: &[u8],
    ) -> impl Future<Output = Result<Option<RandomnessProof>, RandomnessError>> + Send;
}

/// Draws rely on the ledger alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRandomness;

impl RandomnessProvider for NoRandomness {
    async fn authorize(
        &self,
        _caller: AccountOwner,
        _params: &[u8],
    ) -> Result<Option<RandomnessProof>, RandomnessError> {
        Ok(None)
    }
}

/// Hands out a proof obtained ahead of time.
#[derive(Debug, Clone)]
pub struct FixedRandomness(pub RandomnessProof);

impl RandomnessProvider for FixedRandomness {
    async fn authorize(
        &self,
        _caller: AccountOwner,
        _params: &[u8],
    ) -> Result<Option<RandomnessProof>, RandomnessError> {
        Ok(Some(self.0.clone()))
    }
}

/// Parameter blob sent to the provider for a draw of `lottery_id`.
pub fn draw_params(lottery_id: u64) -> [u8; 8] {
    lottery_id.to_le_bytes()
}
