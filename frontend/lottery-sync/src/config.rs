// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use linera_sdk::linera_base_types::Amount;
use serde::{Deserialize, Serialize};

use crate::format;

/// Settings of a read model, usually read from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Price used by `create_lottery` when the caller gives none.
    #[serde(with = "format::decimal", default = "default_ticket_price")]
    pub default_ticket_price: Amount,
    /// Upper bound for every ledger call. Unset means wait forever.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// Period of the optional background refresh.
    #[serde(default)]
    pub refresh_interval_ms: Option<u64>,
    /// Check roles and claim eligibility before submitting, so obvious
    /// rejections skip a round trip.
    #[serde(default = "default_precheck")]
    pub precheck: bool,
    /// Ask for the authority role before creating a lottery without it.
    #[serde(default)]
    pub request_authority_role: bool,
}

fn default_ticket_price() -> Amount {
    Amount::from_millis(10) // 0.01
}

fn default_precheck() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            default_ticket_price: default_ticket_price(),
            request_timeout_ms: None,
            refresh_interval_ms: None,
            precheck: default_precheck(),
            request_authority_role: false,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(cause) => write!(f, "failed to read config: {cause}"),
            ConfigError::Parse(cause) => write!(f, "invalid config: {cause}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl SyncConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&contents)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}
