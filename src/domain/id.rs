use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::error::PipelineError;

/// Provider-issued event identifier (`X-Shopify-Event-Id`), the idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::Validation("EventId must not be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Internal listing reference (`L-77`, uuid, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(String);

impl ListingId {
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::Validation("ListingId must not be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Wallet address as stored. Comparisons go through [`WalletAddress::matches`],
/// since external wallets do not agree on hex casing.
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletAddress(String);

pub const UNKNOWN_WALLET: &str = "unknown";

impl WalletAddress {
    /// Strict parse: `0x` followed by 40 hex digits.
    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        let raw = raw.trim();
        let valid = raw.len() == 42
            && (raw.starts_with("0x") || raw.starts_with("0X"))
            && raw[2..].chars().all(|c| c.is_ascii_hexdigit());
        if !valid {
            return Err(PipelineError::Validation(format!(
                "invalid wallet address format: {raw}"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// Lenient constructor for addresses coming out of provider payloads.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_WALLET.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_WALLET
    }

    pub fn matches(&self, other: &str) -> bool {
        !self.is_unknown() && self.0.eq_ignore_ascii_case(other.trim())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
