//! Event - Generator output
//!
//! Immutable banking event record flowing through both dispatch disciplines.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Metadata key: ISO currency code
pub const META_CURRENCY: &str = "currency";
/// Metadata key: settlement status
pub const META_STATUS: &str = "status";
/// Metadata key: two-letter country code
pub const META_COUNTRY_CODE: &str = "country_code";
/// Metadata key: external transaction reference
pub const META_TRANSACTION_ID: &str = "transaction_id";

/// Banking event
///
/// Created once by the generator and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique, monotonically increasing identifier
    pub id: u64,

    /// Event kind
    pub event_type: EventType,

    /// Account drawn from the simulated pool
    pub account_id: u32,

    /// Signed amount (negative for debits), rounded to cents
    pub amount: f64,

    /// Creation time, microseconds since the Unix epoch
    pub timestamp_us: i64,

    /// Origination channel
    pub channel: Channel,

    /// Small string map (currency, status, ...)
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Event {
    /// Look up a metadata value
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Closed set of event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Transaction,
    Deposit,
    Withdrawal,
    Transfer,
    Payment,
    Fee,
}

impl EventType {
    /// Every variant, in declaration order
    pub const ALL: [EventType; 6] = [
        EventType::Transaction,
        EventType::Deposit,
        EventType::Withdrawal,
        EventType::Transfer,
        EventType::Payment,
        EventType::Fee,
    ];

    /// Stable storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Transaction => "TRANSACTION",
            EventType::Deposit => "DEPOSIT",
            EventType::Withdrawal => "WITHDRAWAL",
            EventType::Transfer => "TRANSFER",
            EventType::Payment => "PAYMENT",
            EventType::Fee => "FEE",
        }
    }

    /// Parse the storage representation
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Whether money leaves the account
    pub fn is_debit(&self) -> bool {
        matches!(
            self,
            EventType::Withdrawal | EventType::Payment | EventType::Fee
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origination channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    Atm,
    Online,
    Mobile,
    Branch,
    Api,
}

impl Channel {
    /// Every variant, in declaration order
    pub const ALL: [Channel; 5] = [
        Channel::Atm,
        Channel::Online,
        Channel::Mobile,
        Channel::Branch,
        Channel::Api,
    ];

    /// Stable storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Atm => "ATM",
            Channel::Online => "ONLINE",
            Channel::Mobile => "MOBILE",
            Channel::Branch => "BRANCH",
            Channel::Api => "API",
        }
    }

    /// Parse the storage representation
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
