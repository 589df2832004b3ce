//! Error taxonomy for game actions
//!
//! Every variant is an expected user-input or configuration condition and is
//! returned as a typed result. Numerical trouble inside the physics step is
//! not here: it is recovered in place (see `sim::tick::SimulationAnomaly`).

use thiserror::Error;

/// Errors returned synchronously from bets, transitions and table generation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    #[error("invalid amount: {amount}")]
    InvalidAmount { amount: f64 },
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: u64, available: u64 },
    #[error("cannot {action} while round is {state}")]
    InvalidStateTransition {
        action: &'static str,
        state: &'static str,
    },
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Invalid risk / pocket / config combinations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("pocket count {count} out of range ({min}..={max})")]
    PocketCount { count: usize, min: usize, max: usize },
    #[error("unknown risk level: {0}")]
    UnknownRisk(String),
    #[error("{field} is invalid: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("failed to read config: {0}")]
    Io(String),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

/// Failures reported by the external balance service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("balance would go negative: balance {balance}, delta {delta}")]
    Overdraw { balance: u64, delta: i64 },
    #[error("balance overflow")]
    Overflow,
    #[error("amount {0} exceeds the ledger's delta range")]
    AmountTooLarge(u64),
    #[error("balance service rejected the request: {0}")]
    Rejected(String),
}
