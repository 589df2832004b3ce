//! Payout ledger: the only path that moves money
//!
//! The balance itself belongs to an external service. Every debit and credit
//! goes through `PayoutLedger`, which checks funds and applies the delta in
//! one synchronous call and journals the result. The journal keeps the most
//! recent entries only; lifetime totals are tracked separately.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::consts::JOURNAL_LEN;
use crate::error::{GameError, LedgerError};
use crate::round::RoundId;

/// External balance owner
pub trait BalanceService {
    /// Current balance in minor units
    fn balance(&self) -> u64;

    /// Apply a signed delta, returning the new balance
    fn apply_delta(&mut self, delta: i64) -> Result<u64, LedgerError>;
}

impl<T: BalanceService + ?Sized> BalanceService for &mut T {
    fn balance(&self) -> u64 {
        (**self).balance()
    }

    fn apply_delta(&mut self, delta: i64) -> Result<u64, LedgerError> {
        (**self).apply_delta(delta)
    }
}

impl<T: BalanceService + ?Sized> BalanceService for Box<T> {
    fn balance(&self) -> u64 {
        (**self).balance()
    }

    fn apply_delta(&mut self, delta: i64) -> Result<u64, LedgerError> {
        (**self).apply_delta(delta)
    }
}

/// Process-local balance, for tests, demos and the CLI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryBalance {
    balance: u64,
}

impl InMemoryBalance {
    pub fn new(balance: u64) -> Self {
        Self { balance }
    }
}

impl BalanceService for InMemoryBalance {
    fn balance(&self) -> u64 {
        self.balance
    }

    fn apply_delta(&mut self, delta: i64) -> Result<u64, LedgerError> {
        let next = if delta >= 0 {
            self.balance
                .checked_add(delta.unsigned_abs())
                .ok_or(LedgerError::Overflow)?
        } else {
            self.balance
                .checked_sub(delta.unsigned_abs())
                .ok_or(LedgerError::Overdraw {
                    balance: self.balance,
                    delta,
                })?
        };
        self.balance = next;
        Ok(next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Debit,
    Credit,
}

/// One applied balance mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub round: RoundId,
    pub kind: EntryKind,
    pub amount: u64,
    pub balance_after: u64,
}

/// Façade over the external balance
#[derive(Debug)]
pub struct PayoutLedger<B> {
    service: B,
    journal: VecDeque<LedgerEntry>,
    journal_len: usize,
    total_debited: u64,
    total_credited: u64,
}

impl<B: BalanceService> PayoutLedger<B> {
    pub fn new(service: B) -> Self {
        Self::with_journal_len(service, JOURNAL_LEN)
    }

    /// Keep at most `journal_len` entries (at least one)
    pub fn with_journal_len(service: B, journal_len: usize) -> Self {
        Self {
            service,
            journal: VecDeque::new(),
            journal_len: journal_len.max(1),
            total_debited: 0,
            total_credited: 0,
        }
    }

    pub fn balance(&self) -> u64 {
        self.service.balance()
    }

    /// Take a wager. Fails without touching the balance if funds are short.
    pub fn debit(&mut self, round: RoundId, amount: u64) -> Result<u64, GameError> {
        if amount == 0 {
            return Err(GameError::InvalidAmount { amount: 0.0 });
        }
        let available = self.service.balance();
        if amount > available {
            return Err(GameError::InsufficientFunds {
                requested: amount,
                available,
            });
        }
        let delta = i64::try_from(amount).map_err(|_| LedgerError::AmountTooLarge(amount))?;
        let balance_after = self.service.apply_delta(-delta)?;
        self.total_debited = self.total_debited.saturating_add(amount);
        self.record(round, EntryKind::Debit, amount, balance_after);
        Ok(balance_after)
    }

    /// Pay out winnings. A zero payout is journaled without a service call.
    pub fn credit(&mut self, round: RoundId, amount: u64) -> Result<u64, GameError> {
        let balance_after = if amount == 0 {
            self.service.balance()
        } else {
            let delta = i64::try_from(amount).map_err(|_| LedgerError::AmountTooLarge(amount))?;
            self.service.apply_delta(delta)?
        };
        self.total_credited = self.total_credited.saturating_add(amount);
        self.record(round, EntryKind::Credit, amount, balance_after);
        Ok(balance_after)
    }

    fn record(&mut self, round: RoundId, kind: EntryKind, amount: u64, balance_after: u64) {
        log::debug!("ledger {:?} {} for round {}, balance {}", kind, amount, round, balance_after);
        if self.journal.len() == self.journal_len {
            self.journal.pop_front();
        }
        self.journal.push_back(LedgerEntry {
            round,
            kind,
            amount,
            balance_after,
        });
    }

    /// Most recent entries, oldest first
    pub fn journal(&self) -> &VecDeque<LedgerEntry> {
        &self.journal
    }

    /// Hand the journal to an external store, leaving it empty
    pub fn drain_journal(&mut self) -> Vec<LedgerEntry> {
        self.journal.drain(..).collect()
    }

    pub fn total_debited(&self) -> u64 {
        self.total_debited
    }

    pub fn total_credited(&self) -> u64 {
        self.total_credited
    }

    pub fn service(&self) -> &B {
        &self.service
    }

    pub fn into_inner(self) -> B {
        self.service
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debit_and_credit() {
        let mut ledger = PayoutLedger::new(InMemoryBalance::new(500));
        assert_eq!(ledger.debit(RoundId(1), 100).unwrap(), 400);
        assert_eq!(ledger.credit(RoundId(1), 250).unwrap(), 650);
        assert_eq!(ledger.balance(), 650);
        assert_eq!(ledger.journal().len(), 2);
        assert_eq!(ledger.total_debited(), 100);
        assert_eq!(ledger.total_credited(), 250);
    }

    #[test]
    fn test_insufficient_funds_leaves_balance() {
        let mut ledger = PayoutLedger::new(InMemoryBalance::new(500));
        let err = ledger.debit(RoundId(1), 1000).unwrap_err();
        assert_eq!(
            err,
            GameError::InsufficientFunds {
                requested: 1000,
                available: 500
            }
        );
        assert_eq!(ledger.balance(), 500);
        assert!(ledger.journal().is_empty());
    }

    #[test]
    fn test_zero_debit_rejected() {
        let mut ledger = PayoutLedger::new(InMemoryBalance::new(500));
        assert!(matches!(
            ledger.debit(RoundId(1), 0),
            Err(GameError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_zero_credit_journaled() {
        let mut ledger = PayoutLedger::new(InMemoryBalance::new(10));
        assert_eq!(ledger.credit(RoundId(3), 0).unwrap(), 10);
        assert_eq!(ledger.journal()[0].kind, EntryKind::Credit);
    }

    #[test]
    fn test_service_rejection_propagates() {
        struct Frozen;
        impl BalanceService for Frozen {
            fn balance(&self) -> u64 {
                1_000
            }
            fn apply_delta(&mut self, _delta: i64) -> Result<u64, LedgerError> {
                Err(LedgerError::Rejected("account frozen".to_string()))
            }
        }

        let mut ledger = PayoutLedger::new(Frozen);
        let err = ledger.debit(RoundId(1), 10).unwrap_err();
        assert!(matches!(err, GameError::Ledger(LedgerError::Rejected(_))));
        assert!(ledger.journal().is_empty());
    }

    #[test]
    fn test_in_memory_never_negative() {
        let mut balance = InMemoryBalance::new(5);
        assert!(balance.apply_delta(-6).is_err());
        assert_eq!(balance.balance(), 5);
        assert!(InMemoryBalance::new(u64::MAX).apply_delta(1).is_err());
    }

    #[test]
    fn test_journal_keeps_recent_entries() {
        let mut ledger = PayoutLedger::with_journal_len(InMemoryBalance::new(1_000), 3);
        for round in 1..=4 {
            ledger.debit(RoundId(round), 10).unwrap();
            ledger.credit(RoundId(round), 5).unwrap();
        }
        let journal = ledger.journal();
        assert_eq!(journal.len(), 3);
        assert_eq!(journal[0].round, RoundId(3));
        assert_eq!(journal[0].kind, EntryKind::Credit);
        assert_eq!(journal[2].balance_after, 980);
        // Totals cover every entry, not just the retained ones
        assert_eq!(ledger.total_debited(), 40);
        assert_eq!(ledger.total_credited(), 20);

        let drained = ledger.drain_journal();
        assert_eq!(drained.len(), 3);
        assert!(ledger.journal().is_empty());
        ledger.debit(RoundId(5), 10).unwrap();
        assert_eq!(ledger.journal().len(), 1);
    }

    #[test]
    fn test_borrowed_service() {
        let mut external = InMemoryBalance::new(100);
        {
            let mut ledger = PayoutLedger::new(&mut external);
            ledger.debit(RoundId(1), 40).unwrap();
        }
        assert_eq!(external.balance(), 60);
    }
}
