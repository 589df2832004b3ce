//! Generic round state machine
//!
//! `Idle → Active → Resolved → Idle`. Every game, continuous or discrete,
//! takes its wager with `place_bet` and pays out with `resolve`; the state
//! check makes duplicate submissions harmless.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::ledger::{BalanceService, PayoutLedger};
use crate::multiplier::Multiplier;

/// Round identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundId(pub u64);

impl RoundId {
    pub fn next(self) -> Self {
        RoundId(self.0 + 1)
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoundState {
    #[default]
    Idle,
    Active,
    Resolved,
}

impl RoundState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundState::Idle => "idle",
            RoundState::Active => "active",
            RoundState::Resolved => "resolved",
        }
    }
}

/// How a finished round pays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Settlement {
    /// Pay `wager * multiplier`
    Multiplier(Multiplier),
    /// Return the wager
    Push,
    /// Pay nothing
    Loss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Win,
    Loss,
    Push,
}

/// Result of a resolved round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub kind: OutcomeKind,
    pub payout: u64,
    pub multiplier: Option<Multiplier>,
}

impl RoundOutcome {
    fn settle(wager: u64, settlement: Settlement) -> Self {
        match settlement {
            Settlement::Multiplier(m) => {
                let payout = m.apply(wager);
                let kind = match payout.cmp(&wager) {
                    std::cmp::Ordering::Greater => OutcomeKind::Win,
                    std::cmp::Ordering::Equal => OutcomeKind::Push,
                    std::cmp::Ordering::Less => OutcomeKind::Loss,
                };
                Self {
                    kind,
                    payout,
                    multiplier: Some(m),
                }
            }
            Settlement::Push => Self {
                kind: OutcomeKind::Push,
                payout: wager,
                multiplier: Some(Multiplier::ONE),
            },
            Settlement::Loss => Self {
                kind: OutcomeKind::Loss,
                payout: 0,
                multiplier: None,
            },
        }
    }
}

/// Transition notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundEvent {
    BetPlaced { round: RoundId, wager: u64 },
    Resolved { round: RoundId, wager: u64, outcome: RoundOutcome },
    Reset { round: RoundId },
}

/// One bet-to-resolution cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    id: RoundId,
    wager: u64,
    state: RoundState,
    outcome: Option<RoundOutcome>,
}

impl Round {
    pub fn new(id: RoundId) -> Self {
        Self {
            id,
            wager: 0,
            state: RoundState::Idle,
            outcome: None,
        }
    }

    pub fn id(&self) -> RoundId {
        self.id
    }

    pub fn wager(&self) -> u64 {
        self.wager
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn outcome(&self) -> Option<RoundOutcome> {
        self.outcome
    }

    fn guard(&self, action: &'static str, allowed: RoundState) -> Result<(), GameError> {
        if self.state == allowed {
            Ok(())
        } else {
            Err(GameError::InvalidStateTransition {
                action,
                state: self.state.as_str(),
            })
        }
    }

    /// `Idle → Active`: debit the wager.
    ///
    /// On any error the round and the balance are untouched.
    pub fn place_bet<B: BalanceService>(
        &mut self,
        amount: u64,
        ledger: &mut PayoutLedger<B>,
    ) -> Result<RoundEvent, GameError> {
        self.guard("place bet", RoundState::Idle)?;
        if amount == 0 {
            return Err(GameError::InvalidAmount { amount: 0.0 });
        }
        ledger.debit(self.id, amount)?;
        self.wager = amount;
        self.state = RoundState::Active;
        Ok(RoundEvent::BetPlaced {
            round: self.id,
            wager: amount,
        })
    }

    /// `Active → Resolved`: credit the payout
    pub fn resolve<B: BalanceService>(
        &mut self,
        settlement: Settlement,
        ledger: &mut PayoutLedger<B>,
    ) -> Result<RoundEvent, GameError> {
        self.guard("resolve", RoundState::Active)?;
        let outcome = RoundOutcome::settle(self.wager, settlement);
        ledger.credit(self.id, outcome.payout)?;
        self.outcome = Some(outcome);
        self.state = RoundState::Resolved;
        Ok(RoundEvent::Resolved {
            round: self.id,
            wager: self.wager,
            outcome,
        })
    }

    /// `Resolved → Idle`, moving on to the next round id. No-op when idle.
    pub fn reset(&mut self) -> Result<Option<RoundEvent>, GameError> {
        match self.state {
            RoundState::Idle => Ok(None),
            RoundState::Active => Err(GameError::InvalidStateTransition {
                action: "reset",
                state: self.state.as_str(),
            }),
            RoundState::Resolved => {
                let finished = self.id;
                self.id = self.id.next();
                self.wager = 0;
                self.outcome = None;
                self.state = RoundState::Idle;
                Ok(Some(RoundEvent::Reset { round: finished }))
            }
        }
    }
}
