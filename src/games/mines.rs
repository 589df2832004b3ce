//! Mines: reveal tiles on a 5×5 grid, cash out before hitting a mine
//!
//! Mines are placed when the bet is taken. Each safe reveal raises the
//! multiplier to the fair odds of having survived so far, less the house edge:
//! `(1 - edge) * Π (25 - i) / (25 - mines - i)` over the reveals made.

use serde::{Deserialize, Serialize};

use super::{floor_multiplier, validate_edge};
use crate::error::{ConfigError, GameError};
use crate::ledger::{BalanceService, PayoutLedger};
use crate::multiplier::Multiplier;
use crate::round::{Round, RoundEvent, RoundId, RoundState, Settlement};
use crate::sim::rng::RandomSource;

/// Tiles on the board
pub const GRID_SIZE: usize = 25;
/// Tiles per row
pub const GRID_WIDTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinesConfig {
    pub house_edge: f64,
}

impl Default for MinesConfig {
    fn default() -> Self {
        Self { house_edge: 0.01 }
    }
}

impl MinesConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_edge(self.house_edge)
    }
}

/// Result of one reveal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reveal {
    /// Safe; the round continues at `multiplier`
    Safe { multiplier: Multiplier },
    /// Mine; the round is lost
    Mine(RoundEvent),
    /// Last safe tile; paid out automatically
    Cleared(RoundEvent),
}

/// One Mines table
#[derive(Debug, Clone)]
pub struct MinesGame {
    config: MinesConfig,
    round: Round,
    mine_count: usize,
    mines: [bool; GRID_SIZE],
    revealed: [bool; GRID_SIZE],
    safe_revealed: usize,
}

impl MinesGame {
    pub fn new(config: MinesConfig, first_round: RoundId) -> Self {
        Self {
            config,
            round: Round::new(first_round),
            mine_count: 0,
            mines: [false; GRID_SIZE],
            revealed: [false; GRID_SIZE],
            safe_revealed: 0,
        }
    }

    /// Take the wager and hide `mine_count` mines (1..=24)
    pub fn start<B: BalanceService, R: RandomSource + ?Sized>(
        &mut self,
        wager: u64,
        mine_count: usize,
        ledger: &mut PayoutLedger<B>,
        rng: &mut R,
    ) -> Result<RoundEvent, GameError> {
        if !(1..GRID_SIZE).contains(&mine_count) {
            return Err(ConfigError::InvalidValue {
                field: "mines",
                reason: format!("must be within 1..={}, got {mine_count}", GRID_SIZE - 1),
            }
            .into());
        }
        let event = self.round.place_bet(wager, ledger)?;

        // Partial Fisher-Yates over tile indices
        let mut tiles: [usize; GRID_SIZE] = std::array::from_fn(|i| i);
        for i in 0..mine_count {
            let span = GRID_SIZE - i;
            let j = i + ((rng.uniform() * span as f32) as usize).min(span - 1);
            tiles.swap(i, j);
        }
        self.mines = [false; GRID_SIZE];
        for &tile in &tiles[..mine_count] {
            self.mines[tile] = true;
        }
        self.revealed = [false; GRID_SIZE];
        self.mine_count = mine_count;
        self.safe_revealed = 0;

        log::debug!("mines round {} started with {} mines", self.round.id(), mine_count);
        Ok(event)
    }

    pub fn reveal<B: BalanceService>(
        &mut self,
        tile: usize,
        ledger: &mut PayoutLedger<B>,
    ) -> Result<Reveal, GameError> {
        self.require_active("reveal")?;
        if tile >= GRID_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "tile",
                reason: format!("must be below {GRID_SIZE}, got {tile}"),
            }
            .into());
        }
        if self.revealed[tile] {
            return Err(GameError::InvalidStateTransition {
                action: "reveal",
                state: "revealed",
            });
        }
        self.revealed[tile] = true;

        if self.mines[tile] {
            log::debug!("mines round {}: mine at {}", self.round.id(), tile);
            return Ok(Reveal::Mine(self.round.resolve(Settlement::Loss, ledger)?));
        }

        self.safe_revealed += 1;
        let multiplier = self.multiplier();
        if self.safe_revealed == GRID_SIZE - self.mine_count {
            let event = self.round.resolve(Settlement::Multiplier(multiplier), ledger)?;
            return Ok(Reveal::Cleared(event));
        }
        Ok(Reveal::Safe { multiplier })
    }

    /// Take the current multiplier. Needs at least one safe reveal.
    pub fn cash_out<B: BalanceService>(
        &mut self,
        ledger: &mut PayoutLedger<B>,
    ) -> Result<RoundEvent, GameError> {
        self.require_active("cash out")?;
        if self.safe_revealed == 0 {
            return Err(GameError::InvalidStateTransition {
                action: "cash out",
                state: "unrevealed",
            });
        }
        self.round.resolve(Settlement::Multiplier(self.multiplier()), ledger)
    }

    /// Clear the board for the next round
    pub fn reset(&mut self) -> Result<Option<RoundEvent>, GameError> {
        let event = self.round.reset()?;
        self.mines = [false; GRID_SIZE];
        self.revealed = [false; GRID_SIZE];
        self.mine_count = 0;
        self.safe_revealed = 0;
        Ok(event)
    }

    fn require_active(&self, action: &'static str) -> Result<(), GameError> {
        match self.round.state() {
            RoundState::Active => Ok(()),
            state => Err(GameError::InvalidStateTransition {
                action,
                state: state.as_str(),
            }),
        }
    }

    /// Multiplier after `safe_revealed` safe reveals
    pub fn multiplier(&self) -> Multiplier {
        multiplier_for(self.mine_count, self.safe_revealed, self.config.house_edge)
    }

    /// Multiplier the next safe reveal would reach
    pub fn next_multiplier(&self) -> Multiplier {
        multiplier_for(self.mine_count, self.safe_revealed + 1, self.config.house_edge)
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn mine_count(&self) -> usize {
        self.mine_count
    }

    pub fn safe_revealed(&self) -> usize {
        self.safe_revealed
    }

    pub fn is_revealed(&self, tile: usize) -> bool {
        self.revealed.get(tile).copied().unwrap_or(false)
    }

    /// Mine layout, only once the round is over
    pub fn mines(&self) -> Option<&[bool; GRID_SIZE]> {
        (self.round.state() == RoundState::Resolved).then_some(&self.mines)
    }
}

/// `(1 - edge) * Π (25 - i) / (25 - mines - i)` for `i < reveals`.
/// No reveals pays 1x.
pub fn multiplier_for(mine_count: usize, reveals: usize, house_edge: f64) -> Multiplier {
    if reveals == 0 {
        return Multiplier::ONE;
    }
    let safe = GRID_SIZE.saturating_sub(mine_count);
    let reveals = reveals.min(safe);
    let odds: f64 = (0..reveals)
        .map(|i| (GRID_SIZE - i) as f64 / (safe - i) as f64)
        .product();
    floor_multiplier((1.0 - house_edge) * odds)
}
