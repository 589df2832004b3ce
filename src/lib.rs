//! Peg Casino - Plinko physics and round-based casino game core
//!
//! Core modules:
//! - `sim`: Deterministic ball simulation (physics, pegs, pockets)
//! - `multiplier`: Risk-dependent payout tables
//! - `round`: Bet → active → resolved state machine shared by every game
//! - `ledger`: Sole write path to the external balance service
//! - `session`: Plinko orchestrator driving balls, rounds and payouts
//! - `games`: Discrete round games (Mines, Crash) on the same round machine
//! - `events`: Event, sound and snapshot ports for the host
//! - `driver`: Fixed timestep accumulator for host frame loops
//! - `history`: Recent results and top wins
//! - `settings`: Data-driven configuration

pub mod driver;
pub mod error;
pub mod events;
pub mod games;
pub mod history;
pub mod ledger;
pub mod multiplier;
pub mod round;
pub mod session;
pub mod settings;
pub mod sim;

pub use error::{ConfigError, GameError, LedgerError};
pub use history::ResultHistory;
pub use ledger::{BalanceService, InMemoryBalance, PayoutLedger};
pub use multiplier::{Multiplier, MultiplierTable, RiskLevel};
pub use round::{Round, RoundId, RoundState, Settlement};
pub use session::{GameSession, SessionInput, TickReport, UnpaidPayout};
pub use settings::GameConfig;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz game loop)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Pocket count bounds (peg rows = pockets - 1)
    pub const MIN_POCKETS: usize = 5;
    pub const MAX_POCKETS: usize = 17;
    pub const DEFAULT_POCKETS: usize = 13;

    /// Board geometry (board units, y grows downward)
    pub const PEG_SPACING: f32 = 40.0;
    pub const ROW_SPACING: f32 = 36.0;
    pub const TOP_MARGIN: f32 = 48.0;
    pub const PEG_RADIUS: f32 = 4.0;
    pub const BALL_RADIUS: f32 = 7.0;

    /// Gravity (units/s²)
    pub const GRAVITY: f32 = 900.0;
    /// Gravity jitter fraction (±)
    pub const GRAVITY_JITTER: f32 = 0.05;
    /// Horizontal friction per reference tick
    pub const FRICTION: f32 = 0.995;
    /// Energy kept in the normal component after a peg bounce
    pub const PEG_BOUNCE: f32 = 0.5;
    /// Random multiplicative spread applied after a peg bounce (±)
    pub const BOUNCE_SPREAD: f32 = 0.08;
    /// Energy kept after a wall bounce
    pub const WALL_BOUNCE: f32 = 0.6;
    /// Speed cap - keeps per-tick travel below ball + peg radius
    pub const MAX_SPEED: f32 = 480.0;

    /// Stuck detection window (ticks)
    pub const STUCK_WINDOW: usize = 10;
    /// Max displacement across the window that counts as stuck
    pub const STUCK_THRESHOLD: f32 = BALL_RADIUS * 0.5;
    /// Nudge impulse magnitude (units/s)
    pub const NUDGE_SPEED: f32 = 120.0;
    /// Extra downward bias added with every nudge (units/s)
    pub const NUDGE_DOWN_BIAS: f32 = 60.0;

    /// Ticks a settled ball stays visible before it is purged (1 second)
    pub const RETENTION_TICKS: u32 = 60;

    /// Starting horizontal spread of a dropped ball, in peg spacings
    pub const DROP_SPREAD: f32 = 0.5;
    /// Max starting horizontal speed (units/s, ±)
    pub const DROP_VX: f32 = 15.0;

    /// Default return-to-player target for calibrated tables
    pub const DEFAULT_TARGET_RETURN: f64 = 0.97;
    /// Lowest accepted return-to-player target. Every pocket pays at least
    /// 0.1x, so far lower targets cannot be met.
    pub const MIN_TARGET_RETURN: f64 = 0.5;
    /// Largest value a payout curve may reach, in multiples of the wager
    pub const MAX_CURVE_MULTIPLIER: f64 = 10_000.0;

    /// Ledger journal entries kept for audit
    pub const JOURNAL_LEN: usize = 4_096;
}

/// Minor units per whole currency unit (cents)
pub const MINOR_UNITS: u64 = 100;

/// Convert a decimal currency amount into minor units.
///
/// Rejects zero, negative and non-finite input; sub-cent fractions are
/// truncated, and an amount that truncates to zero is rejected too.
pub fn parse_amount(amount: f64) -> Result<u64, GameError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(GameError::InvalidAmount { amount });
    }
    let minor = (amount * MINOR_UNITS as f64).floor();
    if minor < 1.0 || minor >= u64::MAX as f64 {
        return Err(GameError::InvalidAmount { amount });
    }
    Ok(minor as u64)
}

/// Render minor units as a decimal string ("12.34")
pub fn format_amount(minor: u64) -> String {
    format!("{}.{:02}", minor / MINOR_UNITS, minor % MINOR_UNITS)
}
