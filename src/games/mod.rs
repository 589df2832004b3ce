//! Discrete round games
//!
//! Each game drives a single `Round` through bet, moves and settlement, with
//! outcomes drawn from an injected `RandomSource`. The caller owns the
//! ledger and passes it to every money-moving call.

pub mod crash;
pub mod mines;

pub use crash::{CrashConfig, CrashGame};
pub use mines::{MinesConfig, MinesGame, Reveal};

use crate::error::ConfigError;
use crate::multiplier::Multiplier;

/// Largest house edge a config may ask for
pub const MAX_HOUSE_EDGE: f64 = 0.5;

/// Floor a ratio to whole hundredths. The epsilon absorbs binary noise on
/// exact values such as `0.99 * 2.0`.
pub(crate) fn floor_multiplier(value: f64) -> Multiplier {
    let hundredths = (value * 100.0 + 1e-9).floor();
    Multiplier(hundredths.clamp(0.0, u32::MAX as f64) as u32)
}

pub(crate) fn validate_edge(edge: f64) -> Result<(), ConfigError> {
    if !(edge.is_finite() && (0.0..MAX_HOUSE_EDGE).contains(&edge)) {
        return Err(ConfigError::InvalidValue {
            field: "house_edge",
            reason: format!("must be within [0, {MAX_HOUSE_EDGE}), got {edge}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_multiplier() {
        assert_eq!(floor_multiplier(0.99 * 2.0), Multiplier(198));
        assert_eq!(floor_multiplier(1.0312), Multiplier(103));
        assert_eq!(floor_multiplier(f64::INFINITY), Multiplier(u32::MAX));
    }

    #[test]
    fn test_edge_bounds() {
        assert!(validate_edge(0.01).is_ok());
        assert!(validate_edge(0.0).is_ok());
        assert!(validate_edge(0.5).is_err());
        assert!(validate_edge(f64::NAN).is_err());
    }
}
