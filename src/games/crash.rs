//! Crash: a multiplier climbs until a hidden crash point
//!
//! The crash point is drawn when the bet is taken. The player cashes out at
//! the live multiplier, or loses the wager once it reaches the crash point.

use serde::{Deserialize, Serialize};

use super::{floor_multiplier, validate_edge};
use crate::error::{ConfigError, GameError};
use crate::ledger::{BalanceService, PayoutLedger};
use crate::multiplier::Multiplier;
use crate::round::{Round, RoundEvent, RoundId, RoundState, Settlement};
use crate::sim::rng::RandomSource;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashConfig {
    pub house_edge: f64,
    /// Multiplier growth: `e^(growth_rate * seconds)`
    pub growth_rate: f64,
    /// Upper bound on any crash point
    pub max_crash: Multiplier,
}

impl Default for CrashConfig {
    fn default() -> Self {
        Self {
            house_edge: 0.01,
            growth_rate: 0.06,
            max_crash: Multiplier(100_000),
        }
    }
}

impl CrashConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_edge(self.house_edge)?;
        if !(self.growth_rate.is_finite() && self.growth_rate > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "growth_rate",
                reason: format!("must be positive, got {}", self.growth_rate),
            });
        }
        if self.max_crash <= Multiplier::ONE {
            return Err(ConfigError::InvalidValue {
                field: "max_crash",
                reason: format!("must exceed 1.0x, got {}", self.max_crash),
            });
        }
        Ok(())
    }

    /// `max(1.00, floor(100 * (1 - edge) / (1 - u)) / 100)`, capped
    pub fn crash_point(&self, u: f32) -> Multiplier {
        let u = f64::from(u).clamp(0.0, 1.0 - f64::EPSILON);
        let point = floor_multiplier((1.0 - self.house_edge) / (1.0 - u));
        point.max(Multiplier::ONE).min(self.max_crash)
    }

    /// Live multiplier after `elapsed` seconds
    pub fn multiplier_at(&self, elapsed: f64) -> Multiplier {
        floor_multiplier((self.growth_rate * elapsed.max(0.0)).exp())
    }
}

/// One Crash round at a time
#[derive(Debug, Clone)]
pub struct CrashGame {
    config: CrashConfig,
    round: Round,
    crash_point: Multiplier,
    auto_cashout: Option<Multiplier>,
    elapsed: f64,
    current: Multiplier,
}

impl CrashGame {
    pub fn new(config: CrashConfig, first_round: RoundId) -> Self {
        Self {
            config,
            round: Round::new(first_round),
            crash_point: Multiplier::ONE,
            auto_cashout: None,
            elapsed: 0.0,
            current: Multiplier::ONE,
        }
    }

    /// Take the wager and draw the crash point.
    ///
    /// `auto_cashout`, when set, must be above 1.0x.
    pub fn start<B: BalanceService, R: RandomSource + ?Sized>(
        &mut self,
        wager: u64,
        auto_cashout: Option<Multiplier>,
        ledger: &mut PayoutLedger<B>,
        rng: &mut R,
    ) -> Result<RoundEvent, GameError> {
        if let Some(target) = auto_cashout {
            if target <= Multiplier::ONE {
                return Err(ConfigError::InvalidValue {
                    field: "auto_cashout",
                    reason: format!("must exceed 1.0x, got {target}"),
                }
                .into());
            }
        }
        let event = self.round.place_bet(wager, ledger)?;
        self.crash_point = self.config.crash_point(rng.uniform());
        self.auto_cashout = auto_cashout;
        self.elapsed = 0.0;
        self.current = Multiplier::ONE;
        log::debug!("crash round {} started", self.round.id());
        Ok(event)
    }

    /// Advance the clock. Returns the resolution if the round ended this step.
    ///
    /// A step on a round that is not running does nothing.
    pub fn tick<B: BalanceService>(
        &mut self,
        dt: f32,
        ledger: &mut PayoutLedger<B>,
    ) -> Result<Option<RoundEvent>, GameError> {
        if self.round.state() != RoundState::Active {
            return Ok(None);
        }
        self.elapsed += f64::from(dt.max(0.0));
        let live = self.config.multiplier_at(self.elapsed);

        if let Some(target) = self.auto_cashout {
            if live >= target && target < self.crash_point {
                self.current = target;
                log::debug!("crash round {} auto cashed out at {}", self.round.id(), target);
                return self.round.resolve(Settlement::Multiplier(target), ledger).map(Some);
            }
        }
        if live >= self.crash_point {
            self.current = self.crash_point;
            log::debug!("crash round {} crashed at {}", self.round.id(), self.crash_point);
            return self.round.resolve(Settlement::Loss, ledger).map(Some);
        }
        self.current = live;
        Ok(None)
    }

    /// Take the live multiplier
    pub fn cash_out<B: BalanceService>(
        &mut self,
        ledger: &mut PayoutLedger<B>,
    ) -> Result<RoundEvent, GameError> {
        if self.round.state() != RoundState::Active {
            return Err(GameError::InvalidStateTransition {
                action: "cash out",
                state: self.round.state().as_str(),
            });
        }
        self.round.resolve(Settlement::Multiplier(self.current), ledger)
    }

    pub fn reset(&mut self) -> Result<Option<RoundEvent>, GameError> {
        let event = self.round.reset()?;
        self.elapsed = 0.0;
        self.current = Multiplier::ONE;
        self.auto_cashout = None;
        Ok(event)
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn current(&self) -> Multiplier {
        self.current
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Crash point, only once the round is over
    pub fn crash_point(&self) -> Option<Multiplier> {
        (self.round.state() == RoundState::Resolved).then_some(self.crash_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::ledger::InMemoryBalance;
    use crate::round::OutcomeKind;
    use crate::sim::rng::ScriptedSource;

    fn ledger() -> PayoutLedger<InMemoryBalance> {
        PayoutLedger::new(InMemoryBalance::new(10_000))
    }

    fn run(game: &mut CrashGame, ledger: &mut PayoutLedger<InMemoryBalance>) -> RoundEvent {
        for _ in 0..100_000 {
            if let Some(event) = game.tick(SIM_DT, ledger).unwrap() {
                return event;
            }
        }
        panic!("round never ended");
    }

    #[test]
    fn test_crash_point_formula() {
        let config = CrashConfig::default();
        assert_eq!(config.crash_point(0.0), Multiplier::ONE);
        assert_eq!(config.crash_point(0.5), Multiplier(198));
        assert_eq!(config.crash_point(0.75), Multiplier(396));
        assert_eq!(config.crash_point(0.999_999_9), config.max_crash);
    }

    #[test]
    fn test_crash_loses_wager() {
        let mut game = CrashGame::new(CrashConfig::default(), RoundId(1));
        let mut ledger = ledger();
        game.start(1_000, None, &mut ledger, &mut ScriptedSource::constant(0.5))
            .unwrap();
        assert_eq!(game.crash_point(), None);

        let event = run(&mut game, &mut ledger);
        assert!(matches!(event, RoundEvent::Resolved { outcome, .. } if outcome.kind == OutcomeKind::Loss));
        assert_eq!(game.crash_point(), Some(Multiplier(198)));
        assert_eq!(game.current(), Multiplier(198));
        assert_eq!(ledger.balance(), 9_000);
        // e^(0.06 t) = 1.98 at t ≈ 11.4s
        assert!((game.elapsed() - 11.38).abs() < 0.1);
    }

    #[test]
    fn test_manual_cash_out() {
        let mut game = CrashGame::new(CrashConfig::default(), RoundId(1));
        let mut ledger = ledger();
        game.start(1_000, None, &mut ledger, &mut ScriptedSource::constant(0.5))
            .unwrap();
        // Five seconds in: e^0.3 ≈ 1.3498
        for _ in 0..300 {
            assert_eq!(game.tick(SIM_DT, &mut ledger).unwrap(), None);
        }
        assert_eq!(game.current(), Multiplier(134));
        let event = game.cash_out(&mut ledger).unwrap();
        assert!(matches!(event, RoundEvent::Resolved { outcome, .. } if outcome.payout == 1_340));
        assert_eq!(ledger.balance(), 10_340);

        // Late ticks and a second cash-out do nothing
        assert_eq!(game.tick(SIM_DT, &mut ledger).unwrap(), None);
        assert!(game.cash_out(&mut ledger).is_err());
    }

    #[test]
    fn test_auto_cash_out() {
        let mut game = CrashGame::new(CrashConfig::default(), RoundId(1));
        let mut ledger = ledger();
        game.start(
            1_000,
            Some(Multiplier(150)),
            &mut ledger,
            &mut ScriptedSource::constant(0.5),
        )
        .unwrap();
        let event = run(&mut game, &mut ledger);
        assert!(matches!(event, RoundEvent::Resolved { outcome, .. } if outcome.payout == 1_500));
        assert_eq!(ledger.balance(), 10_500);
    }

    #[test]
    fn test_auto_target_above_crash_loses() {
        let mut game = CrashGame::new(CrashConfig::default(), RoundId(1));
        let mut ledger = ledger();
        game.start(
            1_000,
            Some(Multiplier(300)),
            &mut ledger,
            &mut ScriptedSource::constant(0.5),
        )
        .unwrap();
        let event = run(&mut game, &mut ledger);
        assert!(matches!(event, RoundEvent::Resolved { outcome, .. } if outcome.payout == 0));
    }

    #[test]
    fn test_instant_crash() {
        let mut game = CrashGame::new(CrashConfig::default(), RoundId(1));
        let mut ledger = ledger();
        game.start(1_000, None, &mut ledger, &mut ScriptedSource::constant(0.0))
            .unwrap();
        let event = game.tick(SIM_DT, &mut ledger).unwrap();
        assert!(matches!(event, Some(RoundEvent::Resolved { outcome, .. }) if outcome.payout == 0));
    }

    #[test]
    fn test_start_validation() {
        let mut game = CrashGame::new(CrashConfig::default(), RoundId(1));
        let mut ledger = ledger();
        let mut rng = ScriptedSource::constant(0.5);
        assert!(matches!(
            game.start(100, Some(Multiplier::ONE), &mut ledger, &mut rng),
            Err(GameError::Configuration(_))
        ));
        assert!(game.cash_out(&mut ledger).is_err());
        game.start(100, None, &mut ledger, &mut rng).unwrap();
        assert!(game.start(100, None, &mut ledger, &mut rng).is_err());
        assert_eq!(ledger.balance(), 9_900);
        assert!(game.reset().is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(CrashConfig::default().validate().is_ok());
        let bad = CrashConfig {
            growth_rate: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = CrashConfig {
            max_crash: Multiplier::ONE,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
