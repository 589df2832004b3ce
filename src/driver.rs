//! Fixed timestep driver
//!
//! The host owns the clock and calls `Driver::frame` with whatever frame time
//! it measured. Accumulated time is spent in whole `SIM_DT` ticks, at most
//! `max_substeps` per frame.

use crate::consts::*;
use crate::ledger::BalanceService;
use crate::multiplier::RiskLevel;
use crate::session::{GameSession, SessionInput, TickReport};
use crate::sim::rng::RandomSource;

/// Longest frame accepted; anything slower is treated as a stall
pub const MAX_FRAME_DT: f32 = 0.1;

/// Time accumulator for a fixed-rate tick loop
#[derive(Debug, Clone)]
pub struct FixedStep {
    accumulator: f32,
    max_substeps: u32,
}

impl Default for FixedStep {
    fn default() -> Self {
        Self::new(MAX_SUBSTEPS)
    }
}

impl FixedStep {
    pub fn new(max_substeps: u32) -> Self {
        Self {
            accumulator: 0.0,
            max_substeps: max_substeps.max(1),
        }
    }

    /// Add frame time and run `step` once per whole tick. Returns ticks run.
    pub fn advance(&mut self, frame_dt: f32, mut step: impl FnMut()) -> u32 {
        let dt = if frame_dt.is_finite() {
            frame_dt.clamp(0.0, MAX_FRAME_DT)
        } else {
            0.0
        };
        self.accumulator += dt;

        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < self.max_substeps {
            step();
            self.accumulator -= SIM_DT;
            substeps += 1;
        }
        // Spiral of death: drop time we could not catch up on
        if substeps == self.max_substeps {
            self.accumulator = self.accumulator.min(SIM_DT);
        }
        substeps
    }

    /// Fraction of a tick left over, for render interpolation
    pub fn alpha(&self) -> f32 {
        self.accumulator / SIM_DT
    }
}

/// Binds a session to a fixed-step clock and queues host input between frames
pub struct Driver<B, R> {
    pub session: GameSession<B, R>,
    step: FixedStep,
    input: SessionInput,
}

impl<B: BalanceService, R: RandomSource> Driver<B, R> {
    pub fn new(session: GameSession<B, R>) -> Self {
        let step = FixedStep::new(session.config().max_substeps);
        Self {
            session,
            step,
            input: SessionInput::default(),
        }
    }

    /// Queue a drop for the next tick
    pub fn queue_drop(&mut self, wager: u64) {
        self.input.drops.push(wager);
    }

    /// Queue a layout change for the next tick; replaces an earlier request
    pub fn queue_layout(&mut self, risk: RiskLevel, pockets: usize) {
        self.input.layout = Some((risk, pockets));
    }

    /// Run the ticks owed for `frame_dt` seconds.
    ///
    /// Queued input goes to the first tick only. If no tick is due it stays
    /// queued for the next frame.
    pub fn frame(&mut self, frame_dt: f32) -> Vec<TickReport> {
        let mut reports = Vec::new();
        let session = &mut self.session;
        let input = &mut self.input;
        self.step.advance(frame_dt, || {
            let pending = std::mem::take(input);
            reports.push(session.tick(&pending));
        });
        reports
    }

    pub fn alpha(&self) -> f32 {
        self.step.alpha()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryBalance;
    use crate::settings::GameConfig;

    #[test]
    fn test_accumulates_partial_frames() {
        let mut step = FixedStep::default();
        let mut ticks = 0;
        assert_eq!(step.advance(SIM_DT * 0.5, || ticks += 1), 0);
        assert_eq!(step.advance(SIM_DT * 0.6, || ticks += 1), 1);
        assert_eq!(ticks, 1);
        assert!(step.alpha() < 0.2);
    }

    #[test]
    fn test_substeps_capped() {
        let mut step = FixedStep::new(3);
        let mut ticks = 0;
        assert_eq!(step.advance(1.0, || ticks += 1), 3);
        // Backlog dropped after a stall
        assert!(step.alpha() <= 1.0);
        // A bad frame time adds nothing; the one tick kept is still due
        assert_eq!(step.advance(f32::NAN, || ticks += 1), 1);
        assert_eq!(ticks, 4);
    }

    #[test]
    fn test_driver_applies_input_once() {
        let session = GameSession::new(GameConfig::default(), InMemoryBalance::new(1_000), 9).unwrap();
        let mut driver = Driver::new(session);
        driver.queue_drop(100);

        // Three ticks due; the drop must only happen on the first
        let reports = driver.frame(SIM_DT * 3.0 + 0.001);
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].dropped.len(), 1);
        assert!(reports[1].dropped.is_empty());
        assert_eq!(driver.session.balance(), 900);
        assert_eq!(driver.session.tick_count(), 3);
    }

    #[test]
    fn test_input_waits_for_a_tick() {
        let session = GameSession::new(GameConfig::default(), InMemoryBalance::new(1_000), 9).unwrap();
        let mut driver = Driver::new(session);
        driver.queue_drop(100);
        assert!(driver.frame(0.001).is_empty());
        assert_eq!(driver.session.balance(), 1_000);
        let reports = driver.frame(SIM_DT);
        assert_eq!(reports.len(), 1);
        assert_eq!(driver.session.balance(), 900);
    }
}
