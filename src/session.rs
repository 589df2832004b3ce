//! Plinko session orchestrator
//!
//! Owns the in-flight balls, one `Round` per ball and the payout ledger.
//! Host actions are either called directly or queued in a `SessionInput` and
//! applied at the start of the next tick, never mid-tick.

use std::collections::BTreeMap;

use glam::Vec2;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::GameError;
use crate::events::{BallView, BoardSnapshot, GameEvent, GameObserver, PresentationSink, SoundBus, SoundSink};
use crate::history::{DropResult, ResultHistory};
use crate::ledger::{BalanceService, PayoutLedger};
use crate::multiplier::{Multiplier, MultiplierTable, RiskLevel};
use crate::round::{Round, RoundEvent, RoundId, RoundState, Settlement};
use crate::settings::GameConfig;
use crate::sim::board::Board;
use crate::sim::rng::{RandomSource, RngState};
use crate::sim::state::{Ball, BallId};
use crate::sim::tick::{SimulationAnomaly, TickEvent, tick};

/// Host actions collected between ticks
#[derive(Debug, Clone, Default)]
pub struct SessionInput {
    /// Wagers to drop, in minor units, one ball each
    pub drops: Vec<u64>,
    /// Requested (risk, pocket count)
    pub layout: Option<(RiskLevel, usize)>,
}

/// What happened to a layout request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutChange {
    Applied,
    /// Parked until no ball is in flight
    Deferred,
}

/// Per-tick results
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: u64,
    /// One entry per queued drop, in input order
    pub dropped: Vec<Result<BallId, GameError>>,
    pub layout: Option<Result<LayoutChange, GameError>>,
    pub settled: Vec<DropResult>,
    pub anomalies: Vec<SimulationAnomaly>,
    /// Payouts that could not be credited
    pub errors: Vec<GameError>,
    /// Events since the previous report, in dispatch order
    pub events: Vec<GameEvent>,
}

/// A settled ball whose payout the balance service has not accepted yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpaidPayout {
    pub ball: BallId,
    pub pocket: usize,
    pub settlement: Settlement,
}

/// Plinko game session
pub struct GameSession<B, R = Pcg32> {
    config: GameConfig,
    board: Board,
    risk: RiskLevel,
    table: MultiplierTable,
    pending_layout: Option<(RiskLevel, usize)>,
    balls: Vec<Ball>,
    rounds: BTreeMap<RoundId, Round>,
    unpaid: BTreeMap<RoundId, UnpaidPayout>,
    ledger: PayoutLedger<B>,
    rng: R,
    history: ResultHistory,
    next_ball: BallId,
    next_round: RoundId,
    tick: u64,
    /// Emitted events not yet handed out; drained by `tick` and `drain_events`
    outbox: Vec<GameEvent>,
    observers: Vec<Box<dyn GameObserver>>,
    presenters: Vec<Box<dyn PresentationSink>>,
    sound: Option<SoundBus>,
}

impl<B: BalanceService> GameSession<B, Pcg32> {
    /// Session with a seeded PCG generator
    pub fn new(config: GameConfig, balance: B, seed: u64) -> Result<Self, GameError> {
        Self::with_rng(config, balance, RngState::new(seed).to_rng())
    }
}

impl<B: BalanceService, R: RandomSource> GameSession<B, R> {
    pub fn with_rng(config: GameConfig, balance: B, rng: R) -> Result<Self, GameError> {
        config.validate()?;
        let board = config.board_for(config.pockets)?;
        let table = config.table_for(config.risk, config.pockets)?;
        log::info!(
            "Session started: risk={} pockets={} edge={:.2}%",
            config.risk,
            config.pockets,
            table.house_edge() * 100.0
        );
        let ledger = PayoutLedger::with_journal_len(balance, config.journal_len);
        Ok(Self {
            risk: config.risk,
            history: ResultHistory::new(config.history_len),
            board,
            table,
            config,
            pending_layout: None,
            balls: Vec::new(),
            rounds: BTreeMap::new(),
            unpaid: BTreeMap::new(),
            ledger,
            rng,
            next_ball: 1,
            next_round: RoundId(1),
            tick: 0,
            outbox: Vec::new(),
            observers: Vec::new(),
            presenters: Vec::new(),
            sound: None,
        })
    }

    // === Host wiring ===

    pub fn add_observer(&mut self, observer: Box<dyn GameObserver>) {
        self.observers.push(observer);
    }

    pub fn add_presenter(&mut self, presenter: Box<dyn PresentationSink>) {
        self.presenters.push(presenter);
    }

    /// Load a sound backend; a previous one is released first
    pub fn attach_sound(&mut self, sink: Box<dyn SoundSink>) {
        if let Some(mut old) = self.sound.take() {
            old.close();
        }
        self.sound = Some(SoundBus::new(sink));
    }

    pub fn sound_mut(&mut self) -> Option<&mut SoundBus> {
        self.sound.as_mut()
    }

    /// Release host resources. Balls and balance are left as they are.
    pub fn close(&mut self) {
        if let Some(mut sound) = self.sound.take() {
            sound.close();
        }
        self.observers.clear();
        self.presenters.clear();
        log::info!(
            "Session closed after {} ticks: wagered {}, paid {}",
            self.tick,
            crate::format_amount(self.ledger.total_debited()),
            crate::format_amount(self.ledger.total_credited())
        );
    }

    // === Actions ===

    /// Drop one ball for `wager` minor units from a randomized spawn point
    pub fn drop_ball(&mut self, wager: u64) -> Result<BallId, GameError> {
        let spread = self.board.layout.peg_spacing * DROP_SPREAD;
        // Sum of two uniforms: triangular, peaked at the center
        let offset = (self.rng.uniform() + self.rng.uniform() - 1.0) * spread;
        let pos = Vec2::new(self.board.center_x() + offset, self.board.drop_y());
        let vel = Vec2::new(self.rng.signed() * DROP_VX, 0.0);
        self.drop_ball_at(wager, pos, vel)
    }

    /// Drop from a decimal currency amount
    pub fn drop_amount(&mut self, amount: f64) -> Result<BallId, GameError> {
        let wager = crate::parse_amount(amount)?;
        self.drop_ball(wager)
    }

    /// Drop one ball with an explicit spawn state.
    ///
    /// The wager is debited before the ball exists; on error nothing changes.
    pub fn drop_ball_at(&mut self, wager: u64, pos: Vec2, vel: Vec2) -> Result<BallId, GameError> {
        let mut round = Round::new(self.next_round);
        let bet = round.place_bet(wager, &mut self.ledger)?;
        self.next_round = self.next_round.next();

        let id = self.next_ball;
        self.next_ball += 1;
        let round_id = round.id();
        let mut ball = Ball::new(id, round_id, pos, vel);
        ball.radius = self.board.layout.ball_radius;
        ball.retention_ticks = self.config.retention_ticks.max(1);
        self.balls.push(ball);
        self.rounds.insert(round_id, round);

        log::debug!("ball {} dropped, wager {}, round {}", id, wager, round_id);
        self.emit(GameEvent::Round(bet));
        self.emit(GameEvent::BallDropped { ball: id, wager });
        Ok(id)
    }

    /// Change risk and pocket count.
    ///
    /// Invalid combinations fail immediately. Valid ones apply now if the
    /// board is clear, otherwise they are deferred (replacing any earlier
    /// pending request) until every ball has settled.
    pub fn request_layout(&mut self, risk: RiskLevel, pockets: usize) -> Result<LayoutChange, GameError> {
        let board = self.config.board_for(pockets)?;
        let table = self.config.table_for(risk, pockets)?;
        if self.any_in_flight() {
            log::warn!(
                "layout change to {}/{} deferred: {} balls in flight",
                risk,
                pockets,
                self.in_flight()
            );
            self.pending_layout = Some((risk, pockets));
            self.emit(GameEvent::LayoutDeferred { risk, pockets });
            return Ok(LayoutChange::Deferred);
        }
        self.apply_layout(risk, board, table);
        Ok(LayoutChange::Applied)
    }

    pub fn set_risk(&mut self, risk: RiskLevel) -> Result<LayoutChange, GameError> {
        self.request_layout(risk, self.board.pocket_count)
    }

    fn apply_layout(&mut self, risk: RiskLevel, board: Board, table: MultiplierTable) {
        let pockets = board.pocket_count;
        self.pending_layout = None;
        self.risk = risk;
        self.board = board;
        self.table = table;
        log::info!(
            "Layout changed: risk={} pockets={} edge={:.2}%",
            risk,
            pockets,
            self.table.house_edge() * 100.0
        );
        self.emit(GameEvent::LayoutChanged { risk, pockets });
    }

    fn apply_pending_layout(&mut self) -> Option<Result<LayoutChange, GameError>> {
        let (risk, pockets) = self.pending_layout?;
        if self.any_in_flight() {
            return None;
        }
        let built = self.config.board_for(pockets).and_then(|board| {
            self.config
                .table_for(risk, pockets)
                .map(|table| (board, table))
        });
        Some(match built {
            Ok((board, table)) => {
                self.apply_layout(risk, board, table);
                Ok(LayoutChange::Applied)
            }
            Err(e) => {
                self.pending_layout = None;
                Err(e.into())
            }
        })
    }

    // === Loop ===

    /// Advance one fixed step: retry unpaid rounds, apply queued input,
    /// simulate, settle, purge.
    ///
    /// Events emitted since the previous tick, including those from direct
    /// calls such as `drop_ball`, are drained into the report.
    pub fn tick(&mut self, input: &SessionInput) -> TickReport {
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..Default::default()
        };

        self.retry_unpaid(&mut report);

        // Deferred layout first, so a same-tick request can override it
        if let Some(result) = self.apply_pending_layout() {
            report.layout = Some(result);
        }
        if let Some((risk, pockets)) = input.layout {
            report.layout = Some(self.request_layout(risk, pockets));
        }
        for &wager in &input.drops {
            let result = self.drop_ball(wager);
            if let Err(e) = &result {
                log::warn!("drop rejected: {}", e);
            }
            report.dropped.push(result);
        }

        let events = tick(
            &mut self.balls,
            &self.board,
            &self.config.physics,
            &mut self.rng,
            SIM_DT,
        );
        for event in events {
            match event {
                TickEvent::PegHit { ball, peg } => self.emit(GameEvent::PegHit { ball, peg }),
                TickEvent::Settled { ball, pocket } => self.settle(ball, pocket, &mut report),
                TickEvent::Anomaly(anomaly) => {
                    report.anomalies.push(anomaly);
                    self.emit(GameEvent::Anomaly(anomaly));
                    self.settle(anomaly.ball, anomaly.pocket, &mut report);
                }
                TickEvent::WallHit { .. } | TickEvent::Nudged { .. } => {}
            }
        }

        self.purge();

        if !self.presenters.is_empty() {
            let snapshot = self.snapshot();
            for presenter in &mut self.presenters {
                presenter.present(&snapshot);
            }
        }

        report.events = std::mem::take(&mut self.outbox);
        report
    }

    /// Tick with no input until every ball has settled or `max_ticks` pass.
    /// Returns the number of ticks run.
    pub fn run_until_settled(&mut self, max_ticks: u64) -> u64 {
        let idle = SessionInput::default();
        let mut ran = 0;
        while self.any_in_flight() && ran < max_ticks {
            self.tick(&idle);
            ran += 1;
        }
        ran
    }

    /// Pay a settled ball's round and record the result. A payout the
    /// balance service rejects is kept and retried on later ticks.
    fn settle(&mut self, ball: BallId, pocket: usize, report: &mut TickReport) {
        let Some(round_id) = self.balls.iter().find(|b| b.id == ball).map(|b| b.round) else {
            return;
        };
        let settlement = match self.table.get(pocket) {
            Some(m) => Settlement::Multiplier(m),
            None => {
                log::error!("pocket {} outside table of {}, refunding", pocket, self.table.len());
                Settlement::Push
            }
        };
        let owed = UnpaidPayout {
            ball,
            pocket,
            settlement,
        };
        if let Err(e) = self.pay(round_id, owed, report) {
            log::error!("failed to pay round {}, will retry: {}", round_id, e);
            self.unpaid.insert(round_id, owed);
            report.errors.push(e);
        }
    }

    fn retry_unpaid(&mut self, report: &mut TickReport) {
        if self.unpaid.is_empty() {
            return;
        }
        for (round_id, owed) in std::mem::take(&mut self.unpaid) {
            match self.pay(round_id, owed, report) {
                Ok(()) => log::info!("round {} paid on retry", round_id),
                Err(e) => {
                    log::debug!("round {} still unpaid: {}", round_id, e);
                    self.unpaid.insert(round_id, owed);
                }
            }
        }
    }

    fn pay(&mut self, round_id: RoundId, owed: UnpaidPayout, report: &mut TickReport) -> Result<(), GameError> {
        let Some(round) = self.rounds.get_mut(&round_id) else {
            return Ok(());
        };
        let wager = round.wager();
        let event = round.resolve(owed.settlement, &mut self.ledger)?;
        let (multiplier, payout) = match &event {
            RoundEvent::Resolved { outcome, .. } => (outcome.multiplier.unwrap_or(Multiplier(0)), outcome.payout),
            _ => return Ok(()),
        };
        let UnpaidPayout { ball, pocket, .. } = owed;
        let result = DropResult {
            ball,
            round: round_id,
            wager,
            pocket,
            multiplier,
            payout,
            tick: self.tick,
        };
        log::debug!(
            "ball {} settled in pocket {} ({}), paid {}",
            ball,
            pocket,
            multiplier,
            payout
        );
        if let Some(rank) = self.history.push(result.clone()) {
            log::info!("Top win #{}: {} on ball {}", rank, multiplier, ball);
        }
        self.emit(GameEvent::BallSettled {
            ball,
            pocket,
            multiplier,
            payout,
        });
        self.emit(GameEvent::Round(event));
        report.settled.push(result);
        Ok(())
    }

    /// Drop settled balls whose display window has run out. The window only
    /// starts once the ball's round is paid.
    fn purge(&mut self) {
        let rounds = &self.rounds;
        let mut expired = Vec::new();
        self.balls.retain_mut(|ball| {
            let paid = rounds
                .get(&ball.round)
                .is_none_or(|round| round.state() != RoundState::Active);
            if paid && ball.decay() {
                expired.push(ball.round);
                false
            } else {
                true
            }
        });
        for round_id in expired {
            if let Some(mut round) = self.rounds.remove(&round_id) {
                match round.reset() {
                    Ok(Some(event)) => self.emit(GameEvent::Round(event)),
                    Ok(None) => {}
                    Err(e) => log::error!("purged round {} could not reset: {}", round_id, e),
                }
            }
        }
    }

    fn emit(&mut self, event: GameEvent) {
        for observer in &mut self.observers {
            observer.on_event(&event);
        }
        if let Some(cue) = event.sound_cue() {
            if let Some(sound) = &mut self.sound {
                sound.play(cue);
            }
        }
        self.outbox.push(event);
    }

    // === Queries ===

    pub fn balance(&self) -> u64 {
        self.ledger.balance()
    }

    pub fn balls(&self) -> &[Ball] {
        &self.balls
    }

    pub fn ball(&self, id: BallId) -> Option<&Ball> {
        self.balls.iter().find(|b| b.id == id)
    }

    pub fn round(&self, id: RoundId) -> Option<&Round> {
        self.rounds.get(&id)
    }

    /// Take the events emitted since the last tick or drain, for hosts that
    /// use the direct action API without ticking
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Rounds whose payout is waiting on the balance service
    pub fn unpaid(&self) -> &BTreeMap<RoundId, UnpaidPayout> {
        &self.unpaid
    }

    pub fn in_flight(&self) -> usize {
        self.balls.iter().filter(|b| b.in_flight()).count()
    }

    /// Layout lock: true while any ball has not reached a pocket
    pub fn any_in_flight(&self) -> bool {
        self.balls.iter().any(Ball::in_flight)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn risk(&self) -> RiskLevel {
        self.risk
    }

    pub fn table(&self) -> &MultiplierTable {
        &self.table
    }

    pub fn pending_layout(&self) -> Option<(RiskLevel, usize)> {
        self.pending_layout
    }

    pub fn history(&self) -> &ResultHistory {
        &self.history
    }

    pub fn ledger(&self) -> &PayoutLedger<B> {
        &self.ledger
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Current board state for a renderer
    pub fn snapshot(&self) -> BoardSnapshot {
        let balls = self
            .balls
            .iter()
            .map(|ball| BallView {
                id: ball.id,
                x: ball.pos.x,
                y: ball.pos.y,
                in_pocket: ball.in_pocket,
                pocket_index: ball.pocket_index,
                payout: self
                    .rounds
                    .get(&ball.round)
                    .and_then(Round::outcome)
                    .map(|o| o.payout),
            })
            .collect();
        BoardSnapshot {
            tick: self.tick,
            risk: self.risk,
            pockets: self.board.pocket_count,
            multipliers: self.table.as_slice().to_vec(),
            balance: self.ledger.balance(),
            balls,
            round_state: self.rounds.values().next_back().map(Round::state),
        }
    }

    pub fn into_ledger(self) -> PayoutLedger<B> {
        self.ledger
    }
}
