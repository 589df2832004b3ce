//! Fixed timestep physics tick
//!
//! Advances every in-flight ball by one step. The only source of variation is
//! the injected `RandomSource`, so a seeded source replays a board exactly.

use std::f32::consts::TAU;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::board::{Board, PegId};
use super::collision::{ball_wall_collision, closest_peg_collision, reflect_velocity_damped};
use super::rng::RandomSource;
use super::state::{Ball, BallId};
use crate::consts::*;
use crate::error::ConfigError;

/// Physics tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsParams {
    /// Downward acceleration (units/s²)
    pub gravity: f32,
    /// Random gravity scale (±fraction, ≤ 0.05)
    pub gravity_jitter: f32,
    /// Horizontal velocity kept per reference tick
    pub friction: f32,
    /// Normal velocity kept after a peg bounce (< 1)
    pub peg_bounce: f32,
    /// Random per-component velocity scale after a peg bounce (±fraction)
    pub bounce_spread: f32,
    /// Normal velocity kept after a wall bounce (< 1)
    pub wall_bounce: f32,
    /// Speed cap (units/s)
    pub max_speed: f32,
    /// Positions tracked for stuck detection
    pub stuck_window: usize,
    /// Displacement across the window below which a ball is stuck
    pub stuck_threshold: f32,
    /// Nudge magnitude (units/s)
    pub nudge_speed: f32,
    /// Extra downward velocity added with every nudge (units/s)
    pub nudge_down_bias: f32,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            gravity_jitter: GRAVITY_JITTER,
            friction: FRICTION,
            peg_bounce: PEG_BOUNCE,
            bounce_spread: BOUNCE_SPREAD,
            wall_bounce: WALL_BOUNCE,
            max_speed: MAX_SPEED,
            stuck_window: STUCK_WINDOW,
            stuck_threshold: STUCK_THRESHOLD,
            nudge_speed: NUDGE_SPEED,
            nudge_down_bias: NUDGE_DOWN_BIAS,
        }
    }
}

impl PhysicsParams {
    pub fn validate(&self, ball_radius: f32) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: String) -> ConfigError {
            ConfigError::InvalidValue { field, reason }
        }

        if !(self.gravity.is_finite() && self.gravity > 0.0) {
            return Err(invalid("gravity", format!("must be positive, got {}", self.gravity)));
        }
        if !(0.0..=0.05).contains(&self.gravity_jitter) {
            return Err(invalid("gravity_jitter", "must be within 0..=0.05".to_string()));
        }
        if !(self.friction > 0.0 && self.friction <= 1.0) {
            return Err(invalid("friction", "must be within (0, 1]".to_string()));
        }
        for (field, value) in [("peg_bounce", self.peg_bounce), ("wall_bounce", self.wall_bounce)] {
            if !(0.0..1.0).contains(&value) {
                return Err(invalid(field, format!("must be within [0, 1), got {value}")));
            }
        }
        if !(0.0..0.5).contains(&self.bounce_spread) {
            return Err(invalid("bounce_spread", "must be within [0, 0.5)".to_string()));
        }
        if !(self.max_speed.is_finite() && self.max_speed > 0.0) {
            return Err(invalid("max_speed", "must be positive".to_string()));
        }
        if self.stuck_window < 2 {
            return Err(invalid("stuck_window", "needs at least two samples".to_string()));
        }
        if !(self.stuck_threshold > 0.0 && self.stuck_threshold < ball_radius) {
            return Err(invalid(
                "stuck_threshold",
                format!("must be within (0, ball radius {ball_radius})"),
            ));
        }
        if !(self.nudge_speed > 0.0 && self.nudge_down_bias >= 0.0) {
            return Err(invalid("nudge_speed", "nudge must push the ball".to_string()));
        }
        Ok(())
    }
}

/// Numerical blow-up recovered by forcing a ball into the center pocket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationAnomaly {
    pub ball: BallId,
    /// Position/velocity observed before recovery
    pub pos: Vec2,
    pub vel: Vec2,
    /// Pocket the ball was forced into
    pub pocket: usize,
}

/// Things that happened to balls during one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TickEvent {
    PegHit { ball: BallId, peg: PegId },
    WallHit { ball: BallId },
    Nudged { ball: BallId },
    Settled { ball: BallId, pocket: usize },
    Anomaly(SimulationAnomaly),
}

/// Advance every in-flight ball by one fixed timestep.
///
/// Balls are processed in slice order. Settled balls are skipped, so a ball
/// settles at most once and never moves afterwards.
pub fn tick<R: RandomSource + ?Sized>(
    balls: &mut [Ball],
    board: &Board,
    params: &PhysicsParams,
    rng: &mut R,
    dt: f32,
) -> Vec<TickEvent> {
    let mut events = Vec::new();
    // Friction is tuned per 60 Hz frame; scale for other step sizes
    let frames = dt / SIM_DT;
    let friction = params.friction.powf(frames);

    for ball in balls.iter_mut() {
        if ball.in_pocket {
            continue;
        }
        if !ball_is_finite(ball) {
            events.push(TickEvent::Anomaly(recover(ball, board)));
            continue;
        }

        // Gravity with a little jitter
        let jitter = rng.signed() * params.gravity_jitter;
        ball.vel.y += params.gravity * (1.0 + jitter) * dt;

        ball.vel.x *= friction;

        // Stuck detection
        ball.record_position(params.stuck_window);
        if let Some(displacement) = ball.max_displacement(params.stuck_window) {
            if displacement < params.stuck_threshold {
                let angle = rng.uniform() * TAU;
                ball.vel += Vec2::from_angle(angle) * params.nudge_speed
                    + Vec2::new(0.0, params.nudge_down_bias);
                ball.clear_history();
                log::trace!("nudged ball {} at {:?}", ball.id, ball.pos);
                events.push(TickEvent::Nudged { ball: ball.id });
            }
        }

        // Closest peg only
        if let Some((peg, hit)) = closest_peg_collision(board, ball.pos, ball.radius) {
            let bounced = reflect_velocity_damped(ball.vel, hit.normal, params.peg_bounce);
            let spread = Vec2::new(
                1.0 + rng.signed() * params.bounce_spread,
                1.0 + rng.signed() * params.bounce_spread,
            );
            ball.vel = bounced * spread;
            ball.pos += hit.normal * hit.penetration;
            ball.current_row = ball.current_row.max(peg.row + 1);
            events.push(TickEvent::PegHit { ball: ball.id, peg });
        }

        ball.pos += ball.vel * dt;

        let wall = ball_wall_collision(ball.pos, ball.radius, board.width());
        if wall.hit {
            ball.vel = reflect_velocity_damped(ball.vel, wall.normal, params.wall_bounce);
            ball.pos += wall.normal * wall.penetration;
            events.push(TickEvent::WallHit { ball: ball.id });
        }

        ball.vel = ball.vel.clamp_length_max(params.max_speed);

        if !ball_is_finite(ball) {
            events.push(TickEvent::Anomaly(recover(ball, board)));
            continue;
        }

        if ball.pos.y >= board.pocket_line() {
            let pocket = board.pocket_for(ball.pos.x);
            if ball.settle(pocket) {
                events.push(TickEvent::Settled {
                    ball: ball.id,
                    pocket,
                });
            }
        }
    }

    events
}

#[inline]
fn ball_is_finite(ball: &Ball) -> bool {
    ball.pos.is_finite() && ball.vel.is_finite()
}

/// Force a ball with invalid state into the center pocket
fn recover(ball: &mut Ball, board: &Board) -> SimulationAnomaly {
    let pocket = board.center_pocket();
    let anomaly = SimulationAnomaly {
        ball: ball.id,
        pos: ball.pos,
        vel: ball.vel,
        pocket,
    };
    log::warn!(
        "simulation anomaly on ball {}: pos={:?} vel={:?}, settling in pocket {}",
        ball.id,
        ball.pos,
        ball.vel,
        pocket
    );
    ball.pos = Vec2::new(board.pocket_center_x(pocket), board.pocket_line());
    ball.vel = Vec2::ZERO;
    ball.settle(pocket);
    anomaly
}
