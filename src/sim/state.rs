//! Ball entities and simulation-side state
//!
//! Everything the physics step mutates lives here.

use std::collections::VecDeque;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::round::RoundId;

/// Ball identity, unique per session
pub type BallId = u32;

/// A ball entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ball {
    pub id: BallId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    /// Highest peg row passed (+1); never decreases
    pub current_row: usize,
    /// Terminal flag, set once
    pub in_pocket: bool,
    /// Pocket index, set together with `in_pocket`
    pub pocket_index: Option<usize>,
    /// Round holding this ball's wager
    pub round: RoundId,
    /// Ticks left before a settled ball is purged
    #[serde(default)]
    pub retention_ticks: u32,
    /// Recent positions for stuck detection (newest last)
    #[serde(skip)]
    pub history: VecDeque<Vec2>,
}

impl Ball {
    pub fn new(id: BallId, round: RoundId, pos: Vec2, vel: Vec2) -> Self {
        Self {
            id,
            pos,
            vel,
            radius: BALL_RADIUS,
            current_row: 0,
            in_pocket: false,
            pocket_index: None,
            round,
            retention_ticks: RETENTION_TICKS,
            history: VecDeque::with_capacity(STUCK_WINDOW),
        }
    }

    #[inline]
    pub fn in_flight(&self) -> bool {
        !self.in_pocket
    }

    /// Record current position (call once per tick while in flight)
    pub fn record_position(&mut self, window: usize) {
        self.history.push_back(self.pos);
        while self.history.len() > window {
            self.history.pop_front();
        }
    }

    /// Largest distance between any two recorded positions, or `None` until
    /// the window is full
    pub fn max_displacement(&self, window: usize) -> Option<f32> {
        if window == 0 || self.history.len() < window {
            return None;
        }
        let mut max = 0.0f32;
        for (i, a) in self.history.iter().enumerate() {
            for b in self.history.iter().skip(i + 1) {
                max = max.max(a.distance(*b));
            }
        }
        Some(max)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Mark terminal. Only the first call has any effect.
    pub fn settle(&mut self, pocket: usize) -> bool {
        if self.in_pocket {
            return false;
        }
        self.in_pocket = true;
        self.pocket_index = Some(pocket);
        self.vel = Vec2::ZERO;
        self.history.clear();
        true
    }

    /// Tick the retention timer of a settled ball; true once it should go
    pub fn decay(&mut self) -> bool {
        if !self.in_pocket {
            return false;
        }
        self.retention_ticks = self.retention_ticks.saturating_sub(1);
        self.retention_ticks == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball() -> Ball {
        Ball::new(1, RoundId(1), Vec2::new(10.0, 10.0), Vec2::ZERO)
    }

    #[test]
    fn test_history_window() {
        let mut ball = ball();
        for i in 0..15 {
            ball.pos = Vec2::new(i as f32, 0.0);
            ball.record_position(10);
        }
        assert_eq!(ball.history.len(), 10);
        assert_eq!(ball.history.front().unwrap().x, 5.0);
        assert!((ball.max_displacement(10).unwrap() - 9.0).abs() < 1e-5);
    }

    #[test]
    fn test_displacement_needs_full_window() {
        let mut ball = ball();
        ball.record_position(10);
        assert!(ball.max_displacement(10).is_none());
    }

    #[test]
    fn test_settle_once() {
        let mut ball = ball();
        assert!(ball.settle(3));
        assert!(!ball.settle(5));
        assert_eq!(ball.pocket_index, Some(3));
        assert!(!ball.in_flight());
    }

    #[test]
    fn test_decay() {
        let mut ball = ball();
        ball.retention_ticks = 2;
        assert!(!ball.decay(), "in-flight balls never decay");
        ball.settle(0);
        assert!(!ball.decay());
        assert!(ball.decay());
    }
}
