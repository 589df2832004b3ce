//! Result history and top-wins leaderboard
//!
//! Recent drops are kept in a bounded log; the best multipliers ever hit are
//! ranked separately, high-score style.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::multiplier::Multiplier;
use crate::round::RoundId;
use crate::sim::state::BallId;

/// Recent results kept by default
pub const DEFAULT_HISTORY_LEN: usize = 50;

/// Maximum number of top wins to keep
pub const MAX_TOP_WINS: usize = 10;

/// Outcome record for one settled ball
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropResult {
    pub ball: BallId,
    pub round: RoundId,
    pub wager: u64,
    pub pocket: usize,
    pub multiplier: Multiplier,
    pub payout: u64,
    /// Session tick the ball settled on
    pub tick: u64,
}

/// Bounded result log plus leaderboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultHistory {
    capacity: usize,
    recent: VecDeque<DropResult>,
    /// Sorted by multiplier, best first
    top_wins: Vec<DropResult>,
}

impl Default for ResultHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

impl ResultHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            recent: VecDeque::with_capacity(capacity),
            top_wins: Vec::new(),
        }
    }

    /// Record a result. Returns the leaderboard rank (1-indexed) it achieved.
    pub fn push(&mut self, result: DropResult) -> Option<usize> {
        let rank = self.add_top_win(&result);
        if self.capacity > 0 {
            if self.recent.len() == self.capacity {
                self.recent.pop_front();
            }
            self.recent.push_back(result);
        }
        rank
    }

    /// Check if a multiplier would enter the leaderboard
    pub fn qualifies(&self, multiplier: Multiplier) -> bool {
        if multiplier <= Multiplier::ONE {
            return false;
        }
        if self.top_wins.len() < MAX_TOP_WINS {
            return true;
        }
        self.top_wins
            .last()
            .map(|e| multiplier > e.multiplier)
            .unwrap_or(true)
    }

    /// Rank a multiplier would achieve (1-indexed, None if it doesn't qualify)
    pub fn potential_rank(&self, multiplier: Multiplier) -> Option<usize> {
        if !self.qualifies(multiplier) {
            return None;
        }
        let rank = self.top_wins.iter().position(|e| multiplier > e.multiplier);
        Some(rank.unwrap_or(self.top_wins.len()) + 1)
    }

    fn add_top_win(&mut self, result: &DropResult) -> Option<usize> {
        let rank = self.potential_rank(result.multiplier)?;
        self.top_wins.insert(rank - 1, result.clone());
        self.top_wins.truncate(MAX_TOP_WINS);
        Some(rank)
    }

    /// Oldest first
    pub fn recent(&self) -> impl Iterator<Item = &DropResult> {
        self.recent.iter()
    }

    pub fn last(&self) -> Option<&DropResult> {
        self.recent.back()
    }

    pub fn top_wins(&self) -> &[DropResult] {
        &self.top_wins
    }

    pub fn best(&self) -> Option<Multiplier> {
        self.top_wins.first().map(|e| e.multiplier)
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(ball: BallId, tenths: u32) -> DropResult {
        let multiplier = Multiplier::from_tenths(tenths);
        DropResult {
            ball,
            round: RoundId(ball as u64),
            wager: 100,
            pocket: 0,
            multiplier,
            payout: multiplier.apply(100),
            tick: 0,
        }
    }

    #[test]
    fn test_recent_is_bounded() {
        let mut history = ResultHistory::new(3);
        for i in 0..5 {
            history.push(result(i, 5));
        }
        assert_eq!(history.len(), 3);
        let balls: Vec<_> = history.recent().map(|r| r.ball).collect();
        assert_eq!(balls, vec![2, 3, 4]);
        assert_eq!(history.last().unwrap().ball, 4);
    }

    #[test]
    fn test_losses_never_rank() {
        let mut history = ResultHistory::default();
        assert_eq!(history.push(result(1, 5)), None);
        assert_eq!(history.push(result(2, 10)), None);
        assert!(history.top_wins().is_empty());
        assert_eq!(history.best(), None);
    }

    #[test]
    fn test_leaderboard_order_and_trim() {
        let mut history = ResultHistory::default();
        assert_eq!(history.push(result(1, 20)), Some(1));
        assert_eq!(history.push(result(2, 56)), Some(1));
        assert_eq!(history.push(result(3, 30)), Some(2));
        // Ties go after existing entries
        assert_eq!(history.push(result(4, 30)), Some(3));
        assert_eq!(history.best(), Some(Multiplier::from_tenths(56)));

        for i in 10..20 {
            history.push(result(i, 100));
        }
        assert_eq!(history.top_wins().len(), MAX_TOP_WINS);
        assert!(history.top_wins().iter().all(|r| r.multiplier == Multiplier::from_tenths(100)));
        assert!(!history.qualifies(Multiplier::from_tenths(56)));
        assert_eq!(history.potential_rank(Multiplier::from_tenths(290)), Some(1));
    }
}
