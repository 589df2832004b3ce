//! Outbound ports: game events, sound cues and board snapshots
//!
//! The core never renders or plays audio. It dispatches events to observers
//! synchronously after each tick, and a host turns them into effects.

use serde::{Deserialize, Serialize};

use crate::multiplier::{Multiplier, RiskLevel};
use crate::round::{RoundEvent, RoundState};
use crate::sim::board::PegId;
use crate::sim::state::BallId;
use crate::sim::tick::SimulationAnomaly;

/// Everything a host may react to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GameEvent {
    BallDropped {
        ball: BallId,
        wager: u64,
    },
    PegHit {
        ball: BallId,
        peg: PegId,
    },
    BallSettled {
        ball: BallId,
        pocket: usize,
        multiplier: Multiplier,
        payout: u64,
    },
    Round(RoundEvent),
    LayoutChanged {
        risk: RiskLevel,
        pockets: usize,
    },
    /// Layout change parked until the board is clear
    LayoutDeferred {
        risk: RiskLevel,
        pockets: usize,
    },
    Anomaly(SimulationAnomaly),
}

impl GameEvent {
    /// Sound to play for this event, if any
    pub fn sound_cue(&self) -> Option<SoundCue> {
        match self {
            GameEvent::BallDropped { .. } => Some(SoundCue::Drop),
            GameEvent::PegHit { .. } => Some(SoundCue::PegHit),
            GameEvent::BallSettled { multiplier, .. } => Some(if *multiplier > Multiplier::ONE {
                SoundCue::BigWin
            } else {
                SoundCue::PocketLand
            }),
            _ => None,
        }
    }
}

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    /// Ball released
    Drop,
    /// Ball touches a peg
    PegHit,
    /// Ball lands in a pocket paying at most the wager
    PocketLand,
    /// Ball lands in a pocket paying more than the wager
    BigWin,
}

/// Host audio backend
pub trait SoundSink: Send {
    /// Acquire audio resources
    fn load(&mut self);
    fn play(&mut self, cue: SoundCue, volume: f32);
    /// Free audio resources
    fn release(&mut self);
}

/// Owns a `SoundSink` for the lifetime of a session.
///
/// The sink is loaded on construction and released on `close` or drop.
pub struct SoundBus {
    sink: Box<dyn SoundSink>,
    master_volume: f32,
    muted: bool,
    loaded: bool,
}

impl SoundBus {
    pub fn new(mut sink: Box<dyn SoundSink>) -> Self {
        sink.load();
        Self {
            sink,
            master_volume: 0.8,
            muted: false,
            loaded: true,
        }
    }

    /// Set master volume (0.0 - 1.0)
    pub fn set_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn play(&mut self, cue: SoundCue) {
        if self.muted || !self.loaded || self.master_volume <= 0.0 {
            return;
        }
        self.sink.play(cue, self.master_volume);
    }

    pub fn close(&mut self) {
        if self.loaded {
            self.sink.release();
            self.loaded = false;
        }
    }
}

impl Drop for SoundBus {
    fn drop(&mut self) {
        self.close();
    }
}

/// Synchronous event subscriber
pub trait GameObserver: Send {
    fn on_event(&mut self, event: &GameEvent);
}

/// Consumer of per-tick board state
pub trait PresentationSink: Send {
    fn present(&mut self, snapshot: &BoardSnapshot);
}

/// Ball state as seen by a renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallView {
    pub id: BallId,
    pub x: f32,
    pub y: f32,
    pub in_pocket: bool,
    pub pocket_index: Option<usize>,
    pub payout: Option<u64>,
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub tick: u64,
    pub risk: RiskLevel,
    pub pockets: usize,
    pub multipliers: Vec<Multiplier>,
    pub balance: u64,
    pub balls: Vec<BallView>,
    /// State of the most recent round, if any ball was dropped
    pub round_state: Option<RoundState>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        loads: u32,
        releases: u32,
        played: Vec<(SoundCue, f32)>,
    }

    struct RecordingSink(Arc<Mutex<Calls>>);

    impl SoundSink for RecordingSink {
        fn load(&mut self) {
            self.0.lock().unwrap().loads += 1;
        }
        fn play(&mut self, cue: SoundCue, volume: f32) {
            self.0.lock().unwrap().played.push((cue, volume));
        }
        fn release(&mut self) {
            self.0.lock().unwrap().releases += 1;
        }
    }

    #[test]
    fn test_sound_bus_lifecycle() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        {
            let mut bus = SoundBus::new(Box::new(RecordingSink(calls.clone())));
            bus.play(SoundCue::Drop);
            bus.set_muted(true);
            bus.play(SoundCue::PegHit);
            bus.set_muted(false);
            bus.set_volume(2.0);
            bus.play(SoundCue::BigWin);
            bus.close();
            bus.play(SoundCue::Drop);
        }
        let calls = calls.lock().unwrap();
        assert_eq!(calls.loads, 1);
        // Closed explicitly; drop must not release twice
        assert_eq!(calls.releases, 1);
        assert_eq!(calls.played, vec![(SoundCue::Drop, 0.8), (SoundCue::BigWin, 1.0)]);
    }

    #[test]
    fn test_sound_bus_released_on_drop() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        drop(SoundBus::new(Box::new(RecordingSink(calls.clone()))));
        assert_eq!(calls.lock().unwrap().releases, 1);
    }

    #[test]
    fn test_settle_cue_depends_on_multiplier() {
        let settled = |m| GameEvent::BallSettled {
            ball: 1,
            pocket: 0,
            multiplier: m,
            payout: 0,
        };
        assert_eq!(settled(Multiplier::from_tenths(56)).sound_cue(), Some(SoundCue::BigWin));
        assert_eq!(settled(Multiplier::from_tenths(5)).sound_cue(), Some(SoundCue::PocketLand));
        assert_eq!(
            GameEvent::LayoutChanged {
                risk: RiskLevel::Low,
                pockets: 9
            }
            .sound_cue(),
            None
        );
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_string(&GameEvent::BallDropped { ball: 3, wager: 1000 }).unwrap();
        assert_eq!(json, r#"{"type":"ball_dropped","data":{"ball":3,"wager":1000}}"#);
    }
}
