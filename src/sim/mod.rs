//! Deterministic Plinko simulation module
//!
//! Ball physics lives here. This module must stay pure and deterministic:
//! - Fixed timestep only
//! - Injected RNG only
//! - Stable iteration order (creation order)
//! - No money, rendering or platform dependencies

pub mod board;
pub mod collision;
pub mod rng;
pub mod state;
pub mod tick;

pub use board::{Board, BoardLayout, PegId, resolve_pocket};
pub use collision::{CollisionResult, ball_peg_collision, closest_peg_collision};
pub use rng::{RandomSource, RngState};
pub use state::{Ball, BallId};
pub use tick::{PhysicsParams, SimulationAnomaly, TickEvent, tick};
