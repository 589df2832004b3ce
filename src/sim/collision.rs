//! Collision detection and response for pegs and side walls
//!
//! Pegs are circles, so a ball/peg contact is a circle/circle overlap. The
//! response keeps the tangential velocity and reflects the normal part with
//! energy loss.

use glam::Vec2;

use super::board::{Board, PegId};

/// Result of a collision check
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Collision point on the obstacle surface (if hit)
    pub point: Vec2,
    /// Surface normal at collision (pointing toward ball center)
    pub normal: Vec2,
    /// Penetration depth (for position correction)
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            point: Vec2::ZERO,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }
}

/// Check collision between a ball and a single peg
pub fn ball_peg_collision(
    ball_pos: Vec2,
    ball_radius: f32,
    peg_pos: Vec2,
    peg_radius: f32,
) -> CollisionResult {
    let delta = ball_pos - peg_pos;
    let dist = delta.length();
    let reach = ball_radius + peg_radius;

    if dist >= reach {
        return CollisionResult::miss();
    }

    // Dead center: push straight up, away from the pocket line
    let normal = if dist < 1e-6 {
        Vec2::new(0.0, -1.0)
    } else {
        delta / dist
    };

    CollisionResult {
        hit: true,
        point: peg_pos + normal * peg_radius,
        normal,
        penetration: reach - dist,
    }
}

/// Find the closest overlapping peg, if any
pub fn closest_peg_collision(
    board: &Board,
    ball_pos: Vec2,
    ball_radius: f32,
) -> Option<(PegId, CollisionResult)> {
    let peg_radius = board.layout.peg_radius;
    board
        .pegs_near(ball_pos, ball_radius + peg_radius)
        .into_iter()
        .map(|(peg, peg_pos)| (peg, ball_peg_collision(ball_pos, ball_radius, peg_pos, peg_radius)))
        .filter(|(_, result)| result.hit)
        .max_by(|(_, a), (_, b)| a.penetration.total_cmp(&b.penetration))
}

/// Damped reflection: tangential part kept, normal part reversed and scaled
/// by `restitution`. Velocity already leaving the surface is unchanged.
pub fn reflect_velocity_damped(velocity: Vec2, normal: Vec2, restitution: f32) -> Vec2 {
    let vn = velocity.dot(normal);
    if vn >= 0.0 {
        return velocity;
    }
    let normal_part = normal * vn;
    let tangential = velocity - normal_part;
    tangential - normal_part * restitution
}

/// Check the left/right board walls
pub fn ball_wall_collision(ball_pos: Vec2, ball_radius: f32, board_width: f32) -> CollisionResult {
    if ball_pos.x - ball_radius < 0.0 {
        return CollisionResult {
            hit: true,
            point: Vec2::new(0.0, ball_pos.y),
            normal: Vec2::X,
            penetration: ball_radius - ball_pos.x,
        };
    }
    if ball_pos.x + ball_radius > board_width {
        return CollisionResult {
            hit: true,
            point: Vec2::new(board_width, ball_pos.y),
            normal: Vec2::NEG_X,
            penetration: ball_pos.x + ball_radius - board_width,
        };
    }
    CollisionResult::miss()
}
