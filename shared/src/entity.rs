//! Movement primitives shared by the server simulation and client interpolation.

use crate::geometry::Vec2;
use serde::{Deserialize, Serialize};

/// Distance under which a mover counts as having arrived.
pub const ARRIVAL_EPSILON: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Direction {
    /// Facing for a movement delta, preferring the dominant axis.
    /// A zero delta keeps `current`.
    pub fn from_delta(delta: Vec2, current: Direction) -> Direction {
        if delta.is_zero() {
            return current;
        }
        if delta.x.abs() > delta.y.abs() {
            if delta.x > 0.0 {
                Direction::Right
            } else {
                Direction::Left
            }
        } else if delta.y > 0.0 {
            Direction::Down
        } else {
            Direction::Up
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

/// Offset that moves `from` toward `to` by at most `max_step`.
///
/// Never overshoots: when the target is closer than `max_step` the full
/// remaining distance is returned.
pub fn capped_step(from: Vec2, to: Vec2, max_step: f32) -> Vec2 {
    let remaining = to.sub(from);
    let distance = remaining.length();
    if distance <= max_step.max(0.0) {
        remaining
    } else {
        remaining.normalize().scale(max_step)
    }
}

/// Position bookkeeping for anything that moves toward a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub position: Vec2,
    pub prev: Vec2,
    pub target: Vec2,
    pub speed: f32,
}

impl Motion {
    pub fn new(position: Vec2, speed: f32) -> Self {
        Self {
            position,
            prev: position,
            target: position,
            speed,
        }
    }

    /// Moves position, prev and target together. Used for map changes so no
    /// frame ever interpolates across two maps.
    pub fn teleport(&mut self, to: Vec2) {
        self.position = to;
        self.prev = to;
        self.target = to;
    }

    /// Desired offset for this frame, before collision.
    pub fn step(&self, dt: f32) -> Vec2 {
        capped_step(self.position, self.target, self.speed * dt)
    }

    pub fn is_moving(&self) -> bool {
        self.position.distance(self.target) > ARRIVAL_EPSILON
    }
}
