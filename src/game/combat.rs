//! Combat system - bullets, heading convention, hit detection
//!
//! Angles are in degrees and use screen coordinates: x grows to the right,
//! y grows downward, and a positive angle turns toward the top of the screen.
//! The heading vector for angle `a` is therefore `(cos a, -sin a)`.

use super::world::{PlayerId, WORLD_HEIGHT, WORLD_WIDTH};

/// Distance a bullet travels per tick
pub const BULLET_SPEED: f32 = 10.0;
/// Bullet hitbox radius
pub const BULLET_RADIUS: f32 = 5.0;
/// Half the side length of a tank hitbox
pub const TANK_HALF_WIDTH: f32 = 20.0;
/// Centre distance below which a bullet hits a tank
pub const HIT_DISTANCE: f32 = TANK_HALF_WIDTH + BULLET_RADIUS;
/// Distance from the tank centre at which a new bullet appears
pub const MUZZLE_OFFSET: f32 = 25.0;

/// Unit direction vector for an angle in degrees
pub fn heading(angle_deg: f32) -> (f32, f32) {
    let radians = angle_deg.to_radians();
    (radians.cos(), -radians.sin())
}

/// A bullet in flight
#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    pub x: f32,
    pub y: f32,
    /// Fixed at creation
    pub angle: f32,
    /// Player credited if this bullet lands
    pub shooter: PlayerId,
}

impl Bullet {
    /// Fire from a tank centre along `angle`, starting at the muzzle
    pub fn fire(shooter: PlayerId, x: f32, y: f32, angle: f32) -> Self {
        let (dx, dy) = heading(angle);
        Self {
            x: x + dx * MUZZLE_OFFSET,
            y: y + dy * MUZZLE_OFFSET,
            angle,
            shooter,
        }
    }

    /// Move one tick along the heading
    pub fn advance(&mut self) {
        let (dx, dy) = heading(self.angle);
        self.x += dx * BULLET_SPEED;
        self.y += dy * BULLET_SPEED;
    }

    /// Inside the closed world rectangle
    pub fn in_bounds(&self) -> bool {
        (0.0..=WORLD_WIDTH).contains(&self.x) && (0.0..=WORLD_HEIGHT).contains(&self.y)
    }

    /// Strict proximity test against a tank centre
    pub fn hits(&self, target_x: f32, target_y: f32) -> bool {
        let dx = self.x - target_x;
        let dy = self.y - target_y;
        dx * dx + dy * dy < HIT_DISTANCE * HIT_DISTANCE
    }
}
