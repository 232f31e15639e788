//! Point-in-time copy of the world for network transmission

use super::world::PlayerId;

/// Player state in a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerView {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}

/// Bullet state in a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct BulletView {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}

/// Everything a client needs to redraw the arena.
///
/// Copied out of the world in one step, so no entry is ever seen half-updated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Tick generation the snapshot was taken after
    pub tick: u64,
    /// Registration order
    pub players: Vec<PlayerView>,
    pub bullets: Vec<BulletView>,
    /// One entry per registered player, registration order
    pub scores: Vec<(PlayerId, u32)>,
}

impl Snapshot {
    pub fn score_of(&self, id: PlayerId) -> Option<u32> {
        self.scores
            .iter()
            .find(|(player, _)| *player == id)
            .map(|(_, score)| *score)
    }
}
