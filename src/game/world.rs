//! Authoritative world model: players, bullets, scores and spawn slots
//!
//! `World` is plain data with synchronous operations. It is not shared: the
//! arena task owns it and serializes every call (see [`super::arena`]).

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info};

use crate::net::outbox::ConnectionHandle;
use crate::net::protocol::Notification;

use super::combat::Bullet;
use super::snapshot::{BulletView, PlayerView, Snapshot};

/// Arena dimensions
pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;

/// Players allowed at once
pub const MAX_PLAYERS: usize = 4;

/// Distance a tank moves per MOVE command
pub const MOVE_STEP: f32 = 5.0;

/// Spawn and respawn position for each slot, slot 1 first
pub const SPAWN_POINTS: [(f32, f32); MAX_PLAYERS] =
    [(200.0, 300.0), (600.0, 300.0), (400.0, 150.0), (400.0, 450.0)];

/// Session-stable player identity. Never reused while the server runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(u32);

impl PlayerId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the four spawn slots, numbered from 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot(u8);

impl Slot {
    fn from_index(index: usize) -> Self {
        Self(index as u8 + 1)
    }

    fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn spawn_point(self) -> (f32, f32) {
        SPAWN_POINTS[self.index()]
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tank movement directions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// Position change for one step (screen coordinates, y down)
    pub fn delta(self) -> (f32, f32) {
        match self {
            Direction::Left => (-MOVE_STEP, 0.0),
            Direction::Right => (MOVE_STEP, 0.0),
            Direction::Up => (0.0, -MOVE_STEP),
            Direction::Down => (0.0, MOVE_STEP),
        }
    }
}

/// A registered tank
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub slot: Slot,
    pub conn: ConnectionHandle,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}

/// Result of a successful admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub id: PlayerId,
    pub slot: Slot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    #[error("all player slots are taken")]
    Full,
}

/// An event notification addressed to one connection
#[derive(Debug, Clone)]
pub struct Notice {
    pub to: ConnectionHandle,
    pub player: PlayerId,
    pub event: Notification,
}

/// The world model
#[derive(Debug)]
pub struct World {
    /// Registration order
    players: Vec<Player>,
    bullets: Vec<Bullet>,
    scores: HashMap<PlayerId, u32>,
    slots: [Option<PlayerId>; MAX_PLAYERS],
    next_id: u32,
    tick: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            players: Vec::with_capacity(MAX_PLAYERS),
            bullets: Vec::new(),
            scores: HashMap::with_capacity(MAX_PLAYERS),
            slots: [None; MAX_PLAYERS],
            next_id: 1,
            tick: 0,
        }
    }

    /// Admit a player into the lowest free slot, at that slot's spawn point
    pub fn register_player(&mut self, conn: ConnectionHandle) -> Result<Registration, RegisterError> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(RegisterError::Full)?;

        let id = PlayerId(self.next_id);
        self.next_id += 1;

        let slot = Slot::from_index(index);
        let (x, y) = slot.spawn_point();
        self.slots[index] = Some(id);
        self.scores.insert(id, 0);
        self.players.push(Player {
            id,
            slot,
            conn,
            x,
            y,
            angle: 0.0,
        });

        info!(player = %id, slot = %slot, players = self.players.len(), "Player registered");
        Ok(Registration { id, slot })
    }

    /// Remove a player, its score and its slot claim. Unknown ids are a no-op.
    pub fn deregister_player(&mut self, id: PlayerId) -> bool {
        let Some(pos) = self.players.iter().position(|p| p.id == id) else {
            return false;
        };

        let player = self.players.remove(pos);
        self.scores.remove(&id);
        self.slots[player.slot.index()] = None;

        info!(player = %id, slot = %player.slot, players = self.players.len(), "Player deregistered");
        true
    }

    /// Step a tank by [`MOVE_STEP`]. Positions are not clamped to the arena.
    pub fn apply_move(&mut self, id: PlayerId, direction: Direction) -> bool {
        let Some(player) = self.player_mut(id) else {
            return false;
        };
        let (dx, dy) = direction.delta();
        player.x += dx;
        player.y += dy;
        true
    }

    /// Set the heading in degrees
    pub fn apply_rotate(&mut self, id: PlayerId, angle: f32) -> bool {
        let Some(player) = self.player_mut(id) else {
            return false;
        };
        player.angle = angle;
        true
    }

    /// Fire from the shooter's current position and heading
    pub fn spawn_bullet(&mut self, shooter: PlayerId) -> bool {
        let Some(player) = self.player(shooter) else {
            return false;
        };
        let bullet = Bullet::fire(shooter, player.x, player.y, player.angle);
        self.bullets.push(bullet);
        true
    }

    /// Advance every bullet one tick and resolve hits.
    ///
    /// Returns the LOSE/WIN notices produced, in the order they must be sent.
    pub fn tick_bullets(&mut self) -> Vec<Notice> {
        self.tick += 1;
        let mut notices = Vec::new();
        let mut bullets = std::mem::take(&mut self.bullets);

        bullets.retain_mut(|bullet| {
            bullet.advance();
            if !bullet.in_bounds() {
                return false;
            }

            // First match in registration order wins; one hit per bullet
            match self.players.iter().position(|p| bullet.hits(p.x, p.y)) {
                Some(victim) => {
                    self.resolve_hit(bullet.shooter, victim, &mut notices);
                    false
                }
                None => true,
            }
        });

        self.bullets = bullets;
        notices
    }

    fn resolve_hit(&mut self, shooter: PlayerId, victim: usize, notices: &mut Vec<Notice>) {
        // A shooter that has since left simply earns nothing
        if let Some(score) = self.scores.get_mut(&shooter) {
            *score += 1;
        }

        let victim_id = self.players[victim].id;
        notices.extend(self.players.iter().map(|p| Notice {
            to: p.conn.clone(),
            player: p.id,
            event: if p.id == victim_id {
                Notification::Lose
            } else {
                Notification::Win
            },
        }));

        let player = &mut self.players[victim];
        let (x, y) = player.slot.spawn_point();
        player.x = x;
        player.y = y;
        player.angle = 0.0;

        debug!(tick = self.tick, shooter = %shooter, victim = %victim_id, "Bullet hit");
    }

    /// Copy out the full visible state
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            players: self
                .players
                .iter()
                .map(|p| PlayerView {
                    id: p.id,
                    x: p.x,
                    y: p.y,
                    angle: p.angle,
                })
                .collect(),
            bullets: self
                .bullets
                .iter()
                .map(|b| BulletView {
                    x: b.x,
                    y: b.y,
                    angle: b.angle,
                })
                .collect(),
            scores: self
                .players
                .iter()
                .map(|p| (p.id, self.scores.get(&p.id).copied().unwrap_or_default()))
                .collect(),
        }
    }

    /// Connections of every registered player, registration order
    pub fn recipients(&self) -> Vec<ConnectionHandle> {
        self.players.iter().map(|p| p.conn.clone()).collect()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    pub fn score(&self, id: PlayerId) -> Option<u32> {
        self.scores.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::combat::BULLET_SPEED;
    use bytes::Bytes;
    use tokio::sync::mpsc;

    fn conn() -> (ConnectionHandle, mpsc::Receiver<Bytes>) {
        ConnectionHandle::channel(16)
    }

    fn join(world: &mut World) -> PlayerId {
        let (conn, _rx) = conn();
        world.register_player(conn).unwrap().id
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn events_for(notices: &[Notice], id: PlayerId) -> Vec<Notification> {
        notices
            .iter()
            .filter(|n| n.player == id)
            .map(|n| n.event)
            .collect()
    }

    #[test]
    fn registration_uses_slot_spawn_and_zero_score() {
        let mut world = World::new();
        let (conn_a, _ra) = conn();
        let (conn_b, _rb) = conn();

        let a = world.register_player(conn_a).unwrap();
        let b = world.register_player(conn_b).unwrap();

        assert_eq!(a.slot.number(), 1);
        assert_eq!(b.slot.number(), 2);
        assert_ne!(a.id, b.id);

        let pa = world.player(a.id).unwrap();
        assert_eq!((pa.x, pa.y, pa.angle), (200.0, 300.0, 0.0));
        let pb = world.player(b.id).unwrap();
        assert_eq!((pb.x, pb.y), (600.0, 300.0));
        assert_eq!(world.score(a.id), Some(0));
    }

    #[test]
    fn fifth_player_is_rejected() {
        let mut world = World::new();
        for _ in 0..MAX_PLAYERS {
            join(&mut world);
        }
        let (extra, _rx) = conn();
        assert_eq!(world.register_player(extra).unwrap_err(), RegisterError::Full);
        assert_eq!(world.player_count(), MAX_PLAYERS);
    }

    #[test]
    fn freed_slot_is_reused_but_id_is_not() {
        let mut world = World::new();
        let ids: Vec<_> = (0..MAX_PLAYERS).map(|_| join(&mut world)).collect();

        assert!(world.deregister_player(ids[1]));
        let (conn, _rx) = conn();
        let again = world.register_player(conn).unwrap();

        assert_eq!(again.slot.number(), 2);
        assert!(!ids.contains(&again.id));
        let p = world.player(again.id).unwrap();
        assert_eq!((p.x, p.y), SPAWN_POINTS[1]);
    }

    #[test]
    fn four_connect_disconnect_cycles_do_not_exhaust_slots() {
        let mut world = World::new();
        for _ in 0..10 {
            let id = join(&mut world);
            assert!(world.deregister_player(id));
        }
        assert_eq!(world.player_count(), 0);
        let (conn, _rx) = conn();
        assert!(world.register_player(conn).is_ok());
    }

    #[test]
    fn deregister_removes_player_and_score() {
        let mut world = World::new();
        let a = join(&mut world);
        let b = join(&mut world);

        assert!(world.deregister_player(a));
        assert!(!world.deregister_player(a));

        let snapshot = world.snapshot();
        assert_eq!(world.score(a), None);
        assert!(snapshot.players.iter().all(|p| p.id != a));
        assert_eq!(snapshot.scores, vec![(b, 0)]);
    }

    #[test]
    fn moves_step_five_units_without_clamping() {
        let mut world = World::new();
        let id = join(&mut world);

        for _ in 0..50 {
            world.apply_move(id, Direction::Left);
        }
        let p = world.player(id).unwrap();
        assert_eq!(p.x, 200.0 - 250.0);
        assert!(p.x < 0.0);

        world.apply_move(id, Direction::Right);
        world.apply_move(id, Direction::Up);
        world.apply_move(id, Direction::Up);
        world.apply_move(id, Direction::Down);
        let p = world.player(id).unwrap();
        assert_eq!((p.x, p.y), (-45.0, 295.0));
    }

    #[test]
    fn commands_for_unknown_players_are_ignored() {
        let mut world = World::new();
        let ghost = PlayerId::new(99);
        assert!(!world.apply_move(ghost, Direction::Up));
        assert!(!world.apply_rotate(ghost, 10.0));
        assert!(!world.spawn_bullet(ghost));
        assert!(world.bullets().is_empty());
    }

    #[test]
    fn bullet_keeps_its_angle_after_shooter_rotates() {
        let mut world = World::new();
        let id = join(&mut world);
        world.apply_rotate(id, 0.0);
        world.spawn_bullet(id);
        world.apply_rotate(id, 90.0);
        world.tick_bullets();

        let bullet = &world.bullets()[0];
        assert_eq!(bullet.angle, 0.0);
        assert_eq!((bullet.x, bullet.y), (225.0 + BULLET_SPEED, 300.0));
    }

    #[test]
    fn muzzle_uses_position_and_angle_at_fire_time() {
        let mut world = World::new();
        let id = join(&mut world);
        world.apply_move(id, Direction::Down);
        world.apply_rotate(id, 90.0);
        world.spawn_bullet(id);

        let bullet = &world.bullets()[0];
        assert!(close(bullet.x, 200.0));
        assert!(close(bullet.y, 305.0 - 25.0));
        assert_eq!(bullet.shooter, id);
    }

    #[test]
    fn bullet_leaving_the_arena_is_removed_that_tick() {
        let mut world = World::new();
        let id = join(&mut world);
        // Slot 1 faces left towards x = 0 after rotating to 180
        world.apply_rotate(id, 180.0);
        world.spawn_bullet(id);

        // Starts at x = 175; still inside after 17 ticks (x = 5)
        for _ in 0..17 {
            world.tick_bullets();
        }
        assert_eq!(world.bullets().len(), 1);
        world.tick_bullets();
        assert!(world.bullets().is_empty());
        for _ in 0..5 {
            world.tick_bullets();
            assert!(world.bullets().is_empty());
        }
    }

    #[test]
    fn hit_scores_respawns_and_notifies() {
        let mut world = World::new();
        let shooter = join(&mut world);
        let victim = join(&mut world);
        let bystander = join(&mut world);

        world.apply_rotate(victim, 45.0);
        world.apply_move(victim, Direction::Left);
        world.spawn_bullet(shooter);

        // Park the victim right in front of the bullet
        let bullet = world.bullets()[0].clone();
        world.players[1].x = bullet.x + BULLET_SPEED;
        world.players[1].y = bullet.y;

        let notices = world.tick_bullets();

        assert!(world.bullets().is_empty());
        assert_eq!(world.score(shooter), Some(1));
        assert_eq!(world.score(victim), Some(0));

        let p = world.player(victim).unwrap();
        assert_eq!((p.x, p.y, p.angle), (600.0, 300.0, 0.0));

        assert_eq!(notices.len(), 3);
        assert_eq!(events_for(&notices, victim), vec![Notification::Lose]);
        assert_eq!(events_for(&notices, shooter), vec![Notification::Win]);
        assert_eq!(events_for(&notices, bystander), vec![Notification::Win]);
    }

    #[test]
    fn only_first_overlapping_player_is_hit() {
        let mut world = World::new();
        let shooter = join(&mut world);
        let first = join(&mut world);
        let second = join(&mut world);

        world.spawn_bullet(shooter);
        let target = (world.bullets()[0].x + BULLET_SPEED, world.bullets()[0].y);
        for idx in [1, 2] {
            world.players[idx].x = target.0;
            world.players[idx].y = target.1;
        }

        let notices = world.tick_bullets();

        assert_eq!(events_for(&notices, first), vec![Notification::Lose]);
        assert_eq!(events_for(&notices, second), vec![Notification::Win]);
        // Second player was not moved
        let p = world.player(second).unwrap();
        assert_eq!((p.x, p.y), target);
        assert_eq!(world.score(shooter), Some(1));
    }

    #[test]
    fn hit_from_departed_shooter_scores_nobody() {
        let mut world = World::new();
        let shooter = join(&mut world);
        let victim = join(&mut world);

        world.spawn_bullet(shooter);
        assert!(world.deregister_player(shooter));
        assert_eq!(world.bullets().len(), 1);

        let bullet = world.bullets()[0].clone();
        world.players[0].x = bullet.x + BULLET_SPEED;
        world.players[0].y = bullet.y;

        let notices = world.tick_bullets();
        assert_eq!(events_for(&notices, victim), vec![Notification::Lose]);
        assert_eq!(notices.len(), 1);
        assert_eq!(world.score(shooter), None);
        assert_eq!(world.score(victim), Some(0));
        assert!(world.bullets().is_empty());
    }

    #[test]
    fn missing_bullet_persists_unchanged_except_for_travel() {
        let mut world = World::new();
        let id = join(&mut world);
        world.apply_rotate(id, -90.0);
        world.spawn_bullet(id);
        let before = world.bullets()[0].clone();

        assert!(world.tick_bullets().is_empty());
        let after = &world.bullets()[0];
        assert_eq!(after.angle, before.angle);
        assert_eq!(after.shooter, before.shooter);
        assert!(close(after.y - before.y, BULLET_SPEED));
    }

    #[test]
    fn shot_across_the_arena_hits_slot_two() {
        let mut world = World::new();
        let p1 = join(&mut world);
        let p2 = join(&mut world);
        world.spawn_bullet(p1);

        let mut ticks = 0;
        let notices = loop {
            ticks += 1;
            let notices = world.tick_bullets();
            if !notices.is_empty() {
                break notices;
            }
            assert!(ticks < 100, "bullet never landed");
        };

        // 225 + 10 * 36 = 585 is the first position within 25 of x = 600
        assert_eq!(ticks, 36);
        assert_eq!(events_for(&notices, p2), vec![Notification::Lose]);
        assert_eq!(events_for(&notices, p1), vec![Notification::Win]);
        assert_eq!(world.score(p1), Some(1));
        let p = world.player(p2).unwrap();
        assert_eq!((p.x, p.y, p.angle), (600.0, 300.0, 0.0));
    }

    #[test]
    fn snapshot_lists_players_in_registration_order() {
        let mut world = World::new();
        let ids: Vec<_> = (0..3).map(|_| join(&mut world)).collect();
        world.spawn_bullet(ids[2]);

        let snapshot = world.snapshot();
        let order: Vec<_> = snapshot.players.iter().map(|p| p.id).collect();
        assert_eq!(order, ids);
        assert_eq!(snapshot.bullets.len(), 1);
        assert_eq!(snapshot.scores.len(), 3);
        assert_eq!(world.recipients().len(), 3);
    }
}
