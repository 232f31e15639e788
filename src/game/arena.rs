//! Arena task: the single owner of the world
//!
//! Every world operation travels over one channel to one task, so operations
//! are applied strictly one at a time and no caller ever holds the world while
//! doing network I/O. [`ArenaHandle`] is the only way in.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::net::outbox::ConnectionHandle;

use super::snapshot::Snapshot;
use super::world::{Direction, Notice, PlayerId, RegisterError, Registration, World};

/// Requests queued before senders start waiting
pub const ARENA_QUEUE: usize = 256;

enum ArenaRequest {
    Register {
        conn: ConnectionHandle,
        reply: oneshot::Sender<Result<Registration, RegisterError>>,
    },
    Deregister {
        id: PlayerId,
        reply: oneshot::Sender<bool>,
    },
    Move {
        id: PlayerId,
        direction: Direction,
    },
    Rotate {
        id: PlayerId,
        angle: f32,
    },
    Shoot {
        id: PlayerId,
    },
    Tick {
        reply: oneshot::Sender<Vec<Notice>>,
    },
    Snapshot {
        reply: oneshot::Sender<(Snapshot, Vec<ConnectionHandle>)>,
    },
}

/// Arena errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ArenaError {
    #[error("arena is full")]
    Full,

    #[error("arena task has stopped")]
    Closed,
}

impl From<RegisterError> for ArenaError {
    fn from(err: RegisterError) -> Self {
        match err {
            RegisterError::Full => ArenaError::Full,
        }
    }
}

/// Handle to the running arena
#[derive(Clone)]
pub struct ArenaHandle {
    tx: mpsc::Sender<ArenaRequest>,
    player_count: Arc<AtomicUsize>,
}

impl ArenaHandle {
    /// Admit a connection. Capacity check and registration happen as one step.
    pub async fn register(&self, conn: ConnectionHandle) -> Result<Registration, ArenaError> {
        let (reply, rx) = oneshot::channel();
        self.send(ArenaRequest::Register { conn, reply }).await?;
        Ok(rx.await.map_err(|_| ArenaError::Closed)??)
    }

    /// Returns whether the player was still registered
    pub async fn deregister(&self, id: PlayerId) -> Result<bool, ArenaError> {
        let (reply, rx) = oneshot::channel();
        self.send(ArenaRequest::Deregister { id, reply }).await?;
        rx.await.map_err(|_| ArenaError::Closed)
    }

    pub async fn apply_move(&self, id: PlayerId, direction: Direction) -> Result<(), ArenaError> {
        self.send(ArenaRequest::Move { id, direction }).await
    }

    pub async fn apply_rotate(&self, id: PlayerId, angle: f32) -> Result<(), ArenaError> {
        self.send(ArenaRequest::Rotate { id, angle }).await
    }

    pub async fn spawn_bullet(&self, id: PlayerId) -> Result<(), ArenaError> {
        self.send(ArenaRequest::Shoot { id }).await
    }

    /// Advance bullets one tick; returns LOSE/WIN notices to deliver
    pub async fn tick_bullets(&self) -> Result<Vec<Notice>, ArenaError> {
        let (reply, rx) = oneshot::channel();
        self.send(ArenaRequest::Tick { reply }).await?;
        rx.await.map_err(|_| ArenaError::Closed)
    }

    /// Consistent copy of the world plus the connections to send it to
    pub async fn snapshot(&self) -> Result<(Snapshot, Vec<ConnectionHandle>), ArenaError> {
        let (reply, rx) = oneshot::channel();
        self.send(ArenaRequest::Snapshot { reply }).await?;
        rx.await.map_err(|_| ArenaError::Closed)
    }

    /// Registered players as of the last processed request
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    async fn send(&self, request: ArenaRequest) -> Result<(), ArenaError> {
        self.tx.send(request).await.map_err(|_| ArenaError::Closed)
    }
}

/// The world-owning task
pub struct Arena {
    world: World,
    rx: mpsc::Receiver<ArenaRequest>,
    player_count: Arc<AtomicUsize>,
}

impl Arena {
    pub fn new(queue: usize) -> (Self, ArenaHandle) {
        let (tx, rx) = mpsc::channel(queue.max(1));
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = ArenaHandle {
            tx,
            player_count: player_count.clone(),
        };
        let arena = Self {
            world: World::new(),
            rx,
            player_count,
        };

        (arena, handle)
    }

    /// Spawn the arena onto the runtime and return its handle
    pub fn spawn(queue: usize) -> ArenaHandle {
        let (arena, handle) = Self::new(queue);
        tokio::spawn(arena.run());
        handle
    }

    /// Serve requests until every handle is dropped
    pub async fn run(mut self) {
        info!("Arena started");

        while let Some(request) = self.rx.recv().await {
            self.handle(request);
        }

        info!(players = self.world.player_count(), "Arena stopped");
    }

    fn handle(&mut self, request: ArenaRequest) {
        // A dropped reply receiver means the caller gave up; nothing to undo
        match request {
            ArenaRequest::Register { conn, reply } => {
                let result = self.world.register_player(conn);
                self.sync_count();
                let _ = reply.send(result);
            }
            ArenaRequest::Deregister { id, reply } => {
                let removed = self.world.deregister_player(id);
                self.sync_count();
                let _ = reply.send(removed);
            }
            ArenaRequest::Move { id, direction } => {
                if !self.world.apply_move(id, direction) {
                    debug!(player = %id, "Move for unregistered player");
                }
            }
            ArenaRequest::Rotate { id, angle } => {
                if !self.world.apply_rotate(id, angle) {
                    debug!(player = %id, "Rotate for unregistered player");
                }
            }
            ArenaRequest::Shoot { id } => {
                if !self.world.spawn_bullet(id) {
                    debug!(player = %id, "Shoot for unregistered player");
                }
            }
            ArenaRequest::Tick { reply } => {
                let _ = reply.send(self.world.tick_bullets());
            }
            ArenaRequest::Snapshot { reply } => {
                let _ = reply.send((self.world.snapshot(), self.world.recipients()));
            }
        }
    }

    fn sync_count(&self) {
        self.player_count
            .store(self.world.player_count(), Ordering::Relaxed);
    }
}
