//! Game simulation modules

pub mod arena;
pub mod combat;
pub mod simulation;
pub mod snapshot;
pub mod world;

pub use arena::{Arena, ArenaError, ArenaHandle};
pub use snapshot::Snapshot;
pub use world::{Direction, PlayerId, Registration, Slot, World};
