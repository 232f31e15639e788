//! Server wiring and lifecycle

pub mod server;
pub mod state;

pub use server::{start, ServerError, ServerHandle};
pub use state::AppState;
