//! Connection admission
//!
//! One task owns the listening socket. It asks the arena to register each
//! accepted connection; the arena decides capacity and slot in a single step,
//! so concurrent connects can never overshoot four players.

use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::app::{AppState, ServerError};
use crate::game::arena::ArenaError;

use super::connection::{run_session, Session};
use super::outbox::ConnectionHandle;
use super::protocol::Notification;

/// Accept connections until shutdown.
///
/// Returns `Err` only for listener faults, which end admission for good.
pub async fn accept_loop(listener: TcpListener, state: AppState) -> Result<(), ServerError> {
    loop {
        let (socket, peer) = tokio::select! {
            _ = state.shutdown.cancelled() => {
                info!("Admission stopped");
                return Ok(());
            }
            accepted = listener.accept() => accepted.map_err(ServerError::Accept)?,
        };

        admit(&state, socket, peer).await?;
    }
}

async fn admit(state: &AppState, socket: TcpStream, peer: SocketAddr) -> Result<(), ServerError> {
    if let Err(e) = socket.set_nodelay(true) {
        debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
    }

    let (conn, outbound) = ConnectionHandle::channel(state.config.outbound_queue);
    let conn_id = conn.id();

    match state.arena.register(conn).await {
        Ok(registration) => {
            info!(
                player = %registration.id,
                slot = %registration.slot,
                conn = %conn_id,
                peer = %peer,
                "Player admitted"
            );

            let session = Session {
                player: registration.id,
                conn: conn_id,
                peer,
                arena: state.arena.clone(),
                settings: state.session_settings(),
                shutdown: state.shutdown.clone(),
            };
            let (reader, writer) = socket.into_split();
            state
                .tasks
                .spawn(run_session(session, reader, writer, outbound));
            Ok(())
        }
        Err(ArenaError::Full) => {
            info!(peer = %peer, "Arena full, rejecting connection");
            state.tasks.spawn(reject(socket, peer));
            Ok(())
        }
        Err(ArenaError::Closed) => Err(ServerError::ArenaStopped),
    }
}

/// Tell the peer the arena is full, then close
async fn reject(mut socket: TcpStream, peer: SocketAddr) {
    if let Err(e) = socket.write_all(&Notification::Full.encode()).await {
        warn!(peer = %peer, error = %e, "Failed to send FULL");
    }
    if let Err(e) = socket.shutdown().await {
        debug!(peer = %peer, error = %e, "Failed to close rejected connection");
    }
}
