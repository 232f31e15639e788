//! Per-connection command processing
//!
//! Each admitted client gets a reader loop (this module's [`run_session`]) and
//! a writer task. The reader turns lines into arena operations; the writer
//! drains the connection's outbound queue into the socket. Whichever side
//! fails, the player is deregistered exactly once, on the reader's way out.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{BytesCodec, FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::game::arena::{ArenaError, ArenaHandle};
use crate::game::world::PlayerId;

use super::outbox::ConnId;
use super::protocol::{parse_command, ClientCommand, DecodeError, InboundCodec, InboundLine};

/// How long a closing writer may spend flushing to the peer
const CLOSE_GRACE: Duration = Duration::from_millis(200);

/// Per-connection limits
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub idle_timeout: Option<Duration>,
    pub max_line_length: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout: None,
            max_line_length: 256,
        }
    }
}

/// Everything a session needs besides its streams
pub struct Session {
    pub player: PlayerId,
    pub conn: ConnId,
    pub peer: SocketAddr,
    pub arena: ArenaHandle,
    pub settings: SessionSettings,
    /// Server-wide shutdown
    pub shutdown: CancellationToken,
}

/// Transport faults that end a session
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no input for {0:?}")]
    IdleTimeout(Duration),
}

/// Why a session ended
#[derive(Debug)]
pub enum SessionEnd {
    /// Peer closed its side
    PeerClosed,
    /// Read failed or timed out
    Transport(ConnectionError),
    /// Writing to the peer failed
    WriterFailed,
    /// Server is stopping
    Shutdown,
    /// Arena task is gone
    ArenaClosed,
}

/// Serve one connection until it ends, then deregister its player
pub async fn run_session<R, W>(
    session: Session,
    reader: R,
    writer: W,
    outbound: mpsc::Receiver<Bytes>,
) -> SessionEnd
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let cancel = session.shutdown.child_token();

    let writer_handle = tokio::spawn(write_loop(
        writer,
        outbound,
        cancel.clone(),
        session.player,
    ));

    let mut lines = FramedRead::new(reader, InboundCodec::new(session.settings.max_line_length));
    let end = read_loop(&session, &mut lines, &cancel).await;

    // Single exit path: deregister once, then release the socket
    match session.arena.deregister(session.player).await {
        Ok(true) => {}
        Ok(false) => debug!(player = %session.player, "Player was already deregistered"),
        Err(e) => warn!(player = %session.player, error = %e, "Deregistration failed"),
    }
    cancel.cancel();
    if let Err(e) = writer_handle.await {
        warn!(player = %session.player, error = %e, "Writer task failed");
    }

    info!(
        player = %session.player,
        conn = %session.conn,
        peer = %session.peer,
        reason = ?end,
        "Connection closed"
    );
    end
}

async fn read_loop<R>(
    session: &Session,
    lines: &mut FramedRead<R, InboundCodec>,
    cancel: &CancellationToken,
) -> SessionEnd
where
    R: AsyncRead + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                return if session.shutdown.is_cancelled() {
                    SessionEnd::Shutdown
                } else {
                    SessionEnd::WriterFailed
                };
            }
            next = next_line(lines, session.settings.idle_timeout) => next,
        };

        match next {
            Ok(Some(Ok(InboundLine::Line(line)))) => {
                if let Err(ArenaError::Closed) = dispatch(&session.arena, session.player, &line).await {
                    return SessionEnd::ArenaClosed;
                }
            }
            Ok(Some(Ok(InboundLine::Overlong))) => {
                debug!(player = %session.player, "Discarding over-long line");
            }
            Ok(Some(Ok(InboundLine::NotUtf8))) => {
                debug!(player = %session.player, "Discarding line that is not UTF-8");
            }
            Ok(Some(Err(e))) => {
                return SessionEnd::Transport(ConnectionError::Io(e));
            }
            Ok(None) => return SessionEnd::PeerClosed,
            Err(timeout) => return SessionEnd::Transport(ConnectionError::IdleTimeout(timeout)),
        }
    }
}

/// Next inbound line, or `Err(limit)` if the idle limit passes first
async fn next_line<R>(
    lines: &mut FramedRead<R, InboundCodec>,
    idle_timeout: Option<Duration>,
) -> Result<Option<Result<InboundLine, std::io::Error>>, Duration>
where
    R: AsyncRead + Unpin,
{
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, lines.next())
            .await
            .map_err(|_| limit),
        None => Ok(lines.next().await),
    }
}

/// Apply one inbound line to the arena. Malformed lines are dropped.
pub async fn dispatch(arena: &ArenaHandle, player: PlayerId, line: &str) -> Result<(), ArenaError> {
    match parse_command(line) {
        Ok(ClientCommand::Move(direction)) => arena.apply_move(player, direction).await,
        Ok(ClientCommand::Rotate(angle)) => arena.apply_rotate(player, angle).await,
        Ok(ClientCommand::Shoot) => arena.spawn_bullet(player).await,
        Err(DecodeError::Empty) => Ok(()),
        Err(e) => {
            debug!(player = %player, error = %e, "Ignoring malformed command");
            Ok(())
        }
    }
}

async fn write_loop<W>(
    writer: W,
    mut outbound: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
    player: PlayerId,
) where
    W: AsyncWrite + Unpin,
{
    let mut sink = FramedWrite::new(writer, BytesCodec::new());

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = outbound.recv() => match frame {
                Some(frame) => frame,
                // Deregistered: the arena dropped our queue
                None => break,
            },
        };

        // A peer that stops reading must not pin the task past cancellation
        let sent = tokio::select! {
            _ = cancel.cancelled() => break,
            sent = sink.send(frame) => sent,
        };
        if let Err(e) = sent {
            debug!(player = %player, error = %e, "Write failed");
            // Wake the reader so it deregisters
            cancel.cancel();
            return;
        }
    }

    match tokio::time::timeout(CLOSE_GRACE, SinkExt::<Bytes>::close(&mut sink)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(player = %player, error = %e, "Shutdown of write half failed"),
        Err(_) => debug!(player = %player, "Peer not reading, dropping unflushed frames"),
    }
}
