//! Line protocol spoken with clients
//!
//! Every line is `TAG` or `TAG:payload`, terminated by `\n`.
//!
//! Client to server: `MOVE:LEFT|RIGHT|UP|DOWN`, `ROTATE:<degrees>`, `SHOOT`.
//!
//! Server to client, once per tick: one `PLAYER:x,y,angle` line per player,
//! one `BULLET:x,y,angle` line per bullet, then `SCORE:id=val,...`.
//! Outside the tick: `FULL`, `LOSE`, `WIN`.

use std::fmt::Write as _;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::game::snapshot::Snapshot;
use crate::game::world::Direction;

/// One inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundLine {
    Line(String),
    /// A line longer than the limit was skipped up to its newline
    Overlong,
    /// A complete line that was not valid UTF-8, already consumed
    NotUtf8,
}

/// Newline framing for client input.
///
/// Over-long and non-UTF-8 lines come out as skippable items instead of a
/// decode error, so the stream keeps going; only I/O failures are errors.
#[derive(Debug, Clone)]
pub struct InboundCodec {
    lines: LinesCodec,
}

impl InboundCodec {
    pub fn new(max_line_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_line_length),
        }
    }

    fn map(result: Result<Option<String>, LinesCodecError>) -> Result<Option<InboundLine>, std::io::Error> {
        match result {
            Ok(line) => Ok(line.map(InboundLine::Line)),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(InboundLine::Overlong)),
            // LinesCodec reports bad UTF-8 as InvalidData after splitting the line off
            Err(LinesCodecError::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                Ok(Some(InboundLine::NotUtf8))
            }
            Err(LinesCodecError::Io(e)) => Err(e),
        }
    }
}

impl Decoder for InboundCodec {
    type Item = InboundLine;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Self::map(self.lines.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Self::map(self.lines.decode_eof(buf))
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClientCommand {
    /// Step the tank one unit of movement
    Move(Direction),
    /// Absolute heading in degrees
    Rotate(f32),
    /// Fire a bullet along the current heading
    Shoot,
}

/// Why an inbound line was not understood. Never reported to the sender.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty line")]
    Empty,

    #[error("unknown tag {0:?}")]
    UnknownTag(String),

    #[error("{0} requires a payload")]
    MissingPayload(&'static str),

    #[error("unknown direction {0:?}")]
    BadDirection(String),

    #[error("angle {0:?} is not a finite number")]
    BadAngle(String),
}

/// Parse one inbound line (without its terminator)
pub fn parse_command(line: &str) -> Result<ClientCommand, DecodeError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(DecodeError::Empty);
    }

    let (tag, payload) = match line.split_once(':') {
        Some((tag, payload)) => (tag, Some(payload.trim())),
        None => (line, None),
    };

    match tag {
        "MOVE" => {
            let payload = payload.ok_or(DecodeError::MissingPayload("MOVE"))?;
            let direction = match payload {
                "LEFT" => Direction::Left,
                "RIGHT" => Direction::Right,
                "UP" => Direction::Up,
                "DOWN" => Direction::Down,
                other => return Err(DecodeError::BadDirection(other.to_string())),
            };
            Ok(ClientCommand::Move(direction))
        }
        "ROTATE" => {
            let payload = payload.ok_or(DecodeError::MissingPayload("ROTATE"))?;
            match payload.parse::<f32>() {
                Ok(angle) if angle.is_finite() => Ok(ClientCommand::Rotate(angle)),
                _ => Err(DecodeError::BadAngle(payload.to_string())),
            }
        }
        // Any payload after SHOOT is ignored
        "SHOOT" => Ok(ClientCommand::Shoot),
        other => Err(DecodeError::UnknownTag(other.to_string())),
    }
}

/// Single-line notifications sent outside the tick cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Connection refused, arena at capacity
    Full,
    /// You were hit
    Lose,
    /// Somebody else was hit
    Win,
}

impl Notification {
    pub fn tag(self) -> &'static str {
        match self {
            Notification::Full => "FULL",
            Notification::Lose => "LOSE",
            Notification::Win => "WIN",
        }
    }

    pub fn encode(self) -> Bytes {
        Bytes::from_static(match self {
            Notification::Full => b"FULL\n",
            Notification::Lose => b"LOSE\n",
            Notification::Win => b"WIN\n",
        })
    }
}

/// Serialize a snapshot into one frame holding every line of the tick
pub fn encode_snapshot(snapshot: &Snapshot) -> Bytes {
    let mut out = String::with_capacity(32 * (snapshot.players.len() + snapshot.bullets.len()) + 32);

    // Writing into a String cannot fail
    for p in &snapshot.players {
        let _ = writeln!(out, "PLAYER:{},{},{}", p.x, p.y, p.angle);
    }
    for b in &snapshot.bullets {
        let _ = writeln!(out, "BULLET:{},{},{}", b.x, b.y, b.angle);
    }

    out.push_str("SCORE:");
    for (i, (id, score)) in snapshot.scores.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{}={}", id, score);
    }
    out.push('\n');

    Bytes::from(out)
}
