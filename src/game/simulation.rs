//! Fixed-rate simulation and broadcast loop

use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::net::outbox::{ConnectionHandle, DeliveryError};
use crate::net::protocol::encode_snapshot;

use super::arena::{ArenaError, ArenaHandle};

/// What one tick delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub tick: u64,
    pub notices: usize,
    pub recipients: usize,
    pub dropped: usize,
}

/// Run ticks at `period` until `shutdown` fires or the arena goes away
pub async fn run_simulation(arena: ArenaHandle, period: Duration, shutdown: CancellationToken) {
    let mut tick_interval = interval(period);
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(period_micros = period.as_micros() as u64, "Simulation loop started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tick_interval.tick() => {}
        }

        match step(&arena).await {
            Ok(report) if report.dropped > 0 => {
                debug!(tick = report.tick, dropped = report.dropped, "Frames not delivered");
            }
            Ok(_) => {}
            Err(ArenaError::Closed) => {
                warn!("Arena closed, stopping simulation loop");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Simulation step failed");
            }
        }
    }

    info!("Simulation loop stopped");
}

/// One tick: move bullets, resolve hits, then broadcast the resulting snapshot.
///
/// A connection that cannot take a frame is skipped; its own processor will
/// notice the broken transport and deregister it.
pub async fn step(arena: &ArenaHandle) -> Result<StepReport, ArenaError> {
    let notices = arena.tick_bullets().await?;
    let mut report = StepReport {
        notices: notices.len(),
        ..StepReport::default()
    };

    for notice in &notices {
        debug!(player = %notice.player, event = notice.event.tag(), "Sending hit notice");
        if !deliver(&notice.to, notice.event.encode()) {
            report.dropped += 1;
        }
    }

    let (snapshot, recipients) = arena.snapshot().await?;
    report.tick = snapshot.tick;
    report.recipients = recipients.len();
    if recipients.is_empty() {
        return Ok(report);
    }

    let frame = encode_snapshot(&snapshot);
    for conn in &recipients {
        if !deliver(conn, frame.clone()) {
            report.dropped += 1;
        }
    }

    Ok(report)
}

fn deliver(conn: &ConnectionHandle, frame: bytes::Bytes) -> bool {
    match conn.deliver(frame) {
        Ok(()) => true,
        Err(DeliveryError::Lagged) => {
            warn!(conn = %conn.id(), "Client lagging, frame dropped");
            false
        }
        Err(DeliveryError::Closed) => {
            debug!(conn = %conn.id(), "Connection already closed");
            false
        }
    }
}
