//! Time utilities for the simulation loop

use std::time::{Duration, Instant};

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Tick rate configuration
pub const DEFAULT_TICK_HZ: u32 = 60;
pub const MIN_TICK_HZ: u32 = 60;
pub const MAX_TICK_HZ: u32 = 120;

/// Wall-clock period of one simulation tick
pub fn tick_period(tick_hz: u32) -> Duration {
    Duration::from_micros(1_000_000 / u64::from(tick_hz.max(1)))
}
