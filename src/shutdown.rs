//! Shutdown signal handling for the serve loop.
//!
//! Handles SIGINT (Ctrl+C), SIGTERM and SIGHUP. The agent has no work of its
//! own between requests, so the main thread simply parks here while the bus
//! connection's executor serves calls.

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

/// Signals that stop the agent.
pub const SHUTDOWN_SIGNALS: [i32; 3] = [SIGINT, SIGTERM, SIGHUP];

/// Block until one of [`SHUTDOWN_SIGNALS`] arrives and return it.
pub fn wait_for_signal() -> std::io::Result<i32> {
    let mut signals = Signals::new(SHUTDOWN_SIGNALS)?;
    // `forever` only ends if the handle is closed, which nothing here does
    Ok(signals.forever().next().unwrap_or(SIGTERM))
}

pub fn signal_name(sig: i32) -> &'static str {
    match sig {
        SIGINT => "SIGINT",
        SIGTERM => "SIGTERM",
        SIGHUP => "SIGHUP",
        _ => "UNKNOWN",
    }
}
