//! Audit event fan-out for the admin observation streams.
//!
//! The registry owns every listener's sending side; subscriber tasks own the
//! receiving side and turn it into either the raw event log or periodic
//! statistics windows.

/// Listener registration and broadcast.
pub mod registry;
/// Log and statistics subscriber loops.
pub mod subscriber;

pub use registry::{Listener, ListenerId, ListenerRegistry, LISTENER_SLOT_DEPTH};
pub use subscriber::{
    run_log_subscriber, run_stat_subscriber, stat_period, MAX_STAT_INTERVAL_SECS,
};
