//! Producer tasks, one per enabled source. Each loop owns its cadence,
//! builds the complete rendered string for its reading, and publishes it;
//! the store only wakes the composer when the text changed.

pub mod battery;
pub mod clock;
pub mod command;
pub mod cputemp;
pub mod loadavg;
pub mod memory;
pub mod netif;
pub mod vpn;

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Shortened first tick so the bar fills quickly after startup, then the
/// steady polling interval.
pub const INITIAL_DELAY: Duration = Duration::from_millis(100);

pub(crate) fn cadence(steady: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + INITIAL_DELAY, steady);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
